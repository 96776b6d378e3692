//! Trigger Arbiter (§4.1). Serializes fan-in from Timer, Movement, Line-Edge,
//! and Web triggers through one bounded channel so at most one capture
//! issuance is in flight at a time. Each tick joins: issue, sync-line pulse,
//! local camera capture.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use helmet_protocol::{CommandKind, MasterImu};
use tokio::sync::{mpsc, watch};

use crate::drivers::{CaptureDriver, ImuDriver, SyncLine};
use crate::imu_log::ImuLog;
use crate::issuer::Issuer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Timer,
    Movement,
    LineEdge,
    Web,
}

impl TriggerSource {
    fn label(&self) -> &'static str {
        match self {
            TriggerSource::Timer => "timer",
            TriggerSource::Movement => "movement",
            TriggerSource::LineEdge => "line_edge",
            TriggerSource::Web => "web",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SequenceSpec {
    pub count: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub source: TriggerSource,
    pub sequence: Option<SequenceSpec>,
}

pub struct ArbiterConfig {
    pub pulse_duration: Duration,
    pub session_dir: PathBuf,
    pub cam_ordinal: u32,
}

pub async fn run_arbiter(
    mut rx: mpsc::Receiver<TriggerEvent>,
    issuer: Arc<Issuer>,
    camera: Arc<dyn CaptureDriver>,
    imu: Arc<dyn ImuDriver>,
    sync_line: Arc<dyn SyncLine>,
    cfg: ArbiterConfig,
    imu_log: Arc<ImuLog>,
    local_capture_seq: Arc<AtomicU64>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            e = rx.recv() => match e {
                Some(e) => e,
                None => break,
            },
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break; } else { continue; }
            }
        };
        if *shutdown.borrow() {
            break;
        }

        let (ticks, interval) = match event.sequence {
            Some(spec) => (spec.count.max(1), spec.interval),
            None => (1, Duration::ZERO),
        };

        for i in 0..ticks {
            if *shutdown.borrow() {
                break;
            }
            let notes = if ticks > 1 {
                format!("{}_sequence_{}", event.source.label(), i + 1)
            } else {
                event.source.label().to_string()
            };

            run_tick(
                &issuer,
                camera.as_ref(),
                imu.as_ref(),
                sync_line.as_ref(),
                &cfg,
                imu_log.as_ref(),
                &local_capture_seq,
                notes,
            )
            .await;

            if i + 1 < ticks && !interval.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() { break; }
                    }
                }
            }
        }
    }
}

async fn run_tick(
    issuer: &Issuer,
    camera: &dyn CaptureDriver,
    imu: &dyn ImuDriver,
    sync_line: &dyn SyncLine,
    cfg: &ArbiterConfig,
    imu_log: &ImuLog,
    local_capture_seq: &Arc<AtomicU64>,
    notes: String,
) {
    let master_imu = match imu.read().await {
        Ok(snapshot) => MasterImu::Snapshot(snapshot),
        Err(e) => MasterImu::unavailable(e.to_string()),
    };

    let issue_fut = issuer.issue(CommandKind::Capture, notes.clone(), Some(master_imu.clone()));

    let pulse_fut = async {
        if let Err(e) = sync_line.set_high() {
            tracing::warn!("sync line set_high failed: {e}");
            return;
        }
        tokio::time::sleep(cfg.pulse_duration).await;
        if let Err(e) = sync_line.set_low() {
            tracing::warn!("sync line set_low failed: {e}");
        }
    };

    let count = local_capture_seq.fetch_add(1, Ordering::SeqCst) + 1;
    let timestamp = chrono::Local::now().format("%H%M%S");
    let filename = format!("cam{}_{timestamp}_{count}.jpg", cfg.cam_ordinal);
    let capture_fut = camera.capture(&cfg.session_dir, &filename);

    let (issue_res, _, capture_res) = tokio::join!(issue_fut, pulse_fut, capture_fut);

    match issue_res {
        Ok(id) => {
            tracing::debug!("issued command {id} for trigger {notes}");
            let timestamp = chrono::Utc::now().to_rfc3339();
            if let Err(e) = imu_log.append(id, timestamp, &master_imu).await {
                tracing::warn!("failed to persist imu log entry for command {id}: {e}");
            }
        }
        Err(e) => tracing::warn!("failed to issue command for trigger {notes}: {e}"),
    }

    let mut state = issuer.state().write().await;
    match capture_res {
        Ok(path) => {
            state.global.local_capture_ok += 1;
            tracing::info!("local capture succeeded: {path:?}");
        }
        Err(e) => {
            state.global.local_capture_failed += 1;
            tracing::warn!("local capture failed: {e}");
        }
    }
}
