//! Movement Detector (§4.5). Samples the inertial sensor at 10 Hz; emits a
//! trigger on a qualifying magnitude delta, honoring a cooldown. Grounded
//! directly on `master_helmet_system.py`'s `start_imu_monitoring`: the first
//! sample seeds `last_magnitude` without triggering, and a transient read
//! error is logged and retried rather than terminating the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::arbiter::{TriggerEvent, TriggerSource};
use crate::clock::Clock;
use crate::drivers::ImuDriver;

pub struct MovementConfig {
    pub enabled: bool,
    pub threshold: f64,
    pub cooldown_ms: u64,
}

/// Pure delta/cooldown evaluation, factored out of the sampling loop so it
/// can be tested without real sleeps.
#[derive(Default)]
pub struct MovementState {
    last_magnitude: Option<f64>,
    last_trigger_ms: Option<u64>,
}

impl MovementState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this sample should emit a trigger.
    pub fn observe(&mut self, magnitude: f64, now_ms: u64, threshold: f64, cooldown_ms: u64) -> bool {
        let Some(last) = self.last_magnitude else {
            self.last_magnitude = Some(magnitude);
            return false;
        };
        let delta = (magnitude - last).abs();
        self.last_magnitude = Some(magnitude);
        self.observe_delta(delta, now_ms, threshold, cooldown_ms)
    }

    /// Cooldown-gated threshold check against an already-computed delta.
    /// Split out from `observe` so the delta-vs-threshold-vs-cooldown logic
    /// can be exercised directly against a literal Δ sequence in tests.
    fn observe_delta(&mut self, delta: f64, now_ms: u64, threshold: f64, cooldown_ms: u64) -> bool {
        if delta <= threshold {
            return false;
        }
        if let Some(prev) = self.last_trigger_ms {
            if now_ms.saturating_sub(prev) < cooldown_ms {
                return false;
            }
        }
        self.last_trigger_ms = Some(now_ms);
        true
    }
}

pub async fn run_movement_detector(
    imu: Arc<dyn ImuDriver>,
    clock: Arc<dyn Clock>,
    cfg: MovementConfig,
    tx: mpsc::Sender<TriggerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    if !cfg.enabled {
        return;
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let mut detector = MovementState::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { break; }
            }
        }
        if *shutdown.borrow() {
            break;
        }

        let snapshot = match imu.read().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("movement detector: imu read error: {e}, retrying");
                continue;
            }
        };
        if !snapshot.available {
            continue;
        }

        let now_ms = clock.now_mono_ms();
        if detector.observe(snapshot.accel_magnitude(), now_ms, cfg.threshold, cfg.cooldown_ms) {
            if tx.send(TriggerEvent { source: TriggerSource::Movement, sequence: None }).await.is_err() {
                tracing::warn!("movement detector: arbiter channel closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_without_triggering() {
        let mut d = MovementState::new();
        assert!(!d.observe(1.0, 0, 2.0, 30_000));
    }

    #[test]
    fn movement_cooldown_scenario() {
        // §8 scenario 4: threshold=2.0, cooldown=30s, Δ sequence
        // (1.0, 3.0, 4.0, 5.0) at t=(0,1,5,40)s. Triggers only at t=1s and t=40s.
        let mut d = MovementState::new();
        assert!(!d.observe_delta(1.0, 0, 2.0, 30_000));
        assert!(d.observe_delta(3.0, 1_000, 2.0, 30_000));
        assert!(!d.observe_delta(4.0, 5_000, 2.0, 30_000));
        assert!(d.observe_delta(5.0, 40_000, 2.0, 30_000));
    }

    #[test]
    fn threshold_zero_triggers_on_any_nonzero_delta() {
        let mut d = MovementState::new();
        assert!(!d.observe(1.0, 0, 0.0, 0));
        assert!(d.observe(1.5, 100, 0.0, 0));
    }
}
