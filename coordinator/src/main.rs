//! Entry point for `helmet-coordinator`: initializes tracing, loads config,
//! constructs shared state, spawns every worker behind a shared shutdown
//! signal, and blocks on ctrl_c/SIGTERM.

mod arbiter;
mod bus;
mod clock;
mod config;
mod dashboard;
mod drivers;
mod error;
mod heartbeat;
mod imu_log;
mod issuer;
mod line_edge;
mod movement;
mod pending;
mod response_processor;
mod sweeper;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::{mpsc, watch, RwLock};

use arbiter::{ArbiterConfig, TriggerEvent};
use bus::{BusClient, BusConfig};
use clock::{Clock, SystemClock};
use config::{Args, Config};
use dashboard::{DashboardState, TriggersEnabled};
use drivers::{NullCamera, NullImu, NullLineInput, NullSyncLine};
use imu_log::ImuLog;
use issuer::Issuer;
use pending::CoordinatorState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let cfg = args.apply_overrides(Config::load(&args.config).await);

    if cfg.startup_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(cfg.startup_delay_ms)).await;
    }

    tracing::info!(master_id = %cfg.master_id, peers = cfg.slaves.len(), "starting helmet-coordinator");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let state = Arc::new(RwLock::new(CoordinatorState::new(&cfg.slaves)));
    let peers = Arc::new(cfg.slaves.clone());

    let bus_cfg = BusConfig {
        client_id: cfg.master_id.clone(),
        broker_host: cfg.broker_host.clone(),
        broker_port: cfg.broker_port,
        keepalive_secs: cfg.keepalive,
        qos: cfg.qos,
        topic_commands: cfg.topic_commands.clone(),
        topic_responses: cfg.topic_responses.clone(),
    };
    let (bus, eventloop) = BusClient::connect(&bus_cfg);
    bus.subscribe_responses(&cfg.topic_responses, cfg.qos).await.unwrap_or_else(|e| {
        tracing::warn!("initial subscribe failed: {e}");
    });
    let bus = Arc::new(bus);

    let issuer = Arc::new(Issuer::new(
        peers.clone(),
        state.clone(),
        bus.clone(),
        clock.clone(),
        cfg.exposure_us,
        cfg.timeout_ms,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (responses_tx, mut responses_rx) = mpsc::channel::<Vec<u8>>(256);
    let (trigger_tx, trigger_rx) = mpsc::channel::<TriggerEvent>(16);

    let imu_log = Arc::new(ImuLog::new(cfg.log_dir.join("master_imu_data.json")));
    let camera: Arc<dyn drivers::CaptureDriver> = Arc::new(NullCamera);
    let imu: Arc<dyn drivers::ImuDriver> = Arc::new(NullImu);
    let sync_line: Arc<dyn drivers::SyncLine> = Arc::new(NullSyncLine);
    let local_capture_seq = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::new();

    handles.push(tokio::spawn(bus::run_event_loop(eventloop, responses_tx)));

    {
        let state = state.clone();
        let clock = clock.clone();
        let mut shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = responses_rx.recv() => match frame {
                        Some(raw) => response_processor::process_response(&state, clock.as_ref(), &raw).await,
                        None => break,
                    },
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() { break; }
                    }
                }
            }
        }));
    }

    handles.push(tokio::spawn(sweeper::run_sweeper(
        state.clone(),
        clock.clone(),
        Duration::from_secs(cfg.timeout_check_interval_seconds),
        shutdown_rx.clone(),
    )));

    handles.push(tokio::spawn(heartbeat::run_heartbeat(
        issuer.clone(),
        Duration::from_secs(cfg.polling_interval_seconds),
        shutdown_rx.clone(),
    )));

    handles.push(tokio::spawn(arbiter::run_arbiter(
        trigger_rx,
        issuer.clone(),
        camera,
        imu.clone(),
        sync_line,
        ArbiterConfig {
            pulse_duration: Duration::from_millis(cfg.pulse_duration_ms),
            session_dir: cfg.photo_base_dir.join(format!("helmet-cam{}", cfg.cam_ordinal)),
            cam_ordinal: cfg.cam_ordinal,
        },
        imu_log,
        local_capture_seq,
        shutdown_rx.clone(),
    )));

    if cfg.capture_triggers.timer_enabled {
        let tx = trigger_tx.clone();
        let interval = Duration::from_secs(cfg.capture_triggers.timer_interval_seconds.max(1));
        let mut shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
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
                let event = TriggerEvent { source: arbiter::TriggerSource::Timer, sequence: None };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        }));
    }

    if cfg.capture_triggers.imu_movement_enabled {
        handles.push(tokio::spawn(movement::run_movement_detector(
            imu,
            clock.clone(),
            movement::MovementConfig {
                enabled: true,
                threshold: cfg.capture_triggers.imu_movement_threshold,
                cooldown_ms: cfg.capture_triggers.imu_movement_cooldown_seconds * 1000,
            },
            trigger_tx.clone(),
            shutdown_rx.clone(),
        )));
    }

    if cfg.capture_triggers.gpio_pin20_enabled {
        let line_input: Arc<dyn drivers::LineInput> = Arc::new(NullLineInput);
        handles.push(tokio::spawn(line_edge::run_line_edge_detector(
            line_input,
            clock.clone(),
            trigger_tx.clone(),
            shutdown_rx.clone(),
        )));
    }

    let dashboard_state = DashboardState {
        state: state.clone(),
        trigger_tx: trigger_tx.clone(),
        triggers_enabled: TriggersEnabled {
            timer: cfg.capture_triggers.timer_enabled,
            movement: cfg.capture_triggers.imu_movement_enabled,
            line_edge: cfg.capture_triggers.gpio_pin20_enabled,
        },
    };
    handles.push(tokio::spawn(dashboard::run_dashboard(cfg.web_port, dashboard_state, shutdown_rx.clone())));

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, tearing down");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
