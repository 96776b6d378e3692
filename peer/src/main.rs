//! Entry point for `helmet-peer`: a single capture node. Subscribes to
//! `topic_commands`, dispatches through the Peer Handler, publishes
//! responses to `topic_responses`.

mod bus;
mod clock;
mod config;
mod drivers;
mod error;
mod handler;
mod session;
mod session_log;

use std::sync::Arc;

use clap::Parser;
use helmet_protocol::Command;

use bus::{BusClient, BusConfig};
use clock::{Clock, SystemClock};
use config::{Args, Config};
use drivers::NullCamera;
use handler::PeerHandler;
use session::SessionGrouper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let cfg = args.apply_overrides(Config::load(&args.config).await);

    tracing::info!(client_id = %cfg.client_id, "starting helmet-peer");

    let bus_cfg = BusConfig {
        client_id: cfg.client_id.clone(),
        broker_host: cfg.broker_host.clone(),
        broker_port: cfg.broker_port,
        keepalive_secs: cfg.keepalive,
        qos: cfg.qos,
        topic_commands: cfg.topic_commands.clone(),
        topic_responses: cfg.topic_responses.clone(),
    };
    let (bus, eventloop) = BusClient::connect(&bus_cfg);
    bus.subscribe_commands(&cfg.topic_commands, cfg.qos).await.unwrap_or_else(|e| {
        tracing::warn!("initial subscribe failed: {e}");
    });
    let bus = Arc::new(bus);

    let (commands_tx, mut commands_rx) = tokio::sync::mpsc::channel::<Vec<u8>>(64);
    let event_loop_task = tokio::spawn(bus::run_event_loop(eventloop, commands_tx));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let grouper = SessionGrouper::new(cfg.photo_base_dir.clone(), cfg.cam_ordinal, cfg.session_inactivity_timeout_ms);
    let mut handler = PeerHandler::new(cfg.client_id.clone(), cfg.cam_ordinal, Arc::new(NullCamera), clock, grouper);

    let dispatch_task = tokio::spawn(async move {
        while let Some(raw) = commands_rx.recv().await {
            let cmd: Command = match serde_json::from_slice(&raw) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("dropping malformed command: {e}");
                    continue;
                }
            };
            if let Some(response) = handler.handle(&cmd).await {
                match serde_json::to_vec(&response) {
                    Ok(payload) => {
                        if let Err(e) = bus.publish_response(payload).await {
                            tracing::warn!("failed to publish response for command {}: {e}", cmd.id);
                        }
                    }
                    Err(e) => tracing::warn!("failed to serialize response for command {}: {e}", cmd.id),
                }
            }
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
        res = event_loop_task => {
            if let Err(e) = res {
                tracing::warn!("bus event loop task ended unexpectedly: {e}");
            }
        }
        res = dispatch_task => {
            if let Err(e) = res {
                tracing::warn!("dispatch task ended unexpectedly: {e}");
            }
        }
    }

    Ok(())
}
