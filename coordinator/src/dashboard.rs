//! Dashboard Bridge (§4.9). A plain `axum` JSON API rather than push events —
//! see DESIGN.md. Reads the shared state directly; writes go through the
//! Arbiter's feeder channel so they obey the same single-consumer ordering as
//! every other trigger source.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::arbiter::{SequenceSpec, TriggerEvent, TriggerSource};
use crate::pending::SharedState;

#[derive(Clone)]
pub struct DashboardState {
    pub state: SharedState,
    pub trigger_tx: mpsc::Sender<TriggerEvent>,
    pub triggers_enabled: TriggersEnabled,
}

#[derive(Clone, Copy)]
pub struct TriggersEnabled {
    pub timer: bool,
    pub movement: bool,
    pub line_edge: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    global: crate::pending::GlobalStats,
    pending_count: usize,
}

#[derive(Serialize)]
struct PeersResponse {
    peers: std::collections::HashMap<String, crate::pending::PeerStats>,
    online: usize,
    timeout: usize,
    error: usize,
}

#[derive(Deserialize)]
struct CommandRequest {
    count: u32,
    interval: f64,
}

#[derive(Serialize)]
struct CommandResponse {
    status: &'static str,
    count: u32,
    interval: f64,
}

#[derive(Serialize)]
struct TriggersStatusResponse {
    timer_enabled: bool,
    imu_movement_enabled: bool,
    gpio_pin20_enabled: bool,
}

async fn get_status(State(st): State<DashboardState>) -> Json<StatusResponse> {
    let state = st.state.read().await;
    Json(StatusResponse { global: state.global.clone(), pending_count: state.pending.len() })
}

async fn get_peers(State(st): State<DashboardState>) -> Json<PeersResponse> {
    use crate::pending::PeerStatus;
    let state = st.state.read().await;
    let online = state.peer_stats.values().filter(|p| p.status == PeerStatus::Online).count();
    let timeout = state.peer_stats.values().filter(|p| p.status == PeerStatus::Timeout).count();
    let error = state.peer_stats.values().filter(|p| p.status == PeerStatus::Error).count();
    Json(PeersResponse { peers: state.peer_stats.clone(), online, timeout, error })
}

async fn get_triggers_status(State(st): State<DashboardState>) -> Json<TriggersStatusResponse> {
    Json(TriggersStatusResponse {
        timer_enabled: st.triggers_enabled.timer,
        imu_movement_enabled: st.triggers_enabled.movement,
        gpio_pin20_enabled: st.triggers_enabled.line_edge,
    })
}

async fn post_command(State(st): State<DashboardState>, Json(req): Json<CommandRequest>) -> Json<CommandResponse> {
    let sequence = if req.count > 1 || req.interval > 0.0 {
        Some(SequenceSpec { count: req.count.max(1), interval: Duration::from_secs_f64(req.interval.max(0.0)) })
    } else {
        None
    };
    let event = TriggerEvent { source: TriggerSource::Web, sequence };
    if st.trigger_tx.send(event).await.is_err() {
        tracing::warn!("dashboard: arbiter channel closed, dropping command request");
    }
    Json(CommandResponse { status: "started", count: req.count, interval: req.interval })
}

async fn post_single_capture(State(st): State<DashboardState>) -> Json<CommandResponse> {
    let event = TriggerEvent { source: TriggerSource::Web, sequence: None };
    if st.trigger_tx.send(event).await.is_err() {
        tracing::warn!("dashboard: arbiter channel closed, dropping single_capture request");
    }
    Json(CommandResponse { status: "started", count: 1, interval: 0.0 })
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/peers", get(get_peers))
        .route("/triggers_status", get(get_triggers_status))
        .route("/command", post(post_command))
        .route("/single_capture", post(post_single_capture))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_dashboard(port: u16, state: DashboardState, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let app = router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!("dashboard: failed to bind {addr}: {e}");
            return;
        }
    };
    tracing::info!("dashboard listening on {addr}");
    let serve = axum::serve(listener, app.into_make_service());
    tokio::select! {
        res = serve => {
            if let Err(e) = res {
                tracing::warn!("dashboard server error: {e}");
            }
        }
        _ = shutdown.changed() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::CoordinatorState;
    use tokio::sync::RwLock;

    #[tokio::test]
    async fn status_reports_pending_count() {
        let peers = vec!["p1".to_string()];
        let shared = Arc::new(RwLock::new(CoordinatorState::new(&peers)));
        let (tx, _rx) = mpsc::channel(4);
        let dash = DashboardState {
            state: shared.clone(),
            trigger_tx: tx,
            triggers_enabled: TriggersEnabled { timer: true, movement: false, line_edge: false },
        };
        let resp = get_status(State(dash)).await;
        assert_eq!(resp.0.pending_count, 0);
    }
}
