//! Pending Table and PeerStats, sharing one mutex per §5's "simpler invariants
//! than splitting them" policy. Follows the `SharedState = Arc<RwLock<...>>`
//! alias convention used throughout this codebase.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use helmet_protocol::{CommandId, CommandKind, PeerId, Response, ResponseStatus};
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub kind: CommandKind,
    /// Monotonic ms at issue time.
    pub issued_at: u64,
    /// Monotonic ms deadline; swept once `now_mono_ms() >= deadline`.
    pub deadline: u64,
    pub waiting: HashSet<PeerId>,
    pub responses: HashMap<PeerId, Response>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    Unknown,
    Online,
    Error,
    Timeout,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerStats {
    pub status: PeerStatus,
    pub total_commands: u64,
    pub ok: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub last_seen: i64,
    pub response_count: u64,
    pub last_rtt_ms: i64,
    pub avg_rtt_ms: f64,
}

impl Default for PeerStats {
    fn default() -> Self {
        Self {
            status: PeerStatus::Unknown,
            total_commands: 0,
            ok: 0,
            failed: 0,
            timed_out: 0,
            last_seen: 0,
            response_count: 0,
            last_rtt_ms: 0,
            avg_rtt_ms: 0.0,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct GlobalStats {
    pub total_commands: u64,
    pub ok_responses: u64,
    pub failed_responses: u64,
    pub timeout_responses: u64,
    pub local_capture_ok: u64,
    pub local_capture_failed: u64,
}

pub struct CoordinatorState {
    pub pending: HashMap<CommandId, PendingEntry>,
    pub peer_stats: HashMap<PeerId, PeerStats>,
    pub global: GlobalStats,
}

impl CoordinatorState {
    pub fn new(peers: &[PeerId]) -> Self {
        let mut peer_stats = HashMap::new();
        for p in peers {
            peer_stats.insert(p.clone(), PeerStats::default());
        }
        Self { pending: HashMap::new(), peer_stats, global: GlobalStats::default() }
    }
}

pub type SharedState = Arc<RwLock<CoordinatorState>>;

/// Classifies a response status into the three PeerStats buckets, per §4.3's
/// literal mapping: `ok` -> online, `timeout` -> timeout, anything else -> error.
pub fn status_bucket(status: ResponseStatus) -> PeerStatus {
    match status {
        ResponseStatus::Ok => PeerStatus::Online,
        ResponseStatus::Timeout => PeerStatus::Timeout,
        ResponseStatus::Error | ResponseStatus::Online => PeerStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bucket_matches_spec_table() {
        assert_eq!(status_bucket(ResponseStatus::Ok), PeerStatus::Online);
        assert_eq!(status_bucket(ResponseStatus::Timeout), PeerStatus::Timeout);
        assert_eq!(status_bucket(ResponseStatus::Error), PeerStatus::Error);
        assert_eq!(status_bucket(ResponseStatus::Online), PeerStatus::Error);
    }

    #[test]
    fn new_state_seeds_stats_for_every_configured_peer() {
        let peers = vec!["p1".to_string(), "p2".to_string()];
        let state = CoordinatorState::new(&peers);
        assert_eq!(state.peer_stats.len(), 2);
        assert!(state.peer_stats.values().all(|s| s.status == PeerStatus::Unknown));
    }
}
