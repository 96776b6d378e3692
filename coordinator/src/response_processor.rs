//! Response Processor (§4.3). Matches inbound frames to Pending entries,
//! applies first-response-wins deduplication, updates PeerStats, and closes
//! completed commands.
//!
//! Deliberate divergence from `master_helmet_system.py`: the original does
//! not deduplicate stats updates per (id, peer); this spec's invariant
//! requires first-wins, so that's what's implemented here.

use helmet_protocol::Response;

use crate::clock::Clock;
use crate::pending::{status_bucket, PeerStatus, SharedState};

pub async fn process_response(state: &SharedState, clock: &dyn Clock, raw: &[u8]) {
    let resp: Response = match serde_json::from_slice(raw) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("dropping malformed response: {e}");
            return;
        }
    };

    let mut state = state.write().await;

    let rtt_ms = {
        let Some(entry) = state.pending.get(&resp.id) else {
            tracing::warn!("dropping response for unknown command id {}", resp.id);
            return;
        };
        if !entry.waiting.contains(&resp.client) {
            tracing::warn!("late/spurious response from {} for command {}", resp.client, resp.id);
            return;
        }
        if entry.responses.contains_key(&resp.client) {
            tracing::warn!(
                "duplicate response from {} for command {}, ignoring for stats",
                resp.client,
                resp.id
            );
            return;
        }
        clock.now_mono_ms().saturating_sub(entry.issued_at) as i64
    };

    let bucket = status_bucket(resp.status);

    {
        let stats = state.peer_stats.entry(resp.client.clone()).or_default();
        stats.total_commands += 1;
        stats.response_count += 1;
        stats.last_seen = clock.now_wall_ns();
        stats.last_rtt_ms = rtt_ms;
        stats.avg_rtt_ms = (stats.avg_rtt_ms * (stats.response_count - 1) as f64 + rtt_ms as f64)
            / stats.response_count as f64;
        stats.status = bucket;
        match bucket {
            PeerStatus::Online => stats.ok += 1,
            PeerStatus::Timeout => stats.timed_out += 1,
            PeerStatus::Error | PeerStatus::Unknown => stats.failed += 1,
        }
    }

    match bucket {
        PeerStatus::Online => state.global.ok_responses += 1,
        PeerStatus::Timeout => state.global.timeout_responses += 1,
        PeerStatus::Error | PeerStatus::Unknown => state.global.failed_responses += 1,
    }

    let waiting_now_empty = {
        let entry = state.pending.get_mut(&resp.id).expect("checked above");
        entry.waiting.remove(&resp.client);
        entry.responses.insert(resp.client.clone(), resp.clone());
        entry.waiting.is_empty()
    };

    if waiting_now_empty {
        if let Some(entry) = state.pending.remove(&resp.id) {
            let total = entry.responses.len();
            let ok = entry
                .responses
                .values()
                .filter(|r| matches!(r.status, helmet_protocol::ResponseStatus::Ok))
                .count();
            tracing::info!("command {} completed: {}/{} ok", resp.id, ok, total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::pending::CoordinatorState;
    use helmet_protocol::ResponseStatus;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn make_state(peers: &[&str]) -> SharedState {
        let peers: Vec<String> = peers.iter().map(|s| s.to_string()).collect();
        Arc::new(RwLock::new(CoordinatorState::new(&peers)))
    }

    fn ok_response(id: u64, client: &str) -> Vec<u8> {
        serde_json::to_vec(&Response {
            id,
            client: client.into(),
            status: ResponseStatus::Ok,
            started_ns: 0,
            finished_ns: 0,
            file: "f.jpg".into(),
            jitter_us: 10,
            session_dir: None,
            photos_in_session: None,
            error: String::new(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_response_counted_once() {
        let state = make_state(&["p1"]);
        let clock = FakeClock::new();
        {
            let mut s = state.write().await;
            s.pending.insert(
                1,
                crate::pending::PendingEntry {
                    kind: helmet_protocol::CommandKind::Capture,
                    issued_at: 0,
                    deadline: 1500,
                    waiting: ["p1".to_string()].into_iter().collect(),
                    responses: Default::default(),
                },
            );
        }
        clock.advance_ms(100);
        process_response(&state, &clock, &ok_response(1, "p1")).await;
        process_response(&state, &clock, &ok_response(1, "p1")).await;

        let s = state.read().await;
        assert_eq!(s.peer_stats["p1"].ok, 1);
        assert!(!s.pending.contains_key(&1));
    }

    #[tokio::test]
    async fn unknown_id_is_dropped() {
        let state = make_state(&["p1"]);
        let clock = FakeClock::new();
        process_response(&state, &clock, &ok_response(99, "p1")).await;
        let s = state.read().await;
        assert_eq!(s.peer_stats["p1"].total_commands, 0);
    }
}
