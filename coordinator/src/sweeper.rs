//! Timeout Sweeper (§4.4). Periodic pass over Pending; turns deadline-exceeded
//! entries into per-peer timeout counts and evicts them.

use std::sync::Arc;
use std::time::Duration;

use helmet_protocol::CommandId;
use tokio::sync::watch;

use crate::clock::Clock;
use crate::pending::{PeerStatus, SharedState};

pub async fn run_sweeper(
    state: SharedState,
    clock: Arc<dyn Clock>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
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
        sweep_once(&state, clock.as_ref()).await;
    }
}

async fn sweep_once(state: &SharedState, clock: &dyn Clock) {
    let now_ms = clock.now_mono_ms();
    let mut state = state.write().await;

    let expired: Vec<CommandId> = state
        .pending
        .iter()
        .filter(|(_, e)| e.deadline <= now_ms)
        .map(|(id, _)| *id)
        .collect();

    for id in expired {
        let Some(entry) = state.pending.remove(&id) else { continue };
        let non_responders: Vec<String> = entry.waiting.into_iter().collect();
        for peer in &non_responders {
            {
                let stats = state.peer_stats.entry(peer.clone()).or_default();
                stats.timed_out += 1;
                stats.status = PeerStatus::Timeout;
            }
            state.global.timeout_responses += 1;
        }
        tracing::info!("swept command {id}: non-responders = {non_responders:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::pending::{CoordinatorState, PendingEntry};
    use helmet_protocol::CommandKind;
    use tokio::sync::RwLock;

    #[tokio::test]
    async fn sweeps_expired_entries_and_counts_timeouts() {
        let peers = vec!["p1".to_string(), "p2".to_string()];
        let state = Arc::new(RwLock::new(CoordinatorState::new(&peers)));
        {
            let mut s = state.write().await;
            s.pending.insert(
                1,
                PendingEntry {
                    kind: CommandKind::Capture,
                    issued_at: 0,
                    deadline: 1500,
                    waiting: ["p2".to_string()].into_iter().collect(),
                    responses: Default::default(),
                },
            );
        }
        let clock = FakeClock::new();
        clock.advance_ms(1600);
        sweep_once(&state, &clock).await;

        let s = state.read().await;
        assert!(!s.pending.contains_key(&1));
        assert_eq!(s.peer_stats["p2"].timed_out, 1);
        assert_eq!(s.peer_stats["p2"].status, PeerStatus::Timeout);
        assert_eq!(s.global.timeout_responses, 1);
    }

    #[tokio::test]
    async fn timeout_ms_zero_times_out_on_next_pass() {
        let peers = vec!["p1".to_string()];
        let state = Arc::new(RwLock::new(CoordinatorState::new(&peers)));
        {
            let mut s = state.write().await;
            s.pending.insert(
                1,
                PendingEntry {
                    kind: CommandKind::Capture,
                    issued_at: 0,
                    deadline: 0,
                    waiting: ["p1".to_string()].into_iter().collect(),
                    responses: Default::default(),
                },
            );
        }
        let clock = FakeClock::new();
        sweep_once(&state, &clock).await;
        let s = state.read().await;
        assert!(!s.pending.contains_key(&1));
    }
}
