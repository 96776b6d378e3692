//! Line-Edge trigger source (§4.1): a falling edge on a pull-up, active-low
//! input line, debounced by 500 ms. Polled rather than interrupt-driven (no
//! real GPIO available), following the same sampling-loop shape as
//! `movement.rs`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::arbiter::{TriggerEvent, TriggerSource};
use crate::clock::Clock;
use crate::drivers::LineInput;

const DEBOUNCE_MS: u64 = 500;
const SAMPLE_PERIOD: Duration = Duration::from_millis(10);

/// Pure edge/debounce evaluation, factored out so it can be tested without
/// real sleeps, mirroring `movement::MovementState`.
#[derive(Default)]
pub struct EdgeState {
    last_level_high: Option<bool>,
    last_trigger_ms: Option<u64>,
}

impl EdgeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this sample is a debounced falling edge.
    pub fn observe(&mut self, level_high: bool, now_ms: u64) -> bool {
        let was_high = self.last_level_high.replace(level_high);
        let falling_edge = was_high == Some(true) && !level_high;
        if !falling_edge {
            return false;
        }
        if let Some(prev) = self.last_trigger_ms {
            if now_ms.saturating_sub(prev) < DEBOUNCE_MS {
                return false;
            }
        }
        self.last_trigger_ms = Some(now_ms);
        true
    }
}

pub async fn run_line_edge_detector(
    line: Arc<dyn LineInput>,
    clock: Arc<dyn Clock>,
    tx: mpsc::Sender<TriggerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(SAMPLE_PERIOD);
    let mut state = EdgeState::new();

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

        let level_high = match line.read().await {
            Ok(level) => level,
            Err(e) => {
                tracing::warn!("line-edge detector: read error: {e}, retrying");
                continue;
            }
        };

        if state.observe(level_high, clock.now_mono_ms()) {
            if tx.send(TriggerEvent { source: TriggerSource::LineEdge, sequence: None }).await.is_err() {
                tracing::warn!("line-edge detector: arbiter channel closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falling_edge_triggers_once_then_debounces() {
        let mut s = EdgeState::new();
        // Starts high (idle); no transition yet.
        assert!(!s.observe(true, 0));
        // Falling edge at t=0ms.
        assert!(s.observe(false, 0));
        // Second falling edge at t=200ms (within 500ms debounce, after
        // bouncing back high) is suppressed.
        assert!(!s.observe(true, 100));
        assert!(!s.observe(false, 200));
    }

    #[test]
    fn edge_after_debounce_window_triggers_again() {
        let mut s = EdgeState::new();
        assert!(!s.observe(true, 0));
        assert!(s.observe(false, 0));
        assert!(!s.observe(true, 600));
        assert!(s.observe(false, 700));
    }

    #[test]
    fn rising_edge_is_not_a_trigger() {
        let mut s = EdgeState::new();
        assert!(!s.observe(false, 0));
        assert!(!s.observe(true, 10));
    }
}
