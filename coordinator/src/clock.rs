//! Injectable "now" so the Sweeper and Movement Detector are deterministic under test.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Monotonic milliseconds since the clock was created. Used for deadlines and cooldowns.
    fn now_mono_ms(&self) -> u64;
    /// Wall-clock nanoseconds since the Unix epoch. Used for envelope stamping and `last_seen`.
    fn now_wall_ns(&self) -> i64;
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_mono_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn now_wall_ns(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as i64
    }
}

/// Test clock with manually advanced monotonic and wall time.
pub struct FakeClock {
    mono_ms: AtomicU64,
    wall_ns: AtomicI64,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { mono_ms: AtomicU64::new(0), wall_ns: AtomicI64::new(0) }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.mono_ms.fetch_add(ms, Ordering::SeqCst);
        self.wall_ns.fetch_add((ms as i64) * 1_000_000, Ordering::SeqCst);
    }

    pub fn set_mono_ms(&self, ms: u64) {
        self.mono_ms.store(ms, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now_mono_ms(&self) -> u64 {
        self.mono_ms.load(Ordering::SeqCst)
    }

    fn now_wall_ns(&self) -> i64 {
        self.wall_ns.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances() {
        let clock = FakeClock::new();
        assert_eq!(clock.now_mono_ms(), 0);
        clock.advance_ms(1500);
        assert_eq!(clock.now_mono_ms(), 1500);
        assert_eq!(clock.now_wall_ns(), 1_500_000_000);
    }
}
