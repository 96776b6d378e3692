//! Injectable "now" so the Session Grouper is deterministic under test.
//! Mirrors `coordinator::clock`; duplicated rather than shared because
//! `helmet-protocol` carries wire types only (§2.1), not runtime utilities.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now_mono_ms(&self) -> u64;
    fn now_wall_ns(&self) -> i64;
    /// Calendar date as `YYYYMMDD`, local time.
    fn today(&self) -> String;
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
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as i64
    }

    fn today(&self) -> String {
        chrono::Local::now().format("%Y%m%d").to_string()
    }
}

pub struct FakeClock {
    mono_ms: AtomicU64,
    wall_ns: AtomicI64,
    date: std::sync::Mutex<String>,
}

impl FakeClock {
    pub fn new(date: &str) -> Self {
        Self { mono_ms: AtomicU64::new(0), wall_ns: AtomicI64::new(0), date: std::sync::Mutex::new(date.to_string()) }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.mono_ms.fetch_add(ms, Ordering::SeqCst);
        self.wall_ns.fetch_add((ms as i64) * 1_000_000, Ordering::SeqCst);
    }

    pub fn set_date(&self, date: &str) {
        *self.date.lock().unwrap() = date.to_string();
    }
}

impl Clock for FakeClock {
    fn now_mono_ms(&self) -> u64 {
        self.mono_ms.load(Ordering::SeqCst)
    }

    fn now_wall_ns(&self) -> i64 {
        self.wall_ns.load(Ordering::SeqCst)
    }

    fn today(&self) -> String {
        self.date.lock().unwrap().clone()
    }
}
