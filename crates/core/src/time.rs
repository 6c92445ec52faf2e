//! Time utilities for Agora
//!
//! Every ledger and governance operation is a pure function of current time
//! plus state, so time is always taken from a [`Clock`] handle rather than
//! read ambiently. Production code uses [`SystemClock`]; tests use
//! [`ManualClock`] to drive decay and proposal phase boundaries
//! deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds in an hour
pub const HOUR_MS: u64 = 60 * 60 * 1000;

/// Milliseconds in a day
pub const DAY_MS: u64 = 24 * HOUR_MS;

/// Get the current timestamp in milliseconds
pub fn timestamp_ms() -> u64 {
    let start = SystemTime::now();
    let since_epoch = start.duration_since(UNIX_EPOCH).unwrap_or(Duration::from_secs(0));
    (since_epoch.as_secs() * 1000) + (since_epoch.subsec_nanos() as u64 / 1_000_000)
}

/// A source of the current time, in epoch milliseconds
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;
}

/// Wall-clock time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        timestamp_ms()
    }
}

/// A manually-driven time source for tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock fixed at the given epoch-millisecond timestamp
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    /// Set the current time
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Advance the current time by the given number of milliseconds
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
