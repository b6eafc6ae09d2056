//! Timing utilities for Beacon
//!
//! Every message the relay broadcasts carries a server-assigned timestamp
//! in epoch milliseconds. Timestamps are monotonically non-decreasing for
//! the life of the relay process, but not required to be unique.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Timestamp type (epoch milliseconds)
pub type Timestamp = u64;

/// Get current Unix timestamp in milliseconds
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Timestamp
}

/// Monotonically non-decreasing clock.
///
/// Wall-clock time can step backwards (NTP adjustments); broadcast
/// timestamps must not. `tick` pins each reading to the highest value
/// observed so far.
#[derive(Debug, Default)]
pub struct Clock {
    last: AtomicU64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Take a timestamp, never earlier than any previous reading.
    pub fn tick(&self) -> Timestamp {
        self.last.fetch_max(now(), Ordering::SeqCst);
        self.last.load(Ordering::SeqCst)
    }
}
