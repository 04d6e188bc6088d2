//! Node-local clocks: the shared Lamport counter and the physical offset.

use board_proto::LamportClock;
use parking_lot::Mutex;
use std::sync::Arc;

/// Current wall-clock time in seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Lamport clock shared by the request loop and every background task.
///
/// Each operation takes the lock only for the read-modify-write itself.
#[derive(Debug, Clone, Default)]
pub struct SharedClock(Arc<Mutex<LamportClock>>);

impl SharedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new value.
    pub fn tick(&self) -> u64 {
        self.0.lock().tick()
    }

    /// Fold in a remote value (`max`, no increment).
    pub fn update(&self, remote: u64) -> u64 {
        self.0.lock().update(remote)
    }

    /// Fold in the clock carried by an inbound message, if any.
    pub fn observe(&self, remote: Option<u64>) {
        if let Some(remote) = remote {
            self.update(remote);
        }
    }

    pub fn value(&self) -> u64 {
        self.0.lock().value()
    }
}

/// Estimated skew between local physical time and the coordinator's.
#[derive(Debug, Clone, Default)]
pub struct ClockOffset(Arc<Mutex<f64>>);

impl ClockOffset {
    pub fn get(&self) -> f64 {
        *self.0.lock()
    }

    pub fn set(&self, offset: f64) {
        *self.0.lock() = offset;
        crate::metrics::set_clock_offset(offset);
    }

    /// Local time corrected by the stored offset, as answered to `clock` queries.
    pub fn adjusted_now(&self) -> f64 {
        unix_now() + self.get()
    }
}
