//! Lamport logical clock carried by every message.

/// A Lamport logical clock for ordering events across nodes.
///
/// The value never decreases. Local events and outbound messages call
/// [`tick`](Self::tick); every inbound clock value is folded in with
/// [`update`](Self::update) before the next tick.
///
/// # Example
///
/// ```rust
/// use board_proto::LamportClock;
///
/// let mut clock = LamportClock::new();
/// clock.tick();
/// clock.tick();
/// assert_eq!(clock.value(), 2);
///
/// // Receiving a message stamped 7 only raises the floor.
/// assert_eq!(clock.update(7), 7);
/// assert_eq!(clock.tick(), 8);
///
/// // An older remote value never moves the clock backwards.
/// assert_eq!(clock.update(3), 8);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LamportClock {
    value: u64,
}

impl LamportClock {
    /// Creates a new clock initialized to 0.
    #[must_use]
    pub const fn new() -> Self {
        Self { value: 0 }
    }

    /// Creates a clock with a specific initial value.
    #[must_use]
    pub const fn with_value(value: u64) -> Self {
        Self { value }
    }

    /// Returns the current clock value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Increments the clock for a local event and returns the new value.
    pub fn tick(&mut self) -> u64 {
        self.value += 1;
        self.value
    }

    /// Folds a remote clock value in: `max(self, remote)`.
    ///
    /// Unlike a merge-and-advance, this does not tick; callers tick
    /// separately when they produce the next outbound message.
    pub fn update(&mut self, remote: u64) -> u64 {
        self.value = self.value.max(remote);
        self.value
    }
}
