//! The logical timestamp shared between the animation driver and tile
//! generation.
//!
//! Writers live on the swap driver's thread, readers are whatever threads the
//! map host pulls tiles on. The value is a single `i64`, so an atomic is all
//! the synchronisation needed.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Which animation frame is current.
///
/// Nothing enforces monotonicity; a smaller value after a larger one is
/// accepted as-is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Value held before any frame has been requested.
    pub const UNSET: Timestamp = Timestamp(-1);

    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read/write access to the current timestamp.
pub trait TimeControl: Send + Sync {
    fn current_timestamp(&self) -> Timestamp;
    fn set_current_timestamp(&self, timestamp: Timestamp);
}

/// Cheaply cloneable atomic timestamp. Clones observe the same value.
#[derive(Clone, Debug)]
pub struct SharedTimestamp(Arc<AtomicI64>);

impl SharedTimestamp {
    pub fn new(initial: Timestamp) -> Self {
        Self(Arc::new(AtomicI64::new(initial.get())))
    }
}

impl Default for SharedTimestamp {
    fn default() -> Self {
        Self::new(Timestamp::UNSET)
    }
}

impl TimeControl for SharedTimestamp {
    fn current_timestamp(&self) -> Timestamp {
        Timestamp(self.0.load(Ordering::Acquire))
    }

    fn set_current_timestamp(&self, timestamp: Timestamp) {
        self.0.store(timestamp.get(), Ordering::Release);
    }
}
