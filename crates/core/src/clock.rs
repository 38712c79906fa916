//! Transaction clock.
//!
//! Each engine owns one `Clock`; every source it feeds stamps committed
//! transactions from it. Derived nodes propagate the maximum of the stamps
//! contributing to an emitted state, which is what keeps downstream
//! "latest wins" aggregation deterministic.

use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic transaction timestamp.
///
/// Ordered, opaque. Stamps from different `Clock` instances are not
/// comparable in any meaningful way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The zero stamp, before any transaction.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Returns the raw counter value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A shareable monotonic transaction clock.
///
/// Pass a handle (`Arc<Clock>`) explicitly to every source that commits
/// transactions; the core never consults ambient global state.
#[derive(Debug, Default)]
pub struct Clock {
    next: AtomicU64,
}

impl Clock {
    /// Creates a new clock starting at zero.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next: AtomicU64::new(0),
        })
    }

    /// Advances the clock and returns a fresh stamp.
    pub fn tick(&self) -> Timestamp {
        Timestamp(self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Returns the most recently issued stamp without advancing.
    pub fn last(&self) -> Timestamp {
        Timestamp(self.next.load(Ordering::SeqCst))
    }
}
