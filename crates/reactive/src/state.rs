//! State snapshots handed to subscribers.

use crate::content::{Content, Patch};
use sluice_core::{Status, Timestamp};
use std::sync::Arc;

/// One pulled state of a subscription: status, the delta since the previous
/// read, and (on `Connecting`/`Reconnecting`) the full current content.
///
/// Content is shared read-only: the producer keeps the authoritative copy
/// and hands out `Arc` snapshots that are never mutated after the fact.
#[derive(Clone)]
pub struct State<C: Content> {
    /// Lifecycle status of the subscription at this read.
    pub status: Status,
    /// Incremental changes since the previous read; `None` means no change.
    pub delta: Option<C::Patch>,
    /// Full content, present exactly when `status.carries_content()`.
    pub content: Option<Arc<C>>,
    /// Maximum transaction stamp contributing to this state.
    pub last_updated: Timestamp,
}

impl<C: Content> State<C> {
    /// Returns true for the terminal state.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Takes the delta, substituting the no-op patch when none is present.
    pub fn delta_or_empty(&mut self) -> C::Patch {
        self.delta.take().unwrap_or_else(C::Patch::empty)
    }
}
