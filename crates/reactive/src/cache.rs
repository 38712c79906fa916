//! Authoritative materialized state for one node.

use crate::content::{Content, Patch};
use sluice_core::{Error, Result, Status, Timestamp};
use std::sync::Arc;

/// Owns a node's authoritative current content plus its lifecycle status
/// and high-water transaction stamp.
///
/// Content is kept behind an `Arc` and mutated copy-on-write: snapshots
/// already handed to subscribers are never touched by later transactions.
#[derive(Debug)]
pub struct StateCache<C: Content> {
    content: Arc<C>,
    status: Status,
    last_updated: Timestamp,
}

impl<C: Content> StateCache<C> {
    /// Creates a cache holding `initial`, in the `Connecting` state.
    pub fn new(initial: C) -> Self {
        Self {
            content: Arc::new(initial),
            status: Status::Connecting,
            last_updated: Timestamp::ZERO,
        }
    }

    /// Current lifecycle status.
    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }

    /// High-water mark of contributing transaction stamps.
    #[inline]
    pub fn last_updated(&self) -> Timestamp {
        self.last_updated
    }

    /// Borrow of the current content.
    #[inline]
    pub fn content(&self) -> &C {
        &self.content
    }

    /// A shareable snapshot of the current content, safe to hand out.
    pub fn snapshot(&self) -> Arc<C> {
        Arc::clone(&self.content)
    }

    /// Folds one produced state into the cache.
    ///
    /// `Connecting`/`Reconnecting` replace the content wholesale (and
    /// require `full`); `Connected`/`Completing` apply `delta` in place.
    /// Illegal transitions and malformed deltas are fatal. `last_updated`
    /// only ever moves forward.
    pub fn add_state(
        &mut self,
        status: Status,
        full: Option<C>,
        delta: Option<&C::Patch>,
        at: Timestamp,
    ) -> Result<()> {
        if !self.status.can_transition_to(status) {
            return Err(Error::invalid_transition(self.status, status));
        }
        if status.carries_content() {
            let full = full.ok_or(Error::MissingContent(status))?;
            self.content = Arc::new(full);
        } else if status.carries_delta() {
            if let Some(delta) = delta {
                if !delta.is_empty() {
                    Arc::make_mut(&mut self.content).apply(delta)?;
                }
            }
        }
        self.status = status;
        self.last_updated = self.last_updated.max(at);
        Ok(())
    }
}
