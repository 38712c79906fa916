//! Consumer-side subscription handle.

use crate::content::Content;
use crate::producer::{ObserverHook, ObserverId, ProducerCore, ProducerState};
use crate::state::State;
use sluice_core::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The per-subscription object through which a consumer pulls state.
///
/// Each transaction on the producer is observed exactly once: a notified
/// `get_state` drains the pending delta; reading again without an
/// intervening notification returns the same status with no delta and
/// mutates nothing. Dropping the observer detaches it; a notification
/// racing the disposal is a no-op.
pub struct Observer<C: Content> {
    producer: Arc<ProducerCore<C>>,
    hook: Arc<ObserverHook>,
    id: ObserverId,
    detached: AtomicBool,
}

impl<C: Content> Observer<C> {
    pub(crate) fn attach(
        producer: Arc<ProducerCore<C>>,
        hook: Arc<ObserverHook>,
        id: ObserverId,
    ) -> Self {
        Self {
            producer,
            hook,
            id,
            detached: AtomicBool::new(false),
        }
    }

    /// The producer this observer is subscribed to.
    #[inline]
    pub fn producer(&self) -> &Arc<ProducerCore<C>> {
        &self.producer
    }

    /// Returns true if a change is pending since the last read.
    pub fn is_notified(&self) -> bool {
        self.hook.signal.is_notified()
    }

    /// Pulls the latest state, acquiring the producer's lock.
    ///
    /// Takes an upgradable read; only a pending notification (or a pending
    /// post-read transition such as `Completing` to `Completed`) upgrades
    /// to a write to drain the outbox, then downgrades before returning.
    pub fn get_state(&self) -> Result<State<C>> {
        if self.detached.load(Ordering::Acquire) {
            return Err(Error::Detached);
        }
        let guard = self.producer.lock().upgradable();
        if self.hook.signal.is_notified() || guard.needs_advance(self.id) {
            let mut write = guard.upgrade();
            let state = self.pull(&mut write);
            let _read = write.downgrade();
            state
        } else {
            guard.peek_outbox(self.id)
        }
    }

    /// Pulls the latest state through an already-held write guard on the
    /// producer's state; used together with composite lock acquisition
    /// when a node reads several producers as one consistent step.
    pub fn get_state_in(&self, state: &mut ProducerState<C>) -> Result<State<C>> {
        if self.detached.load(Ordering::Acquire) {
            return Err(Error::Detached);
        }
        self.pull(state)
    }

    fn pull(&self, state: &mut ProducerState<C>) -> Result<State<C>> {
        let mut out = Err(Error::Detached);
        self.hook.signal.process(|_notified| {
            out = state.drain_outbox(self.id);
        });
        out
    }

    /// Detaches from the producer. Idempotent; also runs on drop.
    pub fn detach(&self) {
        if !self.detached.swap(true, Ordering::AcqRel) {
            self.producer.detach(self.id);
        }
    }
}

impl<C: Content> Drop for Observer<C> {
    fn drop(&mut self) {
        self.detach();
    }
}
