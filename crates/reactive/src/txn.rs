//! Transaction gate for source nodes.
//!
//! A source batches zero or more mutations into one transaction: one delta,
//! one notification per subscriber. The gate serializes transactions per
//! source across threads and coalesces nested same-thread transactions into
//! the outermost one, which is the only scope that commits.

use crate::content::{Content, Patch};
use crate::producer::ProducerCore;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use sluice_core::Result;
use std::cell::{Cell, RefCell};
use std::sync::Arc;

pub(crate) struct GateState<C: Content> {
    depth: Cell<usize>,
    batched: Cell<bool>,
    staged: RefCell<Option<C>>,
    pending: RefCell<C::Patch>,
}

/// Per-source transaction gate. Reentrant on one thread, exclusive across
/// threads.
pub(crate) struct TxnGate<C: Content> {
    inner: ReentrantMutex<GateState<C>>,
}

impl<C: Content> TxnGate<C> {
    pub(crate) fn new() -> Self {
        Self {
            inner: ReentrantMutex::new(GateState {
                depth: Cell::new(0),
                batched: Cell::new(true),
                staged: RefCell::new(None),
                pending: RefCell::new(C::Patch::empty()),
            }),
        }
    }

    /// Opens a transaction scope. The outermost scope on a thread stages a
    /// working copy of the current content and decides the batching mode;
    /// nested scopes join it.
    pub(crate) fn enter<'a>(
        &'a self,
        core: &Arc<ProducerCore<C>>,
        batched: bool,
    ) -> TxnScope<'a, C> {
        let guard = self.inner.lock();
        let depth = guard.depth.get();
        guard.depth.set(depth + 1);
        if depth == 0 {
            guard.batched.set(batched);
            *guard.staged.borrow_mut() = Some((*core.snapshot()).clone());
            *guard.pending.borrow_mut() = C::Patch::empty();
        }
        TxnScope {
            guard,
            core: Arc::clone(core),
            outermost: depth == 0,
        }
    }
}

/// An open transaction. Dropping the outermost scope commits whatever is
/// pending; `commit` does the same but surfaces the result.
pub(crate) struct TxnScope<'a, C: Content> {
    guard: ReentrantMutexGuard<'a, GateState<C>>,
    core: Arc<ProducerCore<C>>,
    outermost: bool,
}

impl<'a, C: Content> TxnScope<'a, C> {
    /// Runs a mutation against the staged content and pending delta. In
    /// unbatched mode every mutation commits immediately.
    pub(crate) fn mutate<R>(
        &self,
        f: impl FnOnce(&mut C, &mut C::Patch) -> Result<R>,
    ) -> Result<R> {
        let result = {
            let mut staged = self.guard.staged.borrow_mut();
            let staged = staged
                .as_mut()
                .expect("open transaction always has staged content");
            let mut pending = self.guard.pending.borrow_mut();
            f(staged, &mut pending)?
        };
        if !self.guard.batched.get() {
            self.flush()?;
        }
        Ok(result)
    }

    /// Reads from the staged content.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        let staged = self.guard.staged.borrow();
        f(staged
            .as_ref()
            .expect("open transaction always has staged content"))
    }

    /// Commits the pending delta now. On a nested scope this is a no-op;
    /// the outermost scope owns the commit.
    pub(crate) fn commit(self) -> Result<()> {
        if self.outermost {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let delta = core::mem::replace(&mut *self.guard.pending.borrow_mut(), C::Patch::empty());
        if !delta.is_empty() {
            self.core.commit(delta)?;
        }
        Ok(())
    }
}

impl<'a, C: Content> Drop for TxnScope<'a, C> {
    fn drop(&mut self) {
        let depth = self.guard.depth.get() - 1;
        self.guard.depth.set(depth);
        if self.outermost {
            debug_assert_eq!(depth, 0, "outermost scope closes last");
            self.guard.staged.borrow_mut().take();
            let delta =
                core::mem::replace(&mut *self.guard.pending.borrow_mut(), C::Patch::empty());
            if !delta.is_empty() {
                if let Err(error) = self.core.commit(delta) {
                    tracing::error!(node = %self.core.label(), %error, "transaction commit failed");
                }
            }
        }
    }
}
