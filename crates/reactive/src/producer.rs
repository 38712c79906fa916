//! Producer-side node substrate.
//!
//! A `ProducerCore` is the shared half of every node that emits states:
//! sources wrap one directly, derived nodes (operators) pair one with
//! observers of their upstreams. It owns the authoritative `StateCache`,
//! the registry of subscribed observers, and the commit discipline:
//! mutate the cache and every live observer's outbox under the write lock,
//! release, then raise change signals and run callbacks — at most one
//! wake-up per observer per transaction.
//!
//! The producer holds only weak references to observers; a notification
//! racing a disposal is a benign no-op.

use crate::cache::StateCache;
use crate::content::{Content, Patch};
use crate::observer::Observer;
use crate::sink::{EventSink, NodeEvent};
use crate::state::State;
use parking_lot::Mutex;
use sluice_core::{Clock, Error, Result, Status, Timestamp};
use sluice_sync::{ChangeSignal, StateLock};
use std::sync::{Arc, Weak};

/// Identifier of one observer registration on one producer.
pub type ObserverId = u64;

/// Signal and callback shared between a producer slot and its observer.
pub(crate) struct ObserverHook {
    pub(crate) signal: ChangeSignal,
    pub(crate) on_changed: Box<dyn Fn() + Send + Sync>,
}

/// Per-observer pending state, filled by commits and drained by reads.
struct Outbox<C: Content> {
    status: Status,
    full: Option<Arc<C>>,
    delta: Option<C::Patch>,
    last_updated: Timestamp,
    /// Whether the current status has been read at least once.
    seen: bool,
    /// Producer completed while the initial snapshot was still unread; the
    /// reads after the first walk `Completing` then `Completed`.
    closing: bool,
}

struct ObserverSlot<C: Content> {
    id: ObserverId,
    hook: Weak<ObserverHook>,
    outbox: Outbox<C>,
}

impl<C: Content> ObserverSlot<C> {
    fn push_delta(&mut self, delta: &C::Patch, snap: &Arc<C>, at: Timestamp) -> Result<()> {
        let ob = &mut self.outbox;
        match ob.status {
            Status::Disconnecting | Status::Completing | Status::Completed => {}
            Status::Connecting | Status::Reconnecting if !ob.seen => {
                // Unread snapshot: fold the change into the pending full
                // content so the first read is already current.
                ob.full = Some(Arc::clone(snap));
                ob.last_updated = at;
            }
            _ => {
                ob.status = Status::Connected;
                ob.full = None;
                match &mut ob.delta {
                    Some(acc) => acc.merge(delta.clone())?,
                    None => ob.delta = Some(delta.clone()),
                }
                ob.last_updated = at;
            }
        }
        Ok(())
    }

    fn push_replace(&mut self, snap: &Arc<C>, at: Timestamp) {
        let ob = &mut self.outbox;
        match ob.status {
            Status::Disconnecting | Status::Completing | Status::Completed => {}
            Status::Connecting if !ob.seen => {
                ob.full = Some(Arc::clone(snap));
                ob.delta = None;
                ob.last_updated = at;
            }
            _ => {
                ob.status = Status::Reconnecting;
                ob.seen = false;
                ob.full = Some(Arc::clone(snap));
                ob.delta = None;
                ob.last_updated = at;
            }
        }
    }

    fn push_complete(
        &mut self,
        trailing: Option<&C::Patch>,
        snap: &Arc<C>,
        at: Timestamp,
    ) -> Result<()> {
        let ob = &mut self.outbox;
        match ob.status {
            Status::Completing | Status::Completed => {}
            Status::Connecting | Status::Reconnecting if !ob.seen => {
                // The unread snapshot already reflects the trailing delta.
                ob.closing = true;
                ob.full = Some(Arc::clone(snap));
                ob.delta = None;
                ob.last_updated = at;
            }
            _ => {
                ob.status = Status::Completing;
                ob.seen = false;
                ob.full = None;
                if let Some(trailing) = trailing {
                    match &mut ob.delta {
                        Some(acc) => acc.merge(trailing.clone())?,
                        None => ob.delta = Some(trailing.clone()),
                    }
                }
                ob.last_updated = at;
            }
        }
        Ok(())
    }
}

/// Lock-protected interior of a producer: cache plus observer registry.
pub struct ProducerState<C: Content> {
    cache: StateCache<C>,
    observers: Vec<ObserverSlot<C>>,
    next_observer: ObserverId,
}

impl<C: Content> ProducerState<C> {
    /// Reads an observer's pending state without consuming anything.
    pub(crate) fn peek_outbox(&self, id: ObserverId) -> Result<State<C>> {
        let slot = self
            .observers
            .iter()
            .find(|s| s.id == id)
            .ok_or(Error::Detached)?;
        let ob = &slot.outbox;
        Ok(State {
            status: ob.status,
            delta: None,
            content: if ob.status.carries_content() {
                ob.full.clone()
            } else {
                None
            },
            last_updated: ob.last_updated,
        })
    }

    /// Drains an observer's outbox: returns the pending state, marks it
    /// read, and advances the post-read transitions (`Reconnecting` to
    /// `Connected`, `Completing` to `Completed`, and the closing walk).
    pub(crate) fn drain_outbox(&mut self, id: ObserverId) -> Result<State<C>> {
        let slot = self
            .observers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(Error::Detached)?;
        let ob = &mut slot.outbox;
        let status = ob.status;
        let state = State {
            status,
            delta: ob.delta.take(),
            content: if status.carries_content() {
                ob.full.clone()
            } else {
                None
            },
            last_updated: ob.last_updated,
        };
        ob.seen = true;
        match status {
            Status::Connecting | Status::Reconnecting if ob.closing => {
                ob.status = Status::Completing;
                ob.full = None;
            }
            Status::Reconnecting => {
                ob.status = Status::Connected;
                ob.full = None;
            }
            Status::Completing => {
                ob.status = Status::Completed;
                ob.full = None;
            }
            _ => {}
        }
        Ok(state)
    }

    /// True if the observer has a post-read transition pending even without
    /// a fresh notification.
    pub(crate) fn needs_advance(&self, id: ObserverId) -> bool {
        self.observers
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.outbox.status == Status::Completing)
            .unwrap_or(false)
    }
}

/// The reusable producer half of a node.
pub struct ProducerCore<C: Content> {
    label: String,
    clock: Arc<Clock>,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
    state: StateLock<ProducerState<C>>,
}

impl<C: Content> ProducerCore<C> {
    /// Creates a producer holding `initial` content.
    pub fn new(clock: Arc<Clock>, label: impl Into<String>, initial: C) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            clock,
            sink: Mutex::new(None),
            state: StateLock::new(ProducerState {
                cache: StateCache::new(initial),
                observers: Vec::new(),
                next_observer: 1,
            }),
        })
    }

    /// Name used in events and traces.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The engine clock this producer stamps transactions from.
    #[inline]
    pub fn clock(&self) -> &Arc<Clock> {
        &self.clock
    }

    /// The lock guarding this producer's state, exposed for composite
    /// acquisition across multiple producers.
    #[inline]
    pub fn lock(&self) -> &StateLock<ProducerState<C>> {
        &self.state
    }

    /// Injects an event sink. Events are dropped until one is attached.
    pub fn attach_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.lock() = Some(sink);
    }

    /// Shareable snapshot of the current content.
    pub fn snapshot(&self) -> Arc<C> {
        self.state.read().cache.snapshot()
    }

    /// Current producer-side lifecycle status.
    pub fn status(&self) -> Status {
        self.state.read().cache.status()
    }

    /// High-water transaction stamp.
    pub fn last_updated(&self) -> Timestamp {
        self.state.read().cache.last_updated()
    }

    /// Registers a new observer. Its first read always yields `Connecting`
    /// with the full current content; `on_changed` fires at most once per
    /// later transaction until the observer is drained again.
    pub fn create_observer<F>(self: &Arc<Self>, on_changed: F) -> Observer<C>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let hook = Arc::new(ObserverHook {
            signal: ChangeSignal::new(),
            on_changed: Box::new(on_changed),
        });
        let id = {
            let mut st = self.state.write();
            let id = st.next_observer;
            st.next_observer += 1;
            let closing = matches!(
                st.cache.status(),
                Status::Disconnecting | Status::Completing | Status::Completed
            );
            let outbox = Outbox {
                status: Status::Connecting,
                full: Some(st.cache.snapshot()),
                delta: None,
                last_updated: st.cache.last_updated(),
                seen: false,
                closing,
            };
            st.observers.push(ObserverSlot {
                id,
                hook: Arc::downgrade(&hook),
                outbox,
            });
            id
        };
        hook.signal.notify();
        self.emit(NodeEvent::ObserverAttached {
            node: self.label.clone(),
        });
        Observer::attach(Arc::clone(self), hook, id)
    }

    /// Commits a delta as one transaction stamped from the clock.
    pub fn commit(&self, delta: C::Patch) -> Result<Timestamp> {
        let at = self.clock.tick();
        self.commit_at(delta, at)
    }

    /// Commits a delta with a caller-provided stamp (derived nodes pass the
    /// maximum of their upstream stamps). An empty delta is a no-op and
    /// notifies nobody.
    pub fn commit_at(&self, delta: C::Patch, at: Timestamp) -> Result<Timestamp> {
        if delta.is_empty() {
            return Ok(self.state.read().cache.last_updated());
        }
        let mut wake = Vec::new();
        {
            let mut st = self.state.write();
            st.cache.add_state(Status::Connected, None, Some(&delta), at)?;
            let snap = st.cache.snapshot();
            st.observers.retain(|slot| slot.hook.strong_count() > 0);
            for slot in &mut st.observers {
                let Some(hook) = slot.hook.upgrade() else {
                    continue;
                };
                slot.push_delta(&delta, &snap, at)?;
                if hook.signal.notify() {
                    wake.push(hook);
                }
            }
        }
        tracing::trace!(node = %self.label, at = at.raw(), "commit");
        self.emit(NodeEvent::Committed {
            node: self.label.clone(),
            at,
        });
        for hook in wake {
            (hook.on_changed)();
        }
        Ok(at)
    }

    /// Replaces the backing content wholesale; subscribers observe
    /// `Reconnecting` with the new content.
    pub fn replace(&self, content: C) -> Result<Timestamp> {
        let at = self.clock.tick();
        self.replace_at(content, at)
    }

    /// `replace` with a caller-provided stamp.
    pub fn replace_at(&self, content: C, at: Timestamp) -> Result<Timestamp> {
        let mut wake = Vec::new();
        {
            let mut st = self.state.write();
            st.cache
                .add_state(Status::Reconnecting, Some(content), None, at)?;
            let snap = st.cache.snapshot();
            st.observers.retain(|slot| slot.hook.strong_count() > 0);
            for slot in &mut st.observers {
                let Some(hook) = slot.hook.upgrade() else {
                    continue;
                };
                slot.push_replace(&snap, at);
                if hook.signal.notify() {
                    wake.push(hook);
                }
            }
        }
        tracing::trace!(node = %self.label, at = at.raw(), "replace");
        self.emit(NodeEvent::Replaced {
            node: self.label.clone(),
            at,
        });
        for hook in wake {
            (hook.on_changed)();
        }
        Ok(at)
    }

    /// Seeds initial content while still `Connecting`, without notifying.
    /// Derived nodes use this for the state pulled from their upstream's
    /// own `Connecting` read.
    pub fn seed_at(&self, content: C, at: Timestamp) -> Result<()> {
        let mut st = self.state.write();
        st.cache
            .add_state(Status::Connecting, Some(content), None, at)?;
        let snap = st.cache.snapshot();
        for slot in &mut st.observers {
            let ob = &mut slot.outbox;
            if !ob.seen && ob.status == Status::Connecting {
                ob.full = Some(Arc::clone(&snap));
                ob.last_updated = at;
            }
        }
        Ok(())
    }

    /// Shuts the producer down: `Disconnecting`, then `Completing` carrying
    /// the trailing delta, then terminal `Completed`. Each subscriber's
    /// remaining reads walk the same tail.
    pub fn complete(&self, trailing: Option<C::Patch>) -> Result<Timestamp> {
        let at = self.clock.tick();
        let mut wake = Vec::new();
        {
            let mut st = self.state.write();
            st.cache.add_state(Status::Disconnecting, None, None, at)?;
            st.cache
                .add_state(Status::Completing, None, trailing.as_ref(), at)?;
            st.cache.add_state(Status::Completed, None, None, at)?;
            let snap = st.cache.snapshot();
            st.observers.retain(|slot| slot.hook.strong_count() > 0);
            for slot in &mut st.observers {
                let Some(hook) = slot.hook.upgrade() else {
                    continue;
                };
                slot.push_complete(trailing.as_ref(), &snap, at)?;
                if hook.signal.notify() {
                    wake.push(hook);
                }
            }
        }
        tracing::trace!(node = %self.label, at = at.raw(), "complete");
        self.emit(NodeEvent::Completed {
            node: self.label.clone(),
            at,
        });
        for hook in wake {
            (hook.on_changed)();
        }
        Ok(at)
    }

    pub(crate) fn detach(&self, id: ObserverId) {
        let removed = {
            let mut st = self.state.write();
            let before = st.observers.len();
            st.observers.retain(|s| s.id != id);
            before != st.observers.len()
        };
        if removed {
            self.emit(NodeEvent::ObserverDetached {
                node: self.label.clone(),
            });
        }
    }

    fn emit(&self, event: NodeEvent) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.record(event);
        }
    }
}
