//! Source nodes: the mutable roots of a derivation graph.
//!
//! Each source owns a `ProducerCore` plus a transaction gate. Mutations go
//! through a transaction scope (`begin`), which accumulates one canonical
//! delta and commits it — with a single notification per subscriber — when
//! the outermost scope closes. The single-mutation convenience methods open
//! and commit a transaction internally, so nesting them inside an explicit
//! `begin` coalesces as expected.

use crate::content::{Bag, Seq, Table};
use crate::observer::Observer;
use crate::producer::ProducerCore;
use crate::txn::{TxnGate, TxnScope};
use sluice_core::{Clock, Error, Result};
use std::sync::Arc;

/// A mutable positional list source.
pub struct SourceSeq<T: Clone + PartialEq + Send + Sync + 'static> {
    core: Arc<ProducerCore<Seq<T>>>,
    gate: TxnGate<Seq<T>>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> SourceSeq<T> {
    /// Creates an empty list source.
    pub fn new(clock: Arc<Clock>, label: impl Into<String>) -> Self {
        Self {
            core: ProducerCore::new(clock, label, Seq::new()),
            gate: TxnGate::new(),
        }
    }

    /// Creates a list source seeded with `items`.
    pub fn with_items(clock: Arc<Clock>, label: impl Into<String>, items: Vec<T>) -> Result<Self> {
        Ok(Self {
            core: ProducerCore::new(clock, label, Seq::from_vec(items)?),
            gate: TxnGate::new(),
        })
    }

    /// The producer half, for subscribing and composite locking.
    #[inline]
    pub fn core(&self) -> &Arc<ProducerCore<Seq<T>>> {
        &self.core
    }

    /// Subscribes a new observer.
    pub fn observe<F: Fn() + Send + Sync + 'static>(&self, on_changed: F) -> Observer<Seq<T>> {
        self.core.create_observer(on_changed)
    }

    /// Opens a transaction. `batched = false` commits every mutation as its
    /// own transaction.
    pub fn begin(&self, batched: bool) -> SeqTxn<'_, T> {
        SeqTxn {
            scope: self.gate.enter(&self.core, batched),
        }
    }

    /// Inserts `value` at `at` as a single-mutation transaction.
    pub fn insert(&self, at: usize, value: T) -> Result<()> {
        let mut txn = self.begin(true);
        txn.insert(at, value)?;
        txn.commit()
    }

    /// Appends `value` as a single-mutation transaction.
    pub fn push(&self, value: T) -> Result<()> {
        let mut txn = self.begin(true);
        txn.push(value)?;
        txn.commit()
    }

    /// Removes the value at `at` as a single-mutation transaction.
    pub fn remove(&self, at: usize) -> Result<T> {
        let mut txn = self.begin(true);
        let removed = txn.remove(at)?;
        txn.commit()?;
        Ok(removed)
    }

    /// Replaces the value at `at` as a single-mutation transaction.
    pub fn update(&self, at: usize, value: T) -> Result<()> {
        let mut txn = self.begin(true);
        txn.update(at, value)?;
        txn.commit()
    }

    /// Replaces the whole list; subscribers observe `Reconnecting`.
    pub fn reset(&self, items: Vec<T>) -> Result<()> {
        self.core.replace(Seq::from_vec(items)?)?;
        Ok(())
    }

    /// Completes the source; no further mutations are accepted.
    pub fn complete(&self) -> Result<()> {
        self.core.complete(None)?;
        Ok(())
    }

    /// Shareable snapshot of the current content.
    pub fn snapshot(&self) -> Arc<Seq<T>> {
        self.core.snapshot()
    }

    /// Current content as a Vec.
    pub fn to_vec(&self) -> Vec<T> {
        self.core.snapshot().to_vec()
    }

    /// Current length.
    pub fn len(&self) -> usize {
        self.core.snapshot().len()
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An open transaction on a `SourceSeq`.
pub struct SeqTxn<'a, T: Clone + PartialEq + Send + Sync + 'static> {
    scope: TxnScope<'a, Seq<T>>,
}

impl<'a, T: Clone + PartialEq + Send + Sync + 'static> SeqTxn<'a, T> {
    /// Length of the list as staged in this transaction.
    pub fn len(&self) -> usize {
        self.scope.read(|staged| staged.len())
    }

    /// Returns true if the staged list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Staged value at `at`.
    pub fn get(&self, at: usize) -> Option<T> {
        self.scope.read(|staged| staged.get(at).cloned())
    }

    /// Inserts `value` at `at`.
    pub fn insert(&mut self, at: usize, value: T) -> Result<()> {
        self.scope.mutate(|staged, pending| {
            staged.insert(at, value.clone())?;
            pending.insert(at, vec![value]);
            Ok(())
        })
    }

    /// Appends `value`.
    pub fn push(&mut self, value: T) -> Result<()> {
        let at = self.len();
        self.insert(at, value)
    }

    /// Removes and returns the value at `at`.
    pub fn remove(&mut self, at: usize) -> Result<T> {
        self.scope.mutate(|staged, pending| {
            let removed = staged.remove_at(at)?;
            pending.delete(at, vec![removed.clone()])?;
            Ok(removed)
        })
    }

    /// Replaces the value at `at`.
    pub fn update(&mut self, at: usize, value: T) -> Result<()> {
        self.scope.mutate(|staged, pending| {
            let old = staged.remove_at(at)?;
            staged.insert(at, value.clone())?;
            pending.update(at, old, value)?;
            Ok(())
        })
    }

    /// Commits the transaction (outermost scope only; nested scopes defer).
    pub fn commit(self) -> Result<()> {
        self.scope.commit()
    }
}

/// A mutable unordered collection source.
pub struct SourceBag<T: Clone + PartialEq + Send + Sync + 'static> {
    core: Arc<ProducerCore<Bag<T>>>,
    gate: TxnGate<Bag<T>>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> SourceBag<T> {
    /// Creates an empty bag source.
    pub fn new(clock: Arc<Clock>, label: impl Into<String>) -> Self {
        Self {
            core: ProducerCore::new(clock, label, Bag::new()),
            gate: TxnGate::new(),
        }
    }

    /// Creates a bag source seeded with `items`.
    pub fn with_items(clock: Arc<Clock>, label: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            core: ProducerCore::new(clock, label, Bag(items)),
            gate: TxnGate::new(),
        }
    }

    /// The producer half, for subscribing and composite locking.
    #[inline]
    pub fn core(&self) -> &Arc<ProducerCore<Bag<T>>> {
        &self.core
    }

    /// Subscribes a new observer.
    pub fn observe<F: Fn() + Send + Sync + 'static>(&self, on_changed: F) -> Observer<Bag<T>> {
        self.core.create_observer(on_changed)
    }

    /// Opens a transaction.
    pub fn begin(&self, batched: bool) -> BagTxn<'_, T> {
        BagTxn {
            scope: self.gate.enter(&self.core, batched),
        }
    }

    /// Inserts `value` as a single-mutation transaction.
    pub fn insert(&self, value: T) -> Result<()> {
        let mut txn = self.begin(true);
        txn.insert(value)?;
        txn.commit()
    }

    /// Removes one occurrence of `value` as a single-mutation transaction.
    pub fn remove(&self, value: &T) -> Result<()> {
        let mut txn = self.begin(true);
        txn.remove(value)?;
        txn.commit()
    }

    /// Replaces the whole bag; subscribers observe `Reconnecting`.
    pub fn reset(&self, items: Vec<T>) -> Result<()> {
        self.core.replace(Bag(items))?;
        Ok(())
    }

    /// Completes the source.
    pub fn complete(&self) -> Result<()> {
        self.core.complete(None)?;
        Ok(())
    }

    /// Shareable snapshot of the current content.
    pub fn snapshot(&self) -> Arc<Bag<T>> {
        self.core.snapshot()
    }

    /// Current element count.
    pub fn len(&self) -> usize {
        self.core.snapshot().len()
    }

    /// Returns true if the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An open transaction on a `SourceBag`.
pub struct BagTxn<'a, T: Clone + PartialEq + Send + Sync + 'static> {
    scope: TxnScope<'a, Bag<T>>,
}

impl<'a, T: Clone + PartialEq + Send + Sync + 'static> BagTxn<'a, T> {
    /// Staged element count.
    pub fn len(&self) -> usize {
        self.scope.read(|staged| staged.len())
    }

    /// Returns true if the staged bag is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts `value`.
    pub fn insert(&mut self, value: T) -> Result<()> {
        self.scope.mutate(|staged, pending| {
            staged.0.push(value.clone());
            pending.insert(value);
            Ok(())
        })
    }

    /// Removes one occurrence of `value`.
    pub fn remove(&mut self, value: &T) -> Result<()> {
        self.scope.mutate(|staged, pending| {
            match staged.0.iter().position(|item| item == value) {
                Some(pos) => {
                    staged.0.swap_remove(pos);
                }
                None => {
                    return Err(Error::mismatch(0, "removed element not present in bag"));
                }
            }
            pending.delete(value.clone());
            Ok(())
        })
    }

    /// Commits the transaction (outermost scope only).
    pub fn commit(self) -> Result<()> {
        self.scope.commit()
    }
}

/// A mutable keyed map source.
pub struct SourceMap<K, V>
where
    K: Clone + Eq + core::hash::Hash + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    core: Arc<ProducerCore<Table<K, V>>>,
    gate: TxnGate<Table<K, V>>,
}

impl<K, V> SourceMap<K, V>
where
    K: Clone + Eq + core::hash::Hash + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates an empty map source.
    pub fn new(clock: Arc<Clock>, label: impl Into<String>) -> Self {
        Self {
            core: ProducerCore::new(clock, label, Table::new()),
            gate: TxnGate::new(),
        }
    }

    /// The producer half, for subscribing and composite locking.
    #[inline]
    pub fn core(&self) -> &Arc<ProducerCore<Table<K, V>>> {
        &self.core
    }

    /// Subscribes a new observer.
    pub fn observe<F: Fn() + Send + Sync + 'static>(&self, on_changed: F) -> Observer<Table<K, V>> {
        self.core.create_observer(on_changed)
    }

    /// Opens a transaction.
    pub fn begin(&self, batched: bool) -> MapTxn<'_, K, V> {
        MapTxn {
            scope: self.gate.enter(&self.core, batched),
        }
    }

    /// Inserts a fresh key as a single-mutation transaction.
    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let mut txn = self.begin(true);
        txn.insert(key, value)?;
        txn.commit()
    }

    /// Removes a key as a single-mutation transaction.
    pub fn remove(&self, key: &K) -> Result<V> {
        let mut txn = self.begin(true);
        let removed = txn.remove(key)?;
        txn.commit()?;
        Ok(removed)
    }

    /// Replaces the value under an existing key as a single-mutation
    /// transaction.
    pub fn update(&self, key: K, value: V) -> Result<V> {
        let mut txn = self.begin(true);
        let old = txn.update(key, value)?;
        txn.commit()?;
        Ok(old)
    }

    /// Completes the source.
    pub fn complete(&self) -> Result<()> {
        self.core.complete(None)?;
        Ok(())
    }

    /// Shareable snapshot of the current content.
    pub fn snapshot(&self) -> Arc<Table<K, V>> {
        self.core.snapshot()
    }

    /// Current entry count.
    pub fn len(&self) -> usize {
        self.core.snapshot().len()
    }

    /// Returns true if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An open transaction on a `SourceMap`.
pub struct MapTxn<'a, K, V>
where
    K: Clone + Eq + core::hash::Hash + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    scope: TxnScope<'a, Table<K, V>>,
}

impl<'a, K, V> MapTxn<'a, K, V>
where
    K: Clone + Eq + core::hash::Hash + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Staged entry count.
    pub fn len(&self) -> usize {
        self.scope.read(|staged| staged.len())
    }

    /// Returns true if the staged map is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Staged value for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.scope.read(|staged| staged.0.get(key).cloned())
    }

    /// Inserts a key that must not already be present.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        self.scope.mutate(|staged, pending| {
            if staged.0.contains_key(&key) {
                return Err(Error::mismatch(0, "inserted key already present in map"));
            }
            staged.0.insert(key.clone(), value.clone());
            pending.insert(key, value);
            Ok(())
        })
    }

    /// Removes a key that must be present; returns its value.
    pub fn remove(&mut self, key: &K) -> Result<V> {
        self.scope.mutate(|staged, pending| {
            let removed = staged
                .0
                .remove(key)
                .ok_or_else(|| Error::mismatch(0, "removed key not present in map"))?;
            pending.delete(key.clone(), removed.clone());
            Ok(removed)
        })
    }

    /// Replaces the value under an existing key; returns the old value.
    pub fn update(&mut self, key: K, value: V) -> Result<V> {
        self.scope.mutate(|staged, pending| {
            let old = staged
                .0
                .get(&key)
                .cloned()
                .ok_or_else(|| Error::mismatch(0, "updated key not present in map"))?;
            staged.0.insert(key.clone(), value.clone());
            pending.update(key, old.clone(), value);
            Ok(old)
        })
    }

    /// Commits the transaction (outermost scope only).
    pub fn commit(self) -> Result<()> {
        self.scope.commit()
    }
}
