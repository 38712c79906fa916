//! Scoped reader/writer/upgradable locking for node state.
//!
//! Every producer node guards its cached state with a `StateLock`. The
//! common consumer pattern is: acquire an upgradable read, check the
//! notification flag, upgrade to apply a pending delta, downgrade back to a
//! plain read before handing out a snapshot. Upgrade and downgrade are
//! atomic (no release/reacquire gap), which is what makes the pattern safe
//! under contention.
//!
//! Nodes with several upstream producers acquire all involved locks as one
//! composite in ascending rank order, so no two nodes ever contend in
//! opposite orders. Acquisition blocks; there are no timeouts and no
//! deadlock detection.

use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::{
    RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard,
};

/// Global rank counter for lock-ordering.
static NEXT_RANK: AtomicU64 = AtomicU64::new(1);

/// A reader/writer/upgradable lock with a process-unique acquisition rank.
#[derive(Debug)]
pub struct StateLock<T> {
    rank: u64,
    inner: RwLock<T>,
}

impl<T> StateLock<T> {
    /// Creates a new lock around `value`.
    pub fn new(value: T) -> Self {
        Self {
            rank: NEXT_RANK.fetch_add(1, Ordering::Relaxed),
            inner: RwLock::new(value),
        }
    }

    /// The rank used for composite ordering. Ranks are unique per process.
    #[inline]
    pub fn rank(&self) -> u64 {
        self.rank
    }

    /// Acquires a shared read hold. Blocks only against writers.
    pub fn read(&self) -> ReadGuard<'_, T> {
        ReadGuard(self.inner.read())
    }

    /// Acquires an exclusive write hold. Blocks against everyone.
    pub fn write(&self) -> WriteGuard<'_, T> {
        WriteGuard(self.inner.write())
    }

    /// Acquires an upgradable read hold. Blocks against writers and other
    /// upgradable holders, but not plain readers.
    pub fn upgradable(&self) -> UpgradableGuard<'_, T> {
        UpgradableGuard(self.inner.upgradable_read())
    }
}

/// Shared read hold; released on drop.
pub struct ReadGuard<'a, T>(RwLockReadGuard<'a, T>);

/// Exclusive write hold; released on drop.
pub struct WriteGuard<'a, T>(RwLockWriteGuard<'a, T>);

/// Upgradable read hold; released on drop.
pub struct UpgradableGuard<'a, T>(RwLockUpgradableReadGuard<'a, T>);

impl<'a, T> WriteGuard<'a, T> {
    /// Atomically converts this write hold into a shared read hold.
    pub fn downgrade(self) -> ReadGuard<'a, T> {
        ReadGuard(RwLockWriteGuard::downgrade(self.0))
    }
}

impl<'a, T> UpgradableGuard<'a, T> {
    /// Atomically converts this hold into an exclusive write hold.
    pub fn upgrade(self) -> WriteGuard<'a, T> {
        WriteGuard(RwLockUpgradableReadGuard::upgrade(self.0))
    }

    /// Atomically converts this hold into a shared read hold.
    pub fn downgrade(self) -> ReadGuard<'a, T> {
        ReadGuard(RwLockUpgradableReadGuard::downgrade(self.0))
    }
}

impl<T> core::ops::Deref for ReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> core::ops::Deref for WriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> core::ops::DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> core::ops::Deref for UpgradableGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

/// Acquires read holds on two locks in rank order; guards are returned in
/// argument order.
pub fn read_pair<'a, 'b, A, B>(
    a: &'a StateLock<A>,
    b: &'b StateLock<B>,
) -> (ReadGuard<'a, A>, ReadGuard<'b, B>) {
    if a.rank <= b.rank {
        let ga = a.read();
        let gb = b.read();
        (ga, gb)
    } else {
        let gb = b.read();
        let ga = a.read();
        (ga, gb)
    }
}

/// Acquires upgradable holds on two locks in rank order.
pub fn upgradable_pair<'a, 'b, A, B>(
    a: &'a StateLock<A>,
    b: &'b StateLock<B>,
) -> (UpgradableGuard<'a, A>, UpgradableGuard<'b, B>) {
    if a.rank <= b.rank {
        let ga = a.upgradable();
        let gb = b.upgradable();
        (ga, gb)
    } else {
        let gb = b.upgradable();
        let ga = a.upgradable();
        (ga, gb)
    }
}

/// Acquires write holds on two locks in rank order.
pub fn write_pair<'a, 'b, A, B>(
    a: &'a StateLock<A>,
    b: &'b StateLock<B>,
) -> (WriteGuard<'a, A>, WriteGuard<'b, B>) {
    if a.rank <= b.rank {
        let ga = a.write();
        let gb = b.write();
        (ga, gb)
    } else {
        let gb = b.write();
        let ga = a.write();
        (ga, gb)
    }
}

/// Acquires read holds on a homogeneous set of locks in rank order;
/// guards are returned aligned with the input slice.
pub fn read_all<'a, T>(locks: &[&'a StateLock<T>]) -> Vec<ReadGuard<'a, T>> {
    let mut order: Vec<usize> = (0..locks.len()).collect();
    order.sort_by_key(|&i| locks[i].rank);
    let mut acquired: Vec<(usize, ReadGuard<'a, T>)> = order
        .into_iter()
        .map(|i| (i, locks[i].read()))
        .collect();
    acquired.sort_by_key(|(i, _)| *i);
    acquired.into_iter().map(|(_, g)| g).collect()
}
