//! Deltas over unordered collections.
//!
//! A `BagDelta` carries the inserted and deleted elements of a set or bag
//! between two states. Order within either sequence is not meaningful;
//! cancellation works on value equality with multiset semantics.

use sluice_core::{Error, Result};

/// A delta over an unordered collection (set or bag).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BagDelta<T> {
    /// Elements inserted since the previous state.
    pub inserts: Vec<T>,
    /// Elements deleted since the previous state.
    pub deletes: Vec<T>,
}

impl<T> BagDelta<T> {
    /// Creates an empty delta.
    pub fn new() -> Self {
        Self {
            inserts: Vec::new(),
            deletes: Vec::new(),
        }
    }

    /// Returns true if the delta describes no change.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }

    /// Total number of recorded changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.inserts.len() + self.deletes.len()
    }
}

impl<T: PartialEq> BagDelta<T> {
    /// Records an insertion. Cancels against a pending delete of an equal
    /// value: delete-then-insert of one value leaves the bag unchanged.
    pub fn insert(&mut self, item: T) {
        if let Some(pos) = self.deletes.iter().position(|d| *d == item) {
            self.deletes.remove(pos);
        } else {
            self.inserts.push(item);
        }
    }

    /// Records a deletion. Cancels against a pending insert of an equal
    /// value first.
    pub fn delete(&mut self, item: T) {
        if let Some(pos) = self.inserts.iter().position(|i| *i == item) {
            self.inserts.remove(pos);
        } else {
            self.deletes.push(item);
        }
    }

    /// Folds a chronologically later delta into this one.
    pub fn merge(&mut self, later: BagDelta<T>) {
        for item in later.deletes {
            self.delete(item);
        }
        for item in later.inserts {
            self.insert(item);
        }
    }
}

impl<T: Clone + PartialEq> BagDelta<T> {
    /// Applies the delta to an unordered collection materialized as a Vec.
    ///
    /// A delete with no matching element is an invariant violation.
    pub fn apply_to(&self, target: &mut Vec<T>) -> Result<()> {
        for item in &self.deletes {
            match target.iter().position(|t| t == item) {
                Some(pos) => {
                    target.swap_remove(pos);
                }
                None => {
                    return Err(Error::mismatch(0, "deleted element not present in bag"));
                }
            }
        }
        target.extend(self.inserts.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_delete_cancels() {
        let mut delta = BagDelta::new();
        delta.insert(1);
        delta.delete(1);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_delete_insert_cancels() {
        let mut delta = BagDelta::new();
        delta.delete(1);
        delta.insert(1);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_multiset_counts() {
        let mut delta = BagDelta::new();
        delta.insert(1);
        delta.insert(1);
        delta.delete(1);
        assert_eq!(delta.inserts, vec![1]);
        assert!(delta.deletes.is_empty());
    }

    #[test]
    fn test_merge() {
        let mut first = BagDelta::new();
        first.insert(1);
        first.insert(2);

        let mut second = BagDelta::new();
        second.delete(1);
        second.insert(3);

        first.merge(second);
        assert_eq!(first.inserts, vec![2, 3]);
        assert!(first.deletes.is_empty());
    }

    #[test]
    fn test_apply() {
        let mut delta = BagDelta::new();
        delta.delete(2);
        delta.insert(9);

        let mut bag = vec![1, 2, 3];
        delta.apply_to(&mut bag).unwrap();
        bag.sort();
        assert_eq!(bag, vec![1, 3, 9]);
    }

    #[test]
    fn test_apply_missing_delete() {
        let mut delta = BagDelta::new();
        delta.delete(42);

        let mut bag = vec![1, 2];
        assert!(delta.apply_to(&mut bag).is_err());
    }
}
