//! Deltas over keyed maps.
//!
//! A `MapDelta` carries inserted and deleted `(key, value)` pairs. An
//! update is represented canonically as a delete of the old pair plus an
//! insert of the new pair sharing the key; at most one delete and one
//! insert per key survive canonicalization.

use hashbrown::HashMap;
use sluice_core::{Error, Result};

/// A delta over a keyed map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapDelta<K, V> {
    /// Pairs inserted since the previous state.
    pub inserts: Vec<(K, V)>,
    /// Pairs deleted since the previous state, carrying the pre-delta value.
    pub deletes: Vec<(K, V)>,
}

impl<K, V> MapDelta<K, V> {
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
}

impl<K: PartialEq, V: PartialEq> MapDelta<K, V> {
    /// Records an insertion of a key not present in the pre-delta map.
    pub fn insert(&mut self, key: K, value: V) {
        debug_assert!(
            !self.inserts.iter().any(|(k, _)| *k == key),
            "duplicate insert for one key in a single delta"
        );
        self.inserts.push((key, value));
    }

    /// Records a deletion, carrying the value being removed.
    ///
    /// A delete of a key with a pending insert cancels the insert; if the
    /// key also carries a pending delete, that earlier delete stands (the
    /// update collapses back to a plain delete of the original value).
    pub fn delete(&mut self, key: K, value: V) {
        if let Some(pos) = self.inserts.iter().position(|(k, _)| *k == key) {
            let (_, pending) = self.inserts.remove(pos);
            debug_assert!(pending == value, "delete does not match pending insert");
        } else {
            self.deletes.push((key, value));
        }
    }

    /// Records replacement of `old` by `new` under one key.
    pub fn update(&mut self, key: K, old: V, new: V)
    where
        K: Clone,
    {
        self.delete(key.clone(), old);
        self.insert(key, new);
    }

    /// Folds a chronologically later delta into this one.
    pub fn merge(&mut self, later: MapDelta<K, V>) {
        for (k, v) in later.deletes {
            self.delete(k, v);
        }
        for (k, v) in later.inserts {
            self.insert(k, v);
        }
    }
}

impl<K, V> MapDelta<K, V>
where
    K: Clone + Eq + core::hash::Hash,
    V: Clone + PartialEq,
{
    /// Applies the delta to a map. Deletes verify presence and value
    /// equality; inserts verify absence. Any mismatch is fatal.
    pub fn apply_to(&self, target: &mut HashMap<K, V>) -> Result<()> {
        for (k, expected) in &self.deletes {
            match target.remove(k) {
                Some(old) if old == *expected => {}
                Some(_) => {
                    return Err(Error::mismatch(0, "deleted value does not match map entry"));
                }
                None => {
                    return Err(Error::mismatch(0, "deleted key not present in map"));
                }
            }
        }
        for (k, v) in &self.inserts {
            if target.insert(k.clone(), v.clone()).is_some() {
                return Err(Error::mismatch(0, "inserted key already present in map"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_is_delete_plus_insert() {
        let mut delta = MapDelta::new();
        delta.update("a", 1, 2);
        assert_eq!(delta.deletes, vec![("a", 1)]);
        assert_eq!(delta.inserts, vec![("a", 2)]);
    }

    #[test]
    fn test_insert_then_delete_cancels() {
        let mut delta = MapDelta::new();
        delta.insert("a", 1);
        delta.delete("a", 1);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_update_then_delete_collapses() {
        let mut delta = MapDelta::new();
        delta.update("a", 1, 2);
        delta.delete("a", 2);
        assert_eq!(delta.deletes, vec![("a", 1)]);
        assert!(delta.inserts.is_empty());
    }

    #[test]
    fn test_merge_chains_updates() {
        let mut first = MapDelta::new();
        first.update("a", 1, 2);

        let mut second = MapDelta::new();
        second.update("a", 2, 3);

        first.merge(second);
        assert_eq!(first.deletes, vec![("a", 1)]);
        assert_eq!(first.inserts, vec![("a", 3)]);
    }

    #[test]
    fn test_apply() {
        let mut map: HashMap<&str, i32> = HashMap::new();
        map.insert("a", 1);
        map.insert("b", 2);

        let mut delta = MapDelta::new();
        delta.delete("a", 1);
        delta.insert("c", 3);

        delta.apply_to(&mut map).unwrap();
        assert_eq!(map.get("a"), None);
        assert_eq!(map.get("b"), Some(&2));
        assert_eq!(map.get("c"), Some(&3));
    }

    #[test]
    fn test_apply_mismatches() {
        let mut map: HashMap<&str, i32> = HashMap::new();
        map.insert("a", 1);

        let mut stale = MapDelta::new();
        stale.delete("a", 99);
        assert!(stale.apply_to(&mut map.clone()).is_err());

        let mut missing = MapDelta::new();
        missing.delete("zz", 1);
        assert!(missing.apply_to(&mut map.clone()).is_err());

        let mut dup = MapDelta::new();
        dup.insert("a", 2);
        assert!(dup.apply_to(&mut map).is_err());
    }
}
