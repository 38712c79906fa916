//! Materializable content shapes and their patch types.
//!
//! A `Content` is something a node can hold as its authoritative current
//! state; its `Patch` is the delta shape that moves it from one state to
//! the next. The four shapes the engine ships match the delta algebra:
//! unordered bags, keyed tables, positional sequences, and scalars.

use hashbrown::HashMap;
use sluice_core::{Error, Result};
use sluice_delta::{BagDelta, ListDelta, MapDelta};
use sluice_index::PositionalIndex;

/// A delta that can accumulate across transactions.
pub trait Patch: Clone + Send + Sync + 'static {
    /// The no-op patch.
    fn empty() -> Self;

    /// Returns true if applying this patch changes nothing.
    fn is_empty(&self) -> bool;

    /// Folds a chronologically later patch into this one.
    fn merge(&mut self, later: Self) -> Result<()>;
}

/// A shape a node can materialize and patch in place.
pub trait Content: Clone + Send + Sync + 'static {
    /// The delta type that moves this content between states.
    type Patch: Patch;

    /// Applies a patch in place. A mismatch is a fatal invariant violation.
    fn apply(&mut self, patch: &Self::Patch) -> Result<()>;
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Patch for BagDelta<T> {
    fn empty() -> Self {
        BagDelta::new()
    }

    fn is_empty(&self) -> bool {
        BagDelta::is_empty(self)
    }

    fn merge(&mut self, later: Self) -> Result<()> {
        BagDelta::merge(self, later);
        Ok(())
    }
}

impl<K, V> Patch for MapDelta<K, V>
where
    K: Clone + PartialEq + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn empty() -> Self {
        MapDelta::new()
    }

    fn is_empty(&self) -> bool {
        MapDelta::is_empty(self)
    }

    fn merge(&mut self, later: Self) -> Result<()> {
        MapDelta::merge(self, later);
        Ok(())
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Patch for ListDelta<T> {
    fn empty() -> Self {
        ListDelta::new()
    }

    fn is_empty(&self) -> bool {
        ListDelta::is_empty(self)
    }

    fn merge(&mut self, later: Self) -> Result<()> {
        ListDelta::merge(self, later)
    }
}

/// Unordered collection content.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bag<T>(pub Vec<T>);

impl<T> Bag<T> {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Bag(Vec::new())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Content for Bag<T> {
    type Patch = BagDelta<T>;

    fn apply(&mut self, patch: &Self::Patch) -> Result<()> {
        patch.apply_to(&mut self.0)
    }
}

/// Keyed map content.
#[derive(Clone, Debug, Default)]
pub struct Table<K, V>(pub HashMap<K, V>);

impl<K, V> PartialEq for Table<K, V>
where
    K: Eq + core::hash::Hash,
    V: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<K, V> Table<K, V> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Table(HashMap::new())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> Content for Table<K, V>
where
    K: Clone + Eq + core::hash::Hash + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    type Patch = MapDelta<K, V>;

    fn apply(&mut self, patch: &Self::Patch) -> Result<()> {
        patch.apply_to(&mut self.0)
    }
}

/// Positional list content, backed by the positional index so that
/// run-shaped deltas land in O(runs * log n).
#[derive(Clone, Debug)]
pub struct Seq<T> {
    items: PositionalIndex<T>,
}

impl<T> Default for Seq<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Seq<T> {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Seq {
            items: PositionalIndex::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Value at a logical position.
    pub fn get(&self, pos: usize) -> Option<&T> {
        self.items.get(pos)
    }

    /// The backing positional index, for operators that track node handles.
    pub fn index(&self) -> &PositionalIndex<T> {
        &self.items
    }

    /// Inserts `value` at `pos`, shifting later positions right. Returns
    /// the stable handle of the new node.
    pub fn insert(&mut self, pos: usize, value: T) -> Result<sluice_index::NodeId> {
        self.items.insert(pos, value)
    }

    /// Removes and returns the value at `pos`, shifting later positions
    /// left.
    pub fn remove_at(&mut self, pos: usize) -> Result<T> {
        self.items.remove_at(pos)
    }
}

impl<T: Clone> Seq<T> {
    /// Builds a sequence from a Vec.
    pub fn from_vec(items: Vec<T>) -> Result<Self> {
        let mut seq = Seq::new();
        for (i, item) in items.into_iter().enumerate() {
            seq.items.insert(i, item)?;
        }
        Ok(seq)
    }

    /// Collects the sequence into a Vec.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.to_vec()
    }
}

impl<T: PartialEq> PartialEq for Seq<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .items
                .dense()
                .zip(other.items.dense())
                .all(|((_, a), (_, b))| a == b)
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Content for Seq<T> {
    type Patch = ListDelta<T>;

    fn apply(&mut self, patch: &Self::Patch) -> Result<()> {
        // Runs are applied in descending index order so earlier pre-delta
        // positions stay valid.
        for run in patch.runs().iter().rev() {
            for expected in &run.delete_items {
                match self.items.get(run.index) {
                    Some(found) if found == expected => {
                        self.items.remove_at(run.index)?;
                    }
                    Some(_) => {
                        return Err(Error::mismatch(
                            run.index,
                            "deleted value does not match sequence content",
                        ));
                    }
                    None => {
                        return Err(Error::out_of_range(run.index, self.items.len()));
                    }
                }
            }
            for (offset, item) in run.insert_items.iter().enumerate() {
                self.items.insert(run.index + offset, item.clone())?;
            }
        }
        Ok(())
    }
}

/// Single-value content, used by live values and derived scalars.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scalar<T>(pub T);

/// Whole-value replacement patch for scalar content.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScalarDelta<T> {
    /// The replacement value, if any.
    pub value: Option<T>,
}

impl<T> ScalarDelta<T> {
    /// A patch replacing the value.
    pub fn set(value: T) -> Self {
        ScalarDelta { value: Some(value) }
    }
}

impl<T: Clone + Send + Sync + 'static> Patch for ScalarDelta<T> {
    fn empty() -> Self {
        ScalarDelta { value: None }
    }

    fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    fn merge(&mut self, later: Self) -> Result<()> {
        if later.value.is_some() {
            self.value = later.value;
        }
        Ok(())
    }
}

impl<T: Clone + Send + Sync + 'static> Content for Scalar<T> {
    type Patch = ScalarDelta<T>;

    fn apply(&mut self, patch: &Self::Patch) -> Result<()> {
        if let Some(value) = &patch.value {
            self.0 = value.clone();
        }
        Ok(())
    }
}
