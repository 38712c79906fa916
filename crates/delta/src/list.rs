//! Positional list deltas.
//!
//! A `ListDelta` describes the change between two states of an ordered list
//! as a sequence of index runs. Each run names a position in the *pre-delta*
//! list, the items deleted starting there, and the items inserted in their
//! place. Runs are kept canonical after every mutating call: ascending by
//! index, merged when they touch, free of self-cancelling work, and
//! renumbered densely.
//!
//! Mutating calls take positions in the *current* list (the pre-delta list
//! with all runs already applied); the fold back into pre-delta coordinates
//! is what allows an arbitrary interleaving of inserts and deletes to settle
//! into one minimal description.

use sluice_core::{Error, Result};

/// One contiguous edit: at `index` in the pre-delta list, `delete_items`
/// are removed and `insert_items` take their place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexRun<T> {
    /// Logical position in the pre-delta list where the run applies.
    pub index: usize,
    /// Ordinal of this run among all runs, 0-based ascending.
    pub dense_index: usize,
    /// Items inserted at `index`, in final order.
    pub insert_items: Vec<T>,
    /// Items deleted starting at `index`, in pre-delta order.
    pub delete_items: Vec<T>,
}

impl<T> IndexRun<T> {
    fn new(index: usize, insert_items: Vec<T>, delete_items: Vec<T>) -> Self {
        Self {
            index,
            dense_index: 0,
            insert_items,
            delete_items,
        }
    }

    /// Net length change contributed by this run.
    #[inline]
    pub fn net(&self) -> isize {
        self.insert_items.len() as isize - self.delete_items.len() as isize
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.insert_items.is_empty() && self.delete_items.is_empty()
    }
}

/// A canonical delta over an ordered list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListDelta<T> {
    runs: Vec<IndexRun<T>>,
}

impl<T> Default for ListDelta<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ListDelta<T> {
    /// Creates an empty delta.
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    /// Returns the canonical runs, ascending by index.
    #[inline]
    pub fn runs(&self) -> &[IndexRun<T>] {
        &self.runs
    }

    /// Returns true if the delta describes no change.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Net length change of the whole delta.
    pub fn net_len_change(&self) -> isize {
        self.runs.iter().map(IndexRun::net).sum()
    }
}

impl<T: PartialEq> ListDelta<T> {
    /// Records an insertion of `items` at position `at` in the current list.
    ///
    /// Repeated inserts at one position accumulate in reverse arrival order:
    /// each new insert lands before the previous one, the way inserting at a
    /// fixed index pushes earlier insertions further right.
    pub fn insert(&mut self, at: usize, items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        let mut shift: isize = 0;
        let mut splice: Option<(usize, usize)> = None;
        let mut new_pos = self.runs.len();
        for (i, run) in self.runs.iter().enumerate() {
            let start = run.index as isize + shift;
            let end = start + run.insert_items.len() as isize;
            if (at as isize) < start {
                new_pos = i;
                break;
            }
            if (at as isize) < end {
                splice = Some((i, (at as isize - start) as usize));
                break;
            }
            shift += run.net();
        }
        match splice {
            Some((i, off)) => {
                self.runs[i].insert_items.splice(off..off, items);
            }
            None => {
                let pre = (at as isize - shift) as usize;
                self.runs.insert(new_pos, IndexRun::new(pre, items, Vec::new()));
            }
        }
        self.canonicalize();
    }

    /// Records a deletion of `items` at position `at` in the current list.
    ///
    /// Each item is consumed at the same current position, matching the way
    /// repeated removal at a fixed index walks through consecutive elements;
    /// deletes of pre-existing elements therefore accumulate FIFO within a
    /// run. A delete that lands on a pending insert of an equal value
    /// cancels it; a differing value is a malformed delta.
    pub fn delete(&mut self, at: usize, items: Vec<T>) -> Result<()> {
        for item in items {
            self.delete_one(at, item)?;
        }
        Ok(())
    }

    /// Records replacement of `old` by `new` at position `at`: a delete and
    /// an insert sharing the position.
    pub fn update(&mut self, at: usize, old: T, new: T) -> Result<()> {
        self.delete_one(at, old)?;
        self.insert(at, vec![new]);
        Ok(())
    }

    fn delete_one(&mut self, at: usize, value: T) -> Result<()> {
        let mut shift: isize = 0;
        let mut cancel: Option<(usize, usize)> = None;
        let mut new_pos = self.runs.len();
        for (i, run) in self.runs.iter().enumerate() {
            let start = run.index as isize + shift;
            let end = start + run.insert_items.len() as isize;
            if (at as isize) < start {
                new_pos = i;
                break;
            }
            if (at as isize) < end {
                cancel = Some((i, (at as isize - start) as usize));
                break;
            }
            shift += run.net();
        }
        match cancel {
            Some((i, off)) => {
                if self.runs[i].insert_items[off] != value {
                    return Err(Error::mismatch(
                        at,
                        "deleted value does not match pending insert",
                    ));
                }
                self.runs[i].insert_items.remove(off);
            }
            None => {
                let pre = (at as isize - shift) as usize;
                self.runs
                    .insert(new_pos, IndexRun::new(pre, Vec::new(), vec![value]));
            }
        }
        self.canonicalize();
        Ok(())
    }

    /// Folds a chronologically later delta into this one.
    ///
    /// The later delta's runs are expressed against this delta's post-state;
    /// they are replayed through the primitive operations with a running
    /// shift correction, so reading the merged delta once is equivalent to
    /// reading both in order.
    pub fn merge(&mut self, later: ListDelta<T>) -> Result<()> {
        let mut shift: isize = 0;
        for run in later.runs {
            let at = (run.index as isize + shift) as usize;
            let net = run.net();
            if !run.delete_items.is_empty() {
                self.delete(at, run.delete_items)?;
            }
            if !run.insert_items.is_empty() {
                self.insert(at, run.insert_items);
            }
            shift += net;
        }
        Ok(())
    }

    /// Restores the canonical form: touching runs merged, fixed points
    /// split out, self-cancelling pairs removed, dense indices renumbered.
    fn canonicalize(&mut self) {
        // Merge runs that touch in pre-delta coordinates: a run whose
        // deletions end exactly where the next run begins leaves no
        // surviving element between them.
        let mut i = 0;
        while i + 1 < self.runs.len() {
            if self.runs[i].index + self.runs[i].delete_items.len() == self.runs[i + 1].index {
                let next = self.runs.remove(i + 1);
                let run = &mut self.runs[i];
                run.insert_items.extend(next.insert_items);
                run.delete_items.extend(next.delete_items);
            } else {
                i += 1;
            }
        }

        // Split each run at fixed points (an inserted value equal to the
        // deleted value at the same offset changes nothing) and trim equal
        // trailing pairs, so net no-ops never survive in a run.
        let mut settled: Vec<IndexRun<T>> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            split_run(run, &mut settled);
        }
        self.runs = settled;

        for (i, run) in self.runs.iter_mut().enumerate() {
            run.dense_index = i;
        }
    }
}

/// Splits `run` at fixed points, pushing the surviving pieces onto `out`.
fn split_run<T: PartialEq>(mut run: IndexRun<T>, out: &mut Vec<IndexRun<T>>) {
    loop {
        let aligned = run.insert_items.len().min(run.delete_items.len());
        let fixed = (0..aligned).find(|&i| run.insert_items[i] == run.delete_items[i]);
        match fixed {
            Some(i) => {
                let rest_ins = run.insert_items.split_off(i + 1);
                let rest_del = run.delete_items.split_off(i + 1);
                run.insert_items.pop();
                run.delete_items.pop();
                if !run.is_empty() {
                    out.push(IndexRun::new(
                        run.index,
                        core::mem::take(&mut run.insert_items),
                        core::mem::take(&mut run.delete_items),
                    ));
                }
                run = IndexRun::new(run.index + i + 1, rest_ins, rest_del);
            }
            None => {
                // Equal trailing pair: the last inserted item sits directly
                // before the first survivor, as does the last deleted one.
                while !run.insert_items.is_empty()
                    && !run.delete_items.is_empty()
                    && run.insert_items.last() == run.delete_items.last()
                {
                    run.insert_items.pop();
                    run.delete_items.pop();
                }
                if !run.is_empty() {
                    out.push(run);
                }
                return;
            }
        }
    }
}

impl<T: Clone + PartialEq> ListDelta<T> {
    /// Applies the delta to `target`, consuming runs in descending index
    /// order so earlier positions stay valid.
    ///
    /// A run whose bounds fall outside `target` or whose deleted items do
    /// not match the content is an invariant violation and fails the whole
    /// application; `target` is left partially modified only up to the
    /// failing run, which is acceptable because the error is fatal to the
    /// owning node.
    pub fn apply_to(&self, target: &mut Vec<T>) -> Result<()> {
        for run in self.runs.iter().rev() {
            let end = run.index + run.delete_items.len();
            if run.index > target.len() || end > target.len() {
                return Err(Error::out_of_range(run.index, target.len()));
            }
            for (k, expected) in run.delete_items.iter().enumerate() {
                if target[run.index + k] != *expected {
                    return Err(Error::mismatch(
                        run.index + k,
                        "deleted value does not match list content",
                    ));
                }
            }
            target.splice(run.index..end, run.insert_items.iter().cloned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_of(runs: &[(usize, &[i32], &[i32])]) -> Vec<IndexRun<i32>> {
        runs.iter()
            .enumerate()
            .map(|(d, &(index, ins, del))| IndexRun {
                index,
                dense_index: d,
                insert_items: ins.to_vec(),
                delete_items: del.to_vec(),
            })
            .collect()
    }

    #[test]
    fn test_insert_then_delete_cancels() {
        let mut delta = ListDelta::new();
        delta.insert(0, vec![1]);
        delta.delete(0, vec![1]).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn test_delete_then_insert_is_update_run() {
        // [1,2,3,4,5]: delete 3 at index 2, insert 2 there.
        let mut delta = ListDelta::new();
        delta.delete(2, vec![3]).unwrap();
        delta.insert(2, vec![2]);

        assert_eq!(delta.runs(), &delta_of(&[(2, &[2], &[3])])[..]);

        let mut list = vec![1, 2, 3, 4, 5];
        delta.apply_to(&mut list).unwrap();
        assert_eq!(list, vec![1, 2, 2, 4, 5]);
    }

    #[test]
    fn test_sequential_deletes_accumulate_fifo() {
        // [a=1, b=2, c=3]: delete at 1 twice removes b then c.
        let mut delta = ListDelta::new();
        delta.delete(1, vec![2]).unwrap();
        delta.delete(1, vec![3]).unwrap();

        assert_eq!(delta.runs(), &delta_of(&[(1, &[], &[2, 3])])[..]);

        let mut list = vec![1, 2, 3];
        delta.apply_to(&mut list).unwrap();
        assert_eq!(list, vec![1]);
    }

    #[test]
    fn test_sequential_inserts_reverse_order() {
        let mut delta = ListDelta::new();
        delta.insert(0, vec![1]);
        delta.insert(0, vec![2]);
        delta.insert(0, vec![3]);

        assert_eq!(delta.runs(), &delta_of(&[(0, &[3, 2, 1], &[])])[..]);

        let mut list: Vec<i32> = Vec::new();
        delta.apply_to(&mut list).unwrap();
        assert_eq!(list, vec![3, 2, 1]);
    }

    #[test]
    fn test_multi_item_delete_walks_forward() {
        let mut delta = ListDelta::new();
        delta.delete(1, vec![20, 30, 40]).unwrap();

        assert_eq!(delta.runs(), &delta_of(&[(1, &[], &[20, 30, 40])])[..]);

        let mut list = vec![10, 20, 30, 40, 50];
        delta.apply_to(&mut list).unwrap();
        assert_eq!(list, vec![10, 50]);
    }

    #[test]
    fn test_adjacent_runs_merge() {
        let mut delta = ListDelta::new();
        delta.delete(0, vec![1]).unwrap();
        delta.delete(1, vec![3]).unwrap(); // current [2,3,4] -> removes 3
        // Runs at pre 0 and pre 2 are not adjacent (2 survives between).
        assert_eq!(delta.runs().len(), 2);

        delta.delete(0, vec![2]).unwrap(); // now pre 0..3 all deleted
        assert_eq!(delta.runs(), &delta_of(&[(0, &[], &[1, 2, 3])])[..]);
    }

    #[test]
    fn test_insert_into_deleted_gap_forms_update() {
        let mut delta = ListDelta::new();
        delta.delete(2, vec![30, 40]).unwrap();
        delta.insert(2, vec![99]);

        assert_eq!(delta.runs(), &delta_of(&[(2, &[99], &[30, 40])])[..]);

        let mut list = vec![10, 20, 30, 40, 50];
        delta.apply_to(&mut list).unwrap();
        assert_eq!(list, vec![10, 20, 99, 50]);
    }

    #[test]
    fn test_update_sugar() {
        let mut delta = ListDelta::new();
        delta.update(1, 20, 25).unwrap();
        assert_eq!(delta.runs(), &delta_of(&[(1, &[25], &[20])])[..]);
    }

    #[test]
    fn test_self_update_cancels() {
        let mut delta = ListDelta::new();
        delta.update(1, 20, 20).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn test_fixed_point_split_is_order_independent() {
        // Replacing [c,x,d] by [a,x,b] leaves the middle x untouched; both
        // operation orders settle into the same two runs.
        let mut one_by_one = ListDelta::new();
        one_by_one.update(0, 'c', 'a').unwrap();
        one_by_one.update(1, 'x', 'x').unwrap();
        one_by_one.update(2, 'd', 'b').unwrap();

        let mut bulk = ListDelta::new();
        bulk.delete(0, vec!['c', 'x', 'd']).unwrap();
        bulk.insert(0, vec!['a', 'x', 'b']);

        assert_eq!(one_by_one, bulk);
        assert_eq!(bulk.runs().len(), 2);
        assert_eq!(bulk.runs()[0].index, 0);
        assert_eq!(bulk.runs()[1].index, 2);
    }

    #[test]
    fn test_trailing_fixed_point_trimmed() {
        // Replacing [x,y,q] by [p,q]: the q survives.
        let mut delta = ListDelta::new();
        delta.delete(0, vec!['x', 'y', 'q']).unwrap();
        delta.insert(0, vec!['p', 'q']);

        assert_eq!(delta.runs().len(), 1);
        assert_eq!(delta.runs()[0].insert_items, vec!['p']);
        assert_eq!(delta.runs()[0].delete_items, vec!['x', 'y']);

        let mut list = vec!['x', 'y', 'q', 's'];
        delta.apply_to(&mut list).unwrap();
        assert_eq!(list, vec!['p', 'q', 's']);
    }

    #[test]
    fn test_dense_index_renumbered() {
        let mut delta = ListDelta::new();
        delta.delete(4, vec![50]).unwrap();
        delta.delete(2, vec![30]).unwrap();
        delta.delete(0, vec![10]).unwrap();

        let runs = delta.runs();
        assert_eq!(runs.len(), 3);
        for (i, run) in runs.iter().enumerate() {
            assert_eq!(run.dense_index, i);
        }
        assert!(runs.windows(2).all(|w| w[0].index < w[1].index));
    }

    #[test]
    fn test_merge_equals_sequential_apply() {
        let base = vec![1, 2, 3, 4, 5, 6];

        let mut first = ListDelta::new();
        first.delete(1, vec![2]).unwrap();
        first.insert(3, vec![70, 80]);

        let mut second = ListDelta::new();
        second.delete(0, vec![1]).unwrap();
        second.insert(2, vec![90]);
        second.delete(4, vec![80]).unwrap();

        let mut sequential = base.clone();
        first.apply_to(&mut sequential).unwrap();
        second.apply_to(&mut sequential).unwrap();

        let mut merged = first.clone();
        merged.merge(second).unwrap();
        let mut once = base;
        merged.apply_to(&mut once).unwrap();

        assert_eq!(once, sequential);
    }

    #[test]
    fn test_merge_cancels_across_deltas() {
        let mut first = ListDelta::new();
        first.insert(0, vec![42]);

        let mut second = ListDelta::new();
        second.delete(0, vec![42]).unwrap();

        first.merge(second).unwrap();
        assert!(first.is_empty());
    }

    #[test]
    fn test_apply_out_of_range() {
        let mut delta = ListDelta::new();
        delta.insert(5, vec![1]);

        let mut list = vec![1, 2];
        assert!(matches!(
            delta.apply_to(&mut list),
            Err(Error::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_apply_mismatched_delete() {
        let mut delta = ListDelta::new();
        delta.delete(0, vec![99]).unwrap();

        let mut list = vec![1, 2];
        assert!(matches!(
            delta.apply_to(&mut list),
            Err(Error::DeltaMismatch { .. })
        ));
    }

    #[test]
    fn test_mismatched_cancel_rejected() {
        let mut delta = ListDelta::new();
        delta.insert(0, vec![1]);
        assert!(delta.delete(0, vec![2]).is_err());
    }

    #[test]
    fn test_net_len_change() {
        let mut delta = ListDelta::new();
        delta.insert(0, vec![1, 2, 3]);
        delta.delete(4, vec![9]).unwrap();
        assert_eq!(delta.net_len_change(), 2);
    }

    #[test]
    fn test_empty_operations_are_noops() {
        let mut delta: ListDelta<i32> = ListDelta::new();
        delta.insert(0, vec![]);
        delta.delete(0, vec![]).unwrap();
        assert!(delta.is_empty());
    }
}
