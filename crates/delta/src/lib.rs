//! Sluice Delta - Delta algebra for the Sluice incremental computation engine.
//!
//! A delta describes the change between two successive states of a
//! collection, in the minimal canonical form downstream nodes apply to
//! their own materialized copies. Three shapes are covered:
//!
//! - `BagDelta<T>`: unordered set/bag changes (inserted/deleted elements)
//! - `MapDelta<K, V>`: keyed changes; an update is a delete of the old
//!   pair plus an insert of the new pair sharing the key
//! - `ListDelta<T>`: positional changes as ordered index runs
//!
//! Every delta supports `merge`, which folds a chronologically later delta
//! into an earlier one so that a consumer reading once sees the net effect
//! of both, and `apply_to`, which replays the delta onto materialized
//! content and treats any mismatch as a fatal invariant violation.
//!
//! # Example
//!
//! ```
//! use sluice_delta::ListDelta;
//!
//! let mut delta = ListDelta::new();
//! delta.delete(2, vec![3]).unwrap();
//! delta.insert(2, vec![2]);
//!
//! // The two operations canonicalize into a single update run.
//! assert_eq!(delta.runs().len(), 1);
//!
//! let mut list = vec![1, 2, 3, 4, 5];
//! delta.apply_to(&mut list).unwrap();
//! assert_eq!(list, vec![1, 2, 2, 4, 5]);
//! ```

pub mod bag;
pub mod list;
pub mod map;

pub use bag::BagDelta;
pub use list::{IndexRun, ListDelta};
pub use map::MapDelta;
