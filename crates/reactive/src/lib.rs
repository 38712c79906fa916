//! Sluice Reactive - State and subscription protocol for the Sluice engine.
//!
//! This crate is the substrate every operator builds on. Sources mutate
//! collections/values inside transactions; each committed transaction
//! becomes one delta and at most one notification per subscriber; each
//! subscriber pulls `{status, delta, full content, timestamp}` through its
//! observer exactly once per transaction and applies the delta to its own
//! materialized copy.
//!
//! # Core Concepts
//!
//! - `Content` / `Patch`: a materializable shape and its delta type
//!   (`Bag`, `Table`, `Seq`, `Scalar`)
//! - `ProducerCore`: cache + observer registry + commit discipline; the
//!   producer half of every node
//! - `Observer`: the per-subscription pull handle
//! - `State` / `StateCache`: snapshots handed downstream and the
//!   authoritative content they come from
//! - Sources: `SourceSeq`, `SourceBag`, `SourceMap`, `Var`
//!
//! # Example
//!
//! ```
//! use sluice_core::{Clock, Status};
//! use sluice_reactive::SourceSeq;
//!
//! let clock = Clock::new();
//! let prices = SourceSeq::with_items(clock, "prices", vec![10, 20, 30]).unwrap();
//! let observer = prices.observe(|| {});
//!
//! // First read: full snapshot.
//! let initial = observer.get_state().unwrap();
//! assert_eq!(initial.status, Status::Connecting);
//! assert_eq!(initial.content.unwrap().to_vec(), vec![10, 20, 30]);
//!
//! // A transaction commits one delta, observed incrementally.
//! let mut txn = prices.begin(true);
//! txn.update(1, 25).unwrap();
//! txn.commit().unwrap();
//!
//! let next = observer.get_state().unwrap();
//! assert_eq!(next.status, Status::Connected);
//! assert_eq!(next.delta.unwrap().runs().len(), 1);
//! ```

pub mod cache;
pub mod content;
pub mod observer;
pub mod producer;
pub mod sink;
pub mod source;
pub mod state;
mod txn;
pub mod var;

pub use cache::StateCache;
pub use content::{Bag, Content, Patch, Scalar, ScalarDelta, Seq, Table};
pub use observer::Observer;
pub use producer::{ObserverId, ProducerCore, ProducerState};
pub use sink::{EventSink, NodeEvent, NullSink, ThreadSink, TracingSink};
pub use source::{BagTxn, MapTxn, SeqTxn, SourceBag, SourceMap, SourceSeq};
pub use state::State;
pub use var::{PropertyBinding, PropertySource, Var};

// Re-export the vocabulary types alongside the protocol.
pub use sluice_core::{Clock, Error, Result, Status, Timestamp};
pub use sluice_delta::{BagDelta, IndexRun, ListDelta, MapDelta};
