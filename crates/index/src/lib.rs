//! Sluice Index - Positional index structure for the Sluice engine.
//!
//! Operators that maintain list-shaped derived state need to answer "which
//! value is at logical position i" and "where does this node live now"
//! cheaply while positions churn under interleaved inserts and removes.
//! `PositionalIndex` provides that: O(log n) insert/remove/lookup, stable
//! node handles, and a dense enumeration matching the delta algebra's
//! index-run coordinates.

pub mod positional;

pub use positional::{Dense, NodeId, PositionalIndex};
