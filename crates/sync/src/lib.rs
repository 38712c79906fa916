//! Sluice Sync - Notification and locking primitives for the Sluice engine.
//!
//! Two small pieces every node leans on:
//!
//! - `ChangeSignal`: a lock-free single-flight notifier that collapses any
//!   number of concurrent "changed" signals into one pending flag consumed
//!   by exactly one processing pass
//! - `StateLock`: a reader/writer/upgradable lock with atomic
//!   upgrade/downgrade and rank-ordered composite acquisition for nodes
//!   that depend on several producers

pub mod lock;
pub mod signal;

pub use lock::{
    read_all, read_pair, upgradable_pair, write_pair, ReadGuard, StateLock, UpgradableGuard,
    WriteGuard,
};
pub use signal::ChangeSignal;
