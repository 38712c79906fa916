//! Subscription lifecycle states.
//!
//! Every subscription to a producer moves through the same state machine:
//!
//! ```text
//! Connecting -> Connected <-> Reconnecting -> Disconnecting -> Completing -> Completed
//! ```
//!
//! Transitions are monotonic except the `Connected <-> Reconnecting` cycle,
//! which may repeat each time the producer replaces its backing content
//! wholesale.

/// Lifecycle state of one subscription to one producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// Initial snapshot delivered; no delta, only current content.
    Connecting,
    /// Steady state; deltas are incremental relative to the previous read.
    Connected,
    /// The producer replaced its entire backing content. Subscribers must
    /// treat the accompanying content as a full replacement, not a diff.
    Reconnecting,
    /// The producer has begun shutting down.
    Disconnecting,
    /// Last state that still carries a (possibly empty) trailing delta.
    Completing,
    /// Terminal. Carries no delta and no content.
    Completed,
}

impl Status {
    /// Returns true for the terminal state.
    #[inline]
    pub fn is_terminal(self) -> bool {
        self == Status::Completed
    }

    /// Returns true if a state with this status hands out full content
    /// rather than a delta.
    #[inline]
    pub fn carries_content(self) -> bool {
        matches!(self, Status::Connecting | Status::Reconnecting)
    }

    /// Returns true if a state with this status may carry a delta.
    #[inline]
    pub fn carries_delta(self) -> bool {
        matches!(self, Status::Connected | Status::Completing)
    }

    /// Returns true if `next` is a legal successor of `self`.
    ///
    /// `Completed` is only reachable through `Completing`; in particular
    /// `Reconnecting` may never jump straight to `Completed`.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        match (self, next) {
            // A status may repeat (idempotent re-reads, repeated replaces).
            (a, b) if a == b => a != Completed,
            (Connecting, Connected | Reconnecting | Disconnecting | Completing) => true,
            (Connected, Reconnecting | Disconnecting | Completing) => true,
            (Reconnecting, Connected | Disconnecting | Completing) => true,
            (Disconnecting, Completing) => true,
            (Completing, Completed) => true,
            _ => false,
        }
    }
}
