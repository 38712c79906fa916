//! Single-flight change notification.
//!
//! Between two reads by one consumer, arbitrarily many producer-side
//! "changed" signals may arrive concurrently. `ChangeSignal` collapses them
//! into a single pending flag and guarantees the flag is consumed by
//! exactly one processing pass: no notification is lost, none is processed
//! twice, and `notify` never blocks.

use core::sync::atomic::{AtomicU8, Ordering};

const IDLE: u8 = 0;
const NOTIFIED: u8 = 1;
const PROCESSING: u8 = 2;
const PROCESSING_NOTIFIED: u8 = 3;

/// A lock-free notification coalescer.
///
/// `process` must not run concurrently with itself on one instance; that is
/// the caller's responsibility (in Sluice, the producer's lock discipline
/// serializes processors). `notify` may race with anything.
#[derive(Debug, Default)]
pub struct ChangeSignal {
    state: AtomicU8,
}

impl ChangeSignal {
    /// Creates a signal with nothing pending.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
        }
    }

    /// Records that something changed upstream.
    ///
    /// Returns true if this call is the one responsible for triggering a
    /// wake-up: the first notify after idle, or the first to land while a
    /// processing pass is already draining the previous flag. Callers use
    /// the result to avoid scheduling redundant wake-ups.
    pub fn notify(&self) -> bool {
        let mut cur = self.state.load(Ordering::Acquire);
        loop {
            let (next, responsible) = match cur {
                IDLE => (NOTIFIED, true),
                PROCESSING => (PROCESSING_NOTIFIED, true),
                NOTIFIED | PROCESSING_NOTIFIED => return false,
                _ => unreachable!("invalid signal state"),
            };
            match self
                .state
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return responsible,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Returns true if a notification is pending, without consuming it.
    pub fn is_notified(&self) -> bool {
        matches!(
            self.state.load(Ordering::Acquire),
            NOTIFIED | PROCESSING_NOTIFIED
        )
    }

    /// Runs one processing pass.
    ///
    /// `action` is invoked exactly once with whether anything was pending
    /// since the last pass. A notify that lands while `action` runs is kept
    /// pending for the next pass.
    pub fn process<F: FnOnce(bool)>(&self, action: F) {
        let prev = self.state.swap(PROCESSING, Ordering::AcqRel);
        debug_assert!(
            prev == IDLE || prev == NOTIFIED,
            "process() ran concurrently with itself"
        );
        let notified = prev == NOTIFIED || prev == PROCESSING_NOTIFIED;

        action(notified);

        if self
            .state
            .compare_exchange(PROCESSING, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // A notify arrived mid-pass; keep it for the next processor.
            self.state.store(NOTIFIED, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_notify_then_process() {
        let signal = ChangeSignal::new();
        assert!(signal.notify());
        assert!(signal.is_notified());

        let mut seen = None;
        signal.process(|notified| seen = Some(notified));
        assert_eq!(seen, Some(true));
        assert!(!signal.is_notified());
    }

    #[test]
    fn test_process_without_notify() {
        let signal = ChangeSignal::new();
        let mut seen = None;
        signal.process(|notified| seen = Some(notified));
        assert_eq!(seen, Some(false));
    }

    #[test]
    fn test_repeat_notify_coalesces() {
        let signal = ChangeSignal::new();
        assert!(signal.notify());
        assert!(!signal.notify());
        assert!(!signal.notify());

        let mut passes = 0;
        signal.process(|notified| {
            assert!(notified);
            passes += 1;
        });
        signal.process(|notified| {
            assert!(!notified);
            passes += 1;
        });
        assert_eq!(passes, 2);
    }

    #[test]
    fn test_notify_during_process_survives() {
        let signal = ChangeSignal::new();
        signal.notify();
        signal.process(|notified| {
            assert!(notified);
            // Simulates a transaction landing while this pass runs.
            assert!(signal.notify());
        });
        let mut seen = None;
        signal.process(|notified| seen = Some(notified));
        assert_eq!(seen, Some(true));
    }

    #[test]
    fn test_concurrent_notify_single_flight() {
        for _ in 0..50 {
            let signal = Arc::new(ChangeSignal::new());
            let barrier = Arc::new(Barrier::new(8));

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let signal = signal.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        signal.notify()
                    })
                })
                .collect();

            let responsible = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|&r| r)
                .count();
            // All notifies landed before processing: exactly one wake-up.
            assert_eq!(responsible, 1);

            let mut runs = 0;
            signal.process(|notified| {
                assert!(notified);
                runs += 1;
            });
            assert_eq!(runs, 1);
            signal.process(|notified| assert!(!notified));
        }
    }
}
