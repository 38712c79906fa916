//! Lifecycle and notification tests for the subscription protocol.

use parking_lot::Mutex;
use sluice_reactive::{
    Bag, Clock, NodeEvent, Observer, SourceBag, SourceSeq, Status, ThreadSink, Var,
};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

#[test]
fn test_first_read_is_connecting_with_full_content() {
    let clock = Clock::new();
    let source = SourceSeq::with_items(clock, "seq", vec![1, 2, 3]).unwrap();
    let observer = source.observe(|| {});

    let state = observer.get_state().unwrap();
    assert_eq!(state.status, Status::Connecting);
    assert!(state.delta.is_none());
    assert_eq!(state.content.unwrap().to_vec(), vec![1, 2, 3]);
}

#[test]
fn test_transactions_before_first_read_fold_into_snapshot() {
    let clock = Clock::new();
    let source = SourceBag::new(clock, "bag");
    let observer = source.observe(|| {});

    source.insert(1).unwrap();
    source.insert(2).unwrap();

    // Still the first read: full content, no delta.
    let state = observer.get_state().unwrap();
    assert_eq!(state.status, Status::Connecting);
    assert!(state.delta.is_none());
    assert_eq!(state.content.unwrap().len(), 2);
}

#[test]
fn test_idempotent_read_without_notification() {
    let clock = Clock::new();
    let source = SourceBag::with_items(clock, "bag", vec![1]);
    let observer = source.observe(|| {});

    let first = observer.get_state().unwrap();
    let second = observer.get_state().unwrap();
    assert_eq!(first.status, second.status);
    assert!(second.delta.is_none());

    source.insert(2).unwrap();
    let third = observer.get_state().unwrap();
    assert_eq!(third.status, Status::Connected);
    assert!(third.delta.is_some());

    let fourth = observer.get_state().unwrap();
    assert_eq!(fourth.status, Status::Connected);
    assert!(fourth.delta.is_none());
}

#[test]
fn test_each_transaction_observed_exactly_once() {
    let clock = Clock::new();
    let source = SourceBag::new(clock, "bag");
    let observer = source.observe(|| {});
    let _ = observer.get_state().unwrap();

    source.insert(1).unwrap();
    source.insert(2).unwrap();

    // Both transactions coalesce into one pending delta.
    let state = observer.get_state().unwrap();
    let delta = state.delta.unwrap();
    let mut inserts = delta.inserts.clone();
    inserts.sort();
    assert_eq!(inserts, vec![1, 2]);

    // Nothing left over.
    assert!(observer.get_state().unwrap().delta.is_none());
}

#[test]
fn test_batched_transaction_notifies_once() {
    let clock = Clock::new();
    let source = SourceSeq::new(clock, "seq");
    let calls = Arc::new(Mutex::new(0));
    let calls_in_cb = calls.clone();
    let observer = source.observe(move || {
        *calls_in_cb.lock() += 1;
    });
    let _ = observer.get_state().unwrap();

    let mut txn = source.begin(true);
    txn.push(1).unwrap();
    txn.push(2).unwrap();
    txn.push(3).unwrap();
    txn.commit().unwrap();

    assert_eq!(*calls.lock(), 1);
    let state = observer.get_state().unwrap();
    assert_eq!(state.status, Status::Connected);
    assert_eq!(state.delta.unwrap().net_len_change(), 3);
}

#[test]
fn test_nested_transactions_coalesce() {
    let clock = Clock::new();
    let source = SourceSeq::new(clock, "seq");
    let calls = Arc::new(Mutex::new(0));
    let calls_in_cb = calls.clone();
    let observer = source.observe(move || {
        *calls_in_cb.lock() += 1;
    });
    let _ = observer.get_state().unwrap();

    {
        let mut outer = source.begin(true);
        outer.push(1).unwrap();
        // The convenience method opens a nested scope on the same thread;
        // it joins the outer transaction instead of committing.
        source.push(2).unwrap();
        outer.push(3).unwrap();
        assert_eq!(*calls.lock(), 0);
        outer.commit().unwrap();
    }

    assert_eq!(*calls.lock(), 1);
    assert_eq!(source.to_vec(), vec![1, 2, 3]);
}

#[test]
fn test_unbatched_transaction_commits_per_mutation() {
    let clock = Clock::new();
    let source = SourceSeq::new(clock, "seq");
    let calls = Arc::new(Mutex::new(0));
    let calls_in_cb = calls.clone();
    let observer = source.observe(move || {
        *calls_in_cb.lock() += 1;
    });
    let _ = observer.get_state().unwrap();

    let mut txn = source.begin(false);
    txn.push(1).unwrap();
    txn.push(2).unwrap();
    txn.commit().unwrap();

    // Two commits; signal coalescing may fold the wake-ups, but both
    // deltas arrive.
    let state = observer.get_state().unwrap();
    assert_eq!(state.delta.unwrap().net_len_change(), 2);
    assert!(*calls.lock() >= 1);
}

#[test]
fn test_reconnect_cycle() {
    let clock = Clock::new();
    let source = SourceSeq::with_items(clock, "seq", vec![1, 2]).unwrap();
    let observer = source.observe(|| {});
    let _ = observer.get_state().unwrap();

    source.reset(vec![7, 8, 9]).unwrap();

    let state = observer.get_state().unwrap();
    assert_eq!(state.status, Status::Reconnecting);
    assert!(state.delta.is_none());
    assert_eq!(state.content.unwrap().to_vec(), vec![7, 8, 9]);

    // Reconnecting is followed by Connected on the next read.
    let state = observer.get_state().unwrap();
    assert_eq!(state.status, Status::Connected);
    assert!(state.delta.is_none());

    // The cycle may repeat.
    source.reset(vec![0]).unwrap();
    assert_eq!(observer.get_state().unwrap().status, Status::Reconnecting);
    source.push(1).unwrap();
    assert_eq!(observer.get_state().unwrap().status, Status::Connected);
}

#[test]
fn test_completion_walk() {
    let clock = Clock::new();
    let source = SourceBag::with_items(clock, "bag", vec![1]);
    let observer = source.observe(|| {});
    let _ = observer.get_state().unwrap();

    source.complete().unwrap();

    let state = observer.get_state().unwrap();
    assert_eq!(state.status, Status::Completing);

    let state = observer.get_state().unwrap();
    assert_eq!(state.status, Status::Completed);
    assert!(state.delta.is_none());
    assert!(state.content.is_none());

    // Terminal: stays Completed.
    assert_eq!(observer.get_state().unwrap().status, Status::Completed);
}

#[test]
fn test_subscriber_after_completion_still_sees_connecting_first() {
    let clock = Clock::new();
    let source = SourceBag::with_items(clock, "bag", vec![1, 2]);
    source.complete().unwrap();

    let observer = source.observe(|| {});
    let statuses: Vec<Status> = (0..4).map(|_| observer.get_state().unwrap().status).collect();
    assert_eq!(
        statuses,
        vec![
            Status::Connecting,
            Status::Completing,
            Status::Completed,
            Status::Completed
        ]
    );
}

#[test]
fn test_status_transitions_always_legal() {
    let clock = Clock::new();
    let source = SourceSeq::with_items(clock, "seq", vec![1]).unwrap();
    let observer = source.observe(|| {});

    let mut observed = Vec::new();
    let mut step = |obs: &sluice_reactive::Observer<sluice_reactive::Seq<i32>>| {
        observed.push(obs.get_state().unwrap().status);
    };

    step(&observer);
    source.push(2).unwrap();
    step(&observer);
    source.reset(vec![9]).unwrap();
    step(&observer);
    step(&observer);
    source.complete().unwrap();
    step(&observer);
    step(&observer);
    step(&observer);

    assert_eq!(observed.first(), Some(&Status::Connecting));
    assert_eq!(observed.last(), Some(&Status::Completed));
    for pair in observed.windows(2) {
        assert!(
            pair[0] == pair[1] || pair[0].can_transition_to(pair[1]),
            "illegal transition {:?} -> {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_mutation_after_completion_fails() {
    let clock = Clock::new();
    let source = SourceBag::new(clock, "bag");
    source.complete().unwrap();
    assert!(source.insert(1).is_err());
}

#[test]
fn test_detached_observer_is_benign() {
    let clock = Clock::new();
    let source = SourceBag::new(clock, "bag");
    let calls = Arc::new(Mutex::new(0));
    let calls_in_cb = calls.clone();
    let observer = source.observe(move || {
        *calls_in_cb.lock() += 1;
    });
    let _ = observer.get_state().unwrap();

    drop(observer);
    // The commit must not panic or invoke the dropped observer's callback.
    source.insert(1).unwrap();
    assert_eq!(*calls.lock(), 0);
}

#[test]
fn test_detach_then_get_state_errors() {
    let clock = Clock::new();
    let source = SourceBag::<i32>::new(clock, "bag");
    let observer = source.observe(|| {});
    observer.detach();
    assert!(observer.get_state().is_err());
}

#[test]
fn test_observer_applies_deltas_to_private_copy() {
    let clock = Clock::new();
    let source = SourceSeq::with_items(clock, "seq", vec![1, 2, 3, 4, 5]).unwrap();
    let observer = source.observe(|| {});

    let mut local = match observer.get_state().unwrap().content {
        Some(full) => full.to_vec(),
        None => panic!("connecting must carry content"),
    };

    let mut txn = source.begin(true);
    txn.remove(2).unwrap();
    txn.insert(2, 2).unwrap();
    txn.commit().unwrap();

    let mut state = observer.get_state().unwrap();
    state.delta.take().unwrap().apply_to(&mut local).unwrap();
    assert_eq!(local, vec![1, 2, 2, 4, 5]);
    assert_eq!(local, source.to_vec());
}

#[test]
fn test_var_reassignment_reconnects() {
    let clock = Clock::new();
    let var = Var::new(clock, "price", 10);
    let observer = var.observe(|| {});

    let state = observer.get_state().unwrap();
    assert_eq!(state.status, Status::Connecting);
    assert_eq!(state.content.unwrap().0, 10);

    var.set(20).unwrap();
    let state = observer.get_state().unwrap();
    assert_eq!(state.status, Status::Reconnecting);
    assert_eq!(state.content.unwrap().0, 20);
    assert_eq!(var.get(), 20);
}

#[test]
fn test_property_binding_refreshes_var() {
    struct Temperature {
        celsius: Mutex<i32>,
    }
    impl sluice_reactive::PropertySource<i32> for Temperature {
        fn current(&self) -> i32 {
            *self.celsius.lock()
        }
    }

    let clock = Clock::new();
    let sensor = Arc::new(Temperature {
        celsius: Mutex::new(21),
    });
    let (var, binding) = Var::bound(clock, "temperature", sensor.clone());
    assert_eq!(var.get(), 21);

    *sensor.celsius.lock() = 25;
    binding.refresh();
    assert_eq!(var.get(), 25);
}

#[test]
fn test_concurrent_commits_deliver_every_delta_once() {
    let clock = Clock::new();
    let source = Arc::new(SourceBag::new(clock, "bag"));
    let received = Arc::new(Mutex::new(Vec::new()));

    let observer: Arc<Mutex<Option<Observer<Bag<i32>>>>> = Arc::new(Mutex::new(None));
    let obs = {
        let received = received.clone();
        let observer = observer.clone();
        source.observe(move || {
            // Drain on the notifying thread; coalesced wake-ups are fine,
            // every delta must still arrive exactly once.
            if let Some(obs) = &*observer.lock() {
                if let Some(delta) = obs.get_state().unwrap().delta {
                    received.lock().extend(delta.inserts);
                }
            }
        })
    };
    let _ = obs.get_state().unwrap();
    *observer.lock() = Some(obs);

    let threads: Vec<_> = (0..4)
        .map(|t| {
            let source = source.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    source.insert(t * 1000 + i).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    // Catch anything still pending after the last wake-up.
    if let Some(obs) = &*observer.lock() {
        if let Some(delta) = obs.get_state().unwrap().delta {
            received.lock().extend(delta.inserts);
        }
    }

    let mut got = received.lock().clone();
    got.sort();
    let mut expected: Vec<i32> = (0..4).flat_map(|t| (0..50).map(move |i| t * 1000 + i)).collect();
    expected.sort();
    assert_eq!(got, expected);
}

#[test]
fn test_event_sink_receives_commits() {
    let (tx, rx) = mpsc::channel();
    let sink = Arc::new(ThreadSink::new(move |event| {
        tx.send(event).unwrap();
    }));

    let clock = Clock::new();
    let source = SourceBag::new(clock, "orders");
    source.core().attach_sink(sink.clone());

    let observer = source.observe(|| {});
    source.insert(1).unwrap();
    source.complete().unwrap();
    drop(observer);
    drop(source);
    drop(Arc::try_unwrap(sink).ok()); // flush and join the worker

    let events: Vec<NodeEvent> = rx.iter().collect();
    assert!(events
        .iter()
        .any(|e| matches!(e, NodeEvent::ObserverAttached { node } if node == "orders")));
    assert!(events
        .iter()
        .any(|e| matches!(e, NodeEvent::Committed { node, .. } if node == "orders")));
    assert!(events
        .iter()
        .any(|e| matches!(e, NodeEvent::Completed { node, .. } if node == "orders")));
}
