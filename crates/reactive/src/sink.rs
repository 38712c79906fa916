//! Injectable event sink.
//!
//! Nodes report lifecycle events through an explicit `EventSink` handle
//! passed in at attachment time; there is no ambient process-wide logger
//! inside the engine. `ThreadSink` owns its worker thread and drains a
//! mutex-protected queue; `TracingSink` forwards synchronously to
//! `tracing`; `NullSink` drops everything.

use parking_lot::{Condvar, Mutex};
use sluice_core::Timestamp;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

/// A lifecycle event emitted by a producer node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeEvent {
    /// A transaction committed a delta.
    Committed { node: String, at: Timestamp },
    /// The backing content was replaced wholesale.
    Replaced { node: String, at: Timestamp },
    /// The producer completed.
    Completed { node: String, at: Timestamp },
    /// An observer subscribed.
    ObserverAttached { node: String },
    /// An observer detached.
    ObserverDetached { node: String },
}

impl NodeEvent {
    /// Name of the node that emitted the event.
    pub fn node(&self) -> &str {
        match self {
            NodeEvent::Committed { node, .. }
            | NodeEvent::Replaced { node, .. }
            | NodeEvent::Completed { node, .. }
            | NodeEvent::ObserverAttached { node }
            | NodeEvent::ObserverDetached { node } => node,
        }
    }
}

/// Destination for node lifecycle events.
pub trait EventSink: Send + Sync {
    /// Records one event. Must not block for long; called on commit paths.
    fn record(&self, event: NodeEvent);
}

/// Sink that forwards events straight to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: NodeEvent) {
        tracing::debug!(node = event.node(), ?event, "node event");
    }
}

/// Sink that discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: NodeEvent) {}
}

struct SinkQueue {
    events: Mutex<VecDeque<Option<NodeEvent>>>,
    available: Condvar,
}

/// Sink with an owned worker thread draining a queue.
///
/// `record` only enqueues; the handler runs on the worker. Dropping the
/// sink flushes the queue and joins the worker.
pub struct ThreadSink {
    queue: Arc<SinkQueue>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadSink {
    /// Spawns the worker; `handler` runs for every recorded event in
    /// arrival order.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(NodeEvent) + Send + 'static,
    {
        let queue = Arc::new(SinkQueue {
            events: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        });
        let worker_queue = queue.clone();
        let worker = std::thread::spawn(move || loop {
            let item = {
                let mut events = worker_queue.events.lock();
                loop {
                    match events.pop_front() {
                        Some(item) => break item,
                        None => worker_queue.available.wait(&mut events),
                    }
                }
            };
            match item {
                Some(event) => handler(event),
                None => return,
            }
        });
        Self {
            queue,
            worker: Some(worker),
        }
    }
}

impl EventSink for ThreadSink {
    fn record(&self, event: NodeEvent) {
        self.queue.events.lock().push_back(Some(event));
        self.queue.available.notify_one();
    }
}

impl Drop for ThreadSink {
    fn drop(&mut self) {
        self.queue.events.lock().push_back(None);
        self.queue.available.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_thread_sink_delivers_in_order() {
        let (tx, rx) = mpsc::channel();
        let sink = ThreadSink::new(move |event| {
            tx.send(event).unwrap();
        });

        for i in 0..10u64 {
            sink.record(NodeEvent::ObserverAttached {
                node: format!("n{i}"),
            });
        }
        drop(sink); // flushes and joins

        let nodes: Vec<String> = rx.iter().map(|e| e.node().to_string()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("n{i}")).collect();
        assert_eq!(nodes, expected);
    }

    #[test]
    fn test_null_sink() {
        NullSink.record(NodeEvent::ObserverDetached {
            node: "x".to_string(),
        });
    }
}
