//! In-memory event transport implementation for testing
//!
//! Routes envelopes to per-process channels within the same OS process,
//! perfect for tests and single-process embedding. A capture log keeps
//! every successfully delivered envelope in delivery order.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::sync::Arc;

use async_trait::async_trait;
use courier_transport::error::TransportError;
use courier_transport::{EventEnvelope, EventTransport};
use courier_types::ProcessId;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

/// Memory transport implementation
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    queues: Arc<DashMap<ProcessId, flume::Sender<EventEnvelope>>>,
    log: Arc<Mutex<Vec<EventEnvelope>>>,
}

impl MemoryTransport {
    /// Create a new memory transport with no processes attached
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a process and return the receiving end of its delivery
    /// queue. Attaching an already-attached process replaces its queue.
    pub fn open_process(&self, process: ProcessId) -> flume::Receiver<EventEnvelope> {
        let (tx, rx) = flume::unbounded();
        self.queues.insert(process, tx);
        debug!("memory transport attached {process}");
        rx
    }

    /// Detach a process; subsequent deliveries to it fail with
    /// [`TransportError::NoRoute`].
    pub fn close_process(&self, process: ProcessId) {
        self.queues.remove(&process);
        debug!("memory transport detached {process}");
    }

    /// Every envelope delivered so far, in delivery order.
    #[must_use]
    pub fn deliveries(&self) -> Vec<EventEnvelope> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl EventTransport for MemoryTransport {
    async fn deliver(&self, envelope: EventEnvelope) -> Result<(), TransportError> {
        let process = envelope.process;
        let Some(queue) = self.queues.get(&process) else {
            return Err(TransportError::NoRoute(process));
        };
        if queue.send(envelope.clone()).is_err() {
            // Receiver dropped; the process is gone.
            drop(queue);
            self.queues.remove(&process);
            return Err(TransportError::NoRoute(process));
        }
        self.log.lock().push(envelope);
        Ok(())
    }
}
