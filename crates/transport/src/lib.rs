//! Event delivery abstraction.
//!
//! The router hands each matched target an [`EventEnvelope`]; a
//! transport implementation carries it to the target process. Specific
//! transports (in-memory, IPC, ...) live in separate crates.
//!
//! Transports handle:
//! - Payload serialization for the receiving process
//! - Per-process delivery queues
//! - Surfacing acknowledgements back to the router's ack interface
//!
//! Delivery must enqueue and return; it must never block on the
//! receiving process, since the router dispatches from a single
//! coordinator task.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;

use async_trait::async_trait;
use courier_types::{
    ContextId, DispatchId, EventName, FilteringInfo, ProcessId, SubscriberId, UserGestureState,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::TransportError as Error;
use error::TransportError;

/// Everything a process needs to route one delivered event to the right
/// in-process listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Monotonically increasing id for telemetry correlation
    pub dispatch_id: DispatchId,
    /// The subscriber the event is addressed to
    pub subscriber: SubscriberId,
    /// Target process
    pub process: ProcessId,
    /// Execution context the target process runs in
    pub context: ContextId,
    /// Name of the event
    pub event_name: EventName,
    /// Structured event payload
    pub args: Vec<Value>,
    /// Attributes for receiver-side sub-listener matching
    pub filtering_info: FilteringInfo,
    /// Whether the event carries a user gesture
    pub user_gesture: UserGestureState,
    /// True when the event waited in the activation queue before the
    /// target context came up
    pub queued_activation: bool,
}

/// Transport trait for delivering events to processes
#[async_trait]
pub trait EventTransport: Send + Sync + 'static {
    /// Deliver an envelope to its target process.
    ///
    /// The transport will:
    /// 1. Serialize the envelope for the receiving process
    /// 2. Queue it on the per-process delivery queue
    /// 3. Return without waiting for the process to handle it
    async fn deliver(&self, envelope: EventEnvelope) -> Result<(), TransportError>;
}
