use courier_types::ProcessId;
use thiserror::Error;

/// Errors that can occur during event delivery
#[derive(Debug, Error)]
pub enum TransportError {
    /// No route exists to the target process
    #[error("no route to {0}")]
    NoRoute(ProcessId),

    /// The target process rejected the delivery
    #[error("delivery rejected: {0}")]
    Rejected(String),

    /// The transport has shut down
    #[error("transport closed")]
    Closed,
}
