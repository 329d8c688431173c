//! Error types for the event router

use std::fmt;

use thiserror::Error;

/// Result type for router operations
pub type RouterResult<T> = Result<T, Error>;

/// Main error type for the event router
#[derive(Debug, Error)]
pub struct Error {
    /// Error kind
    kind: ErrorKind,
    /// Error context
    context: ErrorContext,
}

impl Error {
    /// Create a new error
    #[must_use]
    pub const fn new(kind: ErrorKind, context: ErrorContext) -> Self {
        Self { kind, context }
    }

    /// Create error with string context
    pub fn with_context(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: ErrorContext::Message(context.into()),
        }
    }

    /// Get error kind
    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Get error context
    #[must_use]
    pub const fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::with_context(ErrorKind::Configuration, msg)
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::with_context(ErrorKind::InvalidState, msg)
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::with_context(ErrorKind::Store, msg)
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::with_context(ErrorKind::Transport, msg)
    }

    /// Create a service unavailable error
    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::with_context(ErrorKind::ServiceUnavailable, msg)
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_context(ErrorKind::Internal, msg)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            ErrorContext::Message(msg) => write!(f, "{}: {}", self.kind, msg),
            ErrorContext::Chain { message, source } => {
                write!(f, "{}: {} (caused by: {})", self.kind, message, source)
            }
        }
    }
}

/// Error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration error
    Configuration,
    /// Invalid state for operation
    InvalidState,
    /// Registration store error
    Store,
    /// Transport error
    Transport,
    /// The router actor has stopped
    ServiceUnavailable,
    /// Internal error
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration error"),
            Self::InvalidState => write!(f, "Invalid state"),
            Self::Store => write!(f, "Store error"),
            Self::Transport => write!(f, "Transport error"),
            Self::ServiceUnavailable => write!(f, "Service unavailable"),
            Self::Internal => write!(f, "Internal error"),
        }
    }
}

/// Error context
#[derive(Debug)]
pub enum ErrorContext {
    /// Simple message
    Message(String),
    /// Error chain with source
    Chain {
        /// Error message
        message: String,
        /// Source error
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<courier_transport::Error> for Error {
    fn from(err: courier_transport::Error) -> Self {
        Self {
            kind: ErrorKind::Transport,
            context: ErrorContext::Chain {
                message: "Event delivery failed".to_string(),
                source: Box::new(err),
            },
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self {
            kind: ErrorKind::Internal,
            context: ErrorContext::Chain {
                message: "Task join error".to_string(),
                source: Box::new(err),
            },
        }
    }
}
