use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// An existing record under the key does not have the expected shape.
    #[error("registration record for {0} is malformed")]
    MalformedRecord(String),
}
