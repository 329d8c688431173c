//! Identifier types

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Scheme of the canonical service URL derived from a subscriber id.
const SERVICE_SCHEME: &str = "courier";

/// Maximum length of a subscriber id in bytes.
const MAX_SUBSCRIBER_ID_LEN: usize = 128;

/// Errors that can occur with subscriber id validation
#[derive(Error, Debug)]
pub enum SubscriberIdError {
    /// Id is empty
    #[error("Subscriber id cannot be empty")]
    Empty,

    /// Id is longer than the allowed maximum
    #[error("Subscriber id is too long: {0} bytes")]
    TooLong(usize),

    /// Id contains a character outside the URL-safe set
    #[error("Subscriber id contains invalid character: {0:?}")]
    InvalidCharacter(char),
}

/// The logical consumer identity that owns listeners.
///
/// Ids are restricted to a URL-safe charset (ASCII alphanumerics, `-`,
/// `_`) so that [`SubscriberId::service_url`] always forms a valid URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriberId(String);

impl SubscriberId {
    /// Create a new subscriber id after validation
    pub fn new(id: impl Into<String>) -> Result<Self, SubscriberIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(SubscriberIdError::Empty);
        }
        if id.len() > MAX_SUBSCRIBER_ID_LEN {
            return Err(SubscriberIdError::TooLong(id.len()));
        }
        if let Some(c) = id
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(SubscriberIdError::InvalidCharacter(c));
        }
        Ok(Self(id))
    }

    /// Get the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The canonical URL of the subscriber's service context.
    ///
    /// Lazy listeners are attached to this URL until a live process picks
    /// them up. The id charset is validated at construction, so the
    /// derived URL always parses.
    #[must_use]
    pub fn service_url(&self) -> Url {
        Url::parse(&format!("{SERVICE_SCHEME}://{}/", self.0))
            .expect("validated subscriber id forms a valid url")
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SubscriberId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for SubscriberId {
    type Error = SubscriberIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Execution context identifier (an isolation boundary)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextId(u64);

impl ContextId {
    /// Create a new context id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context-{}", self.0)
    }
}

/// Process identifier
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(u64);

impl ProcessId {
    /// Create a new process id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process-{}", self.0)
    }
}

/// Monotonically increasing id assigned to each delivered event
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DispatchId(u64);

impl DispatchId {
    /// Create a new dispatch id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a predicate matcher registered with the filter index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatcherId(u64);

impl MatcherId {
    /// Create a new matcher id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "matcher-{}", self.0)
    }
}
