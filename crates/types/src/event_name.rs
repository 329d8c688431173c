//! Validated event names.
//!
//! Event names are dotted identifiers such as `"alarms.on_fire"`. A name
//! may carry a single sub-event suffix separated by `/`
//! (`"alarms.on_fire/42"`); observers register against the base name and
//! see notifications for every sub-event variant.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur with event name validation
#[derive(Error, Debug)]
pub enum EventNameError {
    /// Name is empty
    #[error("Event name cannot be empty")]
    Empty,

    /// Name contains an invalid character
    #[error("Event name contains invalid character: {0:?}")]
    InvalidCharacter(char),

    /// Empty token between dots in the base name
    #[error("Invalid token in event name: {0}")]
    InvalidToken(String),

    /// More than one `/` separator
    #[error("Event name may contain at most one sub-event separator")]
    MultipleSeparators,

    /// A `/` separator with nothing after it
    #[error("Sub-event id cannot be empty")]
    EmptySubEventId,
}

/// A validated event name, optionally carrying a sub-event suffix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventName(String);

impl EventName {
    /// Create a new event name after validation
    pub fn new(name: impl Into<String>) -> Result<Self, EventNameError> {
        let name = name.into();
        validate_event_name(&name)?;
        Ok(Self(name))
    }

    /// Create an event name without validation (unsafe)
    ///
    /// # Safety
    /// This bypasses validation and should only be used when the name is
    /// known to be valid (e.g., from trusted internal sources)
    #[must_use]
    pub unsafe fn new_unchecked(name: String) -> Self {
        Self(name)
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned string
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// The name with any sub-event suffix stripped.
    ///
    /// `"alarms.on_fire/42"` and `"alarms.on_fire"` share the base name
    /// `"alarms.on_fire"`.
    #[must_use]
    pub fn base_name(&self) -> &str {
        match self.0.split_once('/') {
            Some((base, _)) => base,
            None => &self.0,
        }
    }

    /// The sub-event id, if the name carries one
    #[must_use]
    pub fn sub_event_id(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, sub)| sub)
    }

    /// Whether the name is a sub-event variant
    #[must_use]
    pub fn is_sub_event(&self) -> bool {
        self.0.contains('/')
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EventName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for EventName {
    type Error = EventNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for EventName {
    type Error = EventNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Validates an event name: a non-empty dotted base, at most one `/`
/// separator, and a non-empty sub-event id after it.
fn validate_event_name(name: &str) -> Result<(), EventNameError> {
    if name.is_empty() {
        return Err(EventNameError::Empty);
    }

    let mut parts = name.split('/');
    let base = parts.next().unwrap_or_default();
    let sub = parts.next();
    if parts.next().is_some() {
        return Err(EventNameError::MultipleSeparators);
    }

    if base.is_empty() {
        return Err(EventNameError::Empty);
    }
    for token in base.split('.') {
        if token.is_empty() {
            return Err(EventNameError::InvalidToken(
                "Empty token between dots".to_string(),
            ));
        }
        if let Some(c) = token
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-')
        {
            return Err(EventNameError::InvalidCharacter(c));
        }
    }

    if let Some(sub) = sub {
        if sub.is_empty() {
            return Err(EventNameError::EmptySubEventId);
        }
        if let Some(c) = sub
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-' && *c != '.')
        {
            return Err(EventNameError::InvalidCharacter(c));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_event_name_validation() {
        assert!(EventName::new("alarms.on_fire").is_ok());
        assert!(EventName::new("tabs.on-updated").is_ok());
        assert!(EventName::new("runtime.onStartup").is_ok());
        assert!(EventName::new("event1").is_ok());

        assert_matches!(EventName::new(""), Err(EventNameError::Empty));
        assert_matches!(
            EventName::new("foo..bar"),
            Err(EventNameError::InvalidToken(_))
        );
        assert_matches!(
            EventName::new("foo bar"),
            Err(EventNameError::InvalidCharacter(' '))
        );
        assert_matches!(
            EventName::new("foo.bar$"),
            Err(EventNameError::InvalidCharacter('$'))
        );
    }

    #[test]
    fn test_sub_event_names() {
        let name = EventName::new("alarms.on_fire/42").unwrap();
        assert_eq!(name.base_name(), "alarms.on_fire");
        assert_eq!(name.sub_event_id(), Some("42"));
        assert!(name.is_sub_event());

        let plain = EventName::new("alarms.on_fire").unwrap();
        assert_eq!(plain.base_name(), "alarms.on_fire");
        assert_eq!(plain.sub_event_id(), None);
        assert!(!plain.is_sub_event());

        assert_matches!(
            EventName::new("alarms.on_fire/42/7"),
            Err(EventNameError::MultipleSeparators)
        );
        assert_matches!(
            EventName::new("alarms.on_fire/"),
            Err(EventNameError::EmptySubEventId)
        );
        assert_matches!(EventName::new("/42"), Err(EventNameError::Empty));
    }

    #[test]
    fn test_display_and_conversions() {
        let name = EventName::new("tabs.on_created").unwrap();
        assert_eq!(name.to_string(), "tabs.on_created");
        assert_eq!(name.as_ref(), "tabs.on_created");
        assert_eq!(name.clone().into_string(), "tabs.on_created");

        let tried = EventName::try_from("tabs.on_created").unwrap();
        assert_eq!(tried, name);
    }

    #[test]
    fn test_serde_round_trip() {
        let name = EventName::new("storage.on_changed/9").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"storage.on_changed/9\"");
        let back: EventName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = EventName::new("a.first").unwrap();
        let b = EventName::new("b.second").unwrap();
        assert!(a < b);
    }
}
