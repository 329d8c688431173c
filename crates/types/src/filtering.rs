//! Per-event filtering attributes.

use serde::{Deserialize, Serialize};
use url::Url;

/// Sparse attributes attached to an event, used purely for predicate
/// matching. Each attribute is independently present or absent.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteringInfo {
    /// URL the event pertains to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,

    /// Embedder instance the event originated from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<i64>,

    /// Service classification of the event source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,

    /// Window kind the event pertains to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_type: Option<String>,

    /// Whether the window is exposed through the default enumeration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_exposed_by_default: Option<bool>,
}

impl FilteringInfo {
    /// Info with no attributes set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the URL attribute
    #[must_use]
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Set the instance id attribute
    #[must_use]
    pub fn with_instance_id(mut self, instance_id: i64) -> Self {
        self.instance_id = Some(instance_id);
        self
    }

    /// Set the service type attribute
    #[must_use]
    pub fn with_service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    /// Set the window type attribute
    #[must_use]
    pub fn with_window_type(mut self, window_type: impl Into<String>) -> Self {
        self.window_type = Some(window_type.into());
        self
    }

    /// Set the window-exposed attribute
    #[must_use]
    pub fn with_window_exposed_by_default(mut self, exposed: bool) -> Self {
        self.window_exposed_by_default = Some(exposed);
        self
    }

    /// True when no attribute is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.instance_id.is_none()
            && self.service_type.is_none()
            && self.window_type.is_none()
            && self.window_exposed_by_default.is_none()
    }
}

/// Whether the event was produced under a user gesture.
///
/// Targets may treat gesture-carrying events as permission-granting, so
/// the state travels with the envelope.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserGestureState {
    /// Gesture state was not recorded
    #[default]
    Unknown,
    /// The event carries a user gesture
    Enabled,
    /// The event explicitly carries no user gesture
    NotEnabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_emptiness() {
        assert!(FilteringInfo::new().is_empty());

        let info = FilteringInfo::new()
            .with_url(Url::parse("http://www.google.com/").unwrap())
            .with_instance_id(7)
            .with_service_type("sync")
            .with_window_type("popup")
            .with_window_exposed_by_default(true);
        assert!(!info.is_empty());
        assert_eq!(info.instance_id, Some(7));
        assert_eq!(info.service_type.as_deref(), Some("sync"));
    }

    #[test]
    fn test_serde_skips_absent_attributes() {
        let json = serde_json::to_value(FilteringInfo::new()).unwrap();
        assert_eq!(json, serde_json::json!({}));

        let info = FilteringInfo::new().with_instance_id(3);
        let json = serde_json::to_value(info).unwrap();
        assert_eq!(json, serde_json::json!({"instance_id": 3}));
    }
}
