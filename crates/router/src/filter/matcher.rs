//! Parsed event filters.
//!
//! Filters arrive as opaque JSON dictionaries, e.g.
//! `{"url": [{"hostSuffix": "google.com"}], "instanceId": 3}`. Parsing
//! is strict: a malformed filter is a registration error and the caller
//! must not store a listener for it. Matching is lenient by design: a
//! filter with no conditions at all, and a `url` list containing one
//! empty condition object, both match every event.

use courier_types::FilteringInfo;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Errors produced while parsing a filter
#[derive(Debug, Clone, Error)]
pub enum MatcherError {
    /// Filter is not a JSON object
    #[error("filter must be a JSON object")]
    NotAnObject,

    /// Filter contains a key the matcher does not understand
    #[error("unknown filter key: {0}")]
    UnknownKey(String),

    /// A known key carries a value of the wrong shape
    #[error("invalid value for filter key: {0}")]
    InvalidValue(&'static str),
}

/// A parsed predicate, evaluated against an event's
/// [`FilteringInfo`].
///
/// Attributes are independent AND-ed constraints; the `url` condition
/// list is OR-ed internally. A constraint on an attribute the event
/// does not carry fails the match, with one exception: an empty URL
/// condition object matches any URL, including an absent one.
#[derive(Debug, Clone, Default)]
pub struct EventMatcher {
    url_conditions: Option<Vec<UrlCondition>>,
    instance_id: Option<i64>,
    service_type: Option<String>,
    window_types: Option<Vec<String>>,
    window_exposed_by_default: Option<bool>,
}

impl EventMatcher {
    /// Parse a filter dictionary.
    pub fn parse(filter: &Value) -> Result<Self, MatcherError> {
        let Some(object) = filter.as_object() else {
            return Err(MatcherError::NotAnObject);
        };

        let mut matcher = Self::default();
        for (key, value) in object {
            match key.as_str() {
                "url" => {
                    let Some(entries) = value.as_array() else {
                        return Err(MatcherError::InvalidValue("url"));
                    };
                    let conditions = entries
                        .iter()
                        .map(UrlCondition::parse)
                        .collect::<Result<Vec<_>, _>>()?;
                    matcher.url_conditions = Some(conditions);
                }
                "instanceId" => {
                    matcher.instance_id =
                        Some(value.as_i64().ok_or(MatcherError::InvalidValue("instanceId"))?);
                }
                "serviceType" => {
                    matcher.service_type = Some(
                        value
                            .as_str()
                            .ok_or(MatcherError::InvalidValue("serviceType"))?
                            .to_string(),
                    );
                }
                "windowTypes" => {
                    let Some(entries) = value.as_array() else {
                        return Err(MatcherError::InvalidValue("windowTypes"));
                    };
                    let types = entries
                        .iter()
                        .map(|entry| {
                            entry
                                .as_str()
                                .map(str::to_string)
                                .ok_or(MatcherError::InvalidValue("windowTypes"))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    matcher.window_types = Some(types);
                }
                "windowExposedByDefault" => {
                    matcher.window_exposed_by_default = Some(
                        value
                            .as_bool()
                            .ok_or(MatcherError::InvalidValue("windowExposedByDefault"))?,
                    );
                }
                other => return Err(MatcherError::UnknownKey(other.to_string())),
            }
        }
        Ok(matcher)
    }

    /// Evaluate the matcher against an event's filtering attributes.
    #[must_use]
    pub fn matches(&self, info: &FilteringInfo) -> bool {
        if let Some(expected) = self.instance_id
            && info.instance_id != Some(expected)
        {
            return false;
        }
        if let Some(expected) = &self.service_type
            && info.service_type.as_deref() != Some(expected.as_str())
        {
            return false;
        }
        if let Some(types) = &self.window_types {
            match &info.window_type {
                Some(window_type) if types.contains(window_type) => {}
                _ => return false,
            }
        }
        if let Some(expected) = self.window_exposed_by_default
            && info.window_exposed_by_default != Some(expected)
        {
            return false;
        }
        if let Some(conditions) = &self.url_conditions
            && !conditions
                .iter()
                .any(|condition| condition.matches(info.url.as_ref()))
        {
            return false;
        }
        true
    }
}

/// One entry of a `url` condition list. All set tests must pass
/// (AND); the URL string tests apply to the host, path, query, or the
/// whole serialized URL.
#[derive(Debug, Clone, Default)]
struct UrlCondition {
    host_equals: Option<String>,
    host_prefix: Option<String>,
    host_suffix: Option<String>,
    host_contains: Option<String>,
    path_equals: Option<String>,
    path_prefix: Option<String>,
    path_suffix: Option<String>,
    path_contains: Option<String>,
    query_equals: Option<String>,
    query_prefix: Option<String>,
    query_suffix: Option<String>,
    query_contains: Option<String>,
    url_equals: Option<String>,
    url_prefix: Option<String>,
    url_suffix: Option<String>,
    url_contains: Option<String>,
    schemes: Option<Vec<String>>,
    ports: Option<Vec<PortRule>>,
}

#[derive(Debug, Clone, Copy)]
enum PortRule {
    Single(u16),
    Range(u16, u16),
}

impl PortRule {
    const fn contains(self, port: u16) -> bool {
        match self {
            Self::Single(expected) => port == expected,
            Self::Range(low, high) => port >= low && port <= high,
        }
    }
}

impl UrlCondition {
    fn parse(value: &Value) -> Result<Self, MatcherError> {
        let Some(object) = value.as_object() else {
            return Err(MatcherError::InvalidValue("url"));
        };

        let mut condition = Self::default();
        for (key, value) in object {
            let slot = match key.as_str() {
                "hostEquals" => &mut condition.host_equals,
                "hostPrefix" => &mut condition.host_prefix,
                "hostSuffix" => &mut condition.host_suffix,
                "hostContains" => &mut condition.host_contains,
                "pathEquals" => &mut condition.path_equals,
                "pathPrefix" => &mut condition.path_prefix,
                "pathSuffix" => &mut condition.path_suffix,
                "pathContains" => &mut condition.path_contains,
                "queryEquals" => &mut condition.query_equals,
                "queryPrefix" => &mut condition.query_prefix,
                "querySuffix" => &mut condition.query_suffix,
                "queryContains" => &mut condition.query_contains,
                "urlEquals" => &mut condition.url_equals,
                "urlPrefix" => &mut condition.url_prefix,
                "urlSuffix" => &mut condition.url_suffix,
                "urlContains" => &mut condition.url_contains,
                "schemes" => {
                    condition.schemes = Some(parse_string_list(value, "schemes")?);
                    continue;
                }
                "ports" => {
                    condition.ports = Some(parse_ports(value)?);
                    continue;
                }
                other => return Err(MatcherError::UnknownKey(other.to_string())),
            };
            *slot = Some(
                value
                    .as_str()
                    .ok_or(MatcherError::InvalidValue("url"))?
                    .to_string(),
            );
        }
        Ok(condition)
    }

    fn is_empty(&self) -> bool {
        self.host_equals.is_none()
            && self.host_prefix.is_none()
            && self.host_suffix.is_none()
            && self.host_contains.is_none()
            && self.path_equals.is_none()
            && self.path_prefix.is_none()
            && self.path_suffix.is_none()
            && self.path_contains.is_none()
            && self.query_equals.is_none()
            && self.query_prefix.is_none()
            && self.query_suffix.is_none()
            && self.query_contains.is_none()
            && self.url_equals.is_none()
            && self.url_prefix.is_none()
            && self.url_suffix.is_none()
            && self.url_contains.is_none()
            && self.schemes.is_none()
            && self.ports.is_none()
    }

    fn matches(&self, url: Option<&Url>) -> bool {
        // An empty condition matches everything, even an absent URL.
        if self.is_empty() {
            return true;
        }
        let Some(url) = url else {
            return false;
        };

        let host = url.host_str().unwrap_or_default();
        let path = url.path();
        let query = url.query().unwrap_or_default();
        let full = url.as_str();

        string_tests_pass(
            host,
            &self.host_equals,
            &self.host_prefix,
            &self.host_suffix,
            &self.host_contains,
        ) && string_tests_pass(
            path,
            &self.path_equals,
            &self.path_prefix,
            &self.path_suffix,
            &self.path_contains,
        ) && string_tests_pass(
            query,
            &self.query_equals,
            &self.query_prefix,
            &self.query_suffix,
            &self.query_contains,
        ) && string_tests_pass(
            full,
            &self.url_equals,
            &self.url_prefix,
            &self.url_suffix,
            &self.url_contains,
        ) && self
            .schemes
            .as_ref()
            .is_none_or(|schemes| schemes.iter().any(|scheme| scheme == url.scheme()))
            && self.ports.as_ref().is_none_or(|ports| {
                url.port_or_known_default()
                    .is_some_and(|port| ports.iter().any(|rule| rule.contains(port)))
            })
    }
}

fn string_tests_pass(
    subject: &str,
    equals: &Option<String>,
    prefix: &Option<String>,
    suffix: &Option<String>,
    contains: &Option<String>,
) -> bool {
    equals.as_ref().is_none_or(|expected| subject == expected)
        && prefix
            .as_ref()
            .is_none_or(|expected| subject.starts_with(expected))
        && suffix
            .as_ref()
            .is_none_or(|expected| subject.ends_with(expected))
        && contains
            .as_ref()
            .is_none_or(|expected| subject.contains(expected.as_str()))
}

fn parse_string_list(value: &Value, key: &'static str) -> Result<Vec<String>, MatcherError> {
    let Some(entries) = value.as_array() else {
        return Err(MatcherError::InvalidValue(key));
    };
    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .map(str::to_string)
                .ok_or(MatcherError::InvalidValue(key))
        })
        .collect()
}

/// Ports are either single integers or two-element `[low, high]`
/// ranges, e.g. `[80, [1000, 1200]]`.
fn parse_ports(value: &Value) -> Result<Vec<PortRule>, MatcherError> {
    let Some(entries) = value.as_array() else {
        return Err(MatcherError::InvalidValue("ports"));
    };
    entries
        .iter()
        .map(|entry| match entry {
            Value::Number(_) => as_port(entry).map(PortRule::Single),
            Value::Array(pair) if pair.len() == 2 => {
                Ok(PortRule::Range(as_port(&pair[0])?, as_port(&pair[1])?))
            }
            _ => Err(MatcherError::InvalidValue("ports")),
        })
        .collect()
}

fn as_port(value: &Value) -> Result<u16, MatcherError> {
    value
        .as_u64()
        .and_then(|port| u16::try_from(port).ok())
        .ok_or(MatcherError::InvalidValue("ports"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn info_with_url(url: &str) -> FilteringInfo {
        FilteringInfo::new().with_url(Url::parse(url).unwrap())
    }

    #[test]
    fn test_host_suffix() {
        let matcher =
            EventMatcher::parse(&json!({"url": [{"hostSuffix": "google.com"}]})).unwrap();
        assert!(matcher.matches(&info_with_url("http://www.google.com/")));
        assert!(!matcher.matches(&info_with_url("http://www.yahoo.com/")));
        assert!(!matcher.matches(&FilteringInfo::new()));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let matcher = EventMatcher::parse(&json!({})).unwrap();
        assert!(matcher.matches(&FilteringInfo::new()));
        assert!(matcher.matches(&info_with_url("http://example.com/")));
    }

    #[test]
    fn test_empty_url_condition_matches_absent_url() {
        // A list containing one empty condition object is "match
        // anything", same as no list at all.
        let matcher = EventMatcher::parse(&json!({"url": [{}]})).unwrap();
        assert!(matcher.matches(&FilteringInfo::new()));
        assert!(matcher.matches(&info_with_url("http://example.com/")));
    }

    #[test]
    fn test_empty_url_list_matches_nothing() {
        let matcher = EventMatcher::parse(&json!({"url": []})).unwrap();
        assert!(!matcher.matches(&FilteringInfo::new()));
        assert!(!matcher.matches(&info_with_url("http://example.com/")));
    }

    #[test]
    fn test_conditions_are_ored() {
        let matcher = EventMatcher::parse(&json!({
            "url": [{"hostSuffix": "google.com"}, {"hostSuffix": "yahoo.com"}]
        }))
        .unwrap();
        assert!(matcher.matches(&info_with_url("http://www.google.com/")));
        assert!(matcher.matches(&info_with_url("http://mail.yahoo.com/")));
        assert!(!matcher.matches(&info_with_url("http://bing.com/")));
    }

    #[test]
    fn test_tests_within_condition_are_anded() {
        let matcher = EventMatcher::parse(&json!({
            "url": [{"hostSuffix": "example.com", "pathPrefix": "/api"}]
        }))
        .unwrap();
        assert!(matcher.matches(&info_with_url("https://www.example.com/api/v1")));
        assert!(!matcher.matches(&info_with_url("https://www.example.com/other")));
        assert!(!matcher.matches(&info_with_url("https://elsewhere.org/api/v1")));
    }

    #[test]
    fn test_schemes_and_ports() {
        let matcher = EventMatcher::parse(&json!({
            "url": [{"schemes": ["https"], "ports": [443, [8000, 8100]]}]
        }))
        .unwrap();
        assert!(matcher.matches(&info_with_url("https://example.com/")));
        assert!(matcher.matches(&info_with_url("https://example.com:8080/")));
        assert!(!matcher.matches(&info_with_url("http://example.com/")));
        assert!(!matcher.matches(&info_with_url("https://example.com:9000/")));
    }

    #[test]
    fn test_non_url_attributes() {
        let matcher = EventMatcher::parse(&json!({
            "instanceId": 3,
            "serviceType": "sync",
            "windowTypes": ["popup", "panel"],
            "windowExposedByDefault": true
        }))
        .unwrap();

        let matching = FilteringInfo::new()
            .with_instance_id(3)
            .with_service_type("sync")
            .with_window_type("popup")
            .with_window_exposed_by_default(true);
        assert!(matcher.matches(&matching));

        let wrong_instance = FilteringInfo::new()
            .with_instance_id(4)
            .with_service_type("sync")
            .with_window_type("popup")
            .with_window_exposed_by_default(true);
        assert!(!matcher.matches(&wrong_instance));

        // A constrained attribute the event does not carry fails.
        assert!(!matcher.matches(&FilteringInfo::new()));
    }

    #[test]
    fn test_malformed_filters_rejected() {
        assert_matches!(
            EventMatcher::parse(&json!([1, 2])),
            Err(MatcherError::NotAnObject)
        );
        assert_matches!(
            EventMatcher::parse(&json!({"bogus": 1})),
            Err(MatcherError::UnknownKey(_))
        );
        assert_matches!(
            EventMatcher::parse(&json!({"url": {"hostSuffix": "a"}})),
            Err(MatcherError::InvalidValue("url"))
        );
        assert_matches!(
            EventMatcher::parse(&json!({"url": [{"hostSuffix": 9}]})),
            Err(MatcherError::InvalidValue("url"))
        );
        assert_matches!(
            EventMatcher::parse(&json!({"instanceId": "three"})),
            Err(MatcherError::InvalidValue("instanceId"))
        );
        assert_matches!(
            EventMatcher::parse(&json!({"url": [{"ports": [[80]]}]})),
            Err(MatcherError::InvalidValue("ports"))
        );
    }
}
