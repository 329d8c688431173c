//! Per-event-name matcher index.

use std::collections::{BTreeSet, HashMap};

use courier_types::{EventName, FilteringInfo, MatcherId};
use tracing::error;

use super::matcher::{EventMatcher, MatcherError};

struct IndexedMatcher {
    event_name: EventName,
    matcher: EventMatcher,
}

/// Registered predicate matchers, grouped by event name.
///
/// Ids are assigned monotonically and never reused within one index.
pub struct FilterIndex {
    next_id: u64,
    matchers: HashMap<MatcherId, IndexedMatcher>,
    by_event: HashMap<EventName, BTreeSet<MatcherId>>,
}

impl Default for FilterIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            matchers: HashMap::new(),
            by_event: HashMap::new(),
        }
    }

    /// Parse and register a filter under `event_name`.
    ///
    /// A malformed filter is rejected; the caller must not store a
    /// listener for it.
    pub fn add_matcher(
        &mut self,
        event_name: &EventName,
        filter: &serde_json::Value,
    ) -> Result<MatcherId, MatcherError> {
        let matcher = EventMatcher::parse(filter)?;
        let id = MatcherId::new(self.next_id);
        self.next_id += 1;
        self.matchers.insert(
            id,
            IndexedMatcher {
                event_name: event_name.clone(),
                matcher,
            },
        );
        self.by_event.entry(event_name.clone()).or_default().insert(id);
        Ok(id)
    }

    /// Remove a matcher, returning the event name it was registered
    /// under.
    ///
    /// Removing an unknown id is a contract violation: the registry
    /// creates and destroys matchers 1:1 with filtered listeners.
    pub fn remove_matcher(&mut self, id: MatcherId) -> Option<EventName> {
        let Some(indexed) = self.matchers.remove(&id) else {
            debug_assert!(false, "removing unknown matcher {id}");
            error!(%id, "attempted to remove unknown matcher");
            return None;
        };
        if let Some(ids) = self.by_event.get_mut(&indexed.event_name) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_event.remove(&indexed.event_name);
            }
        }
        Some(indexed.event_name)
    }

    /// Every matcher under `event_name` satisfied by `info`.
    #[must_use]
    pub fn match_event(&self, event_name: &EventName, info: &FilteringInfo) -> BTreeSet<MatcherId> {
        let Some(ids) = self.by_event.get(event_name) else {
            return BTreeSet::new();
        };
        ids.iter()
            .copied()
            .filter(|id| {
                self.matchers
                    .get(id)
                    .is_some_and(|indexed| indexed.matcher.matches(info))
            })
            .collect()
    }

    /// True iff no matcher of any event name is registered. Callers use
    /// this as a fast path to skip computing filtering attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Number of matchers registered under `event_name`
    #[must_use]
    pub fn matcher_count(&self, event_name: &EventName) -> usize {
        self.by_event.get(event_name).map_or(0, BTreeSet::len)
    }
}
