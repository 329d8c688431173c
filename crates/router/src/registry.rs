//! The authoritative listener store.
//!
//! Listener records live in a single arena addressed by integer
//! handles; the by-event-name and by-matcher-id structures map keys to
//! handles. Removal is swap-remove with index fixup for the displaced
//! record.
//!
//! Matching takes one of two paths. An event name that has never seen a
//! filtered listener returns every record stored under the name, with
//! no predicate evaluation. Once a name is marked filtered it consults
//! the [`FilterIndex`] for the registry's lifetime; an unfiltered
//! listener under such a name is not returned. That conservatism is
//! preserved behavior, not an oversight: callers that mix filtered and
//! unfiltered listeners under one name opted into filtered routing for
//! it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use courier_types::{EventName, FilteringInfo, MatcherId, ProcessId, SubscriberId};
use serde_json::Value;
use tracing::{debug, warn};

use crate::filter::FilterIndex;
use crate::foundation::{Listener, RegistryDelegate};

/// Owns every [`Listener`] record, keyed by event name.
#[derive(Default)]
pub struct ListenerRegistry {
    /// Arena of listener records
    listeners: Vec<Listener>,
    /// Event name -> arena handles
    by_name: HashMap<EventName, Vec<usize>>,
    /// Matcher id -> arena handle, for filtered listeners
    by_matcher: HashMap<MatcherId, usize>,
    /// Event names that have ever seen a filtered listener
    filtered_names: HashSet<EventName>,
    filter_index: FilterIndex,
    delegate: Option<Arc<dyn RegistryDelegate>>,
}

impl ListenerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter_index: FilterIndex::new(),
            ..Self::default()
        }
    }

    /// Install the delegate notified on every individual add and remove
    pub fn set_delegate(&mut self, delegate: Arc<dyn RegistryDelegate>) {
        self.delegate = Some(delegate);
    }

    /// Store a listener.
    ///
    /// Returns `false` without storing anything if an identical
    /// listener already exists, or if the listener carries a filter the
    /// matcher cannot parse.
    pub fn add_listener(&mut self, mut listener: Listener) -> bool {
        if self.find(&listener).is_some() {
            return false;
        }
        if let Some(filter) = &listener.filter {
            match self.filter_index.add_matcher(&listener.event_name, filter) {
                Ok(id) => {
                    listener.matcher_id = Some(id);
                    self.filtered_names.insert(listener.event_name.clone());
                }
                Err(err) => {
                    debug!(
                        subscriber = %listener.subscriber,
                        event = %listener.event_name,
                        %err,
                        "rejecting listener with malformed filter"
                    );
                    return false;
                }
            }
        }

        let handle = self.listeners.len();
        self.by_name
            .entry(listener.event_name.clone())
            .or_default()
            .push(handle);
        if let Some(id) = listener.matcher_id {
            self.by_matcher.insert(id, handle);
        }
        self.listeners.push(listener);
        if let Some(delegate) = &self.delegate {
            delegate.on_listener_added(&self.listeners[handle]);
        }
        true
    }

    /// Remove the stored listener equal to `listener`.
    ///
    /// Removal is equality-based, never identity-based; the candidate's
    /// matcher id is ignored during comparison.
    pub fn remove_listener(&mut self, listener: &Listener) -> bool {
        let Some(handle) = self.find(listener) else {
            return false;
        };
        let removed = self.remove_at(handle);
        if let Some(delegate) = &self.delegate {
            delegate.on_listener_removed(&removed);
        }
        true
    }

    /// Remove every listener owned by `subscriber`, across all event
    /// names. The delegate is notified once per removed record.
    pub fn remove_listeners_for_subscriber(&mut self, subscriber: &SubscriberId) {
        self.remove_all(|listener| &listener.subscriber == subscriber);
    }

    /// Remove every listener attached to `process`, across all
    /// subscribers and event names. Triggered when a process
    /// terminates.
    pub fn remove_listeners_for_process(&mut self, process: ProcessId) {
        self.remove_all(|listener| {
            listener
                .process_handle()
                .is_some_and(|handle| handle.process == process)
        });
    }

    /// Whether any listener exists for `event_name`
    #[must_use]
    pub fn has_listener_for_event(&self, event_name: &EventName) -> bool {
        self.by_name.contains_key(event_name)
    }

    /// Whether `subscriber` has a listener for `event_name`
    #[must_use]
    pub fn has_listener_for_subscriber(
        &self,
        subscriber: &SubscriberId,
        event_name: &EventName,
    ) -> bool {
        self.by_name.get(event_name).is_some_and(|handles| {
            handles
                .iter()
                .any(|&handle| &self.listeners[handle].subscriber == subscriber)
        })
    }

    /// Whether `subscriber` has any listener attached to `process`
    #[must_use]
    pub fn has_process_listener(&self, process: ProcessId, subscriber: &SubscriberId) -> bool {
        self.listeners.iter().any(|listener| {
            &listener.subscriber == subscriber
                && listener
                    .process_handle()
                    .is_some_and(|handle| handle.process == process)
        })
    }

    /// The listeners interested in an event, as a point-in-time
    /// copy-out view.
    #[must_use]
    pub fn listeners_for_event(
        &self,
        event_name: &EventName,
        filtering_info: &FilteringInfo,
    ) -> Vec<Listener> {
        if !self.filtered_names.contains(event_name) {
            return self
                .by_name
                .get(event_name)
                .map(|handles| {
                    handles
                        .iter()
                        .map(|&handle| self.listeners[handle].clone())
                        .collect()
                })
                .unwrap_or_default();
        }
        self.filter_index
            .match_event(event_name, filtering_info)
            .into_iter()
            .filter_map(|id| {
                self.by_matcher
                    .get(&id)
                    .map(|&handle| self.listeners[handle].clone())
            })
            .collect()
    }

    /// Rehydrate a subscriber's unfiltered lazy listeners from
    /// persisted registration data.
    pub fn load_unfiltered_lazy_listeners(
        &mut self,
        subscriber: &SubscriberId,
        events: BTreeSet<EventName>,
    ) {
        for event_name in events {
            self.add_listener(Listener::lazy(event_name, subscriber.clone(), None));
        }
    }

    /// Rehydrate a subscriber's filtered lazy listeners from persisted
    /// registration data.
    ///
    /// The stored shape is `{event_name: [filter, ...]}`. Malformed
    /// entries register nothing and never fail the load; persisted data
    /// survives restarts and version skew, so corruption is a runtime
    /// condition here rather than a contract violation.
    pub fn load_filtered_lazy_listeners(&mut self, subscriber: &SubscriberId, filtered: &Value) {
        let Some(by_event) = filtered.as_object() else {
            warn!(%subscriber, "persisted filtered registrations are not an object; skipping");
            return;
        };
        for (raw_name, filters) in by_event {
            let Ok(event_name) = EventName::new(raw_name.clone()) else {
                warn!(%subscriber, name = %raw_name, "skipping invalid persisted event name");
                continue;
            };
            let Some(filters) = filters.as_array() else {
                warn!(
                    %subscriber,
                    event = %event_name,
                    "persisted filters are not a list; skipping entry"
                );
                continue;
            };
            for filter in filters {
                self.add_listener(Listener::lazy(
                    event_name.clone(),
                    subscriber.clone(),
                    Some(filter.clone()),
                ));
            }
        }
    }

    /// Whether any filtered listener is registered at all; callers skip
    /// computing filtering attributes when not.
    #[must_use]
    pub fn has_filters(&self) -> bool {
        !self.filter_index.is_empty()
    }

    /// Number of listeners stored under `event_name`
    #[must_use]
    pub fn listener_count(&self, event_name: &EventName) -> usize {
        self.by_name.get(event_name).map_or(0, Vec::len)
    }

    /// Number of matchers registered under `event_name`
    #[must_use]
    pub fn matcher_count(&self, event_name: &EventName) -> usize {
        self.filter_index.matcher_count(event_name)
    }

    /// Arena handle of the stored listener equal to the candidate
    fn find(&self, listener: &Listener) -> Option<usize> {
        self.by_name.get(&listener.event_name).and_then(|handles| {
            handles
                .iter()
                .copied()
                .find(|&handle| &self.listeners[handle] == listener)
        })
    }

    fn remove_all(&mut self, mut predicate: impl FnMut(&Listener) -> bool) {
        loop {
            let Some(handle) = self.listeners.iter().position(&mut predicate) else {
                break;
            };
            let removed = self.remove_at(handle);
            if let Some(delegate) = &self.delegate {
                delegate.on_listener_removed(&removed);
            }
        }
    }

    /// Swap-remove the record at `handle` and fix up every index entry
    /// referring to the displaced last record.
    fn remove_at(&mut self, handle: usize) -> Listener {
        let last = self.listeners.len() - 1;
        let removed = self.listeners.swap_remove(handle);

        if let Some(handles) = self.by_name.get_mut(&removed.event_name) {
            handles.retain(|&h| h != handle);
        }
        if handle != last {
            // The record previously at `last` now lives at `handle`.
            let moved_name = self.listeners[handle].event_name.clone();
            if let Some(handles) = self.by_name.get_mut(&moved_name) {
                for h in handles.iter_mut() {
                    if *h == last {
                        *h = handle;
                    }
                }
            }
            if let Some(id) = self.listeners[handle].matcher_id {
                self.by_matcher.insert(id, handle);
            }
        }
        if self
            .by_name
            .get(&removed.event_name)
            .is_some_and(Vec::is_empty)
        {
            self.by_name.remove(&removed.event_name);
        }
        if let Some(id) = removed.matcher_id {
            self.by_matcher.remove(&id);
            self.filter_index.remove_matcher(id);
        }
        removed
    }
}
