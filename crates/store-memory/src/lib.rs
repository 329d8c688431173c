//! In-memory (single process) implementation of the listener
//! registration store, for tests and local development.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use courier_store::RegistrationStore;
use courier_types::{EventName, SubscriberId};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

#[derive(Debug, Default, Clone)]
struct SubscriberRecord {
    registered: BTreeSet<EventName>,
    filtered: Option<Value>,
}

impl SubscriberRecord {
    fn is_empty(&self) -> bool {
        self.registered.is_empty() && self.filtered.is_none()
    }
}

/// In-memory registration store.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistrationStore {
    map: Arc<Mutex<HashMap<SubscriberId, SubscriberRecord>>>,
}

impl MemoryRegistrationStore {
    /// Creates a new `MemoryRegistrationStore`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replace the subscriber's filtered-registration record wholesale.
    ///
    /// Normal writes go through
    /// [`RegistrationStore::add_filter_to_event`]; this setter exists so
    /// tests can plant arbitrary (including malformed) stored shapes.
    pub async fn set_filtered_events(&self, subscriber: &SubscriberId, filtered: Option<Value>) {
        let mut map = self.map.lock().await;
        let record = map.entry(subscriber.clone()).or_default();
        record.filtered = filtered;
        if record.is_empty() {
            map.remove(subscriber);
        }
    }
}

#[async_trait]
impl RegistrationStore for MemoryRegistrationStore {
    type Error = Error;

    async fn registered_events(
        &self,
        subscriber: &SubscriberId,
    ) -> Result<BTreeSet<EventName>, Self::Error> {
        let map = self.map.lock().await;
        Ok(map
            .get(subscriber)
            .map(|record| record.registered.clone())
            .unwrap_or_default())
    }

    async fn set_registered_events(
        &self,
        subscriber: &SubscriberId,
        events: BTreeSet<EventName>,
    ) -> Result<(), Self::Error> {
        let mut map = self.map.lock().await;
        let record = map.entry(subscriber.clone()).or_default();
        record.registered = events;
        if record.is_empty() {
            map.remove(subscriber);
        }
        Ok(())
    }

    async fn filtered_events(
        &self,
        subscriber: &SubscriberId,
    ) -> Result<Option<Value>, Self::Error> {
        let map = self.map.lock().await;
        Ok(map.get(subscriber).and_then(|record| record.filtered.clone()))
    }

    async fn add_filter_to_event(
        &self,
        event_name: &EventName,
        subscriber: &SubscriberId,
        filter: &Value,
    ) -> Result<(), Self::Error> {
        let mut map = self.map.lock().await;
        let record = map.entry(subscriber.clone()).or_default();
        let filtered = record
            .filtered
            .get_or_insert_with(|| Value::Object(Map::new()));
        let Some(by_event) = filtered.as_object_mut() else {
            return Err(Error::MalformedRecord(subscriber.to_string()));
        };
        let list = by_event
            .entry(event_name.as_str())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Some(entries) = list.as_array_mut() else {
            return Err(Error::MalformedRecord(subscriber.to_string()));
        };
        entries.push(filter.clone());
        Ok(())
    }

    async fn remove_filter_from_event(
        &self,
        event_name: &EventName,
        subscriber: &SubscriberId,
        filter: &Value,
    ) -> Result<(), Self::Error> {
        let mut map = self.map.lock().await;
        let Some(record) = map.get_mut(subscriber) else {
            return Ok(());
        };
        let Some(by_event) = record.filtered.as_mut().and_then(Value::as_object_mut) else {
            return Ok(());
        };
        if let Some(entries) = by_event
            .get_mut(event_name.as_str())
            .and_then(Value::as_array_mut)
        {
            if let Some(position) = entries.iter().position(|entry| entry == filter) {
                entries.remove(position);
            }
            if entries.is_empty() {
                by_event.remove(event_name.as_str());
            }
        }
        if by_event.is_empty() {
            record.filtered = None;
        }
        if record.is_empty() {
            map.remove(subscriber);
        }
        Ok(())
    }
}
