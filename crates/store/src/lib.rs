//! Persisted listener-registration store abstraction.
//!
//! The event router keeps listener state in memory for the process
//! lifetime; only the *names* (and filters) of a subscriber's lazy
//! registrations survive restarts, through an implementation of
//! [`RegistrationStore`]. The router rehydrates from the store when a
//! subscriber's context loads and writes back only on explicit lazy
//! registration changes, never during rehydration.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use courier_types::{EventName, SubscriberId};
use serde_json::Value;

/// Keyed store of per-subscriber lazy-listener registrations.
///
/// Two independent records exist per subscriber: the set of event names
/// with *unfiltered* lazy listeners, and a `{event_name: [filter, ...]}`
/// object of *filtered* lazy registrations. The filtered record is kept
/// as an opaque [`Value`] so that a corrupted stored shape can still be
/// handed back to the router, which skips malformed entries instead of
/// failing the load.
#[async_trait]
pub trait RegistrationStore: Send + Sync + 'static {
    /// The error type returned by store operations.
    type Error: Debug + Error + Send + Sync + 'static;

    /// Event names the subscriber has registered unfiltered lazy
    /// listeners for. Unknown subscribers yield the empty set.
    async fn registered_events(
        &self,
        subscriber: &SubscriberId,
    ) -> Result<BTreeSet<EventName>, Self::Error>;

    /// Replace the subscriber's unfiltered lazy registration set.
    async fn set_registered_events(
        &self,
        subscriber: &SubscriberId,
        events: BTreeSet<EventName>,
    ) -> Result<(), Self::Error>;

    /// The subscriber's filtered lazy registrations, if any.
    async fn filtered_events(
        &self,
        subscriber: &SubscriberId,
    ) -> Result<Option<Value>, Self::Error>;

    /// Append a filter to the subscriber's list for `event_name`.
    async fn add_filter_to_event(
        &self,
        event_name: &EventName,
        subscriber: &SubscriberId,
        filter: &Value,
    ) -> Result<(), Self::Error>;

    /// Remove the first stored filter equal to `filter` from the
    /// subscriber's list for `event_name`. Removing a filter that is not
    /// present is a no-op.
    async fn remove_filter_from_event(
        &self,
        event_name: &EventName,
        subscriber: &SubscriberId,
        filter: &Value,
    ) -> Result<(), Self::Error>;
}
