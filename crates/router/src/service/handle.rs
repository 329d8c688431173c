//! Cloneable client handle for a running router.

use std::collections::BTreeSet;
use std::sync::Arc;

use courier_types::{ContextId, EventName, ProcessId, SubscriberId};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, RouterResult};
use crate::foundation::{Event, ProcessHandle, RouterObserver};
use crate::stats::{DispatchStats, DispatchStatsSnapshot};

use super::commands::RouterCommand;
use super::observers::ObserverRegistry;

/// Handle to a running [`EventRouter`](super::EventRouter).
///
/// Cheap to clone and safe to share across tasks. Registration and
/// query calls wait for the actor's answer; dispatch and lifecycle
/// notifications only enqueue, so producers never block behind a slow
/// dispatch.
///
/// Every method fails with [`ErrorKind::ServiceUnavailable`](crate::ErrorKind::ServiceUnavailable)
/// once the router has stopped.
#[derive(Clone)]
pub struct RouterHandle {
    command_tx: flume::Sender<RouterCommand>,
    observers: Arc<ObserverRegistry>,
    stats: Arc<DispatchStats>,
}

impl RouterHandle {
    pub(crate) const fn new(
        command_tx: flume::Sender<RouterCommand>,
        observers: Arc<ObserverRegistry>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            command_tx,
            observers,
            stats,
        }
    }

    async fn send(&self, command: RouterCommand) -> RouterResult<()> {
        self.command_tx
            .send_async(command)
            .await
            .map_err(|_| Error::service_unavailable("router stopped"))
    }

    async fn query<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> RouterCommand,
    ) -> RouterResult<R> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await
            .map_err(|_| Error::service_unavailable("router stopped"))
    }

    // Registration

    /// Register a live listener for `subscriber` in `process`,
    /// optionally narrowed by a predicate filter.
    ///
    /// Returns `false` if an equal listener was already registered, or
    /// if the filter is one the predicate dialect rejects.
    pub async fn add_listener(
        &self,
        event_name: EventName,
        subscriber: SubscriberId,
        process: ProcessHandle,
        filter: Option<Value>,
    ) -> RouterResult<bool> {
        self.query(|reply| RouterCommand::AddListener {
            event_name,
            subscriber,
            process: Some(process),
            filter,
            reply,
        })
        .await
    }

    /// Remove a live listener previously added with [`add_listener`](Self::add_listener).
    pub async fn remove_listener(
        &self,
        event_name: EventName,
        subscriber: SubscriberId,
        process: ProcessHandle,
        filter: Option<Value>,
    ) -> RouterResult<bool> {
        self.query(|reply| RouterCommand::RemoveListener {
            event_name,
            subscriber,
            process: Some(process),
            filter,
            reply,
        })
        .await
    }

    /// Register a lazy listener for `subscriber`, persisting the
    /// registration so it survives restarts. A filter persists to the
    /// subscriber's filtered record, an unfiltered registration to its
    /// event-name set.
    pub async fn add_lazy_listener(
        &self,
        event_name: EventName,
        subscriber: SubscriberId,
        filter: Option<Value>,
    ) -> RouterResult<bool> {
        self.query(|reply| RouterCommand::AddListener {
            event_name,
            subscriber,
            process: None,
            filter,
            reply,
        })
        .await
    }

    /// Remove a lazy listener and its persisted registration.
    pub async fn remove_lazy_listener(
        &self,
        event_name: EventName,
        subscriber: SubscriberId,
        filter: Option<Value>,
    ) -> RouterResult<bool> {
        self.query(|reply| RouterCommand::RemoveListener {
            event_name,
            subscriber,
            process: None,
            filter,
            reply,
        })
        .await
    }

    /// Register a live filtered listener. With `also_register_lazy` a
    /// matching lazy listener is registered and persisted alongside it.
    ///
    /// A filter the predicate dialect rejects registers nothing and
    /// returns `false`.
    pub async fn add_filtered_listener(
        &self,
        event_name: EventName,
        subscriber: SubscriberId,
        process: ProcessHandle,
        filter: Value,
        also_register_lazy: bool,
    ) -> RouterResult<bool> {
        self.query(|reply| RouterCommand::AddFilteredListener {
            event_name,
            subscriber,
            process,
            filter,
            also_register_lazy,
            reply,
        })
        .await
    }

    /// Remove a live filtered listener; with `remove_lazy` the matching
    /// lazy listener and its persisted filter go too.
    pub async fn remove_filtered_listener(
        &self,
        event_name: EventName,
        subscriber: SubscriberId,
        process: ProcessHandle,
        filter: Value,
        remove_lazy: bool,
    ) -> RouterResult<bool> {
        self.query(|reply| RouterCommand::RemoveFilteredListener {
            event_name,
            subscriber,
            process,
            filter,
            remove_lazy,
            reply,
        })
        .await
    }

    /// Drop every listener belonging to `subscriber`, live and lazy.
    /// Persisted registrations are untouched, so the subscriber's lazy
    /// set can be rehydrated later.
    pub async fn remove_listeners_for_subscriber(
        &self,
        subscriber: SubscriberId,
    ) -> RouterResult<()> {
        self.query(|reply| RouterCommand::RemoveListenersForSubscriber { subscriber, reply })
            .await
    }

    /// Drop every live listener registered from `process`.
    pub async fn remove_listeners_for_process(&self, process: ProcessId) -> RouterResult<()> {
        self.query(|reply| RouterCommand::RemoveListenersForProcess { process, reply })
            .await
    }

    /// Recreate lazy listeners for `events` without writing to the
    /// store.
    pub async fn load_unfiltered_lazy_listeners(
        &self,
        subscriber: SubscriberId,
        events: BTreeSet<EventName>,
    ) -> RouterResult<()> {
        self.query(|reply| RouterCommand::LoadUnfilteredLazyListeners {
            subscriber,
            events,
            reply,
        })
        .await
    }

    /// Recreate filtered lazy listeners from a persisted filter map
    /// without writing to the store. Malformed entries are skipped.
    pub async fn load_filtered_lazy_listeners(
        &self,
        subscriber: SubscriberId,
        filtered: Value,
    ) -> RouterResult<()> {
        self.query(|reply| RouterCommand::LoadFilteredLazyListeners {
            subscriber,
            filtered,
            reply,
        })
        .await
    }

    /// Rehydrate all of a subscriber's persisted lazy listeners,
    /// unfiltered and filtered, from the registration store.
    pub async fn notify_subscriber_loaded(&self, subscriber: SubscriberId) -> RouterResult<()> {
        self.query(|reply| RouterCommand::SubscriberLoaded { subscriber, reply })
            .await
    }

    // Dispatch

    /// Dispatch `event` to every matching listener.
    pub async fn broadcast(&self, event: Event) -> RouterResult<()> {
        self.send(RouterCommand::Broadcast { event }).await
    }

    /// Dispatch `event` to `subscriber`'s matching listeners only.
    pub async fn dispatch_to_subscriber(
        &self,
        subscriber: SubscriberId,
        event: Event,
    ) -> RouterResult<()> {
        self.send(RouterCommand::DispatchToSubscriber { subscriber, event })
            .await
    }

    /// Dispatch `event` to `subscriber`, registering a temporary lazy
    /// listener first if the subscriber has none, so a suspended
    /// subscriber is woken even before its first registration.
    pub async fn dispatch_with_lazy_fallback(
        &self,
        subscriber: SubscriberId,
        event: Event,
    ) -> RouterResult<()> {
        self.send(RouterCommand::DispatchWithLazyFallback { subscriber, event })
            .await
    }

    // Lifecycle

    /// Acknowledge receipt of one delivered event. When a suspendable
    /// context's last outstanding event is acked its lifecycle is told
    /// the context is idle.
    pub async fn on_event_ack(
        &self,
        context: ContextId,
        subscriber: SubscriberId,
    ) -> RouterResult<()> {
        self.send(RouterCommand::EventAck {
            context,
            subscriber,
        })
        .await
    }

    /// A previously requested context activation completed; queued
    /// events for it are dispatched in arrival order.
    pub async fn notify_context_loaded(
        &self,
        subscriber: SubscriberId,
        process: ProcessHandle,
    ) -> RouterResult<()> {
        self.send(RouterCommand::ContextLoaded {
            subscriber,
            process,
        })
        .await
    }

    /// A context activation failed; its queued events are discarded.
    pub async fn notify_context_load_failed(
        &self,
        context: ContextId,
        subscriber: SubscriberId,
    ) -> RouterResult<()> {
        self.send(RouterCommand::ContextLoadFailed {
            context,
            subscriber,
        })
        .await
    }

    // Queries

    /// Whether any listener, live or lazy, exists for `event_name`.
    pub async fn has_listener_for_event(&self, event_name: EventName) -> RouterResult<bool> {
        self.query(|reply| RouterCommand::HasListenerForEvent { event_name, reply })
            .await
    }

    /// Whether `subscriber` has any listener for `event_name`.
    pub async fn has_listener_for_subscriber(
        &self,
        subscriber: SubscriberId,
        event_name: EventName,
    ) -> RouterResult<bool> {
        self.query(|reply| RouterCommand::HasListenerForSubscriber {
            subscriber,
            event_name,
            reply,
        })
        .await
    }

    /// Whether `subscriber` has any live listener in `process`.
    pub async fn has_process_listener(
        &self,
        process: ProcessId,
        subscriber: SubscriberId,
    ) -> RouterResult<bool> {
        self.query(|reply| RouterCommand::HasProcessListener {
            process,
            subscriber,
            reply,
        })
        .await
    }

    /// Number of listeners registered for `event_name`.
    pub async fn listener_count(&self, event_name: EventName) -> RouterResult<usize> {
        self.query(|reply| RouterCommand::ListenerCount { event_name, reply })
            .await
    }

    /// Number of predicate matchers registered for `event_name`.
    pub async fn matcher_count(&self, event_name: EventName) -> RouterResult<usize> {
        self.query(|reply| RouterCommand::MatcherCount { event_name, reply })
            .await
    }

    // Observers and stats

    /// Register an observer of listener changes for a base event name.
    pub fn register_observer(&self, base_event_name: &EventName, observer: Arc<dyn RouterObserver>) {
        self.observers.register(base_event_name, observer);
    }

    /// Remove an observer wherever it is registered.
    pub fn unregister_observer(&self, observer: &Arc<dyn RouterObserver>) {
        self.observers.unregister(observer);
    }

    /// Snapshot of dispatch counters. All zeros when stats are disabled
    /// in [`RouterConfig`](crate::RouterConfig).
    #[must_use]
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }
}
