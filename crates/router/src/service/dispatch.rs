//! The actor-owned dispatch core.
//!
//! One instance lives inside the router task and processes commands
//! sequentially, which is what makes the single-writer discipline hold:
//! registry mutation, the per-dispatch `already_dispatched` set, the
//! activation queues, and the in-flight counters are all touched from
//! exactly one place.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use courier_store::RegistrationStore;
use courier_transport::{EventEnvelope, EventTransport};
use courier_types::{ContextId, DispatchId, EventName, SubscriberId};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::RouterConfig;
use crate::foundation::{
    ActivationQueue, ContextLifecycle, DispatchIdentifier, DispatchPolicy, Event, Listener,
    ProcessHandle,
};
use crate::registry::ListenerRegistry;
use crate::stats::DispatchStats;

use super::commands::RouterCommand;

/// Dispatch ids are process-wide so telemetry can correlate across
/// router instances.
static NEXT_DISPATCH_ID: AtomicU64 = AtomicU64::new(1);

fn next_dispatch_id() -> DispatchId {
    DispatchId::new(NEXT_DISPATCH_ID.fetch_add(1, Ordering::Relaxed))
}

pub(crate) struct RouterCore<S, T>
where
    S: RegistrationStore,
    T: EventTransport,
{
    registry: ListenerRegistry,
    store: Arc<S>,
    transport: Arc<T>,
    policy: Arc<dyn DispatchPolicy>,
    activation: Arc<dyn ActivationQueue>,
    lifecycle: Arc<dyn ContextLifecycle>,
    config: RouterConfig,
    stats: Arc<DispatchStats>,
    /// Events waiting for a context activation, per target, in arrival
    /// order. Presence of a key means an activation is in progress.
    pending_activation: HashMap<DispatchIdentifier, Vec<Event>>,
    /// Unacked deliveries to suspendable contexts
    in_flight: HashMap<DispatchIdentifier, u64>,
}

impl<S, T> RouterCore<S, T>
where
    S: RegistrationStore,
    T: EventTransport,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        registry: ListenerRegistry,
        store: Arc<S>,
        transport: Arc<T>,
        policy: Arc<dyn DispatchPolicy>,
        activation: Arc<dyn ActivationQueue>,
        lifecycle: Arc<dyn ContextLifecycle>,
        config: RouterConfig,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            registry,
            store,
            transport,
            policy,
            activation,
            lifecycle,
            config,
            stats,
            pending_activation: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }

    pub(crate) async fn handle_command(&mut self, command: RouterCommand) {
        match command {
            RouterCommand::AddListener {
                event_name,
                subscriber,
                process,
                filter,
                reply,
            } => {
                let added = self
                    .add_listener(event_name, subscriber, process, filter)
                    .await;
                let _ = reply.send(added);
            }
            RouterCommand::RemoveListener {
                event_name,
                subscriber,
                process,
                filter,
                reply,
            } => {
                let removed = self
                    .remove_listener(event_name, subscriber, process, filter)
                    .await;
                let _ = reply.send(removed);
            }
            RouterCommand::AddFilteredListener {
                event_name,
                subscriber,
                process,
                filter,
                also_register_lazy,
                reply,
            } => {
                let added = self
                    .add_filtered_listener(event_name, subscriber, process, filter, also_register_lazy)
                    .await;
                let _ = reply.send(added);
            }
            RouterCommand::RemoveFilteredListener {
                event_name,
                subscriber,
                process,
                filter,
                remove_lazy,
                reply,
            } => {
                let removed = self
                    .remove_filtered_listener(event_name, subscriber, process, filter, remove_lazy)
                    .await;
                let _ = reply.send(removed);
            }
            RouterCommand::RemoveListenersForSubscriber { subscriber, reply } => {
                self.registry.remove_listeners_for_subscriber(&subscriber);
                let _ = reply.send(());
            }
            RouterCommand::RemoveListenersForProcess { process, reply } => {
                self.registry.remove_listeners_for_process(process);
                let _ = reply.send(());
            }
            RouterCommand::LoadUnfilteredLazyListeners {
                subscriber,
                events,
                reply,
            } => {
                self.registry
                    .load_unfiltered_lazy_listeners(&subscriber, events);
                let _ = reply.send(());
            }
            RouterCommand::LoadFilteredLazyListeners {
                subscriber,
                filtered,
                reply,
            } => {
                self.registry
                    .load_filtered_lazy_listeners(&subscriber, &filtered);
                let _ = reply.send(());
            }
            RouterCommand::SubscriberLoaded { subscriber, reply } => {
                self.subscriber_loaded(&subscriber).await;
                let _ = reply.send(());
            }
            RouterCommand::Broadcast { event } => {
                self.dispatch_impl(None, &event).await;
            }
            RouterCommand::DispatchToSubscriber { subscriber, event } => {
                self.dispatch_impl(Some(&subscriber), &event).await;
            }
            RouterCommand::DispatchWithLazyFallback { subscriber, event } => {
                self.dispatch_with_lazy_fallback(subscriber, &event).await;
            }
            RouterCommand::EventAck {
                context,
                subscriber,
            } => {
                self.on_event_ack(context, subscriber).await;
            }
            RouterCommand::ContextLoaded {
                subscriber,
                process,
            } => {
                self.context_loaded(subscriber, process).await;
            }
            RouterCommand::ContextLoadFailed {
                context,
                subscriber,
            } => {
                self.context_load_failed(context, subscriber);
            }
            RouterCommand::HasListenerForEvent { event_name, reply } => {
                let _ = reply.send(self.registry.has_listener_for_event(&event_name));
            }
            RouterCommand::HasListenerForSubscriber {
                subscriber,
                event_name,
                reply,
            } => {
                let _ = reply.send(
                    self.registry
                        .has_listener_for_subscriber(&subscriber, &event_name),
                );
            }
            RouterCommand::HasProcessListener {
                process,
                subscriber,
                reply,
            } => {
                let _ = reply.send(self.registry.has_process_listener(process, &subscriber));
            }
            RouterCommand::ListenerCount { event_name, reply } => {
                let _ = reply.send(self.registry.listener_count(&event_name));
            }
            RouterCommand::MatcherCount { event_name, reply } => {
                let _ = reply.send(self.registry.matcher_count(&event_name));
            }
        }
    }

    // Registration

    async fn add_listener(
        &mut self,
        event_name: EventName,
        subscriber: SubscriberId,
        process: Option<ProcessHandle>,
        filter: Option<Value>,
    ) -> bool {
        let listener = match process {
            Some(handle) => Listener::for_process(
                event_name.clone(),
                subscriber.clone(),
                handle,
                filter.clone(),
            ),
            None => Listener::lazy(event_name.clone(), subscriber.clone(), filter.clone()),
        };
        let lazy = listener.is_lazy();
        let added = self.registry.add_listener(listener);
        if added && lazy {
            match &filter {
                None => self.persist_unfiltered_lazy_add(&event_name, &subscriber).await,
                Some(filter) => self.persist_filter_add(&event_name, &subscriber, filter).await,
            }
        }
        added
    }

    async fn remove_listener(
        &mut self,
        event_name: EventName,
        subscriber: SubscriberId,
        process: Option<ProcessHandle>,
        filter: Option<Value>,
    ) -> bool {
        let listener = match process {
            Some(handle) => Listener::for_process(
                event_name.clone(),
                subscriber.clone(),
                handle,
                filter.clone(),
            ),
            None => Listener::lazy(event_name.clone(), subscriber.clone(), filter.clone()),
        };
        let lazy = listener.is_lazy();
        let removed = self.registry.remove_listener(&listener);
        if removed && lazy {
            match &filter {
                None => {
                    self.persist_unfiltered_lazy_remove(&event_name, &subscriber)
                        .await;
                }
                Some(filter) => {
                    self.persist_filter_remove(&event_name, &subscriber, filter)
                        .await;
                }
            }
        }
        removed
    }

    async fn add_filtered_listener(
        &mut self,
        event_name: EventName,
        subscriber: SubscriberId,
        process: ProcessHandle,
        filter: Value,
        also_register_lazy: bool,
    ) -> bool {
        let added = self.registry.add_listener(Listener::for_process(
            event_name.clone(),
            subscriber.clone(),
            process,
            Some(filter.clone()),
        ));
        if also_register_lazy {
            let lazy_added = self.registry.add_listener(Listener::lazy(
                event_name.clone(),
                subscriber.clone(),
                Some(filter.clone()),
            ));
            if lazy_added {
                self.persist_filter_add(&event_name, &subscriber, &filter)
                    .await;
            }
        }
        added
    }

    async fn remove_filtered_listener(
        &mut self,
        event_name: EventName,
        subscriber: SubscriberId,
        process: ProcessHandle,
        filter: Value,
        remove_lazy: bool,
    ) -> bool {
        let removed = self.registry.remove_listener(&Listener::for_process(
            event_name.clone(),
            subscriber.clone(),
            process,
            Some(filter.clone()),
        ));
        if remove_lazy {
            let lazy_removed = self.registry.remove_listener(&Listener::lazy(
                event_name.clone(),
                subscriber.clone(),
                Some(filter.clone()),
            ));
            if lazy_removed {
                self.persist_filter_remove(&event_name, &subscriber, &filter)
                    .await;
            }
        }
        removed
    }

    /// Rehydrate a subscriber's lazy listeners from the persisted
    /// store. Rehydration never writes back.
    async fn subscriber_loaded(&mut self, subscriber: &SubscriberId) {
        match self.store.registered_events(subscriber).await {
            Ok(events) => {
                self.registry
                    .load_unfiltered_lazy_listeners(subscriber, events);
            }
            Err(err) => {
                warn!(%subscriber, ?err, "failed to read persisted event registrations");
            }
        }
        match self.store.filtered_events(subscriber).await {
            Ok(Some(filtered)) => {
                self.registry
                    .load_filtered_lazy_listeners(subscriber, &filtered);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(%subscriber, ?err, "failed to read persisted filtered registrations");
            }
        }
    }

    // Dispatch

    async fn dispatch_impl(&mut self, restrict: Option<&SubscriberId>, event: &Event) {
        debug_assert!(
            event.category.is_known(),
            "dispatching event {} with unrecognized category",
            event.name
        );
        self.stats.record_event();
        if self.config.log_dispatches {
            debug!(event = %event.name, restricted = restrict.is_some(), "dispatching event");
        }

        let mut listeners = self
            .registry
            .listeners_for_event(&event.name, &event.filtering_info);
        if let Some(subscriber) = restrict {
            listeners.retain(|listener| &listener.subscriber == subscriber);
        }

        let mut already_dispatched: HashSet<DispatchIdentifier> = HashSet::new();

        // Lazy pass runs first, and must: activating a context can
        // synchronously cancel a pending suspension of that context's
        // other running instance, and that has to settle before the
        // live pass decides which contexts count as running.
        for listener in listeners.iter().filter(|listener| listener.is_lazy()) {
            self.maybe_activate_and_dispatch(listener, event, &mut already_dispatched)
                .await;
        }

        for listener in &listeners {
            let Some(handle) = listener.process_handle() else {
                continue;
            };
            let id = DispatchIdentifier::new(handle.context, listener.subscriber.clone());
            if already_dispatched.contains(&id) {
                continue;
            }
            self.dispatch_to_process(
                &listener.subscriber,
                handle,
                event,
                listener.filter.as_ref(),
                false,
            )
            .await;
        }
    }

    /// Queue an event behind the activation of a suspended context,
    /// starting the activation if this is the first event waiting on
    /// it.
    async fn maybe_activate_and_dispatch(
        &mut self,
        listener: &Listener,
        event: &Event,
        already_dispatched: &mut HashSet<DispatchIdentifier>,
    ) {
        let subscriber = &listener.subscriber;
        let Some(profile) = self.policy.subscriber_profile(subscriber).await else {
            debug!(%subscriber, "dropping lazy dispatch to unknown subscriber");
            self.stats.record_drop();
            return;
        };

        for context in profile.activation_contexts {
            if let Some(restricted) = event.restrict_to_context
                && restricted != context
                && !self
                    .policy
                    .can_cross_context(subscriber, context, restricted)
                    .await
            {
                continue;
            }
            let id = DispatchIdentifier::new(context, subscriber.clone());
            if already_dispatched.contains(&id) {
                continue;
            }
            if !self.activation.should_enqueue(context, subscriber).await {
                // Context already running; the live pass reaches it.
                continue;
            }

            // The event outlives this synchronous dispatch turn, so it
            // is detached before queueing. The hook runs once, now,
            // against the detached copy; the copy carries no hook so it
            // will not run again when the activation completes.
            let mut detached = event.detach_for_queue();
            if let Some(hook) = &event.will_dispatch
                && !hook.will_dispatch(context, subscriber, &mut detached, listener.filter.as_ref())
            {
                self.stats.record_veto();
                continue;
            }

            let newly_loading = !self.pending_activation.contains_key(&id);
            self.pending_activation
                .entry(id.clone())
                .or_default()
                .push(detached);
            if newly_loading {
                self.activation.activate(context, subscriber).await;
            }
            self.stats.record_queued_activation();
            already_dispatched.insert(id);
        }
    }

    async fn dispatch_to_process(
        &mut self,
        subscriber: &SubscriberId,
        handle: ProcessHandle,
        event: &Event,
        filter: Option<&Value>,
        did_enqueue: bool,
    ) {
        let Some(profile) = self.policy.subscriber_profile(subscriber).await else {
            // Removal racing with an in-flight dispatch; expected.
            debug!(%subscriber, event = %event.name, "dropping dispatch to unknown subscriber");
            self.stats.record_drop();
            return;
        };

        if let Some(restricted) = event.restrict_to_context
            && restricted != handle.context
            && !self
                .policy
                .can_cross_context(subscriber, handle.context, restricted)
                .await
        {
            debug!(%subscriber, event = %event.name, "dropping cross-context dispatch");
            self.stats.record_drop();
            return;
        }

        if !self
            .policy
            .is_event_available(subscriber, &event.name)
            .await
        {
            // A listener for an unavailable surface should never have
            // been registered in the first place.
            debug_assert!(
                false,
                "event {} unavailable to subscriber {subscriber}",
                event.name
            );
            error!(%subscriber, event = %event.name, "dropping dispatch of unavailable event");
            self.stats.record_drop();
            return;
        }

        // Per-target copy; the hook may customize args for this target
        // without affecting any other.
        let mut event = event.clone();
        if let Some(hook) = event.will_dispatch.clone()
            && !hook.will_dispatch(handle.context, subscriber, &mut event, filter)
        {
            self.stats.record_veto();
            return;
        }

        let dispatch_id = next_dispatch_id();
        let envelope = EventEnvelope {
            dispatch_id,
            subscriber: subscriber.clone(),
            process: handle.process,
            context: handle.context,
            event_name: event.name.clone(),
            args: event.args.clone(),
            filtering_info: event.filtering_info.clone(),
            user_gesture: event.user_gesture,
            queued_activation: did_enqueue,
        };
        if let Err(err) = self.transport.deliver(envelope).await {
            warn!(%subscriber, %err, event = %event.name, "event delivery failed");
            self.stats.record_drop();
            return;
        }
        if self.config.log_dispatches {
            debug!(%subscriber, %dispatch_id, event = %event.name, "delivered event");
        }
        self.stats.record_delivery();

        if profile.suspendable {
            let id = DispatchIdentifier::new(handle.context, subscriber.clone());
            *self.in_flight.entry(id).or_insert(0) += 1;
            self.lifecycle
                .on_dispatch(handle.context, subscriber, dispatch_id)
                .await;
        }
    }

    /// One-shot notification to a possibly not-yet-initialized
    /// subscriber: temporarily registers a lazy listener (including the
    /// store write) if none exists, dispatches, then deregisters.
    async fn dispatch_with_lazy_fallback(&mut self, subscriber: SubscriberId, event: &Event) {
        let had_listener = self
            .registry
            .has_listener_for_subscriber(&subscriber, &event.name);
        if !had_listener {
            self.add_listener(event.name.clone(), subscriber.clone(), None, None)
                .await;
        }
        self.dispatch_impl(Some(&subscriber), event).await;
        if !had_listener {
            self.remove_listener(event.name.clone(), subscriber.clone(), None, None)
                .await;
        }
    }

    // Lifecycle

    async fn on_event_ack(&mut self, context: ContextId, subscriber: SubscriberId) {
        self.stats.record_ack();
        let id = DispatchIdentifier::new(context, subscriber);
        let Some(count) = self.in_flight.get_mut(&id) else {
            warn!(subscriber = %id.subscriber, "event ack with no in-flight record");
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.in_flight.remove(&id);
            self.lifecycle.on_idle(id.context, &id.subscriber).await;
        }
    }

    /// A context activation completed; drain its queue in order, with
    /// every event marked as having waited for the activation.
    async fn context_loaded(&mut self, subscriber: SubscriberId, process: ProcessHandle) {
        let id = DispatchIdentifier::new(process.context, subscriber);
        let Some(queued) = self.pending_activation.remove(&id) else {
            return;
        };
        debug!(
            subscriber = %id.subscriber,
            count = queued.len(),
            "context loaded; dispatching queued events"
        );
        for event in queued {
            self.dispatch_to_process(&id.subscriber, process, &event, None, true)
                .await;
        }
    }

    fn context_load_failed(&mut self, context: ContextId, subscriber: SubscriberId) {
        let id = DispatchIdentifier::new(context, subscriber);
        if let Some(dropped) = self.pending_activation.remove(&id) {
            debug!(
                subscriber = %id.subscriber,
                count = dropped.len(),
                "context load failed; discarding queued events"
            );
            for _ in &dropped {
                self.stats.record_drop();
            }
        }
    }

    // Store write-through for lazy registrations

    async fn persist_unfiltered_lazy_add(
        &self,
        event_name: &EventName,
        subscriber: &SubscriberId,
    ) {
        let mut events = match self.store.registered_events(subscriber).await {
            Ok(events) => events,
            Err(err) => {
                warn!(%subscriber, ?err, "failed to read persisted event registrations");
                BTreeSet::new()
            }
        };
        if events.insert(event_name.clone())
            && let Err(err) = self.store.set_registered_events(subscriber, events).await
        {
            warn!(%subscriber, ?err, "failed to persist lazy event registration");
        }
    }

    async fn persist_unfiltered_lazy_remove(
        &self,
        event_name: &EventName,
        subscriber: &SubscriberId,
    ) {
        let mut events = match self.store.registered_events(subscriber).await {
            Ok(events) => events,
            Err(err) => {
                warn!(%subscriber, ?err, "failed to read persisted event registrations");
                return;
            }
        };
        if events.remove(event_name)
            && let Err(err) = self.store.set_registered_events(subscriber, events).await
        {
            warn!(%subscriber, ?err, "failed to persist lazy event deregistration");
        }
    }

    async fn persist_filter_add(
        &self,
        event_name: &EventName,
        subscriber: &SubscriberId,
        filter: &Value,
    ) {
        if let Err(err) = self
            .store
            .add_filter_to_event(event_name, subscriber, filter)
            .await
        {
            warn!(%subscriber, ?err, "failed to persist lazy filter registration");
        }
    }

    async fn persist_filter_remove(
        &self,
        event_name: &EventName,
        subscriber: &SubscriberId,
        filter: &Value,
    ) {
        if let Err(err) = self
            .store
            .remove_filter_from_event(event_name, subscriber, filter)
            .await
        {
            warn!(%subscriber, ?err, "failed to persist lazy filter deregistration");
        }
    }
}
