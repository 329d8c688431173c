//! Collaborator interfaces injected into the router at construction.

use async_trait::async_trait;
use courier_types::{ContextId, DispatchId, EventName, SubscriberId};
use serde_json::Value;

use super::event::Event;
use super::listener::{Listener, ListenerInfo};

/// What the policy layer knows about a subscriber.
#[derive(Debug, Clone, Default)]
pub struct SubscriberProfile {
    /// Contexts in which the subscriber's lazy background context may be
    /// activated
    pub activation_contexts: Vec<ContextId>,
    /// Whether the subscriber has a suspendable background context whose
    /// in-flight events must be tracked
    pub suspendable: bool,
}

/// Permission and availability checks, delegated to the consumer
/// management layer.
#[async_trait]
pub trait DispatchPolicy: Send + Sync + 'static {
    /// Profile of a subscriber. `None` means the subscriber is unknown;
    /// dispatches to it are dropped silently since removal races with
    /// in-flight dispatch are expected.
    async fn subscriber_profile(&self, subscriber: &SubscriberId) -> Option<SubscriberProfile>;

    /// Whether the subscriber may receive, in `target`, an event
    /// restricted to `restricted`.
    async fn can_cross_context(
        &self,
        subscriber: &SubscriberId,
        target: ContextId,
        restricted: ContextId,
    ) -> bool;

    /// Whether the event surface is available to the subscriber at all.
    /// A listener for an unavailable surface indicates a
    /// registration-time bug.
    async fn is_event_available(&self, subscriber: &SubscriberId, event_name: &EventName) -> bool;
}

/// The queue that physically starts suspended execution contexts.
#[async_trait]
pub trait ActivationQueue: Send + Sync + 'static {
    /// Whether an event for this target must wait for the context to be
    /// activated. Returning `false` means the context is already running
    /// and the live-dispatch pass will reach it.
    async fn should_enqueue(&self, context: ContextId, subscriber: &SubscriberId) -> bool;

    /// Start loading the context. Called once per activation sequence;
    /// completion arrives later through
    /// [`RouterHandle::notify_context_loaded`](crate::RouterHandle::notify_context_loaded)
    /// or
    /// [`RouterHandle::notify_context_load_failed`](crate::RouterHandle::notify_context_load_failed).
    async fn activate(&self, context: ContextId, subscriber: &SubscriberId);
}

/// Suspension bookkeeping for suspendable background contexts.
#[async_trait]
pub trait ContextLifecycle: Send + Sync + 'static {
    /// An event is now in flight to the subscriber's suspendable
    /// context; the context must not be suspended until it is acked.
    async fn on_dispatch(
        &self,
        context: ContextId,
        subscriber: &SubscriberId,
        dispatch_id: DispatchId,
    );

    /// Every in-flight event has been acknowledged; the context is
    /// eligible for suspension again.
    async fn on_idle(&self, context: ContextId, subscriber: &SubscriberId);
}

/// Per-target customization and veto, consulted just before delivery.
///
/// Synchronous: it runs inside the coordinator's dispatch turn. The
/// event passed in is this target's private copy; mutations affect no
/// other target.
pub trait WillDispatchHook: Send + Sync + 'static {
    /// Returning `false` suppresses delivery to this one target.
    fn will_dispatch(
        &self,
        context: ContextId,
        subscriber: &SubscriberId,
        event: &mut Event,
        filter: Option<&Value>,
    ) -> bool;
}

/// Observer of listener registration changes, keyed by base event name.
pub trait RouterObserver: Send + Sync + 'static {
    /// A listener was added
    fn on_listener_added(&self, info: &ListenerInfo);

    /// A listener was removed
    fn on_listener_removed(&self, info: &ListenerInfo);
}

/// Internal registration hook the registry notifies on every individual
/// add and remove (bulk removals notify once per record).
pub trait RegistryDelegate: Send + Sync {
    /// A listener was stored
    fn on_listener_added(&self, listener: &Listener);

    /// A listener was removed
    fn on_listener_removed(&self, listener: &Listener);
}
