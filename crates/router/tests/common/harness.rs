//! Shared test harness: a running router wired to the in-memory store
//! and transport, with scriptable collaborator fakes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use courier_router::{
    ActivationQueue, ContextLifecycle, DispatchPolicy, Event, EventCategory, EventRouter,
    EventRouterBuilder, RouterConfig, RouterHandle, SubscriberProfile, WillDispatchHook,
};
use courier_store_memory::MemoryRegistrationStore;
use courier_transport_memory::MemoryTransport;
use courier_types::{ContextId, DispatchId, EventName, SubscriberId};
use parking_lot::Mutex;
use serde_json::Value;

pub fn event_name(raw: &str) -> EventName {
    EventName::new(raw).unwrap()
}

pub fn subscriber(raw: &str) -> SubscriberId {
    SubscriberId::new(raw).unwrap()
}

pub fn event(raw: &str) -> Event {
    Event::new(EventCategory::new(1), event_name(raw))
}

/// Policy fake: profiles are registered per subscriber; unknown
/// subscribers stay unknown. Cross-context dispatch is denied unless
/// enabled for the whole policy.
#[derive(Default)]
pub struct TestPolicy {
    profiles: Mutex<HashMap<SubscriberId, SubscriberProfile>>,
    allow_cross_context: bool,
}

impl TestPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allowing_cross_context() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
            allow_cross_context: true,
        }
    }

    pub fn register(&self, subscriber: &SubscriberId, contexts: Vec<ContextId>, suspendable: bool) {
        self.profiles.lock().insert(
            subscriber.clone(),
            SubscriberProfile {
                activation_contexts: contexts,
                suspendable,
            },
        );
    }
}

#[async_trait]
impl DispatchPolicy for TestPolicy {
    async fn subscriber_profile(&self, subscriber: &SubscriberId) -> Option<SubscriberProfile> {
        self.profiles.lock().get(subscriber).cloned()
    }

    async fn can_cross_context(
        &self,
        _subscriber: &SubscriberId,
        _target: ContextId,
        _restricted: ContextId,
    ) -> bool {
        self.allow_cross_context
    }

    async fn is_event_available(&self, _subscriber: &SubscriberId, _event_name: &EventName) -> bool {
        true
    }
}

/// Activation fake: contexts marked suspended require enqueueing, and
/// every activation request is recorded.
#[derive(Default)]
pub struct TestActivationQueue {
    suspended: Mutex<HashSet<(ContextId, SubscriberId)>>,
    activations: Mutex<Vec<(ContextId, SubscriberId)>>,
}

impl TestActivationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suspend(&self, context: ContextId, subscriber: &SubscriberId) {
        self.suspended.lock().insert((context, subscriber.clone()));
    }

    pub fn wake(&self, context: ContextId, subscriber: &SubscriberId) {
        self.suspended.lock().remove(&(context, subscriber.clone()));
    }

    pub fn activations(&self) -> Vec<(ContextId, SubscriberId)> {
        self.activations.lock().clone()
    }
}

#[async_trait]
impl ActivationQueue for TestActivationQueue {
    async fn should_enqueue(&self, context: ContextId, subscriber: &SubscriberId) -> bool {
        self.suspended
            .lock()
            .contains(&(context, subscriber.clone()))
    }

    async fn activate(&self, context: ContextId, subscriber: &SubscriberId) {
        self.activations.lock().push((context, subscriber.clone()));
    }
}

/// Lifecycle fake recording every in-flight notification and idle
/// transition.
#[derive(Default)]
pub struct RecordingLifecycle {
    dispatches: Mutex<Vec<(ContextId, SubscriberId, DispatchId)>>,
    idles: Mutex<Vec<(ContextId, SubscriberId)>>,
}

impl RecordingLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatches(&self) -> Vec<(ContextId, SubscriberId, DispatchId)> {
        self.dispatches.lock().clone()
    }

    pub fn idles(&self) -> Vec<(ContextId, SubscriberId)> {
        self.idles.lock().clone()
    }
}

#[async_trait]
impl ContextLifecycle for RecordingLifecycle {
    async fn on_dispatch(
        &self,
        context: ContextId,
        subscriber: &SubscriberId,
        dispatch_id: DispatchId,
    ) {
        self.dispatches
            .lock()
            .push((context, subscriber.clone(), dispatch_id));
    }

    async fn on_idle(&self, context: ContextId, subscriber: &SubscriberId) {
        self.idles.lock().push((context, subscriber.clone()));
    }
}

/// Hook that vetoes every target it is consulted for, counting the
/// consultations.
#[derive(Default)]
pub struct VetoHook {
    pub consulted: Mutex<u64>,
}

impl WillDispatchHook for VetoHook {
    fn will_dispatch(
        &self,
        _context: ContextId,
        _subscriber: &SubscriberId,
        _event: &mut Event,
        _filter: Option<&Value>,
    ) -> bool {
        *self.consulted.lock() += 1;
        false
    }
}

/// Hook that rewrites the event args to the target's context id,
/// proving mutations are per-target.
pub struct ContextTagHook;

impl WillDispatchHook for ContextTagHook {
    fn will_dispatch(
        &self,
        context: ContextId,
        _subscriber: &SubscriberId,
        event: &mut Event,
        _filter: Option<&Value>,
    ) -> bool {
        event.args = vec![serde_json::json!(context.value())];
        true
    }
}

pub struct Harness {
    pub router: EventRouter<MemoryRegistrationStore, MemoryTransport>,
    pub handle: RouterHandle,
    pub store: Arc<MemoryRegistrationStore>,
    pub transport: Arc<MemoryTransport>,
    pub policy: Arc<TestPolicy>,
    pub activation: Arc<TestActivationQueue>,
    pub lifecycle: Arc<RecordingLifecycle>,
}

impl Harness {
    /// Wait until every command enqueued before this call has been
    /// processed. Commands are handled in order, so a query round-trip
    /// is a barrier.
    pub async fn flush(&self) {
        self.handle
            .listener_count(event_name("harness.flush"))
            .await
            .unwrap();
    }
}

pub async fn start_router() -> Harness {
    start_router_with_policy(TestPolicy::new()).await
}

pub async fn start_router_with_policy(policy: TestPolicy) -> Harness {
    let store = Arc::new(MemoryRegistrationStore::new());
    let transport = Arc::new(MemoryTransport::new());
    let policy = Arc::new(policy);
    let activation = Arc::new(TestActivationQueue::new());
    let lifecycle = Arc::new(RecordingLifecycle::new());

    let router = EventRouterBuilder::new()
        .with_config(RouterConfig::default())
        .with_store(store.clone())
        .with_transport(transport.clone())
        .with_policy(policy.clone())
        .with_activation_queue(activation.clone())
        .with_lifecycle(lifecycle.clone())
        .build()
        .unwrap();
    router.start().unwrap();
    let handle = router.handle().unwrap();

    Harness {
        router,
        handle,
        store,
        transport,
        policy,
        activation,
        lifecycle,
    }
}
