//! Command messages processed by the router actor.

use std::collections::BTreeSet;

use courier_types::{ContextId, EventName, ProcessId, SubscriberId};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::foundation::{Event, ProcessHandle};

/// One message on the coordinator's command channel. Queries carry a
/// oneshot reply; dispatch and notification commands are fire-and-forget
/// so producers never block on delivery.
pub enum RouterCommand {
    AddListener {
        event_name: EventName,
        subscriber: SubscriberId,
        process: Option<ProcessHandle>,
        filter: Option<Value>,
        reply: oneshot::Sender<bool>,
    },
    RemoveListener {
        event_name: EventName,
        subscriber: SubscriberId,
        process: Option<ProcessHandle>,
        filter: Option<Value>,
        reply: oneshot::Sender<bool>,
    },
    AddFilteredListener {
        event_name: EventName,
        subscriber: SubscriberId,
        process: ProcessHandle,
        filter: Value,
        also_register_lazy: bool,
        reply: oneshot::Sender<bool>,
    },
    RemoveFilteredListener {
        event_name: EventName,
        subscriber: SubscriberId,
        process: ProcessHandle,
        filter: Value,
        remove_lazy: bool,
        reply: oneshot::Sender<bool>,
    },
    RemoveListenersForSubscriber {
        subscriber: SubscriberId,
        reply: oneshot::Sender<()>,
    },
    RemoveListenersForProcess {
        process: ProcessId,
        reply: oneshot::Sender<()>,
    },
    LoadUnfilteredLazyListeners {
        subscriber: SubscriberId,
        events: BTreeSet<EventName>,
        reply: oneshot::Sender<()>,
    },
    LoadFilteredLazyListeners {
        subscriber: SubscriberId,
        filtered: Value,
        reply: oneshot::Sender<()>,
    },
    SubscriberLoaded {
        subscriber: SubscriberId,
        reply: oneshot::Sender<()>,
    },
    Broadcast {
        event: Event,
    },
    DispatchToSubscriber {
        subscriber: SubscriberId,
        event: Event,
    },
    DispatchWithLazyFallback {
        subscriber: SubscriberId,
        event: Event,
    },
    EventAck {
        context: ContextId,
        subscriber: SubscriberId,
    },
    ContextLoaded {
        subscriber: SubscriberId,
        process: ProcessHandle,
    },
    ContextLoadFailed {
        context: ContextId,
        subscriber: SubscriberId,
    },
    HasListenerForEvent {
        event_name: EventName,
        reply: oneshot::Sender<bool>,
    },
    HasListenerForSubscriber {
        subscriber: SubscriberId,
        event_name: EventName,
        reply: oneshot::Sender<bool>,
    },
    HasProcessListener {
        process: ProcessId,
        subscriber: SubscriberId,
        reply: oneshot::Sender<bool>,
    },
    ListenerCount {
        event_name: EventName,
        reply: oneshot::Sender<usize>,
    },
    MatcherCount {
        event_name: EventName,
        reply: oneshot::Sender<usize>,
    },
}
