//! Listener records.

use courier_types::{ContextId, EventName, MatcherId, ProcessId, SubscriberId};
use serde_json::Value;
use url::Url;

/// A live process together with the execution context it runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle {
    /// Process id
    pub process: ProcessId,
    /// Execution context the process belongs to
    pub context: ContextId,
}

impl ProcessHandle {
    /// Create a new process handle
    #[must_use]
    pub const fn new(process: ProcessId, context: ContextId) -> Self {
        Self { process, context }
    }
}

/// Where a listener lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerOrigin {
    /// Attached to a running process
    Process(ProcessHandle),
    /// Lazy: attached to the subscriber's service URL until a context
    /// is activated for it
    ServiceUrl(Url),
}

/// A registered interest in a named event.
///
/// Identity is `(event_name, subscriber, origin, filter)`. The matcher
/// id is deliberately excluded so a not-yet-indexed candidate compares
/// equal to an already-indexed record.
#[derive(Debug, Clone)]
pub struct Listener {
    /// Event name the listener is registered under
    pub event_name: EventName,
    /// Owning subscriber
    pub subscriber: SubscriberId,
    /// Live process or lazy service URL
    pub origin: ListenerOrigin,
    /// Optional opaque predicate
    pub filter: Option<Value>,
    /// Id of the indexed matcher; set only once the registry has
    /// registered the filter
    pub matcher_id: Option<MatcherId>,
}

impl Listener {
    /// Listener bound to a running process
    #[must_use]
    pub const fn for_process(
        event_name: EventName,
        subscriber: SubscriberId,
        handle: ProcessHandle,
        filter: Option<Value>,
    ) -> Self {
        Self {
            event_name,
            subscriber,
            origin: ListenerOrigin::Process(handle),
            filter,
            matcher_id: None,
        }
    }

    /// Lazy listener, attached to the subscriber's service URL
    #[must_use]
    pub fn lazy(event_name: EventName, subscriber: SubscriberId, filter: Option<Value>) -> Self {
        let url = subscriber.service_url();
        Self {
            event_name,
            subscriber,
            origin: ListenerOrigin::ServiceUrl(url),
            filter,
            matcher_id: None,
        }
    }

    /// Whether the listener has no live process attached
    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        matches!(self.origin, ListenerOrigin::ServiceUrl(_))
    }

    /// The live process handle, if any
    #[must_use]
    pub const fn process_handle(&self) -> Option<ProcessHandle> {
        match self.origin {
            ListenerOrigin::Process(handle) => Some(handle),
            ListenerOrigin::ServiceUrl(_) => None,
        }
    }

    /// Observer-facing summary of this listener
    #[must_use]
    pub fn info(&self) -> ListenerInfo {
        let (url, context) = match &self.origin {
            ListenerOrigin::Process(handle) => (None, Some(handle.context)),
            ListenerOrigin::ServiceUrl(url) => (Some(url.clone()), None),
        };
        ListenerInfo {
            event_name: self.event_name.clone(),
            subscriber: self.subscriber.clone(),
            url,
            context,
        }
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.event_name == other.event_name
            && self.subscriber == other.subscriber
            && self.origin == other.origin
            && self.filter == other.filter
    }
}

impl Eq for Listener {}

/// What observers see when a listener is added or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerInfo {
    /// Event name (may carry a sub-event suffix)
    pub event_name: EventName,
    /// Owning subscriber
    pub subscriber: SubscriberId,
    /// Service URL for lazy listeners
    pub url: Option<Url>,
    /// Execution context for process-attached listeners
    pub context: Option<ContextId>,
}
