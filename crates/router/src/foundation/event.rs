//! The event record handed to dispatch.

use std::fmt;
use std::sync::Arc;

use courier_types::{ContextId, EventName, FilteringInfo, SubscriberId, UserGestureState};
use serde_json::Value;
use url::Url;

use super::traits::WillDispatchHook;

/// Category of an event, used for telemetry bucketing.
///
/// Dispatching with [`EventCategory::UNKNOWN`] is a programmer error and
/// trips a debug assertion in the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventCategory(u32);

impl EventCategory {
    /// The unrecognized category
    pub const UNKNOWN: Self = Self(0);

    /// Create a category from its numeric id
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the numeric id
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whether this is a recognized category
    #[must_use]
    pub const fn is_known(self) -> bool {
        self.0 != Self::UNKNOWN.0
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "category-{}", self.0)
    }
}

/// De-duplication key for one dispatch operation: a subscriber within an
/// execution context receives a given event at most once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchIdentifier {
    /// Execution context of the target
    pub context: ContextId,
    /// The subscriber the event is addressed to
    pub subscriber: SubscriberId,
}

impl DispatchIdentifier {
    /// Create a new dispatch identifier
    #[must_use]
    pub const fn new(context: ContextId, subscriber: SubscriberId) -> Self {
        Self {
            context,
            subscriber,
        }
    }
}

/// A routed event.
///
/// Immutable once constructed; dispatch clones it per target when a
/// will-dispatch hook needs to mutate args for that one target.
#[derive(Clone)]
pub struct Event {
    /// Telemetry category
    pub category: EventCategory,
    /// Event name
    pub name: EventName,
    /// Structured payload
    pub args: Vec<Value>,
    /// When set, targets in other contexts are dropped unless the
    /// policy explicitly permits the crossing
    pub restrict_to_context: Option<ContextId>,
    /// URL the event originated from, if any
    pub source_url: Option<Url>,
    /// Gesture state travelling with the event
    pub user_gesture: UserGestureState,
    /// Sparse attributes evaluated by predicate matchers
    pub filtering_info: FilteringInfo,
    /// Optional per-target customization/veto hook
    pub will_dispatch: Option<Arc<dyn WillDispatchHook>>,
}

impl Event {
    /// Create a new event with no payload
    #[must_use]
    pub fn new(category: EventCategory, name: EventName) -> Self {
        Self {
            category,
            name,
            args: Vec::new(),
            restrict_to_context: None,
            source_url: None,
            user_gesture: UserGestureState::Unknown,
            filtering_info: FilteringInfo::new(),
            will_dispatch: None,
        }
    }

    /// Set the payload
    #[must_use]
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Restrict delivery to one execution context
    #[must_use]
    pub const fn with_restricted_context(mut self, context: ContextId) -> Self {
        self.restrict_to_context = Some(context);
        self
    }

    /// Set the source URL
    #[must_use]
    pub fn with_source_url(mut self, url: Url) -> Self {
        self.source_url = Some(url);
        self
    }

    /// Set the user gesture state
    #[must_use]
    pub const fn with_user_gesture(mut self, state: UserGestureState) -> Self {
        self.user_gesture = state;
        self
    }

    /// Set the filtering attributes
    #[must_use]
    pub fn with_filtering_info(mut self, info: FilteringInfo) -> Self {
        self.filtering_info = info;
        self
    }

    /// Attach a will-dispatch hook
    #[must_use]
    pub fn with_will_dispatch_hook(mut self, hook: Arc<dyn WillDispatchHook>) -> Self {
        self.will_dispatch = Some(hook);
        self
    }

    /// Detach a copy of this event for asynchronous queueing.
    ///
    /// The original's lifetime is tied to the synchronous dispatch call;
    /// an event waiting for a context activation needs its own copy. The
    /// hook is cleared on the copy: it was already consulted (once, up
    /// front) before the event was queued and must not run again at
    /// actual dispatch time.
    #[must_use]
    pub fn detach_for_queue(&self) -> Self {
        let mut detached = self.clone();
        detached.will_dispatch = None;
        detached
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("category", &self.category)
            .field("name", &self.name)
            .field("args", &self.args)
            .field("restrict_to_context", &self.restrict_to_context)
            .field("source_url", &self.source_url)
            .field("user_gesture", &self.user_gesture)
            .field("filtering_info", &self.filtering_info)
            .field("will_dispatch", &self.will_dispatch.as_ref().map(|_| ".."))
            .finish()
    }
}
