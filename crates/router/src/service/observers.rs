//! Observer registration and the bridge from the registry delegate.

use std::collections::HashMap;
use std::sync::Arc;

use courier_types::EventName;
use parking_lot::Mutex;

use crate::foundation::{Listener, ListenerInfo, RegistryDelegate, RouterObserver};

/// Observers of listener registration changes, keyed by base event
/// name.
///
/// Sub-event variants of one base name (`"foo.on_bar/123"`) collapse to
/// the same observer. One observer per base name; re-registration
/// overwrites.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Mutex<HashMap<String, Arc<dyn RouterObserver>>>,
}

impl ObserverRegistry {
    /// Create an empty observer registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for a base event name. Registering with a
    /// sub-event name is a contract violation.
    pub fn register(&self, base_event_name: &EventName, observer: Arc<dyn RouterObserver>) {
        debug_assert!(
            !base_event_name.is_sub_event(),
            "observers register against base event names"
        );
        self.observers
            .lock()
            .insert(base_event_name.base_name().to_string(), observer);
    }

    /// Remove an observer wherever it is registered.
    pub fn unregister(&self, observer: &Arc<dyn RouterObserver>) {
        self.observers
            .lock()
            .retain(|_, registered| !Arc::ptr_eq(registered, observer));
    }

    pub(crate) fn notify_added(&self, info: &ListenerInfo) {
        if let Some(observer) = self.observer_for(&info.event_name) {
            observer.on_listener_added(info);
        }
    }

    pub(crate) fn notify_removed(&self, info: &ListenerInfo) {
        if let Some(observer) = self.observer_for(&info.event_name) {
            observer.on_listener_removed(info);
        }
    }

    fn observer_for(&self, event_name: &EventName) -> Option<Arc<dyn RouterObserver>> {
        self.observers.lock().get(event_name.base_name()).cloned()
    }
}

/// Adapts registry delegate notifications into observer notifications.
pub(crate) struct ObserverBridge {
    observers: Arc<ObserverRegistry>,
}

impl ObserverBridge {
    pub(crate) const fn new(observers: Arc<ObserverRegistry>) -> Self {
        Self { observers }
    }
}

impl RegistryDelegate for ObserverBridge {
    fn on_listener_added(&self, listener: &Listener) {
        self.observers.notify_added(&listener.info());
    }

    fn on_listener_removed(&self, listener: &Listener) {
        self.observers.notify_removed(&listener.info());
    }
}
