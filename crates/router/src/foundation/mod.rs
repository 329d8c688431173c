//! Foundation types shared by the registry and the dispatch service.

mod event;
mod listener;
mod traits;

pub use event::{DispatchIdentifier, Event, EventCategory};
pub use listener::{Listener, ListenerInfo, ListenerOrigin, ProcessHandle};
pub use traits::{
    ActivationQueue, ContextLifecycle, DispatchPolicy, RegistryDelegate, RouterObserver,
    SubscriberProfile, WillDispatchHook,
};
