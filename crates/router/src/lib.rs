//! Courier event router.
//!
//! A named-event publish/dispatch hub. Subscribers register interest in
//! event names, unfiltered or narrowed by a structured predicate, and
//! receive matching events exactly once whether their execution context
//! is currently running or suspended.
//!
//! The router is an actor: one task owns the listener registry, the
//! predicate index, and all dispatch bookkeeping. Producers talk to it
//! through a cloneable [`RouterHandle`] whose calls enqueue commands and
//! return without blocking on dispatch.
//!
//! External collaborators are injected at construction:
//! - [`RegistrationStore`](courier_store::RegistrationStore) persists
//!   which lazy listeners a subscriber has registered,
//! - [`EventTransport`](courier_transport::EventTransport) carries the
//!   event payload to a running process,
//! - [`ActivationQueue`] wakes suspended contexts,
//! - [`DispatchPolicy`] answers permission questions,
//! - [`ContextLifecycle`] is told about in-flight events so it can hold
//!   off suspension.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod filter;
mod foundation;
mod registry;
mod service;
mod stats;

pub use config::RouterConfig;
pub use error::{Error, ErrorContext, ErrorKind, RouterResult};
pub use filter::{EventMatcher, FilterIndex, MatcherError};
pub use foundation::{
    ActivationQueue, ContextLifecycle, DispatchIdentifier, DispatchPolicy, Event, EventCategory,
    Listener, ListenerInfo, ListenerOrigin, ProcessHandle, RegistryDelegate, RouterObserver,
    SubscriberProfile, WillDispatchHook,
};
pub use registry::ListenerRegistry;
pub use service::{EventRouter, EventRouterBuilder, ObserverRegistry, RouterHandle};
pub use stats::{DispatchStats, DispatchStatsSnapshot};
