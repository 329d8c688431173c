//! Shared vocabulary types for the courier event routing system.
//!
//! Everything here crosses a crate boundary: event names and subscriber
//! identities are validated newtypes, ids are plain newtypes, and
//! [`FilteringInfo`] carries the sparse per-event attributes that
//! predicate matchers evaluate.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod event_name;
mod filtering;
mod ids;

pub use event_name::{EventName, EventNameError};
pub use filtering::{FilteringInfo, UserGestureState};
pub use ids::{ContextId, DispatchId, MatcherId, ProcessId, SubscriberId, SubscriberIdError};
