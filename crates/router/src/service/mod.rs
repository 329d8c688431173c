//! The router service: command messages, the actor core, the public
//! handle, and observer plumbing.

mod commands;
mod dispatch;
mod handle;
mod observers;
mod router;

pub(crate) use commands::RouterCommand;
pub(crate) use dispatch::RouterCore;
pub use handle::RouterHandle;
pub use observers::ObserverRegistry;
pub use router::{EventRouter, EventRouterBuilder};
