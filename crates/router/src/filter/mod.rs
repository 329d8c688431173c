//! Predicate matching: parsed event filters and the per-event-name
//! matcher index.

mod index;
mod matcher;

pub use index::FilterIndex;
pub use matcher::{EventMatcher, MatcherError};
