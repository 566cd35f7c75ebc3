//! # sqlrec plugins
//!
//! Built-in plugins observing recommendation runs.

pub mod attempt_log;
pub mod outcome;

// Re-exports
pub use attempt_log::AttemptLogPlugin;
pub use outcome::{OutcomeChannelPlugin, PublishedOutcome};
