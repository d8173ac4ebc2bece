//! Polling: fetch a source's activities, discover their targets and record
//! one response per interaction.

pub mod actions;
pub mod extractor;

pub use actions::{poll_source, PollError, PollOutcome};
pub use extractor::extract_targets;
