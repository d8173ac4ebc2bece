mod poll_source;

pub use poll_source::{poll_source, PollError, PollOutcome};
