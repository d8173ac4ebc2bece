//! Propagation: deliver a response to its targets under a lease and record
//! what happened to each one.

pub mod actions;
pub mod classify;
pub mod lease;

pub use actions::{propagate_response, PropagateError, PropagateOutcome};
pub use classify::{classify, Resolution};
pub use lease::{acquire_lease, release_lease, Lease};
