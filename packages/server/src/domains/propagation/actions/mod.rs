mod propagate_response;

pub use propagate_response::{propagate_response, PropagateError, PropagateOutcome};
