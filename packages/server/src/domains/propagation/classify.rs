//! What a send outcome means for its target.

use crate::kernel::{ErrorCode, SendOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Delivered; move to `sent`
    Sent,
    /// Can never succeed; drop from the response
    GiveUp,
    /// Move to `error` and try again on the next delivery
    Retry,
}

/// Only a missing endpoint is permanent. Every other code, including ones
/// this build does not know, is retried.
pub fn classify(outcome: &SendOutcome) -> Resolution {
    if outcome.success {
        return Resolution::Sent;
    }
    match outcome.error {
        Some(ErrorCode::NoEndpoint) => Resolution::GiveUp,
        _ => Resolution::Retry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(&SendOutcome::sent("http://e/", 202)), Resolution::Sent);
        assert_eq!(
            classify(&SendOutcome::failed(ErrorCode::NoEndpoint)),
            Resolution::GiveUp
        );
        for code in [
            ErrorCode::BadTargetUrl,
            ErrorCode::BadSourceUrl,
            ErrorCode::ReceiverError,
            ErrorCode::from("SOMETHING_NEW"),
        ] {
            assert_eq!(classify(&SendOutcome::failed(code)), Resolution::Retry);
        }
    }
}
