use serde::{Deserialize, Serialize};

/// Failure codes reported by a webmention send.
///
/// The set is closed; codes this crate does not recognise land in `Other`
/// so callers can still decide what to do with them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ErrorCode {
    /// The target does not advertise a webmention endpoint.
    NoEndpoint,
    /// The target URL is malformed or could not be fetched.
    BadTargetUrl,
    /// The source URL is malformed.
    BadSourceUrl,
    /// The receiver rejected the webmention or could not be reached.
    ReceiverError,
    Other(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::NoEndpoint => "NO_ENDPOINT",
            ErrorCode::BadTargetUrl => "BAD_TARGET_URL",
            ErrorCode::BadSourceUrl => "BAD_SOURCE_URL",
            ErrorCode::ReceiverError => "RECEIVER_ERROR",
            ErrorCode::Other(code) => code,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "NO_ENDPOINT" => ErrorCode::NoEndpoint,
            "BAD_TARGET_URL" => ErrorCode::BadTargetUrl,
            "BAD_SOURCE_URL" => ErrorCode::BadSourceUrl,
            "RECEIVER_ERROR" => ErrorCode::ReceiverError,
            _ => ErrorCode::Other(code),
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        ErrorCode::from(code.to_string())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

/// Structured result of one webmention send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<ErrorCode>,
    pub receiver_endpoint: Option<String>,
    /// Receiver status code and body, kept for logging.
    pub http_status: Option<u16>,
    pub detail: Option<String>,
}

impl SendOutcome {
    pub fn sent(endpoint: impl Into<String>, http_status: u16) -> Self {
        Self {
            success: true,
            error: None,
            receiver_endpoint: Some(endpoint.into()),
            http_status: Some(http_status),
            detail: None,
        }
    }

    pub fn failed(code: ErrorCode) -> Self {
        Self {
            success: false,
            error: Some(code),
            receiver_endpoint: None,
            http_status: None,
            detail: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.receiver_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_are_preserved() {
        let code = ErrorCode::from("TIMEOUT");
        assert_eq!(code, ErrorCode::Other("TIMEOUT".to_string()));
        assert_eq!(code.as_str(), "TIMEOUT");
    }

    #[test]
    fn known_codes_parse() {
        assert_eq!(ErrorCode::from("NO_ENDPOINT"), ErrorCode::NoEndpoint);
        assert_eq!(ErrorCode::from("RECEIVER_ERROR"), ErrorCode::ReceiverError);
        assert_eq!(
            serde_json::to_string(&ErrorCode::BadTargetUrl).unwrap(),
            "\"BAD_TARGET_URL\""
        );
    }
}
