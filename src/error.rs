//! Error taxonomy for a chat submission.
//!
//! Every failure a submission can hit ends up as a [`ChatError`]. Its
//! `Display` output is the exact text shown to the user: a summary line
//! followed by an `Instruction:` line telling them what to do next.

use serde_json::Value;

const INVALID_INPUT_FALLBACK: &str = "Please fill in all required fields correctly.";

/// Coarse grouping of [`ChatError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    InvalidRequest,
    AuthFailure,
    NotFound,
    InvalidInput,
    ServerError,
    Generic,
    Network,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Input was empty or whitespace; nothing was sent.
    #[error("Please fill in all fields before submitting.")]
    EmptyInput,

    #[error("Invalid request. Please check your input and try again.\nInstruction: Ensure all fields are filled and valid.")]
    InvalidRequest,

    #[error("Error: Authorization failed.\nInstruction: Please check your backend configuration. You may be missing an API key.")]
    Unauthorized { status: u16 },

    #[error("Requested resource or model not found.\nInstruction: Please check the model name or contact support if the issue persists.")]
    NotFound,

    #[error("Missing or invalid input.\nInstruction: {}", .detail.as_deref().unwrap_or(INVALID_INPUT_FALLBACK))]
    InvalidInput { detail: Option<String> },

    #[error("Server error.\nInstruction: The server is currently unavailable. Please try again later or contact support if the issue persists.")]
    ServerError,

    #[error("Error: API error: {status}{}\nInstruction: An unexpected error occurred. Please try again or contact support.", details_line(.detail))]
    UnexpectedStatus { status: u16, detail: Option<String> },

    /// The backend could not be reached. The payload is the transport message,
    /// kept for logs.
    #[error("Error: Network error.\nInstruction: Could not connect to the backend. Please ensure it is running and accessible.")]
    Network(String),

    #[error("Error: {0}\nInstruction: An unexpected error occurred. Please try again or contact support.")]
    Other(String),
}

fn details_line(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!("\nDetails: {}", detail),
        None => String::new(),
    }
}

impl ChatError {
    /// Map a non-success HTTP status (and any detail from its body) to an error.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        match status {
            400 => ChatError::InvalidRequest,
            401 | 403 => ChatError::Unauthorized { status },
            404 => ChatError::NotFound,
            422 => ChatError::InvalidInput { detail },
            500 => ChatError::ServerError,
            _ => ChatError::UnexpectedStatus { status, detail },
        }
    }

    /// Classify a transport failure by its message text.
    pub fn from_transport_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.to_lowercase().contains("network") {
            ChatError::Network(message)
        } else {
            ChatError::Other(message)
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ChatError::EmptyInput => ErrorCategory::Validation,
            ChatError::InvalidRequest => ErrorCategory::InvalidRequest,
            ChatError::Unauthorized { .. } => ErrorCategory::AuthFailure,
            ChatError::NotFound => ErrorCategory::NotFound,
            ChatError::InvalidInput { .. } => ErrorCategory::InvalidInput,
            ChatError::ServerError => ErrorCategory::ServerError,
            ChatError::UnexpectedStatus { .. } => ErrorCategory::Generic,
            ChatError::Network(_) => ErrorCategory::Network,
            ChatError::Other(_) => ErrorCategory::Unknown,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ChatError::Network(err.to_string())
        } else {
            ChatError::from_transport_message(err.to_string())
        }
    }
}

/// Pull a human-readable detail out of an error response body.
///
/// A non-empty string `detail` is used directly. A non-empty array uses the
/// `msg` of its first element. Anything else yields `None`.
pub fn extract_detail(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items
            .first()
            .and_then(|first| first.get("msg"))
            .and_then(Value::as_str)
            .filter(|msg| !msg.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Like [`extract_detail`], but from raw bytes; unparseable bodies give `None`.
pub fn extract_detail_from_bytes(bytes: &[u8]) -> Option<String> {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|body| extract_detail(&body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fixed_statuses_map_to_categories() {
        let cases = [
            (400, ErrorCategory::InvalidRequest),
            (401, ErrorCategory::AuthFailure),
            (403, ErrorCategory::AuthFailure),
            (404, ErrorCategory::NotFound),
            (422, ErrorCategory::InvalidInput),
            (500, ErrorCategory::ServerError),
            (502, ErrorCategory::Generic),
            (418, ErrorCategory::Generic),
        ];
        for (status, category) in cases {
            assert_eq!(ChatError::from_status(status, None).category(), category, "status {}", status);
        }
    }

    #[test]
    fn test_auth_message_same_for_401_and_403() {
        assert_eq!(
            ChatError::from_status(401, None).to_string(),
            ChatError::from_status(403, None).to_string()
        );
        assert!(ChatError::from_status(403, None)
            .to_string()
            .starts_with("Error: Authorization failed."));
    }

    #[test]
    fn test_invalid_input_echoes_detail() {
        let err = ChatError::from_status(422, Some("field required".to_string()));
        assert_eq!(
            err.to_string(),
            "Missing or invalid input.\nInstruction: field required"
        );
    }

    #[test]
    fn test_invalid_input_without_detail_uses_fallback() {
        let err = ChatError::from_status(422, None);
        assert_eq!(
            err.to_string(),
            "Missing or invalid input.\nInstruction: Please fill in all required fields correctly."
        );
    }

    #[test]
    fn test_unexpected_status_includes_status_and_detail() {
        let err = ChatError::from_status(503, Some("overloaded".to_string()));
        assert_eq!(
            err.to_string(),
            "Error: API error: 503\nDetails: overloaded\nInstruction: An unexpected error occurred. Please try again or contact support."
        );

        let err = ChatError::from_status(503, None);
        assert_eq!(
            err.to_string(),
            "Error: API error: 503\nInstruction: An unexpected error occurred. Please try again or contact support."
        );
    }

    #[test]
    fn test_every_error_carries_instruction_except_validation() {
        let errors = [
            ChatError::InvalidRequest,
            ChatError::Unauthorized { status: 401 },
            ChatError::NotFound,
            ChatError::InvalidInput { detail: None },
            ChatError::ServerError,
            ChatError::UnexpectedStatus { status: 599, detail: None },
            ChatError::Network("x".to_string()),
            ChatError::Other("x".to_string()),
        ];
        for err in errors {
            assert!(err.to_string().contains("\nInstruction: "), "{:?}", err);
        }
        assert!(!ChatError::EmptyInput.to_string().contains("Instruction"));
    }

    #[test]
    fn test_transport_message_network_heuristic() {
        assert_eq!(
            ChatError::from_transport_message("NetworkError when attempting to fetch").category(),
            ErrorCategory::Network
        );
        let other = ChatError::from_transport_message("stream closed");
        assert_eq!(other.category(), ErrorCategory::Unknown);
        assert_eq!(
            other.to_string(),
            "Error: stream closed\nInstruction: An unexpected error occurred. Please try again or contact support."
        );
    }

    #[test]
    fn test_extract_detail_string() {
        assert_eq!(extract_detail(&json!({"detail": "bad key"})), Some("bad key".to_string()));
        assert_eq!(extract_detail(&json!({"detail": ""})), None);
    }

    #[test]
    fn test_extract_detail_array_uses_first_msg() {
        let body = json!({"detail": [{"loc": ["body", "input"], "msg": "field required"}, {"msg": "second"}]});
        assert_eq!(extract_detail(&body), Some("field required".to_string()));
    }

    #[test]
    fn test_extract_detail_ignores_other_shapes() {
        assert_eq!(extract_detail(&json!({"detail": []})), None);
        assert_eq!(extract_detail(&json!({"detail": [{"loc": []}]})), None);
        assert_eq!(extract_detail(&json!({"detail": {"msg": "object"}})), None);
        assert_eq!(extract_detail(&json!({"error": "nope"})), None);
        assert_eq!(extract_detail(&json!("just a string")), None);
    }

    #[test]
    fn test_extract_detail_from_unparseable_bytes() {
        assert_eq!(extract_detail_from_bytes(b"<html>Internal Server Error</html>"), None);
        assert_eq!(extract_detail_from_bytes(b""), None);
        assert_eq!(
            extract_detail_from_bytes(br#"{"detail":"nope"}"#),
            Some("nope".to_string())
        );
    }
}
