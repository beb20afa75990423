//! Typed transport errors.
//!
//! Providers answer non-2xx requests with an error body in the
//! OpenAI-compatible envelope (`{"error": {"message", "type", "code"}}`).
//! `ApiError` preserves the status, code, and message so callers can match
//! known failure signatures instead of string-mangling `anyhow` output.

use compact_str::CompactString;
use serde::Deserialize;
use thiserror::Error;

/// An error response from a provider API.
#[derive(Debug, Clone, Error)]
#[error("api error ({status}{}): {message}", self.code_suffix())]
pub struct ApiError {
    /// HTTP status code of the response.
    pub status: u16,

    /// Provider error code, if the body carried one.
    pub code: CompactString,

    /// Provider error message.
    pub message: String,
}

/// The OpenAI-compatible error envelope.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<CompactString>,
    #[serde(default, rename = "type")]
    kind: Option<CompactString>,
}

impl ApiError {
    /// Create an error from a status code and raw response body.
    ///
    /// Falls back to the raw body text when the envelope does not parse.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self {
                status,
                code: parsed
                    .error
                    .code
                    .or(parsed.error.kind)
                    .unwrap_or_default(),
                message: parsed.error.message,
            },
            Err(_) => Self {
                status,
                code: CompactString::default(),
                message: body.trim().to_owned(),
            },
        }
    }

    /// Whether the status indicates a transient failure worth retrying.
    pub fn is_transient(&self) -> bool {
        self.status == 429 || self.status >= 500
    }

    fn code_suffix(&self) -> String {
        if self.code.is_empty() {
            String::new()
        } else {
            format!(" {}", self.code)
        }
    }
}

/// Raised when the transport's retry budget is exhausted.
///
/// Wraps the error from the final attempt; the attempt count covers the
/// initial call plus all retries.
#[derive(Debug, Error)]
#[error("retry budget exceeded after {attempts} attempts")]
pub struct RetryExhausted {
    /// Total attempts made.
    pub attempts: u32,

    /// The error from the final attempt.
    #[source]
    pub source: ApiError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_openai_error_envelope() {
        let body = r#"{"error": {"message": "Incorrect API key provided: sk-xxx", "type": "invalid_request_error", "code": "invalid_api_key"}}"#;
        let err = ApiError::from_body(401, body);
        assert_eq!(err.status, 401);
        assert_eq!(err.code, "invalid_api_key");
        assert!(err.message.starts_with("Incorrect API key"));
    }

    #[test]
    fn falls_back_to_type_when_code_missing() {
        let body = r#"{"error": {"message": "Overloaded", "type": "overloaded_error"}}"#;
        let err = ApiError::from_body(529, body);
        assert_eq!(err.code, "overloaded_error");
    }

    #[test]
    fn falls_back_to_raw_body() {
        let err = ApiError::from_body(503, "upstream connect error\n");
        assert!(err.code.is_empty());
        assert_eq!(err.message, "upstream connect error");
    }

    #[test]
    fn transient_statuses() {
        assert!(ApiError::from_body(429, "{}").is_transient());
        assert!(ApiError::from_body(503, "{}").is_transient());
        assert!(!ApiError::from_body(401, "{}").is_transient());
    }
}
