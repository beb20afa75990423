//! Error classification.
//!
//! Matches raised call-time errors against the fixed set of known
//! external-provider failure signatures. Classification inspects typed
//! transport errors first and falls back to message substrings for the
//! signatures providers only express as text. Unmatched errors classify as
//! [`ErrorKind::Unknown`] and receive no special handling.

use llm::{ApiError, RetryExhausted};
use serde::Serialize;

/// Which known failure pattern an error matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid or incorrect API key.
    InvalidApiKey,
    /// The API key has been deactivated.
    DeactivatedApiKey,
    /// Unsupported or invalid model name.
    InvalidModel,
    /// Insufficient account balance (Anthropic).
    InsufficientBalance,
    /// Throttling or rate limiting.
    Throttled,
    /// Generic service-unavailable, retryable.
    ServiceUnavailable,
    /// The transport retry budget was exceeded on an auth failure.
    RetryBudgetExceeded,
    /// Nothing matched; not specially handled.
    Unknown,
}

impl ErrorKind {
    /// Human-readable tag recorded in the user-facing error log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidApiKey => "invalid_api_key",
            Self::DeactivatedApiKey => "deactivated_api_key",
            Self::InvalidModel => "invalid_model",
            Self::InsufficientBalance => "insufficient_balance",
            Self::Throttled => "throttled",
            Self::ServiceUnavailable => "service_unavailable",
            Self::RetryBudgetExceeded => "retry_budget_exceeded",
            Self::Unknown => "unknown",
        }
    }
}

/// Classify a raised error against the known failure signatures.
pub fn classify(error: &anyhow::Error) -> ErrorKind {
    // The transport wraps exhausted transient retries; an auth failure under
    // that wrapper is the provider-SDK "retry budget" signature, anything
    // else classifies by the underlying error.
    if let Some(retry) = error.downcast_ref::<RetryExhausted>() {
        if retry.source.status == 401 {
            return ErrorKind::RetryBudgetExceeded;
        }
        return classify_api(&retry.source);
    }

    if let Some(api) = error.downcast_ref::<ApiError>() {
        return classify_api(api);
    }

    // Connection-level failures never reached the provider; treat them the
    // way a 503 is treated so the backup path can kick in.
    if let Some(req) = error.downcast_ref::<reqwest::Error>() {
        if req.is_timeout() || req.is_connect() {
            return ErrorKind::ServiceUnavailable;
        }
    }

    classify_message(&format!("{error:#}"))
}

fn classify_api(api: &ApiError) -> ErrorKind {
    match api.status {
        401 if api.code == "invalid_api_key" || api.message.contains("Incorrect API key") => {
            ErrorKind::InvalidApiKey
        }
        401 | 403 if api.message.contains("deactivated") => ErrorKind::DeactivatedApiKey,
        404 if api.code == "model_not_found" || api.message.contains("does not exist") => {
            ErrorKind::InvalidModel
        }
        400 if api.message.contains("credit balance is too low") => {
            ErrorKind::InsufficientBalance
        }
        429 => ErrorKind::Throttled,
        503 | 529 => ErrorKind::ServiceUnavailable,
        _ => classify_message(&api.message),
    }
}

/// Substring fallback for signatures only expressed as text.
fn classify_message(message: &str) -> ErrorKind {
    if message.contains("Incorrect API key") {
        ErrorKind::InvalidApiKey
    } else if message.contains("deactivated") && message.contains("API key") {
        ErrorKind::DeactivatedApiKey
    } else if message.contains("Too many requests") || message.contains("ThrottlingException") {
        ErrorKind::Throttled
    } else if message.contains("Service Unavailable") || message.contains("Overloaded") {
        ErrorKind::ServiceUnavailable
    } else {
        ErrorKind::Unknown
    }
}
