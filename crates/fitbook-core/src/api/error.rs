use serde_json::Value;
use thiserror::Error;

use crate::models::FieldErrors;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - request rejected after token refresh")]
    Unauthorized,

    #[error("Session expired - please log in again ({0})")]
    SessionExpired(#[source] RefreshError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request failed ({status}): {message}")]
    BadRequest { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("{0}")]
    Validation(#[from] FieldErrors),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Request cancelled")]
    Cancelled,
}

/// Why a token refresh did not produce a new access token.
/// Cloneable so one outcome can be handed to every waiting request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    MissingCredential,

    #[error("refresh rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("failed to store refreshed token: {0}")]
    Storage(String),

    #[error("refresh task aborted")]
    Aborted,

    /// A login or logout replaced the session while the refresh ran
    #[error("session changed during refresh")]
    Superseded,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull a human-readable message out of a backend error body.
    /// Tries `error`, then `non_field_errors`, then per-field messages,
    /// falling back to the raw body.
    pub fn backend_message(body: &str) -> String {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        if let Some(Value::Object(map)) = parsed {
            if let Some(Value::String(error)) = map.get("error") {
                return error.clone();
            }
            if let Some(Value::Array(items)) = map.get("non_field_errors") {
                let joined = join_strings(items);
                if !joined.is_empty() {
                    return joined;
                }
            }
            let fields: Vec<String> = map
                .values()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Array(items) => Some(join_strings(items)),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect();
            if !fields.is_empty() {
                return fields.join(", ");
            }
        }
        Self::truncate_body(body)
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(Self::backend_message(body)),
            404 => ApiError::NotFound(Self::truncate_body(body)),
            429 => ApiError::RateLimited,
            400..=499 => ApiError::BadRequest {
                status: status.as_u16(),
                message: Self::backend_message(body),
            },
            500..=599 => ApiError::ServerError(Self::truncate_body(body)),
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }

    /// True when the user has to log in again
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::SessionExpired(_))
    }
}

fn join_strings(items: &[Value]) -> String {
    items
        .iter()
        .filter_map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
