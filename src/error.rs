use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::detector::AnomalyKind;

/// Main error type for the Tally voting service
#[derive(Debug)]
pub enum TallyError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Unparseable or incomplete vote request; no state was touched
    MalformedRequest(String),

    /// One or more behavioral rules fired for this attempt
    Anomalous(Vec<AnomalyKind>),

    /// Client has crossed the escalation threshold; rejected permanently
    Suspicious(Vec<AnomalyKind>),

    /// Global admission gate is out of tokens
    RateLimited,

    /// System I/O errors
    Io(std::io::Error),

    /// JSON serialization/deserialization errors
    Serialization(serde_json::Error),

    /// Internal lock poisoning or concurrency errors
    Concurrency(String),
}

impl fmt::Display for TallyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TallyError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TallyError::MalformedRequest(msg) => write!(f, "Malformed request: {}", msg),
            TallyError::Anomalous(kinds) => {
                write!(f, "Anomalous vote rejected: {:?}", kinds)
            }
            TallyError::Suspicious(_) => write!(f, "Suspicious client rejected"),
            TallyError::RateLimited => write!(f, "Rate limit exceeded"),
            TallyError::Io(err) => write!(f, "I/O error: {}", err),
            TallyError::Serialization(err) => write!(f, "Serialization error: {}", err),
            TallyError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
        }
    }
}

impl std::error::Error for TallyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TallyError::Io(err) => Some(err),
            TallyError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TallyError {
    fn from(err: std::io::Error) -> Self {
        TallyError::Io(err)
    }
}

impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        TallyError::Serialization(err)
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, TallyError>;

impl TallyError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            TallyError::Config(_) => StatusCode::BAD_REQUEST,
            TallyError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            TallyError::Anomalous(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TallyError::Suspicious(_) => StatusCode::FORBIDDEN,
            TallyError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            TallyError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TallyError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TallyError::Concurrency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing rejection text. Anomaly reasons are reported in a fixed
    /// priority order: suspicious, then too-frequent, then excessive-in-window,
    /// then selection-pattern, then duplicate.
    pub fn user_message(&self) -> String {
        match self {
            TallyError::Config(msg) => format!("Configuration error: {}", msg),
            TallyError::MalformedRequest(_) => "Malformed vote request.".to_string(),
            TallyError::Anomalous(kinds) => {
                let reason = if kinds.contains(&AnomalyKind::TooFrequent) {
                    "Voting too frequently. Please slow down and try again."
                } else if kinds.contains(&AnomalyKind::ExcessiveInWindow) {
                    "Too many votes in a short period. Please try again later."
                } else if kinds.contains(&AnomalyKind::SuspiciousSelection) {
                    "Unusual voting pattern. Please check your selection."
                } else if kinds.contains(&AnomalyKind::DuplicateVote) {
                    "Please do not resubmit an identical vote."
                } else {
                    "Vote rejected as anomalous."
                };
                reason.to_string()
            }
            TallyError::Suspicious(_) => {
                "Your voting behavior is anomalous. Voting has been disabled for this client."
                    .to_string()
            }
            TallyError::RateLimited => "Too many requests. Please try again later.".to_string(),
            TallyError::Io(_) => "Internal server error. Please try again later.".to_string(),
            TallyError::Serialization(_) => {
                "Data processing error. Please check your request format.".to_string()
            }
            TallyError::Concurrency(_) => {
                "Internal server error. Please try again later.".to_string()
            }
        }
    }

    /// Anomaly kinds carried by this error, if any
    pub fn anomaly_details(&self) -> Option<&[AnomalyKind]> {
        match self {
            TallyError::Anomalous(kinds) | TallyError::Suspicious(kinds) if !kinds.is_empty() => {
                Some(kinds)
            }
            _ => None,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            TallyError::Config(_) => "configuration_error",
            TallyError::MalformedRequest(_) => "malformed_request",
            TallyError::Anomalous(_) => "anomaly_rejected",
            TallyError::Suspicious(_) => "suspicious_client",
            TallyError::RateLimited => "rate_limit_exceeded",
            TallyError::Io(_) => "io_error",
            TallyError::Serialization(_) => "serialization_error",
            TallyError::Concurrency(_) => "concurrency_error",
        }
    }
}

// Axum IntoResponse implementation for HTTP error responses
impl IntoResponse for TallyError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.user_message(),
                "type": self.error_type(),
            }
        });
        (status_code, Json(error_response)).into_response()
    }
}
