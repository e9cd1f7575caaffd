//! Error types for the CLAIM'N API client.
//!
//! # Design
//! The set of failures is closed so callers match exhaustively. `NotFound`
//! gets a dedicated variant because "no resource yet" is routinely handled
//! as an empty state rather than an alert. Every server-reported failure
//! carries an `ErrorDetail`, falling back to `ErrorDetail::unknown()` when
//! the body is not the documented `{ "error": { ... } }` shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

pub const UNKNOWN_CODE: &str = "UNKNOWN";
pub const UNKNOWN_MESSAGE: &str = "An unknown error occurred";

/// The `error` object of a failed API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorDetail {
    /// Substitute for error bodies that cannot be parsed.
    pub fn unknown() -> Self {
        Self {
            code: UNKNOWN_CODE.to_string(),
            message: UNKNOWN_MESSAGE.to_string(),
            details: None,
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Wire shape of an error response body.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

/// Errors returned by `ApiClient` parse methods and `HttpClient` calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No access token was available; no request was sent.
    #[error("not authenticated")]
    Unauthenticated,

    /// The server returned 401. Stored credentials have been cleared.
    #[error("session expired, please sign in again")]
    SessionExpired,

    /// The server returned 404.
    #[error("not found: {error}")]
    NotFound { error: ErrorDetail },

    /// The server returned a non-2xx status other than 401 and 404.
    #[error("HTTP {status} {error}")]
    Http { status: u16, error: ErrorDetail },

    /// No response was received.
    #[error(transparent)]
    Network(#[from] TransportError),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A successful response body was not the expected JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ApiError {
    /// HTTP status reported by the server, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::SessionExpired => Some(401),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Machine-readable code suitable for UI mapping.
    pub fn code(&self) -> &str {
        match self {
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::SessionExpired => "SESSION_EXPIRED",
            ApiError::NotFound { error } | ApiError::Http { error, .. } => &error.code,
            ApiError::Network(_) => "NETWORK_ERROR",
            ApiError::Serialization(_) => "SERIALIZATION_ERROR",
            ApiError::Deserialization(_) => "DESERIALIZATION_ERROR",
        }
    }

    /// Human-readable message. Server-provided when available.
    pub fn message(&self) -> String {
        match self {
            ApiError::NotFound { error } | ApiError::Http { error, .. } => error.message.clone(),
            other => other.to_string(),
        }
    }

    /// The server's error detail, for `NotFound` and `Http`.
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            ApiError::NotFound { error } | ApiError::Http { error, .. } => Some(error),
            _ => None,
        }
    }
}
