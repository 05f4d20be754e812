//! Error types for Sonar API operations.
//!
//! Every failed call produces exactly one [`SonarError`]. Classification of
//! HTTP failures is a pure function of the status code and the (possibly
//! empty or malformed) response body; see [`SonarError::from_status`].

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur during Sonar API operations.
#[derive(Debug, Clone, Error)]
pub enum SonarError {
    /// Invalid input, rejected either client-side before any request was
    /// sent or by the server with a 400/422 validation payload.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        /// The offending parameter, when known.
        field: Option<String>,
        status: Option<u16>,
        body: Option<serde_json::Value>,
    },

    /// Any other non-success response.
    #[error("Sonar API error ({status}): {message}")]
    Api {
        message: String,
        status: u16,
        body: Option<serde_json::Value>,
    },

    /// HTTP 429.
    #[error("Rate limited: {message}")]
    RateLimit {
        message: String,
        /// Seconds to wait, from `Retry-After` or the body.
        retry_after_secs: Option<u64>,
        /// Raw `X-RateLimit-Reset` hint.
        reset: Option<String>,
        body: Option<serde_json::Value>,
    },

    /// HTTP 401.
    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        body: Option<serde_json::Value>,
    },

    /// HTTP 403.
    #[error("Not authorized: {message}")]
    Authorization {
        message: String,
        body: Option<serde_json::Value>,
    },

    /// HTTP 404.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        body: Option<serde_json::Value>,
    },

    /// No response was received (DNS, connection reset, body read failure).
    #[error("Network error: {message}")]
    Network { message: String },

    /// The deadline elapsed or the caller cancelled the request.
    #[error("Request timed out: {message}")]
    Timeout { message: String },

    /// HTTP 5xx.
    #[error("Server error ({status}): {message}")]
    Server {
        message: String,
        status: u16,
        body: Option<serde_json::Value>,
    },
}

/// Fieldless mirror of [`SonarError`] variants for matching by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Api,
    RateLimit,
    Authentication,
    Authorization,
    NotFound,
    Network,
    Timeout,
    Server,
}

/// Result type alias for Sonar operations.
pub type Result<T> = core::result::Result<T, SonarError>;

impl SonarError {
    /// Client-side validation failure naming the offending field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SonarError::Validation {
            message: message.into(),
            field: Some(field.into()),
            status: None,
            body: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        SonarError::Network {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        SonarError::Timeout {
            message: message.into(),
        }
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SonarError::Validation { .. } => ErrorKind::Validation,
            SonarError::Api { .. } => ErrorKind::Api,
            SonarError::RateLimit { .. } => ErrorKind::RateLimit,
            SonarError::Authentication { .. } => ErrorKind::Authentication,
            SonarError::Authorization { .. } => ErrorKind::Authorization,
            SonarError::NotFound { .. } => ErrorKind::NotFound,
            SonarError::Network { .. } => ErrorKind::Network,
            SonarError::Timeout { .. } => ErrorKind::Timeout,
            SonarError::Server { .. } => ErrorKind::Server,
        }
    }

    /// The HTTP status that produced this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            SonarError::Validation { status, .. } => *status,
            SonarError::Api { status, .. } | SonarError::Server { status, .. } => Some(*status),
            SonarError::RateLimit { .. } => Some(429),
            SonarError::Authentication { .. } => Some(401),
            SonarError::Authorization { .. } => Some(403),
            SonarError::NotFound { .. } => Some(404),
            SonarError::Network { .. } | SonarError::Timeout { .. } => None,
        }
    }

    /// The parsed response body, if the server sent JSON.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            SonarError::Validation { body, .. }
            | SonarError::Api { body, .. }
            | SonarError::RateLimit { body, .. }
            | SonarError::Authentication { body, .. }
            | SonarError::Authorization { body, .. }
            | SonarError::NotFound { body, .. }
            | SonarError::Server { body, .. } => body.as_ref(),
            SonarError::Network { .. } | SonarError::Timeout { .. } => None,
        }
    }

    /// The offending field of a validation error.
    pub fn field(&self) -> Option<&str> {
        match self {
            SonarError::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Classify a failed response.
    ///
    /// `raw_body` is the undecoded body text; it may be empty or non-JSON.
    pub fn from_status(status: StatusCode, headers: &HeaderMap, raw_body: &str) -> Self {
        let body = serde_json::from_str::<serde_json::Value>(raw_body).ok();
        let message = extract_message(status, body.as_ref(), raw_body);
        let code = status.as_u16();

        match code {
            400 | 422 => SonarError::Validation {
                field: body.as_ref().and_then(extract_field),
                message,
                status: Some(code),
                body,
            },
            401 => SonarError::Authentication { message, body },
            403 => SonarError::Authorization { message, body },
            404 => SonarError::NotFound { message, body },
            429 => SonarError::RateLimit {
                retry_after_secs: header_str(headers, "retry-after")
                    .and_then(|v| v.trim().parse().ok())
                    .or_else(|| body.as_ref().and_then(body_retry_after)),
                reset: header_str(headers, "x-ratelimit-reset").map(str::to_string),
                message,
                body,
            },
            500..=599 => SonarError::Server {
                message,
                status: code,
                body,
            },
            _ => SonarError::Api {
                message,
                status: code,
                body,
            },
        }
    }

    /// Classify a transport failure where no usable response was received.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            SonarError::timeout(err.to_string())
        } else {
            SonarError::network(err.to_string())
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn body_retry_after(body: &serde_json::Value) -> Option<u64> {
    body.get("retryAfter").and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    })
}

/// Pull a human-readable message out of an error body.
///
/// Sonar reports errors as `{"errors":[{"msg":"..."}]}`; other services put
/// a `message` or `error` string at the top level.
fn extract_message(
    status: StatusCode,
    body: Option<&serde_json::Value>,
    raw_body: &str,
) -> String {
    if let Some(json) = body {
        if let Some(errors) = json.get("errors").and_then(|e| e.as_array()) {
            let msgs: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("msg").or_else(|| e.get("message")))
                .filter_map(|m| m.as_str())
                .collect();
            if !msgs.is_empty() {
                return msgs.join("; ");
            }
        }
        if let Some(msg) = json.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
        if let Some(err) = json.get("error").and_then(|m| m.as_str()) {
            return err.to_string();
        }
    }

    let trimmed = raw_body.trim();
    if trimmed.is_empty() {
        match status.canonical_reason() {
            Some(reason) => format!("HTTP {} {reason}", status.as_u16()),
            None => format!("HTTP {}", status.as_u16()),
        }
    } else {
        trimmed.to_string()
    }
}

fn extract_field(body: &serde_json::Value) -> Option<String> {
    let first = body.get("errors")?.as_array()?.first()?;
    first
        .get("field")
        .or_else(|| first.get("param"))
        .and_then(|f| f.as_str())
        .map(str::to_string)
}
