//! Normalized errors.
//!
//! Every failure that crosses from a service client into a store is an
//! [`ApiError`]. Its serialized form is the only error shape observable
//! state may hold: `{ message, status?, data?, code }`.

use crate::request::{HttpResponse, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NETWORK_ERROR_MESSAGE: &str = "Network Error - Please check if the server is running";

// =========================================================
// Error kinds
// =========================================================

/// Cause of a failure, serialized as its machine-readable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiErrorKind {
    /// No HTTP response reached the client.
    #[serde(rename = "ERR_NETWORK")]
    Network,
    /// The per-request timeout elapsed.
    #[serde(rename = "ECONNABORTED")]
    Timeout,
    /// 401 from any service.
    #[serde(rename = "ERR_UNAUTHORIZED")]
    Unauthorized,
    /// Any other 4xx.
    #[serde(rename = "ERR_BAD_REQUEST")]
    BadRequest,
    /// 5xx.
    #[serde(rename = "ERR_BAD_RESPONSE")]
    BadResponse,
    /// 2xx whose body does not match the expected type.
    #[serde(rename = "ERR_DECODE")]
    Decode,
    /// 2xx that decodes but lacks something the caller requires.
    #[serde(rename = "ERR_INVALID_RESPONSE")]
    InvalidResponse,
    /// The request body could not be encoded; nothing was sent.
    #[serde(rename = "ERR_ENCODE")]
    Encode,
}

impl ApiErrorKind {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiErrorKind::Network => "ERR_NETWORK",
            ApiErrorKind::Timeout => "ECONNABORTED",
            ApiErrorKind::Unauthorized => "ERR_UNAUTHORIZED",
            ApiErrorKind::BadRequest => "ERR_BAD_REQUEST",
            ApiErrorKind::BadResponse => "ERR_BAD_RESPONSE",
            ApiErrorKind::Decode => "ERR_DECODE",
            ApiErrorKind::InvalidResponse => "ERR_INVALID_RESPONSE",
            ApiErrorKind::Encode => "ERR_ENCODE",
        }
    }

    fn from_status(status: u16) -> Self {
        match status {
            401 => ApiErrorKind::Unauthorized,
            500.. => ApiErrorKind::BadResponse,
            _ => ApiErrorKind::BadRequest,
        }
    }
}

// =========================================================
// ApiError
// =========================================================

/// The normalized error.
///
/// `message` is always safe to render directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(rename = "code")]
    pub kind: ApiErrorKind,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            data: None,
            kind,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidResponse, message)
    }

    pub fn code(&self) -> &'static str {
        self.kind.error_code()
    }

    /// 401 or 403.
    pub fn is_auth_error(&self) -> bool {
        matches!(self.status, Some(401 | 403))
    }

    /// True when no HTTP response was received (connectivity or timeout).
    pub fn is_network_error(&self) -> bool {
        self.status.is_none() && matches!(self.kind, ApiErrorKind::Network | ApiErrorKind::Timeout)
    }

    /// The message, or `fallback` when the message is blank.
    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.message.trim().is_empty() {
            fallback
        } else {
            &self.message
        }
    }
}

// =========================================================
// Normalization
// =========================================================

/// Picks a human-readable message out of an error body.
///
/// Order: `detail` string, first `detail` entry (string or its `msg`),
/// top-level `message`.
fn extract_message(data: &Value) -> Option<String> {
    match data.get("detail") {
        Some(Value::String(detail)) => return Some(detail.clone()),
        Some(Value::Array(items)) => {
            let first = items.first().and_then(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => obj.get("msg").and_then(Value::as_str).map(str::to_string),
                _ => None,
            });
            if first.is_some() {
                return first;
            }
        }
        _ => {}
    }
    data.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Converts a non-2xx response into an [`ApiError`].
pub fn normalize_response(resp: &HttpResponse) -> ApiError {
    let data = serde_json::from_str::<Value>(&resp.body).ok();
    let message = data
        .as_ref()
        .and_then(extract_message)
        .unwrap_or_else(|| format!("Request failed with status code {}", resp.status));

    let mut err = ApiError::new(ApiErrorKind::from_status(resp.status), message).with_status(resp.status);
    if let Some(data) = data {
        err = err.with_data(data);
    } else if !resp.body.is_empty() {
        err = err.with_data(Value::String(resp.body.clone()));
    }
    err
}

/// Converts a transport failure into an [`ApiError`] with no status.
pub fn normalize_transport(e: &TransportError) -> ApiError {
    match e {
        TransportError::Timeout(_) => ApiError::new(ApiErrorKind::Timeout, e.to_string()),
        TransportError::Network(_) | TransportError::InvalidRequest(_) => {
            ApiError::new(ApiErrorKind::Network, NETWORK_ERROR_MESSAGE)
        }
    }
}

/// Converts a body that failed to decode into an [`ApiError`].
pub fn normalize_decode(resp: &HttpResponse, e: &serde_json::Error) -> ApiError {
    ApiError::new(ApiErrorKind::Decode, format!("Unexpected response from server: {e}"))
        .with_status(resp.status)
}
