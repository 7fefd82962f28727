//! Response envelope and the normalized client-side error type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message carried by the envelope synthesized for requests that never got a response.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";

/// The backend's uniform response wrapper.
///
/// Every REST endpoint answers with `{ success, message?, data, ... }`. List
/// endpoints add pagination counters next to `data`. The client hands the
/// envelope back to the caller unchanged, so all fields are lenient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T = Value> {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u64>,
}

impl<T> Default for Envelope<T> {
    fn default() -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            count: None,
            total: None,
            page: None,
            pages: None,
        }
    }
}

impl<T> Envelope<T> {
    /// Build the `{ success: false, message }` shape used for every client-side failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Consume the envelope, returning `data` only when the server reported success.
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            None
        }
    }
}

/// Attempt to parse a response body as an envelope.
///
/// Bodies that are JSON but carry neither `success` nor `message` are not
/// treated as envelopes.
pub fn try_envelope(body: &str) -> Option<Envelope> {
    let value: Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;
    if !object.contains_key("success") && !object.contains_key("message") {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// API error type for client-side use.
///
/// Whatever went wrong, [`ApiError::envelope`] yields a `{ success: false, message }`
/// envelope so callers can handle failures the same way they handle server replies.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// No response was received (connect failure, timeout, dropped connection).
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {}", .envelope.message.as_deref().unwrap_or("request failed"))]
    Server { status: u16, envelope: Envelope },
    /// The request could not be built or the response could not be decoded.
    #[error("request error: {0}")]
    Request(String),
}

impl ApiError {
    /// Build a server error from a non-2xx status and its raw body.
    ///
    /// The body is kept verbatim when it is an envelope. Plain text becomes
    /// the message; empty, HTML and other JSON bodies get a status message.
    pub fn from_status(status: u16, body: &str) -> Self {
        let envelope = try_envelope(body).unwrap_or_else(|| {
            let text = body.trim();
            if text.is_empty()
                || text.starts_with('<')
                || serde_json::from_str::<Value>(text).is_ok()
            {
                Envelope::failure(format!("Request failed with status code {status}"))
            } else {
                Envelope::failure(text)
            }
        });
        ApiError::Server { status, envelope }
    }

    /// HTTP status, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The normalized `{ success: false, message }` envelope for this error.
    pub fn envelope(&self) -> Envelope {
        match self {
            ApiError::Network(_) => Envelope::failure(NETWORK_ERROR_MESSAGE),
            ApiError::Server { envelope, .. } => envelope.clone(),
            ApiError::Request(msg) => Envelope::failure(msg.clone()),
        }
    }

    /// User-facing message.
    pub fn message(&self) -> String {
        self.envelope()
            .message
            .unwrap_or_else(|| "Request failed".to_string())
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}
