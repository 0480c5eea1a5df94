//! Error types for live-link.

use crate::models::ErrorDetail;
use thiserror::Error;

/// Connection-level failure reported by the transport driver.
///
/// Carries the host/port the client was trying to reach so the
/// `network_error` handler can tell which endpoint failed.
#[derive(Debug, Clone, Error)]
#[error("Unable to connect to server at {host}:{port}: {message}")]
pub struct TransportError {
    pub host: String,
    pub port: u16,
    /// Message of the underlying driver error.
    pub message: String,
}

impl TransportError {
    pub fn new(host: impl Into<String>, port: u16, message: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the client, its rooms and its connection.
#[derive(Debug, Clone, Error)]
pub enum LiveLinkError {
    /// Transport failure. Delivered through the `network_error` event.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A subscribe/renew request was rejected by the server.
    #[error("Subscription error: {0}")]
    SubscriptionError(String),

    /// Synchronous API misuse (missing callback, invalid argument).
    #[error("Usage error: {0}")]
    UsageError(String),

    /// The server answered a request with an error payload.
    #[error("Server error: {0}")]
    ServerError(ErrorDetail),

    /// The request could not be sent and was not eligible for queuing.
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// The request was dropped from the offline queue (expired or evicted).
    #[error("Request discarded: {0}")]
    Discarded(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<serde_json::Error> for LiveLinkError {
    fn from(err: serde_json::Error) -> Self {
        LiveLinkError::SerializationError(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LiveLinkError>;
