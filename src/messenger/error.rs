//! Delivery error types

use std::time::Duration;
use thiserror::Error;

/// Delivery error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DeliveryError {
    pub kind: DeliveryErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl DeliveryError {
    pub fn new(kind: DeliveryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Network, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Unknown, message)
    }

    /// Classify a Bot API error response
    pub fn from_api(status: u16, description: &str) -> Self {
        let kind = match status {
            429 => DeliveryErrorKind::RateLimit,
            401 | 404 => DeliveryErrorKind::Auth,
            403 => DeliveryErrorKind::Blocked,
            400 => DeliveryErrorKind::InvalidRequest,
            500..=599 => DeliveryErrorKind::ServerError,
            _ => DeliveryErrorKind::Unknown,
        };
        Self::new(kind, format!("Bot API {status}: {description}"))
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    /// Timeouts, connection failures
    Network,
    /// 429 Too Many Requests
    RateLimit,
    /// 5xx from the Bot API
    ServerError,
    /// Bad token
    Auth,
    /// The recipient blocked the bot or never started it
    Blocked,
    /// Malformed request
    InvalidRequest,
    Unknown,
}

impl DeliveryErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit | Self::ServerError)
    }
}
