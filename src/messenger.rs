//! Outbound chat delivery
//!
//! The runtime only sees the [`Messenger`] trait; the Telegram Bot API
//! client lives in [`telegram`].

mod error;
pub mod telegram;

pub use error::DeliveryError;
pub use telegram::TelegramMessenger;

use crate::db::UserId;
use crate::state_machine::Keyboard;
use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for chat transports
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message, optionally replacing the reply keyboard
    async fn send_text(
        &self,
        to: UserId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), DeliveryError>;

    /// Send a map pin
    async fn send_location(
        &self,
        to: UserId,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<T: Messenger + ?Sized> Messenger for Arc<T> {
    async fn send_text(
        &self,
        to: UserId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), DeliveryError> {
        (**self).send_text(to, text, keyboard).await
    }

    async fn send_location(
        &self,
        to: UserId,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), DeliveryError> {
        (**self).send_location(to, latitude, longitude).await
    }
}

/// Logging wrapper for messengers
pub struct LoggingMessenger<M> {
    inner: M,
}

impl<M: Messenger> LoggingMessenger<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    fn log(to: UserId, kind: &str, started: std::time::Instant, result: &Result<(), DeliveryError>) {
        let duration = started.elapsed();
        match result {
            Ok(()) => {
                tracing::debug!(
                    to = %to,
                    kind,
                    duration_ms = %duration.as_millis(),
                    "Message delivered"
                );
            }
            Err(e) => {
                tracing::warn!(
                    to = %to,
                    kind,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    retry_after_secs = ?e.retry_after.map(|d| d.as_secs()),
                    "Message delivery failed"
                );
            }
        }
    }
}

#[async_trait]
impl<M: Messenger> Messenger for LoggingMessenger<M> {
    async fn send_text(
        &self,
        to: UserId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), DeliveryError> {
        let started = std::time::Instant::now();
        let result = self.inner.send_text(to, text, keyboard).await;
        Self::log(to, "text", started, &result);
        result
    }

    async fn send_location(
        &self,
        to: UserId,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), DeliveryError> {
        let started = std::time::Instant::now();
        let result = self.inner.send_location(to, latitude, longitude).await;
        Self::log(to, "location", started, &result);
        result
    }
}
