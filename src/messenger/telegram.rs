//! Telegram Bot API messenger

use super::{DeliveryError, Messenger};
use crate::db::UserId;
use crate::state_machine::Keyboard;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sends messages through `https://api.telegram.org/bot<token>/<method>`
pub struct TelegramMessenger {
    client: Client,
    base_url: String,
}

impl TelegramMessenger {
    pub fn new(token: &str, api_base: &str) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeliveryError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        })
    }

    async fn call<T: Serialize + Sync>(&self, method: &str, body: &T) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    DeliveryError::network(format!("Connection failed: {e}"))
                } else {
                    DeliveryError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::network(format!("Failed to read response: {e}")))?;

        let parsed: ApiResponse = serde_json::from_str(&body).map_err(|e| {
            DeliveryError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        if status.is_success() && parsed.ok {
            return Ok(());
        }

        let code = parsed.error_code.unwrap_or(status.as_u16());
        let mut error =
            DeliveryError::from_api(code, parsed.description.as_deref().unwrap_or("unknown error"));
        if let Some(retry_after) = parsed.parameters.and_then(|p| p.retry_after) {
            error = error.with_retry_after(Duration::from_secs(retry_after));
        }
        Err(error)
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        to: UserId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), DeliveryError> {
        let request = SendMessage {
            chat_id: to.0,
            text,
            reply_markup: ReplyMarkup::from_keyboard(keyboard),
        };
        self.call("sendMessage", &request).await
    }

    async fn send_location(
        &self,
        to: UserId,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), DeliveryError> {
        let request = SendLocation {
            chat_id: to.0,
            latitude,
            longitude,
        };
        self.call("sendLocation", &request).await
    }
}

// Bot API types

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup<'a>>,
}

#[derive(Debug, Serialize)]
struct SendLocation {
    chat_id: i64,
    latitude: f64,
    longitude: f64,
}

/// `ReplyKeyboardMarkup`
#[derive(Debug, Serialize)]
struct ReplyMarkup<'a> {
    keyboard: Vec<Vec<KeyboardButton<'a>>>,
    resize_keyboard: bool,
}

impl<'a> ReplyMarkup<'a> {
    fn from_keyboard(keyboard: &'a Keyboard) -> Option<Self> {
        match keyboard {
            Keyboard::Keep => None,
            Keyboard::Rows(rows) => Some(ReplyMarkup {
                keyboard: rows
                    .iter()
                    .map(|row| row.iter().map(|text| KeyboardButton { text }).collect())
                    .collect(),
                resize_keyboard: true,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct KeyboardButton<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}
