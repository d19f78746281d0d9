//! HTTP request handlers

use super::types::{ErrorResponse, HealthResponse, Update};
use super::AppState;
use crate::db::UserId;
use crate::labels;
use crate::state_machine::Event;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/telegram/webhook", post(telegram_webhook))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Webhook
// ============================================================

async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> Result<StatusCode, AppError> {
    if let Some(expected) = &state.webhook_secret {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_ref()) {
            tracing::warn!(update_id = update.update_id, "Webhook secret mismatch");
            return Err(AppError::Unauthorized("invalid secret token".to_string()));
        }
    }

    dispatch(&state, update);
    Ok(StatusCode::OK)
}

/// Hand the update to the runtime on its own task so the webhook answers at once
fn dispatch(state: &AppState, update: Update) -> Option<tokio::task::JoinHandle<()>> {
    let update_id = update.update_id;
    let Some((user, event)) = parse_update(update) else {
        tracing::debug!(update_id, "Ignoring update");
        return None;
    };

    let runtime = state.runtime.clone();
    Some(tokio::spawn(async move {
        runtime.handle(user, event).await;
    }))
}

/// Map a Telegram update to the user it came from and the event it carries
pub fn parse_update(update: Update) -> Option<(UserId, Event)> {
    let message = update.message?;
    if message.from.as_ref().is_some_and(|u| u.is_bot) {
        return None;
    }
    let user = UserId(message.from.map_or(message.chat.id, |u| u.id));

    if let Some(contact) = message.contact {
        return Some((
            user,
            Event::Contact {
                phone: contact.phone_number,
            },
        ));
    }

    let text = message.text?;
    Some((user, parse_text(text)))
}

fn parse_text(text: String) -> Event {
    let trimmed = text.trim();
    if trimmed == labels::CANCEL {
        return Event::Cancel;
    }

    if trimmed.starts_with('/') {
        let word = trimmed.split_whitespace().next().unwrap_or(trimmed);
        // "/start@salon_bot" in group chats
        let command = word.split('@').next().unwrap_or(word);
        match command {
            labels::START_COMMAND => return Event::Start,
            labels::ADMIN_COMMAND => return Event::AdminEntry,
            "/cancel" => return Event::Cancel,
            _ => {}
        }
    }

    Event::Text(text)
}

// ============================================================
// Probes
// ============================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn get_version() -> &'static str {
    concat!("salon-bot ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    Unauthorized(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
