//! HTTP API for the Telegram webhook

mod handlers;
mod types;

pub use handlers::{create_router, parse_update};
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::db::UserId;
use crate::messenger::Messenger;
use crate::runtime::{BookingRepository, BotRuntime, CatalogStore};
use crate::state_machine::Event;
use async_trait::async_trait;
use std::sync::Arc;

/// Anything that can process one inbound event for a user
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, user: UserId, event: Event);
}

#[async_trait]
impl<C, B, M> EventHandler for BotRuntime<C, B, M>
where
    C: CatalogStore + 'static,
    B: BookingRepository + 'static,
    M: Messenger + 'static,
{
    async fn handle(&self, user: UserId, event: Event) {
        BotRuntime::handle(self, user, event).await;
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<dyn EventHandler>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`, if configured
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(runtime: Arc<dyn EventHandler>, webhook_secret: Option<String>) -> Self {
        Self {
            runtime,
            webhook_secret: webhook_secret.map(Arc::from),
        }
    }
}
