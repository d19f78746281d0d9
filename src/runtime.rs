//! Runtime for executing conversations
//!
//! Owns the per-user sessions and drives the pure state machine against
//! the catalog, the booking repository and the messenger.

mod executor;
mod notify;
pub mod report;
mod session;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{BotRuntime, RuntimeSettings};
pub use session::{InMemorySessionStore, SessionStore};
pub use traits::*;

use crate::db::Database;
use crate::messenger::{LoggingMessenger, TelegramMessenger};

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = BotRuntime<Database, Database, LoggingMessenger<TelegramMessenger>>;
