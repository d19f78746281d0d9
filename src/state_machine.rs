//! Conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! The visitor and admin flows share one session enum and one entry point.

mod admin;
mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;
mod visitor;


pub use effect::{BookingPayload, Effect, Keyboard, Reply, ReportKind};
pub use event::Event;
pub use state::{AdminState, ServiceOffer, SessionState, StepContext};
pub use transition::{transition, TransitionError, TransitionResult};
