//! Pure state transition function
//!
//! Routes an event to the visitor or the admin flow. Global commands
//! (start, cancel, admin entry) are handled here so that every state
//! reacts to them the same way.

use super::{admin, visitor, Effect, Event, SessionState, StepContext};
use crate::labels;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: impl Into<SessionState>) -> Self {
        Self {
            new_state: state.into(),
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// described by the returned effects.
pub fn transition(
    state: &SessionState,
    context: &StepContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        (_, event) if event.is_cancel() => Ok(cancel(context)),

        (_, Event::Start) => Ok(start(context)),

        (state, Event::AdminEntry) => Ok(admin::enter(state, context)),

        (SessionState::Admin { step }, event) => admin::transition(step, context, event),

        (state, event) => visitor::transition(state, context, event),
    }
}

/// Clear the session. Cancelling an idle session is a no-op apart from the reply.
fn cancel(context: &StepContext) -> TransitionResult {
    let rows = if context.is_staff {
        labels::admin_only()
    } else {
        labels::start_only()
    };
    TransitionResult::new(SessionState::Idle)
        .with_effect(Effect::reply_with_rows(labels::CANCELLED, rows))
}

fn start(context: &StepContext) -> TransitionResult {
    if context.is_staff {
        return TransitionResult::new(SessionState::Idle).with_effect(Effect::reply_with_rows(
            labels::STAFF_GREETING,
            labels::admin_only(),
        ));
    }

    TransitionResult::new(SessionState::Idle).with_effect(Effect::reply_with_rows(
        labels::GREETING,
        visitor::category_menu(context),
    ))
}

/// Report an out-of-place event without touching the state
pub(crate) fn invalid(state: &SessionState, event: &Event) -> TransitionError {
    TransitionError::InvalidTransition(format!(
        "No transition from {} with event {:?}",
        state.name(),
        event
    ))
}

/// Positive integer price, surrounding whitespace ignored
pub fn parse_price(input: &str) -> Option<i64> {
    input.trim().parse::<i64>().ok().filter(|price| *price > 0)
}

/// Accepts digits with optional `+`, spaces and hyphens
pub fn is_valid_phone(input: &str) -> bool {
    let mut digits = input.chars().filter(|c| !matches!(c, '+' | ' ' | '-')).peekable();
    digits.peek().is_some() && digits.all(|c| c.is_ascii_digit())
}
