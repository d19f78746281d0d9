//! Effects produced by state transitions

use crate::db::{NewBooking, ServiceFields, ServiceSnapshot, UserId};
use crate::labels::Rows;

/// What the chat client should do with its reply keyboard
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Keyboard {
    /// Leave whatever keyboard is showing
    #[default]
    Keep,
    /// Show these buttons
    Rows(Rows),
}

/// Text message to the user who sent the event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::Keep,
        }
    }

    pub fn with_rows(text: impl Into<String>, rows: Rows) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::Rows(rows),
        }
    }
}

/// Everything staff need to call the client back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingPayload {
    pub client_id: i64,
    pub appointment_id: i64,
    pub user_id: UserId,
    pub name: String,
    pub phone: String,
    pub category: String,
    pub service: ServiceSnapshot,
}

/// Staff reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Clients,
    RecentAppointments { window_days: u32 },
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a message to the current user
    Reply(Reply),

    /// Send a map pin to the current user
    ReplyLocation { latitude: f64, longitude: f64 },

    /// Create/resolve the client and append the appointment
    RecordBooking(NewBooking),

    /// Fan the booking out to staff
    NotifyStaff(BookingPayload),

    AddService {
        category: String,
        fields: ServiceFields,
    },

    UpdateService {
        service_id: i64,
        fields: ServiceFields,
    },

    DeactivateService { service_id: i64 },

    /// Read and send a chunked report to the current user
    SendReport(ReportKind),

    /// Deliver a text to every known client
    Broadcast { text: String },
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply(Reply::text(text))
    }

    pub fn reply_with_rows(text: impl Into<String>, rows: Rows) -> Self {
        Effect::Reply(Reply::with_rows(text, rows))
    }
}
