//! Events that drive a session

use crate::db::BookingReceipt;
use crate::labels;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // User events
    /// `/start`
    Start,
    /// `/admin`
    AdminEntry,
    /// `/cancel` or the cancel button
    Cancel,
    /// Free text or a pressed keyboard button
    Text(String),
    /// Structured contact shared from the chat client
    Contact { phone: String },

    // Store outcomes fed back by the runtime
    BookingCommitted {
        name: String,
        receipt: BookingReceipt,
    },
    BookingFailed {
        message: String,
    },
    /// The booked service was deactivated or its terms changed mid-flow
    ServiceChanged {
        service_id: i64,
    },
    ServiceAdded {
        service_id: i64,
    },
    ServiceUpdated {
        service_id: i64,
        rows: usize,
    },
    ServiceDeactivated {
        service_id: i64,
        rows: usize,
    },
    CatalogWriteFailed {
        message: String,
    },
}

impl Event {
    pub fn text(text: impl Into<String>) -> Self {
        Event::Text(text.into())
    }

    /// `/cancel`, or the cancel button arriving as plain text
    pub fn is_cancel(&self) -> bool {
        match self {
            Event::Cancel => true,
            Event::Text(text) => text == labels::CANCEL,
            _ => false,
        }
    }

    /// True for events that originate from the user rather than from the runtime
    pub fn is_user_event(&self) -> bool {
        matches!(
            self,
            Event::Start
                | Event::AdminEntry
                | Event::Cancel
                | Event::Text(_)
                | Event::Contact { .. }
        )
    }
}
