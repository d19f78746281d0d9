//! Session state types

use crate::config::ContactInfo;
use crate::db::{CatalogSnapshot, Category, Service, ServiceSnapshot, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Service offers
// ============================================================================

/// A service button shown to the user, bound to the id it was rendered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOffer {
    pub label: String,
    pub service_id: i64,
}

/// Render offers for a listing. Labels that would collide get a `#id` suffix
/// so every button text maps to exactly one service.
pub fn build_offers(services: &[&Service]) -> Vec<ServiceOffer> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for service in services {
        *counts.entry(service.label()).or_default() += 1;
    }

    services
        .iter()
        .map(|service| {
            let base = service.label();
            let label = if counts.get(&base).copied().unwrap_or(0) > 1 {
                format!("{base} #{}", service.id)
            } else {
                base
            };
            ServiceOffer {
                label,
                service_id: service.id,
            }
        })
        .collect()
}

pub fn find_offer<'a>(offers: &'a [ServiceOffer], text: &str) -> Option<&'a ServiceOffer> {
    offers.iter().find(|offer| offer.label == text)
}

// ============================================================================
// Session State
// ============================================================================

/// Per-user conversation state. Each variant carries exactly the fields
/// captured so far, so later fields cannot be read before they are set.
///
/// A completed booking goes straight back to `Idle`; there is no separate
/// terminal variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionState {
    /// No flow in progress
    #[default]
    Idle,

    /// Category selected, its services listed
    CategoryChosen {
        category: Category,
        offers: Vec<ServiceOffer>,
    },

    /// Service selected, waiting for a phone number
    AwaitingPhone {
        category: Category,
        service: ServiceSnapshot,
    },

    /// Phone captured, waiting for the visitor's name
    AwaitingName {
        category: Category,
        service: ServiceSnapshot,
        phone: String,
    },

    /// Staff catalog administration
    Admin { step: AdminState },
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    /// Short tag for logging
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::CategoryChosen { .. } => "category_chosen",
            SessionState::AwaitingPhone { .. } => "awaiting_phone",
            SessionState::AwaitingName { .. } => "awaiting_name",
            SessionState::Admin { step } => step.name(),
        }
    }
}

/// Staff-side steps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum AdminState {
    MenuShown,

    CategoryForEdit,
    CategoryForDelete,
    CategoryForAdd,

    /// Service listing for the edit flow
    ServiceForEdit {
        category: Category,
        offers: Vec<ServiceOffer>,
    },
    /// Service listing for the delete flow
    ServiceForDelete {
        category: Category,
        offers: Vec<ServiceOffer>,
    },

    EditingName {
        service: ServiceSnapshot,
    },
    EditingPrice {
        service: ServiceSnapshot,
        name: String,
    },
    EditingDuration {
        service: ServiceSnapshot,
        name: String,
        price: i64,
    },

    NamePrompt {
        category: String,
    },
    PricePrompt {
        category: String,
        name: String,
    },
    DurationPrompt {
        category: String,
        name: String,
        price: i64,
    },

    BroadcastPrompt,
}

impl AdminState {
    pub fn name(&self) -> &'static str {
        match self {
            AdminState::MenuShown => "admin_menu",
            AdminState::CategoryForEdit => "admin_category_for_edit",
            AdminState::CategoryForDelete => "admin_category_for_delete",
            AdminState::CategoryForAdd => "admin_category_for_add",
            AdminState::ServiceForEdit { .. } => "admin_service_for_edit",
            AdminState::ServiceForDelete { .. } => "admin_service_for_delete",
            AdminState::EditingName { .. } => "admin_editing_name",
            AdminState::EditingPrice { .. } => "admin_editing_price",
            AdminState::EditingDuration { .. } => "admin_editing_duration",
            AdminState::NamePrompt { .. } => "admin_name_prompt",
            AdminState::PricePrompt { .. } => "admin_price_prompt",
            AdminState::DurationPrompt { .. } => "admin_duration_prompt",
            AdminState::BroadcastPrompt => "admin_broadcast_prompt",
        }
    }
}

impl From<AdminState> for SessionState {
    fn from(step: AdminState) -> Self {
        SessionState::Admin { step }
    }
}

// ============================================================================
// Step Context
// ============================================================================

/// Everything a transition may read besides the session itself.
/// Built fresh for every event; staff membership is never cached in the session.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub user_id: UserId,
    pub is_staff: bool,
    pub catalog: CatalogSnapshot,
    pub contacts: Arc<ContactInfo>,
    pub report_window_days: u32,
}

/// Default window for the recent appointments report
pub const DEFAULT_REPORT_WINDOW_DAYS: u32 = 30;

impl StepContext {
    pub fn new(user_id: UserId, is_staff: bool, catalog: CatalogSnapshot) -> Self {
        Self {
            user_id,
            is_staff,
            catalog,
            contacts: Arc::new(ContactInfo::default()),
            report_window_days: DEFAULT_REPORT_WINDOW_DAYS,
        }
    }

    pub fn with_contacts(mut self, contacts: Arc<ContactInfo>) -> Self {
        self.contacts = contacts;
        self
    }

    pub fn with_report_window(mut self, days: u32) -> Self {
        self.report_window_days = days;
        self
    }
}
