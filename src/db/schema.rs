//! Database schema and record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS services (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    price INTEGER NOT NULL CHECK (price > 0),
    duration TEXT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT 1,

    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE INDEX IF NOT EXISTS idx_services_category ON services(category_id, active);

CREATE TABLE IF NOT EXISTS clients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_user_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    phone TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_clients_external ON clients(external_user_id);

CREATE TABLE IF NOT EXISTS appointments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id INTEGER NOT NULL,
    service_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,

    FOREIGN KEY (client_id) REFERENCES clients(id),
    FOREIGN KEY (service_id) REFERENCES services(id)
);

CREATE INDEX IF NOT EXISTS idx_appointments_created ON appointments(created_at DESC);
";

/// Catalog inserted into an empty database: (category, name, price, duration)
pub const SEED_SERVICES: &[(&str, &str, i64, &str)] = &[
    ("Маникюр", "Классический", 1500, "3 часа"),
    ("Маникюр", "Гель-лак", 2500, "5 часов"),
    ("Маникюр", "Аппаратный", 3500, "2 часа"),
    ("Педикюр", "Аппаратный", 1000, "30 минут"),
    ("Наращивание", "Верхние формы", 3000, "2 часа"),
    ("Наращивание", "Типсы", 1500, "1.5 часа"),
];

/// Chat-platform identity of a user (visitor or staff)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Service category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Catalog entry as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub price: i64,
    pub duration: String,
    pub active: bool,
}

impl Service {
    /// Button label shown to visitors, e.g. `Аппаратный - 1000 - 30 минут`
    pub fn label(&self) -> String {
        format!("{} - {} - {}", self.name, self.price, self.duration)
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            duration: self.duration.clone(),
        }
    }
}

/// Terms of a service as seen by the visitor when it was selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub duration: String,
}

/// Editable fields of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFields {
    pub name: String,
    pub price: i64,
    pub duration: String,
}

/// Read-only view of the active catalog used by one engine step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub categories: Vec<Category>,
    /// Active services only
    pub services: Vec<Service>,
}

impl CatalogSnapshot {
    pub fn category_by_name(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn services_in(&self, category_id: i64) -> Vec<&Service> {
        self.services
            .iter()
            .filter(|s| s.category_id == category_id && s.active)
            .collect()
    }

    pub fn service(&self, id: i64) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id && s.active)
    }

    /// Categories that currently offer at least one active service
    pub fn bookable_categories(&self) -> Vec<&Category> {
        self.categories
            .iter()
            .filter(|c| !self.services_in(c.id).is_empty())
            .collect()
    }
}

/// Appointment lifecycle. The bot only creates `Pending`; staff move
/// appointments along outside the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn parse_status(s: &str) -> AppointmentStatus {
    match s {
        "confirmed" => AppointmentStatus::Confirmed,
        "cancelled" => AppointmentStatus::Cancelled,
        _ => AppointmentStatus::Pending,
    }
}

/// Booking request produced by the visitor flow. `service` carries the terms
/// the visitor agreed to; the store refuses the booking if they moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub user_id: UserId,
    pub name: String,
    pub phone: String,
    pub service: ServiceSnapshot,
}

/// Identifiers assigned when a booking is committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingReceipt {
    pub client_id: i64,
    pub appointment_id: i64,
    /// False when an existing client row was reused
    pub client_created: bool,
    pub created_at: DateTime<Utc>,
}

/// Client row for staff reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRecord {
    pub id: i64,
    pub user_id: UserId,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub appointment_count: i64,
}

/// Appointment joined with its client and service for staff reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentRecord {
    pub id: i64,
    pub client_name: String,
    pub phone: String,
    pub category: String,
    pub service_name: String,
    pub price: i64,
    pub duration: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}
