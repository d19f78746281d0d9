//! Database module for the salon bot
//!
//! Provides persistence for the service catalog, clients and appointments.

mod schema;

pub use schema::*;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Service not available: {0}")]
    ServiceUnavailable(i64),
    #[error("Database connection lock poisoned")]
    Poisoned,
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let mut conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0))?;
        if count == 0 {
            let tx = conn.transaction()?;
            for (category, name, price, duration) in SEED_SERVICES {
                let category_id = ensure_category(&tx, category)?;
                tx.execute(
                    "INSERT INTO services (category_id, name, price, duration) VALUES (?1, ?2, ?3, ?4)",
                    params![category_id, name, price, duration],
                )?;
            }
            tx.commit()?;
            tracing::info!(services = SEED_SERVICES.len(), "Seeded initial catalog");
        }

        Ok(())
    }

    // ==================== Catalog Operations ====================

    /// All categories, in creation order
    #[allow(dead_code)] // Used in tests
    pub fn list_categories(&self) -> DbResult<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Categories plus every active service, read under one lock
    pub fn catalog_snapshot(&self) -> DbResult<CatalogSnapshot> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY id ASC")?;
        let categories = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT id, category_id, name, price, duration, active
             FROM services WHERE active = 1 ORDER BY name ASC, id ASC",
        )?;
        let services = stmt
            .query_map([], parse_service_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CatalogSnapshot {
            categories,
            services,
        })
    }

    /// Get an active service by id
    #[allow(dead_code)] // Used in tests
    pub fn get_service(&self, id: i64) -> DbResult<Option<Service>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, category_id, name, price, duration, active
             FROM services WHERE id = ?1 AND active = 1",
            params![id],
            parse_service_row,
        )
        .optional()
        .map_err(DbError::from)
    }

    /// Create a service, creating its category on first use. Returns the new service id.
    pub fn add_service(&self, category: &str, fields: &ServiceFields) -> DbResult<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let category_id = ensure_category(&tx, category)?;
        tx.execute(
            "INSERT INTO services (category_id, name, price, duration) VALUES (?1, ?2, ?3, ?4)",
            params![category_id, fields.name, fields.price, fields.duration],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// Replace name, price and duration in one statement. Returns affected rows.
    pub fn update_service(&self, id: i64, fields: &ServiceFields) -> DbResult<usize> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE services SET name = ?1, price = ?2, duration = ?3 WHERE id = ?4 AND active = 1",
            params![fields.name, fields.price, fields.duration, id],
        )?;
        Ok(rows)
    }

    /// Soft delete. Returns affected rows (0 if already inactive or missing).
    pub fn deactivate_service(&self, id: i64) -> DbResult<usize> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE services SET active = 0 WHERE id = ?1 AND active = 1",
            params![id],
        )?;
        Ok(rows)
    }

    // ==================== Booking Operations ====================

    /// Resolve the client by external user id and append a pending appointment
    pub fn record_booking(&self, booking: &NewBooking) -> DbResult<BookingReceipt> {
        let mut conn = self.conn()?;
        let now = Utc::now();
        let now_str = format_datetime(&now);
        let tx = conn.transaction()?;

        let service = &booking.service;
        let terms_match: Option<i64> = tx
            .query_row(
                "SELECT id FROM services
                 WHERE id = ?1 AND active = 1 AND name = ?2 AND price = ?3 AND duration = ?4",
                params![service.id, service.name, service.price, service.duration],
                |row| row.get(0),
            )
            .optional()?;
        if terms_match.is_none() {
            return Err(DbError::ServiceUnavailable(service.id));
        }

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM clients WHERE external_user_id = ?1",
                params![booking.user_id.0],
                |row| row.get(0),
            )
            .optional()?;

        let (client_id, client_created) = if let Some(id) = existing {
            tx.execute(
                "UPDATE clients SET name = ?1, phone = ?2 WHERE id = ?3",
                params![booking.name, booking.phone, id],
            )?;
            (id, false)
        } else {
            tx.execute(
                "INSERT INTO clients (external_user_id, name, phone, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![booking.user_id.0, booking.name, booking.phone, now_str],
            )?;
            (tx.last_insert_rowid(), true)
        };

        tx.execute(
            "INSERT INTO appointments (client_id, service_id, status, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                client_id,
                service.id,
                AppointmentStatus::Pending.as_str(),
                now_str
            ],
        )?;
        let appointment_id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(BookingReceipt {
            client_id,
            appointment_id,
            client_created,
            created_at: now,
        })
    }

    /// All clients, newest first
    pub fn list_clients(&self) -> DbResult<Vec<ClientRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.external_user_id, c.name, c.phone, c.created_at,
                    (SELECT COUNT(*) FROM appointments a WHERE a.client_id = c.id) AS appointment_count
             FROM clients c
             ORDER BY c.created_at DESC, c.id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ClientRecord {
                id: row.get(0)?,
                user_id: UserId(row.get(1)?),
                name: row.get(2)?,
                phone: row.get(3)?,
                created_at: parse_datetime(row, 4)?,
                appointment_count: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Appointments created at or after `since`, newest first.
    /// Deactivated services still resolve here so history stays intact.
    pub fn appointments_since(&self, since: DateTime<Utc>) -> DbResult<Vec<AppointmentRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT a.id, c.name, c.phone, cat.name, s.name, s.price, s.duration, a.status, a.created_at
             FROM appointments a
             JOIN clients c ON a.client_id = c.id
             JOIN services s ON a.service_id = s.id
             JOIN categories cat ON s.category_id = cat.id
             WHERE a.created_at >= ?1
             ORDER BY a.created_at DESC, a.id DESC",
        )?;
        let rows = stmt.query_map(params![format_datetime(&since)], |row| {
            Ok(AppointmentRecord {
                id: row.get(0)?,
                client_name: row.get(1)?,
                phone: row.get(2)?,
                category: row.get(3)?,
                service_name: row.get(4)?,
                price: row.get(5)?,
                duration: row.get(6)?,
                status: parse_status(&row.get::<_, String>(7)?),
                created_at: parse_datetime(row, 8)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Chat ids of everyone who has ever booked
    pub fn client_user_ids(&self) -> DbResult<Vec<UserId>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT external_user_id FROM clients ORDER BY external_user_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0).map(UserId))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn ensure_category(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO categories (name) VALUES (?1)",
        params![name],
    )?;
    conn.query_row(
        "SELECT id FROM categories WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
}

fn parse_service_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        category_id: row.get(1)?,
        name: row.get(2)?,
        price: row.get(3)?,
        duration: row.get(4)?,
        active: row.get(5)?,
    })
}

/// Fixed-width UTC timestamps so that text comparison orders chronologically
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read an RFC 3339 column; a malformed value fails the row instead of being guessed
fn parse_datetime(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
