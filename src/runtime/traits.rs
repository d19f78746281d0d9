//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the runtime with mock implementations.

use crate::db::{
    AppointmentRecord, BookingReceipt, CatalogSnapshot, ClientRecord, Database, DbError,
    NewBooking, ServiceFields, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Service categories and services
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Categories plus active services
    async fn snapshot(&self) -> Result<CatalogSnapshot, DbError>;

    /// Create a service, creating the category too if it is new. Returns the service id.
    async fn add_service(&self, category: &str, fields: &ServiceFields) -> Result<i64, DbError>;

    /// Overwrite name, price and duration of an active service. Returns affected rows.
    async fn update_service(&self, service_id: i64, fields: &ServiceFields)
        -> Result<usize, DbError>;

    /// Soft delete. Returns affected rows.
    async fn deactivate_service(&self, service_id: i64) -> Result<usize, DbError>;
}

/// Clients and appointments
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Resolve or create the client and append a pending appointment
    async fn record_booking(&self, booking: &NewBooking) -> Result<BookingReceipt, DbError>;

    async fn list_clients(&self) -> Result<Vec<ClientRecord>, DbError>;

    async fn appointments_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<AppointmentRecord>, DbError>;

    /// Every chat identity that ever booked
    async fn client_user_ids(&self) -> Result<Vec<UserId>, DbError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: CatalogStore + ?Sized> CatalogStore for Arc<T> {
    async fn snapshot(&self) -> Result<CatalogSnapshot, DbError> {
        (**self).snapshot().await
    }

    async fn add_service(&self, category: &str, fields: &ServiceFields) -> Result<i64, DbError> {
        (**self).add_service(category, fields).await
    }

    async fn update_service(
        &self,
        service_id: i64,
        fields: &ServiceFields,
    ) -> Result<usize, DbError> {
        (**self).update_service(service_id, fields).await
    }

    async fn deactivate_service(&self, service_id: i64) -> Result<usize, DbError> {
        (**self).deactivate_service(service_id).await
    }
}

#[async_trait]
impl<T: BookingRepository + ?Sized> BookingRepository for Arc<T> {
    async fn record_booking(&self, booking: &NewBooking) -> Result<BookingReceipt, DbError> {
        (**self).record_booking(booking).await
    }

    async fn list_clients(&self) -> Result<Vec<ClientRecord>, DbError> {
        (**self).list_clients().await
    }

    async fn appointments_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<AppointmentRecord>, DbError> {
        (**self).appointments_since(since).await
    }

    async fn client_user_ids(&self) -> Result<Vec<UserId>, DbError> {
        (**self).client_user_ids().await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl CatalogStore for Database {
    async fn snapshot(&self) -> Result<CatalogSnapshot, DbError> {
        self.catalog_snapshot()
    }

    async fn add_service(&self, category: &str, fields: &ServiceFields) -> Result<i64, DbError> {
        Database::add_service(self, category, fields)
    }

    async fn update_service(
        &self,
        service_id: i64,
        fields: &ServiceFields,
    ) -> Result<usize, DbError> {
        Database::update_service(self, service_id, fields)
    }

    async fn deactivate_service(&self, service_id: i64) -> Result<usize, DbError> {
        Database::deactivate_service(self, service_id)
    }
}

#[async_trait]
impl BookingRepository for Database {
    async fn record_booking(&self, booking: &NewBooking) -> Result<BookingReceipt, DbError> {
        Database::record_booking(self, booking)
    }

    async fn list_clients(&self) -> Result<Vec<ClientRecord>, DbError> {
        Database::list_clients(self)
    }

    async fn appointments_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<AppointmentRecord>, DbError> {
        Database::appointments_since(self, since)
    }

    async fn client_user_ids(&self) -> Result<Vec<UserId>, DbError> {
        Database::client_user_ids(self)
    }
}
