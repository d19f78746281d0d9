//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::executor::{BotRuntime, RuntimeSettings};
use super::session::InMemorySessionStore;
use super::traits::*;
use crate::config::ContactInfo;
use crate::db::{
    AppointmentRecord, AppointmentStatus, BookingReceipt, CatalogSnapshot, Category, ClientRecord,
    DbError, NewBooking, Service, ServiceFields, UserId, SEED_SERVICES,
};
use crate::messenger::{DeliveryError, Messenger};
use crate::state_machine::{Event, Keyboard, SessionState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// In-Memory Catalog
// ============================================================================

#[derive(Default)]
struct CatalogData {
    categories: Vec<Category>,
    services: Vec<Service>,
}

/// Catalog held in memory, with failure injection
#[derive(Default)]
pub struct InMemoryCatalog {
    data: Mutex<CatalogData>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryCatalog {
    /// Catalog with the same seed data as a fresh database
    pub fn seeded() -> Self {
        let catalog = Self::default();
        {
            let mut data = catalog.data.lock().unwrap();
            for (category, name, price, duration) in SEED_SERVICES {
                let category_id = ensure_category(&mut data, category);
                let id = next_id(data.services.iter().map(|s| s.id));
                data.services.push(Service {
                    id,
                    category_id,
                    name: (*name).to_string(),
                    price: *price,
                    duration: (*duration).to_string(),
                    active: true,
                });
            }
        }
        catalog
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// All services including deactivated ones
    pub fn all_services(&self) -> Vec<Service> {
        self.data.lock().unwrap().services.clone()
    }

    pub fn service(&self, id: i64) -> Option<Service> {
        self.data
            .lock()
            .unwrap()
            .services
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    pub fn category_name(&self, id: i64) -> Option<String> {
        self.data
            .lock()
            .unwrap()
            .categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
    }

    fn check_write(&self) -> Result<(), DbError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0) + 1
}

fn ensure_category(data: &mut CatalogData, name: &str) -> i64 {
    if let Some(category) = data.categories.iter().find(|c| c.name == name) {
        return category.id;
    }
    let id = next_id(data.categories.iter().map(|c| c.id));
    data.categories.push(Category {
        id,
        name: name.to_string(),
    });
    id
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn snapshot(&self) -> Result<CatalogSnapshot, DbError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("injected read failure".to_string()));
        }
        let data = self.data.lock().unwrap();
        Ok(CatalogSnapshot {
            categories: data.categories.clone(),
            services: data.services.iter().filter(|s| s.active).cloned().collect(),
        })
    }

    async fn add_service(&self, category: &str, fields: &ServiceFields) -> Result<i64, DbError> {
        self.check_write()?;
        let mut data = self.data.lock().unwrap();
        let category_id = ensure_category(&mut data, category);
        let id = next_id(data.services.iter().map(|s| s.id));
        data.services.push(Service {
            id,
            category_id,
            name: fields.name.clone(),
            price: fields.price,
            duration: fields.duration.clone(),
            active: true,
        });
        Ok(id)
    }

    async fn update_service(
        &self,
        service_id: i64,
        fields: &ServiceFields,
    ) -> Result<usize, DbError> {
        self.check_write()?;
        let mut data = self.data.lock().unwrap();
        match data
            .services
            .iter_mut()
            .find(|s| s.id == service_id && s.active)
        {
            Some(service) => {
                service.name.clone_from(&fields.name);
                service.price = fields.price;
                service.duration.clone_from(&fields.duration);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn deactivate_service(&self, service_id: i64) -> Result<usize, DbError> {
        self.check_write()?;
        let mut data = self.data.lock().unwrap();
        match data
            .services
            .iter_mut()
            .find(|s| s.id == service_id && s.active)
        {
            Some(service) => {
                service.active = false;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

// ============================================================================
// In-Memory Bookings
// ============================================================================

#[derive(Default)]
struct BookingData {
    clients: Vec<ClientRecord>,
    appointments: Vec<AppointmentRecord>,
}

/// Booking repository held in memory; joins against an [`InMemoryCatalog`]
pub struct InMemoryBookings {
    catalog: Arc<InMemoryCatalog>,
    data: Mutex<BookingData>,
    /// Number of upcoming `record_booking` calls that should fail
    failures: AtomicUsize,
}

impl InMemoryBookings {
    pub fn new(catalog: Arc<InMemoryCatalog>) -> Self {
        Self {
            catalog,
            data: Mutex::new(BookingData::default()),
            failures: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` bookings fail
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn clients(&self) -> Vec<ClientRecord> {
        self.data.lock().unwrap().clients.clone()
    }

    pub fn appointments(&self) -> Vec<AppointmentRecord> {
        self.data.lock().unwrap().appointments.clone()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookings {
    async fn record_booking(&self, booking: &NewBooking) -> Result<BookingReceipt, DbError> {
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DbError::Unavailable("injected booking failure".to_string()));
        }

        let offered = &booking.service;
        let service = self
            .catalog
            .service(offered.id)
            .filter(|s| s.active && s.snapshot() == *offered)
            .ok_or(DbError::ServiceUnavailable(offered.id))?;
        let category = self
            .catalog
            .category_name(service.category_id)
            .unwrap_or_default();

        let now = Utc::now();
        let mut data = self.data.lock().unwrap();

        let (client_id, client_created) =
            match data.clients.iter_mut().find(|c| c.user_id == booking.user_id) {
                Some(client) => {
                    client.name.clone_from(&booking.name);
                    client.phone.clone_from(&booking.phone);
                    client.appointment_count += 1;
                    (client.id, false)
                }
                None => {
                    let id = next_id(data.clients.iter().map(|c| c.id));
                    data.clients.push(ClientRecord {
                        id,
                        user_id: booking.user_id,
                        name: booking.name.clone(),
                        phone: booking.phone.clone(),
                        created_at: now,
                        appointment_count: 1,
                    });
                    (id, true)
                }
            };

        let appointment_id = next_id(data.appointments.iter().map(|a| a.id));
        data.appointments.push(AppointmentRecord {
            id: appointment_id,
            client_name: booking.name.clone(),
            phone: booking.phone.clone(),
            category,
            service_name: service.name,
            price: service.price,
            duration: service.duration,
            status: AppointmentStatus::Pending,
            created_at: now,
        });

        Ok(BookingReceipt {
            client_id,
            appointment_id,
            client_created,
            created_at: now,
        })
    }

    async fn list_clients(&self) -> Result<Vec<ClientRecord>, DbError> {
        Ok(self.clients())
    }

    async fn appointments_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<AppointmentRecord>, DbError> {
        let mut recent: Vec<_> = self
            .appointments()
            .into_iter()
            .filter(|a| a.created_at >= since)
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(recent)
    }

    async fn client_user_ids(&self) -> Result<Vec<UserId>, DbError> {
        let mut ids: Vec<UserId> = self.clients().iter().map(|c| c.user_id).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

// ============================================================================
// Recording Messenger
// ============================================================================

/// A delivered message as seen by the mock transport
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub to: UserId,
    pub text: String,
    pub keyboard: Keyboard,
    pub location: Option<(f64, f64)>,
}

/// Messenger that records deliveries and fails for chosen recipients
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentMessage>>,
    failing: HashSet<UserId>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries to `user` fail as if the user blocked the bot
    pub fn failing_for(mut self, user: UserId) -> Self {
        self.failing.insert(user);
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, user: UserId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|m| m.to == user && m.location.is_none())
            .map(|m| m.text)
            .collect()
    }

    pub fn last_to(&self, user: UserId) -> Option<SentMessage> {
        self.sent().into_iter().rev().find(|m| m.to == user)
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn record(&self, message: SentMessage) -> Result<(), DeliveryError> {
        if self.failing.contains(&message.to) {
            return Err(DeliveryError::from_api(
                403,
                "Forbidden: bot was blocked by the user",
            ));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        to: UserId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), DeliveryError> {
        self.record(SentMessage {
            to,
            text: text.to_string(),
            keyboard: keyboard.clone(),
            location: None,
        })
    }

    async fn send_location(
        &self,
        to: UserId,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), DeliveryError> {
        self.record(SentMessage {
            to,
            text: String::new(),
            keyboard: Keyboard::Keep,
            location: Some((latitude, longitude)),
        })
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

pub type MockRuntime =
    BotRuntime<Arc<InMemoryCatalog>, Arc<InMemoryBookings>, Arc<RecordingMessenger>>;

/// Runtime wired to mocks, with handles to inspect them
pub struct TestRuntime {
    pub runtime: Arc<MockRuntime>,
    pub catalog: Arc<InMemoryCatalog>,
    pub bookings: Arc<InMemoryBookings>,
    pub messenger: Arc<RecordingMessenger>,
    pub sessions: Arc<InMemorySessionStore>,
}

impl TestRuntime {
    pub fn builder() -> TestRuntimeBuilder {
        TestRuntimeBuilder::default()
    }

    pub async fn send(&self, user: UserId, text: &str) {
        self.runtime.handle(user, Event::text(text)).await;
    }

    pub async fn event(&self, user: UserId, event: Event) {
        self.runtime.handle(user, event).await;
    }

    pub async fn state(&self, user: UserId) -> SessionState {
        self.runtime.session(user).await
    }

    pub fn last_text(&self, user: UserId) -> String {
        self.messenger
            .texts_to(user)
            .pop()
            .unwrap_or_default()
    }
}

pub struct TestRuntimeBuilder {
    staff: Vec<UserId>,
    failing: Vec<UserId>,
    contacts: ContactInfo,
    ttl: Duration,
    report_window_days: u32,
}

impl Default for TestRuntimeBuilder {
    fn default() -> Self {
        Self {
            staff: vec![],
            failing: vec![],
            contacts: ContactInfo::default(),
            ttl: Duration::from_secs(1800),
            report_window_days: 30,
        }
    }
}

impl TestRuntimeBuilder {
    pub fn staff(mut self, user: UserId) -> Self {
        self.staff.push(user);
        self
    }

    pub fn failing_recipient(mut self, user: UserId) -> Self {
        self.failing.push(user);
        self
    }

    pub fn contacts(mut self, contacts: ContactInfo) -> Self {
        self.contacts = contacts;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn build(self) -> TestRuntime {
        let catalog = Arc::new(InMemoryCatalog::seeded());
        let bookings = Arc::new(InMemoryBookings::new(Arc::clone(&catalog)));
        let messenger = Arc::new(
            self.failing
                .into_iter()
                .fold(RecordingMessenger::new(), RecordingMessenger::failing_for),
        );
        let sessions = Arc::new(InMemorySessionStore::new(self.ttl));

        let runtime = BotRuntime::new(
            Arc::clone(&catalog),
            Arc::clone(&bookings),
            Arc::clone(&messenger),
            Arc::clone(&sessions) as Arc<dyn super::SessionStore>,
            RuntimeSettings {
                staff: self.staff,
                contacts: Arc::new(self.contacts),
                report_window_days: self.report_window_days,
            },
        );

        TestRuntime {
            runtime: Arc::new(runtime),
            catalog,
            bookings,
            messenger,
            sessions,
        }
    }
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels;
    use crate::runtime::report::MAX_MESSAGE_CHARS;
    use crate::state_machine::AdminState;

    const VISITOR: UserId = UserId(100);
    const STAFF_A: UserId = UserId(1);
    const STAFF_B: UserId = UserId(2);

    async fn book(rt: &TestRuntime, user: UserId, name: &str) {
        rt.event(user, Event::Start).await;
        rt.send(user, "Педикюр").await;
        rt.send(user, "Аппаратный - 1000 - 30 минут").await;
        rt.send(user, "+79001234567").await;
        rt.send(user, name).await;
    }

    #[tokio::test]
    async fn test_end_to_end_booking() {
        let rt = TestRuntime::builder().staff(STAFF_A).staff(STAFF_B).build();

        book(&rt, VISITOR, "Anna").await;

        assert_eq!(rt.bookings.clients().len(), 1);
        let appointments = rt.bookings.appointments();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0].client_name, "Anna");
        assert_eq!(appointments[0].phone, "+79001234567");
        assert_eq!(appointments[0].service_name, "Аппаратный");
        assert_eq!(appointments[0].status, AppointmentStatus::Pending);

        assert!(rt.last_text(VISITOR).contains("Ваша запись принята"));
        assert!(rt.state(VISITOR).await.is_idle());

        for staff in [STAFF_A, STAFF_B] {
            let texts = rt.messenger.texts_to(staff);
            assert_eq!(texts.len(), 1);
            assert!(texts[0].contains("Anna"));
            assert!(texts[0].contains("+79001234567"));
            assert!(texts[0].contains("1000"));
        }
    }

    #[tokio::test]
    async fn test_returning_visitor_reuses_client() {
        let rt = TestRuntime::builder().build();
        book(&rt, VISITOR, "Anna").await;
        book(&rt, VISITOR, "Anna K").await;

        let clients = rt.bookings.clients();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].name, "Anna K");
        assert_eq!(rt.bookings.appointments().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_phone_stays_in_phone_capture() {
        let rt = TestRuntime::builder().build();
        rt.send(VISITOR, "Педикюр").await;
        rt.send(VISITOR, "Аппаратный - 1000 - 30 минут").await;
        rt.send(VISITOR, "abc123").await;

        assert!(matches!(
            rt.state(VISITOR).await,
            SessionState::AwaitingPhone { .. }
        ));

        rt.send(VISITOR, "+7 900-123-45-67").await;
        assert!(matches!(
            rt.state(VISITOR).await,
            SessionState::AwaitingName { .. }
        ));
    }

    #[tokio::test]
    async fn test_notification_partial_failure_keeps_booking() {
        let rt = TestRuntime::builder()
            .staff(STAFF_A)
            .staff(STAFF_B)
            .failing_recipient(STAFF_A)
            .build();

        book(&rt, VISITOR, "Anna").await;

        assert_eq!(rt.bookings.appointments().len(), 1);
        assert!(rt.messenger.texts_to(STAFF_A).is_empty());
        assert_eq!(rt.messenger.texts_to(STAFF_B).len(), 1);
        assert!(rt.last_text(VISITOR).contains("Ваша запись принята"));
    }

    #[tokio::test]
    async fn test_booking_failure_allows_resending_name() {
        let rt = TestRuntime::builder().staff(STAFF_A).build();
        rt.bookings.fail_next(1);

        book(&rt, VISITOR, "Anna").await;

        assert!(rt.bookings.appointments().is_empty());
        assert!(rt.messenger.texts_to(STAFF_A).is_empty());
        assert!(matches!(
            rt.state(VISITOR).await,
            SessionState::AwaitingName { .. }
        ));
        assert!(rt.last_text(VISITOR).contains("ошибка"));

        rt.send(VISITOR, "Anna").await;
        assert_eq!(rt.bookings.appointments().len(), 1);
        assert!(rt.state(VISITOR).await.is_idle());
        assert_eq!(rt.messenger.texts_to(STAFF_A).len(), 1);
    }

    #[tokio::test]
    async fn test_admin_added_service_is_listed_for_visitors() {
        let rt = TestRuntime::builder().staff(STAFF_A).build();

        rt.event(STAFF_A, Event::AdminEntry).await;
        for input in [labels::ADMIN_ADD, "Маникюр", "Test", "999", "1 hour"] {
            rt.send(STAFF_A, input).await;
        }
        assert_eq!(rt.state(STAFF_A).await, SessionState::from(AdminState::MenuShown));
        assert!(rt.last_text(STAFF_A).contains("успешно добавлена"));

        rt.send(VISITOR, "Маникюр").await;
        let listing = rt.messenger.last_to(VISITOR).unwrap();
        match listing.keyboard {
            Keyboard::Rows(rows) => {
                assert!(rows.contains(&vec!["Test - 999 - 1 hour".to_string()]));
            }
            other => panic!("Expected keyboard, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_admin_price_reprompt() {
        let rt = TestRuntime::builder().staff(STAFF_A).build();
        rt.event(STAFF_A, Event::AdminEntry).await;
        for input in [labels::ADMIN_ADD, "Маникюр", "Test", "two thousand"] {
            rt.send(STAFF_A, input).await;
        }
        assert!(matches!(
            rt.state(STAFF_A).await,
            SessionState::Admin {
                step: AdminState::PricePrompt { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_admin_write_failure_returns_to_menu() {
        let rt = TestRuntime::builder().staff(STAFF_A).build();
        rt.catalog.fail_writes(true);
        rt.event(STAFF_A, Event::AdminEntry).await;
        for input in [labels::ADMIN_ADD, "Маникюр", "Test", "999", "1 hour"] {
            rt.send(STAFF_A, input).await;
        }
        assert_eq!(rt.state(STAFF_A).await, SessionState::from(AdminState::MenuShown));
        assert!(rt.last_text(STAFF_A).contains("Ошибка"));
    }

    #[tokio::test]
    async fn test_deleted_service_disappears_for_visitor() {
        let rt = TestRuntime::builder().staff(STAFF_A).build();
        rt.event(STAFF_A, Event::AdminEntry).await;
        for input in [
            labels::ADMIN_DELETE,
            "Педикюр",
            "Аппаратный - 1000 - 30 минут",
        ] {
            rt.send(STAFF_A, input).await;
        }
        assert!(rt.last_text(STAFF_A).starts_with("✅"));

        rt.event(VISITOR, Event::Start).await;
        let menu = rt.messenger.last_to(VISITOR).unwrap();
        match menu.keyboard {
            Keyboard::Rows(rows) => assert!(!rows.contains(&vec!["Педикюр".to_string()])),
            other => panic!("Expected keyboard, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deactivation_mid_flow_blocks_booking() {
        let rt = TestRuntime::builder().build();
        rt.send(VISITOR, "Педикюр").await;
        rt.send(VISITOR, "Аппаратный - 1000 - 30 минут").await;
        rt.send(VISITOR, "+79001234567").await;

        rt.catalog.deactivate_service(4).await.unwrap();
        rt.messenger.clear();
        rt.send(VISITOR, "Anna").await;

        assert!(rt.bookings.appointments().is_empty());
        // Педикюр has nothing left to offer
        assert!(rt.state(VISITOR).await.is_idle());
        assert!(rt.messenger.texts_to(VISITOR)[0].contains("больше недоступна"));
    }

    #[tokio::test]
    async fn test_price_change_mid_flow_relists() {
        let rt = TestRuntime::builder().staff(STAFF_A).build();
        rt.send(VISITOR, "Педикюр").await;
        rt.send(VISITOR, "Аппаратный - 1000 - 30 минут").await;
        rt.send(VISITOR, "+79001234567").await;

        let raised = ServiceFields {
            name: "Аппаратный".to_string(),
            price: 5000,
            duration: "30 минут".to_string(),
        };
        rt.catalog.update_service(4, &raised).await.unwrap();
        rt.messenger.clear();
        rt.send(VISITOR, "Anna").await;

        assert!(rt.bookings.appointments().is_empty());
        assert!(rt.messenger.texts_to(STAFF_A).is_empty());
        match rt.state(VISITOR).await {
            SessionState::CategoryChosen { offers, .. } => {
                assert_eq!(offers[0].label, "Аппаратный - 5000 - 30 минут");
            }
            other => panic!("Expected CategoryChosen, got {other:?}"),
        }

        // Booking at the new terms goes through
        rt.send(VISITOR, "Аппаратный - 5000 - 30 минут").await;
        rt.send(VISITOR, "+79001234567").await;
        rt.send(VISITOR, "Anna").await;
        assert_eq!(rt.bookings.appointments().len(), 1);
        assert!(rt.messenger.texts_to(STAFF_A)[0].contains("5000"));
    }

    #[tokio::test]
    async fn test_cancel_works_during_catalog_outage() {
        let rt = TestRuntime::builder().build();
        rt.send(VISITOR, "Педикюр").await;
        rt.send(VISITOR, "Аппаратный - 1000 - 30 минут").await;
        rt.catalog.fail_reads(true);

        rt.event(VISITOR, Event::Cancel).await;
        assert!(rt.state(VISITOR).await.is_idle());
        assert_eq!(rt.last_text(VISITOR), labels::CANCELLED);

        rt.send(VISITOR, "Педикюр").await;
        assert_eq!(rt.last_text(VISITOR), labels::STORE_FAILURE);

        rt.catalog.fail_reads(false);
        rt.send(VISITOR, "Педикюр").await;
        rt.catalog.fail_reads(true);
        rt.send(VISITOR, labels::CANCEL).await;
        assert!(rt.state(VISITOR).await.is_idle());
        assert_eq!(rt.last_text(VISITOR), labels::CANCELLED);
    }

    #[tokio::test]
    async fn test_cancel_twice() {
        let rt = TestRuntime::builder().build();
        rt.send(VISITOR, "Педикюр").await;

        rt.event(VISITOR, Event::Cancel).await;
        assert!(rt.state(VISITOR).await.is_idle());
        rt.event(VISITOR, Event::Cancel).await;
        assert!(rt.state(VISITOR).await.is_idle());
        assert_eq!(rt.last_text(VISITOR), labels::CANCELLED);
    }

    #[tokio::test]
    async fn test_non_staff_admin_is_denied() {
        let rt = TestRuntime::builder().staff(STAFF_A).build();
        rt.send(VISITOR, "Педикюр").await;
        let before = rt.state(VISITOR).await;

        rt.event(VISITOR, Event::AdminEntry).await;

        assert_eq!(rt.state(VISITOR).await, before);
        assert_eq!(rt.last_text(VISITOR), labels::ACCESS_DENIED);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated_under_concurrency() {
        let rt = TestRuntime::builder().build();
        let a = UserId(10);
        let b = UserId(20);

        tokio::join!(rt.send(a, "Маникюр"), rt.send(b, "Педикюр"));

        match (rt.state(a).await, rt.state(b).await) {
            (
                SessionState::CategoryChosen { category: ca, .. },
                SessionState::CategoryChosen { category: cb, .. },
            ) => {
                assert_eq!(ca.name, "Маникюр");
                assert_eq!(cb.name, "Педикюр");
            }
            other => panic!("Unexpected states {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_user_events_are_serialized() {
        let rt = TestRuntime::builder().build();
        rt.send(VISITOR, "Педикюр").await;
        rt.send(VISITOR, "Аппаратный - 1000 - 30 минут").await;
        rt.send(VISITOR, "+79001234567").await;

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let runtime = Arc::clone(&rt.runtime);
                tokio::spawn(async move { runtime.handle(VISITOR, Event::text("Anna")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(rt.bookings.appointments().len(), 1);
        assert!(rt.state(VISITOR).await.is_idle());
    }

    #[tokio::test]
    async fn test_reports_are_chunked() {
        let rt = TestRuntime::builder().staff(STAFF_A).build();
        let classic = rt.catalog.service(1).unwrap().snapshot();
        for i in 0..120 {
            rt.bookings
                .record_booking(&NewBooking {
                    user_id: UserId(1000 + i),
                    name: format!("Клиент {i}"),
                    phone: "+79001234567".to_string(),
                    service: classic.clone(),
                })
                .await
                .unwrap();
        }

        rt.event(STAFF_A, Event::AdminEntry).await;
        rt.messenger.clear();
        rt.send(STAFF_A, labels::ADMIN_APPOINTMENTS).await;

        let messages = rt.messenger.texts_to(STAFF_A);
        assert!(messages.len() > 1);
        assert!(messages.iter().all(|m| m.chars().count() <= MAX_MESSAGE_CHARS));
        let total: usize = messages.iter().map(|m| m.matches("ID: ").count()).sum();
        assert_eq!(total, 120);
        assert_eq!(rt.state(STAFF_A).await, SessionState::from(AdminState::MenuShown));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_clients() {
        let rt = TestRuntime::builder()
            .staff(STAFF_A)
            .failing_recipient(UserId(201))
            .build();
        let classic = rt.catalog.service(1).unwrap().snapshot();
        for user in [UserId(200), UserId(201)] {
            rt.bookings
                .record_booking(&NewBooking {
                    user_id: user,
                    name: "Client".to_string(),
                    phone: "+7900".to_string(),
                    service: classic.clone(),
                })
                .await
                .unwrap();
        }

        rt.event(STAFF_A, Event::AdminEntry).await;
        rt.send(STAFF_A, labels::ADMIN_BROADCAST).await;
        rt.send(STAFF_A, "Скидка 10%").await;

        assert_eq!(rt.messenger.texts_to(UserId(200)), vec!["Скидка 10%".to_string()]);
        assert!(rt.last_text(STAFF_A).contains("1/2"));
        assert_eq!(rt.state(STAFF_A).await, SessionState::from(AdminState::MenuShown));
    }

    #[tokio::test]
    async fn test_address_sends_location() {
        let rt = TestRuntime::builder()
            .contacts(ContactInfo {
                coordinates: Some((55.75, 37.61)),
                ..ContactInfo::default()
            })
            .build();
        rt.send(VISITOR, labels::ADDRESS).await;
        let sent = rt.messenger.last_to(VISITOR).unwrap();
        assert_eq!(sent.location, Some((55.75, 37.61)));
    }

    #[tokio::test]
    async fn test_catalog_outage_replies_failure() {
        let rt = TestRuntime::builder().build();
        rt.catalog.fail_reads(true);
        rt.event(VISITOR, Event::Start).await;
        assert_eq!(rt.last_text(VISITOR), labels::STORE_FAILURE);
        assert!(rt.state(VISITOR).await.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_restarts_flow() {
        let rt = TestRuntime::builder().ttl(Duration::from_secs(60)).build();
        rt.send(VISITOR, "Педикюр").await;
        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(rt.state(VISITOR).await.is_idle());
        rt.runtime.sweep().await;
        assert_eq!(rt.sessions.active_count().await, 0);
    }
}
