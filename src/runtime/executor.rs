//! Bot runtime executor
//!
//! One call to [`BotRuntime::handle`] processes one inbound event:
//! the session is loaded under the user's lock, transitions run until no
//! store outcome is left to feed back, the session is saved, the lock is
//! released and only then are messages delivered.

use super::notify::{DeliveryReport, NotificationDispatcher};
use super::report;
use super::session::{KeyedLocks, SessionStore};
use super::traits::{BookingRepository, CatalogStore};
use crate::config::ContactInfo;
use crate::db::{CatalogSnapshot, DbError, UserId};
use crate::labels;
use crate::messenger::Messenger;
use crate::state_machine::{
    transition, BookingPayload, Effect, Event, Keyboard, Reply, ReportKind, SessionState,
    StepContext,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Static settings shared by every event
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub staff: Vec<UserId>,
    pub contacts: Arc<ContactInfo>,
    pub report_window_days: u32,
}

/// Messages queued while the session lock is held
#[derive(Debug, Clone, PartialEq)]
enum Outbound {
    Reply(Reply),
    Location { latitude: f64, longitude: f64 },
    NotifyStaff(BookingPayload),
    Broadcast { recipients: Vec<UserId>, text: String },
}

/// Generic runtime that can work with any catalog, booking and messenger implementations
pub struct BotRuntime<C, B, M>
where
    C: CatalogStore + 'static,
    B: BookingRepository + 'static,
    M: Messenger + 'static,
{
    catalog: C,
    bookings: B,
    messenger: Arc<M>,
    sessions: Arc<dyn SessionStore>,
    locks: KeyedLocks,
    staff: HashSet<UserId>,
    notifier: NotificationDispatcher<M>,
    contacts: Arc<ContactInfo>,
    report_window_days: u32,
}

impl<C, B, M> BotRuntime<C, B, M>
where
    C: CatalogStore + 'static,
    B: BookingRepository + 'static,
    M: Messenger + 'static,
{
    pub fn new(
        catalog: C,
        bookings: B,
        messenger: M,
        sessions: Arc<dyn SessionStore>,
        settings: RuntimeSettings,
    ) -> Self {
        let messenger = Arc::new(messenger);
        Self {
            catalog,
            bookings,
            notifier: NotificationDispatcher::new(Arc::clone(&messenger), settings.staff.clone()),
            messenger,
            sessions,
            locks: KeyedLocks::new(),
            staff: settings.staff.into_iter().collect(),
            contacts: settings.contacts,
            report_window_days: settings.report_window_days,
        }
    }

    pub fn is_staff(&self, user: UserId) -> bool {
        self.staff.contains(&user)
    }

    /// Current session of a user
    pub async fn session(&self, user: UserId) -> SessionState {
        self.sessions.load(user).await
    }

    /// Process one inbound event for `user`
    pub async fn handle(&self, user: UserId, event: Event) {
        if !event.is_user_event() {
            tracing::warn!(user_id = %user, event = ?event, "Ignoring store outcome from outside the runtime");
            return;
        }
        tracing::debug!(user_id = %user, event = ?event, "Handling event");
        let outbox = self.step(user, event).await;
        self.deliver(user, outbox).await;
    }

    /// Run transitions and store effects under the user's lock
    async fn step(&self, user: UserId, event: Event) -> Vec<Outbound> {
        let _guard = self.locks.lock(user).await;

        let mut state = self.sessions.load(user).await;
        let catalog = match self.catalog.snapshot().await {
            Ok(catalog) => catalog,
            // Cancelling never reads the catalog
            Err(e) if event.is_cancel() => {
                tracing::warn!(user_id = %user, error = %e, "Catalog unavailable, cancelling anyway");
                CatalogSnapshot::default()
            }
            Err(e) => {
                tracing::error!(user_id = %user, error = %e, "Failed to read catalog");
                return vec![Outbound::Reply(Reply::text(labels::STORE_FAILURE))];
            }
        };
        let context = StepContext::new(user, self.is_staff(user), catalog)
            .with_contacts(Arc::clone(&self.contacts))
            .with_report_window(self.report_window_days);

        let mut outbox = Vec::new();
        // Store effects may feed an outcome event back into the machine
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let result = match transition(&state, &context, current_event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(user_id = %user, state = state.name(), error = %e, "Transition rejected");
                    break;
                }
            };

            if result.new_state != state {
                tracing::info!(
                    user_id = %user,
                    from = state.name(),
                    to = result.new_state.name(),
                    "Session state changed"
                );
            }
            state = result.new_state;

            for effect in result.effects {
                if let Some(generated_event) =
                    self.execute_effect(&context, effect, &mut outbox).await
                {
                    events_to_process.push(generated_event);
                }
            }
        }

        self.sessions.save(user, state).await;
        outbox
    }

    /// Execute store effects now; queue delivery effects for after the lock
    async fn execute_effect(
        &self,
        context: &StepContext,
        effect: Effect,
        outbox: &mut Vec<Outbound>,
    ) -> Option<Event> {
        match effect {
            Effect::Reply(reply) => {
                outbox.push(Outbound::Reply(reply));
                None
            }
            Effect::ReplyLocation {
                latitude,
                longitude,
            } => {
                outbox.push(Outbound::Location {
                    latitude,
                    longitude,
                });
                None
            }
            Effect::NotifyStaff(payload) => {
                outbox.push(Outbound::NotifyStaff(payload));
                None
            }

            Effect::RecordBooking(booking) => {
                match self.bookings.record_booking(&booking).await {
                    Ok(receipt) => Some(Event::BookingCommitted {
                        name: booking.name,
                        receipt,
                    }),
                    Err(DbError::ServiceUnavailable(service_id)) => {
                        tracing::warn!(user_id = %booking.user_id, service_id, "Booked service changed before commit");
                        Some(Event::ServiceChanged { service_id })
                    }
                    Err(e) => {
                        tracing::error!(user_id = %booking.user_id, service_id = booking.service.id, error = %e, "Failed to record booking");
                        Some(Event::BookingFailed {
                            message: e.to_string(),
                        })
                    }
                }
            }

            Effect::AddService { category, fields } => {
                Some(match self.catalog.add_service(&category, &fields).await {
                    Ok(service_id) => Event::ServiceAdded { service_id },
                    Err(e) => Event::CatalogWriteFailed {
                        message: e.to_string(),
                    },
                })
            }
            Effect::UpdateService { service_id, fields } => {
                Some(match self.catalog.update_service(service_id, &fields).await {
                    Ok(rows) => Event::ServiceUpdated { service_id, rows },
                    Err(e) => Event::CatalogWriteFailed {
                        message: e.to_string(),
                    },
                })
            }
            Effect::DeactivateService { service_id } => {
                Some(match self.catalog.deactivate_service(service_id).await {
                    Ok(rows) => Event::ServiceDeactivated { service_id, rows },
                    Err(e) => Event::CatalogWriteFailed {
                        message: e.to_string(),
                    },
                })
            }

            Effect::SendReport(kind) => {
                let messages = self.build_report(kind).await.unwrap_or_else(|e| {
                    tracing::error!(user_id = %context.user_id, error = %e, "Failed to build report");
                    vec![labels::STORE_FAILURE.to_string()]
                });
                outbox.extend(
                    messages
                        .into_iter()
                        .map(|text| Outbound::Reply(Reply::text(text))),
                );
                None
            }

            Effect::Broadcast { text } => {
                match self.bookings.client_user_ids().await {
                    Ok(recipients) => outbox.push(Outbound::Broadcast { recipients, text }),
                    Err(e) => {
                        tracing::error!(user_id = %context.user_id, error = %e, "Failed to load broadcast recipients");
                        outbox.push(Outbound::Reply(Reply::text(labels::STORE_FAILURE)));
                    }
                }
                None
            }
        }
    }

    async fn build_report(&self, kind: ReportKind) -> Result<Vec<String>, DbError> {
        match kind {
            ReportKind::Clients => {
                let clients = self.bookings.list_clients().await?;
                Ok(report::clients_report(&clients))
            }
            ReportKind::RecentAppointments { window_days } => {
                let since = Utc::now() - chrono::Duration::days(i64::from(window_days));
                let appointments = self.bookings.appointments_since(since).await?;
                Ok(report::appointments_report(&appointments, window_days))
            }
        }
    }

    async fn deliver(&self, user: UserId, outbox: Vec<Outbound>) {
        for outbound in outbox {
            match outbound {
                Outbound::Reply(reply) => {
                    if let Err(e) = self
                        .messenger
                        .send_text(user, &reply.text, &reply.keyboard)
                        .await
                    {
                        tracing::warn!(user_id = %user, error = %e, "Reply not delivered");
                    }
                }
                Outbound::Location {
                    latitude,
                    longitude,
                } => {
                    if let Err(e) = self
                        .messenger
                        .send_location(user, latitude, longitude)
                        .await
                    {
                        tracing::warn!(user_id = %user, error = %e, "Location not delivered");
                    }
                }
                Outbound::NotifyStaff(payload) => {
                    self.notifier.notify(&payload).await;
                }
                Outbound::Broadcast { recipients, text } => {
                    let report = self.notifier.broadcast(&recipients, &text).await;
                    self.report_broadcast(user, report).await;
                }
            }
        }
    }

    async fn report_broadcast(&self, user: UserId, report: DeliveryReport) {
        let text = format!(
            "📨 Сообщение доставлено: {}/{}",
            report.delivered,
            report.total()
        );
        if let Err(e) = self.messenger.send_text(user, &text, &Keyboard::Keep).await {
            tracing::warn!(user_id = %user, error = %e, "Broadcast report not delivered");
        }
    }

    /// Drop expired sessions and idle locks
    pub async fn sweep(&self) {
        let sessions = self.sessions.sweep().await;
        let locks = self.locks.prune();
        if sessions > 0 || locks > 0 {
            tracing::info!(sessions, locks, "Session sweep");
        }
    }

    /// Sweep sessions and locks on a fixed interval
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let runtime = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                runtime.sweep().await;
            }
        })
    }
}
