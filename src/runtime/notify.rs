//! Staff notifications and client broadcasts
//!
//! Delivery is best effort: every recipient is tried once, in order, and a
//! failure never stops the next recipient.

use crate::db::UserId;
use crate::messenger::Messenger;
use crate::state_machine::{BookingPayload, Keyboard};
use std::sync::Arc;

/// Outcome of a fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn total(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Message staff receive for a new booking
pub fn format_booking(payload: &BookingPayload) -> String {
    format!(
        "🔥 Новая запись! 🔥\n\
         Клиент № {}:\n\
         Имя - {}\n\
         Телефон - {}\n\
         Категория услуг - {}\n\
         Услуга - {}\n\
         Стоимость - {} руб.\n\
         Время оказания услуги - {}\n\n\
         Свяжитесь с клиентом для согласования дня и времени для оказания услуг!",
        payload.client_id,
        payload.name,
        payload.phone,
        payload.category,
        payload.service.name,
        payload.service.price,
        payload.service.duration,
    )
}

pub struct NotificationDispatcher<M> {
    messenger: Arc<M>,
    staff: Vec<UserId>,
}

impl<M: Messenger> NotificationDispatcher<M> {
    pub fn new(messenger: Arc<M>, staff: Vec<UserId>) -> Self {
        Self { messenger, staff }
    }

    /// Tell every staff member about a committed booking
    pub async fn notify(&self, payload: &BookingPayload) -> DeliveryReport {
        let text = format_booking(payload);
        let report = self.fan_out(&self.staff, &text).await;
        tracing::info!(
            appointment_id = payload.appointment_id,
            delivered = report.delivered,
            failed = report.failed,
            "Staff notified"
        );
        report
    }

    /// Send a staff announcement to every client
    pub async fn broadcast(&self, recipients: &[UserId], text: &str) -> DeliveryReport {
        let report = self.fan_out(recipients, text).await;
        tracing::info!(
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast finished"
        );
        report
    }

    async fn fan_out(&self, recipients: &[UserId], text: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for recipient in recipients {
            match self
                .messenger
                .send_text(*recipient, text, &Keyboard::Keep)
                .await
            {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(recipient = %recipient, error = %e, "Delivery failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
