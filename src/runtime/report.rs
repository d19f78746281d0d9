//! Staff report formatting
//!
//! Reports are split into messages of at most [`MAX_MESSAGE_CHARS`]
//! characters, breaking between records where possible.

use crate::db::{AppointmentRecord, ClientRecord};

/// Telegram rejects longer messages
pub const MAX_MESSAGE_CHARS: usize = 4000;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn clients_report(clients: &[ClientRecord]) -> Vec<String> {
    if clients.is_empty() {
        return vec!["Клиентов пока нет.".to_string()];
    }

    let records = clients.iter().map(|c| {
        format!(
            "ID: {}\nИмя: {}\nТелефон: {}\nЗаписей: {}\nДата: {}",
            c.id,
            c.name,
            c.phone,
            c.appointment_count,
            c.created_at.format(TIMESTAMP_FORMAT),
        )
    });
    chunk("📋 Список всех клиентов:", records, MAX_MESSAGE_CHARS)
}

pub fn appointments_report(appointments: &[AppointmentRecord], window_days: u32) -> Vec<String> {
    if appointments.is_empty() {
        return vec![format!("Записей за последние {window_days} дней нет.")];
    }

    let records = appointments.iter().map(|a| {
        format!(
            "ID: {}\nИмя: {}\nТелефон: {}\nУслуга: {} ({})\nЦена: {} руб.\nВремя: {}\nДата: {}\nСтатус: {}",
            a.id,
            a.client_name,
            a.phone,
            a.service_name,
            a.category,
            a.price,
            a.duration,
            a.created_at.format(TIMESTAMP_FORMAT),
            a.status,
        )
    });
    chunk(
        &format!("📅 Записи за последние {window_days} дней:"),
        records,
        MAX_MESSAGE_CHARS,
    )
}

/// Pack a header and records into messages of at most `limit` characters.
/// Records are separated by a blank line; a record longer than `limit` is
/// split on character boundaries.
pub fn chunk(header: &str, records: impl IntoIterator<Item = String>, limit: usize) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    let pieces = std::iter::once(header.to_string()).chain(records);
    for piece in pieces {
        for part in split_chars(&piece, limit) {
            let part_len = part.chars().count();
            let separator = if current.is_empty() { 0 } else { 2 };
            if current_len + separator + part_len > limit {
                messages.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push_str("\n\n");
                current_len += 2;
            }
            current.push_str(&part);
            current_len += part_len;
        }
    }

    if !current.is_empty() {
        messages.push(current);
    }
    messages
}

fn split_chars(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return vec![text.to_string()];
    }
    chars
        .chunks(limit)
        .map(|part| part.iter().collect())
        .collect()
}
