//! Visitor booking flow
//!
//! `Idle -> CategoryChosen -> AwaitingPhone -> AwaitingName -> Idle`.
//! The name step emits a `RecordBooking` effect and stays put; the runtime
//! feeds back `BookingCommitted`, `BookingFailed` or `ServiceChanged` to
//! finish the step.

use super::effect::BookingPayload;
use super::state::{build_offers, find_offer, ServiceOffer};
use super::transition::{invalid, is_valid_phone, TransitionError, TransitionResult};
use super::{Effect, Event, SessionState, StepContext};
use crate::db::{BookingReceipt, Category, NewBooking, ServiceSnapshot};
use crate::labels::{self, Rows};

const CATEGORY_EMPTY: &str = "В этой категории пока нет услуг.";
const SERVICE_NOT_FOUND: &str = "Услуга не найдена. Выберите услугу из списка:";
const SERVICE_GONE: &str = "Эта услуга больше недоступна. Выберите другую:";
const ASK_NAME: &str = "Теперь введите ваше имя:";
const BAD_PHONE: &str =
    "Пожалуйста, введите корректный номер телефона (цифры, допускаются +, пробелы и дефисы):";
const EMPTY_NAME: &str = "Пожалуйста, введите ваше имя:";
const BOOKING_FAILED: &str =
    "❌ Произошла ошибка при записи. Пожалуйста, отправьте ваше имя ещё раз.";
const BOOKING_DONE: &str = "✅ Ваша запись принята! Администратор свяжется с вами для уточнения времени.\n\nЧем ещё можем помочь?";

/// Category buttons plus contact buttons for the main menu
pub fn category_menu(context: &StepContext) -> Rows {
    labels::visitor_menu(
        context
            .catalog
            .bookable_categories()
            .into_iter()
            .map(|c| c.name.as_str()),
    )
}

pub fn transition(
    state: &SessionState,
    context: &StepContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        (SessionState::Idle, Event::Text(text)) => Ok(idle_text(context, &text)),
        (SessionState::Idle, Event::Contact { .. }) => {
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::reply(labels::UNKNOWN_COMMAND)))
        }

        (SessionState::CategoryChosen { category, offers }, Event::Text(text)) => {
            Ok(choose_service(context, category, offers, &text))
        }
        (SessionState::CategoryChosen { offers, .. }, Event::Contact { .. }) => {
            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::reply_with_rows(SERVICE_NOT_FOUND, offer_rows(offers))))
        }

        (SessionState::AwaitingPhone { category, service }, Event::Text(text)) => {
            if text == labels::BACK {
                return Ok(listing(context, category));
            }
            Ok(capture_phone(category, service, &text))
        }
        (SessionState::AwaitingPhone { category, service }, Event::Contact { phone }) => {
            Ok(capture_phone(category, service, &phone))
        }

        (
            SessionState::AwaitingName {
                category,
                service,
                phone,
            },
            Event::Text(text),
        ) => {
            if text == labels::BACK {
                return Ok(ask_phone(category, service));
            }
            Ok(capture_name(context, state, service, phone, &text))
        }
        (SessionState::AwaitingName { .. }, Event::Contact { .. }) => Ok(
            TransitionResult::new(state.clone())
                .with_effect(Effect::reply_with_rows(EMPTY_NAME, labels::back_and_cancel())),
        ),

        (
            SessionState::AwaitingName {
                category,
                service,
                phone,
            },
            Event::BookingCommitted { name, receipt },
        ) => Ok(committed(context, category, service, phone, name, &receipt)),

        (SessionState::AwaitingName { category, .. }, Event::ServiceChanged { service_id }) => {
            tracing::info!(user_id = %context.user_id, service_id, "Booked service changed, relisting");
            Ok(service_gone(context, category))
        }

        (SessionState::AwaitingName { .. }, Event::BookingFailed { message }) => {
            tracing::warn!(user_id = %context.user_id, error = %message, "Booking not stored");
            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::reply_with_rows(BOOKING_FAILED, labels::back_and_cancel())))
        }

        (_, event) => Err(invalid(state, &event)),
    }
}

fn idle_text(context: &StepContext, text: &str) -> TransitionResult {
    if let Some(category) = context.catalog.category_by_name(text) {
        return listing(context, category);
    }

    let contacts = &context.contacts;
    let effect = match text {
        labels::CHANNEL => Effect::reply(match &contacts.channel {
            Some(channel) => format!("Наш телеграм-канал: {channel}"),
            None => "Телеграм-канал пока не указан.".to_string(),
        }),
        labels::WEBSITE => Effect::reply(match &contacts.website {
            Some(url) => format!("Наш сайт: {url}"),
            None => "Сайт пока не указан.".to_string(),
        }),
        labels::CALL => Effect::reply(match &contacts.phone {
            Some(phone) => format!("Наш телефон: {phone}"),
            None => "Номер телефона пока не указан.".to_string(),
        }),
        labels::ADDRESS => match contacts.coordinates {
            Some((latitude, longitude)) => Effect::ReplyLocation {
                latitude,
                longitude,
            },
            None => Effect::reply(format!("Адрес студии: {}", contacts.address)),
        },
        labels::BACK => Effect::reply_with_rows(labels::CHOOSE_CATEGORY, category_menu(context)),
        _ => Effect::reply(labels::UNKNOWN_COMMAND),
    };

    TransitionResult::new(SessionState::Idle).with_effect(effect)
}

/// List the active services of a category as fresh offers
fn listing(context: &StepContext, category: &Category) -> TransitionResult {
    let services = context.catalog.services_in(category.id);
    if services.is_empty() {
        return TransitionResult::new(SessionState::Idle)
            .with_effect(Effect::reply_with_rows(CATEGORY_EMPTY, category_menu(context)));
    }

    let offers = build_offers(&services);
    let rows = offer_rows(&offers);
    TransitionResult::new(SessionState::CategoryChosen {
        category: category.clone(),
        offers,
    })
    .with_effect(Effect::reply_with_rows(
        format!("Выберите услугу в категории '{}':", category.name),
        rows,
    ))
}

fn offer_rows(offers: &[ServiceOffer]) -> Rows {
    labels::list_with_back(offers.iter().map(|o| o.label.as_str()))
}

fn choose_service(
    context: &StepContext,
    category: &Category,
    offers: &[ServiceOffer],
    text: &str,
) -> TransitionResult {
    if text == labels::BACK {
        return TransitionResult::new(SessionState::Idle).with_effect(Effect::reply_with_rows(
            labels::CHOOSE_CATEGORY,
            category_menu(context),
        ));
    }

    let Some(offer) = find_offer(offers, text) else {
        return TransitionResult::new(SessionState::CategoryChosen {
            category: category.clone(),
            offers: offers.to_vec(),
        })
        .with_effect(Effect::reply_with_rows(SERVICE_NOT_FOUND, offer_rows(offers)));
    };

    // The catalog may have changed since the listing was rendered
    let Some(service) = context
        .catalog
        .service(offer.service_id)
        .filter(|s| s.category_id == category.id)
    else {
        return service_gone(context, category);
    };

    ask_phone(category, &service.snapshot())
}

fn service_gone(context: &StepContext, category: &Category) -> TransitionResult {
    let mut result = listing(context, category);
    result.effects.insert(0, Effect::reply(SERVICE_GONE));
    result
}

fn ask_phone(category: &Category, service: &ServiceSnapshot) -> TransitionResult {
    TransitionResult::new(SessionState::AwaitingPhone {
        category: category.clone(),
        service: service.clone(),
    })
    .with_effect(Effect::reply_with_rows(
        format!(
            "Вы выбрали: {}\nЦена: {} руб.\nВремя: {}\n\nВведите ваш номер телефона:",
            service.name, service.price, service.duration
        ),
        labels::back_and_cancel(),
    ))
}

fn capture_phone(category: &Category, service: &ServiceSnapshot, input: &str) -> TransitionResult {
    let phone = input.trim();
    if !is_valid_phone(phone) {
        return TransitionResult::new(SessionState::AwaitingPhone {
            category: category.clone(),
            service: service.clone(),
        })
        .with_effect(Effect::reply_with_rows(BAD_PHONE, labels::back_and_cancel()));
    }

    TransitionResult::new(SessionState::AwaitingName {
        category: category.clone(),
        service: service.clone(),
        phone: phone.to_string(),
    })
    .with_effect(Effect::reply_with_rows(ASK_NAME, labels::back_and_cancel()))
}

fn capture_name(
    context: &StepContext,
    state: &SessionState,
    service: &ServiceSnapshot,
    phone: &str,
    input: &str,
) -> TransitionResult {
    let name = input.trim();
    if name.is_empty() {
        return TransitionResult::new(state.clone())
            .with_effect(Effect::reply_with_rows(EMPTY_NAME, labels::back_and_cancel()));
    }

    TransitionResult::new(state.clone()).with_effect(Effect::RecordBooking(NewBooking {
        user_id: context.user_id,
        name: name.to_string(),
        phone: phone.to_string(),
        service: service.clone(),
    }))
}

fn committed(
    context: &StepContext,
    category: &Category,
    service: &ServiceSnapshot,
    phone: &str,
    name: String,
    receipt: &BookingReceipt,
) -> TransitionResult {
    tracing::info!(
        user_id = %context.user_id,
        client_id = receipt.client_id,
        appointment_id = receipt.appointment_id,
        "Booking committed"
    );

    TransitionResult::new(SessionState::Idle).with_effects([
        Effect::NotifyStaff(BookingPayload {
            client_id: receipt.client_id,
            appointment_id: receipt.appointment_id,
            user_id: context.user_id,
            name,
            phone: phone.to_string(),
            category: category.name.clone(),
            service: service.clone(),
        }),
        Effect::reply_with_rows(BOOKING_DONE, labels::start_only()),
    ])
}
