//! Staff catalog administration flow
//!
//! Every step re-checks `StepContext::is_staff`. Catalog writes are emitted
//! as effects and the runtime feeds the outcome back as an event, which
//! always lands on `MenuShown`.

use super::effect::ReportKind;
use super::state::{build_offers, find_offer, ServiceOffer};
use super::transition::{invalid, parse_price, TransitionError, TransitionResult};
use super::{AdminState, Effect, Event, SessionState, StepContext};
use crate::db::{Category, Service, ServiceFields, ServiceSnapshot};
use crate::labels::{self, Rows};

const MENU: &str = "Панель администратора:";
const CHOOSE_ACTION: &str = "Выберите действие из меню:";
const EXITED: &str = "Вы вышли из панели администратора.";
const CATEGORY_NOT_FOUND: &str = "Категория не найдена. Выберите категорию из списка:";
const CATEGORY_EMPTY: &str = "В этой категории нет услуг. Выберите другую:";
const SERVICE_NOT_FOUND: &str = "Услуга не найдена. Выберите услугу из списка:";
const BAD_CATEGORY_NAME: &str = "Это название недоступно. Введите другое название категории:";
const ASK_NEW_PRICE: &str = "Введите новую цену услуги:";
const ASK_NEW_DURATION: &str = "Введите новое время оказания услуги (например, '2 часа'):";
const ASK_NAME: &str = "Введите название новой услуги:";
const ASK_PRICE: &str = "Введите цену услуги:";
const ASK_DURATION: &str = "Введите время оказания услуги (например, '2 часа'):";
const BAD_PRICE: &str = "Пожалуйста, введите корректную цену (целое положительное число):";
const EMPTY_INPUT: &str = "Значение не может быть пустым. Попробуйте ещё раз:";
const TEXT_EXPECTED: &str = "Ожидается текстовое сообщение.";
const ASK_BROADCAST: &str = "Введите сообщение для рассылки:";
const BROADCAST_STARTED: &str = "📨 Рассылка запущена.";
const UPDATED: &str = "✅ Услуга успешно изменена!";
const DELETED: &str = "✅ Услуга удалена.";
const VANISHED: &str = "❌ Услуга не найдена или уже удалена.";
const WRITE_FAILED: &str = "❌ Ошибка при сохранении изменений.";

/// Handle `/admin` from any state
pub fn enter(state: &SessionState, context: &StepContext) -> TransitionResult {
    if !context.is_staff {
        tracing::warn!(user_id = %context.user_id, "Admin entry denied");
        return deny(state);
    }
    menu(MENU)
}

#[allow(clippy::too_many_lines)]
pub fn transition(
    step: &AdminState,
    context: &StepContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let state = SessionState::from(step.clone());
    if !context.is_staff {
        tracing::warn!(user_id = %context.user_id, step = step.name(), "Admin step denied");
        return Ok(deny(&state));
    }

    let text = match event {
        Event::Text(text) => text,
        Event::Contact { .. } => {
            return Ok(TransitionResult::new(state).with_effect(Effect::reply(TEXT_EXPECTED)))
        }
        outcome => return store_outcome(step, context, outcome),
    };

    if text == labels::BACK {
        return Ok(menu(MENU));
    }

    Ok(match step {
        AdminState::MenuShown => menu_choice(context, &text),

        AdminState::CategoryForEdit => {
            choose_category(context, &text, CategoryPurpose::Edit, &state)
        }
        AdminState::CategoryForDelete => {
            choose_category(context, &text, CategoryPurpose::Delete, &state)
        }
        AdminState::CategoryForAdd => add_category(context, &text, &state),

        AdminState::ServiceForEdit { category, offers } => {
            match resolve_offer(context, &state, category, offers, &text) {
                Ok(service) => TransitionResult::new(AdminState::EditingName {
                    service: service.clone(),
                })
                .with_effect(Effect::reply_with_rows(
                    format!(
                        "Услуга: {}\nЦена: {} руб.\nВремя: {}\n\nВведите новое название услуги:",
                        service.name, service.price, service.duration
                    ),
                    labels::back_and_cancel(),
                )),
                Err(result) => result,
            }
        }
        AdminState::ServiceForDelete { category, offers } => {
            match resolve_offer(context, &state, category, offers, &text) {
                Ok(service) => TransitionResult::new(state.clone())
                    .with_effect(Effect::DeactivateService {
                        service_id: service.id,
                    }),
                Err(result) => result,
            }
        }

        AdminState::EditingName { service } => match non_empty(&text) {
            Some(name) => TransitionResult::new(AdminState::EditingPrice {
                service: service.clone(),
                name,
            })
            .with_effect(prompt(ASK_NEW_PRICE)),
            None => reprompt(&state, EMPTY_INPUT),
        },
        AdminState::EditingPrice { service, name } => match parse_price(&text) {
            Some(price) => TransitionResult::new(AdminState::EditingDuration {
                service: service.clone(),
                name: name.clone(),
                price,
            })
            .with_effect(prompt(ASK_NEW_DURATION)),
            None => reprompt(&state, BAD_PRICE),
        },
        AdminState::EditingDuration {
            service,
            name,
            price,
        } => match non_empty(&text) {
            Some(duration) => TransitionResult::new(state.clone()).with_effect(
                Effect::UpdateService {
                    service_id: service.id,
                    fields: ServiceFields {
                        name: name.clone(),
                        price: *price,
                        duration,
                    },
                },
            ),
            None => reprompt(&state, EMPTY_INPUT),
        },

        AdminState::NamePrompt { category } => match non_empty(&text) {
            Some(name) => TransitionResult::new(AdminState::PricePrompt {
                category: category.clone(),
                name,
            })
            .with_effect(prompt(ASK_PRICE)),
            None => reprompt(&state, EMPTY_INPUT),
        },
        AdminState::PricePrompt { category, name } => match parse_price(&text) {
            Some(price) => TransitionResult::new(AdminState::DurationPrompt {
                category: category.clone(),
                name: name.clone(),
                price,
            })
            .with_effect(prompt(ASK_DURATION)),
            None => reprompt(&state, BAD_PRICE),
        },
        AdminState::DurationPrompt {
            category,
            name,
            price,
        } => match non_empty(&text) {
            Some(duration) => {
                TransitionResult::new(state.clone()).with_effect(Effect::AddService {
                    category: category.clone(),
                    fields: ServiceFields {
                        name: name.clone(),
                        price: *price,
                        duration,
                    },
                })
            }
            None => reprompt(&state, EMPTY_INPUT),
        },

        AdminState::BroadcastPrompt => match non_empty(&text) {
            Some(text) => TransitionResult::new(AdminState::MenuShown).with_effects([
                Effect::reply_with_rows(BROADCAST_STARTED, labels::admin_menu()),
                Effect::Broadcast { text },
            ]),
            None => reprompt(&state, EMPTY_INPUT),
        },
    })
}

fn store_outcome(
    step: &AdminState,
    context: &StepContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (step, event) {
        (AdminState::DurationPrompt { category, name, .. }, Event::ServiceAdded { service_id }) => {
            tracing::info!(user_id = %context.user_id, service_id, category = %category, "Service added");
            Ok(menu(format!(
                "✅ Услуга «{name}» успешно добавлена! (ID {service_id})"
            )))
        }
        (AdminState::EditingDuration { .. }, Event::ServiceUpdated { service_id, rows }) => {
            tracing::info!(user_id = %context.user_id, service_id, rows, "Service update applied");
            Ok(menu(if rows == 0 { VANISHED } else { UPDATED }))
        }
        (AdminState::ServiceForDelete { .. }, Event::ServiceDeactivated { service_id, rows }) => {
            tracing::info!(user_id = %context.user_id, service_id, rows, "Service deactivated");
            Ok(menu(if rows == 0 { VANISHED } else { DELETED }))
        }
        (
            AdminState::DurationPrompt { .. }
            | AdminState::EditingDuration { .. }
            | AdminState::ServiceForDelete { .. },
            Event::CatalogWriteFailed { message },
        ) => {
            tracing::warn!(user_id = %context.user_id, error = %message, "Catalog write failed");
            Ok(menu(WRITE_FAILED))
        }
        (step, event) => Err(invalid(&SessionState::from(step.clone()), &event)),
    }
}

fn menu_choice(context: &StepContext, text: &str) -> TransitionResult {
    let categories = || {
        labels::list_with_back(
            context
                .catalog
                .bookable_categories()
                .into_iter()
                .map(|c| c.name.as_str()),
        )
    };

    match text {
        labels::ADMIN_EDIT => TransitionResult::new(AdminState::CategoryForEdit).with_effect(
            Effect::reply_with_rows("Выберите категорию для изменения:", categories()),
        ),
        labels::ADMIN_DELETE => TransitionResult::new(AdminState::CategoryForDelete).with_effect(
            Effect::reply_with_rows("Выберите категорию для удаления:", categories()),
        ),
        labels::ADMIN_ADD => TransitionResult::new(AdminState::CategoryForAdd).with_effect(
            Effect::reply_with_rows(
                "Выберите категорию для добавления услуги или введите название новой:",
                all_categories(context),
            ),
        ),
        labels::ADMIN_BROADCAST => TransitionResult::new(AdminState::BroadcastPrompt)
            .with_effect(Effect::reply_with_rows(ASK_BROADCAST, labels::back_and_cancel())),
        labels::ADMIN_CLIENTS => TransitionResult::new(AdminState::MenuShown)
            .with_effect(Effect::SendReport(ReportKind::Clients)),
        labels::ADMIN_APPOINTMENTS => TransitionResult::new(AdminState::MenuShown).with_effect(
            Effect::SendReport(ReportKind::RecentAppointments {
                window_days: context.report_window_days,
            }),
        ),
        labels::ADMIN_EXIT => TransitionResult::new(SessionState::Idle)
            .with_effect(Effect::reply_with_rows(EXITED, labels::admin_only())),
        _ => menu(CHOOSE_ACTION),
    }
}

#[derive(Clone, Copy)]
enum CategoryPurpose {
    Edit,
    Delete,
}

fn choose_category(
    context: &StepContext,
    text: &str,
    purpose: CategoryPurpose,
    state: &SessionState,
) -> TransitionResult {
    let Some(category) = context.catalog.category_by_name(text) else {
        return reprompt_with(state, CATEGORY_NOT_FOUND, all_categories(context));
    };

    let services = context.catalog.services_in(category.id);
    if services.is_empty() {
        return reprompt_with(state, CATEGORY_EMPTY, all_categories(context));
    }

    let offers = build_offers(&services);
    let rows = offer_rows(&offers);
    let category = category.clone();
    let title = format!("Выберите услугу в категории '{}':", category.name);
    let next = match purpose {
        CategoryPurpose::Edit => AdminState::ServiceForEdit { category, offers },
        CategoryPurpose::Delete => AdminState::ServiceForDelete { category, offers },
    };
    TransitionResult::new(next).with_effect(Effect::reply_with_rows(title, rows))
}

fn add_category(context: &StepContext, text: &str, state: &SessionState) -> TransitionResult {
    match non_empty(text) {
        Some(name) if !labels::is_reserved(&name) && !name.starts_with('/') => {
            let prompt_text = if context.catalog.category_by_name(&name).is_some() {
                ASK_NAME.to_string()
            } else {
                format!("Будет создана новая категория «{name}».\n{ASK_NAME}")
            };
            TransitionResult::new(AdminState::NamePrompt { category: name })
                .with_effect(prompt(prompt_text))
        }
        _ => reprompt_with(state, BAD_CATEGORY_NAME, all_categories(context)),
    }
}

/// Map a pressed service button back to the live catalog entry
fn resolve_offer(
    context: &StepContext,
    state: &SessionState,
    category: &Category,
    offers: &[ServiceOffer],
    text: &str,
) -> Result<ServiceSnapshot, TransitionResult> {
    let Some(offer) = find_offer(offers, text) else {
        return Err(reprompt_with(state, SERVICE_NOT_FOUND, offer_rows(offers)));
    };

    context
        .catalog
        .service(offer.service_id)
        .filter(|s| s.category_id == category.id)
        .map(Service::snapshot)
        .ok_or_else(|| menu(VANISHED))
}

fn all_categories(context: &StepContext) -> Rows {
    labels::list_with_back(context.catalog.categories.iter().map(|c| c.name.as_str()))
}

fn offer_rows(offers: &[ServiceOffer]) -> Rows {
    labels::list_with_back(offers.iter().map(|o| o.label.as_str()))
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn prompt(text: impl Into<String>) -> Effect {
    Effect::reply_with_rows(text, labels::back_and_cancel())
}

fn reprompt(state: &SessionState, text: &str) -> TransitionResult {
    TransitionResult::new(state.clone()).with_effect(prompt(text))
}

fn reprompt_with(state: &SessionState, text: &str, rows: Rows) -> TransitionResult {
    TransitionResult::new(state.clone()).with_effect(Effect::reply_with_rows(text, rows))
}

fn menu(text: impl Into<String>) -> TransitionResult {
    TransitionResult::new(AdminState::MenuShown)
        .with_effect(Effect::reply_with_rows(text, labels::admin_menu()))
}

fn deny(state: &SessionState) -> TransitionResult {
    TransitionResult::new(state.clone()).with_effect(Effect::reply(labels::ACCESS_DENIED))
}
