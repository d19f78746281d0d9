//! Sentinel button labels and fixed reply texts
//!
//! Keyboards are built from these constants and the engines match incoming
//! text against the same constants, so a label only ever changes here.

pub const CANCEL: &str = "Отмена";
pub const BACK: &str = "Назад";

// Visitor main menu
pub const CHANNEL: &str = "Перейти в телеграм-канал";
pub const WEBSITE: &str = "Перейти на сайт";
pub const ADDRESS: &str = "Адрес студии";
pub const CALL: &str = "Позвонить";

// Admin menu
pub const ADMIN_EDIT: &str = "Изменить услугу";
pub const ADMIN_DELETE: &str = "Удалить услугу";
pub const ADMIN_ADD: &str = "Добавить услугу";
pub const ADMIN_BROADCAST: &str = "Информационное сообщение";
pub const ADMIN_CLIENTS: &str = "Посмотреть список клиентов";
pub const ADMIN_APPOINTMENTS: &str = "Посмотреть записи";
pub const ADMIN_EXIT: &str = "Выйти из админки";

pub const START_COMMAND: &str = "/start";
pub const ADMIN_COMMAND: &str = "/admin";

pub const GREETING: &str = "Рады Вас видеть в нашей студии маникюра \"Ноготочки-Точка\"!";
pub const STAFF_GREETING: &str = "Добро пожаловать в панель администратора!";
pub const CHOOSE_CATEGORY: &str = "Выберите категорию услуг:";
pub const UNKNOWN_COMMAND: &str =
    "Извините, я не понимаю эту команду. Используйте /start для начала.";
pub const CANCELLED: &str = "Действие отменено.";
pub const ACCESS_DENIED: &str = "Доступ запрещен.";
pub const STORE_FAILURE: &str = "❌ Произошла ошибка. Пожалуйста, попробуйте позже.";

/// Keyboard rows, one label per button
pub type Rows = Vec<Vec<String>>;

fn row(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|l| (*l).to_string()).collect()
}

/// Category buttons followed by the contact buttons
pub fn visitor_menu<'a>(categories: impl IntoIterator<Item = &'a str>) -> Rows {
    let mut rows: Rows = categories.into_iter().map(|c| vec![c.to_string()]).collect();
    rows.push(row(&[CHANNEL, WEBSITE]));
    rows.push(row(&[ADDRESS, CALL]));
    rows
}

/// One button per item plus a back button
pub fn list_with_back<'a>(items: impl IntoIterator<Item = &'a str>) -> Rows {
    let mut rows: Rows = items.into_iter().map(|s| vec![s.to_string()]).collect();
    rows.push(row(&[BACK]));
    rows
}

pub fn admin_menu() -> Rows {
    vec![
        row(&[ADMIN_EDIT, ADMIN_DELETE]),
        row(&[ADMIN_ADD, ADMIN_BROADCAST]),
        row(&[ADMIN_CLIENTS, ADMIN_APPOINTMENTS]),
        row(&[ADMIN_EXIT]),
    ]
}

pub fn back_and_cancel() -> Rows {
    vec![row(&[BACK, CANCEL])]
}

pub fn start_only() -> Rows {
    vec![row(&[START_COMMAND])]
}

pub fn admin_only() -> Rows {
    vec![row(&[ADMIN_COMMAND])]
}

/// Labels the visitor flow reserves; a category may not be named after one
pub fn is_reserved(text: &str) -> bool {
    [
        CANCEL,
        BACK,
        CHANNEL,
        WEBSITE,
        ADDRESS,
        CALL,
        ADMIN_EDIT,
        ADMIN_DELETE,
        ADMIN_ADD,
        ADMIN_BROADCAST,
        ADMIN_CLIENTS,
        ADMIN_APPOINTMENTS,
        ADMIN_EXIT,
    ]
    .contains(&text)
}
