//! Environment configuration

use crate::db::UserId;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DB_PATH: &str = "beauty_salon.db";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 1800;
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_ADDRESS: &str = "ул. Примерная, д. 123";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Studio contact details shown from the visitor menu
#[derive(Debug, Clone, PartialEq)]
pub struct ContactInfo {
    pub channel: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub coordinates: Option<(f64, f64)>,
    /// Text address used when no coordinates are configured
    pub address: String,
}

impl Default for ContactInfo {
    fn default() -> Self {
        Self {
            channel: None,
            website: None,
            phone: None,
            coordinates: None,
            address: DEFAULT_ADDRESS.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub admin_ids: Vec<UserId>,
    pub contacts: ContactInfo,
    pub db_path: String,
    pub port: u16,
    pub session_ttl: Duration,
    pub report_window_days: u32,
    pub webhook_secret: Option<String>,
    pub api_base: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let admin_ids = match get("ADMIN_IDS") {
            Some(raw) => parse_admin_ids(&raw)?,
            None => vec![],
        };

        let coordinates = get("LOCATION_COORDINATES")
            .map(|raw| parse_coordinates(&raw))
            .transpose()?;

        let contacts = ContactInfo {
            channel: get("TELEGRAM_CHANNEL"),
            website: get("WEBSITE_URL"),
            phone: get("PHONE_NUMBER"),
            coordinates,
            address: get("STUDIO_ADDRESS").unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
        };

        Ok(Self {
            bot_token,
            admin_ids,
            contacts,
            db_path: get("SALON_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            port: parse_or("SALON_PORT", get("SALON_PORT"), DEFAULT_PORT)?,
            session_ttl: Duration::from_secs(parse_or(
                "SALON_SESSION_TTL_SECS",
                get("SALON_SESSION_TTL_SECS"),
                DEFAULT_SESSION_TTL_SECS,
            )?),
            report_window_days: parse_or(
                "SALON_REPORT_WINDOW_DAYS",
                get("SALON_REPORT_WINDOW_DAYS"),
                crate::state_machine::state::DEFAULT_REPORT_WINDOW_DAYS,
            )?,
            webhook_secret: get("TELEGRAM_WEBHOOK_SECRET"),
            api_base: get("TELEGRAM_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }

    /// Log optional settings that are missing
    pub fn warn_missing(&self) {
        if self.admin_ids.is_empty() {
            tracing::warn!("ADMIN_IDS is empty; bookings will not be forwarded to anyone");
        }
        if self.contacts.channel.is_none() {
            tracing::warn!("TELEGRAM_CHANNEL is not set");
        }
        if self.contacts.website.is_none() {
            tracing::warn!("WEBSITE_URL is not set");
        }
        if self.contacts.phone.is_none() {
            tracing::warn!("PHONE_NUMBER is not set");
        }
        if self.contacts.coordinates.is_none() {
            tracing::warn!(address = %self.contacts.address, "LOCATION_COORDINATES is not set, using text address");
        }
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_admin_ids(raw: &str) -> Result<Vec<UserId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map(UserId)
                .map_err(|e| ConfigError::Invalid {
                    name: "ADMIN_IDS",
                    value: part.to_string(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

fn parse_coordinates(raw: &str) -> Result<(f64, f64), ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        name: "LOCATION_COORDINATES",
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let (lat, lon) = raw.split_once(',').ok_or_else(|| invalid("expected \"lat,lon\""))?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid("latitude is not a number"))?;
    let lon: f64 = lon.trim().parse().map_err(|_| invalid("longitude is not a number"))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(invalid("out of range"));
    }
    Ok((lat, lon))
}
