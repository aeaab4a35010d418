//! Typed configuration parsed from environment variables.
//!
//! Numeric knobs fall back to their defaults when absent or unparseable;
//! only the REST endpoint and its key are required, and only by the binary.

use std::time::Duration;

use crate::limits::*;
use crate::model::{Minute, Room};
use crate::selection::SlotLayout;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    MissingVar { var: String },

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Poll schedule for derived fields the store fills in after insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
}

impl Default for EnrichmentPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_ENRICH_INITIAL_MS),
            max_delay: Duration::from_millis(DEFAULT_ENRICH_MAX_MS),
            timeout: Duration::from_millis(DEFAULT_ENRICH_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingConfig {
    pub max_span_minutes: Minute,
    pub grace_secs: i64,
    pub enforce_exclusion: bool,
    pub enrichment: EnrichmentPolicy,
    pub slots: SlotLayout,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_span_minutes: DEFAULT_MAX_SPAN_MINUTES,
            grace_secs: DEFAULT_GRACE_SECS,
            enforce_exclusion: false,
            enrichment: EnrichmentPolicy::default(),
            slots: SlotLayout::default(),
        }
    }
}

impl BookingConfig {
    /// - `ROOMSLOT_MAX_SPAN_MINUTES`: default 720
    /// - `ROOMSLOT_GRACE_SECS`: default 60
    /// - `ROOMSLOT_ENFORCE_EXCLUSION`: `true`/`1` to enable (memory store only)
    /// - `ROOMSLOT_ENRICH_INITIAL_MS` / `_MAX_MS` / `_TIMEOUT_MS`
    pub fn from_env() -> Self {
        Self {
            max_span_minutes: env_parse("ROOMSLOT_MAX_SPAN_MINUTES", DEFAULT_MAX_SPAN_MINUTES),
            grace_secs: env_parse("ROOMSLOT_GRACE_SECS", DEFAULT_GRACE_SECS),
            enforce_exclusion: parse_flag(std::env::var("ROOMSLOT_ENFORCE_EXCLUSION").ok().as_deref()),
            enrichment: EnrichmentPolicy {
                initial_delay: Duration::from_millis(env_parse(
                    "ROOMSLOT_ENRICH_INITIAL_MS",
                    DEFAULT_ENRICH_INITIAL_MS,
                )),
                max_delay: Duration::from_millis(env_parse("ROOMSLOT_ENRICH_MAX_MS", DEFAULT_ENRICH_MAX_MS)),
                timeout: Duration::from_millis(env_parse(
                    "ROOMSLOT_ENRICH_TIMEOUT_MS",
                    DEFAULT_ENRICH_TIMEOUT_MS,
                )),
            },
            slots: SlotLayout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub base_url: String,
    pub api_key: String,
    pub reservations_table: String,
    /// `None` serves the built-in catalog instead of querying a table.
    pub rooms_table: Option<String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl StoreConfig {
    /// Required:
    /// - `ROOMSLOT_STORE_URL`
    /// - the key itself, in the var named by `ROOMSLOT_STORE_KEY_ENV` (default `SUPABASE_KEY`)
    ///
    /// Optional:
    /// - `ROOMSLOT_RESERVATIONS_TABLE`: default `reservas`
    /// - `ROOMSLOT_ROOMS_TABLE`: unset or empty serves the built-in catalog
    /// - `ROOMSLOT_REQUEST_TIMEOUT_SECS` / `ROOMSLOT_CONNECT_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("ROOMSLOT_STORE_URL")
            .map_err(|_| ConfigError::MissingVar { var: "ROOMSLOT_STORE_URL".into() })?;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!("ROOMSLOT_STORE_URL is not an http(s) URL: {base_url}")));
        }
        let key_var = std::env::var("ROOMSLOT_STORE_KEY_ENV").unwrap_or_else(|_| "SUPABASE_KEY".into());
        let api_key = std::env::var(&key_var).map_err(|_| ConfigError::MissingVar { var: key_var.clone() })?;

        let rooms_table = rooms_table_from(std::env::var("ROOMSLOT_ROOMS_TABLE").ok());

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            reservations_table: std::env::var("ROOMSLOT_RESERVATIONS_TABLE").unwrap_or_else(|_| "reservas".into()),
            rooms_table,
            request_timeout: Duration::from_secs(env_parse(
                "ROOMSLOT_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            connect_timeout: Duration::from_secs(env_parse(
                "ROOMSLOT_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// The hosted backend keeps its rooms in code, so a rooms table is opt-in.
fn rooms_table_from(raw: Option<String>) -> Option<String> {
    raw.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn parse_flag(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("1" | "true" | "yes" | "on"))
}

/// The rooms served when no rooms table is configured.
pub fn default_catalog() -> Vec<Room> {
    fn room(id: &str, name: &str, capacity: u32, description: &str, tags: &[&str], image: &str) -> Room {
        Room {
            id: id.into(),
            name: name.into(),
            capacity,
            description: description.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            image: Some(format!("https://images.unsplash.com/{image}?auto=format&fit=crop&w=300&q=80")),
        }
    }

    vec![
        room(
            "reunioes",
            "Sala de Reuniões",
            10,
            "Seats 10. Full video kit and whiteboard.",
            &["AC", "TV"],
            "photo-1497366216548-37526070297c",
        ),
        room(
            "aconselhamento",
            "Sala Aconselhamento",
            3,
            "Quiet private space for up to 3 people.",
            &["PRIVADO"],
            "photo-1522202176988-66273c2fd55f",
        ),
        room(
            "aconselhamento1",
            "Sala Aconselhamento 1",
            3,
            "Air-conditioned, ergonomic armchairs, dimmable lighting.",
            &["PREMIUM"],
            "photo-1517502884422-41eaead166d4",
        ),
        room(
            "semib",
            "Sala Semib",
            6,
            "Flexible space for small groups and short workshops.",
            &["FLEX"],
            "photo-1517048676732-d65bc937f952",
        ),
        room(
            "betageen",
            "Sala Betageen",
            8,
            "Modular furniture for brainstorming sessions.",
            &["CRIATIVO"],
            "photo-1557425955-df376b5903c8",
        ),
    ]
}
