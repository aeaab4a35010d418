//! Chat assistant adapter: tool definitions and their execution.
//!
//! The model side (prompting, provider wiring) lives elsewhere. This module
//! only describes the tools the model may call and answers those calls with
//! JSON, backed by the same checker the booking flow uses.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::engine::{AvailabilityChecker, BookingError};
use crate::model::*;
use crate::store::ReservationStore;

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("missing argument: {0}")]
    MissingArg(&'static str),

    #[error("invalid {field}: {value}")]
    InvalidArg { field: &'static str, value: String },

    #[error("no room matches {0}")]
    UnknownRoom(String),

    #[error(transparent)]
    Booking(#[from] BookingError),
}

// =============================================================================
// TOOL DEFINITIONS
// =============================================================================

/// A tool definition as handed to an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Tools the booking assistant exposes.
#[must_use]
pub fn booking_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: "check_availability".into(),
            description: "Check whether a room is free on a date between two times.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "room": { "type": "string", "description": "Room id or room name" },
                    "date": { "type": "string", "description": "Date, YYYY-MM-DD" },
                    "start": { "type": "string", "description": "Start time, HH:mm" },
                    "end": { "type": "string", "description": "End time, HH:mm" }
                },
                "required": ["room", "date", "start", "end"]
            }),
        },
        Tool {
            name: "list_rooms".into(),
            description: "List every bookable room with capacity and description.".into(),
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        Tool {
            name: "suggest_alternatives".into(),
            description: "List rooms that are free on a date between two times.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": { "type": "string", "description": "Date, YYYY-MM-DD" },
                    "start": { "type": "string", "description": "Start time, HH:mm" },
                    "end": { "type": "string", "description": "End time, HH:mm" }
                },
                "required": ["date", "start", "end"]
            }),
        },
        Tool {
            name: "free_windows".into(),
            description: "List the free time windows of a room on a date.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "room": { "type": "string", "description": "Room id or room name" },
                    "date": { "type": "string", "description": "Date, YYYY-MM-DD" }
                },
                "required": ["room", "date"]
            }),
        },
    ]
}

// =============================================================================
// RESULTS
// =============================================================================

/// Answer to `check_availability`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    pub available: bool,
    pub occupied_by: Option<String>,
    pub note: String,
}

/// Thin adapter over `find_conflict` for one room and slot.
pub async fn check_availability<S: ReservationStore>(
    checker: &AvailabilityChecker<S>,
    room: &Room,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> Result<AvailabilityReport, BookingError> {
    let conflict = checker.find_conflict(&room.id, date, start, end).await?;
    Ok(match conflict {
        None => AvailabilityReport {
            available: true,
            occupied_by: None,
            note: format!(
                "{} is free on {date} from {} to {}",
                room.name,
                format_hhmm(start),
                format_hhmm(end)
            ),
        },
        Some(r) => AvailabilityReport {
            available: false,
            note: format!(
                "{} is reserved by {} from {} to {}",
                room.name,
                if r.name.trim().is_empty() { "someone" } else { r.name.as_str() },
                format_hhmm(r.start),
                format_hhmm(r.end)
            ),
            occupied_by: Some(r.name),
        },
    })
}

// =============================================================================
// TOOL EXECUTION
// =============================================================================

/// Run one tool call. Returns the JSON text handed back to the model.
pub async fn dispatch<S: ReservationStore>(
    checker: &AvailabilityChecker<S>,
    tool_name: &str,
    input: &serde_json::Value,
) -> Result<String, AssistantError> {
    info!(tool = %tool_name, "assistant: executing tool");
    let result = match tool_name {
        "check_availability" => execute_check_availability(checker, input).await,
        "list_rooms" => execute_list_rooms(checker).await,
        "suggest_alternatives" => execute_suggest_alternatives(checker, input).await,
        "free_windows" => execute_free_windows(checker, input).await,
        _ => Ok(format!("unknown tool: {tool_name}")),
    };
    if let Err(e) = &result {
        warn!(tool = %tool_name, error = %e, "assistant: tool error");
    }
    result
}

/// Pack an outcome the way a provider's tool-result block expects it.
pub fn tool_result(result: &Result<String, AssistantError>) -> (String, Option<bool>) {
    match result {
        Ok(content) => (content.clone(), None),
        Err(e) => (e.to_string(), Some(true)),
    }
}

async fn execute_check_availability<S: ReservationStore>(
    checker: &AvailabilityChecker<S>,
    input: &serde_json::Value,
) -> Result<String, AssistantError> {
    let room = resolve_room(checker, str_arg(input, "room")?).await?;
    let date = date_arg(input, "date")?;
    let start = time_arg(input, "start")?;
    let end = time_arg(input, "end")?;
    let report = check_availability(checker, &room, date, start, end).await?;
    Ok(json!(report).to_string())
}

async fn execute_list_rooms<S: ReservationStore>(checker: &AvailabilityChecker<S>) -> Result<String, AssistantError> {
    let rooms = checker
        .store()
        .list_rooms()
        .await
        .map_err(BookingError::from)?;
    Ok(json!(rooms).to_string())
}

async fn execute_suggest_alternatives<S: ReservationStore>(
    checker: &AvailabilityChecker<S>,
    input: &serde_json::Value,
) -> Result<String, AssistantError> {
    let date = date_arg(input, "date")?;
    let start = time_arg(input, "start")?;
    let end = time_arg(input, "end")?;
    let rooms = checker.find_available_rooms(date, start, end).await?;
    let names: Vec<&str> = rooms.iter().map(|r| r.name.as_str()).collect();
    Ok(json!({ "available": names }).to_string())
}

async fn execute_free_windows<S: ReservationStore>(
    checker: &AvailabilityChecker<S>,
    input: &serde_json::Value,
) -> Result<String, AssistantError> {
    let room = resolve_room(checker, str_arg(input, "room")?).await?;
    let date = date_arg(input, "date")?;
    let slots = checker.config().slots.slots();
    let (Some(first), Some(last)) = (slots.first(), slots.last()) else {
        return Ok(json!({ "room": room.name, "free": [] }).to_string());
    };
    let day = Span::new(first.start, last.window().end);
    let free: Vec<String> = checker
        .free_spans(&room.id, date, day)
        .await?
        .iter()
        .map(|s| format!("{}-{}", format_minute(s.start), format_minute(s.end)))
        .collect();
    Ok(json!({ "room": room.name, "free": free }).to_string())
}

/// Match by id first, then by case-insensitive name.
pub async fn resolve_room<S: ReservationStore>(
    checker: &AvailabilityChecker<S>,
    needle: &str,
) -> Result<Room, AssistantError> {
    let rooms = checker
        .store()
        .list_rooms()
        .await
        .map_err(BookingError::from)?;
    let needle = needle.trim();
    rooms
        .iter()
        .find(|r| r.id == needle)
        .or_else(|| rooms.iter().find(|r| r.name.eq_ignore_ascii_case(needle)))
        .cloned()
        .ok_or_else(|| AssistantError::UnknownRoom(needle.to_string()))
}

fn str_arg<'a>(input: &'a serde_json::Value, field: &'static str) -> Result<&'a str, AssistantError> {
    input
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or(AssistantError::MissingArg(field))
}

fn date_arg(input: &serde_json::Value, field: &'static str) -> Result<NaiveDate, AssistantError> {
    let raw = str_arg(input, field)?;
    parse_date(raw).ok_or_else(|| AssistantError::InvalidArg { field, value: raw.to_string() })
}

fn time_arg(input: &serde_json::Value, field: &'static str) -> Result<NaiveTime, AssistantError> {
    let raw = str_arg(input, field)?;
    parse_time(raw).ok_or_else(|| AssistantError::InvalidArg { field, value: raw.to_string() })
}
