use chrono::{NaiveDate, NaiveTime};

use crate::model::*;
use crate::selection::SelectionError;
use crate::store::StoreError;

/// Why a request was refused before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{date} is in the past")]
    DateInPast { date: NaiveDate },

    #[error("start time {} is in the past", .start.format("%H:%M"))]
    StartInPast { start: NaiveTime },

    #[error("end time {} must be after start time {}", .end.format("%H:%M"), .start.format("%H:%M"))]
    StartNotBeforeEnd { start: NaiveTime, end: NaiveTime },

    #[error("reservation spans {minutes} minutes, limit is {max_minutes}")]
    SpanTooLong { minutes: Minute, max_minutes: Minute },

    #[error("unknown room: {0}")]
    UnknownRoom(String),

    #[error("a responsible name is required")]
    MissingName,

    #[error("{field} longer than {max} characters")]
    TooLong { field: &'static str, max: usize },
}

impl ValidationError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DateInPast { .. } => "date_in_past",
            Self::StartInPast { .. } => "start_in_past",
            Self::StartNotBeforeEnd { .. } => "start_not_before_end",
            Self::SpanTooLong { .. } => "span_too_long",
            Self::UnknownRoom(_) => "unknown_room",
            Self::MissingName => "missing_name",
            Self::TooLong { .. } => "too_long",
        }
    }
}

/// A detected conflict, with what the presentation layer needs to explain it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    pub room_id: String,
    pub room_name: Option<String>,
    pub conflicting: Reservation,
    /// Rooms free for the same slot, catalog order, requested room excluded.
    pub alternatives: Vec<Room>,
}

impl ConflictReport {
    /// "<room> is already reserved by <name> until <HH:mm>"
    pub fn summary(&self) -> String {
        let room = self.room_name.as_deref().unwrap_or(&self.room_id);
        let who = if self.conflicting.name.trim().is_empty() {
            "someone"
        } else {
            self.conflicting.name.as_str()
        };
        format!(
            "{room} is already reserved by {who} until {}",
            format_hhmm(self.conflicting.end)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("{}", .0.summary())]
    Conflict(Box<ConflictReport>),

    /// The session's cached view said free; the authoritative re-check did not.
    #[error("{}", .0.summary())]
    StaleSelection(Box<ConflictReport>),

    /// Fail-closed: availability could not be confirmed.
    #[error("reservation store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("reservation {id} was not enriched in time")]
    EnrichmentTimeout { id: String },
}

impl BookingError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E_VALIDATION",
            Self::Selection(_) => "E_SELECTION",
            Self::Conflict(_) => "E_CONFLICT",
            Self::StaleSelection(_) => "E_STALE_SELECTION",
            Self::StoreUnavailable(_) => "E_STORE_UNAVAILABLE",
            Self::EnrichmentTimeout { .. } => "E_ENRICHMENT_TIMEOUT",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Conflicts found up front and at submit time are presented the same way.
    pub fn conflict(&self) -> Option<&ConflictReport> {
        match self {
            Self::Conflict(report) | Self::StaleSelection(report) => Some(report),
            _ => None,
        }
    }
}
