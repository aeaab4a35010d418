use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Minutes since midnight: the only time-of-day unit inside the engine.
/// `MINUTES_PER_DAY` is a valid exclusive end, never a valid start.
pub type Minute = u32;

pub const MINUTES_PER_DAY: Minute = 24 * 60;

/// Half-open interval `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Minute,
    pub end: Minute,
}

impl Span {
    pub fn new(start: Minute, end: Minute) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Build a span from two times of day. `None` when `start >= end`.
    pub fn from_times(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        let (s, e) = (minute_of_day(start), minute_of_day(end));
        (s < e).then(|| Self::new(s, e))
    }

    pub fn duration_minutes(&self) -> Minute {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        overlap(self.start, self.end, other.start, other.end)
    }

    pub fn contains_minute(&self, t: Minute) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// The overlap predicate for half-open intervals. Touching ends do not overlap.
pub fn overlap(start: Minute, end: Minute, other_start: Minute, other_end: Minute) -> bool {
    start < other_end && end > other_start
}

pub fn minute_of_day(t: NaiveTime) -> Minute {
    t.hour() * 60 + t.minute()
}

/// Inverse of [`minute_of_day`]. `None` for `MINUTES_PER_DAY` and beyond.
pub fn time_of_minute(m: Minute) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(m / 60, m % 60, 0)
}

/// Accepts `HH:mm` (UI) and `HH:mm:ss` (what the store persists).
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn format_hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

pub fn format_minute(m: Minute) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub capacity: u32,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// A stored reservation. Never mutated in place; rescheduling creates a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub room_id: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub name: String,
    pub description: Option<String>,
    /// Filled in by the store after insert; may lag the creation response.
    pub calendar_link: Option<String>,
}

impl Reservation {
    /// Stores reject rows with `start >= end` before they reach the engine.
    pub fn span(&self) -> Span {
        Span {
            start: minute_of_day(self.start),
            end: minute_of_day(self.end),
        }
    }
}

/// The time-and-place part of a booking, before anyone's name is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub room_id: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Payload for `ReservationStore::create`. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    pub name: String,
    pub room_id: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub description: Option<String>,
}

impl NewReservation {
    pub fn request(&self) -> BookingRequest {
        BookingRequest {
            room_id: self.room_id.clone(),
            date: self.date,
            start: self.start,
            end: self.end,
        }
    }
}
