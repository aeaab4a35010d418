//! Two-click slot selection.
//!
//! A day is a flat, chronologically sorted list of fixed-width slots grouped
//! into named periods. The first click picks a start, the second an end; the
//! end slot's time is the exclusive end of the booking. Every click is checked
//! against a cached copy of the day's reservations. The cache is advisory: the
//! authoritative check runs again at submit time.

use chrono::{NaiveDate, NaiveTime};

use crate::engine::first_conflict;
use crate::limits::SLOT_MINUTES;
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("{0} is not a selectable slot")]
    UnknownSlot(String),

    #[error("{} is already reserved by {reserved_by} until {}", .slot.format("%H:%M"), .until.format("%H:%M"))]
    SlotUnavailable {
        slot: NaiveTime,
        reserved_by: String,
        until: NaiveTime,
    },

    #[error(
        "selection contains reserved slots: {}-{} is reserved by {reserved_by}",
        .occupied_start.format("%H:%M"),
        .occupied_end.format("%H:%M")
    )]
    RangeContainsReserved {
        occupied_start: NaiveTime,
        occupied_end: NaiveTime,
        reserved_by: String,
    },

    #[error("pick both a start and an end slot first")]
    Incomplete,

    #[error("pick a room and a date first")]
    NoRoomOrDate,

    #[error("invalid slot layout: {0}")]
    InvalidLayout(String),
}

// =============================================================================
// LAYOUT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    /// Position in the flattened day.
    pub index: usize,
    pub start: Minute,
    /// Index into [`SlotLayout::periods`].
    pub period: usize,
}

impl TimeSlot {
    pub fn time(&self) -> NaiveTime {
        time_of_minute(self.start).unwrap_or(NaiveTime::MIN)
    }

    /// The slot's own `[start, start + SLOT_MINUTES)` window.
    pub fn window(&self) -> Span {
        Span::new(self.start, self.start + SLOT_MINUTES)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLayout {
    periods: Vec<String>,
    slots: Vec<TimeSlot>,
}

impl Default for SlotLayout {
    /// Morning 06:00-12:30, afternoon 13:00-17:30, evening 18:00-23:30.
    fn default() -> Self {
        Self::stepped(&[("morning", 360, 750), ("afternoon", 780, 1050), ("evening", 1080, 1410)])
            .unwrap_or_else(|_| Self { periods: Vec::new(), slots: Vec::new() })
    }
}

impl SlotLayout {
    /// Build a layout from explicit slot starts per period. The flattened list
    /// must be strictly ascending and every slot must end by midnight.
    pub fn new(periods: Vec<(String, Vec<Minute>)>) -> Result<Self, SelectionError> {
        let mut names = Vec::with_capacity(periods.len());
        let mut slots: Vec<TimeSlot> = Vec::new();
        for (period, (name, starts)) in periods.into_iter().enumerate() {
            names.push(name);
            for start in starts {
                if start + SLOT_MINUTES > MINUTES_PER_DAY {
                    return Err(SelectionError::InvalidLayout(format!(
                        "slot {} runs past midnight",
                        format_minute(start)
                    )));
                }
                if let Some(last) = slots.last()
                    && start <= last.start {
                        return Err(SelectionError::InvalidLayout(format!(
                            "slot {} is not after {}",
                            format_minute(start),
                            format_minute(last.start)
                        )));
                    }
                slots.push(TimeSlot { index: slots.len(), start, period });
            }
        }
        Ok(Self { periods: names, slots })
    }

    /// Periods as `(name, first_start, last_start)` stepped by `SLOT_MINUTES`.
    pub fn stepped(periods: &[(&str, Minute, Minute)]) -> Result<Self, SelectionError> {
        Self::new(
            periods
                .iter()
                .map(|&(name, first, last)| {
                    let starts = (first..=last).step_by(SLOT_MINUTES as usize).collect();
                    (name.to_string(), starts)
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&TimeSlot> {
        self.slots.get(index)
    }

    pub fn period_name(&self, slot: &TimeSlot) -> &str {
        self.periods.get(slot.period).map_or("", String::as_str)
    }

    /// Slots grouped under their period name, in order.
    pub fn periods(&self) -> impl Iterator<Item = (&str, &[TimeSlot])> {
        self.periods.iter().enumerate().map(|(p, name)| {
            let from = self.slots.partition_point(|s| s.period < p);
            let to = self.slots.partition_point(|s| s.period <= p);
            (name.as_str(), &self.slots[from..to])
        })
    }

    /// The slot starting exactly at `time`.
    pub fn slot_at(&self, time: NaiveTime) -> Option<&TimeSlot> {
        let m = minute_of_day(time);
        self.slots
            .binary_search_by_key(&m, |s| s.start)
            .ok()
            .map(|i| &self.slots[i])
    }
}

// =============================================================================
// UNAVAILABILITY CACHE
// =============================================================================

/// Proof that a refresh was requested. Only the newest ticket may land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    pub epoch: u64,
    pub room_id: String,
    pub date: NaiveDate,
}

/// Cached reservations for the session's current (room, date).
#[derive(Debug, Clone, Default)]
pub struct UnavailabilityCache {
    epoch: u64,
    key: Option<(String, NaiveDate)>,
    reservations: Vec<Reservation>,
    loaded: bool,
}

impl UnavailabilityCache {
    /// Point the cache at a new (room, date) and hand out a ticket for the fetch.
    /// Any ticket issued earlier becomes stale.
    pub fn begin(&mut self, room_id: &str, date: NaiveDate) -> RefreshTicket {
        self.epoch += 1;
        self.key = Some((room_id.to_string(), date));
        self.reservations.clear();
        self.loaded = false;
        RefreshTicket { epoch: self.epoch, room_id: room_id.to_string(), date }
    }

    /// Store a fetch result. Returns false, and changes nothing, when a newer
    /// ticket has been issued since.
    pub fn apply(&mut self, ticket: &RefreshTicket, reservations: Vec<Reservation>) -> bool {
        if ticket.epoch != self.epoch {
            tracing::debug!(
                stale = ticket.epoch,
                current = self.epoch,
                room = %ticket.room_id,
                "dropping out-of-date unavailability response"
            );
            return false;
        }
        self.reservations = reservations;
        self.loaded = true;
        true
    }

    /// Mark the cached data stale without moving to another (room, date).
    pub fn invalidate(&mut self) {
        self.epoch += 1;
        self.loaded = false;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn key(&self) -> Option<(&str, NaiveDate)> {
        self.key.as_ref().map(|(room, date)| (room.as_str(), *date))
    }

    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    /// The cached reservation that blocks `span`, if any.
    pub fn conflict_for(&self, span: &Span) -> Option<&Reservation> {
        first_conflict(&self.reservations, span)
    }

    pub fn is_slot_unavailable(&self, slot: &TimeSlot) -> bool {
        self.conflict_for(&slot.window()).is_some()
    }
}

// =============================================================================
// STATE MACHINE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Empty,
    PartialStart {
        start: usize,
    },
    Complete {
        start: usize,
        end: usize,
    },
}

/// The user's in-progress slot selection. Indices refer to a [`SlotLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotSelection {
    state: SelectionState,
}

impl SlotSelection {
    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn clear(&mut self) {
        self.state = SelectionState::Empty;
    }

    /// Apply a click on the slot at `index`. On error the state is unchanged.
    ///
    /// A later slot S completes the selection as `[start, S)`: only the slots
    /// before S are checked against the cache, never S itself, so a
    /// reservation that begins exactly at S does not block it.
    pub fn click(
        &mut self,
        layout: &SlotLayout,
        cache: &UnavailabilityCache,
        index: usize,
    ) -> Result<SelectionState, SelectionError> {
        let slot = *layout
            .get(index)
            .ok_or_else(|| SelectionError::UnknownSlot(format!("#{index}")))?;

        let next = match self.state {
            SelectionState::PartialStart { start } if index > start => {
                check_range(layout, cache, start, index)?;
                SelectionState::Complete { start, end: index }
            }
            SelectionState::PartialStart { start } if index == start => {
                if index + 1 < layout.len() {
                    check_range(layout, cache, start, index + 1)?;
                    SelectionState::Complete { start, end: index + 1 }
                } else {
                    check_slot(cache, &slot)?;
                    SelectionState::PartialStart { start: index }
                }
            }
            // Empty, an earlier slot than the pending start, or restarting after Complete.
            _ => {
                check_slot(cache, &slot)?;
                SelectionState::PartialStart { start: index }
            }
        };
        self.state = next;
        Ok(next)
    }

    /// `(start, end)` times once both clicks are in.
    pub fn range(&self, layout: &SlotLayout) -> Option<(NaiveTime, NaiveTime)> {
        match self.state {
            SelectionState::Complete { start, end } => {
                Some((layout.get(start)?.time(), layout.get(end)?.time()))
            }
            _ => None,
        }
    }
}

fn check_slot(cache: &UnavailabilityCache, slot: &TimeSlot) -> Result<(), SelectionError> {
    match cache.conflict_for(&slot.window()) {
        Some(r) => Err(SelectionError::SlotUnavailable {
            slot: slot.time(),
            reserved_by: r.name.clone(),
            until: r.end,
        }),
        None => Ok(()),
    }
}

/// Everything from the start slot up to (not including) the end boundary must be free.
fn check_range(
    layout: &SlotLayout,
    cache: &UnavailabilityCache,
    start: usize,
    end: usize,
) -> Result<(), SelectionError> {
    let (Some(from), Some(to)) = (layout.get(start), layout.get(end)) else {
        return Err(SelectionError::UnknownSlot(format!("#{end}")));
    };
    match cache.conflict_for(&Span::new(from.start, to.start)) {
        Some(r) => Err(SelectionError::RangeContainsReserved {
            occupied_start: r.start,
            occupied_end: r.end,
            reserved_by: r.name.clone(),
        }),
        None => Ok(()),
    }
}
