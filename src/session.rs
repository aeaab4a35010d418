//! One user's booking interaction, as an explicit value.
//!
//! The session owns the chosen room and date, the responsible party, the slot
//! selection and the cached unavailability for that (room, date). Callers
//! thread it through transitions; nothing here is shared or global.

use chrono::{NaiveDate, NaiveTime};

use crate::engine::{AvailabilityChecker, BookingError};
use crate::model::*;
use crate::observability::STALE_SELECTIONS_TOTAL;
use crate::selection::*;
use crate::store::{ReservationStore, StoreError};

#[derive(Debug, Clone)]
pub struct BookingSession {
    layout: SlotLayout,
    room_id: Option<String>,
    date: Option<NaiveDate>,
    name: String,
    description: String,
    selection: SlotSelection,
    cache: UnavailabilityCache,
}

impl BookingSession {
    pub fn new(layout: SlotLayout) -> Self {
        Self {
            layout,
            room_id: None,
            date: None,
            name: String::new(),
            description: String::new(),
            selection: SlotSelection::default(),
            cache: UnavailabilityCache::default(),
        }
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn selection(&self) -> SelectionState {
        self.selection.state()
    }

    pub fn selected_range(&self) -> Option<(NaiveTime, NaiveTime)> {
        self.selection.range(&self.layout)
    }

    pub fn cache(&self) -> &UnavailabilityCache {
        &self.cache
    }

    /// True once the cached unavailability is missing or out of date.
    pub fn needs_refresh(&self) -> bool {
        self.room_id.is_some() && self.date.is_some() && !self.cache.is_loaded()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Switch rooms. Drops the selection and returns the ticket for the
    /// new unavailability fetch once both room and date are known.
    pub fn select_room(&mut self, room_id: impl Into<String>) -> Option<RefreshTicket> {
        self.room_id = Some(room_id.into());
        self.selection.clear();
        self.begin_refresh()
    }

    /// Switch dates. Same contract as [`Self::select_room`].
    pub fn select_date(&mut self, date: NaiveDate) -> Option<RefreshTicket> {
        self.date = Some(date);
        self.selection.clear();
        self.begin_refresh()
    }

    /// Start a fetch for the current (room, date). Earlier tickets go stale.
    pub fn begin_refresh(&mut self) -> Option<RefreshTicket> {
        let room_id = self.room_id.as_deref()?;
        let date = self.date?;
        Some(self.cache.begin(room_id, date))
    }

    /// Land a fetch result. Returns false for a superseded ticket.
    pub fn apply_refresh(&mut self, ticket: &RefreshTicket, reservations: Vec<Reservation>) -> bool {
        self.cache.apply(ticket, reservations)
    }

    /// Begin, fetch and apply in one go.
    pub async fn refresh<S: ReservationStore + ?Sized>(&mut self, store: &S) -> Result<bool, StoreError> {
        let Some(ticket) = self.begin_refresh() else {
            return Ok(false);
        };
        let (ticket, reservations) = fetch_unavailability(store, ticket).await?;
        Ok(self.apply_refresh(&ticket, reservations))
    }

    /// Slots the cache currently marks as taken, for disabling in the UI.
    pub fn unavailable_slots(&self) -> Vec<TimeSlot> {
        self.layout
            .slots()
            .iter()
            .filter(|slot| self.cache.is_slot_unavailable(slot))
            .copied()
            .collect()
    }

    /// Feed a slot click into the selection.
    pub fn click(&mut self, time: NaiveTime) -> Result<SelectionState, SelectionError> {
        if self.room_id.is_none() || self.date.is_none() {
            return Err(SelectionError::NoRoomOrDate);
        }
        let index = self
            .layout
            .slot_at(time)
            .ok_or_else(|| SelectionError::UnknownSlot(format_hhmm(time)))?
            .index;
        self.selection.click(&self.layout, &self.cache, index)
    }

    pub fn clear(&mut self) {
        self.selection.clear();
    }

    /// The reservation this session would create right now.
    pub fn draft(&self) -> Result<NewReservation, BookingError> {
        let (Some(room_id), Some(date)) = (self.room_id.clone(), self.date) else {
            return Err(SelectionError::NoRoomOrDate.into());
        };
        let (start, end) = self.selected_range().ok_or(SelectionError::Incomplete)?;
        if self.name.trim().is_empty() {
            return Err(crate::engine::ValidationError::MissingName.into());
        }
        let description = self.description.trim();
        Ok(NewReservation {
            name: self.name.trim().to_string(),
            room_id,
            date,
            start,
            end,
            description: (!description.is_empty()).then(|| description.to_string()),
        })
    }

    /// Commit the selection. The store is re-checked first; if someone else
    /// booked the slot since the cache was filled the selection is dropped and
    /// the conflict comes back as [`BookingError::StaleSelection`].
    pub async fn submit<S: ReservationStore>(
        &mut self,
        checker: &AvailabilityChecker<S>,
    ) -> Result<Reservation, BookingError> {
        let draft = self.draft()?;
        match checker.book(draft).await {
            Ok(created) => {
                self.selection.clear();
                self.description.clear();
                self.cache.invalidate();
                Ok(created)
            }
            Err(BookingError::Conflict(report)) => {
                metrics::counter!(STALE_SELECTIONS_TOTAL).increment(1);
                tracing::warn!(
                    room = %report.room_id,
                    taken_by = %report.conflicting.id,
                    "selection went stale before submit"
                );
                self.selection.clear();
                self.cache.invalidate();
                Err(BookingError::StaleSelection(report))
            }
            Err(e) => Err(e),
        }
    }
}

/// Fetch the reservations a ticket asks for, handing the ticket back so the
/// result can be applied (or discarded) by whoever owns the session.
pub async fn fetch_unavailability<S: ReservationStore + ?Sized>(
    store: &S,
    ticket: RefreshTicket,
) -> Result<(RefreshTicket, Vec<Reservation>), StoreError> {
    let reservations = store.list_by_room_and_date(&ticket.room_id, ticket.date).await?;
    Ok((ticket, reservations))
}
