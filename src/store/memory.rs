use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use ulid::Ulid;

use crate::config::BookingConfig;
use crate::model::*;

use super::{ReservationStore, StoreError, check_row};

/// How the store fills `calendar_link` after an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrichment {
    /// The creation response already carries the link.
    Immediate,
    /// The link shows up after this many `get` calls for the reservation.
    AfterReads(u32),
    /// The link never shows up.
    Never,
}

type DayKey = (String, NaiveDate);

/// Process-local store. Reservations are bucketed per (room, date) so the
/// exclusion check and the insert happen under the same shard lock.
pub struct InMemoryStore {
    rooms: Vec<Room>,
    days: DashMap<DayKey, Vec<Reservation>>,
    /// Reverse lookup: reservation id → bucket
    by_id: DashMap<String, DayKey>,
    /// Reservation id → remaining reads before its link appears
    pending_links: DashMap<String, u32>,
    enforce_exclusion: bool,
    enrichment: Enrichment,
    offline: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(crate::config::default_catalog())
    }
}

impl InMemoryStore {
    pub fn new(rooms: Vec<Room>) -> Self {
        Self {
            rooms,
            days: DashMap::new(),
            by_id: DashMap::new(),
            pending_links: DashMap::new(),
            enforce_exclusion: false,
            enrichment: Enrichment::Immediate,
            offline: AtomicBool::new(false),
        }
    }

    /// Default catalog, with the no-overlap constraint when the config asks for it.
    pub fn from_config(config: &BookingConfig) -> Self {
        Self::default().with_exclusion(config.enforce_exclusion)
    }

    /// Reject overlapping inserts for the same room and date atomically.
    pub fn with_exclusion(mut self, enforce: bool) -> Self {
        self.enforce_exclusion = enforce;
        self
    }

    pub fn with_enrichment(mut self, enrichment: Enrichment) -> Self {
        self.enrichment = enrichment;
        self
    }

    /// While offline every call fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Seed a reservation as-is, bypassing the exclusion check.
    pub fn insert(&self, reservation: Reservation) {
        let key = (reservation.room_id.clone(), reservation.date);
        self.by_id.insert(reservation.id.clone(), key.clone());
        self.days.entry(key).or_default().push(reservation);
    }

    pub fn reservation_count(&self) -> usize {
        self.by_id.len()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Request("store offline".into()));
        }
        Ok(())
    }
}

fn calendar_link(id: &str) -> String {
    format!("https://calendar.local/reservations/{id}")
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn list_by_room_and_date(
        &self,
        room_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, StoreError> {
        self.ensure_online()?;
        let key = (room_id.to_string(), date);
        Ok(self
            .days
            .get(&key)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }

    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        self.ensure_online()?;
        let id = Ulid::new().to_string();
        let mut reservation = Reservation {
            id: id.clone(),
            room_id: new.room_id,
            date: new.date,
            start: new.start,
            end: new.end,
            name: new.name,
            description: new.description,
            calendar_link: None,
        };
        check_row(&reservation)?;

        let key = (reservation.room_id.clone(), reservation.date);
        let mut day = self.days.entry(key.clone()).or_default();
        if self.enforce_exclusion {
            let span = reservation.span();
            if let Some(existing) = day.iter().find(|r| r.span().overlaps(&span)) {
                return Err(StoreError::ExclusionViolation(format!(
                    "overlaps reservation {}",
                    existing.id
                )));
            }
        }
        match self.enrichment {
            Enrichment::Immediate => reservation.calendar_link = Some(calendar_link(&id)),
            Enrichment::AfterReads(n) => {
                self.pending_links.insert(id.clone(), n);
            }
            Enrichment::Never => {}
        }
        day.push(reservation.clone());
        drop(day);
        self.by_id.insert(id, key);
        Ok(reservation)
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        self.ensure_online()?;
        Ok(self.rooms.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Reservation>, StoreError> {
        self.ensure_online()?;
        let Some(key) = self.by_id.get(id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        let link_ready = match self.pending_links.get_mut(id) {
            Some(mut remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            None => false,
        };
        let Some(mut day) = self.days.get_mut(&key) else {
            return Ok(None);
        };
        let Some(found) = day.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if link_ready {
            found.calendar_link = Some(calendar_link(id));
            self.pending_links.remove(id);
        }
        Ok(Some(found.clone()))
    }
}
