use chrono::{NaiveDate, NaiveTime};
use futures::{StreamExt, TryStreamExt, stream};

use crate::limits::MAX_CONCURRENT_ROOM_CHECKS;
use crate::model::*;
use crate::observability::{self, CONFLICT_CHECKS_TOTAL, VALIDATION_REJECTIONS_TOTAL};
use crate::store::ReservationStore;

use super::availability::free_spans;
use super::conflict::{first_conflict, validate_request};
use super::{AvailabilityChecker, BookingError, ConflictReport, ValidationError};

impl<S: ReservationStore> AvailabilityChecker<S> {
    /// The existing reservation that overlaps `[start, end)` on this room and
    /// date, or `None`. A store failure is an error, never "available".
    pub async fn find_conflict(
        &self,
        room_id: &str,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Option<Reservation>, BookingError> {
        let span = Span::from_times(start, end).ok_or(ValidationError::StartNotBeforeEnd { start, end })?;
        let existing = match observability::timed(
            "list_by_room_and_date",
            self.store.list_by_room_and_date(room_id, date),
        )
        .await
        {
            Ok(existing) => existing,
            Err(e) => {
                metrics::counter!(CONFLICT_CHECKS_TOTAL, "outcome" => "error").increment(1);
                tracing::warn!(room = room_id, %date, "availability check failed: {e}");
                return Err(e.into());
            }
        };

        let conflict = first_conflict(&existing, &span).cloned();
        let outcome = if conflict.is_some() { "conflict" } else { "free" };
        metrics::counter!(CONFLICT_CHECKS_TOTAL, "outcome" => outcome).increment(1);
        tracing::debug!(
            room = room_id,
            %date,
            start = %format_hhmm(start),
            end = %format_hhmm(end),
            checked = existing.len(),
            outcome,
            "conflict check"
        );
        Ok(conflict)
    }

    /// Catalog rooms with no conflict in `[start, end)`, in catalog order.
    /// A fresh scan every call; meant for small catalogs.
    pub async fn find_available_rooms(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Vec<Room>, BookingError> {
        let rooms = observability::timed("list_rooms", self.store.list_rooms()).await?;
        let verdicts: Vec<(Room, bool)> = stream::iter(rooms)
            .map(|room| async move {
                let conflict = self.find_conflict(&room.id, date, start, end).await?;
                Ok::<_, BookingError>((room, conflict.is_none()))
            })
            .buffered(MAX_CONCURRENT_ROOM_CHECKS)
            .try_collect()
            .await?;
        Ok(verdicts
            .into_iter()
            .filter_map(|(room, free)| free.then_some(room))
            .collect())
    }

    /// Free sub-windows of `window` for a room and date.
    pub async fn free_spans(
        &self,
        room_id: &str,
        date: NaiveDate,
        window: Span,
    ) -> Result<Vec<Span>, BookingError> {
        let existing = observability::timed(
            "list_by_room_and_date",
            self.store.list_by_room_and_date(room_id, date),
        )
        .await?;
        Ok(free_spans(&existing, &window))
    }

    /// Full pre-commit check: validation, known room, conflict. On conflict
    /// the report carries the rooms that are free for the same slot instead.
    pub async fn check(&self, request: &BookingRequest) -> Result<Span, BookingError> {
        let span = validate_request(request, self.now(), &self.config).inspect_err(|e| {
            metrics::counter!(VALIDATION_REJECTIONS_TOTAL, "kind" => e.kind()).increment(1);
        })?;

        let rooms = observability::timed("list_rooms", self.store.list_rooms()).await?;
        let Some(room) = rooms.iter().find(|r| r.id == request.room_id) else {
            metrics::counter!(VALIDATION_REJECTIONS_TOTAL, "kind" => "unknown_room").increment(1);
            return Err(ValidationError::UnknownRoom(request.room_id.clone()).into());
        };

        let Some(conflicting) = self
            .find_conflict(&request.room_id, request.date, request.start, request.end)
            .await?
        else {
            return Ok(span);
        };

        Err(BookingError::Conflict(Box::new(ConflictReport {
            room_id: request.room_id.clone(),
            room_name: Some(room.name.clone()),
            conflicting,
            alternatives: self.alternatives(request).await,
        })))
    }

    /// Best effort: a failed search leaves the conflict itself intact.
    pub(super) async fn alternatives(&self, request: &BookingRequest) -> Vec<Room> {
        match self
            .find_available_rooms(request.date, request.start, request.end)
            .await
        {
            Ok(rooms) => rooms
                .into_iter()
                .filter(|r| r.id != request.room_id)
                .collect(),
            Err(e) => {
                tracing::warn!(room = %request.room_id, "alternatives search failed: {e}");
                Vec::new()
            }
        }
    }
}
