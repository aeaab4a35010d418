use tracing::info;

use crate::config::EnrichmentPolicy;
use crate::model::*;
use crate::observability::{self, RESERVATIONS_CREATED_TOTAL, VALIDATION_REJECTIONS_TOTAL};
use crate::store::{ReservationStore, StoreError};

use super::conflict::{backoff, validate_party};
use super::{AvailabilityChecker, BookingError, ConflictReport};

impl<S: ReservationStore> AvailabilityChecker<S> {
    /// Re-check and create. The re-check narrows but does not close the
    /// window in which a concurrent booking can slip in; a store-side
    /// exclusion violation is reported as the conflict it is.
    pub async fn book(&self, reservation: NewReservation) -> Result<Reservation, BookingError> {
        validate_party(&reservation.name, reservation.description.as_deref()).inspect_err(|e| {
            metrics::counter!(VALIDATION_REJECTIONS_TOTAL, "kind" => e.kind()).increment(1);
        })?;
        let request = reservation.request();
        self.check(&request).await?;

        match observability::timed("create", self.store.create(reservation)).await {
            Ok(created) => {
                metrics::counter!(RESERVATIONS_CREATED_TOTAL).increment(1);
                info!(
                    id = %created.id,
                    room = %created.room_id,
                    date = %created.date,
                    start = %format_hhmm(created.start),
                    end = %format_hhmm(created.end),
                    "reservation created"
                );
                Ok(created)
            }
            Err(StoreError::ExclusionViolation(detail)) => {
                tracing::warn!(room = %request.room_id, "store rejected overlapping insert: {detail}");
                match self
                    .find_conflict(&request.room_id, request.date, request.start, request.end)
                    .await?
                {
                    Some(conflicting) => Err(BookingError::Conflict(Box::new(ConflictReport {
                        room_id: request.room_id.clone(),
                        room_name: None,
                        conflicting,
                        alternatives: self.alternatives(&request).await,
                    }))),
                    None => Err(StoreError::ExclusionViolation(detail).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Wait for the store to fill `calendar_link`. Polls with exponential
    /// backoff and gives up after the configured timeout.
    pub async fn await_enrichment(&self, reservation: Reservation) -> Result<Reservation, BookingError> {
        if reservation.calendar_link.is_some() {
            return Ok(reservation);
        }
        let policy = self.config.enrichment;
        let id = reservation.id;

        let outcome = tokio::time::timeout(policy.timeout, self.poll_enrichment(&id, policy)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(%id, "calendar link not available after {:?}", policy.timeout);
                Err(BookingError::EnrichmentTimeout { id })
            }
        }
    }

    async fn poll_enrichment(&self, id: &str, policy: EnrichmentPolicy) -> Result<Reservation, BookingError> {
        let mut delay = policy.initial_delay;
        loop {
            tokio::time::sleep(delay).await;
            if let Some(found) = observability::timed("get", self.store.get(id)).await?
                && found.calendar_link.is_some() {
                    return Ok(found);
                }
            delay = backoff(delay, policy.max_delay);
        }
    }
}
