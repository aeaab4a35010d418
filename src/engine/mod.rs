mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
#[cfg(test)]
mod tests;

pub use availability::{free_spans, merge_overlapping, subtract_intervals};
pub use conflict::{first_conflict, validate_request};
pub use error::{BookingError, ConflictReport, ValidationError};

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::config::BookingConfig;
use crate::store::ReservationStore;

/// Decides whether a (room, date, time range) booking is legal.
///
/// Every check goes back to the store; nothing is cached here. The store
/// offers no locking, so two checkers can both see "free" and both insert.
/// Closing that gap takes an exclusion constraint in the store itself.
pub struct AvailabilityChecker<S: ReservationStore> {
    store: Arc<S>,
    config: BookingConfig,
    clock: fn() -> NaiveDateTime,
}

impl<S: ReservationStore> AvailabilityChecker<S> {
    pub fn new(store: Arc<S>, config: BookingConfig) -> Self {
        Self {
            store,
            config,
            clock: conflict::now_local,
        }
    }

    /// Replace the wall clock used for "today" and "now".
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }
}
