//! Reservation store: the remote collaborator the engine reads from and writes to.
//!
//! The engine never talks to a database directly. Everything it needs is the
//! four calls on [`ReservationStore`]; [`memory::InMemoryStore`] backs tests and
//! demos, [`rest::RestStore`] speaks PostgREST to the real backend.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::model::{NewReservation, Reservation, Room};

pub use memory::InMemoryStore;
pub use rest::RestStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request never produced a response (DNS, TLS, timeout, reset).
    #[error("store request failed: {0}")]
    Request(String),

    /// The store answered with a non-success status.
    #[error("store responded with status {status}")]
    Status { status: u16, body: String },

    /// The response arrived but could not be understood.
    #[error("malformed store data: {0}")]
    Malformed(String),

    /// The store's no-overlap constraint rejected an insert.
    #[error("exclusion constraint rejected reservation: {0}")]
    ExclusionViolation(String),
}

impl StoreError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_STORE_REQUEST",
            Self::Status { .. } => "E_STORE_STATUS",
            Self::Malformed(_) => "E_STORE_MALFORMED",
            Self::ExclusionViolation(_) => "E_STORE_EXCLUSION",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// All reservations for one room on one date, in the store's natural order.
    async fn list_by_room_and_date(&self, room_id: &str, date: NaiveDate)
    -> Result<Vec<Reservation>, StoreError>;

    /// Insert a reservation. The store assigns `id` and may fill derived
    /// fields (`calendar_link`) later.
    async fn create(&self, reservation: NewReservation) -> Result<Reservation, StoreError>;

    /// The room catalog, in display order.
    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError>;

    /// Re-read a single reservation. `Ok(None)` when the id is unknown.
    async fn get(&self, id: &str) -> Result<Option<Reservation>, StoreError>;
}

/// Reject rows that would break the engine's `start < end` assumption.
pub(crate) fn check_row(reservation: &Reservation) -> Result<(), StoreError> {
    if reservation.start >= reservation.end {
        return Err(StoreError::Malformed(format!(
            "reservation {} ends before it starts",
            reservation.id
        )));
    }
    Ok(())
}
