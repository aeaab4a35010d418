use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::*;
use crate::config::{BookingConfig, EnrichmentPolicy};
use crate::model::*;
use crate::store::memory::Enrichment;
use crate::store::{InMemoryStore, ReservationStore, StoreError};

fn d(raw: &str) -> NaiveDate {
    parse_date(raw).unwrap()
}

fn t(raw: &str) -> NaiveTime {
    parse_time(raw).unwrap()
}

/// 2025-06-01 08:00, the "now" for every checker built here.
fn fixed_now() -> NaiveDateTime {
    d("2025-06-01").and_time(t("08:00"))
}

fn room(id: &str) -> Room {
    Room {
        id: id.into(),
        name: format!("Room {id}"),
        capacity: 4,
        description: String::new(),
        tags: Vec::new(),
        image: None,
    }
}

fn reservation(id: &str, room_id: &str, date: &str, start: &str, end: &str, name: &str) -> Reservation {
    Reservation {
        id: id.into(),
        room_id: room_id.into(),
        date: d(date),
        start: t(start),
        end: t(end),
        name: name.into(),
        description: None,
        calendar_link: None,
    }
}

fn new_reservation(room_id: &str, date: &str, start: &str, end: &str) -> NewReservation {
    NewReservation {
        name: "Ana".into(),
        room_id: room_id.into(),
        date: d(date),
        start: t(start),
        end: t(end),
        description: Some("planning".into()),
    }
}

fn checker_with(store: InMemoryStore, config: BookingConfig) -> AvailabilityChecker<InMemoryStore> {
    AvailabilityChecker::new(Arc::new(store), config).with_clock(fixed_now)
}

fn checker(store: InMemoryStore) -> AvailabilityChecker<InMemoryStore> {
    checker_with(store, BookingConfig::default())
}

/// R1..R3 with one reservation on R1, 09:00-10:00.
fn seeded() -> AvailabilityChecker<InMemoryStore> {
    let store = InMemoryStore::new(vec![room("R1"), room("R2"), room("R3")]);
    store.insert(reservation("a", "R1", "2025-06-01", "09:00", "10:00", "Carla"));
    checker(store)
}

fn request(room_id: &str, date: &str, start: &str, end: &str) -> BookingRequest {
    BookingRequest {
        room_id: room_id.into(),
        date: d(date),
        start: t(start),
        end: t(end),
    }
}

// ── find_conflict ─────────────────────────────────────────────

#[tokio::test]
async fn overlapping_request_returns_existing() {
    let c = seeded();
    let found = c
        .find_conflict("R1", d("2025-06-01"), t("09:30"), t("10:30"))
        .await
        .unwrap();
    assert_eq!(found.map(|r| r.id), Some("a".to_string()));
}

#[tokio::test]
async fn adjacent_request_is_free() {
    let c = seeded();
    let found = c
        .find_conflict("R1", d("2025-06-01"), t("10:00"), t("10:30"))
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn boundary_cases_around_nine() {
    let store = InMemoryStore::new(vec![room("R1"), room("R2"), room("R3")]);
    store.insert(reservation("after", "R1", "2025-06-01", "09:30", "10:00", "x"));
    store.insert(reservation("before", "R2", "2025-06-01", "08:30", "09:00", "y"));
    store.insert(reservation("straddle", "R3", "2025-06-01", "08:45", "09:15", "z"));
    let c = checker(store);

    let date = d("2025-06-01");
    assert!(c.find_conflict("R1", date, t("09:00"), t("09:30")).await.unwrap().is_none());
    assert!(c.find_conflict("R2", date, t("09:00"), t("09:30")).await.unwrap().is_none());
    let hit = c.find_conflict("R3", date, t("09:00"), t("09:30")).await.unwrap();
    assert_eq!(hit.map(|r| r.id), Some("straddle".to_string()));
}

#[tokio::test]
async fn other_dates_and_rooms_do_not_conflict() {
    let c = seeded();
    assert!(c.find_conflict("R1", d("2025-06-02"), t("09:00"), t("10:00")).await.unwrap().is_none());
    assert!(c.find_conflict("R2", d("2025-06-01"), t("09:00"), t("10:00")).await.unwrap().is_none());
}

#[tokio::test]
async fn tie_break_is_earliest_start_then_lowest_id() {
    let store = InMemoryStore::new(vec![room("R1")]);
    // Inserted in the "wrong" order on purpose.
    store.insert(reservation("z", "R1", "2025-06-01", "10:00", "11:00", "late"));
    store.insert(reservation("m", "R1", "2025-06-01", "09:00", "09:45", "second"));
    store.insert(reservation("b", "R1", "2025-06-01", "09:00", "09:30", "first"));
    let c = checker(store);

    let found = c
        .find_conflict("R1", d("2025-06-01"), t("08:00"), t("12:00"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, "b");
}

#[tokio::test]
async fn inverted_range_is_a_validation_error() {
    let c = seeded();
    let err = c
        .find_conflict("R1", d("2025-06-01"), t("10:00"), t("10:00"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::Validation(ValidationError::StartNotBeforeEnd { .. })
    ));
}

#[tokio::test]
async fn offline_store_fails_closed() {
    let c = seeded();
    c.store().set_offline(true);
    let err = c
        .find_conflict("R1", d("2025-06-01"), t("11:00"), t("12:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::StoreUnavailable(StoreError::Request(_))));
    assert!(err.retryable());
    assert_eq!(err.error_code(), "E_STORE_UNAVAILABLE");
}

// ── find_available_rooms ──────────────────────────────────────

#[tokio::test]
async fn available_rooms_keep_catalog_order() {
    let c = seeded();
    let rooms = c
        .find_available_rooms(d("2025-06-01"), t("09:00"), t("09:30"))
        .await
        .unwrap();
    let ids: Vec<_> = rooms.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["R2", "R3"]);
}

#[tokio::test]
async fn available_rooms_is_idempotent() {
    let c = seeded();
    let date = d("2025-06-01");
    let first = c.find_available_rooms(date, t("09:30"), t("11:00")).await.unwrap();
    let second = c.find_available_rooms(date, t("09:30"), t("11:00")).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn available_rooms_scans_default_catalog() {
    let c = checker(InMemoryStore::default());
    let rooms = c
        .find_available_rooms(d("2025-06-01"), t("09:00"), t("10:00"))
        .await
        .unwrap();
    assert_eq!(rooms.len(), 5);
    assert_eq!(rooms[0].id, "reunioes");
}

#[tokio::test]
async fn available_rooms_propagates_store_failure() {
    let c = seeded();
    c.store().set_offline(true);
    let res = c.find_available_rooms(d("2025-06-01"), t("09:00"), t("10:00")).await;
    assert!(matches!(res, Err(BookingError::StoreUnavailable(_))));
}

// ── validate_request ──────────────────────────────────────────

#[test]
fn yesterday_is_rejected_whatever_the_times() {
    let config = BookingConfig::default();
    for (start, end) in [("09:00", "10:00"), ("23:00", "23:30"), ("00:00", "00:30")] {
        let err = validate_request(&request("R1", "2025-05-31", start, end), fixed_now(), &config).unwrap_err();
        assert_eq!(err, ValidationError::DateInPast { date: d("2025-05-31") });
    }
}

#[test]
fn thirteen_hours_exceeds_cap() {
    let err = validate_request(
        &request("R1", "2025-06-02", "08:00", "21:00"),
        fixed_now(),
        &BookingConfig::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        ValidationError::SpanTooLong {
            minutes: 780,
            max_minutes: 720
        }
    );
}

#[test]
fn exactly_twelve_hours_is_allowed() {
    let span = validate_request(
        &request("R1", "2025-06-02", "08:00", "20:00"),
        fixed_now(),
        &BookingConfig::default(),
    )
    .unwrap();
    assert_eq!(span.duration_minutes(), 720);
}

#[test]
fn cap_is_configurable() {
    let config = BookingConfig {
        max_span_minutes: 60,
        ..BookingConfig::default()
    };
    let res = validate_request(&request("R1", "2025-06-02", "08:00", "09:30"), fixed_now(), &config);
    assert!(matches!(res, Err(ValidationError::SpanTooLong { .. })));
}

#[test]
fn start_earlier_today_is_rejected_past_grace() {
    let config = BookingConfig::default();
    let err = validate_request(&request("R1", "2025-06-01", "07:30", "08:30"), fixed_now(), &config).unwrap_err();
    assert_eq!(err, ValidationError::StartInPast { start: t("07:30") });
}

#[test]
fn start_within_grace_is_accepted() {
    let config = BookingConfig::default();
    let now = d("2025-06-01").and_time(NaiveTime::from_hms_opt(8, 0, 45).unwrap());
    assert!(validate_request(&request("R1", "2025-06-01", "08:00", "08:30"), now, &config).is_ok());

    let later = d("2025-06-01").and_time(NaiveTime::from_hms_opt(8, 1, 30).unwrap());
    assert!(validate_request(&request("R1", "2025-06-01", "08:00", "08:30"), later, &config).is_err());
}

#[test]
fn start_not_before_end_is_rejected() {
    let err = validate_request(
        &request("R1", "2025-06-02", "10:00", "09:00"),
        fixed_now(),
        &BookingConfig::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), "start_not_before_end");
}

#[test]
fn past_date_wins_over_other_failures() {
    let err = validate_request(
        &request("R1", "2025-05-01", "10:00", "09:00"),
        fixed_now(),
        &BookingConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::DateInPast { .. }));
}

// ── check ─────────────────────────────────────────────────────

#[tokio::test]
async fn check_reports_conflict_with_alternatives() {
    let c = seeded();
    let err = c.check(&request("R1", "2025-06-01", "09:30", "10:30")).await.unwrap_err();
    let report = err.conflict().unwrap();
    assert_eq!(report.conflicting.id, "a");
    assert_eq!(report.room_name.as_deref(), Some("Room R1"));
    let alternatives: Vec<_> = report.alternatives.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(alternatives, ["R2", "R3"]);
    assert_eq!(err.to_string(), "Room R1 is already reserved by Carla until 10:00");
    assert_eq!(err.error_code(), "E_CONFLICT");
    assert!(!err.retryable());
}

#[tokio::test]
async fn check_rejects_unknown_room() {
    let c = seeded();
    let err = c.check(&request("R9", "2025-06-01", "09:30", "10:30")).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::Validation(ValidationError::UnknownRoom(ref id)) if id == "R9"
    ));
}

#[tokio::test]
async fn check_validates_before_touching_the_store() {
    let c = seeded();
    c.store().set_offline(true);
    let err = c.check(&request("R1", "2025-05-31", "09:00", "10:00")).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(_)));
}

#[tokio::test]
async fn check_returns_span_when_free() {
    let c = seeded();
    let span = c.check(&request("R1", "2025-06-01", "10:00", "11:00")).await.unwrap();
    assert_eq!(span, Span::new(600, 660));
}

// ── book ──────────────────────────────────────────────────────

#[tokio::test]
async fn book_creates_when_free() {
    let c = seeded();
    let created = c.book(new_reservation("R1", "2025-06-01", "10:00", "11:00")).await.unwrap();
    assert_eq!(created.room_id, "R1");
    assert_eq!(created.name, "Ana");
    assert!(created.calendar_link.is_some());
    assert_eq!(c.store().reservation_count(), 2);
}

#[tokio::test]
async fn book_refuses_overlap_and_writes_nothing() {
    let c = seeded();
    let err = c
        .book(new_reservation("R1", "2025-06-01", "09:15", "09:45"))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict(_)));
    assert_eq!(c.store().reservation_count(), 1);
}

#[tokio::test]
async fn book_requires_a_name() {
    let c = seeded();
    let mut new = new_reservation("R1", "2025-06-01", "10:00", "11:00");
    new.name = "   ".into();
    let err = c.book(new).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation(ValidationError::MissingName)));
}

#[tokio::test]
async fn book_caps_description_length() {
    let c = seeded();
    let mut new = new_reservation("R1", "2025-06-01", "10:00", "11:00");
    new.description = Some("x".repeat(501));
    let err = c.book(new).await.unwrap_err();
    assert!(matches!(
        err,
        BookingError::Validation(ValidationError::TooLong { field: "description", .. })
    ));
}

/// Lets the pre-commit check pass and then writes a rival booking before the
/// insert, the way a concurrent client would.
struct RacingStore {
    inner: InMemoryStore,
    rival: Reservation,
}

#[async_trait::async_trait]
impl ReservationStore for RacingStore {
    async fn list_by_room_and_date(&self, room_id: &str, date: NaiveDate) -> Result<Vec<Reservation>, StoreError> {
        self.inner.list_by_room_and_date(room_id, date).await
    }

    async fn create(&self, reservation: NewReservation) -> Result<Reservation, StoreError> {
        if self.inner.reservation_count() == 0 {
            self.inner.insert(self.rival.clone());
        }
        self.inner.create(reservation).await
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        self.inner.list_rooms().await
    }

    async fn get(&self, id: &str) -> Result<Option<Reservation>, StoreError> {
        self.inner.get(id).await
    }
}

#[tokio::test]
async fn exclusion_violation_becomes_conflict() {
    let store = RacingStore {
        inner: InMemoryStore::new(vec![room("R1"), room("R2")]).with_exclusion(true),
        rival: reservation("rival", "R1", "2025-06-01", "10:00", "11:00", "Bruno"),
    };
    let c = AvailabilityChecker::new(Arc::new(store), BookingConfig::default()).with_clock(fixed_now);

    let err = c
        .book(new_reservation("R1", "2025-06-01", "10:30", "11:30"))
        .await
        .unwrap_err();
    let report = err.conflict().unwrap();
    assert_eq!(report.conflicting.id, "rival");
    assert_eq!(report.alternatives.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["R2"]);
    assert_eq!(c.store().inner.reservation_count(), 1);
}

#[tokio::test]
async fn without_exclusion_the_race_double_books() {
    let store = RacingStore {
        inner: InMemoryStore::new(vec![room("R1")]),
        rival: reservation("rival", "R1", "2025-06-01", "10:00", "11:00", "Bruno"),
    };
    let c = AvailabilityChecker::new(Arc::new(store), BookingConfig::default()).with_clock(fixed_now);

    c.book(new_reservation("R1", "2025-06-01", "10:30", "11:30")).await.unwrap();
    assert_eq!(c.store().inner.reservation_count(), 2);
}

// ── await_enrichment ──────────────────────────────────────────

fn quick_policy() -> BookingConfig {
    BookingConfig {
        enrichment: EnrichmentPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            timeout: Duration::from_millis(200),
        },
        ..BookingConfig::default()
    }
}

#[tokio::test]
async fn enrichment_returns_immediately_when_present() {
    let c = seeded();
    let created = c.book(new_reservation("R2", "2025-06-01", "10:00", "11:00")).await.unwrap();
    let link = created.calendar_link.clone();
    let enriched = c.await_enrichment(created).await.unwrap();
    assert_eq!(enriched.calendar_link, link);
}

#[tokio::test]
async fn enrichment_polls_until_link_appears() {
    let store = InMemoryStore::new(vec![room("R1")]).with_enrichment(Enrichment::AfterReads(3));
    let c = checker_with(store, quick_policy());
    let created = c.book(new_reservation("R1", "2025-06-01", "10:00", "11:00")).await.unwrap();
    assert!(created.calendar_link.is_none());

    let enriched = c.await_enrichment(created).await.unwrap();
    assert!(enriched.calendar_link.unwrap().ends_with(&enriched.id));
}

#[tokio::test]
async fn enrichment_times_out() {
    let store = InMemoryStore::new(vec![room("R1")]).with_enrichment(Enrichment::Never);
    let c = checker_with(store, quick_policy());
    let created = c.book(new_reservation("R1", "2025-06-01", "10:00", "11:00")).await.unwrap();
    let id = created.id.clone();

    let err = c.await_enrichment(created).await.unwrap_err();
    assert!(matches!(err, BookingError::EnrichmentTimeout { id: ref got } if *got == id));
}

// ── free_spans ────────────────────────────────────────────────

#[tokio::test]
async fn free_spans_cut_around_reservations() {
    let store = InMemoryStore::new(vec![room("R1")]);
    store.insert(reservation("a", "R1", "2025-06-01", "09:00", "10:00", "x"));
    store.insert(reservation("b", "R1", "2025-06-01", "09:30", "11:00", "y"));
    store.insert(reservation("c", "R1", "2025-06-01", "14:00", "15:00", "z"));
    let c = checker(store);

    let free = c.free_spans("R1", d("2025-06-01"), Span::new(480, 1080)).await.unwrap();
    assert_eq!(free, vec![Span::new(480, 540), Span::new(660, 840), Span::new(900, 1080)]);
}

#[test]
fn free_spans_ignore_reservations_outside_window() {
    let existing = [reservation("a", "R1", "2025-06-01", "06:00", "07:00", "x")];
    assert_eq!(free_spans(&existing, &Span::new(480, 600)), vec![Span::new(480, 600)]);
}

#[test]
fn merge_then_subtract() {
    let merged = merge_overlapping(&[Span::new(0, 10), Span::new(10, 20), Span::new(30, 40)]);
    assert_eq!(merged, vec![Span::new(0, 20), Span::new(30, 40)]);
    let left = subtract_intervals(&[Span::new(0, 50)], &merged);
    assert_eq!(left, vec![Span::new(20, 30), Span::new(40, 50)]);
}

#[test]
fn busy_span_only_trims_the_windows_it_touches() {
    // 08:00-09:00 and 12:00-14:00 windows; a lunch meeting 11:30-12:30 runs across the gap.
    let busy = merge_overlapping(&[Span::new(690, 750), Span::new(720, 750)]);
    assert_eq!(busy, vec![Span::new(690, 750)]);
    let free = subtract_intervals(&[Span::new(480, 540), Span::new(720, 840)], &busy);
    assert_eq!(free, vec![Span::new(480, 540), Span::new(750, 840)]);
}
