use crate::model::Minute;

/// Width of one selectable slot.
pub const SLOT_MINUTES: Minute = 30;

/// Default cap on a single reservation's span (12 hours).
pub const DEFAULT_MAX_SPAN_MINUTES: Minute = 12 * 60;

/// How far in the past a same-day start may lie before it is rejected.
pub const DEFAULT_GRACE_SECS: i64 = 60;

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Per-room conflict checks in flight during an alternatives search.
pub const MAX_CONCURRENT_ROOM_CHECKS: usize = 8;

pub const DEFAULT_ENRICH_INITIAL_MS: u64 = 250;
pub const DEFAULT_ENRICH_MAX_MS: u64 = 2_000;
pub const DEFAULT_ENRICH_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
