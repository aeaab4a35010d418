use chrono::NaiveDateTime;

use crate::config::BookingConfig;
use crate::limits::*;
use crate::model::*;

use super::ValidationError;

pub(crate) fn now_local() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// The reservation blocking `span`, if any. With several candidates the
/// earliest start wins, then the lowest id, independent of store order.
pub fn first_conflict<'a>(reservations: &'a [Reservation], span: &Span) -> Option<&'a Reservation> {
    reservations
        .iter()
        .filter(|r| r.span().overlaps(span))
        .min_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)))
}

/// Check a request against the clock and the configured caps.
/// Runs before any store call. Returns the request's span on success.
pub fn validate_request(
    request: &BookingRequest,
    now: NaiveDateTime,
    config: &BookingConfig,
) -> Result<Span, ValidationError> {
    let today = now.date();
    if request.date < today {
        return Err(ValidationError::DateInPast { date: request.date });
    }
    if request.date == today {
        let grace = chrono::Duration::seconds(config.grace_secs);
        if request.date.and_time(request.start) < now - grace {
            return Err(ValidationError::StartInPast { start: request.start });
        }
    }
    let span = Span::from_times(request.start, request.end).ok_or(ValidationError::StartNotBeforeEnd {
        start: request.start,
        end: request.end,
    })?;
    if span.duration_minutes() > config.max_span_minutes {
        return Err(ValidationError::SpanTooLong {
            minutes: span.duration_minutes(),
            max_minutes: config.max_span_minutes,
        });
    }
    Ok(span)
}

/// Name and description checks for a reservation about to be created.
pub(crate) fn validate_party(name: &str, description: Option<&str>) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong { field: "name", max: MAX_NAME_LEN });
    }
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        return Err(ValidationError::TooLong {
            field: "description",
            max: MAX_DESCRIPTION_LEN,
        });
    }
    Ok(())
}

/// Next poll delay: doubled, capped.
pub(crate) fn backoff(current: std::time::Duration, max: std::time::Duration) -> std::time::Duration {
    current.saturating_mul(2).min(max)
}
