use crate::model::*;

// ── Free-window computation ───────────────────────────────────────

/// Free sub-intervals of `window` once the day's reservations are taken out.
pub fn free_spans(reservations: &[Reservation], window: &Span) -> Vec<Span> {
    let mut busy: Vec<Span> = reservations
        .iter()
        .map(Reservation::span)
        .filter(|s| s.start < s.end && s.overlaps(window))
        .collect();
    busy.sort_by_key(|s| s.start);
    let busy = merge_overlapping(&busy);
    subtract_intervals(&[*window], &busy)
}

/// Collapse busy spans, sorted by start, into disjoint runs. Spans that touch
/// at a minute boundary are joined: there is no bookable gap between them.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut runs: Vec<Span> = Vec::with_capacity(sorted.len());
    for &busy in sorted {
        match runs.last_mut() {
            Some(run) if busy.start <= run.end => run.end = run.end.max(busy.end),
            _ => runs.push(busy),
        }
    }
    runs
}

/// Minutes of each `windows` span not covered by `busy`. Both sorted by start;
/// `busy` must already be disjoint (see [`merge_overlapping`]).
pub fn subtract_intervals(windows: &[Span], busy: &[Span]) -> Vec<Span> {
    let mut free = Vec::new();
    let mut first_relevant = 0;

    for window in windows {
        while busy.get(first_relevant).is_some_and(|b| b.end <= window.start) {
            first_relevant += 1;
        }

        let mut cursor = window.start;
        for taken in busy[first_relevant..].iter().take_while(|b| b.start < window.end) {
            if taken.start > cursor {
                free.push(Span::new(cursor, taken.start));
            }
            cursor = cursor.max(taken.end);
        }
        if cursor < window.end {
            free.push(Span::new(cursor, window.end));
        }
    }

    free
}
