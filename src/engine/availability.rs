use ulid::Ulid;

use crate::model::*;

use super::conflict::{Conflict, ConflictKind};
use super::store::CalendarStore;

// ── Conflict scan ─────────────────────────────────────────────────

/// First occupying booking overlapping `candidate`, in check-in order.
/// `exclude` lets an edited booking ignore its own interval.
pub fn first_booking_conflict(
    store: &CalendarStore,
    candidate: &Span,
    exclude: Option<Ulid>,
) -> Option<Conflict> {
    store
        .calendar
        .overlapping(candidate)
        .filter(|i| i.kind == IntervalKind::Booking && Some(i.id) != exclude)
        .filter_map(|i| store.bookings.get(&i.id))
        .find(|b| b.status.is_occupying())
        .map(|b| Conflict {
            kind: ConflictKind::Booking,
            id: b.id.to_string(),
            label: b.guest.name.clone(),
            span: b.span(),
        })
}

fn first_block_conflict(store: &CalendarStore, candidate: &Span) -> Option<Conflict> {
    store
        .calendar
        .overlapping(candidate)
        .filter(|i| i.kind == IntervalKind::Block)
        .filter_map(|i| store.blocks.get(&i.id))
        .map(|b| Conflict {
            kind: ConflictKind::Block,
            id: b.id.to_string(),
            label: b.reason.clone(),
            span: b.range.to_span(),
        })
        .next()
}

fn first_channel_conflict(store: &CalendarStore, candidate: &Span) -> Option<Conflict> {
    store
        .channel_blocks
        .iter()
        .find(|c| c.range.to_span().overlaps(candidate))
        .map(|c| Conflict {
            kind: ConflictKind::ChannelBlock,
            id: c.uid.clone(),
            label: c.summary.clone().unwrap_or_default(),
            span: c.range.to_span(),
        })
}

/// Bookings first, then operator blocks, then channel blocks; first hit wins.
pub fn check_availability(
    store: &CalendarStore,
    candidate: &Span,
    exclude: Option<Ulid>,
) -> Result<(), Conflict> {
    if let Some(c) = first_booking_conflict(store, candidate, exclude) {
        return Err(c);
    }
    if let Some(c) = first_block_conflict(store, candidate) {
        return Err(c);
    }
    if let Some(c) = first_channel_conflict(store, candidate) {
        return Err(c);
    }
    Ok(())
}

// ── Free ranges ───────────────────────────────────────────────────

/// Maximal free spans inside `window`, for display.
pub fn free_ranges(store: &CalendarStore, window: &Span) -> Vec<Span> {
    let mut taken: Vec<Span> = Vec::new();

    for interval in store.calendar.overlapping(window) {
        let occupying = match interval.kind {
            IntervalKind::Booking => store
                .bookings
                .get(&interval.id)
                .is_some_and(|b| b.status.is_occupying()),
            IntervalKind::Block => true,
        };
        if occupying {
            taken.push(interval.span);
        }
    }
    for c in &store.channel_blocks {
        let span = c.range.to_span();
        if span.overlaps(window) {
            taken.push(span);
        }
    }

    if taken.is_empty() {
        return vec![*window];
    }
    taken.sort_by_key(|s| s.start);
    let taken = merge_overlapping(&taken);
    subtract_intervals(&[*window], &taken)
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::tests::sample_booking;
    use chrono::Utc;

    fn d(s: &str) -> Day {
        s.parse().unwrap()
    }

    fn span(a: &str, b: &str) -> Span {
        Span::new(d(a), d(b))
    }

    fn store_with_booking(check_in: &str, check_out: &str, status: BookingStatus) -> (CalendarStore, Ulid) {
        let mut store = CalendarStore::new();
        let mut b = sample_booking();
        b.check_in = d(check_in);
        b.check_out = d(check_out);
        b.status = status;
        let id = b.id;
        store.apply_event(&Event::BookingCreated { booking: b });
        (store, id)
    }

    fn add_block(store: &mut CalendarStore, start: &str, end: &str, reason: &str) -> Ulid {
        let id = Ulid::new();
        store.apply_event(&Event::BlockCreated {
            block: CalendarBlock {
                id,
                range: BlockRange::new(d(start), d(end)).unwrap(),
                kind: BlockKind::Maintenance,
                reason: reason.into(),
                note: None,
                created: Stamp::new(Utc::now(), "admin"),
            },
        });
        id
    }

    // ── subtract_intervals ────────────────────────────────

    #[test]
    fn subtract_no_overlap() {
        let base = vec![span("2026-01-01", "2026-01-05"), span("2026-01-10", "2026-01-15")];
        let remove = vec![span("2026-01-05", "2026-01-10")];
        assert_eq!(subtract_intervals(&base, &remove), base);
    }

    #[test]
    fn subtract_full_overlap() {
        let base = vec![span("2026-01-05", "2026-01-10")];
        let remove = vec![span("2026-01-01", "2026-01-20")];
        assert!(subtract_intervals(&base, &remove).is_empty());
    }

    #[test]
    fn subtract_middle_punch() {
        let base = vec![span("2026-01-01", "2026-01-31")];
        let remove = vec![span("2026-01-10", "2026-01-12")];
        assert_eq!(
            subtract_intervals(&base, &remove),
            vec![span("2026-01-01", "2026-01-10"), span("2026-01-12", "2026-01-31")]
        );
    }

    #[test]
    fn subtract_multiple_punches() {
        let base = vec![span("2026-01-01", "2026-02-01")];
        let remove = vec![
            span("2026-01-03", "2026-01-05"),
            span("2026-01-10", "2026-01-11"),
            span("2026-01-29", "2026-02-03"),
        ];
        assert_eq!(
            subtract_intervals(&base, &remove),
            vec![
                span("2026-01-01", "2026-01-03"),
                span("2026-01-05", "2026-01-10"),
                span("2026-01-11", "2026-01-29"),
            ]
        );
    }

    // ── merge_overlapping ────────────────────────────────

    #[test]
    fn merge_overlapping_basic() {
        let spans = vec![
            span("2026-01-01", "2026-01-05"),
            span("2026-01-03", "2026-01-08"),
            span("2026-01-10", "2026-01-12"),
        ];
        assert_eq!(
            merge_overlapping(&spans),
            vec![span("2026-01-01", "2026-01-08"), span("2026-01-10", "2026-01-12")]
        );
    }

    #[test]
    fn merge_overlapping_adjacent() {
        let spans = vec![span("2026-01-01", "2026-01-03"), span("2026-01-03", "2026-01-05")];
        assert_eq!(merge_overlapping(&spans), vec![span("2026-01-01", "2026-01-05")]);
    }

    // ── check_availability ───────────────────────────────

    #[test]
    fn overlapping_booking_conflicts() {
        let (store, id) = store_with_booking("2026-01-10", "2026-01-13", BookingStatus::Confirmed);
        let err = check_availability(&store, &span("2026-01-12", "2026-01-14"), None).unwrap_err();
        assert_eq!(err.kind, ConflictKind::Booking);
        assert_eq!(err.id, id.to_string());
        assert_eq!(err.label, "Asha Rao");
        assert_eq!(err.span, span("2026-01-10", "2026-01-13"));
    }

    #[test]
    fn back_to_back_is_free() {
        let (store, _) = store_with_booking("2026-01-10", "2026-01-13", BookingStatus::Confirmed);
        assert!(check_availability(&store, &span("2026-01-13", "2026-01-15"), None).is_ok());
        assert!(check_availability(&store, &span("2026-01-08", "2026-01-10"), None).is_ok());
    }

    #[test]
    fn non_occupying_bookings_ignored() {
        for status in [BookingStatus::Cancelled, BookingStatus::CheckedOut] {
            let (store, _) = store_with_booking("2026-01-10", "2026-01-13", status);
            assert!(check_availability(&store, &span("2026-01-10", "2026-01-13"), None).is_ok());
        }
        for status in [BookingStatus::Active, BookingStatus::CheckedIn] {
            let (store, _) = store_with_booking("2026-01-10", "2026-01-13", status);
            assert!(check_availability(&store, &span("2026-01-10", "2026-01-13"), None).is_err());
        }
    }

    #[test]
    fn exclude_skips_own_booking() {
        let (store, id) = store_with_booking("2026-01-10", "2026-01-13", BookingStatus::Confirmed);
        assert!(check_availability(&store, &span("2026-01-11", "2026-01-15"), Some(id)).is_ok());
    }

    #[test]
    fn one_day_block_conflicts() {
        let mut store = CalendarStore::new();
        let id = add_block(&mut store, "2026-03-10", "2026-03-10", "deep clean");
        let err = check_availability(&store, &span("2026-03-10", "2026-03-11"), None).unwrap_err();
        assert_eq!(err.kind, ConflictKind::Block);
        assert_eq!(err.id, id.to_string());
        assert_eq!(err.span, span("2026-03-10", "2026-03-11"));
        assert!(check_availability(&store, &span("2026-03-11", "2026-03-12"), None).is_ok());
        assert!(check_availability(&store, &span("2026-03-08", "2026-03-10"), None).is_ok());
    }

    #[test]
    fn bookings_reported_before_blocks() {
        let (mut store, id) = store_with_booking("2026-03-12", "2026-03-14", BookingStatus::Confirmed);
        add_block(&mut store, "2026-03-01", "2026-03-20", "renovation");
        let err = check_availability(&store, &span("2026-03-05", "2026-03-15"), None).unwrap_err();
        assert_eq!(err.kind, ConflictKind::Booking);
        assert_eq!(err.id, id.to_string());
    }

    #[test]
    fn channel_blocks_checked_last() {
        let mut store = CalendarStore::new();
        store.channel_blocks.push(ChannelBlock {
            uid: "abc@airbnb".into(),
            summary: Some("Reserved".into()),
            range: BlockRange::new(d("2026-04-01"), d("2026-04-03")).unwrap(),
        });
        let err = check_availability(&store, &span("2026-04-03", "2026-04-05"), None).unwrap_err();
        assert_eq!(err.kind, ConflictKind::ChannelBlock);
        assert_eq!(err.id, "abc@airbnb");
        assert_eq!(err.label, "Reserved");
        assert!(check_availability(&store, &span("2026-04-04", "2026-04-05"), None).is_ok());
    }

    #[test]
    fn booking_conflict_ignores_blocks() {
        let mut store = CalendarStore::new();
        add_block(&mut store, "2026-03-01", "2026-03-05", "painting");
        assert!(first_booking_conflict(&store, &span("2026-03-02", "2026-03-03"), None).is_none());
    }

    // ── free_ranges ──────────────────────────────────────

    #[test]
    fn free_ranges_punches_bookings_and_blocks() {
        let (mut store, _) = store_with_booking("2026-05-05", "2026-05-08", BookingStatus::Confirmed);
        add_block(&mut store, "2026-05-12", "2026-05-12", "inspection");
        let free = free_ranges(&store, &span("2026-05-01", "2026-05-20"));
        assert_eq!(
            free,
            vec![
                span("2026-05-01", "2026-05-05"),
                span("2026-05-08", "2026-05-12"),
                span("2026-05-13", "2026-05-20"),
            ]
        );
    }

    #[test]
    fn free_ranges_empty_calendar() {
        let store = CalendarStore::new();
        let window = span("2026-05-01", "2026-05-20");
        assert_eq!(free_ranges(&store, &window), vec![window]);
    }

    #[test]
    fn free_ranges_ignores_cancelled() {
        let (store, _) = store_with_booking("2026-05-05", "2026-05-08", BookingStatus::Cancelled);
        let window = span("2026-05-01", "2026-05-20");
        assert_eq!(free_ranges(&store, &window), vec![window]);
    }
}
