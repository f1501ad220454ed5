use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::kyc::{Kyc, KycDocument};
use crate::phone::PhoneNumber;

/// Calendar day. The only date type; no time-of-day.
pub type Day = NaiveDate;

pub type Timestamp = DateTime<Utc>;

/// Day after `d`. Saturates at the calendar maximum; callers validate years first.
pub fn next_day(d: Day) -> Day {
    d.succ_opt().unwrap_or(d)
}

/// Half-open interval `[start, end)` of days. A stay from the 1st to the 4th
/// is `[1st, 4th)`: three nights, the 4th free for the next arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Day,
    pub end: Day,
}

impl Span {
    pub fn new(start: Day, end: Day) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// `None` unless `start < end`.
    pub fn checked(start: Day, end: Day) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_day(&self, d: Day) -> bool {
        self.start <= d && d < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Inclusive day range `[start, end]`, the way operators and channel feeds
/// express blocked days. Convert with [`BlockRange::to_span`] before
/// comparing against bookings; nothing else may re-derive the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub start: Day,
    pub end: Day,
}

impl BlockRange {
    /// `None` if `start > end`. A one-day block has `start == end`.
    pub fn new(start: Day, end: Day) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Build from a feed whose end marker is exclusive (iCal `DTEND`):
    /// the last blocked day is the day before `end_exclusive`.
    pub fn from_exclusive_end(start: Day, end_exclusive: Day) -> Option<Self> {
        Self::new(start, end_exclusive.pred_opt()?)
    }

    /// The equivalent half-open span: one day past the inclusive end.
    pub fn to_span(&self) -> Span {
        Span::new(self.start, next_day(self.end))
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Who did something, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub at: Timestamp,
    pub by: String,
}

impl Stamp {
    pub fn new(at: Timestamp, by: impl Into<String>) -> Self {
        Self { at, by: by.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestContact {
    pub name: String,
    pub phone: PhoneNumber,
    pub email: Option<String>,
}

// ── Booking requests ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guest-submitted stay request. Terminal once no longer pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: Ulid,
    pub guest: GuestContact,
    pub check_in: Day,
    /// Exclusive: the departure day.
    pub check_out: Day,
    pub nights: u32,
    pub price_per_night: u64,
    pub total_amount: u64,
    pub notes: Option<String>,
    pub status: RequestStatus,
    pub created: Stamp,
    /// Set when approved or rejected.
    pub processed: Option<Stamp>,
    /// Back-reference to the booking created on approval.
    pub booking_id: Option<Ulid>,
    pub rejection_reason: Option<String>,
}

impl BookingRequest {
    pub fn span(&self) -> Span {
        Span::new(self.check_in, self.check_out)
    }
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
    /// Legacy records written before `confirmed` existed. Behaves exactly like `Confirmed`.
    Active,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::CheckedOut => "checked_out",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Active => "active",
        }
    }

    /// Holds the calendar for its interval.
    pub fn is_occupying(&self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::CheckedIn | BookingStatus::Active
        )
    }

    /// Confirmed and the guest has not arrived yet.
    pub fn is_awaiting_arrival(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::CheckedOut | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "checked_in" => Ok(BookingStatus::CheckedIn),
            "checked_out" => Ok(BookingStatus::CheckedOut),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "active" => Ok(BookingStatus::Active),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    /// Approved from a guest request.
    Direct,
    AdminManual,
    /// Entered by staff on behalf of an external channel.
    Channel,
}

impl BookingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingSource::Direct => "direct",
            BookingSource::AdminManual => "admin_manual",
            BookingSource::Channel => "channel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub channel: String,
    pub external_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationType {
    GuestRequest,
    Admin,
    NoShow,
    Other,
}

impl CancellationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationType::GuestRequest => "guest_request",
            CancellationType::Admin => "admin",
            CancellationType::NoShow => "no_show",
            CancellationType::Other => "other",
        }
    }
}

impl FromStr for CancellationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "guest_request" | "guest" => Ok(CancellationType::GuestRequest),
            "admin" => Ok(CancellationType::Admin),
            "no_show" => Ok(CancellationType::NoShow),
            "other" => Ok(CancellationType::Other),
            other => Err(format!("unknown cancellation type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub stamp: Stamp,
    pub reason: Option<String>,
    pub kind: CancellationType,
}

/// The authoritative reservation. Only ever changed by applying an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub request_id: Option<Ulid>,
    pub guest: GuestContact,
    pub check_in: Day,
    pub check_out: Day,
    pub nights: u32,
    pub price_per_night: u64,
    pub total_amount: u64,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub kyc: Kyc,
    pub no_show: bool,
    pub source: BookingSource,
    pub channel: Option<ChannelRef>,
    pub created: Stamp,
    pub checked_in: Option<Stamp>,
    pub checked_out: Option<Stamp>,
    pub cancellation: Option<Cancellation>,
    pub last_edit: Option<Stamp>,
}

impl Booking {
    pub fn span(&self) -> Span {
        Span::new(self.check_in, self.check_out)
    }
}

// ── Calendar blocks ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Maintenance,
    OwnerStay,
    Other,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Maintenance => "maintenance",
            BlockKind::OwnerStay => "owner_stay",
            BlockKind::Other => "other",
        }
    }
}

impl FromStr for BlockKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "maintenance" => Ok(BlockKind::Maintenance),
            "owner_stay" | "owner" => Ok(BlockKind::OwnerStay),
            "other" => Ok(BlockKind::Other),
            other => Err(format!("unknown block kind: {other}")),
        }
    }
}

/// Operator exclusion. Immutable; deleting it is the only change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarBlock {
    pub id: Ulid,
    pub range: BlockRange,
    pub kind: BlockKind,
    pub reason: String,
    pub note: Option<String>,
    pub created: Stamp,
}

/// A blocked range read from an external channel feed. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBlock {
    pub uid: String,
    pub summary: Option<String>,
    pub range: BlockRange,
}

// ── Interval index ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalKind {
    Booking,
    Block,
}

/// One entry in the calendar's occupancy index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub id: Ulid,
    pub span: Span,
    pub kind: IntervalKind,
}

/// Bookings and blocks on the villa calendar, sorted by `span.start`.
/// Booking entries are indexed regardless of status; callers filter.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    pub intervals: Vec<Interval>,
}

impl Calendar {
    /// Insert interval maintaining sort order by span.start.
    pub fn insert_interval(&mut self, interval: Interval) {
        let pos = self
            .intervals
            .binary_search_by_key(&interval.span.start, |i| i.span.start)
            .unwrap_or_else(|e| e);
        self.intervals.insert(pos, interval);
    }

    /// Remove interval by id.
    pub fn remove_interval(&mut self, id: Ulid) -> Option<Interval> {
        let pos = self.intervals.iter().position(|i| i.id == id)?;
        Some(self.intervals.remove(pos))
    }

    /// Return only intervals whose span overlaps the query window.
    /// Uses binary search to skip intervals starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Interval> {
        let right_bound = self
            .intervals
            .partition_point(|i| i.span.start < query.end);
        self.intervals[..right_bound]
            .iter()
            .filter(move |i| i.span.end > query.start)
    }
}

// ── Edits ────────────────────────────────────────────────────────

/// Admin edit as submitted: every field optional, phone still raw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingEdit {
    pub status: Option<BookingStatus>,
    pub guest_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub check_in: Option<Day>,
    pub check_out: Option<Day>,
}

/// Validated edit as recorded in the log. Derived amounts are recomputed on apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub guest_name: Option<String>,
    pub phone: Option<PhoneNumber>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub check_in: Option<Day>,
    pub check_out: Option<Day>,
}

// ── Events ───────────────────────────────────────────────────────

/// One committed state change, flat. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RequestSubmitted {
        request: BookingRequest,
    },
    /// Creates the booking and retires the request in one record.
    RequestApproved {
        request_id: Ulid,
        booking: Booking,
        stamp: Stamp,
    },
    RequestRejected {
        request_id: Ulid,
        reason: Option<String>,
        stamp: Stamp,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingCheckedIn {
        id: Ulid,
        stamp: Stamp,
    },
    BookingCheckedOut {
        id: Ulid,
        stamp: Stamp,
    },
    BookingCancelled {
        id: Ulid,
        cancellation: Cancellation,
        no_show: bool,
    },
    BookingEdited {
        id: Ulid,
        patch: BookingPatch,
        stamp: Stamp,
    },
    KycDocumentAdded {
        booking_id: Ulid,
        document: KycDocument,
    },
    KycVerified {
        booking_id: Ulid,
        stamp: Stamp,
    },
    KycRejected {
        booking_id: Ulid,
        reason: String,
        stamp: Stamp,
    },
    BlockCreated {
        block: CalendarBlock,
    },
    BlockDeleted {
        id: Ulid,
    },
}

impl Event {
    /// Short name for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Event::RequestSubmitted { .. } => "request_submitted",
            Event::RequestApproved { .. } => "request_approved",
            Event::RequestRejected { .. } => "request_rejected",
            Event::BookingCreated { .. } => "booking_created",
            Event::BookingCheckedIn { .. } => "booking_checked_in",
            Event::BookingCheckedOut { .. } => "booking_checked_out",
            Event::BookingCancelled { .. } => "booking_cancelled",
            Event::BookingEdited { .. } => "booking_edited",
            Event::KycDocumentAdded { .. } => "kyc_document_added",
            Event::KycVerified { .. } => "kyc_verified",
            Event::KycRejected { .. } => "kyc_rejected",
            Event::BlockCreated { .. } => "block_created",
            Event::BlockDeleted { .. } => "block_deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Day {
        s.parse().unwrap()
    }

    fn booking_interval(start: &str, end: &str) -> Interval {
        Interval {
            id: Ulid::new(),
            span: Span::new(d(start), d(end)),
            kind: IntervalKind::Booking,
        }
    }

    #[test]
    fn span_basics() {
        let s = Span::new(d("2026-04-01"), d("2026-04-04"));
        assert_eq!(s.nights(), 3);
        assert!(s.contains_day(d("2026-04-01")));
        assert!(s.contains_day(d("2026-04-03")));
        assert!(!s.contains_day(d("2026-04-04"))); // departure day is free
    }

    #[test]
    fn span_overlap_is_symmetric() {
        let a = Span::new(d("2026-04-01"), d("2026-04-04"));
        let b = Span::new(d("2026-04-03"), d("2026-04-06"));
        let c = Span::new(d("2026-04-04"), d("2026-04-05"));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // touching, not overlapping
        assert!(!c.overlaps(&a));
        assert!(a.overlaps(&a));
    }

    #[test]
    fn span_overlap_symmetry_exhaustive() {
        let base = d("2026-01-01");
        let days: Vec<Day> = (0..6).map(|i| base + chrono::Days::new(i)).collect();
        let mut spans = Vec::new();
        for (i, s) in days.iter().enumerate() {
            for e in &days[i + 1..] {
                spans.push(Span::new(*s, *e));
            }
        }
        for a in &spans {
            assert!(a.overlaps(a));
            for b in &spans {
                assert_eq!(a.overlaps(b), b.overlaps(a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn span_checked_rejects_empty_and_inverted() {
        assert!(Span::checked(d("2026-04-01"), d("2026-04-01")).is_none());
        assert!(Span::checked(d("2026-04-02"), d("2026-04-01")).is_none());
        assert!(Span::checked(d("2026-04-01"), d("2026-04-02")).is_some());
    }

    #[test]
    fn span_contains_span() {
        let outer = Span::new(d("2026-04-01"), d("2026-04-10"));
        let inner = Span::new(d("2026-04-02"), d("2026-04-05"));
        let partial = Span::new(d("2026-03-30"), d("2026-04-02"));
        assert!(outer.contains_span(&inner));
        assert!(outer.contains_span(&outer));
        assert!(!outer.contains_span(&partial));
    }

    #[test]
    fn one_day_block_covers_its_day() {
        let block = BlockRange::new(d("2026-03-10"), d("2026-03-10")).unwrap();
        let span = block.to_span();
        assert_eq!(span, Span::new(d("2026-03-10"), d("2026-03-11")));
        assert_eq!(block.days(), 1);

        let stay = Span::new(d("2026-03-10"), d("2026-03-11"));
        assert!(span.overlaps(&stay));
    }

    #[test]
    fn block_includes_last_day() {
        let block = BlockRange::new(d("2026-03-01"), d("2026-03-05")).unwrap();
        let arriving_on_fifth = Span::new(d("2026-03-05"), d("2026-03-07"));
        let arriving_on_sixth = Span::new(d("2026-03-06"), d("2026-03-07"));
        assert!(block.to_span().overlaps(&arriving_on_fifth));
        assert!(!block.to_span().overlaps(&arriving_on_sixth));
    }

    #[test]
    fn block_range_rejects_inverted() {
        assert!(BlockRange::new(d("2026-03-05"), d("2026-03-04")).is_none());
    }

    #[test]
    fn exclusive_end_feed_conversion() {
        let r = BlockRange::from_exclusive_end(d("2026-05-01"), d("2026-05-04")).unwrap();
        assert_eq!(r.end, d("2026-05-03"));
        assert_eq!(r.to_span(), Span::new(d("2026-05-01"), d("2026-05-04")));

        // DTEND == DTSTART has no occupied day
        assert!(BlockRange::from_exclusive_end(d("2026-05-01"), d("2026-05-01")).is_none());
    }

    #[test]
    fn occupying_statuses() {
        assert!(BookingStatus::Confirmed.is_occupying());
        assert!(BookingStatus::CheckedIn.is_occupying());
        assert!(BookingStatus::Active.is_occupying());
        assert!(!BookingStatus::CheckedOut.is_occupying());
        assert!(!BookingStatus::Cancelled.is_occupying());
    }

    #[test]
    fn status_parse_roundtrip() {
        for s in [
            BookingStatus::Confirmed,
            BookingStatus::CheckedIn,
            BookingStatus::CheckedOut,
            BookingStatus::Cancelled,
            BookingStatus::Active,
        ] {
            assert_eq!(s.as_str().parse::<BookingStatus>().unwrap(), s);
        }
        assert!("pending".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn interval_ordering() {
        let mut cal = Calendar::default();
        cal.insert_interval(booking_interval("2026-04-10", "2026-04-12"));
        cal.insert_interval(booking_interval("2026-04-01", "2026-04-03"));
        cal.insert_interval(booking_interval("2026-04-05", "2026-04-07"));
        assert_eq!(cal.intervals[0].span.start, d("2026-04-01"));
        assert_eq!(cal.intervals[1].span.start, d("2026-04-05"));
        assert_eq!(cal.intervals[2].span.start, d("2026-04-10"));
    }

    #[test]
    fn overlapping_skips_past_and_future() {
        let mut cal = Calendar::default();
        cal.insert_interval(booking_interval("2026-04-01", "2026-04-03"));
        cal.insert_interval(booking_interval("2026-04-04", "2026-04-08"));
        cal.insert_interval(booking_interval("2026-04-20", "2026-04-22"));

        let query = Span::new(d("2026-04-05"), d("2026-04-10"));
        let hits: Vec<_> = cal.overlapping(&query).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].span.start, d("2026-04-04"));
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let mut cal = Calendar::default();
        cal.insert_interval(booking_interval("2026-04-01", "2026-04-03"));
        let query = Span::new(d("2026-04-03"), d("2026-04-05"));
        assert_eq!(cal.overlapping(&query).count(), 0);
    }

    #[test]
    fn remove_nonexistent_returns_none() {
        let mut cal = Calendar::default();
        cal.insert_interval(booking_interval("2026-04-01", "2026-04-03"));
        assert!(cal.remove_interval(Ulid::new()).is_none());
        assert_eq!(cal.intervals.len(), 1);
    }

    #[test]
    fn remove_middle_preserves_order() {
        let mut cal = Calendar::default();
        let a = booking_interval("2026-04-01", "2026-04-02");
        let b = booking_interval("2026-04-03", "2026-04-04");
        let c = booking_interval("2026-04-05", "2026-04-06");
        let (ida, idb, idc) = (a.id, b.id, c.id);
        cal.insert_interval(a);
        cal.insert_interval(b);
        cal.insert_interval(c);
        cal.remove_interval(idb);
        assert_eq!(cal.intervals.len(), 2);
        assert_eq!(cal.intervals[0].id, ida);
        assert_eq!(cal.intervals[1].id, idc);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BlockCreated {
            block: CalendarBlock {
                id: Ulid::new(),
                range: BlockRange::new(d("2026-03-10"), d("2026-03-10")).unwrap(),
                kind: BlockKind::Maintenance,
                reason: "pool resurfacing".into(),
                note: None,
                created: Stamp::new(Utc::now(), "admin"),
            },
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
