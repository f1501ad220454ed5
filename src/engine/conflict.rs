use std::fmt;

use chrono::{FixedOffset, Offset, Utc};
use serde::Serialize;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Booking,
    Block,
    ChannelBlock,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::Booking => "booking",
            ConflictKind::Block => "block",
            ConflictKind::ChannelBlock => "channel_block",
        }
    }
}

/// The first thing standing in the way of a candidate stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// Booking or block ULID, or the feed UID for channel blocks.
    pub id: String,
    /// Guest name, block reason, or feed summary.
    pub label: String,
    /// Half-open, even for blocks.
    pub span: Span,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) occupies {}",
            self.kind.as_str(),
            self.id,
            self.label,
            self.span
        )
    }
}

/// Source of "now" and "today" for time-gated transitions.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    /// Wall clock, with "today" taken in the villa's fixed UTC offset.
    System { offset: FixedOffset },
    Fixed(Timestamp),
}

impl Default for Clock {
    fn default() -> Self {
        Clock::System {
            offset: Utc.fix(),
        }
    }
}

impl Clock {
    pub fn now(&self) -> Timestamp {
        match self {
            Clock::System { .. } => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }

    pub fn today(&self) -> Day {
        match self {
            Clock::System { offset } => Utc::now().with_timezone(offset).date_naive(),
            Clock::Fixed(at) => at.date_naive(),
        }
    }
}

fn validate_day(d: Day) -> Result<(), EngineError> {
    use chrono::Datelike;
    if d.year() < MIN_VALID_YEAR || d.year() > MAX_VALID_YEAR {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    Ok(())
}

/// A stay must be a non-empty half-open range within the length cap.
pub(crate) fn validate_stay(check_in: Day, check_out: Day) -> Result<Span, EngineError> {
    validate_day(check_in)?;
    validate_day(check_out)?;
    let span = Span::checked(check_in, check_out).ok_or(EngineError::InvalidRange {
        start: check_in,
        end: check_out,
    })?;
    if span.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(span)
}

/// A block may cover a single day (`start == end`) but never run backwards.
pub(crate) fn validate_block(start: Day, end: Day) -> Result<BlockRange, EngineError> {
    validate_day(start)?;
    validate_day(end)?;
    let range = BlockRange::new(start, end).ok_or(EngineError::InvalidRange { start, end })?;
    if range.days() > MAX_BLOCK_DAYS {
        return Err(EngineError::LimitExceeded("block too long"));
    }
    Ok(range)
}

/// Query windows for display; wider than a stay but still bounded.
pub(crate) fn validate_window(start: Day, end: Day) -> Result<Span, EngineError> {
    validate_day(start)?;
    validate_day(end)?;
    let span = Span::checked(start, end).ok_or(EngineError::InvalidRange { start, end })?;
    if span.nights() > MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(span)
}

pub(crate) fn validate_text(
    value: &str,
    field: &'static str,
    max: usize,
) -> Result<(), EngineError> {
    if value.len() > max {
        return Err(EngineError::LimitExceeded(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Day {
        s.parse().unwrap()
    }

    #[test]
    fn stay_rejects_empty_and_inverted() {
        assert!(matches!(
            validate_stay(d("2026-03-01"), d("2026-03-01")),
            Err(EngineError::InvalidRange { .. })
        ));
        assert!(matches!(
            validate_stay(d("2026-03-02"), d("2026-03-01")),
            Err(EngineError::InvalidRange { .. })
        ));
        assert_eq!(
            validate_stay(d("2026-03-01"), d("2026-03-04")).unwrap().nights(),
            3
        );
    }

    #[test]
    fn stay_length_capped() {
        assert!(matches!(
            validate_stay(d("2026-01-01"), d("2026-06-01")),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    #[test]
    fn block_allows_single_day() {
        let r = validate_block(d("2026-03-10"), d("2026-03-10")).unwrap();
        assert_eq!(r.days(), 1);
        assert!(validate_block(d("2026-03-11"), d("2026-03-10")).is_err());
    }

    #[test]
    fn dates_outside_supported_years() {
        assert!(matches!(
            validate_stay(d("1999-12-30"), d("1999-12-31")),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    #[test]
    fn fixed_clock_today() {
        let at: Timestamp = "2026-02-01T10:00:00Z".parse().unwrap();
        let clock = Clock::Fixed(at);
        assert_eq!(clock.today(), d("2026-02-01"));
        assert_eq!(clock.now(), at);
    }

    #[test]
    fn system_clock_uses_offset() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let clock = Clock::System { offset: ist };
        let expected = Utc::now().with_timezone(&ist).date_naive();
        // Allow for a midnight rollover between the two reads.
        let today = clock.today();
        assert!(today == expected || today == next_day(expected));
    }
}
