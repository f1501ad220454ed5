//! Minimal iCalendar reader for channel availability feeds.
//!
//! Channels publish one VEVENT per blocked stay. Only `UID`, `SUMMARY`,
//! `DTSTART` and `DTEND` matter; `DTEND` is exclusive, so a 1st-to-4th
//! event blocks the 1st, 2nd and 3rd.

use std::fmt;

use crate::model::{BlockRange, ChannelBlock, Day, next_day};

#[derive(Debug, PartialEq, Eq)]
pub enum FeedError {
    NotACalendar,
    UnterminatedEvent,
    MissingStart { event: usize },
    BadDate { event: usize, value: String },
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::NotACalendar => write!(f, "feed is not a VCALENDAR"),
            FeedError::UnterminatedEvent => write!(f, "VEVENT without END:VEVENT"),
            FeedError::MissingStart { event } => write!(f, "event {event} has no DTSTART"),
            FeedError::BadDate { event, value } => {
                write!(f, "event {event}: unparseable date {value:?}")
            }
        }
    }
}

impl std::error::Error for FeedError {}

#[derive(Default)]
struct PendingEvent {
    uid: Option<String>,
    summary: Option<String>,
    start: Option<Day>,
    end: Option<Day>,
}

/// Parse a feed into blocked ranges, in feed order. Events whose end is not
/// after their start block their start day only.
pub fn parse_feed(ics: &str) -> Result<Vec<ChannelBlock>, FeedError> {
    let lines = unfold(ics);
    if !lines
        .iter()
        .any(|l| l.trim().eq_ignore_ascii_case("BEGIN:VCALENDAR"))
    {
        return Err(FeedError::NotACalendar);
    }

    let mut blocks = Vec::new();
    let mut current: Option<PendingEvent> = None;
    let mut index = 0usize;

    for line in &lines {
        let line = line.trim_end();
        let Some((head, value)) = line.split_once(':') else {
            continue;
        };
        // Property parameters (`;VALUE=DATE`, `;TZID=…`) don't change the day.
        let name = head.split(';').next().unwrap_or(head).to_ascii_uppercase();

        match (name.as_str(), current.as_mut()) {
            ("BEGIN", None) if value.eq_ignore_ascii_case("VEVENT") => {
                index += 1;
                current = Some(PendingEvent::default());
            }
            ("END", Some(_)) if value.eq_ignore_ascii_case("VEVENT") => {
                if let Some(event) = current.take() {
                    blocks.push(finish(event, index)?);
                }
            }
            ("UID", Some(ev)) => ev.uid = Some(value.trim().to_string()),
            ("SUMMARY", Some(ev)) => ev.summary = Some(unescape(value.trim())),
            ("DTSTART", Some(ev)) => ev.start = Some(parse_day(value, index)?),
            ("DTEND", Some(ev)) => ev.end = Some(parse_day(value, index)?),
            _ => {}
        }
    }

    if current.is_some() {
        return Err(FeedError::UnterminatedEvent);
    }
    Ok(blocks)
}

fn finish(event: PendingEvent, index: usize) -> Result<ChannelBlock, FeedError> {
    let start = event.start.ok_or(FeedError::MissingStart { event: index })?;
    let end = event.end.filter(|e| *e > start).unwrap_or_else(|| next_day(start));
    let range = BlockRange::from_exclusive_end(start, end).unwrap_or(BlockRange { start, end: start });
    Ok(ChannelBlock {
        uid: event.uid.unwrap_or_else(|| format!("event-{index}")),
        summary: event.summary.filter(|s| !s.is_empty()),
        range,
    })
}

/// `20260501` or `20260501T140000Z`; the time part is ignored.
fn parse_day(value: &str, event: usize) -> Result<Day, FeedError> {
    let value = value.trim();
    let date = value.get(..8).unwrap_or(value);
    Day::parse_from_str(date, "%Y%m%d").map_err(|_| FeedError::BadDate {
        event,
        value: value.to_string(),
    })
}

/// RFC 5545 line unfolding: a line starting with a space or tab continues the previous one.
fn unfold(ics: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in ics.lines() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        match (raw.strip_prefix([' ', '\t']), out.last_mut()) {
            (Some(rest), Some(prev)) => prev.push_str(rest),
            _ => out.push(raw.to_string()),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Day {
        s.parse().unwrap()
    }

    fn feed(events: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//channel//EN\r\n{events}END:VCALENDAR\r\n")
    }

    #[test]
    fn date_events_use_exclusive_end() {
        let ics = feed(
            "BEGIN:VEVENT\r\nUID:abc@channel\r\nSUMMARY:Reserved\r\n\
             DTSTART;VALUE=DATE:20260501\r\nDTEND;VALUE=DATE:20260504\r\nEND:VEVENT\r\n",
        );
        let blocks = parse_feed(&ics).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].uid, "abc@channel");
        assert_eq!(blocks[0].summary.as_deref(), Some("Reserved"));
        assert_eq!(blocks[0].range.start, d("2026-05-01"));
        assert_eq!(blocks[0].range.end, d("2026-05-03"));
    }

    #[test]
    fn datetime_values_keep_the_date() {
        let ics = feed(
            "BEGIN:VEVENT\nUID:x\nDTSTART:20260710T140000Z\nDTEND:20260712T100000Z\nEND:VEVENT\n",
        );
        let blocks = parse_feed(&ics).unwrap();
        assert_eq!(blocks[0].range.start, d("2026-07-10"));
        assert_eq!(blocks[0].range.end, d("2026-07-11"));
    }

    #[test]
    fn missing_or_degenerate_end_blocks_one_day() {
        let ics = feed(
            "BEGIN:VEVENT\nUID:a\nDTSTART;VALUE=DATE:20260601\nEND:VEVENT\n\
             BEGIN:VEVENT\nUID:b\nDTSTART;VALUE=DATE:20260610\nDTEND;VALUE=DATE:20260610\nEND:VEVENT\n",
        );
        let blocks = parse_feed(&ics).unwrap();
        assert_eq!(blocks.len(), 2);
        for b in &blocks {
            assert_eq!(b.range.days(), 1);
        }
        assert_eq!(blocks[1].range.start, d("2026-06-10"));
    }

    #[test]
    fn folded_lines_are_joined() {
        let ics = feed(
            "BEGIN:VEVENT\r\nUID:long-\r\n uid-value\r\nSUMMARY:Not available\\, owner\r\n\
             DTSTART;VALUE=DATE:20260801\r\nDTEND;VALUE=DATE:20260803\r\nEND:VEVENT\r\n",
        );
        let blocks = parse_feed(&ics).unwrap();
        assert_eq!(blocks[0].uid, "long-uid-value");
        assert_eq!(blocks[0].summary.as_deref(), Some("Not available, owner"));
    }

    #[test]
    fn empty_calendar_yields_nothing() {
        assert!(parse_feed(&feed("")).unwrap().is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_feed("hello"), Err(FeedError::NotACalendar));
        let ics = feed("BEGIN:VEVENT\nUID:a\nDTSTART:nope\nEND:VEVENT\n");
        assert!(matches!(parse_feed(&ics), Err(FeedError::BadDate { event: 1, .. })));
        let ics = feed("BEGIN:VEVENT\nUID:a\nEND:VEVENT\n");
        assert_eq!(parse_feed(&ics), Err(FeedError::MissingStart { event: 1 }));
        let ics = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART:20260101\n";
        assert_eq!(parse_feed(ics), Err(FeedError::UnterminatedEvent));
    }

    #[test]
    fn missing_uid_gets_positional_name() {
        let ics = feed("BEGIN:VEVENT\nDTSTART;VALUE=DATE:20260901\nEND:VEVENT\n");
        assert_eq!(parse_feed(&ics).unwrap()[0].uid, "event-1");
    }
}
