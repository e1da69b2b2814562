// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Filters `STATUS:CANCELLED` components out of a parsed calendar.
//!
//! A cancelled override (`RECURRENCE-ID` present) doesn't just disappear —
//! the occurrence it stood in for must keep being suppressed, so its instant
//! is recorded as an implicit `EXDATE` on the master. A cancelled master (or
//! a cancelled non-recurring event) has no occurrence to preserve and is
//! simply dropped.

use crate::model::ParsedCalendar;

pub(crate) fn filter_cancelled(calendar: &mut ParsedCalendar) {
    let mut kept = Vec::with_capacity(calendar.events.len());
    for event in calendar.events.drain(..) {
        let cancelled = event
            .status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("CANCELLED"));
        if !cancelled {
            kept.push(event);
            continue;
        }
        if let Some(recurrence_id) = event.recurrence_id {
            calendar
                .implicit_exdates
                .entry(event.uid.clone())
                .or_default()
                .push(recurrence_id.millis_utc);
        }
    }
    calendar.events = kept;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classification, ParsedDateTime, ParsedEvent, TimeTransparency};

    fn event(uid: &str, status: Option<&str>, recurrence_id: Option<i64>) -> crate::ParsedEvent {
        ParsedEvent {
            uid: uid.to_owned(),
            summary: None,
            location: None,
            description: None,
            dtstart: ParsedDateTime { millis_utc: 0, is_date_only: false },
            dtend: None,
            tzid: None,
            recurrence_id: recurrence_id.map(|millis_utc| ParsedDateTime { millis_utc, is_date_only: false }),
            status: status.map(str::to_owned),
            transparency: TimeTransparency::default(),
            classification: Classification::default(),
            organizer: None,
            attendees: vec![],
            sequence: 0,
            dtstamp: ParsedDateTime { millis_utc: 0, is_date_only: false },
            last_modified: None,
            rrule: None,
            rdate: vec![],
            exdate: vec![],
            alarms: vec![],
            properties: vec![],
            raw_ical: String::new(),
        }
    }

    #[test]
    fn cancelled_override_becomes_implicit_exdate() {
        let mut calendar = ParsedCalendar {
            name: None,
            events: vec![
                event("evt-1", None, None),
                event("evt-1", Some("CANCELLED"), Some(1_000)),
            ],
            implicit_exdates: Default::default(),
        };
        filter_cancelled(&mut calendar);
        assert_eq!(calendar.events.len(), 1);
        assert_eq!(calendar.implicit_exdates.get("evt-1"), Some(&vec![1_000]));
    }

    #[test]
    fn cancelled_master_is_dropped_without_exdate() {
        let mut calendar = ParsedCalendar {
            name: None,
            events: vec![event("evt-2", Some("CANCELLED"), None)],
            implicit_exdates: Default::default(),
        };
        filter_cancelled(&mut calendar);
        assert!(calendar.events.is_empty());
        assert!(calendar.implicit_exdates.is_empty());
    }
}
