// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Serializes [`ParsedEvent`]s back into RFC 5545 text.
//!
//! Two strategies are offered. [`format_fresh`] generates a brand-new
//! `VCALENDAR` from scratch (used when the sync engine creates an event
//! locally and has no server copy to preserve). [`patch`] instead starts
//! from an event's own `raw_ical` and rewrites only the properties the
//! model owns, leaving every other property — including ones this crate
//! doesn't understand — exactly as the server last sent it.

use crate::model::ParsedEvent;
use crate::parser::{is_begin, is_end, reassemble_lines, split_content_line};

/// Properties the model owns: on patch, these are always dropped from the
/// original text and regenerated from the event's current field values.
const OWNED_PROPERTIES: &[&str] = &[
    "SUMMARY",
    "DTSTART",
    "DTEND",
    "RRULE",
    "EXDATE",
    "SEQUENCE",
    "LAST-MODIFIED",
    "STATUS",
];

const FOLD_LIMIT: usize = 75;

/// Generate a complete, fresh `VCALENDAR` document containing just `event`.
#[must_use]
pub fn format_fresh(event: &ParsedEvent) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_owned(),
        "VERSION:2.0".to_owned(),
        "PRODID:-//Calsync//Calsync Sync Engine//EN".to_owned(),
        "CALSCALE:GREGORIAN".to_owned(),
    ];
    lines.extend(event_lines(event));
    lines.push("END:VCALENDAR".to_owned());
    fold_and_join(&lines)
}

/// Serialize a recurrence master together with its detached overrides into
/// one `VCALENDAR`. Each override's `RECURRENCE-ID` must already equal the
/// instant it replaces in `master`'s expansion; this function doesn't
/// validate that, it just emits what it's given.
#[must_use]
pub fn serialize_with_exceptions(master: &ParsedEvent, overrides: &[ParsedEvent]) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_owned(),
        "VERSION:2.0".to_owned(),
        "PRODID:-//Calsync//Calsync Sync Engine//EN".to_owned(),
        "CALSCALE:GREGORIAN".to_owned(),
    ];
    lines.extend(event_lines(master));
    for over in overrides {
        lines.extend(event_lines(over));
    }
    lines.push("END:VCALENDAR".to_owned());
    fold_and_join(&lines)
}

/// Rewrite `existing_raw` (a previously parsed `VEVENT`'s `raw_ical`) so the
/// properties the model owns reflect `event`'s current values, while every
/// other line — unrecognized properties, `ATTENDEE`, `ORGANIZER`, `GEO`,
/// `X-*`, and so on — is carried over byte-for-byte.
#[must_use]
pub fn patch(event: &ParsedEvent, existing_raw: &str) -> String {
    let lines = reassemble_lines(existing_raw);
    let mut kept = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        if is_begin(line, "VEVENT") || is_end(line, "VEVENT") {
            i += 1;
            continue;
        }
        if is_begin(line, "VALARM") {
            // Regenerated wholesale below; skip through its matching END.
            i += 1;
            while i < lines.len() && !is_end(&lines[i], "VALARM") {
                i += 1;
            }
            i += 1;
            continue;
        }
        if let Some(split) = split_content_line(line) {
            if OWNED_PROPERTIES.iter().any(|p| split.name.eq_ignore_ascii_case(p)) {
                i += 1;
                continue;
            }
        }
        kept.push(line.clone());
        i += 1;
    }

    let mut lines = vec!["BEGIN:VEVENT".to_owned()];
    lines.extend(kept);
    lines.extend(owned_property_lines(event));
    lines.extend(alarm_lines(event));
    lines.push("END:VEVENT".to_owned());
    fold_and_join(&lines)
}

fn event_lines(event: &ParsedEvent) -> Vec<String> {
    let mut lines = vec!["BEGIN:VEVENT".to_owned()];
    lines.push(format!("UID:{}", encode_text(&event.uid)));
    lines.push(format_datetime("DTSTAMP", event.dtstamp, None));
    if let Some(recurrence_id) = event.recurrence_id {
        lines.push(format_datetime("RECURRENCE-ID", recurrence_id, event.tzid.as_deref()));
    }
    if let Some(organizer) = &event.organizer {
        lines.push(format!("ORGANIZER:{}", encode_text(organizer)));
    }
    for attendee in &event.attendees {
        lines.push(format!("ATTENDEE:{}", encode_text(attendee)));
    }
    if let Some(location) = &event.location {
        lines.push(format!("LOCATION:{}", encode_text(location)));
    }
    if let Some(description) = &event.description {
        lines.push(format!("DESCRIPTION:{}", encode_text(description)));
    }
    lines.extend(owned_property_lines(event));
    lines.extend(alarm_lines(event));
    lines.push("END:VEVENT".to_owned());
    lines
}

/// Lines for exactly the properties [`OWNED_PROPERTIES`] names. Used both
/// for fresh serialization and to rebuild the owned subset during [`patch`]
/// — `DESCRIPTION`/`LOCATION`/`ORGANIZER`/`ATTENDEE` are deliberately absent
/// here so `patch` leaves them untouched in the original text.
fn owned_property_lines(event: &ParsedEvent) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(summary) = &event.summary {
        lines.push(format!("SUMMARY:{}", encode_text(summary)));
    }
    lines.push(format_datetime("DTSTART", event.dtstart, event.tzid.as_deref()));
    if let Some(dtend) = event.dtend {
        lines.push(format_datetime("DTEND", dtend, event.tzid.as_deref()));
    }
    if let Some(rrule) = &event.rrule {
        lines.push(format!("RRULE:{rrule}"));
    }
    if !event.exdate.is_empty() {
        let values: Vec<String> = event
            .exdate
            .iter()
            .map(|&millis_utc| {
                format_datetime_value(crate::model::ParsedDateTime { millis_utc, is_date_only: false }, event.tzid.as_deref())
            })
            .collect();
        let prefix = match &event.tzid {
            Some(tzid) => format!("EXDATE;TZID={tzid}"),
            None => "EXDATE".to_owned(),
        };
        lines.push(format!("{prefix}:{}", values.join(",")));
    }
    lines.push(format!("SEQUENCE:{}", event.sequence));
    if let Some(last_modified) = event.last_modified {
        lines.push(format_datetime("LAST-MODIFIED", last_modified, None));
    }
    if let Some(status) = &event.status {
        lines.push(format!("STATUS:{status}"));
    }
    lines
}

fn alarm_lines(event: &ParsedEvent) -> Vec<String> {
    let mut lines = Vec::new();
    for alarm in &event.alarms {
        lines.push("BEGIN:VALARM".to_owned());
        lines.push("ACTION:DISPLAY".to_owned());
        lines.push(format!("DESCRIPTION:{}", encode_text(event.summary.as_deref().unwrap_or("Reminder"))));
        lines.push(format!("TRIGGER:{}", alarm.trigger));
        lines.push("END:VALARM".to_owned());
    }
    lines
}

fn format_datetime(name: &str, dt: crate::model::ParsedDateTime, tzid: Option<&str>) -> String {
    format!("{name}{}", format_datetime_prop(dt, tzid))
}

/// Produce the `;PARAM=...:value` tail of a date-time property line.
fn format_datetime_prop(dt: crate::model::ParsedDateTime, tzid: Option<&str>) -> String {
    if dt.is_date_only {
        format!(";VALUE=DATE:{}", format_datetime_value(dt, None))
    } else if let Some(tzid) = tzid {
        format!(";TZID={tzid}:{}", format_datetime_value(dt, Some(tzid)))
    } else {
        format!(":{}", format_datetime_value(dt, None))
    }
}

fn format_datetime_value(dt: crate::model::ParsedDateTime, tzid: Option<&str>) -> String {
    let Ok(timestamp) = jiff::Timestamp::from_millisecond(dt.millis_utc) else {
        return String::new();
    };
    if dt.is_date_only {
        let zoned = timestamp.to_zoned(jiff::tz::TimeZone::UTC);
        return zoned.strftime("%Y%m%d").to_string();
    }
    let tz = tzid
        .and_then(|name| jiff::tz::TimeZone::get(name).ok())
        .unwrap_or(jiff::tz::TimeZone::UTC);
    let zoned = timestamp.to_zoned(tz);
    if tzid.is_some() {
        zoned.strftime("%Y%m%dT%H%M%S").to_string()
    } else {
        zoned.strftime("%Y%m%dT%H%M%SZ").to_string()
    }
}

/// Encode RFC 5545 TEXT escapes: backslash, semicolon, comma and newline.
fn encode_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn fold_and_join(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&fold_line(line));
        out.push_str("\r\n");
    }
    out
}

/// Fold `line` at 75 octets per RFC 5545 §3.1, continuing with a single
/// leading space. Never splits a multi-byte UTF-8 sequence, and backs off
/// one more byte rather than leaving a trailing lone backslash at a fold
/// boundary.
fn fold_line(line: &str) -> String {
    if line.len() <= FOLD_LIMIT {
        return line.to_owned();
    }
    let mut out = String::new();
    let mut start = 0;
    let mut first = true;
    while start < line.len() {
        let budget = if first { FOLD_LIMIT } else { FOLD_LIMIT - 1 };
        let mut end = (start + budget).min(line.len());
        while end < line.len() && !line.is_char_boundary(end) {
            end -= 1;
        }
        while end > start + 1 && line.as_bytes()[end - 1] == b'\\' {
            end -= 1;
        }
        if !first {
            out.push_str("\r\n ");
        }
        out.push_str(&line[start..end]);
        start = end;
        first = false;
    }
    out
}
