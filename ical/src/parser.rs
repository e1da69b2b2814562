// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Turns raw iCalendar source into [`ParsedCalendar`]s.
//!
//! Parsing happens in two passes over the token stream from [`crate::lexer`]:
//! first, folded continuations are invisible to `logos`, so reassembling
//! whole logical lines is just concatenating token text up to each
//! `Newline`; second, each logical line is split into name, parameters and
//! value with a quote-aware scan (parameter values may themselves contain
//! `:` or `;` when quoted).
//!
//! The parser is tolerant by design: a component whose `BEGIN` never finds
//! a matching `END` before the input runs out is dropped rather than
//! failing the whole document, unknown properties are kept verbatim in
//! [`Property::raw_line`] for round-tripping, and `VTODO`/`VJOURNAL`/
//! `VTIMEZONE` blocks are skipped rather than rejected — this crate only
//! models events.

use crate::cancel::filter_cancelled;
use crate::error::ParseError;
use crate::lexer::{self, Token};
use crate::model::{Classification, ParsedAlarm, ParsedCalendar, ParsedDateTime, ParsedEvent, Property, TimeTransparency};

/// Parse `src` into one [`ParsedCalendar`] per top-level `VCALENDAR` block.
///
/// Multiple `VCALENDAR`s concatenated in a single payload (as some servers
/// emit for multi-resource responses) are all returned; malformed or
/// truncated components are dropped rather than failing the whole parse.
/// Returns [`ParseError::NoCalendar`] only if no `BEGIN:VCALENDAR` is found
/// at all.
pub fn parse(src: &str) -> Result<Vec<ParsedCalendar>, ParseError> {
    let src = src.trim_start_matches('\u{feff}');
    let lines = reassemble_lines(src);

    let mut calendars = Vec::new();
    let mut i = 0;
    let mut saw_begin_calendar = false;
    while i < lines.len() {
        if !is_begin(&lines[i], "VCALENDAR") {
            i += 1;
            continue;
        }
        saw_begin_calendar = true;
        i += 1;
        if let Some((calendar, consumed)) = parse_calendar_body(&lines[i..]) {
            calendars.push(calendar);
            i += consumed;
        } else {
            // BEGIN:VCALENDAR never closed; nothing left to parse.
            break;
        }
    }

    if !saw_begin_calendar {
        return Err(ParseError::NoCalendar);
    }
    Ok(calendars)
}

/// Reconstruct whole, unfolded logical lines from the token stream,
/// stripping stray control characters as they're assembled.
pub(crate) fn reassemble_lines(src: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for token in lexer::lex(src) {
        match token {
            Ok(Token::Newline) => {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
            }
            Ok(other) => current.push_str(token_text(other)),
            Err(()) => {
                // logos's error token is a single unmatched byte; skip it.
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn token_text<'a>(token: Token<'a>) -> &'a str {
    match token {
        Token::Colon => ":",
        Token::Semicolon => ";",
        Token::Equal => "=",
        Token::Comma => ",",
        Token::DQuote => "\"",
        Token::Newline => unreachable!("handled by caller"),
        Token::Text(s) => s,
    }
}

pub(crate) fn is_begin(line: &str, component: &str) -> bool {
    matches_directive(line, "BEGIN", component)
}

pub(crate) fn is_end(line: &str, component: &str) -> bool {
    matches_directive(line, "END", component)
}

fn matches_directive(line: &str, directive: &str, component: &str) -> bool {
    line.split_once(':').is_some_and(|(head, value)| {
        head.eq_ignore_ascii_case(directive) && value.eq_ignore_ascii_case(component)
    })
}

/// Consume lines up to and including this `VCALENDAR`'s matching `END`,
/// returning the assembled calendar and the number of lines consumed (not
/// including the trailing `END:VCALENDAR` — that one *is* counted).
fn parse_calendar_body(lines: &[String]) -> Option<(ParsedCalendar, usize)> {
    let mut calendar = ParsedCalendar::default();
    let mut header_done = false;
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        if is_end(line, "VCALENDAR") {
            filter_cancelled(&mut calendar);
            return Some((calendar, i + 1));
        }
        if is_begin(line, "VEVENT") {
            header_done = true;
            i += 1;
            match parse_event_body(lines, i) {
                Some((event, consumed)) => {
                    calendar.events.push(event);
                    i += consumed;
                }
                None => return None, // unterminated VEVENT: whole document is truncated
            }
            continue;
        }
        if is_begin(line, "VTODO") || is_begin(line, "VJOURNAL") || is_begin(line, "VTIMEZONE") {
            header_done = true;
            let component = component_name(line);
            i += 1;
            i += skip_component(lines, i, &component)?;
            continue;
        }
        if !header_done {
            if let Some(prop) = split_content_line(line) {
                if prop.name.eq_ignore_ascii_case("X-WR-CALNAME") {
                    calendar.name = Some(decode_text(prop.value));
                } else if prop.name.eq_ignore_ascii_case("PRODID") && calendar.name.is_none() {
                    calendar.name = Some(decode_text(prop.value));
                }
            }
        }
        i += 1;
    }
    None // ran out of input before END:VCALENDAR
}

fn component_name(begin_line: &str) -> String {
    begin_line
        .split_once(':')
        .map(|(_, v)| v.trim().to_owned())
        .unwrap_or_default()
}

/// Skip a component's body whose matching `END` is expected at or after
/// `lines[start]`, returning how many lines (including the `END`) that took.
fn skip_component(lines: &[String], start: usize, component: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = start;
    while i < lines.len() {
        let line = &lines[i];
        if let Some(name) = begin_component_name(line) {
            if name.eq_ignore_ascii_case(component) {
                depth += 1;
            }
        } else if let Some(name) = end_component_name(line) {
            if name.eq_ignore_ascii_case(component) {
                depth -= 1;
                if depth == 0 {
                    return Some(i - start + 1);
                }
            }
        }
        i += 1;
    }
    None
}

fn begin_component_name(line: &str) -> Option<String> {
    line.split_once(':').and_then(|(head, value)| {
        head.eq_ignore_ascii_case("BEGIN").then(|| value.trim().to_owned())
    })
}

fn end_component_name(line: &str) -> Option<String> {
    line.split_once(':').and_then(|(head, value)| {
        head.eq_ignore_ascii_case("END").then(|| value.trim().to_owned())
    })
}

/// Parse a `VEVENT` body starting right after its `BEGIN:VEVENT` line (which
/// lives at `lines[start - 1]`, included in `raw_ical`). Returns the event
/// and the number of lines consumed, including the closing `END:VEVENT`.
fn parse_event_body(lines: &[String], start: usize) -> Option<(ParsedEvent, usize)> {
    let mut properties: Vec<Property> = Vec::new();
    let mut alarms: Vec<ParsedAlarm> = Vec::new();
    let mut raw_lines: Vec<&str> = vec!["BEGIN:VEVENT"];
    let mut i = start;

    while i < lines.len() {
        let line = &lines[i];
        if is_end(line, "VEVENT") {
            raw_lines.push("END:VEVENT");
            let event = build_event(properties, alarms, raw_lines.join("\r\n"))?;
            return Some((event, i - start + 1));
        }
        if is_begin(line, "VALARM") {
            i += 1;
            let alarm_start = i;
            let consumed = skip_component(lines, i, "VALARM")?;
            let alarm_lines = &lines[alarm_start..alarm_start + consumed - 1];
            raw_lines.push("BEGIN:VALARM");
            raw_lines.extend(alarm_lines.iter().map(String::as_str));
            raw_lines.push("END:VALARM");
            if let Some(trigger) = alarm_lines
                .iter()
                .filter_map(|l| split_content_line(l))
                .find(|p| p.name.eq_ignore_ascii_case("TRIGGER"))
            {
                alarms.push(ParsedAlarm { trigger: trigger.value.to_owned() });
            }
            i += consumed;
            continue;
        }
        if let Some(prop) = split_content_line(line) {
            raw_lines.push(line.as_str());
            properties.push(Property {
                name: prop.name.to_ascii_uppercase(),
                params: prop
                    .params
                    .iter()
                    .map(|(k, v)| (k.to_ascii_uppercase(), (*v).to_owned()))
                    .collect(),
                value: decode_text(prop.value),
                raw_line: line.clone(),
            });
        }
        i += 1;
    }
    None
}

pub(crate) struct SplitLine<'a> {
    pub(crate) name: &'a str,
    pub(crate) params: Vec<(&'a str, &'a str)>,
    pub(crate) value: &'a str,
}

/// Split `NAME;PARAM=VAL;PARAM2="quoted;val":VALUE` into its parts. Only
/// breaks on `:`/`;` outside of double-quoted parameter values, so quoted
/// values may themselves contain either delimiter.
pub(crate) fn split_content_line(line: &str) -> Option<SplitLine<'_>> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i] != b';' && bytes[i] != b':' {
        i += 1;
    }
    if i >= bytes.len() || i == 0 {
        return None;
    }
    let name = &line[..i];

    let mut params = Vec::new();
    while bytes.get(i) == Some(&b';') {
        i += 1;
        let pname_start = i;
        while i < bytes.len() && bytes[i] != b'=' {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        let pname = &line[pname_start..i];
        i += 1; // skip '='
        let pvalue_start = i;
        let mut in_quotes = false;
        while i < bytes.len() {
            match bytes[i] {
                b'"' => in_quotes = !in_quotes,
                b';' | b':' if !in_quotes => break,
                _ => {}
            }
            i += 1;
        }
        params.push((pname, &line[pvalue_start..i]));
        if i >= bytes.len() {
            return None;
        }
    }
    if bytes.get(i) != Some(&b':') {
        return None;
    }
    i += 1;
    Some(SplitLine { name, params, value: &line[i..] })
}

/// Decode RFC 5545 TEXT escapes and strip stray control characters.
fn decode_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\\') => out.push('\\'),
                Some(';') => out.push(';'),
                Some(',') => out.push(','),
                Some('n' | 'N') => out.push('\n'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else if c.is_control() && c != '\t' {
            continue;
        } else {
            out.push(c);
        }
    }
    out
}

fn build_event(properties: Vec<Property>, alarms: Vec<ParsedAlarm>, raw_ical: String) -> Option<ParsedEvent> {
    let find = |name: &str| properties.iter().find(|p| p.name.eq_ignore_ascii_case(name));
    let find_all = |name: &str| -> Vec<&Property> {
        properties.iter().filter(|p| p.name.eq_ignore_ascii_case(name)).collect()
    };

    let uid = find("UID")?.value.clone();
    let dtstart_prop = find("DTSTART")?;
    let dtstart = parse_datetime(&dtstart_prop.value, &dtstart_prop.params).ok()?;
    let tzid = dtstart_prop.param("TZID").map(str::to_owned);

    let dtend = if let Some(p) = find("DTEND") {
        parse_datetime(&p.value, &p.params).ok()
    } else if let Some(p) = find("DURATION") {
        crate::duration::parse_iso8601_duration(&p.value)
            .ok()
            .map(|seconds| ParsedDateTime {
                millis_utc: dtstart.millis_utc + seconds * 1000,
                is_date_only: dtstart.is_date_only,
            })
    } else {
        None
    };

    let recurrence_id = find("RECURRENCE-ID").and_then(|p| parse_datetime(&p.value, &p.params).ok());

    let dtstamp = find("DTSTAMP")
        .and_then(|p| parse_datetime(&p.value, &p.params).ok())
        .unwrap_or(dtstart);

    let exdate = find_all("EXDATE")
        .into_iter()
        .flat_map(|p| {
            let params = p.params.clone();
            p.value
                .split(',')
                .filter_map(move |v| parse_datetime(v.trim(), &params).ok())
                .map(|dt| dt.millis_utc)
                .collect::<Vec<_>>()
        })
        .collect();

    let rdate = find_all("RDATE").into_iter().map(|p| p.value.clone()).collect();
    let attendees = find_all("ATTENDEE").into_iter().map(|p| p.value.clone()).collect();

    Some(ParsedEvent {
        uid,
        summary: find("SUMMARY").map(|p| p.value.clone()),
        location: find("LOCATION").map(|p| p.value.clone()),
        description: find("DESCRIPTION").map(|p| p.value.clone()),
        dtstart,
        dtend,
        tzid,
        recurrence_id,
        status: find("STATUS").map(|p| p.value.clone()),
        transparency: find("TRANSP")
            .map(|p| {
                if p.value.eq_ignore_ascii_case("TRANSPARENT") {
                    TimeTransparency::Transparent
                } else {
                    TimeTransparency::Opaque
                }
            })
            .unwrap_or_default(),
        classification: find("CLASS")
            .map(|p| match p.value.to_ascii_uppercase().as_str() {
                "PRIVATE" => Classification::Private,
                "CONFIDENTIAL" => Classification::Confidential,
                _ => Classification::Public,
            })
            .unwrap_or_default(),
        organizer: find("ORGANIZER").map(|p| p.value.clone()),
        attendees,
        sequence: find("SEQUENCE").and_then(|p| p.value.parse().ok()).unwrap_or(0),
        dtstamp,
        last_modified: find("LAST-MODIFIED").and_then(|p| parse_datetime(&p.value, &p.params).ok()),
        rrule: find("RRULE").map(|p| p.value.clone()),
        rdate,
        exdate,
        alarms,
        properties,
        raw_ical,
    })
}

fn parse_datetime(value: &str, params: &[(String, String)]) -> Result<ParsedDateTime, ParseError> {
    let invalid = || ParseError::InvalidValue("DATE-TIME".into(), value.into());

    let explicit_date = params
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("VALUE") && v.eq_ignore_ascii_case("DATE"));
    let looks_like_date = value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit());

    if explicit_date || looks_like_date {
        let date = jiff::civil::Date::strptime("%Y%m%d", value).map_err(|_| invalid())?;
        let zoned = date
            .to_datetime(jiff::civil::Time::midnight())
            .to_zoned(jiff::tz::TimeZone::UTC)
            .map_err(|_| invalid())?;
        return Ok(ParsedDateTime { millis_utc: zoned.timestamp().as_millisecond(), is_date_only: true });
    }

    let (raw, is_utc) = match value.strip_suffix('Z') {
        Some(v) => (v, true),
        None => (value, false),
    };
    let dt = jiff::civil::DateTime::strptime("%Y%m%dT%H%M%S", raw).map_err(|_| invalid())?;
    let tz = if is_utc {
        jiff::tz::TimeZone::UTC
    } else if let Some((_, tzid)) = params.iter().find(|(k, _)| k.eq_ignore_ascii_case("TZID")) {
        jiff::tz::TimeZone::get(tzid).unwrap_or(jiff::tz::TimeZone::UTC)
    } else {
        jiff::tz::TimeZone::UTC
    };
    let zoned = dt.to_zoned(tz).map_err(|_| invalid())?;
    Ok(ParsedDateTime { millis_utc: zoned.timestamp().as_millisecond(), is_date_only: false })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = concat!(
        "BEGIN:VCALENDAR\r\n",
        "PRODID:-//Example//EN\r\n",
        "X-WR-CALNAME:Work\r\n",
        "BEGIN:VEVENT\r\n",
        "UID:evt-1@example.com\r\n",
        "DTSTAMP:20260101T000000Z\r\n",
        "DTSTART:20260115T090000Z\r\n",
        "DTEND:20260115T100000Z\r\n",
        "SUMMARY:Long meeting title that spans a fold\r\n",
        " continuation\r\n",
        "DESCRIPTION:Escaped\\, comma and\\nnewline\r\n",
        "BEGIN:VALARM\r\n",
        "ACTION:DISPLAY\r\n",
        "TRIGGER:-PT15M\r\n",
        "END:VALARM\r\n",
        "END:VEVENT\r\n",
        "END:VCALENDAR\r\n",
    );

    #[test]
    fn parses_simple_event_with_fold_and_alarm() {
        let calendars = parse(SIMPLE).unwrap();
        assert_eq!(calendars.len(), 1);
        let cal = &calendars[0];
        assert_eq!(cal.name.as_deref(), Some("Work"));
        assert_eq!(cal.events.len(), 1);
        let event = &cal.events[0];
        assert_eq!(event.uid, "evt-1@example.com");
        assert_eq!(
            event.summary.as_deref(),
            Some("Long meeting title that spans a foldcontinuation")
        );
        assert_eq!(event.description.as_deref(), Some("Escaped, comma and\nnewline"));
        assert_eq!(event.alarms.len(), 1);
        assert_eq!(event.alarms[0].trigger, "-PT15M");
        assert!(event.raw_ical.starts_with("BEGIN:VEVENT"));
        assert!(event.raw_ical.ends_with("END:VEVENT"));
    }

    #[test]
    fn date_only_value_is_midnight_utc() {
        let src = concat!(
            "BEGIN:VCALENDAR\r\n",
            "BEGIN:VEVENT\r\n",
            "UID:evt-allday@example.com\r\n",
            "DTSTART;VALUE=DATE:20260301\r\n",
            "DTSTAMP:20260101T000000Z\r\n",
            "END:VEVENT\r\n",
            "END:VCALENDAR\r\n",
        );
        let calendars = parse(src).unwrap();
        let event = &calendars[0].events[0];
        assert!(event.dtstart.is_date_only);
    }

    #[test]
    fn truncated_event_is_dropped_not_fatal() {
        let src = concat!(
            "BEGIN:VCALENDAR\r\n",
            "BEGIN:VEVENT\r\n",
            "UID:evt-1@example.com\r\n",
            "DTSTART:20260101T000000Z\r\n",
        );
        assert!(parse(src).unwrap().is_empty());
    }

    #[test]
    fn no_calendar_at_all_is_an_error() {
        assert!(matches!(parse("not an ics file at all"), Err(ParseError::NoCalendar)));
    }

    #[test]
    fn vtodo_and_vtimezone_are_skipped() {
        let src = concat!(
            "BEGIN:VCALENDAR\r\n",
            "BEGIN:VTIMEZONE\r\n",
            "TZID:America/New_York\r\n",
            "END:VTIMEZONE\r\n",
            "BEGIN:VTODO\r\n",
            "UID:todo-1@example.com\r\n",
            "END:VTODO\r\n",
            "BEGIN:VEVENT\r\n",
            "UID:evt-1@example.com\r\n",
            "DTSTART:20260101T000000Z\r\n",
            "DTSTAMP:20260101T000000Z\r\n",
            "END:VEVENT\r\n",
            "END:VCALENDAR\r\n",
        );
        let calendars = parse(src).unwrap();
        assert_eq!(calendars[0].events.len(), 1);
    }

    #[test]
    fn cancelled_override_filtered_and_recorded() {
        let src = concat!(
            "BEGIN:VCALENDAR\r\n",
            "BEGIN:VEVENT\r\n",
            "UID:evt-1@example.com\r\n",
            "DTSTART:20260101T090000Z\r\n",
            "DTSTAMP:20260101T000000Z\r\n",
            "RRULE:FREQ=DAILY;COUNT=5\r\n",
            "END:VEVENT\r\n",
            "BEGIN:VEVENT\r\n",
            "UID:evt-1@example.com\r\n",
            "RECURRENCE-ID:20260102T090000Z\r\n",
            "DTSTART:20260102T090000Z\r\n",
            "DTSTAMP:20260101T000000Z\r\n",
            "STATUS:CANCELLED\r\n",
            "END:VEVENT\r\n",
            "END:VCALENDAR\r\n",
        );
        let calendars = parse(src).unwrap();
        let cal = &calendars[0];
        assert_eq!(cal.events.len(), 1);
        assert!(cal.events[0].is_master());
        assert_eq!(cal.implicit_exdates.len(), 1);
    }
}
