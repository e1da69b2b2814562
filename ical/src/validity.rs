// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Cheap pre-flight checks that don't require a full parse.

/// True if `src` looks like a well-formed single-resource iCalendar document:
/// a `BEGIN:VCALENDAR` containing at least one `BEGIN:VEVENT`, `BEGIN:VTODO`
/// or `BEGIN:VJOURNAL` before its matching `END:VCALENDAR`.
///
/// This is a fast line scan, not a parse; it's meant to reject obviously
/// empty or non-calendar payloads (e.g. an HTML error page returned with a
/// `200` status) before spending a full parse on them.
#[must_use]
pub fn is_valid_ics(src: &str) -> bool {
    let mut in_calendar = false;
    let mut saw_component = false;
    for line in src.lines().map(str::trim_end) {
        let line = line.trim_start_matches('\u{feff}');
        if line.eq_ignore_ascii_case("BEGIN:VCALENDAR") {
            in_calendar = true;
        } else if line.eq_ignore_ascii_case("END:VCALENDAR") {
            return in_calendar && saw_component;
        } else if in_calendar
            && (line.eq_ignore_ascii_case("BEGIN:VEVENT")
                || line.eq_ignore_ascii_case("BEGIN:VTODO")
                || line.eq_ignore_ascii_case("BEGIN:VJOURNAL"))
        {
            saw_component = true;
        }
    }
    false
}

/// Extract a human-readable calendar name: `X-WR-CALNAME` if present,
/// otherwise `PRODID`, otherwise `None`.
///
/// Scans only the `VCALENDAR` header properties (before the first `BEGIN:`
/// of a subcomponent), so it never picks up an identically-named property
/// nested inside a `VEVENT`.
#[must_use]
pub fn extract_calendar_name(src: &str) -> Option<String> {
    let mut prodid = None;
    for line in src.lines().map(str::trim_end) {
        let line = line.trim_start_matches('\u{feff}');
        if line.eq_ignore_ascii_case("BEGIN:VEVENT")
            || line.eq_ignore_ascii_case("BEGIN:VTODO")
            || line.eq_ignore_ascii_case("BEGIN:VJOURNAL")
            || line.eq_ignore_ascii_case("BEGIN:VTIMEZONE")
        {
            break;
        }
        if let Some(value) = strip_property(line, "X-WR-CALNAME") {
            return Some(value.to_owned());
        }
        if prodid.is_none() {
            if let Some(value) = strip_property(line, "PRODID") {
                prodid = Some(value.to_owned());
            }
        }
    }
    prodid
}

/// If `line` is `name[;params]:value` for the given (case-insensitive) name,
/// return the value portion.
fn strip_property<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let colon = line.find(':')?;
    let head = &line[..colon];
    let head_name = head.split(';').next().unwrap_or(head);
    if head_name.eq_ignore_ascii_case(name) {
        Some(&line[colon + 1..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_minimal_calendar() {
        let src = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        assert!(is_valid_ics(src));
    }

    #[test]
    fn rejects_empty_calendar() {
        let src = "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n";
        assert!(!is_valid_ics(src));
    }

    #[test]
    fn rejects_non_calendar_payload() {
        assert!(!is_valid_ics("<html><body>not found</body></html>"));
    }

    #[test]
    fn prefers_calname_over_prodid() {
        let src = "BEGIN:VCALENDAR\r\nPRODID:-//Example//EN\r\nX-WR-CALNAME:Work\r\nBEGIN:VEVENT\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        assert_eq!(extract_calendar_name(src).as_deref(), Some("Work"));
    }

    #[test]
    fn falls_back_to_prodid() {
        let src = "BEGIN:VCALENDAR\r\nPRODID:-//Example//EN\r\nEND:VCALENDAR\r\n";
        assert_eq!(extract_calendar_name(src).as_deref(), Some("-//Example//EN"));
    }
}
