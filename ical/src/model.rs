// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! The typed AST the parser produces and the serializer consumes.

use std::collections::BTreeMap;

/// A raw, unfolded, unescaped property occurrence: `NAME;PARAM=VAL:VALUE`.
///
/// Parameters preserve their original case and order for properties the
/// model doesn't own (`X-*`, `ATTENDEE`, `ATTACH`, `GEO`, `CATEGORIES`, ...),
/// so patch-serialization can reproduce them byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Property name, upper-cased (`SUMMARY`, `X-APPLE-TRAVEL-ADVISORY-BEHAVIOR`, ...).
    pub name: String,
    /// Parameters in declaration order, name upper-cased, value as written
    /// (still quoted if it was quoted in the source).
    pub params: Vec<(String, String)>,
    /// The decoded value (TEXT escapes resolved). Multi-valued TEXT
    /// properties keep their comma join; splitting is the caller's job.
    pub value: String,
    /// The exact source line (post-unfolding, pre-escape-decoding), used to
    /// reproduce properties the model doesn't own byte-for-byte.
    pub raw_line: String,
}

impl Property {
    /// Look up a parameter by name, case-insensitively.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A date or date-time value, distinguishing DATE from DATE-TIME and
/// carrying the original TZID when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDateTime {
    /// Milliseconds since the Unix epoch, UTC.
    pub millis_utc: i64,
    /// True if the source value had `VALUE=DATE` (no time-of-day).
    pub is_date_only: bool,
}

/// `CLASS` classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Classification {
    /// `PUBLIC` or absent.
    #[default]
    Public,
    /// `PRIVATE`.
    Private,
    /// `CONFIDENTIAL`.
    Confidential,
}

/// `TRANSP` time transparency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeTransparency {
    /// `OPAQUE` or absent — blocks time.
    #[default]
    Opaque,
    /// `TRANSPARENT` — does not block time.
    Transparent,
}

/// A `VALARM` reminder, reduced to the one shape the model owns: a negative
/// ISO-8601 duration relative to `DTSTART`, displayed with `ACTION:DISPLAY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAlarm {
    /// The raw `TRIGGER` value, e.g. `-PT15M`, `-P1D`.
    pub trigger: String,
}

/// A parsed `VEVENT`, either a recurrence master or a detached override.
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    pub uid: String,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub dtstart: ParsedDateTime,
    pub dtend: Option<ParsedDateTime>,
    pub tzid: Option<String>,
    /// `RECURRENCE-ID`, set only on overrides.
    pub recurrence_id: Option<ParsedDateTime>,
    pub status: Option<String>,
    pub transparency: TimeTransparency,
    pub classification: Classification,
    pub organizer: Option<String>,
    pub attendees: Vec<String>,
    pub sequence: u32,
    pub dtstamp: ParsedDateTime,
    pub last_modified: Option<ParsedDateTime>,
    /// Raw `RRULE` value, unparsed — the sync engine treats it as opaque text.
    pub rrule: Option<String>,
    /// Raw comma-joined `RDATE` value(s).
    pub rdate: Vec<String>,
    /// Raw comma-joined `EXDATE` value(s), already expressed in ms UTC.
    pub exdate: Vec<i64>,
    pub alarms: Vec<ParsedAlarm>,
    /// Every property this VEVENT carried, in source order, for round-trip
    /// and patch-based re-serialization.
    pub properties: Vec<Property>,
    /// The exact source text of this VEVENT block (`BEGIN:VEVENT` through
    /// `END:VEVENT`, unfolded), preserved for patching.
    pub raw_ical: String,
}

impl ParsedEvent {
    /// True if this is a recurrence master (has `RRULE`, no `RECURRENCE-ID`).
    #[must_use]
    pub fn is_master(&self) -> bool {
        self.rrule.is_some() && self.recurrence_id.is_none()
    }

    /// True if this is a detached override (`RECURRENCE-ID` present).
    #[must_use]
    pub fn is_override(&self) -> bool {
        self.recurrence_id.is_some()
    }
}

/// The result of parsing one `VCALENDAR`.
#[derive(Debug, Clone, Default)]
pub struct ParsedCalendar {
    /// `X-WR-CALNAME` or `PRODID`, whichever was found first.
    pub name: Option<String>,
    /// `VEVENT`s surviving the cancellation filter (see [`crate::parse`]),
    /// masters and overrides together, in source order.
    pub events: Vec<ParsedEvent>,
    /// EXDATE instants (ms UTC) implicitly introduced by a cancelled
    /// override, keyed by the master's UID. The caller should merge these
    /// into the master's `exdate` list.
    pub implicit_exdates: BTreeMap<String, Vec<i64>>,
}
