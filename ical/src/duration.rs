// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! ISO-8601 / RFC 5545 `dur-value` parsing (`PnWnDTnHnMnS`).

use crate::error::ParseError;

/// Parse an RFC 5545 duration value (`["+" / "-"] "P" (dur-date / dur-time / dur-week)`)
/// into a signed number of seconds.
///
/// Supports weeks, days, hours, minutes and seconds; fractional values are
/// not part of the grammar and are rejected.
pub fn parse_iso8601_duration(value: &str) -> Result<i64, ParseError> {
    let invalid = || ParseError::InvalidValue("DURATION".into(), value.into());

    let mut rest = value;
    let sign = match rest.as_bytes().first() {
        Some(b'-') => {
            rest = &rest[1..];
            -1
        }
        Some(b'+') => {
            rest = &rest[1..];
            1
        }
        _ => 1,
    };

    rest = rest.strip_prefix('P').ok_or_else(invalid)?;

    // dur-week = 1*DIGIT "W", mutually exclusive with every other unit.
    if let Some(weeks) = rest.strip_suffix('W') {
        let n: i64 = weeks.parse().map_err(|_| invalid())?;
        return Ok(sign * n * 7 * 24 * 3600);
    }

    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut seconds: i64 = 0;
    let mut cursor = date_part;
    if let Some((n, unit, tail)) = take_unit(cursor)? {
        if unit != b'D' {
            return Err(invalid());
        }
        seconds += n * 86_400;
        cursor = tail;
    }
    if !cursor.is_empty() {
        return Err(invalid());
    }

    if let Some(time_part) = time_part {
        let mut cursor = time_part;
        if cursor.is_empty() {
            return Err(invalid());
        }
        if let Some((n, unit, tail)) = take_unit(cursor)? {
            if unit == b'H' {
                seconds += n * 3600;
                cursor = tail;
            }
        }
        if let Some((n, unit, tail)) = take_unit(cursor)? {
            if unit == b'M' {
                seconds += n * 60;
                cursor = tail;
            }
        }
        if let Some((n, unit, tail)) = take_unit(cursor)? {
            if unit == b'S' {
                seconds += n;
                cursor = tail;
            }
        }
        if !cursor.is_empty() {
            return Err(invalid());
        }
    }

    Ok(sign * seconds)
}

/// Consume a leading `1*DIGIT <unit-byte>` from `s`, returning the parsed
/// number, the unit byte, and the remainder. Returns `Ok(None)` if `s`
/// doesn't start with a digit (caller decides whether that's fine).
fn take_unit(s: &str) -> Result<Option<(i64, u8, &str)>, ParseError> {
    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digits_end == 0 {
        return Ok(None);
    }
    let digits = &s[..digits_end];
    let rest = &s[digits_end..];
    let unit = rest.as_bytes().first().copied().ok_or_else(|| {
        ParseError::InvalidValue("DURATION".into(), s.into())
    })?;
    let n: i64 = digits
        .parse()
        .map_err(|_| ParseError::InvalidValue("DURATION".into(), s.into()))?;
    Ok(Some((n, unit, &rest[1..])))
}
