// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Parse error taxonomy.
//!
//! The parser is deliberately tolerant (see [`crate::parse`] docs): most of
//! these variants are only produced when there is nothing at all to recover,
//! such as an empty input or a component that never opens.

use thiserror::Error;

/// Errors produced while parsing iCalendar source.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input had no `BEGIN:VCALENDAR` at all.
    #[error("no VCALENDAR component found")]
    NoCalendar,

    /// A component's `BEGIN` has no matching `END` and the input was
    /// truncated before it could be recovered.
    #[error("unterminated component: {0}")]
    UnterminatedComponent(String),

    /// A required property was missing from a component (e.g. `UID`).
    #[error("missing required property {0} in {1}")]
    MissingProperty(&'static str, &'static str),

    /// A property value could not be interpreted as the type the model
    /// requires (e.g. a malformed DATE-TIME).
    #[error("invalid value for property {0}: {1}")]
    InvalidValue(String, String),
}
