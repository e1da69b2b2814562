// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Parse and serialize RFC 5545 iCalendar data with raw-form preservation.
//!
//! This crate is deliberately narrower than a general-purpose iCalendar
//! library: it models exactly the shape a CalDAV sync engine needs —
//! master/override events, opaque passthrough of properties the engine
//! doesn't own, and a patch-based serializer that only rewrites what
//! changed.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing
)]
#![allow(clippy::similar_names, clippy::single_match_else, clippy::match_bool)]

mod cancel;
mod duration;
mod error;
mod lexer;
mod model;
mod parser;
mod serializer;
mod validity;

pub use crate::duration::parse_iso8601_duration;
pub use crate::error::ParseError;
pub use crate::model::{
    Classification, ParsedAlarm, ParsedCalendar, ParsedDateTime, ParsedEvent, Property,
    TimeTransparency,
};
pub use crate::parser::parse;
pub use crate::serializer::{format_fresh, patch, serialize_with_exceptions};
pub use crate::validity::{extract_calendar_name, is_valid_ics};
