// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Request builders for `CalDAV` operations.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::CalDavError;
use crate::xml::ns;

fn finish(writer: Writer<Cursor<Vec<u8>>>) -> Result<String, CalDavError> {
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes)
        .map_err(|e| CalDavError::InvalidResponse(format!("non-UTF-8 request body: {e}")))
}

/// PROPFIND request builder.
#[derive(Debug)]
pub struct PropFindRequest {
    props: Vec<Prop>,
}

/// Properties to request in PROPFIND.
#[derive(Debug, Clone, Copy)]
pub enum Prop {
    /// Display name.
    DisplayName,
    /// Resource type.
    ResourceType,
    /// `ETag`.
    GetETag,
    /// Calendar data.
    CalendarData,
    /// Calendar home set.
    CalendarHomeSet,
    /// Supported calendar components.
    SupportedCalendarComponents,
    /// Calendar description.
    CalendarDescription,
    /// Calendar timezone.
    CalendarTimezone,
    /// Collection tag (`CalendarServer` namespace).
    GetCTag,
    /// Current sync-token (RFC 6578).
    SyncToken,
    /// `current-user-principal`, used for principal discovery.
    CurrentUserPrincipal,
}

impl Prop {
    const fn name(self) -> &'static str {
        match self {
            Self::DisplayName => "displayname",
            Self::ResourceType => "resourcetype",
            Self::GetETag => "getetag",
            Self::CalendarData => "calendar-data",
            Self::CalendarHomeSet => "calendar-home-set",
            Self::SupportedCalendarComponents => "supported-calendar-component-set",
            Self::CalendarDescription => "calendar-description",
            Self::CalendarTimezone => "calendar-timezone",
            Self::GetCTag => "getctag",
            Self::SyncToken => "sync-token",
            Self::CurrentUserPrincipal => "current-user-principal",
        }
    }

    const fn namespace(self) -> &'static str {
        match self {
            Self::DisplayName | Self::ResourceType | Self::GetETag | Self::SyncToken => ns::DAV,
            Self::CurrentUserPrincipal => ns::DAV,
            Self::CalendarData
            | Self::CalendarHomeSet
            | Self::SupportedCalendarComponents
            | Self::CalendarDescription
            | Self::CalendarTimezone => ns::CALDAV,
            Self::GetCTag => ns::CALENDARSERVER,
        }
    }

    const fn prefix(self) -> &'static str {
        match self.namespace() {
            ns::CALDAV => "C",
            ns::CALENDARSERVER => "CS",
            _ => "D",
        }
    }
}

impl PropFindRequest {
    /// Creates a new PROPFIND request.
    #[must_use]
    pub fn new() -> Self {
        Self { props: Vec::new() }
    }

    /// Adds a property to the request.
    pub fn add_property(&mut self, prop: Prop) -> &mut Self {
        self.props.push(prop);
        self
    }

    /// Builds the XML body for the PROPFIND request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CalDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        let mut propfind = BytesStart::new("D:propfind");
        propfind.push_attribute(("xmlns:D", ns::DAV));
        if self.props.iter().any(|p| p.namespace() == ns::CALDAV) {
            propfind.push_attribute(("xmlns:C", ns::CALDAV));
        }
        if self.props.iter().any(|p| p.namespace() == ns::CALENDARSERVER) {
            propfind.push_attribute(("xmlns:CS", ns::CALENDARSERVER));
        }
        writer.write_event(Event::Start(propfind))?;
        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;

        for prop in &self.props {
            let tag = format!("{}:{}", prop.prefix(), prop.name());
            writer.write_event(Event::Start(BytesStart::new(tag.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
        }

        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;
        writer.write_event(Event::End(BytesEnd::new("D:propfind")))?;

        finish(writer)
    }
}

impl Default for PropFindRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Calendar query request builder.
#[derive(Debug)]
pub struct CalendarQueryRequest {
    time_range: Option<TimeRange>,
    text_match: Option<TextMatch>,
    component: Option<String>,
    etag_only: bool,
}

/// Time range filter for calendar queries.
#[derive(Debug, Clone)]
pub struct TimeRange {
    /// Start date/time.
    pub start: String,
    /// End date/time.
    pub end: Option<String>,
}

/// Text match filter for calendar queries.
#[derive(Debug, Clone)]
pub struct TextMatch {
    /// Text to search for.
    pub text: String,
    /// Collation to use.
    pub collation: Option<String>,
    /// Whether to negate the match.
    pub negate: bool,
}

impl CalendarQueryRequest {
    /// Creates a new calendar query request.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            time_range: None,
            text_match: None,
            component: None,
            etag_only: false,
        }
    }

    /// Sets the time range filter.
    #[must_use]
    pub fn time_range(mut self, start: String, end: Option<String>) -> Self {
        self.time_range = Some(TimeRange { start, end });
        self
    }

    /// Sets the component filter (VEVENT, VTODO, etc.).
    #[must_use]
    pub fn component(mut self, component: String) -> Self {
        self.component = Some(component);
        self
    }

    /// Sets a text-match filter.
    #[must_use]
    pub fn text_match(mut self, text_match: TextMatch) -> Self {
        self.text_match = Some(text_match);
        self
    }

    /// Requests only `getetag`, omitting `calendar-data` — used for
    /// etag-diff sync, which needs just the change set.
    #[must_use]
    pub const fn etag_only(mut self) -> Self {
        self.etag_only = true;
        self
    }

    /// Builds the XML body for the calendar query request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CalDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        let mut calendar_query = BytesStart::new("C:calendar-query");
        calendar_query.push_attribute(("xmlns:D", ns::DAV));
        calendar_query.push_attribute(("xmlns:C", ns::CALDAV));
        writer.write_event(Event::Start(calendar_query))?;

        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        writer.write_event(Event::Start(BytesStart::new("D:getetag")))?;
        writer.write_event(Event::End(BytesEnd::new("D:getetag")))?;
        if !self.etag_only {
            writer.write_event(Event::Start(BytesStart::new("C:calendar-data")))?;
            writer.write_event(Event::End(BytesEnd::new("C:calendar-data")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        writer.write_event(Event::Start(BytesStart::new("C:filter")))?;

        let mut comp_filter = BytesStart::new("C:comp-filter");
        comp_filter.push_attribute(("name", "VCALENDAR"));
        writer.write_event(Event::Start(comp_filter))?;

        if let Some(component) = &self.component {
            let mut comp_filter_inner = BytesStart::new("C:comp-filter");
            comp_filter_inner.push_attribute(("name", component.as_str()));
            writer.write_event(Event::Start(comp_filter_inner))?;

            if let Some(tr) = &self.time_range {
                let mut time_range = BytesStart::new("C:time-range");
                time_range.push_attribute(("start", tr.start.as_str()));
                if let Some(end) = &tr.end {
                    time_range.push_attribute(("end", end.as_str()));
                }
                writer.write_event(Event::Empty(time_range))?;
            }

            if let Some(tm) = &self.text_match {
                writer.write_event(Event::Start(BytesStart::new("C:prop-filter")))?;
                let mut text_match = BytesStart::new("C:text-match");
                if tm.negate {
                    text_match.push_attribute(("negate-condition", "yes"));
                }
                if let Some(collation) = &tm.collation {
                    text_match.push_attribute(("collation", collation.as_str()));
                }
                writer.write_event(Event::Start(text_match))?;
                writer.write_event(Event::Text(BytesText::new(&tm.text)))?;
                writer.write_event(Event::End(BytesEnd::new("C:text-match")))?;
                writer.write_event(Event::End(BytesEnd::new("C:prop-filter")))?;
            }

            writer.write_event(Event::End(BytesEnd::new("C:comp-filter")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("C:comp-filter")))?;
        writer.write_event(Event::End(BytesEnd::new("C:filter")))?;
        writer.write_event(Event::End(BytesEnd::new("C:calendar-query")))?;

        finish(writer)
    }
}

impl Default for CalendarQueryRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Calendar multiget request builder.
#[derive(Debug)]
pub struct CalendarMultiGetRequest {
    hrefs: Vec<String>,
    etag_only: bool,
}

impl CalendarMultiGetRequest {
    /// Creates a new calendar multiget request.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hrefs: Vec::new(),
            etag_only: false,
        }
    }

    /// Adds an href to the request.
    pub fn add_href(&mut self, href: String) -> &mut Self {
        self.hrefs.push(href);
        self
    }

    /// Requests only `getetag`, omitting `calendar-data`.
    pub fn etag_only(&mut self) -> &mut Self {
        self.etag_only = true;
        self
    }

    /// Builds the XML body for the calendar multiget request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CalDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        let mut multiget = BytesStart::new("C:calendar-multiget");
        multiget.push_attribute(("xmlns:D", ns::DAV));
        multiget.push_attribute(("xmlns:C", ns::CALDAV));
        writer.write_event(Event::Start(multiget))?;

        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        writer.write_event(Event::Start(BytesStart::new("D:getetag")))?;
        writer.write_event(Event::End(BytesEnd::new("D:getetag")))?;
        if !self.etag_only {
            writer.write_event(Event::Start(BytesStart::new("C:calendar-data")))?;
            writer.write_event(Event::End(BytesEnd::new("C:calendar-data")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        for href in &self.hrefs {
            writer.write_event(Event::Start(BytesStart::new("D:href")))?;
            writer.write_event(Event::Text(BytesText::new(href.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new("D:href")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("C:calendar-multiget")))?;

        finish(writer)
    }
}

impl Default for CalendarMultiGetRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// `sync-collection` REPORT request builder (RFC 6578).
#[derive(Debug)]
pub struct SyncCollectionRequest {
    sync_token: Option<String>,
}

impl SyncCollectionRequest {
    /// Creates a request for the initial sync (empty sync-token).
    #[must_use]
    pub const fn new() -> Self {
        Self { sync_token: None }
    }

    /// Creates a request continuing from a previously returned sync-token.
    #[must_use]
    pub fn from_token(token: String) -> Self {
        Self {
            sync_token: Some(token),
        }
    }

    /// Builds the XML body for the sync-collection request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CalDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        let mut sync_collection = BytesStart::new("D:sync-collection");
        sync_collection.push_attribute(("xmlns:D", ns::DAV));
        sync_collection.push_attribute(("xmlns:C", ns::CALDAV));
        writer.write_event(Event::Start(sync_collection))?;

        writer.write_event(Event::Start(BytesStart::new("D:sync-token")))?;
        if let Some(token) = &self.sync_token {
            writer.write_event(Event::Text(BytesText::new(token)))?;
        }
        writer.write_event(Event::End(BytesEnd::new("D:sync-token")))?;

        writer.write_event(Event::Start(BytesStart::new("D:sync-level")))?;
        writer.write_event(Event::Text(BytesText::new("1")))?;
        writer.write_event(Event::End(BytesEnd::new("D:sync-level")))?;

        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        writer.write_event(Event::Start(BytesStart::new("D:getetag")))?;
        writer.write_event(Event::End(BytesEnd::new("D:getetag")))?;
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        writer.write_event(Event::End(BytesEnd::new("D:sync-collection")))?;

        finish(writer)
    }
}

impl Default for SyncCollectionRequest {
    fn default() -> Self {
        Self::new()
    }
}
