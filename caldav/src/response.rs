// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Response parsers for WebDAV/CalDAV operations.

use quick_xml::events::Event;

use crate::error::CalDavError;
use crate::types::{CalendarCollection, CalendarResource, ETag, Href};

/// `WebDAV` multistatus response.
#[derive(Debug, Clone)]
pub struct MultiStatusResponse {
    /// The response items.
    pub responses: Vec<ResponseItem>,
    /// `current-user-principal`, when the request asked for it — this
    /// lives outside any single `<response>` on some servers, so it's
    /// tracked at the document level rather than per-item.
    pub current_user_principal: Option<Href>,
    /// The new sync-token, present as a direct child of `<multistatus>` in
    /// a `sync-collection` REPORT response.
    pub sync_token: Option<String>,
}

/// Individual response in multistatus.
#[derive(Debug, Clone)]
pub struct ResponseItem {
    pub href: Href,
    pub prop_stats: Vec<PropStat>,
    pub status: Option<String>,
}

/// Property stat with status and value.
#[derive(Debug, Clone)]
pub struct PropStat {
    pub props: Properties,
    pub status: String,
}

/// WebDAV/CalDAV properties.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    pub display_name: Option<String>,
    pub resource_type: Option<Vec<String>>,
    pub get_etag: Option<ETag>,
    pub calendar_data: Option<String>,
    pub calendar_home_set: Vec<Href>,
    pub supported_calendar_components: Option<Vec<String>>,
    pub calendar_description: Option<String>,
    pub calendar_timezone: Option<String>,
    pub get_ctag: Option<String>,
    pub sync_token: Option<String>,
    pub current_user_principal: Option<Href>,
    pub is_calendar: bool,
    pub is_collection: bool,
}

impl MultiStatusResponse {
    /// Parses multistatus response from XML.
    ///
    /// Elements in unexpected order are accepted; malformed XML returns an
    /// empty result rather than an error, since several servers emit
    /// slightly-off multistatus bodies that are still usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying XML reader fails outright (not on
    /// merely-unexpected structure).
    #[expect(clippy::too_many_lines)]
    pub fn from_xml(xml: &str) -> Result<Self, CalDavError> {
        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        reader.config_mut().check_end_names = false;

        let mut responses = Vec::new();
        let mut current_response: Option<ResponseItem> = None;
        let mut current_prop_stats: Vec<PropStat> = Vec::new();
        let mut current_props = Properties::default();
        let mut current_user_principal = None;
        let mut sync_token = None;
        let mut in_prop = false;
        let mut in_response = false;
        let mut in_propstat = false;

        let mut buf = Vec::new();

        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(_) => {
                    return Ok(Self {
                        responses,
                        current_user_principal,
                        sync_token,
                    });
                }
            };
            match event {
                Event::End(ref e) if e.name().local_name().into_inner() == b"multistatus" => break,
                Event::Eof => break,

                Event::Start(ref e) => match e.name().local_name().into_inner() {
                    b"response" => {
                        in_response = true;
                        current_response = Some(ResponseItem {
                            href: Href::new(String::new()),
                            prop_stats: Vec::new(),
                            status: None,
                        });
                    }
                    b"href" if in_response => {
                        if let Ok(Event::Text(text)) = reader.read_event_into(&mut buf) {
                            let href = text.unescape().map(|s| s.to_string()).unwrap_or_default();
                            if let Some(ref mut resp) = current_response {
                                resp.href = Href::new(href);
                            }
                        }
                    }
                    b"sync-token" if !in_response => {
                        if let Ok(Event::Text(text)) = reader.read_event_into(&mut buf) {
                            sync_token = text.unescape().ok().map(|s| s.to_string());
                        }
                    }
                    b"status" if in_response && !in_propstat => {
                        if let Ok(Event::Text(text)) = reader.read_event_into(&mut buf) {
                            let status = text.unescape().map(|s| s.to_string()).unwrap_or_default();
                            if let Some(ref mut resp) = current_response {
                                resp.status = Some(status);
                            }
                        }
                    }
                    b"propstat" if in_response => {
                        in_propstat = true;
                        current_props = Properties::default();
                    }

                    b"prop" => in_prop = true,

                    b"displayname" if in_prop => {
                        if let Ok(Event::Text(text)) = reader.read_event_into(&mut buf) {
                            current_props.display_name = text.unescape().ok().map(|s| s.to_string());
                        }
                    }
                    b"resourcetype" if in_prop => {
                        current_props.is_collection = true;
                        loop {
                            match reader.read_event_into(&mut buf) {
                                Ok(Event::End(ref e))
                                    if e.name().local_name().into_inner() == b"resourcetype" =>
                                {
                                    break;
                                }
                                Ok(Event::Start(ref e) | Event::Empty(ref e)) => {
                                    if e.name().local_name().into_inner() == b"calendar" {
                                        current_props.is_calendar = true;
                                    }
                                }
                                Ok(Event::Eof) | Err(_) => break,
                                _ => {}
                            }
                        }
                    }
                    b"getetag" if in_prop => {
                        if let Ok(Event::Text(text)) = reader.read_event_into(&mut buf) {
                            current_props.get_etag =
                                text.unescape().ok().map(|s| ETag::new(s.to_string()));
                        }
                    }
                    b"calendar-data" if in_prop => {
                        if let Ok(Event::Text(text)) = reader.read_event_into(&mut buf) {
                            current_props.calendar_data =
                                text.unescape().ok().map(|s| s.to_string());
                        }
                    }
                    b"getctag" if in_prop => {
                        if let Ok(Event::Text(text)) = reader.read_event_into(&mut buf) {
                            current_props.get_ctag = text.unescape().ok().map(|s| s.to_string());
                        }
                    }
                    b"sync-token" if in_prop => {
                        if let Ok(Event::Text(text)) = reader.read_event_into(&mut buf) {
                            current_props.sync_token = text.unescape().ok().map(|s| s.to_string());
                        }
                    }
                    b"calendar-home-set" if in_prop => {
                        let mut hrefs = Vec::new();
                        loop {
                            match reader.read_event_into(&mut buf) {
                                Ok(Event::End(ref e))
                                    if e.name().local_name().into_inner()
                                        == b"calendar-home-set" =>
                                {
                                    break;
                                }
                                Ok(Event::Start(ref e))
                                    if e.name().local_name().into_inner() == b"href" =>
                                {
                                    if let Ok(Event::Text(text)) =
                                        reader.read_event_into(&mut buf)
                                    {
                                        if let Ok(s) = text.unescape() {
                                            hrefs.push(Href::new(s.to_string()));
                                        }
                                    }
                                }
                                Ok(Event::Eof) | Err(_) => break,
                                _ => {}
                            }
                        }
                        current_props.calendar_home_set = hrefs;
                    }
                    b"current-user-principal" if in_prop => {
                        loop {
                            match reader.read_event_into(&mut buf) {
                                Ok(Event::End(ref e))
                                    if e.name().local_name().into_inner()
                                        == b"current-user-principal" =>
                                {
                                    break;
                                }
                                Ok(Event::Start(ref e))
                                    if e.name().local_name().into_inner() == b"href" =>
                                {
                                    if let Ok(Event::Text(text)) =
                                        reader.read_event_into(&mut buf)
                                    {
                                        if let Ok(s) = text.unescape() {
                                            current_props.current_user_principal =
                                                Some(Href::new(s.to_string()));
                                        }
                                    }
                                }
                                Ok(Event::Eof) | Err(_) => break,
                                _ => {}
                            }
                        }
                    }
                    b"supported-calendar-component-set" if in_prop => {
                        let mut components = Vec::new();
                        loop {
                            match reader.read_event_into(&mut buf) {
                                Ok(Event::End(ref e))
                                    if e.name().local_name().into_inner()
                                        == b"supported-calendar-component-set" =>
                                {
                                    break;
                                }
                                Ok(Event::Start(ref e) | Event::Empty(ref e))
                                    if e.name().local_name().into_inner() == b"comp" =>
                                {
                                    if let Ok(Some(name_attr)) = e.try_get_attribute("name") {
                                        if let Ok(name) = std::str::from_utf8(&name_attr.value) {
                                            components.push(name.to_string());
                                        }
                                    }
                                }
                                Ok(Event::Eof) | Err(_) => break,
                                _ => {}
                            }
                        }
                        current_props.supported_calendar_components = Some(components);
                    }
                    b"calendar-description" if in_prop => {
                        if let Ok(Event::Text(text)) = reader.read_event_into(&mut buf) {
                            current_props.calendar_description =
                                text.unescape().ok().map(|s| s.to_string());
                        }
                    }
                    b"calendar-timezone" if in_prop => {
                        if let Ok(Event::Text(text)) = reader.read_event_into(&mut buf) {
                            current_props.calendar_timezone =
                                text.unescape().ok().map(|s| s.to_string());
                        }
                    }
                    b"status" if in_propstat => {
                        if let Ok(Event::Text(text)) = reader.read_event_into(&mut buf) {
                            let status = text.unescape().map(|s| s.to_string()).unwrap_or_default();
                            current_prop_stats.push(PropStat {
                                props: current_props.clone(),
                                status,
                            });
                        }
                    }
                    _ => {}
                },
                Event::End(ref e) => match e.name().local_name().into_inner() {
                    b"response" if in_response => {
                        in_response = false;
                        if let Some(mut resp) = current_response.take() {
                            resp.prop_stats.clone_from(&current_prop_stats);
                            if current_user_principal.is_none() {
                                current_user_principal = current_prop_stats
                                    .iter()
                                    .find_map(|ps| ps.props.current_user_principal.clone());
                            }
                            current_prop_stats.clear();
                            responses.push(resp);
                        }
                    }
                    b"propstat" if in_propstat => in_propstat = false,
                    b"prop" => in_prop = false,
                    _ => {}
                },
                _ => {}
            }
            buf.clear();
        }

        Ok(Self {
            responses,
            current_user_principal,
            sync_token,
        })
    }

    /// Converts multistatus response to calendar resources, one per
    /// response item that carried a 2xx `calendar-data` property. The body
    /// is returned verbatim; parsing it is left to the caller.
    #[must_use]
    pub fn into_resources(self) -> Vec<CalendarResource> {
        let mut resources = Vec::new();

        for response in self.responses {
            for prop_stat in &response.prop_stats {
                if !(prop_stat.status.contains("200") || prop_stat.status.contains("207")) {
                    continue;
                }
                if let Some(data) = &prop_stat.props.calendar_data {
                    resources.push(CalendarResource::new(
                        response.href.clone(),
                        prop_stat
                            .props
                            .get_etag
                            .clone()
                            .unwrap_or_else(|| ETag::new(String::new())),
                        data.clone(),
                    ));
                }
            }
        }

        resources
    }

    /// Converts multistatus response to `(href, etag)` pairs, for the
    /// etag-only variants of query/multiget.
    #[must_use]
    pub fn into_etags(self) -> Vec<(Href, ETag)> {
        let mut out = Vec::new();
        for response in self.responses {
            for prop_stat in &response.prop_stats {
                if !(prop_stat.status.contains("200") || prop_stat.status.contains("207")) {
                    continue;
                }
                if let Some(etag) = &prop_stat.props.get_etag {
                    out.push((response.href.clone(), etag.clone()));
                }
            }
        }
        out
    }

    /// Splits a `sync-collection` REPORT response into changed and deleted
    /// hrefs, plus the token to persist for next time. A response whose
    /// top-level status (not a propstat's) is 404 or 410 names a deletion;
    /// everything else with an etag is a change.
    #[must_use]
    pub fn into_sync_result(self) -> crate::types::SyncCollectionResult {
        let mut changed = Vec::new();
        let mut deleted = Vec::new();

        for response in &self.responses {
            if let Some(status) = &response.status {
                if status.contains("404") || status.contains("410") {
                    deleted.push(response.href.clone());
                    continue;
                }
            }
            if let Some(etag) = response
                .prop_stats
                .iter()
                .find(|ps| ps.status.contains("200") || ps.status.contains("207"))
                .and_then(|ps| ps.props.get_etag.clone())
            {
                changed.push((response.href.clone(), etag));
            }
        }

        crate::types::SyncCollectionResult {
            new_token: self.sync_token,
            changed,
            deleted,
        }
    }

    /// Converts multistatus response to calendar collections.
    #[must_use]
    pub fn into_collections(self) -> Vec<CalendarCollection> {
        let mut collections = Vec::new();

        for response in self.responses {
            for prop_stat in &response.prop_stats {
                if !(prop_stat.status.contains("200") || prop_stat.status.contains("207")) {
                    continue;
                }
                if prop_stat.props.is_calendar && prop_stat.props.is_collection {
                    let mut collection = CalendarCollection::new(response.href.clone());
                    collection
                        .display_name
                        .clone_from(&prop_stat.props.display_name);
                    collection
                        .description
                        .clone_from(&prop_stat.props.calendar_description);
                    collection.supported_components = prop_stat
                        .props
                        .supported_calendar_components
                        .clone()
                        .unwrap_or_default();
                    collection.ctag = prop_stat
                        .props
                        .get_ctag
                        .clone()
                        .map(ETag::new)
                        .or_else(|| prop_stat.props.get_etag.clone());
                    collection.sync_token.clone_from(&prop_stat.props.sync_token);
                    collections.push(collection);
                }
            }
        }

        collections
    }

    /// Every href inside every `<calendar-home-set>` across all responses,
    /// deduplicated in encounter order. Some servers expose several.
    #[must_use]
    pub fn into_calendar_home_urls(self) -> Vec<Href> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for response in self.responses {
            for prop_stat in &response.prop_stats {
                for href in &prop_stat.props.calendar_home_set {
                    if seen.insert(href.as_str().to_string()) {
                        out.push(href.clone());
                    }
                }
            }
        }
        out
    }
}
