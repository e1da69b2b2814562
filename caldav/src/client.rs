// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! `CalDAV` client for calendar operations.

use std::io::Cursor;
use std::sync::Arc;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use reqwest::Method;
use tracing::{debug, instrument, warn};

use crate::config::CalDavConfig;
use crate::error::CalDavError;
use crate::http::HttpClient;
use crate::request::{
    CalendarMultiGetRequest, CalendarQueryRequest, Prop, PropFindRequest, SyncCollectionRequest,
};
use crate::response::{MultiStatusResponse, Properties};
use crate::types::{CalendarCollection, CalendarResource, ETag, Href, Quirks, SyncCollectionResult};
use crate::xml::ns;

/// Hrefs are multi-get'd in batches of this size, bounding how much parsed
/// iCalendar data is held in memory at once.
const MULTIGET_CHUNK_SIZE: usize = 30;

fn report_method() -> Result<Method, CalDavError> {
    Method::from_bytes(b"REPORT").map_err(|e| CalDavError::Config(format!("invalid method: {e}")))
}

fn propfind_method() -> Result<Method, CalDavError> {
    Method::from_bytes(b"PROPFIND")
        .map_err(|e| CalDavError::Config(format!("invalid method: {e}")))
}

/// `CalDAV` client for accessing and managing calendars on `CalDAV` servers.
///
/// # Example
///
/// ```ignore
/// use calsync_caldav::{CalDavClient, CalDavConfig, AuthMethod};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CalDavConfig {
///     base_url: "https://caldav.example.com".to_string(),
///     calendar_home: "/dav/calendars/user/".to_string(),
///     auth: AuthMethod::Basic {
///         username: "user".to_string(),
///         password: "pass".to_string(),
///     },
///     ..Default::default()
/// };
///
/// let client = CalDavClient::new(config, Default::default())?;
/// let principal = client.discover_principal().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CalDavClient {
    http: Arc<HttpClient>,
    config: CalDavConfig,
    quirks: Quirks,
}

impl CalDavClient {
    /// Creates a new `CalDAV` client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails.
    pub fn new(config: CalDavConfig, quirks: Quirks) -> Result<Self, CalDavError> {
        let http = HttpClient::new(config.clone())?;
        Ok(Self {
            http: Arc::new(http),
            config,
            quirks,
        })
    }

    /// Resolves an href (which may be relative, or absolute on a different
    /// host than `base_url`) against this client's base URL, applying the
    /// canonical-host quirk if configured.
    fn resolve(&self, href: &str) -> String {
        let absolute = if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}{}", self.config.base_url.trim_end_matches('/'), href)
        };
        self.apply_canonical_host(absolute)
    }

    fn apply_canonical_host(&self, url: String) -> String {
        let Some(host) = &self.quirks.canonical_host else {
            return url;
        };
        let Some(scheme_end) = url.find("://") else {
            return url;
        };
        let scheme = &url[..scheme_end + 3];
        let rest = &url[scheme_end + 3..];
        let path = rest.find('/').map_or("", |i| &rest[i..]);
        format!("{scheme}{host}{path}")
    }

    async fn propfind_one(
        &self,
        url: &str,
        depth: &str,
        props: &[Prop],
    ) -> Result<Properties, CalDavError> {
        let mut propfind = PropFindRequest::new();
        for p in props {
            propfind.add_property(*p);
        }
        let body = propfind.build()?;

        let href = Href::from(url);
        let resp = self
            .http
            .execute(
                self.http
                    .build_request(propfind_method()?, url)
                    .header("Content-Type", "application/xml; charset=utf-8")
                    .header("Depth", depth)
                    .body(body),
                &href,
            )
            .await?;

        let xml = resp.text().await.map_err(CalDavError::Network)?;
        let multistatus = MultiStatusResponse::from_xml(&xml)?;
        Ok(multistatus
            .responses
            .into_iter()
            .flat_map(|r| r.prop_stats)
            .find(|ps| ps.status.contains("200") || ps.status.contains("207"))
            .map(|ps| ps.props)
            .unwrap_or_default())
    }

    /// Discovers the `current-user-principal` URL via PROPFIND Depth 0.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::NotACalDavServer`] if the server doesn't
    /// advertise `calendar-access`, or another error if discovery fails.
    #[instrument(skip(self))]
    pub async fn discover_principal(&self) -> Result<Href, CalDavError> {
        let url = self.resolve(&self.config.calendar_home);

        let href = Href::from(url.as_str());
        let options = self
            .http
            .execute(self.http.build_request(Method::OPTIONS, &url), &href)
            .await?;
        let advertises_calendars = options
            .headers()
            .get("DAV")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|dav| dav.contains("calendar-access"));
        if !advertises_calendars {
            return Err(CalDavError::NotACalDavServer);
        }

        let props = self
            .propfind_one(&url, "0", &[Prop::CurrentUserPrincipal])
            .await?;
        props.current_user_principal.ok_or_else(|| {
            CalDavError::InvalidResponse("no current-user-principal in response".to_string())
        })
    }

    /// Discovers every calendar-home-set URL for a principal (at least one).
    ///
    /// # Errors
    ///
    /// Returns an error if the PROPFIND fails or no home set is advertised.
    #[instrument(skip(self))]
    pub async fn discover_calendar_home(&self, principal: &Href) -> Result<Vec<Href>, CalDavError> {
        let url = self.resolve(principal.as_str());
        let mut propfind = PropFindRequest::new();
        propfind.add_property(Prop::CalendarHomeSet);
        let body = propfind.build()?;

        let href = principal.clone();
        let resp = self
            .http
            .execute(
                self.http
                    .build_request(propfind_method()?, &url)
                    .header("Content-Type", "application/xml; charset=utf-8")
                    .header("Depth", "0")
                    .body(body),
                &href,
            )
            .await?;

        let xml = resp.text().await.map_err(CalDavError::Network)?;
        let homes = MultiStatusResponse::from_xml(&xml)?.into_calendar_home_urls();
        if homes.is_empty() {
            return Err(CalDavError::InvalidResponse(
                "no calendar-home-set in response".to_string(),
            ));
        }
        Ok(homes)
    }

    /// Depth-1 PROPFIND over a calendar home, returning every member
    /// calendar collection. Inbox/outbox/notification collections are not
    /// filtered here — the caller decides what counts as a real calendar.
    ///
    /// # Errors
    ///
    /// Returns an error if PROPFIND fails.
    #[instrument(skip(self))]
    pub async fn list_calendars(&self, home: &Href) -> Result<Vec<CalendarCollection>, CalDavError> {
        let url = self.resolve(home.as_str());

        let mut propfind = PropFindRequest::new();
        propfind.add_property(Prop::DisplayName);
        propfind.add_property(Prop::ResourceType);
        propfind.add_property(Prop::CalendarDescription);
        propfind.add_property(Prop::SupportedCalendarComponents);
        propfind.add_property(Prop::GetCTag);

        let body = propfind.build()?;
        let href = home.clone();
        let resp = self
            .http
            .execute(
                self.http
                    .build_request(propfind_method()?, &url)
                    .header("Content-Type", "application/xml; charset=utf-8")
                    .header("Depth", "1")
                    .body(body),
                &href,
            )
            .await?;

        let xml = resp.text().await.map_err(CalDavError::Network)?;
        Ok(MultiStatusResponse::from_xml(&xml)?.into_collections())
    }

    /// Creates a new calendar collection via MKCALENDAR.
    ///
    /// # Errors
    ///
    /// Returns an error if MKCALENDAR fails.
    pub async fn mkcalendar(
        &self,
        href: &Href,
        display_name: &str,
        description: Option<&str>,
    ) -> Result<(), CalDavError> {
        let url = self.resolve(href.as_str());

        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        let mut mkcalendar = BytesStart::new("C:mkcalendar");
        mkcalendar.push_attribute(("xmlns:D", ns::DAV));
        mkcalendar.push_attribute(("xmlns:C", ns::CALDAV));
        writer.write_event(Event::Start(mkcalendar))?;
        writer.write_event(Event::Start(BytesStart::new("D:set")))?;
        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        writer.write_event(Event::Start(BytesStart::new("D:displayname")))?;
        writer.write_event(Event::Text(BytesText::new(display_name)))?;
        writer.write_event(Event::End(BytesEnd::new("D:displayname")))?;
        if let Some(desc) = description {
            writer.write_event(Event::Start(BytesStart::new("C:calendar-description")))?;
            writer.write_event(Event::Text(BytesText::new(desc)))?;
            writer.write_event(Event::End(BytesEnd::new("C:calendar-description")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;
        writer.write_event(Event::End(BytesEnd::new("D:set")))?;
        writer.write_event(Event::End(BytesEnd::new("C:mkcalendar")))?;

        let body = String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| CalDavError::InvalidResponse(format!("non-UTF-8 request body: {e}")))?;

        let method = Method::from_bytes(b"MKCALENDAR")
            .map_err(|e| CalDavError::Config(format!("invalid method: {e}")))?;
        self.http
            .execute(
                self.http
                    .build_request(method, &url)
                    .header("Content-Type", "application/xml; charset=utf-8")
                    .body(body),
                href,
            )
            .await?;
        Ok(())
    }

    /// Collection's `CTag` (opaque string that changes whenever any member
    /// resource changes).
    ///
    /// # Errors
    ///
    /// Returns an error if the PROPFIND fails.
    pub async fn get_ctag(&self, calendar_url: &Href) -> Result<Option<String>, CalDavError> {
        let url = self.resolve(calendar_url.as_str());
        let props = self.propfind_one(&url, "0", &[Prop::GetCTag]).await?;
        Ok(props.get_ctag)
    }

    /// Collection's current sync-token, or `None` if the server doesn't
    /// support `sync-collection`.
    ///
    /// # Errors
    ///
    /// Returns an error if the PROPFIND fails.
    pub async fn get_sync_token(&self, calendar_url: &Href) -> Result<Option<String>, CalDavError> {
        let url = self.resolve(calendar_url.as_str());
        let props = self.propfind_one(&url, "0", &[Prop::SyncToken]).await?;
        Ok(props.sync_token)
    }

    /// Incremental sync via `sync-collection` REPORT (RFC 6578). May return
    /// 403/410 to signal the token has expired, in which case the caller
    /// falls back to etag-diff or a full pull.
    ///
    /// # Errors
    ///
    /// Returns an error if the REPORT fails, including 403/410 for an
    /// invalidated sync-token.
    #[instrument(skip(self, prev_token))]
    pub async fn sync_collection(
        &self,
        calendar_url: &Href,
        prev_token: Option<&str>,
    ) -> Result<SyncCollectionResult, CalDavError> {
        let url = self.resolve(calendar_url.as_str());
        let request = prev_token.map_or_else(SyncCollectionRequest::new, |t| {
            SyncCollectionRequest::from_token(t.to_string())
        });
        let body = request.build()?;

        let resp = self
            .http
            .execute(
                self.http
                    .build_request(report_method()?, &url)
                    .header("Content-Type", "application/xml; charset=utf-8")
                    .body(body),
                calendar_url,
            )
            .await?;

        let xml = resp.text().await.map_err(CalDavError::Network)?;
        Ok(MultiStatusResponse::from_xml(&xml)?.into_sync_result())
    }

    /// calendar-query REPORT over a time range, returning full event bodies.
    ///
    /// # Errors
    ///
    /// Returns an error if the REPORT fails.
    pub async fn fetch_events_in_range(
        &self,
        calendar_url: &Href,
        start: &str,
        end: &str,
    ) -> Result<Vec<CalendarResource>, CalDavError> {
        self.query(calendar_url, start, end, false)
            .await
            .map(|either| either.into_resources())
    }

    /// Same REPORT as [`Self::fetch_events_in_range`] but requesting only
    /// `getetag`, for the etag-diff fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if the REPORT fails.
    pub async fn fetch_etags_in_range(
        &self,
        calendar_url: &Href,
        start: &str,
        end: &str,
    ) -> Result<Vec<(Href, ETag)>, CalDavError> {
        self.query(calendar_url, start, end, true)
            .await
            .map(|either| either.into_etags())
    }

    async fn query(
        &self,
        calendar_url: &Href,
        start: &str,
        end: &str,
        etag_only: bool,
    ) -> Result<MultiStatusResponse, CalDavError> {
        let url = self.resolve(calendar_url.as_str());
        let mut request = CalendarQueryRequest::new()
            .component("VEVENT".to_string())
            .time_range(start.to_string(), Some(end.to_string()));
        if etag_only {
            request = request.etag_only();
        }
        let body = request.build()?;

        let resp = self
            .http
            .execute(
                self.http
                    .build_request(report_method()?, &url)
                    .header("Content-Type", "application/xml; charset=utf-8")
                    .body(body),
                calendar_url,
            )
            .await?;

        let xml = resp.text().await.map_err(CalDavError::Network)?;
        MultiStatusResponse::from_xml(&xml)
    }

    /// calendar-multiget REPORT over the given hrefs, chunked in groups of
    /// [`MULTIGET_CHUNK_SIZE`] to bound memory use.
    ///
    /// # Errors
    ///
    /// Returns an error if any chunk's REPORT fails.
    #[instrument(skip(self, hrefs), fields(n = hrefs.len()))]
    pub async fn fetch_events_by_href(
        &self,
        calendar_url: &Href,
        hrefs: &[Href],
    ) -> Result<Vec<CalendarResource>, CalDavError> {
        if hrefs.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.resolve(calendar_url.as_str());
        let mut resources = Vec::with_capacity(hrefs.len());

        for chunk in hrefs.chunks(MULTIGET_CHUNK_SIZE) {
            let mut multiget = CalendarMultiGetRequest::new();
            for href in chunk {
                multiget.add_href(href.as_str().to_string());
            }
            let body = multiget.build()?;

            let resp = self
                .http
                .execute(
                    self.http
                        .build_request(report_method()?, &url)
                        .header("Content-Type", "application/xml; charset=utf-8")
                        .body(body),
                    calendar_url,
                )
                .await?;

            let xml = resp.text().await.map_err(CalDavError::Network)?;
            resources.extend(MultiStatusResponse::from_xml(&xml)?.into_resources());
        }

        debug!(fetched = resources.len(), "multiget complete");
        Ok(resources)
    }

    /// Single GET of one event resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource doesn't exist or the request fails.
    pub async fn fetch_event(&self, event_url: &Href) -> Result<CalendarResource, CalDavError> {
        let url = self.resolve(event_url.as_str());
        let resp = self
            .http
            .execute(self.http.build_request(Method::GET, &url), event_url)
            .await?;

        let etag = HttpClient::extract_etag(&resp)?;
        let ics = resp.text().await.map_err(CalDavError::Network)?;
        Ok(CalendarResource::new(event_url.clone(), etag, ics))
    }

    /// Creates a new calendar object with `If-None-Match: *`. A 412 means
    /// the UID already exists on the server.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::PreconditionFailed`] on UID collision, or
    /// another error if the request fails.
    #[instrument(skip(self, ics))]
    pub async fn create_event(
        &self,
        calendar_url: &Href,
        uid: &str,
        ics: &str,
    ) -> Result<(Href, ETag), CalDavError> {
        let new_href = Href::from(format!(
            "{}/{uid}.ics",
            calendar_url.as_str().trim_end_matches('/')
        ));
        let url = self.resolve(new_href.as_str());

        let resp = self
            .http
            .execute(
                self.http
                    .build_request(Method::PUT, &url)
                    .header("Content-Type", "text/calendar; charset=utf-8")
                    .header("If-None-Match", "*")
                    .body(ics.to_string()),
                &new_href,
            )
            .await?;

        let etag = HttpClient::extract_etag(&resp)?;
        Ok((new_href, etag))
    }

    /// Updates an existing calendar object with `If-Match: <prior_etag>`.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::PreconditionFailed`] on etag mismatch, or
    /// another error if the request fails.
    pub async fn update_event(
        &self,
        event_url: &Href,
        ics: &str,
        prior_etag: &ETag,
    ) -> Result<ETag, CalDavError> {
        let url = self.resolve(event_url.as_str());

        let resp = self
            .http
            .execute(
                HttpClient::if_match(
                    self.http
                        .build_request(Method::PUT, &url)
                        .header("Content-Type", "text/calendar; charset=utf-8")
                        .body(ics.to_string()),
                    prior_etag,
                ),
                event_url,
            )
            .await?;

        HttpClient::extract_etag(&resp)
    }

    /// Deletes a calendar object with `If-Match`. A 404 counts as success.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails for a reason other than the
    /// resource already being gone.
    pub async fn delete_event(&self, event_url: &Href, prior_etag: &ETag) -> Result<(), CalDavError> {
        let url = self.resolve(event_url.as_str());

        match self
            .http
            .execute(
                HttpClient::if_match(self.http.build_request(Method::DELETE, &url), prior_etag),
                event_url,
            )
            .await
        {
            Ok(_) | Err(CalDavError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// WebDAV MOVE with `Destination` and `Overwrite: F`. On 201/204 the
    /// resource lives at its new location with a (possibly new) etag. On
    /// 403/405/412 the caller should fall back to CREATE-then-DELETE.
    ///
    /// # Errors
    ///
    /// Returns an error on any non-success status, including the
    /// not-supported codes the caller is expected to interpret as "fall
    /// back".
    #[instrument(skip(self))]
    pub async fn move_event(
        &self,
        src_url: &Href,
        target_calendar_url: &Href,
        uid: &str,
    ) -> Result<(Href, ETag), CalDavError> {
        if self.quirks.move_unsupported {
            return Err(CalDavError::Status {
                status: 403,
                body: "MOVE disabled by quirks profile".to_string(),
            });
        }

        let url = self.resolve(src_url.as_str());
        let new_href = Href::from(format!(
            "{}/{uid}.ics",
            target_calendar_url.as_str().trim_end_matches('/')
        ));
        let destination = self.resolve(new_href.as_str());

        let method = Method::from_bytes(b"MOVE")
            .map_err(|e| CalDavError::Config(format!("invalid method: {e}")))?;
        let resp = self
            .http
            .execute(
                self.http
                    .build_request(method, &url)
                    .header("Destination", destination)
                    .header("Overwrite", "F"),
                src_url,
            )
            .await?;

        let etag = match HttpClient::extract_etag(&resp) {
            Ok(etag) => etag,
            Err(_) => {
                warn!("MOVE response carried no ETag; fetching new location");
                self.fetch_event(&new_href).await?.etag
            }
        };
        Ok((new_href, etag))
    }
}
