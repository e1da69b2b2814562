// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Pulls server state into the local store, choosing the cheapest tier
//! that still produces a correct result: unchanged ctag, incremental
//! `sync-collection`, etag-diff fallback, or a full pull.

use std::collections::HashSet;

use calsync_caldav::{CalDavClient, CalendarResource, Href};
use jiff::Timestamp;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::model::{Calendar, Event, EventStatus, SyncStatus};
use crate::occurrence::OccurrenceGenerator;
use crate::store::Store;

/// Counters for one pull run, reported back to the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullOutcome {
    /// New events stored.
    pub added: u32,
    /// Existing events overwritten from a server change.
    pub updated: u32,
    /// Events removed because the server no longer has them.
    pub deleted: u32,
    /// Events whose ICS body failed to parse; skipped, not fatal.
    pub skipped_parse_error: u32,
    /// Events whose upsert violated a store constraint; skipped, not fatal.
    pub skipped_constraint_error: u32,
    /// Rows left untouched because a local pending mutation, or an
    /// otherwise-orphaned row awaiting push, outranked the server's copy.
    pub skipped_local_pending: u32,
    /// True if the calendar's ctag was unchanged and nothing ran.
    pub no_changes: bool,
}

/// Pulls one calendar's server state into the store.
#[derive(Debug, Clone, Copy)]
pub struct PullStrategy;

impl PullStrategy {
    /// Runs the tiered pull for `calendar`.
    ///
    /// `recently_pushed` is the set of local event ids this account pushed
    /// earlier in the same sync run; they're skipped even when their etag
    /// differs, since a server response can briefly still echo stale,
    /// pre-push data.
    ///
    /// # Errors
    ///
    /// Returns an error for anything other than the expected, handled
    /// fallback transitions (token invalidation tiers down rather than
    /// propagating).
    #[instrument(skip(self, store, client, occurrences, calendar, recently_pushed), fields(calendar_id = calendar.id))]
    pub async fn pull(
        &self,
        store: &dyn Store,
        client: &CalDavClient,
        occurrences: &dyn OccurrenceGenerator,
        calendar: &Calendar,
        recently_pushed: &HashSet<i64>,
    ) -> Result<PullOutcome> {
        let href = Href::from(calendar.server_url.as_str());

        if let Some(local_ctag) = &calendar.ctag {
            let server_ctag = client.get_ctag(&href).await?;
            if server_ctag.as_ref() == Some(local_ctag) {
                debug!("ctag unchanged, skipping pull");
                return Ok(PullOutcome {
                    no_changes: true,
                    ..PullOutcome::default()
                });
            }
        }

        if let Some(token) = calendar.sync_token.clone() {
            match client.sync_collection(&href, Some(&token)).await {
                Ok(result) => {
                    let outcome = self
                        .apply_sync_result(store, calendar, client, occurrences, &href, result, recently_pushed)
                        .await?;
                    return Ok(outcome);
                }
                Err(e) => {
                    let e = Error::from(e);
                    if e.kind() == ErrorKind::TokenInvalid {
                        warn!("sync-token invalidated, tiering down to etag-diff");
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        if calendar.ctag.is_some() || calendar.sync_token.is_some() {
            return self.etag_diff(store, client, occurrences, calendar, &href, recently_pushed).await;
        }

        self.full_pull(store, client, occurrences, calendar, &href, recently_pushed).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_sync_result(
        &self,
        store: &dyn Store,
        calendar: &Calendar,
        client: &CalDavClient,
        occurrences: &dyn OccurrenceGenerator,
        href: &Href,
        result: calsync_caldav::SyncCollectionResult,
        recently_pushed: &HashSet<i64>,
    ) -> Result<PullOutcome> {
        let mut outcome = PullOutcome::default();

        for deleted_href in &result.deleted {
            self.delete_orphan(store, calendar, deleted_href.as_str(), &mut outcome).await?;
        }

        let changed_hrefs: Vec<Href> = result.changed.iter().map(|(h, _)| h.clone()).collect();
        let resources = client.fetch_events_by_href(href, &changed_hrefs).await?;
        self.upsert_resources(store, calendar, occurrences, resources, recently_pushed, &mut outcome).await?;

        let new_ctag = client.get_ctag(href).await?;
        store
            .update_calendar_cursor(calendar.id, new_ctag.as_deref(), result.new_token.as_deref())
            .await?;

        info!(
            added = outcome.added,
            updated = outcome.updated,
            deleted = outcome.deleted,
            "incremental pull complete"
        );
        Ok(outcome)
    }

    async fn etag_diff(
        &self,
        store: &dyn Store,
        client: &CalDavClient,
        occurrences: &dyn OccurrenceGenerator,
        calendar: &Calendar,
        href: &Href,
        recently_pushed: &HashSet<i64>,
    ) -> Result<PullOutcome> {
        let (start, end) = full_pull_window();
        let server_etags = client.fetch_etags_in_range(href, &start, &end).await?;
        let local_etags = store.get_etags_by_calendar(calendar.id).await?;
        let local: std::collections::HashMap<_, _> = local_etags.into_iter().collect();

        let changed: Vec<Href> = server_etags
            .iter()
            .filter(|(h, etag)| local.get(h.as_str()).is_none_or(|e| e != etag.as_str()))
            .map(|(h, _)| h.clone())
            .collect();

        let mut outcome = PullOutcome::default();
        let resources = client.fetch_events_by_href(href, &changed).await?;
        self.upsert_resources(store, calendar, occurrences, resources, recently_pushed, &mut outcome).await?;

        let server_hrefs: std::collections::HashSet<&str> =
            server_etags.iter().map(|(h, _)| h.as_str()).collect();
        for (local_href, _) in &local {
            if server_hrefs.contains(local_href.as_str()) {
                continue;
            }
            self.delete_orphan(store, calendar, local_href, &mut outcome).await?;
        }

        let new_ctag = client.get_ctag(href).await?;
        store.update_calendar_cursor(calendar.id, new_ctag.as_deref(), None).await?;

        info!(added = outcome.added, updated = outcome.updated, "etag-diff pull complete");
        Ok(outcome)
    }

    async fn full_pull(
        &self,
        store: &dyn Store,
        client: &CalDavClient,
        occurrences: &dyn OccurrenceGenerator,
        calendar: &Calendar,
        href: &Href,
        recently_pushed: &HashSet<i64>,
    ) -> Result<PullOutcome> {
        let (start, end) = full_pull_window();
        let resources = client.fetch_events_in_range(href, &start, &end).await?;

        let mut outcome = PullOutcome::default();
        self.upsert_resources(store, calendar, occurrences, resources, recently_pushed, &mut outcome).await?;

        let new_ctag = client.get_ctag(href).await?;
        let new_token = client.get_sync_token(href).await?;
        store
            .update_calendar_cursor(calendar.id, new_ctag.as_deref(), new_token.as_deref())
            .await?;

        info!(added = outcome.added, "full pull complete");
        Ok(outcome)
    }

    /// Deletes a locally-matched orphan (present locally, absent on the
    /// server), unless it still carries an un-pushed local mutation — a
    /// create/update/delete the push engine hasn't reached yet must not be
    /// discarded just because the server doesn't know about it yet.
    async fn delete_orphan(&self, store: &dyn Store, calendar: &Calendar, url: &str, outcome: &mut PullOutcome) -> Result<()> {
        let Some(event) = store.get_by_caldav_url(calendar.id, url).await? else {
            return Ok(());
        };
        if event.sync_status != SyncStatus::Synced {
            outcome.skipped_local_pending += 1;
            return Ok(());
        }
        store.delete_event_by_id(event.id).await?;
        outcome.deleted += 1;
        Ok(())
    }

    /// Parses every resource and upserts masters before overrides, so an
    /// override arriving in the same batch as its master always finds it
    /// already stored. A parse or constraint failure skips that one
    /// resource/event and keeps going (§7 propagation policy, scenario S7).
    async fn upsert_resources(
        &self,
        store: &dyn Store,
        calendar: &Calendar,
        occurrences: &dyn OccurrenceGenerator,
        resources: Vec<CalendarResource>,
        recently_pushed: &HashSet<i64>,
        outcome: &mut PullOutcome,
    ) -> Result<()> {
        let mut masters = Vec::new();
        let mut overrides = Vec::new();
        for resource in resources {
            let calendars = match calsync_ical::parse(&resource.data) {
                Ok(c) => c,
                Err(e) => {
                    warn!(href = resource.href.as_str(), error = %e, "skipping unparseable resource");
                    outcome.skipped_parse_error += 1;
                    continue;
                }
            };
            for parsed in calendars.into_iter().flat_map(|c| c.events) {
                if parsed.recurrence_id.is_some() {
                    overrides.push((resource.clone(), parsed));
                } else {
                    masters.push((resource.clone(), parsed));
                }
            }
        }

        for (resource, parsed) in &masters {
            self.upsert_one(store, calendar, occurrences, resource, parsed, None, recently_pushed, outcome).await?;
            store.delete_duplicate_master_events(calendar.id, &parsed.uid).await?;
        }

        for (resource, parsed) in &overrides {
            let master = store.get_master_by_uid_and_calendar(calendar.id, &parsed.uid).await?;
            let Some(master) = master else {
                warn!(uid = %parsed.uid, "override with no matching master, skipping");
                outcome.skipped_constraint_error += 1;
                continue;
            };
            self.upsert_one(store, calendar, occurrences, resource, parsed, Some(master.id), recently_pushed, outcome)
                .await?;
        }
        Ok(())
    }

    /// Upserts one parsed `VEVENT` (master or override), applying the
    /// lookup order and skip rules that protect un-pushed local state, then
    /// drives the occurrence generator for whichever side just changed.
    #[allow(clippy::too_many_arguments)]
    async fn upsert_one(
        &self,
        store: &dyn Store,
        calendar: &Calendar,
        occurrences: &dyn OccurrenceGenerator,
        resource: &CalendarResource,
        parsed: &calsync_ical::ParsedEvent,
        original_event_id: Option<i64>,
        recently_pushed: &HashSet<i64>,
        outcome: &mut PullOutcome,
    ) -> Result<()> {
        let existing = match original_event_id {
            Some(_) => {
                let instance_time = parsed.recurrence_id.map_or(0, |d| d.millis_utc);
                store.get_exception_by_uid_and_instance_time(calendar.id, &parsed.uid, instance_time).await?
            }
            None => match store.get_master_by_uid_and_calendar(calendar.id, &parsed.uid).await? {
                found @ Some(_) => found,
                None => store.get_by_caldav_url(calendar.id, resource.href.as_str()).await?,
            },
        };

        if let Some(existing) = &existing {
            if existing.sync_status != SyncStatus::Synced {
                outcome.skipped_local_pending += 1;
                return Ok(());
            }
            if existing.etag.is_some() && existing.etag.as_deref() == Some(resource.etag.as_str()) {
                return Ok(());
            }
            if recently_pushed.contains(&existing.id) {
                return Ok(());
            }
        }

        let id = existing.as_ref().map_or(0, |e| e.id);
        let mut event = to_store_event_with_id(id, calendar.id, resource, parsed);
        event.original_event_id = original_event_id;

        let upsert_outcome = match store.upsert_event(&event).await {
            Ok(o) => o,
            Err(Error::DbConstraint(msg)) => {
                warn!(uid = %parsed.uid, error = %msg, "skipping constraint violation");
                outcome.skipped_constraint_error += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        match upsert_outcome {
            crate::store::UpsertOutcome::Created(_) => outcome.added += 1,
            crate::store::UpsertOutcome::Updated(_) => outcome.updated += 1,
        }
        event.id = upsert_outcome.id();

        match original_event_id {
            Some(master_id) => {
                let instance_time = parsed.recurrence_id.map_or(0, |d| d.millis_utc);
                occurrences.link_exception(master_id, event.id, instance_time).await?;
            }
            None => occurrences.regenerate(&event).await?,
        }
        Ok(())
    }
}

pub(crate) fn to_store_event(
    calendar_id: i64,
    resource: &CalendarResource,
    parsed: &calsync_ical::ParsedEvent,
) -> Event {
    to_store_event_with_id(0, calendar_id, resource, parsed)
}

/// Builds an [`Event`] from a just-fetched server resource, reusing `id` —
/// used by the conflict resolver, which already knows the local row this
/// server copy should overwrite.
pub(crate) fn to_store_event_with_id(
    id: i64,
    calendar_id: i64,
    resource: &CalendarResource,
    parsed: &calsync_ical::ParsedEvent,
) -> Event {
    Event {
        id,
        calendar_id,
        uid: parsed.uid.clone(),
        original_event_id: None,
        original_instance_time: parsed.recurrence_id.map(|d| d.millis_utc),
        title: parsed.summary.clone().unwrap_or_default(),
        location: parsed.location.clone(),
        description: parsed.description.clone(),
        start_ms: parsed.dtstart.millis_utc,
        end_ms: parsed.dtend.map_or(parsed.dtstart.millis_utc, |d| d.millis_utc),
        timezone: parsed.tzid.clone(),
        all_day: parsed.dtstart.is_date_only,
        status: match parsed.status.as_deref() {
            Some("TENTATIVE") => EventStatus::Tentative,
            Some("CANCELLED") => EventStatus::Cancelled,
            _ => EventStatus::Confirmed,
        },
        transparent: matches!(parsed.transparency, calsync_ical::TimeTransparency::Transparent),
        classification: parsed.classification,
        organizer: parsed.organizer.clone(),
        attendees: parsed.attendees.clone(),
        reminders: parsed.alarms.iter().map(|a| a.trigger.clone()).collect(),
        rrule: parsed.rrule.clone(),
        rdate: parsed.rdate.clone(),
        exdate: parsed.exdate.clone(),
        caldav_url: Some(resource.href.as_str().to_string()),
        etag: Some(resource.etag.as_str().to_string()),
        sequence: parsed.sequence,
        dtstamp: parsed.dtstamp.millis_utc,
        sync_status: SyncStatus::Synced,
        last_sync_error: None,
        retry_count: 0,
        local_modified_ms: parsed.dtstamp.millis_utc,
        server_modified_ms: parsed.last_modified.map(|d| d.millis_utc),
        raw_ical: Some(parsed.raw_ical.clone()),
    }
}

/// The default full-pull window: one year back, two years forward. Servers
/// with truly unbounded calendars still bound client memory via the
/// multiget chunking in `calsync-caldav`.
fn full_pull_window() -> (String, String) {
    let now = Timestamp::now();
    let start = now - jiff::Span::new().days(365);
    let end = now + jiff::Span::new().days(730);
    (format_caldav_instant(start), format_caldav_instant(end))
}

fn format_caldav_instant(ts: Timestamp) -> String {
    ts.strftime("%Y%m%dT%H%M%SZ").to_string()
}
