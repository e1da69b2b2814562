// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Polls read-only ICS subscription feeds: a plain conditional GET, not a
//! `CalDAV` collection. Subscriptions never gain pending operations —
//! whatever the feed says, wins.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::model::{Calendar, Event, EventStatus, IcsSubscription, SyncStatus};
use crate::occurrence::OccurrenceGenerator;
use crate::store::{Store, UpsertOutcome};

/// Reminders beyond this count are dropped; a feed with a runaway alarm
/// list shouldn't be allowed to flood the reminder scheduler.
const MAX_REMINDERS: usize = 3;

/// Counters for one subscription poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionOutcome {
    /// New events stored.
    pub added: u32,
    /// Existing events overwritten.
    pub updated: u32,
    /// Events removed because the feed no longer lists them.
    pub deleted: u32,
    /// `VEVENT`s that failed to parse; skipped.
    pub skipped_parse_error: u32,
    /// True if the server reported 304 and nothing was fetched.
    pub not_modified: bool,
}

/// Fetches and ingests one ICS subscription feed.
#[derive(Debug, Clone)]
pub struct SubscriptionFetcher {
    http: reqwest::Client,
}

impl SubscriptionFetcher {
    /// Builds a fetcher using a fresh `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("calsync-core/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Polls `subscription`, conditionally on its last-seen etag/
    /// last-modified, and reconciles its virtual calendar against the
    /// feed contents.
    ///
    /// # Errors
    ///
    /// Returns an error for network or store failures; a malformed feed
    /// is reported as zero events added rather than propagated, since a
    /// stale local copy is preferable to dropping every event.
    #[instrument(skip(self, store, occurrences, subscription, calendar), fields(subscription_id = subscription.id))]
    pub async fn poll(
        &self,
        store: &dyn Store,
        occurrences: &dyn OccurrenceGenerator,
        subscription: &IcsSubscription,
        calendar: &Calendar,
        now_ms: i64,
    ) -> Result<SubscriptionOutcome> {
        let mut req = self.http.get(&subscription.url);
        if let Some(etag) = &subscription.etag {
            req = req.header("If-None-Match", etag.as_str());
        }
        if let Some(last_modified) = &subscription.last_modified {
            req = req.header("If-Modified-Since", last_modified.as_str());
        }

        let resp = req.send().await?;
        if resp.status() == reqwest::StatusCode::NOT_MODIFIED {
            debug!("subscription unchanged");
            store
                .update_subscription_cursor(
                    subscription.id,
                    subscription.etag.as_deref(),
                    subscription.last_modified.as_deref(),
                    now_ms,
                )
                .await?;
            return Ok(SubscriptionOutcome {
                not_modified: true,
                ..SubscriptionOutcome::default()
            });
        }

        let new_etag = resp
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let new_last_modified = resp
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let body = resp.text().await?;

        let mut outcome = SubscriptionOutcome::default();
        let seen_uids = self.ingest(store, occurrences, subscription, calendar, &body, &mut outcome).await?;
        self.delete_orphans(store, subscription, calendar, &seen_uids, &mut outcome).await?;

        store
            .update_subscription_cursor(subscription.id, new_etag.as_deref(), new_last_modified.as_deref(), now_ms)
            .await?;

        info!(
            added = outcome.added,
            updated = outcome.updated,
            deleted = outcome.deleted,
            "subscription poll complete"
        );
        Ok(outcome)
    }

    async fn ingest(
        &self,
        store: &dyn Store,
        occurrences: &dyn OccurrenceGenerator,
        subscription: &IcsSubscription,
        calendar: &Calendar,
        body: &str,
        outcome: &mut SubscriptionOutcome,
    ) -> Result<HashSet<String>> {
        let mut seen = HashSet::new();
        if !calsync_ical::is_valid_ics(body) {
            warn!("subscription feed failed validation, keeping stale copy");
            outcome.skipped_parse_error += 1;
            return Ok(seen);
        }
        let calendars = match calsync_ical::parse(body) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "subscription feed failed to parse, keeping stale copy");
                outcome.skipped_parse_error += 1;
                return Ok(seen);
            }
        };

        for parsed_event in calendars.iter().flat_map(|c| &c.events) {
            seen.insert(parsed_event.uid.clone());
            let mut event = to_subscription_event(calendar.id, subscription, parsed_event);
            match store.upsert_event(&event).await {
                Ok(outcome_kind @ UpsertOutcome::Created(_)) => {
                    outcome.added += 1;
                    event.id = outcome_kind.id();
                    occurrences.regenerate(&event).await?;
                }
                Ok(outcome_kind @ UpsertOutcome::Updated(_)) => {
                    outcome.updated += 1;
                    event.id = outcome_kind.id();
                    occurrences.regenerate(&event).await?;
                }
                Err(e) => {
                    warn!(uid = %parsed_event.uid, error = %e, "skipping subscription event");
                    outcome.skipped_parse_error += 1;
                }
            }
        }
        Ok(seen)
    }

    async fn delete_orphans(
        &self,
        store: &dyn Store,
        subscription: &IcsSubscription,
        calendar: &Calendar,
        seen_uids: &HashSet<String>,
        outcome: &mut SubscriptionOutcome,
    ) -> Result<()> {
        let local = store
            .get_events_by_caldav_url_prefix(calendar.id, &subscription_prefix(subscription))
            .await?;
        for event in local {
            if !seen_uids.contains(&event.uid) {
                store.delete_event_by_id(event.id).await?;
                outcome.deleted += 1;
            }
        }
        Ok(())
    }
}

fn subscription_prefix(subscription: &IcsSubscription) -> String {
    format!("ics_subscription:{}:", subscription.id)
}

fn to_subscription_event(
    calendar_id: i64,
    subscription: &IcsSubscription,
    parsed: &calsync_ical::ParsedEvent,
) -> Event {
    Event {
        id: 0,
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
        reminders: parsed.alarms.iter().take(MAX_REMINDERS).map(|a| a.trigger.clone()).collect(),
        rrule: parsed.rrule.clone(),
        rdate: parsed.rdate.clone(),
        exdate: parsed.exdate.clone(),
        caldav_url: Some(subscription.synthetic_url(&parsed.uid)),
        etag: None,
        sequence: parsed.sequence,
        dtstamp: parsed.dtstamp.millis_utc,
        // Subscriptions are read-only: this calendar never gets a pending
        // operation, regardless of what the sync_status field says.
        sync_status: SyncStatus::Synced,
        last_sync_error: None,
        retry_count: 0,
        local_modified_ms: parsed.dtstamp.millis_utc,
        server_modified_ms: parsed.last_modified.map(|d| d.millis_utc),
        raw_ical: Some(parsed.raw_ical.clone()),
    }
}
