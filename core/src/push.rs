// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Drains the pending-operations queue against a single calendar's
//! `CalDAV` collection, one operation at a time, in FIFO order.

use calsync_caldav::{CalDavClient, ETag, Href};
use calsync_ical::{ParsedAlarm, ParsedDateTime, ParsedEvent, TimeTransparency};
use tracing::{info, instrument, warn};

use crate::conflict::ConflictResolver;
use crate::error::{Error, ErrorKind, Result};
use crate::model::{Event, OperationKind, OperationStatus, PendingOperation};
use crate::pending_queue::{is_due, record_fatal_failure, record_retryable_failure};
use crate::reminder::ReminderScheduler;
use crate::store::Store;

/// Counters for one push run, reported back to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Operations that completed successfully.
    pub pushed: u32,
    /// Operations deferred to their next backoff window.
    pub retried: u32,
    /// Operations that exhausted their retry budget.
    pub failed: u32,
    /// Operations handed to the conflict resolver.
    pub conflicts: u32,
    /// Local event ids successfully pushed this run, fed into the next
    /// pull so a CDN-stale server response doesn't clobber what was just
    /// written.
    pub pushed_event_ids: Vec<i64>,
}

/// Pushes queued local mutations for one calendar to its server.
#[derive(Debug, Clone, Copy)]
pub struct PushStrategy {
    conflicts: ConflictResolver,
}

impl PushStrategy {
    /// Builds a push strategy using the given conflict-resolution policy.
    #[must_use]
    pub const fn new(conflicts: ConflictResolver) -> Self {
        Self { conflicts }
    }

    /// Drains every due pending operation targeting events in `calendar_id`.
    ///
    /// # Errors
    ///
    /// Returns an error only for store failures; per-operation `CalDAV`
    /// failures are caught, classified, and folded into the retry/backoff
    /// state instead of propagating.
    #[instrument(skip(self, store, client, reminders), fields(calendar_id))]
    pub async fn push(
        &self,
        store: &dyn Store,
        client: &CalDavClient,
        reminders: &dyn ReminderScheduler,
        calendar_id: i64,
        now_ms: i64,
    ) -> Result<PushOutcome> {
        let mut outcome = PushOutcome::default();
        let due = store.due_pending_operations(now_ms).await?;

        for op in due {
            if !is_due(&op, now_ms) {
                continue;
            }
            let Some(event) = store.get_event(op.event_id).await? else {
                // The event vanished locally; the operation no longer applies.
                store.delete_operation(op.id).await?;
                continue;
            };
            if event.calendar_id != calendar_id {
                continue;
            }

            match self.push_one(store, client, reminders, &event, &op).await {
                Ok(PushResult::Done) => {
                    store.delete_operation(op.id).await?;
                    outcome.pushed += 1;
                    outcome.pushed_event_ids.push(event.id);
                }
                Ok(PushResult::PhaseAdvanced(next)) => {
                    store.update_operation(&next).await?;
                }
                Ok(PushResult::ConflictHandled) => {
                    outcome.conflicts += 1;
                }
                Err(e) if e.kind() == ErrorKind::Permission => {
                    warn!(event_id = event.id, error = %e, "push denied, giving up");
                    let mut failed = op.clone();
                    record_fatal_failure(&mut failed);
                    store.update_operation(&failed).await?;
                    store.record_sync_error(event.id, &e.to_string()).await?;
                    outcome.failed += 1;
                }
                Err(e) if e.retryable() => {
                    let mut retried = op.clone();
                    record_retryable_failure(&mut retried, now_ms);
                    store.update_operation(&retried).await?;
                    store.record_sync_error(event.id, &e.to_string()).await?;
                    if retried.status == OperationStatus::Failed {
                        outcome.failed += 1;
                    } else {
                        outcome.retried += 1;
                    }
                }
                Err(e) => {
                    warn!(event_id = event.id, error = %e, "push failed fatally");
                    let mut failed = op.clone();
                    record_fatal_failure(&mut failed);
                    store.update_operation(&failed).await?;
                    store.record_sync_error(event.id, &e.to_string()).await?;
                    outcome.failed += 1;
                }
            }
        }

        info!(
            pushed = outcome.pushed,
            retried = outcome.retried,
            failed = outcome.failed,
            conflicts = outcome.conflicts,
            "push run complete"
        );
        Ok(outcome)
    }

    async fn push_one(
        &self,
        store: &dyn Store,
        client: &CalDavClient,
        reminders: &dyn ReminderScheduler,
        event: &Event,
        op: &PendingOperation,
    ) -> Result<PushResult> {
        match op.op {
            OperationKind::Create => self.push_create(store, client, event, op).await,
            OperationKind::Update => self.push_update(store, client, event, op).await,
            OperationKind::Delete => self.push_delete(store, client, reminders, event, op).await,
            OperationKind::Move => self.push_move(store, client, event, op).await,
        }
    }

    async fn push_create(
        &self,
        store: &dyn Store,
        client: &CalDavClient,
        event: &Event,
        op: &PendingOperation,
    ) -> Result<PushResult> {
        let calendar_url = calendar_url_of(store, event.calendar_id).await?;
        let ics = to_ics(event);
        match client.create_event(&calendar_url, &event.uid, &ics).await {
            Ok((href, etag)) => {
                store.mark_created_on_server(event.id, href.as_str(), etag.as_str()).await?;
                Ok(PushResult::Done)
            }
            Err(e) => Err(map_caldav_conflict(store, event, op, e).await?),
        }
    }

    async fn push_update(
        &self,
        store: &dyn Store,
        client: &CalDavClient,
        event: &Event,
        op: &PendingOperation,
    ) -> Result<PushResult> {
        let href = target_href(event, op)?;
        let etag = event.etag.as_deref().map(ETag::from).unwrap_or_else(|| ETag::from(""));
        let ics = to_ics(event);

        match client.update_event(&href, &ics, &etag).await {
            Ok(new_etag) => {
                store.mark_created_on_server(event.id, href.as_str(), new_etag.as_str()).await?;
                Ok(PushResult::Done)
            }
            Err(e) if e.http_code() == 412 => self.resolve_update_conflict(store, client, event, op).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn push_delete(
        &self,
        store: &dyn Store,
        client: &CalDavClient,
        reminders: &dyn ReminderScheduler,
        event: &Event,
        op: &PendingOperation,
    ) -> Result<PushResult> {
        let href = target_href(event, op)?;
        let etag = event.etag.as_deref().map(ETag::from).unwrap_or_else(|| ETag::from(""));
        client.delete_event(&href, &etag).await?;
        reminders.cancel_for_event(event.id).await?;
        store.delete_event_by_id(event.id).await?;
        Ok(PushResult::Done)
    }

    /// Two-phase MOVE: phase 0 attempts the atomic WebDAV MOVE; on a
    /// not-supported response (`quirks.move_unsupported` or a 403/405/412),
    /// the operation is rewritten to phase 1 and retried as CREATE-then-
    /// DELETE, which keeps the event reachable under *some* href at every
    /// step even if the process dies mid-move.
    async fn push_move(
        &self,
        store: &dyn Store,
        client: &CalDavClient,
        event: &Event,
        op: &PendingOperation,
    ) -> Result<PushResult> {
        let Some(target_calendar_id) = op.target_calendar_id else {
            return Err(Error::Fatal(format!("MOVE operation {} has no target calendar", op.id)));
        };
        let target_href = calendar_url_of(store, target_calendar_id).await?;

        if op.move_phase == 0 {
            let src_href = source_href(op)?;
            match client.move_event(&src_href, &target_href, &event.uid).await {
                Ok((new_href, new_etag)) => {
                    store
                        .mark_created_on_server(event.id, new_href.as_str(), new_etag.as_str())
                        .await?;
                    return Ok(PushResult::Done);
                }
                Err(e) if matches!(e.http_code(), 403 | 405 | 412) => {
                    let mut advanced = op.clone();
                    advanced.move_phase = 1;
                    return Ok(PushResult::PhaseAdvanced(advanced));
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Phase 1: create at the destination, then delete the source. If the
        // process crashes between these two calls, the event simply exists
        // at both hrefs until the next pull reconciles it.
        let ics = to_ics(event);
        let (new_href, new_etag) = client.create_event(&target_href, &event.uid, &ics).await?;
        if let Some(src) = op.target_url.as_deref() {
            let src_href = Href::from(src);
            let src_etag = event.etag.as_deref().map(ETag::from).unwrap_or_else(|| ETag::from(""));
            client.delete_event(&src_href, &src_etag).await?;
        }
        store
            .mark_created_on_server(event.id, new_href.as_str(), new_etag.as_str())
            .await?;
        Ok(PushResult::Done)
    }

    async fn resolve_update_conflict(
        &self,
        store: &dyn Store,
        client: &CalDavClient,
        event: &Event,
        op: &PendingOperation,
    ) -> Result<PushResult> {
        let href = target_href(event, op)?;
        let server_resource = client.fetch_event(&href).await?;
        let calendars = calsync_ical::parse(&server_resource.data)?;
        let Some(server_parsed) = calendars.into_iter().flat_map(|c| c.events).find(|e| e.uid == event.uid) else {
            return Err(Error::Fatal(format!("conflict fetch for {} had no matching VEVENT", event.uid)));
        };
        let server_event = crate::pull::to_store_event_with_id(
            event.id,
            event.calendar_id,
            &server_resource,
            &server_parsed,
        );
        self.conflicts.resolve(store, event, &server_event, op).await?;
        Ok(PushResult::ConflictHandled)
    }
}

enum PushResult {
    Done,
    PhaseAdvanced(PendingOperation),
    ConflictHandled,
}

async fn calendar_url_of(store: &dyn Store, calendar_id: i64) -> Result<Href> {
    store
        .calendars(None)
        .await?
        .into_iter()
        .find(|c| c.id == calendar_id)
        .map(|c| Href::from(c.server_url.as_str()))
        .ok_or_else(|| Error::Fatal(format!("unknown calendar {calendar_id}")))
}

fn target_href(event: &Event, op: &PendingOperation) -> Result<Href> {
    op.target_url
        .as_deref()
        .or(event.caldav_url.as_deref())
        .map(Href::from)
        .ok_or_else(|| Error::Fatal(format!("operation {} has no target href", op.id)))
}

/// The MOVE source href, captured by the local writer at enqueue time.
/// `event.caldav_url` must not be consulted here: it's cleared as soon as
/// the writer starts a MOVE, precisely so a crash mid-move can't leave the
/// event pointing at a href that's about to stop existing.
fn source_href(op: &PendingOperation) -> Result<Href> {
    op.target_url
        .as_deref()
        .map(Href::from)
        .ok_or_else(|| Error::Fatal(format!("move operation {} has no source href", op.id)))
}

async fn map_caldav_conflict(
    store: &dyn Store,
    event: &Event,
    op: &PendingOperation,
    e: calsync_caldav::CalDavError,
) -> Result<Error> {
    if e.http_code() == 412 {
        // UID collision on CREATE: the server already has this event. Treat
        // it the same as an update conflict so the resolver decides.
        store
            .record_sync_error(event.id, &format!("CREATE collided with existing UID: {e}"))
            .await?;
        let _ = op;
    }
    Ok(e.into())
}

fn to_ics(event: &Event) -> String {
    if let Some(raw) = &event.raw_ical {
        let parsed = to_parsed_event(event);
        return calsync_ical::patch(&parsed, raw);
    }
    calsync_ical::format_fresh(&to_parsed_event(event))
}

fn to_parsed_event(event: &Event) -> ParsedEvent {
    ParsedEvent {
        uid: event.uid.clone(),
        summary: Some(event.title.clone()),
        location: event.location.clone(),
        description: event.description.clone(),
        dtstart: ParsedDateTime {
            millis_utc: event.start_ms,
            is_date_only: event.all_day,
        },
        dtend: Some(ParsedDateTime {
            millis_utc: event.end_ms,
            is_date_only: event.all_day,
        }),
        tzid: event.timezone.clone(),
        recurrence_id: event.original_instance_time.map(|ms| ParsedDateTime {
            millis_utc: ms,
            is_date_only: event.all_day,
        }),
        status: match event.status {
            crate::model::EventStatus::Confirmed => None,
            crate::model::EventStatus::Tentative => Some("TENTATIVE".to_string()),
            crate::model::EventStatus::Cancelled => Some("CANCELLED".to_string()),
        },
        transparency: if event.transparent {
            TimeTransparency::Transparent
        } else {
            TimeTransparency::Opaque
        },
        classification: event.classification,
        organizer: event.organizer.clone(),
        attendees: event.attendees.clone(),
        sequence: event.sequence,
        dtstamp: ParsedDateTime {
            millis_utc: event.dtstamp,
            is_date_only: false,
        },
        last_modified: event.server_modified_ms.map(|ms| ParsedDateTime {
            millis_utc: ms,
            is_date_only: false,
        }),
        rrule: event.rrule.clone(),
        rdate: event.rdate.clone(),
        exdate: event.exdate.clone(),
        alarms: event
            .reminders
            .iter()
            .map(|trigger| ParsedAlarm { trigger: trigger.clone() })
            .collect(),
        properties: Vec::new(),
        raw_ical: String::new(),
    }
}
