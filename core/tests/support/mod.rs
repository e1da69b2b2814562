// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! An in-memory `Store` double, for exercising pull/push/conflict logic
//! without a real database.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use calsync_core::error::{Error, Result};
use calsync_core::model::{Account, Calendar, Event, IcsSubscription, PendingOperation};
use calsync_core::occurrence::OccurrenceGenerator;
use calsync_core::store::{BoxFuture, Store, UpsertOutcome};

#[derive(Debug, Default)]
struct State {
    events: Vec<Event>,
    accounts: Vec<Account>,
    calendars: Vec<Calendar>,
    subscriptions: Vec<IcsSubscription>,
    operations: Vec<PendingOperation>,
    next_event_id: i64,
    next_operation_id: i64,
    /// UIDs whose upsert should fail with a constraint violation, for
    /// exercising per-resource error isolation during a pull.
    poisoned_uids: Vec<String>,
}

/// A single-process, mutex-guarded `Store` double for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Builds an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one account.
    pub fn add_account(&self, account: Account) {
        self.state.lock().unwrap().accounts.push(account);
    }

    /// Seeds one calendar.
    pub fn add_calendar(&self, calendar: Calendar) {
        self.state.lock().unwrap().calendars.push(calendar);
    }

    /// Seeds one subscription.
    pub fn add_subscription(&self, subscription: IcsSubscription) {
        self.state.lock().unwrap().subscriptions.push(subscription);
    }

    /// Seeds one event, assigning it the next id if `id` is 0.
    pub fn add_event(&self, mut event: Event) -> i64 {
        let mut state = self.state.lock().unwrap();
        if event.id == 0 {
            state.next_event_id += 1;
            event.id = state.next_event_id;
        } else {
            state.next_event_id = state.next_event_id.max(event.id);
        }
        let id = event.id;
        state.events.push(event);
        id
    }

    /// Seeds one pending operation, assigning it the next id if `id` is 0.
    pub fn add_operation(&self, mut op: PendingOperation) -> i64 {
        let mut state = self.state.lock().unwrap();
        if op.id == 0 {
            state.next_operation_id += 1;
            op.id = state.next_operation_id;
        } else {
            state.next_operation_id = state.next_operation_id.max(op.id);
        }
        let id = op.id;
        state.operations.push(op);
        id
    }

    /// Snapshots every event currently stored.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    /// Snapshots every pending operation currently queued.
    #[must_use]
    pub fn operations(&self) -> Vec<PendingOperation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// Marks `uid` so the next upsert attempting to write it fails with a
    /// constraint violation, simulating a foreign-key failure.
    pub fn poison_uid(&self, uid: &str) {
        self.state.lock().unwrap().poisoned_uids.push(uid.to_string());
    }

    /// Looks up one event by id.
    #[must_use]
    pub fn event(&self, id: i64) -> Option<Event> {
        self.state.lock().unwrap().events.iter().find(|e| e.id == id).cloned()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn events_by_calendar_in_range(
        &self,
        calendar_id: i64,
        range_start: i64,
        range_end: i64,
    ) -> Result<Vec<Event>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .filter(|e| e.calendar_id == calendar_id && e.start_ms < range_end && e.end_ms >= range_start)
            .cloned()
            .collect())
    }

    async fn get_event(&self, event_id: i64) -> Result<Option<Event>> {
        Ok(self.state.lock().unwrap().events.iter().find(|e| e.id == event_id).cloned())
    }

    async fn get_events_by_uid(&self, calendar_id: i64, uid: &str) -> Result<Vec<Event>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .filter(|e| e.calendar_id == calendar_id && e.uid == uid)
            .cloned()
            .collect())
    }

    async fn get_master_by_uid_and_calendar(&self, calendar_id: i64, uid: &str) -> Result<Option<Event>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .find(|e| e.calendar_id == calendar_id && e.uid == uid && e.is_master())
            .cloned())
    }

    async fn get_exception_by_uid_and_instance_time(
        &self,
        calendar_id: i64,
        uid: &str,
        original_instance_time: i64,
    ) -> Result<Option<Event>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .find(|e| {
                e.calendar_id == calendar_id
                    && e.uid == uid
                    && e.original_instance_time == Some(original_instance_time)
            })
            .cloned())
    }

    async fn get_by_caldav_url(&self, calendar_id: i64, url: &str) -> Result<Option<Event>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .find(|e| e.calendar_id == calendar_id && e.caldav_url.as_deref() == Some(url))
            .cloned())
    }

    async fn get_etags_by_calendar(&self, calendar_id: i64) -> Result<Vec<(String, String)>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .filter(|e| e.calendar_id == calendar_id)
            .filter_map(|e| Some((e.caldav_url.clone()?, e.etag.clone()?)))
            .collect())
    }

    async fn get_events_by_caldav_url_prefix(&self, calendar_id: i64, prefix: &str) -> Result<Vec<Event>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .filter(|e| {
                e.calendar_id == calendar_id && e.caldav_url.as_deref().is_some_and(|u| u.starts_with(prefix))
            })
            .cloned()
            .collect())
    }

    async fn upsert_event(&self, event: &Event) -> Result<UpsertOutcome> {
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state.poisoned_uids.iter().position(|u| u == &event.uid) {
            state.poisoned_uids.remove(pos);
            return Err(Error::DbConstraint(format!("poisoned uid {}", event.uid)));
        }
        let existing = state.events.iter().position(|e| {
            e.calendar_id == event.calendar_id
                && e.uid == event.uid
                && e.original_instance_time == event.original_instance_time
        });
        match existing {
            Some(idx) => {
                let id = state.events[idx].id;
                let mut updated = event.clone();
                updated.id = id;
                state.events[idx] = updated;
                Ok(UpsertOutcome::Updated(id))
            }
            None => {
                state.next_event_id += 1;
                let id = state.next_event_id;
                let mut created = event.clone();
                created.id = id;
                state.events.push(created);
                Ok(UpsertOutcome::Created(id))
            }
        }
    }

    async fn delete_event_by_id(&self, event_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.retain(|e| e.id != event_id && e.original_event_id != Some(event_id));
        Ok(())
    }

    async fn delete_duplicate_master_events(&self, calendar_id: i64, uid: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut seen = false;
        state.events.retain(|e| {
            if e.calendar_id == calendar_id && e.uid == uid && e.is_master() {
                if seen {
                    return false;
                }
                seen = true;
            }
            true
        });
        Ok(())
    }

    async fn mark_created_on_server(&self, event_id: i64, url: &str, etag: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.events.iter_mut().find(|e| e.id == event_id) {
            e.caldav_url = Some(url.to_string());
            e.etag = Some(etag.to_string());
            e.sync_status = calsync_core::model::SyncStatus::Synced;
        }
        Ok(())
    }

    async fn record_sync_error(&self, event_id: i64, message: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.events.iter_mut().find(|e| e.id == event_id) {
            e.last_sync_error = Some(message.to_string());
        }
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        Ok(self.state.lock().unwrap().accounts.clone())
    }

    async fn calendars(&self, account_id: Option<i64>) -> Result<Vec<Calendar>> {
        let state = self.state.lock().unwrap();
        Ok(match account_id {
            Some(id) => state.calendars.iter().filter(|c| c.account_id == Some(id)).cloned().collect(),
            None => state.calendars.clone(),
        })
    }

    async fn update_calendar_cursor(
        &self,
        calendar_id: i64,
        ctag: Option<&str>,
        sync_token: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.calendars.iter_mut().find(|c| c.id == calendar_id) {
            c.ctag = ctag.map(ToString::to_string);
            c.sync_token = sync_token.map(ToString::to_string);
        }
        Ok(())
    }

    async fn ics_subscriptions(&self) -> Result<Vec<IcsSubscription>> {
        Ok(self.state.lock().unwrap().subscriptions.clone())
    }

    async fn update_subscription_cursor(
        &self,
        subscription_id: i64,
        etag: Option<&str>,
        last_modified: Option<&str>,
        last_sync_ms: i64,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(s) = state.subscriptions.iter_mut().find(|s| s.id == subscription_id) {
            s.etag = etag.map(ToString::to_string);
            s.last_modified = last_modified.map(ToString::to_string);
            s.last_sync_ms = Some(last_sync_ms);
        }
        Ok(())
    }

    async fn due_pending_operations(&self, now_ms: i64) -> Result<Vec<PendingOperation>> {
        let state = self.state.lock().unwrap();
        let mut due: Vec<PendingOperation> = state
            .operations
            .iter()
            .filter(|o| o.status != calsync_core::model::OperationStatus::Failed && o.next_retry_at <= now_ms)
            .cloned()
            .collect();
        due.sort_by_key(|o| o.created_at);
        Ok(due)
    }

    async fn enqueue_operation(&self, op: &PendingOperation) -> Result<i64> {
        Ok(self.add_operation(op.clone()))
    }

    async fn update_operation(&self, op: &PendingOperation) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.operations.iter_mut().find(|o| o.id == op.id) {
            *existing = op.clone();
        }
        Ok(())
    }

    async fn delete_operation(&self, operation_id: i64) -> Result<()> {
        self.state.lock().unwrap().operations.retain(|o| o.id != operation_id);
        Ok(())
    }

    async fn run_in_transaction<'a>(
        &'a self,
        block: Box<dyn FnOnce(&'a Self) -> BoxFuture<'a, ()> + Send + 'a>,
    ) -> Result<()>
    where
        Self: Sized,
    {
        block(self).await
    }
}

/// Builds a minimal, otherwise-default event for a test, with the given
/// local id, uid, and sequence.
#[must_use]
pub fn sample_event(id: i64, calendar_id: i64, uid: &str, sequence: u32) -> Event {
    Event {
        id,
        calendar_id,
        uid: uid.to_string(),
        original_event_id: None,
        original_instance_time: None,
        title: "Sample Event".to_string(),
        location: None,
        description: None,
        start_ms: 0,
        end_ms: 3_600_000,
        timezone: None,
        all_day: false,
        status: calsync_core::model::EventStatus::Confirmed,
        transparent: false,
        classification: calsync_ical::Classification::Public,
        organizer: None,
        attendees: Vec::new(),
        reminders: Vec::new(),
        rrule: None,
        rdate: Vec::new(),
        exdate: Vec::new(),
        caldav_url: None,
        etag: None,
        sequence,
        dtstamp: 0,
        sync_status: calsync_core::model::SyncStatus::Synced,
        last_sync_error: None,
        retry_count: 0,
        local_modified_ms: 0,
        server_modified_ms: None,
        raw_ical: None,
    }
}

/// Builds a minimal pending operation targeting `event_id`.
#[must_use]
pub fn sample_operation(id: i64, event_id: i64, op: calsync_core::model::OperationKind) -> PendingOperation {
    PendingOperation {
        id,
        event_id,
        op,
        status: calsync_core::model::OperationStatus::Pending,
        target_url: None,
        target_calendar_id: None,
        move_phase: 0,
        retry_count: 0,
        max_retries: 5,
        next_retry_at: 0,
        created_at: id,
    }
}

/// An `OccurrenceGenerator` double that records nothing and always
/// succeeds, for scenarios that only care about store state.
#[derive(Debug, Default)]
pub struct NoopOccurrences;

#[async_trait::async_trait]
impl OccurrenceGenerator for NoopOccurrences {
    async fn generate(&self, _master: &Event, _window_start: i64, _window_end: i64) -> Result<()> {
        Ok(())
    }

    async fn regenerate(&self, _event: &Event) -> Result<()> {
        Ok(())
    }

    async fn link_exception(&self, _master_id: i64, _exception_id: i64, _original_instance_time: i64) -> Result<()> {
        Ok(())
    }
}

/// Boxes an async block for use where [`BoxFuture`] is expected.
#[must_use]
pub fn boxed<'a>(fut: impl Future<Output = Result<()>> + Send + 'a) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(fut)
}
