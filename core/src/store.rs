// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! The persistence interface the sync engine consumes. A concrete,
//! transactional implementation (relational, on disk) lives outside this
//! crate; everything here is the contract.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::model::{Account, Calendar, Event, IcsSubscription, PendingOperation};

/// A boxed, pinned future, used for `run_in_transaction`'s closure return
/// type since async closures can't yet be expressed as a trait bound here.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Whether an upsert created a new row or overwrote an existing one —
/// distinguished because pull-session counters report `added` and
/// `updated` separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new event row was inserted.
    Created(i64),
    /// An existing event row (matched by its natural key) was overwritten.
    Updated(i64),
}

impl UpsertOutcome {
    /// The local id of the affected row, regardless of which case this is.
    #[must_use]
    pub const fn id(self) -> i64 {
        match self {
            Self::Created(id) | Self::Updated(id) => id,
        }
    }
}

/// The persistence contract the sync engine is written against.
///
/// Implementations are expected to be transactional stores (a relational
/// database is the natural fit); `run_in_transaction` is how the engine
/// expresses "these writes commit together or not at all" without naming
/// a specific database.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// All events in `calendar_id` whose `[start_ms, end_ms)` overlaps
    /// `[range_start, range_end)`.
    async fn events_by_calendar_in_range(
        &self,
        calendar_id: i64,
        range_start: i64,
        range_end: i64,
    ) -> Result<Vec<Event>>;

    /// A single event by its local id.
    async fn get_event(&self, event_id: i64) -> Result<Option<Event>>;

    /// Every event (master and overrides) sharing a UID, within one calendar.
    async fn get_events_by_uid(&self, calendar_id: i64, uid: &str) -> Result<Vec<Event>>;

    /// The recurrence master for `uid` in `calendar_id`, if one exists.
    async fn get_master_by_uid_and_calendar(
        &self,
        calendar_id: i64,
        uid: &str,
    ) -> Result<Option<Event>>;

    /// The override matching `(uid, calendar_id, original_instance_time)`.
    async fn get_exception_by_uid_and_instance_time(
        &self,
        calendar_id: i64,
        uid: &str,
        original_instance_time: i64,
    ) -> Result<Option<Event>>;

    /// The event whose `caldav_url` equals `url`, within `calendar_id`.
    async fn get_by_caldav_url(&self, calendar_id: i64, url: &str) -> Result<Option<Event>>;

    /// `(caldav_url, etag)` for every synced event in `calendar_id`, for
    /// the etag-diff pull fallback.
    async fn get_etags_by_calendar(&self, calendar_id: i64) -> Result<Vec<(String, String)>>;

    /// Every event in `calendar_id` whose `caldav_url` starts with `prefix`,
    /// used to find a subscription's previously-ingested events so orphans
    /// no longer present in the feed can be deleted.
    async fn get_events_by_caldav_url_prefix(&self, calendar_id: i64, prefix: &str) -> Result<Vec<Event>>;

    /// Inserts or updates an event, matched by `(uid, calendar_id,
    /// original_instance_time)`.
    async fn upsert_event(&self, event: &Event) -> Result<UpsertOutcome>;

    /// Deletes an event by local id. Cascades to overrides if this is a
    /// master.
    async fn delete_event_by_id(&self, event_id: i64) -> Result<()>;

    /// Removes duplicate master rows for `(uid, calendar_id)`, keeping the
    /// lowest id — a pull-time cleanup for servers that briefly exposed the
    /// same UID under two hrefs.
    async fn delete_duplicate_master_events(&self, calendar_id: i64, uid: &str) -> Result<()>;

    /// Marks an event as successfully created on the server, clearing its
    /// pending state and recording the assigned href/etag.
    async fn mark_created_on_server(&self, event_id: i64, url: &str, etag: &str) -> Result<()>;

    /// Records a push failure against an event without clearing its
    /// pending status.
    async fn record_sync_error(&self, event_id: i64, message: &str) -> Result<()>;

    /// All enabled accounts.
    async fn accounts(&self) -> Result<Vec<Account>>;

    /// All calendars for an account, including read-only subscription
    /// calendars when `account_id` is `None`.
    async fn calendars(&self, account_id: Option<i64>) -> Result<Vec<Calendar>>;

    /// Persists a calendar's updated `ctag`/`sync_token` after a pull.
    async fn update_calendar_cursor(
        &self,
        calendar_id: i64,
        ctag: Option<&str>,
        sync_token: Option<&str>,
    ) -> Result<()>;

    /// All ICS subscriptions due for a refresh.
    async fn ics_subscriptions(&self) -> Result<Vec<IcsSubscription>>;

    /// Persists a subscription's updated cursor after a poll.
    async fn update_subscription_cursor(
        &self,
        subscription_id: i64,
        etag: Option<&str>,
        last_modified: Option<&str>,
        last_sync_ms: i64,
    ) -> Result<()>;

    /// Pending operations in FIFO order (`created_at` ascending), whose
    /// `next_retry_at` has elapsed and whose status is not `Failed`.
    async fn due_pending_operations(&self, now_ms: i64) -> Result<Vec<PendingOperation>>;

    /// Enqueues a new pending operation.
    async fn enqueue_operation(&self, op: &PendingOperation) -> Result<i64>;

    /// Persists an operation's updated status/retry state/phase.
    async fn update_operation(&self, op: &PendingOperation) -> Result<()>;

    /// Removes a completed operation from the queue.
    async fn delete_operation(&self, operation_id: i64) -> Result<()>;

    /// Runs `block` as one atomic unit; on `Err`, every write inside is
    /// rolled back.
    async fn run_in_transaction<'a>(
        &'a self,
        block: Box<dyn FnOnce(&'a Self) -> BoxFuture<'a, ()> + Send + 'a>,
    ) -> Result<()>
    where
        Self: Sized;
}
