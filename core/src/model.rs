// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! The durable data model: accounts, calendars, events, the pending-
//! operations queue, and ICS subscriptions.

use calsync_caldav::{AuthMethod, Quirks};

/// A configured `CalDAV` account.
#[derive(Debug, Clone)]
pub struct Account {
    /// Local integer id.
    pub id: i64,
    /// The account's e-mail address; the natural key together with `provider`.
    pub email: String,
    /// Which known server this account is hosted on, if recognized.
    pub provider: Provider,
    /// `current-user-principal` URL, set once discovery has run.
    pub principal_url: Option<String>,
    /// Every `calendar-home-set` URL advertised by the principal (at least
    /// one once discovery succeeds).
    pub home_set_urls: Vec<String>,
    /// Whether this account participates in sync runs.
    pub enabled: bool,
    /// Authentication method, as configured.
    pub auth: AuthMethod,
}

impl Account {
    /// The [`Quirks`] profile this account's provider requires.
    #[must_use]
    pub fn quirks(&self) -> Quirks {
        self.provider.quirks()
    }
}

/// Recognized `CalDAV` providers with known behavioral divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// No known quirks; follow RFC 4791 as written.
    #[default]
    Generic,
    /// `icloud.com` — canonical-host rewriting, MOVE unsupported.
    ICloud,
    /// Baikal, which serves calendars under `/dav.php/`.
    Baikal,
}

impl Provider {
    /// The [`Quirks`] capability record for this provider.
    #[must_use]
    pub fn quirks(self) -> Quirks {
        match self {
            Self::Generic | Self::Baikal => Quirks::default(),
            Self::ICloud => Quirks::icloud(),
        }
    }
}

/// A calendar collection, either a real `CalDAV` collection or the virtual
/// calendar backing an ICS subscription.
#[derive(Debug, Clone)]
pub struct Calendar {
    /// Local integer id.
    pub id: i64,
    /// The owning account, or `None` for an ICS-subscription calendar.
    pub account_id: Option<i64>,
    /// Server href. Stable across syncs after URL normalization.
    pub server_url: String,
    /// User-facing name.
    pub display_name: String,
    /// Display color, if the server or subscription provided one.
    pub color: Option<String>,
    /// Collection ctag, changes whenever any member resource changes.
    pub ctag: Option<String>,
    /// Sync-token cursor for incremental `sync-collection` (RFC 6578).
    pub sync_token: Option<String>,
    /// ICS-subscription calendars are read-only: no pending operations are
    /// ever created against them.
    pub read_only: bool,
    /// Whether this calendar is shown to the user.
    pub visible: bool,
}

/// `VEVENT` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventStatus {
    /// `CONFIRMED` or absent.
    #[default]
    Confirmed,
    /// `TENTATIVE`.
    Tentative,
    /// `CANCELLED`. Cancelled events are filtered by the parser before
    /// reaching the store; this variant exists for events mutated locally.
    Cancelled,
}

/// Whether an event is fully synced or has a pending local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// No pending operation exists for this event.
    #[default]
    Synced,
    /// Queued for `CREATE` on the server.
    PendingCreate,
    /// Queued for `UPDATE` on the server.
    PendingUpdate,
    /// Queued for `DELETE` on the server.
    PendingDelete,
}

/// A calendar event: a recurrence master, a detached override, or a
/// one-off (no `RRULE`, no `RECURRENCE-ID`).
///
/// Invariants (see design notes): a master has `rrule.is_some() &&
/// original_event_id.is_none()`; an override has `original_event_id`
/// and `original_instance_time` both set, `rrule.is_none()`, and shares
/// `uid` with its master. The tuple `(uid, calendar_id,
/// original_instance_time)` is unique.
#[derive(Debug, Clone)]
pub struct Event {
    /// Local integer id.
    pub id: i64,
    /// The calendar this event belongs to.
    pub calendar_id: i64,
    /// Server-issued UID, or a locally-minted UUID for offline creates.
    pub uid: String,
    /// For a detached override, the id of its recurrence master.
    pub original_event_id: Option<i64>,
    /// For a detached override, the recurrence instant being replaced
    /// (milliseconds UTC), as it would have occurred before override.
    pub original_instance_time: Option<i64>,

    /// Title / `SUMMARY`.
    pub title: String,
    /// `LOCATION`.
    pub location: Option<String>,
    /// `DESCRIPTION`.
    pub description: Option<String>,
    /// Start instant, milliseconds UTC.
    pub start_ms: i64,
    /// End instant, milliseconds UTC.
    pub end_ms: i64,
    /// Source `TZID`, if the event carried one.
    pub timezone: Option<String>,
    /// Whether this is an all-day (`VALUE=DATE`) event.
    pub all_day: bool,
    /// `STATUS`.
    pub status: EventStatus,
    /// `TRANSP`.
    pub transparent: bool,
    /// `CLASS`.
    pub classification: calsync_ical::Classification,
    /// `ORGANIZER`.
    pub organizer: Option<String>,
    /// `ATTENDEE`s, opaque.
    pub attendees: Vec<String>,
    /// Reminders, as negative ISO-8601 durations relative to `start_ms`.
    pub reminders: Vec<String>,

    /// Raw `RRULE`, present only on masters.
    pub rrule: Option<String>,
    /// Raw, comma-joined `RDATE` value(s).
    pub rdate: Vec<String>,
    /// `EXDATE` instants, milliseconds UTC.
    pub exdate: Vec<i64>,

    /// Server href, once the event has a server identity.
    pub caldav_url: Option<String>,
    /// The server's `ETag` for this resource, once known.
    pub etag: Option<String>,
    /// `SEQUENCE`.
    pub sequence: u32,
    /// `DTSTAMP`, milliseconds UTC.
    pub dtstamp: i64,
    /// Whether this event is fully synced or awaiting a push.
    pub sync_status: SyncStatus,
    /// The last error encountered pushing this event, if any.
    pub last_sync_error: Option<String>,
    /// How many push attempts have failed for the current pending operation.
    pub retry_count: u32,
    /// Last local modification, milliseconds UTC.
    pub local_modified_ms: i64,
    /// Last known server modification, milliseconds UTC.
    pub server_modified_ms: Option<i64>,

    /// The last-seen server rendering, preserved to round-trip properties
    /// the model doesn't own. `None` for events never fetched from a server.
    pub raw_ical: Option<String>,
}

impl Event {
    /// True if this is a recurrence master.
    #[must_use]
    pub fn is_master(&self) -> bool {
        self.rrule.is_some() && self.original_event_id.is_none()
    }

    /// True if this is a detached override.
    #[must_use]
    pub fn is_override(&self) -> bool {
        self.original_event_id.is_some()
    }

    /// Whether a pending operation should exist for this event
    /// (invariant I1: `sync_status != Synced <=> a pending op exists`).
    #[must_use]
    pub fn needs_pending_operation(&self) -> bool {
        self.sync_status != SyncStatus::Synced
    }
}

/// The mutation a [`PendingOperation`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Create the event on the server.
    Create,
    /// Update the event on the server (`If-Match` on the stored etag).
    Update,
    /// Delete the event from the server.
    Delete,
    /// Move the event to a different calendar.
    Move,
}

/// Status of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationStatus {
    /// Waiting for its turn, or waiting out a backoff window.
    #[default]
    Pending,
    /// Currently being pushed.
    InProgress,
    /// Exhausted its retry budget; will not be retried automatically.
    Failed,
}

/// A queued local mutation, durable across process restarts.
///
/// The queue is a FIFO ordered by `created_at`; see invariant I2
/// (`retry_count <= max_retries`, and `status = Failed` implies
/// `retry_count == max_retries`) and I7 (MOVE atomicity).
#[derive(Debug, Clone)]
pub struct PendingOperation {
    /// Local integer id.
    pub id: i64,
    /// The event this operation mutates.
    pub event_id: i64,
    /// What kind of mutation this is.
    pub op: OperationKind,
    /// Current status.
    pub status: OperationStatus,
    /// For UPDATE/DELETE/MOVE: the event's server href *at enqueue time*.
    /// Needed because a MOVE clears `Event.caldav_url` once phase 1 begins.
    pub target_url: Option<String>,
    /// For MOVE: the destination calendar.
    pub target_calendar_id: Option<i64>,
    /// For MOVE: 0 = attempting atomic MOVE, 1 = CREATE-then-DELETE fallback
    /// in progress.
    pub move_phase: u8,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Attempts beyond this transition the operation to `Failed`.
    pub max_retries: u32,
    /// Milliseconds UTC epoch; the operation is not attempted before this.
    pub next_retry_at: i64,
    /// Milliseconds UTC epoch at enqueue time; defines FIFO order.
    pub created_at: i64,
}

impl PendingOperation {
    /// Exponential backoff seed, in milliseconds (30s).
    pub const BACKOFF_BASE_MS: i64 = 30_000;
    /// Backoff ceiling, in milliseconds (1 hour).
    pub const BACKOFF_MAX_MS: i64 = 3_600_000;

    /// The backoff delay for the given (pre-increment) retry count.
    #[must_use]
    pub fn backoff_delay_ms(retry_count: u32) -> i64 {
        Self::BACKOFF_BASE_MS
            .saturating_mul(1i64 << retry_count.min(20))
            .min(Self::BACKOFF_MAX_MS)
    }
}

/// A read-only ICS subscription feed.
#[derive(Debug, Clone)]
pub struct IcsSubscription {
    /// Local integer id.
    pub id: i64,
    /// Feed URL.
    pub url: String,
    /// User-facing name.
    pub name: String,
    /// Display color.
    pub color: Option<String>,
    /// The auto-created virtual calendar backing this subscription.
    pub calendar_id: i64,
    /// Whether this subscription is actively polled.
    pub enabled: bool,
    /// Poll interval, in hours.
    pub sync_interval_hours: u32,
    /// Last successful poll, milliseconds UTC.
    pub last_sync_ms: Option<i64>,
    /// `ETag` from the last conditional GET.
    pub etag: Option<String>,
    /// `Last-Modified` from the last conditional GET.
    pub last_modified: Option<String>,
    /// The last error encountered polling this feed, if any.
    pub last_error: Option<String>,
}

impl IcsSubscription {
    /// Builds the synthetic `caldav_url` stored on events ingested from
    /// this subscription: `ics_subscription:<subscription_id>:<uid>`.
    #[must_use]
    pub fn synthetic_url(&self, uid: &str) -> String {
        format!("ics_subscription:{}:{uid}", self.id)
    }
}
