// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! The error taxonomy the sync engine emits, independent of transport.

/// The kind of failure, used to decide retry/propagation policy.
///
/// This mirrors the table in the component design: every kind maps to a
/// handling decision made once, here, rather than re-derived at each call
/// site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O, DNS, timeout, retryable 5xx, 429 — retry with backoff.
    TransientNetwork,
    /// 401 — bubble up, disable the account until re-authentication.
    Auth,
    /// 403 on a non-MOVE operation — mark the operation failed.
    Permission,
    /// 412 — hand off to the conflict resolver.
    Conflict,
    /// 404 — success for DELETE/MOVE, resync for UPDATE.
    NotFound,
    /// 410, or 403 on `sync-collection` — discard the sync-token and tier down.
    TokenInvalid,
    /// Malformed ICS or XML — log and skip the offending resource.
    Parse,
    /// Foreign-key failure on upsert — skip the event, keep going.
    DbConstraint,
    /// Unexpected failure — abort the calendar's sync, preserve the queue.
    Fatal,
}

impl ErrorKind {
    /// Whether an operation that failed with this kind should be retried.
    #[must_use]
    pub const fn retryable(self) -> bool {
        matches!(self, Self::TransientNetwork)
    }
}

/// A sync-engine error, carrying the `{kind, retryable, message}` triple
/// every fallible operation in this crate surfaces instead of panicking.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wraps a `CalDAV` client error, preserving its HTTP code and
    /// retryability.
    #[error(transparent)]
    CalDav(#[from] calsync_caldav::CalDavError),
    /// Wraps an ICS parse error.
    #[error(transparent)]
    Parse(#[from] calsync_ical::ParseError),
    /// A plain HTTP failure fetching an ICS subscription feed (outside the
    /// `CalDAV` client, which only talks to discovered collections).
    #[error("subscription fetch failed: {0}")]
    Network(#[from] reqwest::Error),
    /// A `Store` implementation failed.
    #[error("store error: {0}")]
    Store(String),
    /// A foreign-key or other constraint violation during upsert.
    #[error("constraint violation: {0}")]
    DbConstraint(String),
    /// An unexpected, non-recoverable failure.
    #[error("fatal: {0}")]
    Fatal(String),
    /// The account has no usable credentials or they were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl Error {
    /// The HTTP status code behind this error, or 0 if there isn't one.
    #[must_use]
    pub fn http_code(&self) -> i32 {
        match self {
            Self::CalDav(e) => e.http_code(),
            Self::Auth(_) => 401,
            Self::Parse(_) | Self::Store(_) | Self::DbConstraint(_) | Self::Fatal(_) | Self::Network(_) => 0,
        }
    }

    /// The handling kind this error maps to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CalDav(e) if e.is_not_found() => ErrorKind::NotFound,
            Self::CalDav(e) => match e.http_code() {
                401 => ErrorKind::Auth,
                403 => ErrorKind::Permission,
                410 => ErrorKind::TokenInvalid,
                412 => ErrorKind::Conflict,
                _ if e.retryable() => ErrorKind::TransientNetwork,
                _ => ErrorKind::Fatal,
            },
            Self::Parse(_) => ErrorKind::Parse,
            Self::DbConstraint(_) => ErrorKind::DbConstraint,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Network(e) if e.is_timeout() || e.is_connect() => ErrorKind::TransientNetwork,
            Self::Store(_) | Self::Fatal(_) | Self::Network(_) => ErrorKind::Fatal,
        }
    }

    /// Whether the operation that produced this error should be retried.
    #[must_use]
    pub fn retryable(&self) -> bool {
        self.kind().retryable()
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
