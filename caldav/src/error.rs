// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

use crate::types::Href;

/// `CalDAV` client errors.
///
/// Every variant carries enough information to compute [`CalDavError::http_code`]
/// and [`CalDavError::retryable`], the `{http_code, retryable, message}` triple
/// callers use to decide whether to schedule a retry or hand off to the
/// conflict resolver.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CalDavError {
    /// Transport-level failure (DNS, connect, I/O mid-stream).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Client-side read/connect timeout; maps to the synthetic code -408.
    #[error("request timed out")]
    Timeout,

    /// XML parsing/writing error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Non-2xx/207 HTTP status not covered by a more specific variant.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// 412 with the server's current `ETag`, when present.
    #[error("precondition failed: {etag}")]
    PreconditionFailed { etag: String },

    /// Resource not found (404).
    #[error("resource not found: {0}")]
    NotFound(Href),

    /// Server doesn't support `CalDAV`.
    #[error("server doesn't support CalDAV")]
    NotACalDavServer,

    /// Invalid or unparseable response from server.
    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    /// Configuration error (bad base URL, missing credentials, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// Server doesn't support a capability this operation requires.
    #[error("server doesn't support required capability: {0}")]
    UnsupportedCapability(String),
}

impl CalDavError {
    /// HTTP status code this error corresponds to, per the code table: 0 for
    /// network errors with no response, -408 for a client-side timeout.
    #[must_use]
    pub fn http_code(&self) -> i32 {
        match self {
            Self::Timeout => -408,
            Self::Status { status, .. } => i32::from(*status),
            Self::PreconditionFailed { .. } => 412,
            Self::NotFound(_) => 404,
            Self::Network(_)
            | Self::Xml(_)
            | Self::Io(_)
            | Self::NotACalDavServer
            | Self::InvalidResponse(_)
            | Self::Config(_)
            | Self::UnsupportedCapability(_) => 0,
        }
    }

    /// Whether the operation that produced this error is safe to retry with
    /// backoff: timeouts, rate limiting, and server/network failures are;
    /// auth, conflict, and malformed-response errors are not.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Xml(_)
            | Self::Io(_)
            | Self::PreconditionFailed { .. }
            | Self::NotFound(_)
            | Self::NotACalDavServer
            | Self::InvalidResponse(_)
            | Self::Config(_)
            | Self::UnsupportedCapability(_) => false,
        }
    }

    /// True for errors that a DELETE or MOVE caller should treat as success
    /// because the resource is already gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || self.http_code() == 404
    }
}
