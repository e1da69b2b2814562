// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Recurrence expansion is an external collaborator: this crate treats
//! `RRULE`/`RDATE`/`EXDATE` as opaque text on [`crate::model::Event`] and
//! leaves materializing concrete instances to whoever implements this
//! trait.

use crate::error::Result;
use crate::model::Event;

/// Expands recurrence masters into concrete occurrences.
#[async_trait::async_trait]
pub trait OccurrenceGenerator: Send + Sync {
    /// Materializes every occurrence of `master` whose instant falls in
    /// `[window_start, window_end)`, in milliseconds UTC.
    async fn generate(&self, master: &Event, window_start: i64, window_end: i64) -> Result<()>;

    /// Regenerates occurrences for an event whose recurrence rule, start
    /// time, or exception set changed.
    async fn regenerate(&self, event: &Event) -> Result<()>;

    /// Links a freshly-stored override to its master, so the generator
    /// knows not to also materialize the instant the override replaces.
    async fn link_exception(
        &self,
        master_id: i64,
        exception_id: i64,
        original_instance_time: i64,
    ) -> Result<()>;
}
