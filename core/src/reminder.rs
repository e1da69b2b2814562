// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Reminder scheduling is OS-level and out of scope for this crate; it's
//! consumed as a collaborator so deletes and overwrites can cancel stale
//! alarms.

use crate::error::Result;

/// Cancels any OS-level reminders scheduled for an event.
#[async_trait::async_trait]
pub trait ReminderScheduler: Send + Sync {
    /// Cancels every scheduled reminder for the given event id. A no-op if
    /// none were scheduled.
    async fn cancel_for_event(&self, event_id: i64) -> Result<()>;
}
