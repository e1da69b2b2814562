// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Retry-state bookkeeping for [`PendingOperation`]s. The queue's durable
//! storage is the `Store`'s concern; this module is the pure state
//! machine that decides what the next retry looks like.

use crate::model::{OperationStatus, PendingOperation};

/// Advances `op` after a retryable failure: increments `retry_count`,
/// recomputes `next_retry_at` from `now_ms`, and transitions to `Failed`
/// once `max_retries` is exceeded (invariant I2).
pub fn record_retryable_failure(op: &mut PendingOperation, now_ms: i64) {
    op.retry_count += 1;
    if op.retry_count > op.max_retries {
        op.status = OperationStatus::Failed;
        return;
    }
    op.next_retry_at = now_ms + PendingOperation::backoff_delay_ms(op.retry_count);
}

/// Marks `op` as permanently failed without consuming a retry (used for
/// non-retryable errors that still shouldn't spin the whole budget).
pub fn record_fatal_failure(op: &mut PendingOperation) {
    op.retry_count = op.max_retries;
    op.status = OperationStatus::Failed;
}

/// True if `op` is eligible to run right now.
#[must_use]
pub fn is_due(op: &PendingOperation, now_ms: i64) -> bool {
    op.status != OperationStatus::Failed && op.next_retry_at <= now_ms
}
