// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Resolves a 412 encountered while pushing a local mutation: the server
//! copy and the local copy disagree, and one has to win.

use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::model::{Event, OperationKind, OperationStatus, PendingOperation, SyncStatus};
use crate::store::Store;

/// How to resolve a push-time conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// The server's copy always wins; the local pending operation is
    /// discarded and the local row is overwritten from the server.
    #[default]
    ServerWins,
    /// Whichever side has the higher `SEQUENCE` wins; ties fall back to
    /// [`Self::ServerWins`].
    NewestWins,
    /// Neither side is applied automatically; the operation is marked
    /// failed with a description of the conflict for the user to resolve.
    Manual,
}

/// Resolves conflicts between a local pending mutation and the server's
/// current copy of the same event.
#[derive(Debug, Clone, Copy)]
pub struct ConflictResolver {
    strategy: ConflictStrategy,
}

impl ConflictResolver {
    /// Builds a resolver using the given strategy.
    #[must_use]
    pub const fn new(strategy: ConflictStrategy) -> Self {
        Self { strategy }
    }

    /// Resolves a conflict between `local` (the event as the sync engine
    /// has it, with a pending operation) and `server` (the just-fetched
    /// server copy). Returns the operation that should replace `op`, or
    /// `None` if the local pending operation should simply be dropped
    /// (server wins, nothing left to push).
    ///
    /// # Errors
    ///
    /// Returns an error if the store update fails.
    #[instrument(skip(self, store, local, server, op), fields(event_id = local.id))]
    pub async fn resolve(
        &self,
        store: &dyn Store,
        local: &Event,
        server: &Event,
        op: &PendingOperation,
    ) -> Result<Option<PendingOperation>> {
        match self.effective_strategy(local, server) {
            ConflictStrategy::ServerWins => {
                info!("conflict resolved: server wins");
                let mut overwritten = server.clone();
                overwritten.id = local.id;
                overwritten.sync_status = SyncStatus::Synced;
                store.upsert_event(&overwritten).await?;
                store.delete_operation(op.id).await?;
                Ok(None)
            }
            ConflictStrategy::NewestWins => {
                info!("conflict resolved: newest (local) wins");
                store.delete_operation(op.id).await?;
                let mut retry = op.clone();
                retry.id = 0;
                retry.status = OperationStatus::Pending;
                retry.retry_count = 0;
                retry.next_retry_at = 0;
                // An UPDATE against a moved-on server copy must re-fetch the
                // etag it will collide with next, so re-push as an UPDATE
                // regardless of the original op kind (a CREATE can't recur
                // once the server already has the UID).
                retry.op = OperationKind::Update;
                let new_id = store.enqueue_operation(&retry).await?;
                retry.id = new_id;
                Ok(Some(retry))
            }
            ConflictStrategy::Manual => {
                warn!("conflict requires manual resolution");
                let mut failed = op.clone();
                failed.status = OperationStatus::Failed;
                store.update_operation(&failed).await?;
                store
                    .record_sync_error(
                        local.id,
                        &format!(
                            "manual conflict resolution required: local sequence={}, server sequence={}",
                            local.sequence, server.sequence
                        ),
                    )
                    .await?;
                Ok(None)
            }
        }
    }

    /// `NewestWins` degrades to `ServerWins` on a sequence tie.
    fn effective_strategy(&self, local: &Event, server: &Event) -> ConflictStrategy {
        if self.strategy == ConflictStrategy::NewestWins && local.sequence <= server.sequence {
            ConflictStrategy::ServerWins
        } else {
            self.strategy
        }
    }
}
