// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Sync engine for `CalDAV` accounts and read-only ICS subscriptions:
//! owns the store contract, the pending-operations queue, and the
//! pull/conflict/push/subscription strategies the orchestrator drives.

#![warn(
    missing_docs,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    missing_debug_implementations,
    clippy::indexing_slicing,
    clippy::dbg_macro,
    clippy::doc_markdown,
    clippy::redundant_closure_for_method_calls
)]

pub mod conflict;
pub mod config;
pub mod credential;
pub mod error;
pub mod model;
pub mod occurrence;
pub mod orchestrator;
pub mod pending_queue;
pub mod pull;
pub mod push;
pub mod reminder;
pub mod store;
pub mod subscription;

pub use crate::config::Config;
pub use crate::conflict::{ConflictResolver, ConflictStrategy};
pub use crate::credential::CredentialProvider;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::occurrence::OccurrenceGenerator;
pub use crate::orchestrator::{SyncOrchestrator, SyncSessionCounters};
pub use crate::pull::{PullOutcome, PullStrategy};
pub use crate::push::{PushOutcome, PushStrategy};
pub use crate::reminder::ReminderScheduler;
pub use crate::store::{Store, UpsertOutcome};
pub use crate::subscription::{SubscriptionFetcher, SubscriptionOutcome};
