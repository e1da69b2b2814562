// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Drives a full sync pass across every account and subscription:
//! pull → resolve → push per calendar, and a one-way pull for every
//! due ICS subscription.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use calsync_caldav::{CalDavClient, CalDavConfig};
use tracing::{error, info, instrument, warn};

use crate::credential::CredentialProvider;
use crate::error::Result;
use crate::model::{Account, Calendar};
use crate::occurrence::OccurrenceGenerator;
use crate::pull::{PullOutcome, PullStrategy};
use crate::push::{PushOutcome, PushStrategy};
use crate::reminder::ReminderScheduler;
use crate::store::Store;
use crate::subscription::{SubscriptionFetcher, SubscriptionOutcome};

/// Aggregate counters for one orchestrator run, across every calendar and
/// subscription touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSessionCounters {
    /// Events newly stored.
    pub added: u32,
    /// Events overwritten from a server or feed change.
    pub updated: u32,
    /// Events removed locally.
    pub deleted: u32,
    /// Pending operations pushed successfully.
    pub pushed: u32,
    /// Pending operations handed to the conflict resolver.
    pub conflicts: u32,
    /// Resources skipped for a parse error.
    pub skipped_parse_error: u32,
    /// Resources skipped for a store constraint violation.
    pub skipped_constraint_error: u32,
    /// Calendars whose sync failed outright (network, auth, fatal).
    pub failed_calendars: u32,
}

impl SyncSessionCounters {
    fn add_pull(&mut self, o: PullOutcome) {
        self.added += o.added;
        self.updated += o.updated;
        self.deleted += o.deleted;
        self.skipped_parse_error += o.skipped_parse_error;
        self.skipped_constraint_error += o.skipped_constraint_error;
    }

    fn add_push(&mut self, o: PushOutcome) {
        self.pushed += o.pushed;
        self.conflicts += o.conflicts;
    }

    fn add_subscription(&mut self, o: SubscriptionOutcome) {
        self.added += o.added;
        self.updated += o.updated;
        self.deleted += o.deleted;
        self.skipped_parse_error += o.skipped_parse_error;
    }
}

/// Runs pull/resolve/push across every enabled account's calendars, and
/// polls every due ICS subscription.
pub struct SyncOrchestrator<'a> {
    store: &'a dyn Store,
    credentials: &'a dyn CredentialProvider,
    reminders: &'a dyn ReminderScheduler,
    occurrences: &'a dyn OccurrenceGenerator,
    pull: PullStrategy,
    push: PushStrategy,
    subscriptions: SubscriptionFetcher,
    /// Local event ids pushed on the previous run of each calendar, fed
    /// into the next pull so a CDN-stale server response can't clobber
    /// what was just written.
    recently_pushed: Mutex<HashMap<i64, HashSet<i64>>>,
}

impl<'a> SyncOrchestrator<'a> {
    /// Builds an orchestrator over the given collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription HTTP client fails to build.
    pub fn new(
        store: &'a dyn Store,
        credentials: &'a dyn CredentialProvider,
        reminders: &'a dyn ReminderScheduler,
        occurrences: &'a dyn OccurrenceGenerator,
        pull: PullStrategy,
        push: PushStrategy,
    ) -> Result<Self> {
        Ok(Self {
            store,
            credentials,
            reminders,
            occurrences,
            pull,
            push,
            subscriptions: SubscriptionFetcher::new()?,
            recently_pushed: Mutex::new(HashMap::new()),
        })
    }

    /// Runs one full sync pass: every enabled account's calendars, in
    /// `created_at` push order, then every due ICS subscription.
    ///
    /// # Errors
    ///
    /// Returns an error only if listing accounts/calendars/subscriptions
    /// itself fails; a single calendar or subscription's failure is
    /// recorded in the returned counters instead of aborting the run.
    #[instrument(skip(self))]
    pub async fn run(&self, now_ms: i64) -> Result<SyncSessionCounters> {
        let mut counters = SyncSessionCounters::default();

        for account in self.store.accounts().await? {
            if !account.enabled {
                continue;
            }
            counters = self.sync_account(account, counters, now_ms).await;
        }

        for subscription in self.store.ics_subscriptions().await? {
            if !subscription.enabled {
                continue;
            }
            counters = self.poll_subscription(subscription, counters, now_ms).await;
        }

        info!(
            added = counters.added,
            updated = counters.updated,
            deleted = counters.deleted,
            pushed = counters.pushed,
            conflicts = counters.conflicts,
            failed = counters.failed_calendars,
            "sync session complete"
        );
        Ok(counters)
    }

    #[instrument(skip(self, counters), fields(account_id = account.id))]
    async fn sync_account(
        &self,
        account: Account,
        mut counters: SyncSessionCounters,
        now_ms: i64,
    ) -> SyncSessionCounters {
        let auth = match self.credentials.credentials_for(&account).await {
            Ok(auth) => auth,
            Err(e) => {
                warn!(error = %e, "no usable credentials, skipping account");
                counters.failed_calendars += 1;
                return counters;
            }
        };

        let calendars = match self.store.calendars(Some(account.id)).await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "failed to list calendars for account");
                counters.failed_calendars += 1;
                return counters;
            }
        };

        let Some(home) = calendars.first().map(|c| c.server_url.clone()) else {
            return counters;
        };
        let config = CalDavConfig {
            base_url: home,
            auth,
            ..CalDavConfig::default()
        };
        let client = match CalDavClient::new(config, account.quirks()) {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "failed to build CalDAV client");
                counters.failed_calendars += 1;
                return counters;
            }
        };

        // Push operations within an account execute in created_at order, so
        // each calendar's pull-then-push runs to completion before the next
        // calendar starts; nothing here holds a lock across network I/O.
        for calendar in calendars {
            match self.sync_calendar(&client, calendar, now_ms).await {
                Ok((pull, push)) => {
                    counters.add_pull(pull);
                    counters.add_push(push);
                }
                Err(e) => {
                    warn!(error = %e, "calendar sync failed");
                    counters.failed_calendars += 1;
                }
            }
        }
        counters
    }

    #[instrument(skip(self, client), fields(calendar_id = calendar.id))]
    async fn sync_calendar(
        &self,
        client: &CalDavClient,
        calendar: Calendar,
        now_ms: i64,
    ) -> Result<(PullOutcome, PushOutcome)> {
        let previously_pushed = self
            .recently_pushed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&calendar.id)
            .cloned()
            .unwrap_or_default();

        let pull_outcome = self
            .pull
            .pull(self.store, client, self.occurrences, &calendar, &previously_pushed)
            .await?;

        let push_outcome = if calendar.read_only {
            PushOutcome::default()
        } else {
            self.push.push(self.store, client, self.reminders, calendar.id, now_ms).await?
        };

        self.recently_pushed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(calendar.id, push_outcome.pushed_event_ids.iter().copied().collect());

        Ok((pull_outcome, push_outcome))
    }

    #[instrument(skip(self, counters), fields(subscription_id = subscription.id))]
    async fn poll_subscription(
        &self,
        subscription: crate::model::IcsSubscription,
        mut counters: SyncSessionCounters,
        now_ms: i64,
    ) -> SyncSessionCounters {
        let calendar = match self.store.calendars(None).await {
            Ok(cals) => cals.into_iter().find(|c| c.id == subscription.calendar_id),
            Err(e) => {
                error!(error = %e, "failed to look up subscription calendar");
                counters.failed_calendars += 1;
                return counters;
            }
        };
        let Some(calendar) = calendar else {
            warn!("subscription has no backing calendar, skipping");
            counters.failed_calendars += 1;
            return counters;
        };

        match self.subscriptions.poll(self.store, self.occurrences, &subscription, &calendar, now_ms).await {
            Ok(outcome) => counters.add_subscription(outcome),
            Err(e) => {
                warn!(error = %e, "subscription poll failed");
                counters.failed_calendars += 1;
            }
        }
        counters
    }
}
