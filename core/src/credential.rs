// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! Credential storage (an encrypted vault) is out of scope; this crate
//! only needs to ask for the current credentials of an account.

use calsync_caldav::AuthMethod;

use crate::error::Result;
use crate::model::Account;

/// Resolves the live authentication material for an account.
///
/// Implementations typically read from an OS keychain or encrypted vault;
/// the sync engine never persists credentials itself.
#[async_trait::async_trait]
pub trait CredentialProvider: Send + Sync {
    /// The current [`AuthMethod`] to use for `account`, re-read each sync
    /// so a credential rotation takes effect without a restart.
    async fn credentials_for(&self, account: &Account) -> Result<AuthMethod>;
}
