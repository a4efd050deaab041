//! Authentication collaborator and the in-memory session key.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use hw_core::{HwError, HwResult};
use hw_crypto::{KeySource, UserSecret};
use hw_store::{slots, LocalStore};

/// A signed-in account as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
}

/// Exposes the current session and its transitions.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn current_account(&self) -> Option<Account>;

    /// Stream of session transitions (sign-in, sign-out, restore).
    fn subscribe(&self) -> watch::Receiver<Option<Account>>;

    /// Start the external sign-in flow. Completion arrives via `subscribe`.
    async fn sign_in(&self) -> HwResult<()>;

    async fn sign_out(&self) -> HwResult<()>;
}

/// Account plus its derived secret, alive for one signed-in session.
#[derive(Clone)]
pub struct ActiveSession {
    pub account: Account,
    secret: Arc<UserSecret>,
}

impl ActiveSession {
    pub fn new(account: Account, keys: &dyn KeySource) -> Self {
        let secret = Arc::new(keys.derive(&account.id, &account.email));
        Self { account, secret }
    }

    pub fn user_id(&self) -> &str {
        &self.account.id
    }

    pub fn secret(&self) -> &Arc<UserSecret> {
        &self.secret
    }
}

impl std::fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSession")
            .field("account", &self.account)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Auth provider whose session lives in the local slot store.
///
/// `sign_in` only announces that sign-in is required; the flow completes
/// when the host calls [`LocalAuth::complete_sign_in`] (e.g. `hw login`).
pub struct LocalAuth {
    slots: Arc<dyn LocalStore>,
    tx: watch::Sender<Option<Account>>,
}

impl LocalAuth {
    /// Restore any persisted session.
    pub fn open(slots: Arc<dyn LocalStore>) -> HwResult<Self> {
        let restored = match slots.get(slots::SESSION)? {
            Some(raw) => match serde_json::from_str::<Account>(&raw) {
                Ok(account) => Some(account),
                Err(e) => {
                    tracing::warn!(error = %e, "discarding unreadable session slot");
                    slots.remove(slots::SESSION)?;
                    None
                }
            },
            None => None,
        };
        let (tx, _rx) = watch::channel(restored);
        Ok(Self { slots, tx })
    }

    pub fn complete_sign_in(&self, account: Account) -> HwResult<()> {
        let raw = serde_json::to_string(&account)
            .map_err(|e| HwError::Auth(format!("serializing session: {e}")))?;
        self.slots.set(slots::SESSION, &raw)?;
        tracing::info!(account = %account.id, "signed in");
        self.tx.send_replace(Some(account));
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    fn current_account(&self) -> Option<Account> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Account>> {
        self.tx.subscribe()
    }

    async fn sign_in(&self) -> HwResult<()> {
        tracing::info!("sign-in required to sync; run `hw login`");
        Ok(())
    }

    async fn sign_out(&self) -> HwResult<()> {
        self.slots
            .remove(slots::SESSION)
            .map_err(|e| HwError::Auth(format!("clearing session: {e}")))?;
        self.tx.send_replace(None);
        tracing::info!("signed out");
        Ok(())
    }
}
