//! `Journal`: the composition and retrieval surface used by front ends.
//!
//! Owns the active session key and routes saves either straight to the
//! store (signed in) or through the pending-entry coordinator (signed out).

use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

use hw_core::{
    Entry, HwError, HwResult, SearchHit, LIST_DECRYPTION_FAILED_PLACEHOLDER, NO_LOCATION_SAVED,
};
use hw_crypto::{AccountKeySource, Codec, KeySource};
use hw_embed::EmbeddingClient;
use hw_store::{EntryStore, LocalStore};

use crate::auth::{Account, ActiveSession, AuthProvider};
use crate::draft::{DraftPersistence, ReloadDetector};
use crate::location::{locate_with_timeout, LocationPreference, Locator, StaticLocator};
use crate::pending::{FlushOutcome, PendingEntry, PendingEntryCoordinator, PendingState};
use crate::search::{SearchOptions, SearchPipeline};
use crate::writer::{decrypt_one, decrypt_rows, EntryWriter};

/// An entry opened for editing, with its decrypted content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedEntry {
    pub id: Uuid,
    pub content: String,
}

impl From<&SearchHit> for OpenedEntry {
    fn from(hit: &SearchHit) -> Self {
        Self {
            id: hit.entry.id,
            content: hit.content.clone(),
        }
    }
}

#[derive(Debug)]
pub enum SaveOutcome {
    /// Nothing but whitespace
    Skipped,
    /// Edit identical to the opened entry
    Unchanged,
    Saved(Entry),
    /// Signed out: staged locally until sign-in completes
    Staged,
}

pub struct Journal {
    auth: Arc<dyn AuthProvider>,
    keys: Arc<dyn KeySource>,
    store: Arc<dyn EntryStore>,
    codec: Codec,
    writer: EntryWriter,
    search: SearchPipeline,
    search_opts: SearchOptions,
    pending: PendingEntryCoordinator,
    draft: DraftPersistence,
    location: LocationPreference,
    locator: Arc<dyn Locator>,
    locate_timeout: Duration,
    session: RwLock<Option<ActiveSession>>,
}

impl Journal {
    /// Wire a journal. The session is not adopted until [`Journal::start`].
    pub fn new(
        store: Arc<dyn EntryStore>,
        embedder: EmbeddingClient,
        slots: Arc<dyn LocalStore>,
        auth: Arc<dyn AuthProvider>,
        codec: Codec,
    ) -> HwResult<Self> {
        Ok(Self {
            auth,
            keys: Arc::new(AccountKeySource),
            writer: EntryWriter::new(store.clone(), codec, embedder.clone()),
            search: SearchPipeline::new(store.clone(), embedder, codec),
            search_opts: SearchOptions::default(),
            store,
            codec,
            pending: PendingEntryCoordinator::restore(slots.clone())?,
            draft: DraftPersistence::new(slots.clone()),
            location: LocationPreference::new(slots),
            locator: Arc::new(StaticLocator::default()),
            locate_timeout: Duration::from_secs(5),
            session: RwLock::new(None),
        })
    }

    pub fn with_key_source(mut self, keys: Arc<dyn KeySource>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_locator(mut self, locator: Arc<dyn Locator>, timeout: Duration) -> Self {
        self.locator = locator;
        self.locate_timeout = timeout;
        self
    }

    pub fn with_search_options(mut self, opts: SearchOptions) -> Self {
        self.search_opts = opts;
        self
    }

    /// Adopt the provider's current session. Flushes a staged entry left by
    /// a previous run if one is signed in.
    pub async fn start(&self) -> Option<FlushOutcome> {
        self.on_session_changed(self.auth.current_account()).await
    }

    /// Apply a session transition. Signing in derives the key and flushes
    /// any staged entry; signing out drops the key.
    pub async fn on_session_changed(&self, account: Option<Account>) -> Option<FlushOutcome> {
        let Some(account) = account else {
            self.set_session(None);
            return None;
        };
        let session = ActiveSession::new(account, self.keys.as_ref());
        self.set_session(Some(session.clone()));
        Some(self.flush_with(&session).await)
    }

    /// Follow the auth provider until it goes away.
    pub async fn watch_sessions(self: Arc<Self>) {
        let mut rx = self.auth.subscribe();
        while rx.changed().await.is_ok() {
            let account = rx.borrow_and_update().clone();
            self.on_session_changed(account).await;
        }
        tracing::debug!("auth provider closed; session watch ended");
    }

    pub fn session(&self) -> Option<ActiveSession> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    pub fn pending_state(&self) -> PendingState {
        self.pending.state()
    }

    /// Flush the staged entry now, e.g. after a previous flush failed.
    pub async fn flush_pending(&self) -> HwResult<FlushOutcome> {
        let session = self.require_session()?;
        Ok(self.flush_with(&session).await)
    }

    async fn flush_with(&self, session: &ActiveSession) -> FlushOutcome {
        let outcome = self.pending.auth_available(session, &self.writer).await;
        if matches!(outcome, FlushOutcome::Flushed(_)) {
            self.clear_draft_logged();
        }
        outcome
    }

    /// Save the composition. `editing` is the entry it was opened from.
    ///
    /// Written entries are immutable: a signed-in save always inserts a new
    /// row, even for an edit. Only a staged edit flushed after sign-in
    /// updates the entry it was opened from.
    pub async fn save(&self, content: &str, editing: Option<&OpenedEntry>) -> HwResult<SaveOutcome> {
        let text = content.trim();
        if text.is_empty() {
            return Ok(SaveOutcome::Skipped);
        }
        if editing.is_some_and(|opened| opened.content.trim() == text) {
            tracing::debug!("edit unchanged; nothing to save");
            return Ok(SaveOutcome::Unchanged);
        }
        let editing = editing.map(|opened| opened.id);

        let Some(session) = self.session() else {
            let staged = PendingEntry {
                content: text.to_string(),
                editing,
            };
            self.pending.save_requested(staged, self.auth.as_ref()).await?;
            return Ok(SaveOutcome::Staged);
        };

        let location = if self.location.enabled()? {
            locate_with_timeout(self.locator.as_ref(), self.locate_timeout).await
        } else {
            NO_LOCATION_SAVED.to_string()
        };

        let entry = self.writer.write(text, None, location, &session).await?;
        tracing::info!(entry = %entry.id, words = entry.word_count, "entry saved");
        self.clear_draft_logged();
        Ok(SaveOutcome::Saved(entry))
    }

    /// Every entry of the signed-in account, newest first, decrypted.
    pub async fn load_entries(&self) -> HwResult<Vec<SearchHit>> {
        let session = self.require_session()?;
        let rows = self.store.list(session.user_id()).await?;
        let rows = rows.into_iter().map(|e| (e, None)).collect();
        decrypt_rows(
            self.codec,
            rows,
            session.secret(),
            LIST_DECRYPTION_FAILED_PLACEHOLDER,
        )
        .await
    }

    /// Decrypt one entry for editing. Unlike listing, a row that does not
    /// decrypt is an error: a placeholder must never become entry content.
    pub async fn open_entry(&self, id: Uuid) -> HwResult<OpenedEntry> {
        let session = self.require_session()?;
        let entry = self
            .store
            .list(session.user_id())
            .await?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| HwError::RemoteRead(format!("no entry {id}")))?;
        let content = decrypt_one(self.codec, entry.encrypted_content, session.secret()).await?;
        Ok(OpenedEntry { id, content })
    }

    pub async fn search(&self, query: &str) -> HwResult<Vec<SearchHit>> {
        let session = self.require_session()?;
        Ok(self
            .search
            .search(query, session.user_id(), session.secret(), self.search_opts)
            .await)
    }

    pub async fn delete_entry(&self, id: Uuid) -> HwResult<()> {
        let session = self.require_session()?;
        self.store.delete(session.user_id(), id).await?;
        tracing::info!(entry = %id, "entry deleted");
        Ok(())
    }

    pub async fn delete_all_entries(&self) -> HwResult<u64> {
        let session = self.require_session()?;
        let removed = self.store.delete_all(session.user_id()).await?;
        tracing::info!(removed, "all entries deleted");
        Ok(removed)
    }

    /// Remove the account's footprint: every remote entry, the staged
    /// composition, the draft and the location preference, then sign out.
    pub async fn delete_account(&self) -> HwResult<u64> {
        let session = self.require_session()?;
        let removed = self.store.delete_all(session.user_id()).await?;
        self.pending.discard()?;
        self.draft.clear()?;
        self.location.clear()?;
        self.sign_out().await?;
        tracing::info!(account = %session.user_id(), removed, "account deleted");
        Ok(removed)
    }

    /// Mirror an edit of a new composition to the draft slot. Edits of an
    /// opened entry are not drafted.
    pub fn edit(&self, text: &str, editing: Option<&OpenedEntry>) -> HwResult<()> {
        if editing.is_some() {
            return Ok(());
        }
        self.draft.record_edit(text)
    }

    /// Draft to restore at startup, unless the detector reports a reload.
    pub fn restore_draft(&self, detector: &dyn ReloadDetector) -> HwResult<Option<String>> {
        self.draft.on_load(detector)
    }

    pub fn draft(&self) -> HwResult<Option<String>> {
        self.draft.load()
    }

    pub fn clear_draft(&self) -> HwResult<()> {
        self.draft.clear()
    }

    /// Start over: drop the draft and any staged composition.
    pub fn new_entry(&self) -> HwResult<()> {
        self.draft.clear()?;
        self.pending.discard()
    }

    pub fn location_enabled(&self) -> HwResult<bool> {
        self.location.enabled()
    }

    pub fn set_location_enabled(&self, enabled: bool) -> HwResult<()> {
        self.location.set_enabled(enabled)
    }

    pub async fn sign_out(&self) -> HwResult<()> {
        self.auth.sign_out().await?;
        self.set_session(None);
        Ok(())
    }

    fn require_session(&self) -> HwResult<ActiveSession> {
        self.session()
            .ok_or_else(|| HwError::Auth("not signed in".into()))
    }

    fn set_session(&self, session: Option<ActiveSession>) {
        match self.session.write() {
            Ok(mut slot) => *slot = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    fn clear_draft_logged(&self) {
        if let Err(e) = self.draft.clear() {
            tracing::warn!(error = %e, "failed to clear draft after save");
        }
    }
}
