//! Reconciliation of an entry composed before sign-in completed.
//!
//! State machine:
//! ```text
//!            save_requested                auth_available
//!   Idle ───────────────────▶ Staged ─────────────────────▶ Flushing
//!    ▲                          ▲                              │
//!    │        write ok          │        write failed          │
//!    └──────────────────────────┼──────────────────────────────┤
//!                               └──────────────────────────────┘
//! ```
//!
//! `Flushing` is the in-flight guard: a trigger that arrives while a flush is
//! running observes `Flushing` and does nothing, so one staged value produces
//! at most one remote write. The local slot is cleared only after the write
//! succeeds. A failed flush returns to `Staged` and waits for the next trigger.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use hw_core::{Entry, HwError, HwResult, NO_LOCATION_SAVED};
use hw_store::{slots, LocalStore};

use crate::auth::{ActiveSession, AuthProvider};
use crate::writer::EntryWriter;

/// Composition staged in the local slot while signed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub content: String,
    /// Entry being edited, if the composition was an edit of an opened entry
    #[serde(default)]
    pub editing: Option<Uuid>,
}

impl PendingEntry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            editing: None,
        }
    }

    /// Decode a slot value. Bare text (no JSON envelope) is a new entry.
    fn decode(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| Self::new(raw))
    }

    fn encode(&self) -> HwResult<String> {
        serde_json::to_string(self)
            .map_err(|e| HwError::Local(format!("serializing pending entry: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PendingState {
    Idle,
    Staged(PendingEntry),
    Flushing {
        entry: PendingEntry,
        /// Newer composition staged while this flush was in flight
        restaged: Option<PendingEntry>,
        /// Discarded by a new-entry action while in flight
        discarded: bool,
    },
}

#[derive(Debug)]
pub enum FlushOutcome {
    NothingStaged,
    /// Another flush holds the in-flight guard
    AlreadyFlushing,
    Flushed(Entry),
    /// Write failed; the entry is staged again
    Failed(HwError),
}

pub struct PendingEntryCoordinator {
    slots: Arc<dyn LocalStore>,
    state: Mutex<PendingState>,
}

impl PendingEntryCoordinator {
    /// Restore from the local slot: a staged value survives restarts.
    pub fn restore(slots: Arc<dyn LocalStore>) -> HwResult<Self> {
        let state = match slots.get(slots::PENDING_ENTRY)? {
            Some(raw) => {
                tracing::info!("restored pending entry from local slot");
                PendingState::Staged(PendingEntry::decode(&raw))
            }
            None => PendingState::Idle,
        };
        Ok(Self {
            slots,
            state: Mutex::new(state),
        })
    }

    pub fn state(&self) -> PendingState {
        self.lock()
            .map(|s| s.clone())
            .unwrap_or(PendingState::Idle)
    }

    /// `SaveRequested` while unauthenticated: stage durably, then start sign-in.
    ///
    /// The slot is written before the state changes, so a failed slot write
    /// leaves everything as it was.
    pub async fn save_requested(&self, entry: PendingEntry, auth: &dyn AuthProvider) -> HwResult<()> {
        self.slots.set(slots::PENDING_ENTRY, &entry.encode()?)?;
        {
            let mut state = self.lock()?;
            match &mut *state {
                PendingState::Flushing { restaged, .. } => *restaged = Some(entry),
                other => *other = PendingState::Staged(entry),
            }
        }
        tracing::info!("entry staged locally pending sign-in");

        if let Err(e) = auth.sign_in().await {
            tracing::warn!(error = %e, "failed to start sign-in; entry stays staged");
        }
        Ok(())
    }

    /// `AuthAndKeyAvailable`: flush the staged value exactly once.
    ///
    /// Entries reconciled here never carry location data.
    pub async fn auth_available(&self, session: &ActiveSession, writer: &EntryWriter) -> FlushOutcome {
        let entry = {
            let mut state = match self.lock() {
                Ok(s) => s,
                Err(e) => return FlushOutcome::Failed(e),
            };
            match &*state {
                PendingState::Idle => return FlushOutcome::NothingStaged,
                PendingState::Flushing { .. } => {
                    tracing::debug!("flush already in flight");
                    return FlushOutcome::AlreadyFlushing;
                }
                PendingState::Staged(entry) => {
                    let entry = entry.clone();
                    *state = PendingState::Flushing {
                        entry: entry.clone(),
                        restaged: None,
                        discarded: false,
                    };
                    entry
                }
            }
        };

        tracing::info!(account = %session.user_id(), "flushing pending entry");
        let result = writer
            .write(&entry.content, entry.editing, NO_LOCATION_SAVED.to_string(), session)
            .await;

        let mut state = match self.lock() {
            Ok(s) => s,
            Err(e) => return FlushOutcome::Failed(e),
        };
        let (restaged, discarded) = match std::mem::replace(&mut *state, PendingState::Idle) {
            PendingState::Flushing {
                restaged, discarded, ..
            } => (restaged, discarded),
            _ => (None, false),
        };

        match result {
            Ok(saved) => {
                if let Some(next) = restaged {
                    *state = PendingState::Staged(next);
                } else if let Err(e) = self.slots.remove(slots::PENDING_ENTRY) {
                    tracing::error!(error = %e, "entry saved but pending slot could not be cleared");
                }
                tracing::info!(entry = %saved.id, "pending entry saved");
                FlushOutcome::Flushed(saved)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to save pending entry; will retry on next sign-in event");
                *state = match (restaged, discarded) {
                    (Some(next), _) => PendingState::Staged(next),
                    (None, true) => PendingState::Idle,
                    (None, false) => PendingState::Staged(entry),
                };
                FlushOutcome::Failed(e)
            }
        }
    }

    /// New-entry action: drop any staged composition.
    pub fn discard(&self) -> HwResult<()> {
        self.slots.remove(slots::PENDING_ENTRY)?;
        let mut state = self.lock()?;
        match &mut *state {
            PendingState::Flushing {
                restaged, discarded, ..
            } => {
                *restaged = None;
                *discarded = true;
            }
            other => *other = PendingState::Idle,
        }
        Ok(())
    }

    fn lock(&self) -> HwResult<MutexGuard<'_, PendingState>> {
        self.state
            .lock()
            .map_err(|_| HwError::Local("pending state lock poisoned".into()))
    }
}
