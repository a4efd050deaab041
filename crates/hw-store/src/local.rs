//! Local durable key-value slots.
//!
//! Two backends are available:
//!   - **JSON** (`JsonSlotStore`): every mutation is written through to disk
//!     atomically via temp+rename, so a staged entry survives a crash or a
//!     sign-in redirect that restarts the process.
//!   - **Memory** (`MemorySlotStore`): for tests and ephemeral sessions.

use anyhow::Context;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use hw_core::{HwError, HwResult};

/// Well-known slot names.
pub mod slots {
    /// Composition staged while signed out
    pub const PENDING_ENTRY: &str = "pending_entry";
    /// Mirror of the in-progress composition
    pub const DRAFT: &str = "draft";
    /// "true" when location should be recorded with new entries
    pub const LOCATION_ENABLED: &str = "location_enabled";
    /// Unix millis recorded just before teardown
    pub const LAST_TEARDOWN_MS: &str = "last_teardown_ms";
    /// Signed-in account (id + email), JSON
    pub const SESSION: &str = "session";
}

/// Trait for local slot backends (JSON file and memory).
pub trait LocalStore: Send + Sync {
    fn get(&self, slot: &str) -> HwResult<Option<String>>;
    fn set(&self, slot: &str, value: &str) -> HwResult<()>;
    /// Remove a slot. Removing an absent slot is not an error.
    fn remove(&self, slot: &str) -> HwResult<()>;
}

/// Slot store persisted to a single JSON file.
pub struct JsonSlotStore {
    path: PathBuf,
    slots: Mutex<HashMap<String, String>>,
}

impl JsonSlotStore {
    /// Load or create a slot file. A missing file starts empty.
    pub fn open(path: &Path) -> HwResult<Self> {
        let slots = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading slot file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing slot file: {}", path.display()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            slots: Mutex::new(slots),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> HwResult<MutexGuard<'_, HashMap<String, String>>> {
        self.slots
            .lock()
            .map_err(|_| HwError::Local("slot store lock poisoned".into()))
    }

    /// Atomic write: write to temp file, then rename.
    fn persist(&self, slots: &HashMap<String, String>) -> HwResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating slot dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(slots).context("serializing slots")?;
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("writing slot temp: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming slot file: {}", self.path.display()))?;
        Ok(())
    }
}

impl LocalStore for JsonSlotStore {
    fn get(&self, slot: &str) -> HwResult<Option<String>> {
        Ok(self.lock()?.get(slot).cloned())
    }

    fn set(&self, slot: &str, value: &str) -> HwResult<()> {
        let mut slots = self.lock()?;
        let previous = slots.insert(slot.to_string(), value.to_string());
        if let Err(e) = self.persist(&slots) {
            // keep memory and disk in agreement
            match previous {
                Some(v) => slots.insert(slot.to_string(), v),
                None => slots.remove(slot),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, slot: &str) -> HwResult<()> {
        let mut slots = self.lock()?;
        let Some(previous) = slots.remove(slot) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&slots) {
            slots.insert(slot.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> HwResult<MutexGuard<'_, HashMap<String, String>>> {
        self.slots
            .lock()
            .map_err(|_| HwError::Local("slot store lock poisoned".into()))
    }
}

impl LocalStore for MemorySlotStore {
    fn get(&self, slot: &str) -> HwResult<Option<String>> {
        Ok(self.lock()?.get(slot).cloned())
    }

    fn set(&self, slot: &str, value: &str) -> HwResult<()> {
        self.lock()?.insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> HwResult<()> {
        self.lock()?.remove(slot);
        Ok(())
    }
}
