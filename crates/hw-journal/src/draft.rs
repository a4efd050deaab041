//! Unsaved-composition mirror and reload detection.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hw_core::HwResult;
use hw_store::{slots, LocalStore};

/// Decides at load time whether the previous draft should be dropped.
pub trait ReloadDetector: Send + Sync {
    fn should_clear_draft_on_load(&self) -> bool;
}

/// Treats a short gap between the last teardown and the next load as a full
/// reload, which clears the draft. Longer gaps (a fresh visit) keep it.
pub struct TeardownGapDetector {
    slots: Arc<dyn LocalStore>,
    threshold: Duration,
}

impl TeardownGapDetector {
    pub fn new(slots: Arc<dyn LocalStore>) -> Self {
        Self::with_threshold(slots, Duration::from_secs(1))
    }

    pub fn with_threshold(slots: Arc<dyn LocalStore>, threshold: Duration) -> Self {
        Self { slots, threshold }
    }

    /// Stamp the teardown time. Call on shutdown.
    pub fn record_teardown(&self) -> HwResult<()> {
        self.record_teardown_at(now_ms())
    }

    pub fn record_teardown_at(&self, now_ms: u64) -> HwResult<()> {
        self.slots.set(slots::LAST_TEARDOWN_MS, &now_ms.to_string())
    }

    /// The timestamp is consumed: a second load without a teardown in
    /// between is never a reload.
    pub fn should_clear_at(&self, now_ms: u64) -> bool {
        let stamp = match self.slots.get(slots::LAST_TEARDOWN_MS) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "could not read teardown stamp");
                return false;
            }
        };
        if let Err(e) = self.slots.remove(slots::LAST_TEARDOWN_MS) {
            tracing::warn!(error = %e, "could not clear teardown stamp");
        }

        let Ok(then) = stamp.parse::<u64>() else {
            tracing::debug!("ignoring malformed teardown stamp");
            return false;
        };
        // a clock that went backwards reads as a zero gap
        let gap = now_ms.saturating_sub(then);
        gap < self.threshold.as_millis() as u64
    }
}

impl ReloadDetector for TeardownGapDetector {
    fn should_clear_draft_on_load(&self) -> bool {
        self.should_clear_at(now_ms())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Mirrors every edit of the composition to the `draft` slot.
pub struct DraftPersistence {
    slots: Arc<dyn LocalStore>,
}

impl DraftPersistence {
    pub fn new(slots: Arc<dyn LocalStore>) -> Self {
        Self { slots }
    }

    /// Called on every edit; no debounce. Blank text clears the slot.
    pub fn record_edit(&self, text: &str) -> HwResult<()> {
        if text.trim().is_empty() {
            self.slots.remove(slots::DRAFT)
        } else {
            self.slots.set(slots::DRAFT, text)
        }
    }

    pub fn load(&self) -> HwResult<Option<String>> {
        self.slots.get(slots::DRAFT)
    }

    pub fn clear(&self) -> HwResult<()> {
        self.slots.remove(slots::DRAFT)
    }

    /// Startup hook: returns the draft to restore, or clears it when the
    /// detector reports a reload.
    pub fn on_load(&self, detector: &dyn ReloadDetector) -> HwResult<Option<String>> {
        if detector.should_clear_draft_on_load() {
            tracing::debug!("reload detected, clearing draft");
            self.clear()?;
            return Ok(None);
        }
        self.load()
    }
}
