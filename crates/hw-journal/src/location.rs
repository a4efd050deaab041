//! Geolocation collaborator and the location-saving preference.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use hw_core::{HwResult, LOCATION_UNAVAILABLE};
use hw_store::{slots, LocalStore};

/// Resolves the current place as display text.
#[async_trait]
pub trait Locator: Send + Sync {
    /// Never fails: an unresolvable position is `"Location unavailable"`.
    async fn locate(&self) -> String;
}

/// Reports a fixed, user-configured label.
#[derive(Debug, Clone, Default)]
pub struct StaticLocator {
    label: Option<String>,
}

impl StaticLocator {
    pub fn new(label: Option<String>) -> Self {
        Self { label }
    }
}

#[async_trait]
impl Locator for StaticLocator {
    async fn locate(&self) -> String {
        match &self.label {
            Some(l) if !l.trim().is_empty() => l.trim().to_string(),
            _ => LOCATION_UNAVAILABLE.to_string(),
        }
    }
}

/// Bound a lookup; a slow locator yields `"Location unavailable"`.
pub async fn locate_with_timeout(locator: &dyn Locator, timeout: Duration) -> String {
    match tokio::time::timeout(timeout, locator.locate()).await {
        Ok(place) => place,
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "location lookup timed out");
            LOCATION_UNAVAILABLE.to_string()
        }
    }
}

/// Persisted "save location with entries" toggle. Off unless set.
#[derive(Clone)]
pub struct LocationPreference {
    slots: Arc<dyn LocalStore>,
}

impl LocationPreference {
    pub fn new(slots: Arc<dyn LocalStore>) -> Self {
        Self { slots }
    }

    pub fn enabled(&self) -> HwResult<bool> {
        Ok(self
            .slots
            .get(slots::LOCATION_ENABLED)?
            .map(|v| v == "true")
            .unwrap_or(false))
    }

    pub fn set_enabled(&self, enabled: bool) -> HwResult<()> {
        self.slots
            .set(slots::LOCATION_ENABLED, if enabled { "true" } else { "false" })
    }

    /// Forget the preference entirely; reads as off afterwards.
    pub fn clear(&self) -> HwResult<()> {
        self.slots.remove(slots::LOCATION_ENABLED)
    }
}
