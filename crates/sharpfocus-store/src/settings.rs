//! Typed access to the extension's stored keys
//!
//! Readers report failures; callers decide the fallback. The `*_or_default`
//! helpers implement the usual best-effort policy: log and carry on with the
//! default value.

use crate::{keys, ChangeSet, KeyValueStore, StorageChange};
use serde_json::{json, Value};
use sharpfocus_core::types::PersistedFocusState;
use sharpfocus_core::{FocusResult, FocusSettings, FocusState, Theme};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct ExtensionSettings {
    store: Arc<dyn KeyValueStore>,
}

impl ExtensionSettings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.store.subscribe()
    }

    /// Current value of every user-facing setting as one change set.
    ///
    /// A subscriber that lagged behind replays this in place of the change
    /// sets it missed. `focusState` is left out since only the coordinator
    /// writes it.
    pub fn resync_changes(&self) -> FocusResult<ChangeSet> {
        let mut changes = vec![StorageChange {
            key: keys::EXTENSION_ENABLED.to_string(),
            old_value: None,
            new_value: Some(Value::Bool(self.extension_enabled()?)),
        }];
        for key in [keys::WHITELISTED_DOMAINS, keys::FOCUS_SETTINGS, keys::THEME] {
            if let Some(value) = self.store.get(key)? {
                changes.push(StorageChange {
                    key: key.to_string(),
                    old_value: None,
                    new_value: Some(value),
                });
            }
        }
        Ok(ChangeSet::new(changes))
    }

    // Focus state

    pub fn focus_state(&self) -> FocusResult<Option<PersistedFocusState>> {
        match self.store.get(keys::FOCUS_STATE)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn save_focus_state(&self, state: FocusState) -> FocusResult<()> {
        let record = PersistedFocusState::from(state);
        self.store
            .set(keys::FOCUS_STATE, serde_json::to_value(record)?)
    }

    pub fn clear_focus_state(&self) -> FocusResult<()> {
        self.store.remove(keys::FOCUS_STATE)
    }

    // Enable flag

    /// Only an explicit `false` disables the extension; absent means enabled
    pub fn extension_enabled(&self) -> FocusResult<bool> {
        Ok(!matches!(
            self.store.get(keys::EXTENSION_ENABLED)?,
            Some(Value::Bool(false))
        ))
    }

    pub fn extension_enabled_or_default(&self) -> bool {
        self.extension_enabled().unwrap_or_else(|e| {
            log::warn!("Failed to read {}: {}", keys::EXTENSION_ENABLED, e);
            true
        })
    }

    pub fn set_extension_enabled(&self, enabled: bool) -> FocusResult<()> {
        self.store.set(keys::EXTENSION_ENABLED, json!(enabled))
    }

    /// Flip the enable flag and return the new value
    pub fn toggle_extension(&self) -> FocusResult<bool> {
        let enabled = !self.extension_enabled()?;
        self.set_extension_enabled(enabled)?;
        log::info!("Extension {}", if enabled { "enabled" } else { "disabled" });
        Ok(enabled)
    }

    // Whitelist

    pub fn whitelisted_domains(&self) -> FocusResult<Vec<String>> {
        match self.store.get(keys::WHITELISTED_DOMAINS)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn whitelisted_domains_or_default(&self) -> Vec<String> {
        self.whitelisted_domains().unwrap_or_else(|e| {
            log::warn!("Failed to read {}: {}", keys::WHITELISTED_DOMAINS, e);
            Vec::new()
        })
    }

    /// Append a domain as typed (trimmed, not normalized).
    ///
    /// Returns false for blank input or an entry that is already present.
    pub fn add_whitelisted_domain(&self, domain: &str) -> FocusResult<bool> {
        let domain = domain.trim();
        let mut domains = self.whitelisted_domains()?;
        if domain.is_empty() || domains.iter().any(|d| d == domain) {
            return Ok(false);
        }
        domains.push(domain.to_string());
        self.store.set(keys::WHITELISTED_DOMAINS, json!(domains))?;
        Ok(true)
    }

    pub fn remove_whitelisted_domain(&self, domain: &str) -> FocusResult<bool> {
        let mut domains = self.whitelisted_domains()?;
        let Some(idx) = domains.iter().position(|d| d == domain) else {
            return Ok(false);
        };
        domains.remove(idx);
        self.store.set(keys::WHITELISTED_DOMAINS, json!(domains))?;
        Ok(true)
    }

    // Page styling

    pub fn focus_settings(&self) -> FocusResult<FocusSettings> {
        match self.store.get(keys::FOCUS_SETTINGS)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(FocusSettings::default()),
        }
    }

    pub fn focus_settings_or_default(&self) -> FocusSettings {
        self.focus_settings().unwrap_or_else(|e| {
            log::warn!("Failed to read {}: {}", keys::FOCUS_SETTINGS, e);
            FocusSettings::default()
        })
    }

    /// Write the whitelist and styling flags as one change set
    pub fn save_settings(&self, domains: &[String], settings: &FocusSettings) -> FocusResult<()> {
        self.store.set_many(vec![
            (keys::WHITELISTED_DOMAINS.to_string(), json!(domains)),
            (
                keys::FOCUS_SETTINGS.to_string(),
                serde_json::to_value(settings)?,
            ),
        ])
    }

    // Theme

    /// Stored theme; unknown values count as unset
    pub fn theme(&self) -> FocusResult<Option<Theme>> {
        Ok(self
            .store
            .get(keys::THEME)?
            .and_then(|value| serde_json::from_value(value).ok()))
    }

    pub fn set_theme(&self, theme: Theme) -> FocusResult<()> {
        self.store.set(keys::THEME, json!(theme.as_str()))
    }
}
