//! Extension configuration

use crate::error::{FocusError, FocusResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime configuration shared by the coordinator, the page scripts and the
/// host binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Directory holding the durable store
    pub data_dir: PathBuf,

    /// File name of the durable store inside `data_dir`
    pub store_file: String,

    /// Substring identifying the streaming site's watch page
    pub watch_url_marker: String,

    /// Seconds before the end of a video at which playback counts as finished
    pub video_end_threshold_secs: f64,

    /// Default log filter (overridden by `RUST_LOG`)
    pub log_filter: String,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sharpfocus"),
            store_file: "sharpfocus.db".to_string(),
            watch_url_marker: "youtube.com/watch".to_string(),
            video_end_threshold_secs: 1.0,
            log_filter: "info".to_string(),
        }
    }
}

impl FocusConfig {
    /// Full path of the durable store
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }

    /// Load config from a JSON file, falling back to defaults when the file is
    /// missing or malformed
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Ignoring malformed config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                log::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Save config to disk as pretty JSON
    pub fn save(&self, path: &Path) -> FocusResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| FocusError::config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }
}
