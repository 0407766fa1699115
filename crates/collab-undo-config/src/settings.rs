/// Undo settings: load, save, and sanitize.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::keymap::KeymapSettings;

/// Environment variable overriding the settings file location.
pub const SETTINGS_ENV_VAR: &str = "COLLAB_UNDO_SETTINGS";

const SETTINGS_FILE_NAME: &str = "collab-undo.json";

/// Upper bound for the capture timeout. Longer windows would merge
/// unrelated edits into one undo step.
const MAX_CAPTURE_TIMEOUT_MS: u64 = 60_000;

/// User-facing settings for undo history and its key bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoSettings {
    /// Window in milliseconds within which consecutive changes are merged
    /// into one undo step. 0 disables merging.
    pub capture_timeout_ms: u64,
    /// Max number of undo steps kept per history.
    pub max_history_depth: usize,
    /// Whether changes without an origin tag (local edits) are recorded.
    pub track_untagged: bool,
    /// Additional origin tags whose changes are recorded.
    pub tracked_origins: Vec<String>,
    pub keymap: KeymapSettings,
}

impl Default for UndoSettings {
    fn default() -> Self {
        Self {
            capture_timeout_ms: 500,
            max_history_depth: 1_000,
            track_untagged: true,
            tracked_origins: Vec::new(),
            keymap: KeymapSettings::default(),
        }
    }
}

impl UndoSettings {
    /// Returns the settings file path.
    ///
    /// Resolution order:
    /// 1. `COLLAB_UNDO_SETTINGS` environment variable
    /// 2. `collab-undo/collab-undo.json` in the platform config directory
    /// 3. `collab-undo.json` in the working directory
    pub fn settings_path() -> PathBuf {
        if let Ok(path) = std::env::var(SETTINGS_ENV_VAR) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .map(|d| d.join("collab-undo").join(SETTINGS_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME))
    }

    /// Loads settings from `path`, creating a default file if it doesn't exist.
    /// Returns defaults on any error (unreadable file, parse error, etc.).
    pub fn load_or_create(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match serde_json::from_str::<UndoSettings>(&contents) {
                    Ok(mut settings) => {
                        settings.sanitize();
                        return settings;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse undo settings at {}: {e}", path.display());
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read undo settings at {}: {e}", path.display());
                }
            }
            // Keep the broken file untouched for the user to fix
            Self::default()
        } else {
            let settings = Self::default();
            if let Err(e) = settings.save(path) {
                tracing::warn!("Failed to create default undo settings: {e:#}");
            }
            settings
        }
    }

    /// Saves settings to `path` as pretty-printed JSON, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))
    }

    /// Clamps values to valid ranges and normalizes the origin list.
    pub fn sanitize(&mut self) {
        self.capture_timeout_ms = self.capture_timeout_ms.min(MAX_CAPTURE_TIMEOUT_MS);
        self.max_history_depth = self.max_history_depth.max(1);

        let mut seen = Vec::with_capacity(self.tracked_origins.len());
        for origin in self.tracked_origins.drain(..) {
            let origin = origin.trim().to_string();
            if !origin.is_empty() && !seen.contains(&origin) {
                seen.push(origin);
            }
        }
        self.tracked_origins = seen;

        self.keymap.sanitize();
    }
}
