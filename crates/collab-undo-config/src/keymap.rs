/// Key chord settings for the undo/redo bindings.
use serde::{Deserialize, Serialize};

pub const DEFAULT_UNDO_KEY: &str = "Mod-z";
pub const DEFAULT_REDO_KEY: &str = "Mod-y";
pub const DEFAULT_REDO_MAC_KEY: &str = "Mod-Shift-z";

/// Chords bound to undo and redo.
///
/// `Mod` stands for Cmd on macOS and Ctrl everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeymapSettings {
    pub undo: String,
    pub redo: String,
    /// Redo chord used on macOS instead of `redo`.
    pub redo_mac: String,
    /// Whether handled chords suppress the host's default behavior.
    pub prevent_default: bool,
}

impl Default for KeymapSettings {
    fn default() -> Self {
        Self {
            undo: DEFAULT_UNDO_KEY.to_string(),
            redo: DEFAULT_REDO_KEY.to_string(),
            redo_mac: DEFAULT_REDO_MAC_KEY.to_string(),
            prevent_default: true,
        }
    }
}

impl KeymapSettings {
    /// Resets blank chords to their defaults.
    pub fn sanitize(&mut self) {
        fn reset_if_blank(value: &mut String, default: &str) {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                *value = default.to_string();
            } else if trimmed.len() != value.len() {
                *value = trimmed.to_string();
            }
        }
        reset_if_blank(&mut self.undo, DEFAULT_UNDO_KEY);
        reset_if_blank(&mut self.redo, DEFAULT_REDO_KEY);
        reset_if_blank(&mut self.redo_mac, DEFAULT_REDO_MAC_KEY);
    }
}
