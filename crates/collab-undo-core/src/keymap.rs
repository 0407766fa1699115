/// Key bindings for the undo commands.
///
/// Bindings are written as chords like `Mod-Shift-z`, where `Mod` means Cmd
/// on macOS and Ctrl everywhere else. A binding may carry a separate chord
/// used on macOS instead of its regular one.
use anyhow::{bail, Result};
use collab_undo_config::KeymapSettings;

use crate::commands::{self, UndoConfig};

/// Host platform, used to resolve `Mod` and mac-only chords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Mac,
    Other,
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Other
        }
    }
}

/// A parsed key chord: modifier flags plus a lowercase key name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chord {
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
    pub key: String,
}

impl Chord {
    /// Parses `text` such as `Ctrl-z` or `Mod-Shift-z`.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty key or an unknown modifier.
    pub fn parse(text: &str, platform: Platform) -> Result<Self> {
        let mut parts: Vec<&str> = text.split('-').collect();
        let key = parts.pop().unwrap_or_default().trim();
        if key.is_empty() {
            bail!("Key chord '{text}' has no key");
        }

        let mut chord = Chord {
            ctrl: false,
            meta: false,
            alt: false,
            shift: false,
            key: key.to_lowercase(),
        };
        for modifier in parts {
            match modifier.trim().to_lowercase().as_str() {
                "mod" => match platform {
                    Platform::Mac => chord.meta = true,
                    Platform::Other => chord.ctrl = true,
                },
                "ctrl" | "control" | "c" => chord.ctrl = true,
                "cmd" | "meta" | "command" | "m" => chord.meta = true,
                "alt" | "option" | "a" => chord.alt = true,
                "shift" | "s" => chord.shift = true,
                other => bail!("Unknown modifier '{other}' in key chord '{text}'"),
            }
        }
        Ok(chord)
    }
}

/// Command run by a key binding. Returns whether the key was handled.
pub type Command = fn(&UndoConfig) -> bool;

/// One entry of the keymap.
#[derive(Clone)]
pub struct KeyBinding {
    pub key: String,
    /// Chord used on macOS instead of `key`.
    pub mac: Option<String>,
    pub run: Command,
    pub prevent_default: bool,
}

impl std::fmt::Debug for KeyBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBinding")
            .field("key", &self.key)
            .field("mac", &self.mac)
            .field("prevent_default", &self.prevent_default)
            .finish()
    }
}

impl KeyBinding {
    /// The chord this binding listens to on `platform`.
    pub fn chord_for(&self, platform: Platform) -> &str {
        match (platform, &self.mac) {
            (Platform::Mac, Some(mac)) => mac,
            _ => &self.key,
        }
    }
}

/// Result of feeding a key press to the keymap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyOutcome {
    pub handled: bool,
    pub prevent_default: bool,
}

/// Table of undo/redo key bindings.
#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: Vec<KeyBinding>,
}

impl Default for Keymap {
    fn default() -> Self {
        Self::from_settings(&KeymapSettings::default())
    }
}

impl Keymap {
    /// Builds the table from user settings.
    pub fn from_settings(settings: &KeymapSettings) -> Self {
        Self {
            bindings: vec![
                KeyBinding {
                    key: settings.undo.clone(),
                    mac: None,
                    run: commands::undo,
                    prevent_default: settings.prevent_default,
                },
                KeyBinding {
                    key: settings.redo.clone(),
                    mac: Some(settings.redo_mac.clone()),
                    run: commands::redo,
                    prevent_default: settings.prevent_default,
                },
            ],
        }
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    /// Runs the first binding matching `pressed` on `platform`.
    ///
    /// A chord that cannot be parsed is reported as unhandled.
    pub fn handle(&self, pressed: &str, platform: Platform, config: &UndoConfig) -> KeyOutcome {
        let pressed = match Chord::parse(pressed, platform) {
            Ok(chord) => chord,
            Err(e) => {
                tracing::trace!("Ignoring key press: {e:#}");
                return KeyOutcome::default();
            }
        };

        for binding in &self.bindings {
            let bound = match Chord::parse(binding.chord_for(platform), platform) {
                Ok(chord) => chord,
                Err(e) => {
                    tracing::warn!("Skipping invalid key binding: {e:#}");
                    continue;
                }
            };
            if bound == pressed && (binding.run)(config) {
                return KeyOutcome {
                    handled: true,
                    prevent_default: binding.prevent_default,
                };
            }
        }
        KeyOutcome::default()
    }
}
