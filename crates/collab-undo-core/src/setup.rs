/// Wires a document container, its undo history, and a view together.
use std::rc::Rc;

use anyhow::{Context, Result};
use collab_undo_config::UndoSettings;

use crate::commands::UndoConfig;
use crate::editor::TextView;
use crate::history::{ContainerId, HistoryConfig, HistoryEngine, SharedDoc, UndoManager};
use crate::keymap::{KeyOutcome, Keymap, Platform};
use crate::plugin::UndoPlugin;
use crate::sync::SyncBinding;

/// An editor bound to one container of a shared document, with undo
/// history and key bindings.
#[derive(Debug)]
pub struct CollabEditor {
    pub view: Rc<TextView>,
    pub config: UndoConfig,
    pub keymap: Keymap,
    pub history: Rc<UndoManager>,
}

impl CollabEditor {
    /// Feeds a key press to the keymap using the build platform.
    pub fn handle_key(&self, chord: &str) -> KeyOutcome {
        self.keymap.handle(chord, Platform::current(), &self.config)
    }

    pub fn undo_depth(&self) -> usize {
        self.config.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.config.redo_depth()
    }
}

/// Creates a view over `container` with undo history scoped to it.
///
/// The undo plugin is registered first on the view, ahead of anything the
/// caller adds later.
///
/// # Errors
///
/// Returns an error if the document is currently borrowed.
pub fn bind_editor(
    doc: SharedDoc,
    container: ContainerId,
    settings: &UndoSettings,
) -> Result<CollabEditor> {
    let sync = Rc::new(SyncBinding::new(Rc::clone(&doc), container.clone()));
    let history = Rc::new(
        UndoManager::new(doc, [container.clone()], HistoryConfig::from(settings))
            .context("Failed to create undo history")?,
    );
    let config = UndoConfig::new(Rc::clone(&history) as Rc<dyn HistoryEngine>);

    let view = TextView::new(Rc::clone(&sync)).context("Failed to open editor view")?;
    view.add_plugin(|view| UndoPlugin::new(view, &config, &sync))?;
    tracing::debug!(%container, binding = %sync.id(), "Editor bound");

    Ok(CollabEditor {
        view,
        config,
        keymap: Keymap::from_settings(&settings.keymap),
        history,
    })
}
