/// Undo/redo commands and depth accessors for key bindings and toolbars.
use std::rc::Rc;

use collab_undo_history::{HistoryEngine, Origin};

/// Per-editor configuration read by the commands: the history engine the
/// editor's undo session is attached to.
#[derive(Clone)]
pub struct UndoConfig {
    engine: Rc<dyn HistoryEngine>,
}

impl std::fmt::Debug for UndoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoConfig")
            .field("undo_depth", &self.undo_depth())
            .field("redo_depth", &self.redo_depth())
            .finish()
    }
}

impl UndoConfig {
    pub fn new(engine: Rc<dyn HistoryEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Rc<dyn HistoryEngine> {
        &self.engine
    }

    /// Returns whether a change was undone.
    pub fn undo(&self) -> bool {
        self.engine.undo().is_some()
    }

    /// Returns whether a change was redone.
    pub fn redo(&self) -> bool {
        self.engine.redo().is_some()
    }

    pub fn add_tracked_origin(&self, origin: Origin) {
        self.engine.add_tracked_origin(origin);
    }

    pub fn remove_tracked_origin(&self, origin: &Origin) -> bool {
        self.engine.remove_tracked_origin(origin)
    }

    pub fn undo_depth(&self) -> usize {
        self.engine.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.engine.redo_depth()
    }
}

/// Undo command. Always reports the key as handled, even with nothing to
/// undo, so no other binding picks it up.
pub fn undo(config: &UndoConfig) -> bool {
    let undone = config.undo();
    tracing::trace!(undone, "Undo command");
    true
}

/// Redo command. Always reports the key as handled.
pub fn redo(config: &UndoConfig) -> bool {
    let redone = config.redo();
    tracing::trace!(redone, "Redo command");
    true
}

pub fn undo_depth(config: &UndoConfig) -> usize {
    config.undo_depth()
}

pub fn redo_depth(config: &UndoConfig) -> usize {
    config.redo_depth()
}
