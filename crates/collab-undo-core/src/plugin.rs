/// View plugin that drives an `UndoSession` from the view lifecycle.
use std::rc::{Rc, Weak};

use crate::codec::SelectionCodec;
use crate::commands::UndoConfig;
use crate::session::UndoSession;
use crate::sync::{SyncBinding, SyncId};
use crate::view::{Annotation, EditorView, ViewPlugin, ViewUpdate};

/// Captures the user's selection before each change and restores it on
/// undo and redo.
///
/// Must be registered before any plugin that writes view changes into the
/// document during `update`, so the selection is captured before that
/// change is recorded.
#[derive(Debug)]
pub struct UndoPlugin {
    session: UndoSession,
    sync: SyncId,
}

impl UndoPlugin {
    /// Binds a new session to `view` and starts listening to the history.
    ///
    /// The view's current selection is captured right away so the first
    /// change of the session can be restored too.
    pub fn new(view: Weak<dyn EditorView>, config: &UndoConfig, sync: &Rc<SyncBinding>) -> Self {
        let codec: Rc<dyn SelectionCodec> = Rc::clone(sync) as Rc<dyn SelectionCodec>;
        let session = UndoSession::new(
            Rc::clone(config.engine()),
            codec,
            view,
            sync.container().clone(),
        );
        session.attach();
        session.capture_selection();
        Self {
            session,
            sync: sync.id(),
        }
    }

    pub fn session(&self) -> &UndoSession {
        &self.session
    }
}

impl ViewPlugin for UndoPlugin {
    fn update(&mut self, update: &ViewUpdate) {
        if !update.selection_set {
            return;
        }
        let own_sync = Annotation::Sync(self.sync);
        let from_sync = update
            .transactions
            .first()
            .is_some_and(|txn| txn.is_annotated(&own_sync));
        if !from_sync {
            self.session.capture_selection();
        }
    }

    fn destroy(&mut self) {
        self.session.detach();
    }
}
