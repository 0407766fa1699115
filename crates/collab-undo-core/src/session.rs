/// Undo session: keeps the editor selection in step with undo and redo.
///
/// The session remembers the selection the user had right before the next
/// change (the *pending* selection). When the history finalizes a new stack
/// item touching the tracked container, the pending selection is stamped
/// onto it, once. When that item is later undone or redone, the stamped
/// selection is decoded and dispatched to the view, and the restored
/// selection becomes the new pending one.
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use collab_undo_history::{
    ContainerId, HistoryEngine, HistoryEvent, HistoryEventKind, MetaSlot, Origin, StackItem,
    SubscriptionId,
};

use crate::codec::{PortableRange, SelectionCodec};
use crate::view::{EditorView, TransactionSpec};

/// Name of the metadata slot sessions register on the engine.
const SELECTION_SLOT: &str = "undo-session-selection";

/// State shared with the history event handlers.
struct SessionCore {
    codec: Rc<dyn SelectionCodec>,
    view: Weak<dyn EditorView>,
    tracked: ContainerId,
    slot: MetaSlot,
    pending: RefCell<Option<PortableRange>>,
}

impl SessionCore {
    fn capture_selection(&self) {
        let Some(view) = self.view.upgrade() else {
            tracing::trace!("View gone; selection not captured");
            return;
        };
        let selection = view.selection();
        let Some(range) = self.codec.to_portable(selection) else {
            tracing::trace!(?selection, "Selection not encodable; pending selection kept");
            return;
        };
        match self.pending.try_borrow_mut() {
            Ok(mut pending) => *pending = Some(range),
            Err(_) => tracing::warn!("Pending selection busy; capture dropped"),
        }
    }

    fn on_item_added(&self, item: &mut StackItem, changed_parent_types: &HashSet<ContainerId>) {
        if !changed_parent_types.contains(&self.tracked) {
            return;
        }
        if item.meta.contains(&self.slot) {
            return;
        }
        let Ok(pending) = self.pending.try_borrow() else {
            tracing::warn!(seq = item.seq, "Pending selection busy; item left unstamped");
            return;
        };
        let Some(range) = pending.as_ref() else {
            tracing::trace!(seq = item.seq, "No pending selection; item left unstamped");
            return;
        };
        item.meta.insert(&self.slot, range.clone());
        tracing::debug!(seq = item.seq, slot = %self.slot, "Stamped selection on stack item");
    }

    fn on_item_popped(&self, item: &StackItem) {
        let Some(range) = item.meta.get::<PortableRange>(&self.slot) else {
            tracing::trace!(seq = item.seq, "Popped item carries no selection");
            return;
        };
        let Some(view) = self.view.upgrade() else {
            return;
        };
        match self.codec.from_portable(range) {
            Some(selection) => {
                tracing::debug!(seq = item.seq, ?selection, "Restoring selection");
                view.dispatch(TransactionSpec::selection(selection));
            }
            None => tracing::trace!(seq = item.seq, "Stamped selection no longer resolves"),
        }
        self.capture_selection();
    }
}

/// Glue between one editor view and a history engine.
///
/// Each session allocates its own metadata slot on the engine, so several
/// sessions sharing one engine never read each other's selections.
pub struct UndoSession {
    core: Rc<SessionCore>,
    engine: Rc<dyn HistoryEngine>,
    subscriptions: Cell<Option<(SubscriptionId, SubscriptionId)>>,
}

impl std::fmt::Debug for UndoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoSession")
            .field("tracked", &self.core.tracked)
            .field("slot", &self.core.slot)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl UndoSession {
    /// Creates a detached session with no pending selection.
    pub fn new(
        engine: Rc<dyn HistoryEngine>,
        codec: Rc<dyn SelectionCodec>,
        view: Weak<dyn EditorView>,
        tracked: ContainerId,
    ) -> Self {
        let slot = engine.register_slot(SELECTION_SLOT);
        Self {
            core: Rc::new(SessionCore {
                codec,
                view,
                tracked,
                slot,
                pending: RefCell::new(None),
            }),
            engine,
            subscriptions: Cell::new(None),
        }
    }

    /// Subscribes to the engine's item-added and item-popped events.
    /// Does nothing if already attached.
    pub fn attach(&self) {
        if self.is_attached() {
            return;
        }

        let core = Rc::downgrade(&self.core);
        let added = self.engine.on(
            HistoryEventKind::ItemAdded,
            Box::new(move |event: &mut HistoryEvent<'_>| {
                let Some(core) = core.upgrade() else {
                    return;
                };
                if let HistoryEvent::ItemAdded {
                    item,
                    changed_parent_types,
                    ..
                } = event
                {
                    core.on_item_added(item, changed_parent_types);
                }
            }),
        );

        let core = Rc::downgrade(&self.core);
        let popped = self.engine.on(
            HistoryEventKind::ItemPopped,
            Box::new(move |event: &mut HistoryEvent<'_>| {
                let Some(core) = core.upgrade() else {
                    return;
                };
                if let HistoryEvent::ItemPopped { item, .. } = event {
                    core.on_item_popped(item);
                }
            }),
        );

        self.subscriptions.set(Some((added, popped)));
        tracing::debug!(slot = %self.core.slot, "Undo session attached");
    }

    /// Unsubscribes both handlers. Does nothing if not attached.
    pub fn detach(&self) {
        if let Some((added, popped)) = self.subscriptions.take() {
            self.engine.off(added);
            self.engine.off(popped);
            tracing::debug!(slot = %self.core.slot, "Undo session detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.subscriptions.get().is_some()
    }

    /// Records the view's current selection as the pending selection.
    pub fn capture_selection(&self) {
        self.core.capture_selection();
    }

    /// Stamps the pending selection on `item` if it touched the tracked
    /// container and carries no selection from this session yet.
    pub fn on_item_added(&self, item: &mut StackItem, changed_parent_types: &HashSet<ContainerId>) {
        self.core.on_item_added(item, changed_parent_types);
    }

    /// Restores the selection stamped on `item`, then captures it again.
    pub fn on_item_popped(&self, item: &StackItem) {
        self.core.on_item_popped(item);
    }

    /// Undoes the newest step. Returns whether anything was undone.
    pub fn undo(&self) -> bool {
        self.engine.undo().is_some()
    }

    /// Redoes the newest undone step. Returns whether anything was redone.
    pub fn redo(&self) -> bool {
        self.engine.redo().is_some()
    }

    pub fn add_tracked_origin(&self, origin: Origin) {
        self.engine.add_tracked_origin(origin);
    }

    pub fn remove_tracked_origin(&self, origin: &Origin) -> bool {
        self.engine.remove_tracked_origin(origin)
    }

    pub fn pending_selection(&self) -> Option<PortableRange> {
        self.core.pending.try_borrow().ok().and_then(|pending| pending.clone())
    }

    /// The metadata slot this session stamps.
    pub fn slot(&self) -> &MetaSlot {
        &self.core.slot
    }

    pub fn tracked_container(&self) -> &ContainerId {
        &self.core.tracked
    }
}

impl Drop for UndoSession {
    fn drop(&mut self) {
        self.detach();
    }
}
