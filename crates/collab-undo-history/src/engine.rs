/// The history engine contract consumed by undo sessions.
use crate::event::{HistoryEvent, HistoryEventKind, SubscriptionId};
use crate::ids::Origin;
use crate::operation::{MetaSlot, StackItem};

/// Stack-based undo history over a collaborative document.
///
/// Methods take `&self`: engines are shared handles used from inside their
/// own event callbacks. Implementations must not be re-entered through
/// `undo`/`redo` from a history event handler.
pub trait HistoryEngine {
    /// Reverts the newest undo step. Returns the popped item, or `None` if
    /// there was nothing to undo.
    fn undo(&self) -> Option<StackItem>;

    /// Re-applies the newest redo step. Returns the popped item, or `None`
    /// if there was nothing to redo.
    fn redo(&self) -> Option<StackItem>;

    /// Subscribes `handler` to events of `kind`.
    fn on(
        &self,
        kind: HistoryEventKind,
        handler: Box<dyn FnMut(&mut HistoryEvent<'_>)>,
    ) -> SubscriptionId;

    /// Removes a subscription. Returns false if the token is unknown.
    ///
    /// May be called from inside a handler, including the one being run.
    fn off(&self, id: SubscriptionId) -> bool;

    /// Starts recording changes made under `origin`.
    fn add_tracked_origin(&self, origin: Origin);

    /// Stops recording changes made under `origin`.
    fn remove_tracked_origin(&self, origin: &Origin) -> bool;

    fn is_tracked_origin(&self, origin: &Origin) -> bool;

    fn undo_depth(&self) -> usize;

    fn redo_depth(&self) -> usize;

    /// Allocates a metadata slot private to the caller.
    fn register_slot(&self, name: &str) -> MetaSlot;
}
