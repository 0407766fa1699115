// Re-exports from collab-undo-history used across this crate's API.
pub use collab_undo_history::{
    ClientId, ContainerId, HistoryConfig, HistoryEngine, HistoryEvent, HistoryEventKind, MetaSlot,
    Origin, SharedDoc, StackItem, StackKind, StickyIndex, SubscriptionId, TextDoc, UndoManager,
};
