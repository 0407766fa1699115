/// Collaborative text document and the undo/redo history built on it.
///
/// Provides a sequence-CRDT `TextDoc` whose positions can be made sticky,
/// and an `UndoManager` that records tracked transactions as stack items
/// carrying per-subscriber metadata. Consumers depend on the
/// `HistoryEngine` trait rather than on the manager itself.
pub mod config;
pub mod document;
pub mod engine;
pub mod event;
pub mod ids;
pub mod manager;
pub mod operation;

pub use config::HistoryConfig;
pub use document::{
    SharedDoc, StickyAnchor, StickyIndex, TextDoc, Transaction, TransactionRecord,
};
pub use engine::HistoryEngine;
pub use event::{HistoryEvent, HistoryEventKind, StackKind, SubscriptionId};
pub use ids::{ClientId, ContainerId, ItemId, Origin};
pub use manager::UndoManager;
pub use operation::{ChangeSet, MetaSlot, StackItem, StackMeta};
