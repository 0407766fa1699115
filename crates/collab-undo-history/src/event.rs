/// Subscription tokens, listener tables, and history lifecycle events.
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ids::ContainerId;
use crate::operation::StackItem;

/// Counter for subscription tokens, unique within the process.
static SUBSCRIPTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Token returned by a subscribe call and passed back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(SUBSCRIPTION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Ordered table of callbacks keyed by subscription token.
///
/// Callbacks run in subscription order.
pub struct Listeners<H: ?Sized> {
    entries: Vec<(SubscriptionId, Box<H>)>,
}

impl<H: ?Sized> Default for Listeners<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<H: ?Sized> fmt::Debug for Listeners<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<H: ?Sized> Listeners<H> {
    pub fn add(&mut self, handler: Box<H>) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.entries.push((id, handler));
        id
    }

    /// Removes a callback. Returns false if the token is unknown.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handlers_mut(&mut self) -> impl Iterator<Item = &mut Box<H>> {
        self.entries.iter_mut().map(|(_, handler)| handler)
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = (SubscriptionId, &mut Box<H>)> {
        self.entries.iter_mut().map(|(id, handler)| (*id, handler))
    }

    pub fn ids(&self) -> impl Iterator<Item = SubscriptionId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// Appends the entries of `other`, keeping their tokens.
    ///
    /// Used to restore a table that was taken out for dispatch while new
    /// subscriptions arrived.
    pub fn append(&mut self, other: Listeners<H>) {
        self.entries.extend(other.entries);
    }
}

/// Which of the two history stacks an item lives on or was popped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackKind {
    Undo,
    Redo,
}

impl StackKind {
    pub fn opposite(self) -> Self {
        match self {
            StackKind::Undo => StackKind::Redo,
            StackKind::Redo => StackKind::Undo,
        }
    }
}

/// Event kinds a history subscriber can listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryEventKind {
    /// A new stack item was finalized.
    ItemAdded,
    /// A change was merged into the newest undo item.
    ItemUpdated,
    /// An item was undone or redone.
    ItemPopped,
}

impl HistoryEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryEventKind::ItemAdded => "item-added",
            HistoryEventKind::ItemUpdated => "item-updated",
            HistoryEventKind::ItemPopped => "item-popped",
        }
    }
}

/// A history lifecycle event with its payload.
///
/// `changed_parent_types` is only valid for the duration of the callback.
pub enum HistoryEvent<'a> {
    ItemAdded {
        item: &'a mut StackItem,
        changed_parent_types: &'a HashSet<ContainerId>,
        stack: StackKind,
    },
    ItemUpdated {
        item: &'a mut StackItem,
        changed_parent_types: &'a HashSet<ContainerId>,
    },
    ItemPopped {
        item: &'a StackItem,
        stack: StackKind,
    },
}

impl HistoryEvent<'_> {
    pub fn kind(&self) -> HistoryEventKind {
        match self {
            HistoryEvent::ItemAdded { .. } => HistoryEventKind::ItemAdded,
            HistoryEvent::ItemUpdated { .. } => HistoryEventKind::ItemUpdated,
            HistoryEvent::ItemPopped { .. } => HistoryEventKind::ItemPopped,
        }
    }
}

/// Callback type for history events.
pub type HistoryHandler = dyn FnMut(&mut HistoryEvent<'_>);
