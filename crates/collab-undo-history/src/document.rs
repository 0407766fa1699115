/// Sequence-CRDT text document.
///
/// Every inserted character becomes an item with a globally unique
/// [`ItemId`]. Deletions only tombstone items, so an item id stays a valid
/// reference for as long as the document lives. That is what makes
/// [`StickyIndex`] positions survive concurrent edits and lets the undo
/// history revert a step by flipping item visibility.
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use anyhow::{bail, Result};

use crate::event::{Listeners, SubscriptionId};
use crate::ids::{ClientId, ContainerId, ItemId, Origin};
use crate::operation::ChangeSet;

/// Document handle shared by the editor, the codec, and the history.
pub type SharedDoc = Rc<RefCell<TextDoc>>;

/// Callback run after every transaction that changed the document.
pub type TransactionObserver = dyn FnMut(&TextDoc, &TransactionRecord);

#[derive(Debug, Clone)]
struct Item {
    id: ItemId,
    ch: char,
    deleted: bool,
}

#[derive(Debug, Clone, Default)]
struct TextContainer {
    items: Vec<Item>,
}

impl TextContainer {
    fn len(&self) -> usize {
        self.items.iter().filter(|item| !item.deleted).count()
    }

    fn text(&self) -> String {
        self.items
            .iter()
            .filter(|item| !item.deleted)
            .map(|item| item.ch)
            .collect()
    }

    /// Index into `items` of the visible item at `offset`.
    fn visible_index(&self, offset: usize) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.deleted)
            .nth(offset)
            .map(|(idx, _)| idx)
    }

    /// Index into `items` where text inserted at `offset` goes: directly
    /// after the visible item to its left.
    fn insert_index(&self, offset: usize) -> usize {
        if offset == 0 {
            return 0;
        }
        self.visible_index(offset - 1)
            .map_or(self.items.len(), |idx| idx + 1)
    }

    fn index_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    fn offset_of_index(&self, index: usize) -> usize {
        self.items[..index].iter().filter(|item| !item.deleted).count()
    }
}

/// Where a sticky index is attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StickyAnchor {
    /// Directly before this item, whether or not it is still visible.
    Before(ItemId),
    /// After the last item of the container.
    End,
}

/// A position that keeps pointing at the same place in the text while
/// other edits move offsets around it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StickyIndex {
    pub container: ContainerId,
    pub anchor: StickyAnchor,
}

/// Summary of a committed transaction, handed to observers.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub origin: Origin,
    /// Replica that made the changes.
    pub client: ClientId,
    pub changes: ChangeSet,
    /// Containers with at least one net change.
    pub changed_parent_types: HashSet<ContainerId>,
}

/// A batch of edits applied under one origin.
pub struct Transaction<'doc> {
    client: ClientId,
    origin: Origin,
    containers: &'doc mut BTreeMap<ContainerId, TextContainer>,
    next_clock: &'doc mut u64,
    changes: ChangeSet,
}

impl Transaction<'_> {
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Inserts `text` at char `offset`, creating the container if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if `offset` is past the end of the container.
    pub fn insert(&mut self, container: &ContainerId, offset: usize, text: &str) -> Result<()> {
        let target = self.containers.entry(container.clone()).or_default();
        let len = target.len();
        if offset > len {
            bail!("Insert offset {offset} out of bounds for '{container}' (len {len})");
        }

        let mut at = target.insert_index(offset);
        for ch in text.chars() {
            let id = ItemId::new(self.client, *self.next_clock);
            *self.next_clock += 1;
            target.items.insert(
                at,
                Item {
                    id,
                    ch,
                    deleted: false,
                },
            );
            self.changes.record_visible(container, id);
            at += 1;
        }
        Ok(())
    }

    /// Deletes `len` chars starting at char `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range reaches past the end of the container.
    pub fn delete(&mut self, container: &ContainerId, offset: usize, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let Some(target) = self.containers.get_mut(container) else {
            bail!("Cannot delete from unknown container '{container}'");
        };
        let available = target.len();
        if len > available.saturating_sub(offset) {
            bail!(
                "Delete of {len} chars at {offset} out of bounds for '{container}' (len {available})"
            );
        }

        let doomed: Vec<usize> = target
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.deleted)
            .skip(offset)
            .take(len)
            .map(|(idx, _)| idx)
            .collect();
        for idx in doomed {
            let item = &mut target.items[idx];
            item.deleted = true;
            self.changes.record_hidden(container, item.id);
        }
        Ok(())
    }

    /// Applies the inverse of `changes`: hides what became visible and
    /// restores what was hidden. Items already in the target state are
    /// left alone, so the transaction only records what actually flipped.
    pub(crate) fn revert(&mut self, changes: &ChangeSet) {
        for (container, container_changes) in changes.iter() {
            let Some(target) = self.containers.get_mut(container) else {
                continue;
            };
            for id in &container_changes.inserted {
                if let Some(idx) = target.index_of(*id) {
                    if !target.items[idx].deleted {
                        target.items[idx].deleted = true;
                        self.changes.record_hidden(container, *id);
                    }
                }
            }
            for id in &container_changes.deleted {
                if let Some(idx) = target.index_of(*id) {
                    if target.items[idx].deleted {
                        target.items[idx].deleted = false;
                        self.changes.record_visible(container, *id);
                    }
                }
            }
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    fn into_record(self) -> TransactionRecord {
        let changed_parent_types = self.changes.changed_containers();
        TransactionRecord {
            origin: self.origin,
            client: self.client,
            changes: self.changes,
            changed_parent_types,
        }
    }
}

/// A collaboratively edited document made of named text containers.
pub struct TextDoc {
    client: ClientId,
    next_clock: u64,
    containers: BTreeMap<ContainerId, TextContainer>,
    observers: Listeners<TransactionObserver>,
}

impl std::fmt::Debug for TextDoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextDoc")
            .field("client", &self.client)
            .field("next_clock", &self.next_clock)
            .field("containers", &self.containers.keys().collect::<Vec<_>>())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for TextDoc {
    fn default() -> Self {
        Self::new()
    }
}

impl TextDoc {
    /// Creates an empty document with a random client id.
    pub fn new() -> Self {
        Self::with_client(ClientId::random())
    }

    pub fn with_client(client: ClientId) -> Self {
        Self {
            client,
            next_clock: 0,
            containers: BTreeMap::new(),
            observers: Listeners::default(),
        }
    }

    /// Wraps the document in a shared handle.
    pub fn into_shared(self) -> SharedDoc {
        Rc::new(RefCell::new(self))
    }

    pub fn client_id(&self) -> ClientId {
        self.client
    }

    /// Returns the visible text of a container (empty if it doesn't exist).
    pub fn text(&self, container: &ContainerId) -> String {
        self.containers
            .get(container)
            .map(TextContainer::text)
            .unwrap_or_default()
    }

    /// Returns the visible length of a container in chars.
    pub fn len(&self, container: &ContainerId) -> usize {
        self.containers.get(container).map_or(0, TextContainer::len)
    }

    pub fn is_empty(&self, container: &ContainerId) -> bool {
        self.len(container) == 0
    }

    /// Runs `f` as one transaction by this document's own client.
    ///
    /// Observers are notified once `f` returns, if anything changed. When
    /// `f` fails, edits it already applied stay applied and are reported.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`.
    pub fn transact<R>(
        &mut self,
        origin: Origin,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<R>,
    ) -> Result<R> {
        let client = self.client;
        self.transact_as(client, origin, f)
    }

    /// Runs `f` as one transaction made by another replica.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`.
    pub fn transact_as<R>(
        &mut self,
        client: ClientId,
        origin: Origin,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut txn = Transaction {
            client,
            origin,
            containers: &mut self.containers,
            next_clock: &mut self.next_clock,
            changes: ChangeSet::new(),
        };
        let result = f(&mut txn);
        let record = txn.into_record();
        if !record.changes.is_empty() {
            self.notify(&record);
        }
        result
    }

    fn notify(&mut self, record: &TransactionRecord) {
        let mut observers = std::mem::take(&mut self.observers);
        for handler in observers.handlers_mut() {
            handler(self, record);
        }
        let added_during_dispatch = std::mem::replace(&mut self.observers, observers);
        self.observers.append(added_during_dispatch);
    }

    /// Registers a callback run after each transaction that changed the
    /// document.
    pub fn observe_transactions(
        &mut self,
        handler: impl FnMut(&TextDoc, &TransactionRecord) + 'static,
    ) -> SubscriptionId {
        self.observers.add(Box::new(handler))
    }

    pub fn unobserve_transactions(&mut self, id: SubscriptionId) -> bool {
        self.observers.remove(id)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Returns a sticky index for char `offset`, or `None` if the offset is
    /// past the end of the container.
    pub fn sticky_index(&self, container: &ContainerId, offset: usize) -> Option<StickyIndex> {
        let anchor = match self.containers.get(container) {
            None if offset == 0 => StickyAnchor::End,
            None => return None,
            Some(target) => {
                if offset > target.len() {
                    return None;
                }
                match target.visible_index(offset) {
                    Some(idx) => StickyAnchor::Before(target.items[idx].id),
                    None => StickyAnchor::End,
                }
            }
        };
        Some(StickyIndex {
            container: container.clone(),
            anchor,
        })
    }

    /// Resolves a sticky index to a char offset in the current text.
    ///
    /// Returns `None` if the anchored item is unknown to this document.
    pub fn resolve_sticky(&self, index: &StickyIndex) -> Option<usize> {
        let target = self.containers.get(&index.container);
        match (&index.anchor, target) {
            (StickyAnchor::End, None) => Some(0),
            (StickyAnchor::End, Some(target)) => Some(target.len()),
            (StickyAnchor::Before(_), None) => None,
            (StickyAnchor::Before(id), Some(target)) => target
                .index_of(*id)
                .map(|idx| target.offset_of_index(idx)),
        }
    }
}
