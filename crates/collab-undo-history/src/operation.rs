/// Core types for recorded changes and undo stack items.
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::ids::{ContainerId, ItemId};

/// Net visibility changes of items within one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerChanges {
    /// Items that became visible (inserted or restored).
    pub inserted: BTreeSet<ItemId>,
    /// Items that became hidden (deleted).
    pub deleted: BTreeSet<ItemId>,
}

impl ContainerChanges {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty()
    }
}

/// Net changes of a transaction or an undo step, per container.
///
/// Recording is net: hiding an item that became visible within the same
/// set cancels out instead of being listed twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    containers: BTreeMap<ContainerId, ContainerChanges>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `id` became visible.
    pub fn record_visible(&mut self, container: &ContainerId, id: ItemId) {
        let changes = self.containers.entry(container.clone()).or_default();
        if !changes.deleted.remove(&id) {
            changes.inserted.insert(id);
        }
    }

    /// Records that `id` became hidden.
    pub fn record_hidden(&mut self, container: &ContainerId, id: ItemId) {
        let changes = self.containers.entry(container.clone()).or_default();
        if !changes.inserted.remove(&id) {
            changes.deleted.insert(id);
        }
    }

    /// Folds `other` into this set, as if its changes happened afterwards.
    pub fn merge(&mut self, other: &ChangeSet) {
        for (container, changes) in &other.containers {
            for id in &changes.inserted {
                self.record_visible(container, *id);
            }
            for id in &changes.deleted {
                self.record_hidden(container, *id);
            }
        }
    }

    /// Returns a copy limited to the given containers.
    pub fn restricted_to(&self, scope: &HashSet<ContainerId>) -> ChangeSet {
        ChangeSet {
            containers: self
                .containers
                .iter()
                .filter(|(container, _)| scope.contains(*container))
                .map(|(container, changes)| (container.clone(), changes.clone()))
                .collect(),
        }
    }

    pub fn container(&self, container: &ContainerId) -> Option<&ContainerChanges> {
        self.containers.get(container)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContainerId, &ContainerChanges)> {
        self.containers.iter()
    }

    /// Containers with at least one net change.
    pub fn changed_containers(&self) -> HashSet<ContainerId> {
        self.containers
            .iter()
            .filter(|(_, changes)| !changes.is_empty())
            .map(|(container, _)| container.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.values().all(ContainerChanges::is_empty)
    }
}

/// A named slot in a stack item's metadata.
///
/// Slots are handed out by the history engine; two slots from the same
/// engine never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaSlot {
    id: u64,
    name: Rc<str>,
}

impl MetaSlot {
    pub(crate) fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: Rc::from(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for MetaSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// Metadata attached to a stack item, shared by all history subscribers.
///
/// Each subscriber reads and writes only the slot it registered.
#[derive(Default)]
pub struct StackMeta {
    slots: HashMap<MetaSlot, Box<dyn Any>>,
}

impl fmt::Debug for StackMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.slots.keys().map(ToString::to_string).collect();
        names.sort();
        f.debug_struct("StackMeta").field("slots", &names).finish()
    }
}

impl StackMeta {
    /// Returns the value in `slot` if it holds a `T`.
    pub fn get<T: Any>(&self, slot: &MetaSlot) -> Option<&T> {
        self.slots.get(slot).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains(&self, slot: &MetaSlot) -> bool {
        self.slots.contains_key(slot)
    }

    /// Stores `value` in `slot`, replacing any previous value.
    pub fn insert<T: Any>(&mut self, slot: &MetaSlot, value: T) {
        self.slots.insert(slot.clone(), Box::new(value));
    }

    pub fn remove(&mut self, slot: &MetaSlot) -> bool {
        self.slots.remove(slot).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// One undoable unit: a group of changes plus subscriber metadata.
#[derive(Debug)]
pub struct StackItem {
    /// Net changes that this step applied to the document.
    pub operations: ChangeSet,
    pub meta: StackMeta,
    /// Monotonic sequence number assigned by the `UndoManager`.
    pub seq: u64,
}

impl StackItem {
    pub fn new(operations: ChangeSet, seq: u64) -> Self {
        Self {
            operations,
            meta: StackMeta::default(),
            seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ClientId;

    fn id(clock: u64) -> ItemId {
        ItemId::new(ClientId::new(7), clock)
    }

    fn body() -> ContainerId {
        ContainerId::from("body")
    }

    #[test]
    fn test_insert_then_delete_cancels_out() {
        let mut set = ChangeSet::new();
        set.record_visible(&body(), id(1));
        set.record_hidden(&body(), id(1));
        assert!(set.is_empty());
        assert!(set.changed_containers().is_empty());
    }

    #[test]
    fn test_delete_then_restore_cancels_out() {
        let mut set = ChangeSet::new();
        set.record_hidden(&body(), id(3));
        set.record_visible(&body(), id(3));
        assert!(set.is_empty());
    }

    #[test]
    fn test_merge_keeps_net_effect() {
        let mut first = ChangeSet::new();
        first.record_visible(&body(), id(1));
        first.record_visible(&body(), id(2));

        let mut second = ChangeSet::new();
        second.record_hidden(&body(), id(2));
        second.record_hidden(&body(), id(9));

        first.merge(&second);
        let changes = first.container(&body()).unwrap();
        assert_eq!(changes.inserted.iter().copied().collect::<Vec<_>>(), vec![id(1)]);
        assert_eq!(changes.deleted.iter().copied().collect::<Vec<_>>(), vec![id(9)]);
    }

    #[test]
    fn test_restricted_to_scope() {
        let title = ContainerId::from("title");
        let mut set = ChangeSet::new();
        set.record_visible(&body(), id(1));
        set.record_visible(&title, id(2));

        let scope: HashSet<ContainerId> = [body()].into_iter().collect();
        let restricted = set.restricted_to(&scope);
        assert!(restricted.container(&body()).is_some());
        assert!(restricted.container(&title).is_none());
        assert_eq!(set.changed_containers().len(), 2);
    }

    #[test]
    fn test_meta_slots_are_typed_and_isolated() {
        let a = MetaSlot::new(1, "selection");
        let b = MetaSlot::new(2, "selection");
        let mut meta = StackMeta::default();

        meta.insert(&a, 42_u32);
        assert_eq!(meta.get::<u32>(&a), Some(&42));
        assert_eq!(meta.get::<String>(&a), None);
        assert!(!meta.contains(&b));
        assert_eq!(meta.get::<u32>(&b), None);

        meta.insert(&b, "other".to_string());
        assert_eq!(meta.len(), 2);
        assert!(meta.remove(&a));
        assert!(!meta.contains(&a));
    }

    #[test]
    fn test_meta_debug_lists_slot_names() {
        let slot = MetaSlot::new(5, "cursor");
        let mut meta = StackMeta::default();
        meta.insert(&slot, ());
        assert!(format!("{meta:?}").contains("cursor#5"));
    }
}
