/// Undo/redo manager over a collaborative text document.
///
/// The manager observes every transaction committed to its document and
/// records the tracked ones as stack items. Undoing reverts an item's
/// changes in a new transaction; the reverted changes become a fresh item
/// on the opposite stack, so redo works the same way undo does.
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::config::HistoryConfig;
use crate::document::{SharedDoc, TransactionRecord};
use crate::engine::HistoryEngine;
use crate::event::{
    HistoryEvent, HistoryEventKind, HistoryHandler, Listeners, StackKind, SubscriptionId,
};
use crate::ids::{ContainerId, Origin};
use crate::operation::{MetaSlot, StackItem};

/// Stacks and recording state, shared with the document observer.
struct StackState {
    undo_stack: Vec<StackItem>,
    redo_stack: Vec<StackItem>,
    /// Containers whose changes are recorded.
    scope: HashSet<ContainerId>,
    tracked_origins: HashSet<Origin>,
    /// Stack receiving the inverse item while an undo or redo is applied.
    replaying: Option<StackKind>,
    /// Timestamp of the last recorded change, used for grouping.
    last_change: Option<Instant>,
    next_seq: u64,
    next_slot: u64,
    config: HistoryConfig,
}

/// What the observer did with a transaction.
enum Recorded {
    Added { stack: StackKind, item: StackItem },
    Updated { item: StackItem },
}

impl StackState {
    fn new(scope: HashSet<ContainerId>, config: HistoryConfig) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            scope,
            tracked_origins: config.tracked_origins.iter().cloned().collect(),
            replaying: None,
            last_change: None,
            next_seq: 0,
            next_slot: 0,
            config,
        }
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn stack_mut(&mut self, stack: StackKind) -> &mut Vec<StackItem> {
        match stack {
            StackKind::Undo => &mut self.undo_stack,
            StackKind::Redo => &mut self.redo_stack,
        }
    }

    /// Decides where the changes of `record` go. The returned item is
    /// detached from the stacks so events can be emitted without holding
    /// a borrow; the caller pushes it back with `push`.
    fn observe(&mut self, record: &TransactionRecord) -> Option<Recorded> {
        let changes = record.changes.restricted_to(&self.scope);
        if changes.is_empty() {
            return None;
        }

        if let Some(stack) = self.replaying {
            let item = StackItem::new(changes, self.take_seq());
            return Some(Recorded::Added { stack, item });
        }

        if !self.tracked_origins.contains(&record.origin) {
            tracing::trace!(origin = %record.origin, "Ignoring untracked transaction");
            return None;
        }

        let now = Instant::now();
        let timeout = Duration::from_millis(self.config.capture_timeout_ms);
        let within_timeout = self
            .last_change
            .is_some_and(|last| now.duration_since(last) < timeout);
        self.last_change = Some(now);
        self.redo_stack.clear();

        if within_timeout {
            if let Some(mut item) = self.undo_stack.pop() {
                item.operations.merge(&changes);
                return Some(Recorded::Updated { item });
            }
        }

        let item = StackItem::new(changes, self.take_seq());
        Some(Recorded::Added {
            stack: StackKind::Undo,
            item,
        })
    }

    fn push(&mut self, stack: StackKind, item: StackItem) {
        self.stack_mut(stack).push(item);
        if stack == StackKind::Undo && self.undo_stack.len() > self.config.max_history_depth {
            let excess = self.undo_stack.len() - self.config.max_history_depth;
            self.undo_stack.drain(..excess);
            tracing::debug!(evicted = excess, "Evicted oldest undo steps");
        }
    }
}

#[derive(Default)]
struct EventTables {
    added: Listeners<HistoryHandler>,
    updated: Listeners<HistoryHandler>,
    popped: Listeners<HistoryHandler>,
    /// Tokens of tables currently taken out by `emit`, innermost last.
    dispatching: Vec<SubscriptionId>,
    /// Tokens unsubscribed while their table was taken out.
    removed: HashSet<SubscriptionId>,
}

impl EventTables {
    fn remove(&mut self, id: SubscriptionId) -> bool {
        if self.added.remove(id) || self.updated.remove(id) || self.popped.remove(id) {
            return true;
        }
        self.dispatching.contains(&id) && self.removed.insert(id)
    }

    fn table_mut(&mut self, kind: HistoryEventKind) -> &mut Listeners<HistoryHandler> {
        match kind {
            HistoryEventKind::ItemAdded => &mut self.added,
            HistoryEventKind::ItemUpdated => &mut self.updated,
            HistoryEventKind::ItemPopped => &mut self.popped,
        }
    }
}

/// Delivers `event` to the subscribers of its kind.
///
/// The table is taken out for the duration of the dispatch, so handlers may
/// subscribe and unsubscribe. New subscriptions start with the next event.
/// A handler unsubscribed mid-dispatch is skipped for the rest of it and
/// dropped when the table is put back.
fn emit(events: &RefCell<EventTables>, event: &mut HistoryEvent<'_>) {
    let kind = event.kind();
    let (mut taken, mark) = {
        let mut tables = events.borrow_mut();
        let taken = std::mem::take(tables.table_mut(kind));
        let mark = tables.dispatching.len();
        tables.dispatching.extend(taken.ids());
        (taken, mark)
    };
    for (id, handler) in taken.entries_mut() {
        if events.borrow().removed.contains(&id) {
            continue;
        }
        handler(&mut *event);
    }

    let mut tables = events.borrow_mut();
    tables.dispatching.truncate(mark);
    let unsubscribed: Vec<SubscriptionId> = taken
        .ids()
        .filter(|id| tables.removed.remove(id))
        .collect();
    for id in unsubscribed {
        taken.remove(id);
    }
    let added_during_dispatch = std::mem::replace(tables.table_mut(kind), taken);
    tables.table_mut(kind).append(added_during_dispatch);
}

/// Manages undo/redo history for a set of containers in one document.
pub struct UndoManager {
    doc: SharedDoc,
    state: Rc<RefCell<StackState>>,
    events: Rc<RefCell<EventTables>>,
    doc_subscription: SubscriptionId,
}

impl std::fmt::Debug for UndoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("UndoManager")
            .field("undo_len", &state.undo_stack.len())
            .field("redo_len", &state.redo_stack.len())
            .field("scope", &state.scope)
            .field("tracked_origins", &state.tracked_origins)
            .field("next_seq", &state.next_seq)
            .finish()
    }
}

impl UndoManager {
    /// Creates a manager recording changes to `scope` in `doc`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is currently borrowed, e.g. when
    /// called from inside a transaction observer.
    pub fn new(
        doc: SharedDoc,
        scope: impl IntoIterator<Item = ContainerId>,
        config: HistoryConfig,
    ) -> Result<Self> {
        let state = Rc::new(RefCell::new(StackState::new(
            scope.into_iter().collect(),
            config,
        )));
        let events = Rc::new(RefCell::new(EventTables::default()));

        let weak_state = Rc::downgrade(&state);
        let weak_events = Rc::downgrade(&events);
        let doc_subscription = doc
            .try_borrow_mut()
            .map_err(|_| anyhow!("Cannot attach undo history while the document is in use"))?
            .observe_transactions(move |_, record| {
                let (Some(state), Some(events)) = (weak_state.upgrade(), weak_events.upgrade())
                else {
                    return;
                };
                Self::on_transaction(&state, &events, record);
            });

        Ok(Self {
            doc,
            state,
            events,
            doc_subscription,
        })
    }

    fn on_transaction(
        state: &RefCell<StackState>,
        events: &RefCell<EventTables>,
        record: &TransactionRecord,
    ) {
        let recorded = match state.try_borrow_mut() {
            Ok(mut state) => state.observe(record),
            Err(_) => {
                tracing::warn!("Undo history busy; transaction not recorded");
                return;
            }
        };

        match recorded {
            None => {}
            Some(Recorded::Added { stack, mut item }) => {
                tracing::debug!(seq = item.seq, ?stack, origin = %record.origin, "Stack item added");
                emit(
                    events,
                    &mut HistoryEvent::ItemAdded {
                        item: &mut item,
                        changed_parent_types: &record.changed_parent_types,
                        stack,
                    },
                );
                state.borrow_mut().push(stack, item);
            }
            Some(Recorded::Updated { mut item }) => {
                tracing::trace!(seq = item.seq, "Stack item updated");
                emit(
                    events,
                    &mut HistoryEvent::ItemUpdated {
                        item: &mut item,
                        changed_parent_types: &record.changed_parent_types,
                    },
                );
                state.borrow_mut().push(StackKind::Undo, item);
            }
        }
    }

    /// Pops the newest item of `from` and reverts it.
    ///
    /// Items whose changes were already cancelled by other edits are
    /// dropped and the next one is tried.
    fn pop(&self, from: StackKind) -> Option<StackItem> {
        loop {
            let item = {
                let mut state = self.state.borrow_mut();
                let item = state.stack_mut(from).pop()?;
                state.replaying = Some(from.opposite());
                state.last_change = None;
                item
            };

            let applied = match self.doc.try_borrow_mut() {
                Ok(mut doc) => doc.transact(Origin::History, |txn| {
                    txn.revert(&item.operations);
                    Ok(txn.has_changes())
                }),
                Err(_) => Err(anyhow!("document is already borrowed")),
            };
            self.state.borrow_mut().replaying = None;

            match applied {
                Ok(true) => {
                    tracing::debug!(seq = item.seq, stack = ?from, "Stack item popped");
                    emit(
                        &self.events,
                        &mut HistoryEvent::ItemPopped {
                            item: &item,
                            stack: from,
                        },
                    );
                    return Some(item);
                }
                Ok(false) => {
                    tracing::debug!(seq = item.seq, "Dropping stack item with nothing left to revert");
                }
                Err(e) => {
                    tracing::warn!("Failed to revert stack item: {e:#}");
                    self.state.borrow_mut().stack_mut(from).push(item);
                    return None;
                }
            }
        }
    }

    /// Undoes the most recent step.
    pub fn undo(&self) -> Option<StackItem> {
        self.pop(StackKind::Undo)
    }

    /// Redoes the most recently undone step.
    pub fn redo(&self) -> Option<StackItem> {
        self.pop(StackKind::Redo)
    }

    pub fn can_undo(&self) -> bool {
        !self.state.borrow().undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.state.borrow().redo_stack.is_empty()
    }

    /// Forces a group break so the next change starts a new undo step.
    pub fn stop_capturing(&self) {
        self.state.borrow_mut().last_change = None;
    }

    /// Drops both stacks.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.undo_stack.clear();
        state.redo_stack.clear();
        state.last_change = None;
    }

    /// Gives read access to one stack, oldest item first.
    pub fn inspect<R>(&self, stack: StackKind, f: impl FnOnce(&[StackItem]) -> R) -> R {
        let state = self.state.borrow();
        match stack {
            StackKind::Undo => f(&state.undo_stack),
            StackKind::Redo => f(&state.redo_stack),
        }
    }

    pub fn scope(&self) -> HashSet<ContainerId> {
        self.state.borrow().scope.clone()
    }

    pub fn doc(&self) -> &SharedDoc {
        &self.doc
    }
}

impl HistoryEngine for UndoManager {
    fn undo(&self) -> Option<StackItem> {
        UndoManager::undo(self)
    }

    fn redo(&self) -> Option<StackItem> {
        UndoManager::redo(self)
    }

    fn on(
        &self,
        kind: HistoryEventKind,
        handler: Box<dyn FnMut(&mut HistoryEvent<'_>)>,
    ) -> SubscriptionId {
        self.events.borrow_mut().table_mut(kind).add(handler)
    }

    fn off(&self, id: SubscriptionId) -> bool {
        self.events.borrow_mut().remove(id)
    }

    fn add_tracked_origin(&self, origin: Origin) {
        self.state.borrow_mut().tracked_origins.insert(origin);
    }

    fn remove_tracked_origin(&self, origin: &Origin) -> bool {
        self.state.borrow_mut().tracked_origins.remove(origin)
    }

    fn is_tracked_origin(&self, origin: &Origin) -> bool {
        self.state.borrow().tracked_origins.contains(origin)
    }

    fn undo_depth(&self) -> usize {
        self.state.borrow().undo_stack.len()
    }

    fn redo_depth(&self) -> usize {
        self.state.borrow().redo_stack.len()
    }

    fn register_slot(&self, name: &str) -> MetaSlot {
        let mut state = self.state.borrow_mut();
        state.next_slot += 1;
        MetaSlot::new(state.next_slot, name)
    }
}

impl Drop for UndoManager {
    fn drop(&mut self) {
        if let Ok(mut doc) = self.doc.try_borrow_mut() {
            doc.unobserve_transactions(self.doc_subscription);
        }
    }
}
