/// Reference editor view over one container of a shared document.
///
/// `TextView` keeps a rope mirror of the container text and a single
/// selection range. Local edits are written to the document under
/// `Origin::Untagged`. Changes made by anyone else (remote replicas, undo
/// replay) arrive through the document observer; the selection is mapped
/// through them with sticky positions and the plugins see an update
/// annotated with the binding's sync annotation.
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use anyhow::{anyhow, Context, Result};
use collab_undo_history::{Origin, SubscriptionId, TextDoc, TransactionRecord};
use ropey::Rope;

use crate::codec::{PortableRange, SelectionCodec};
use crate::selection::{char_to_pos, Position, SelectionRange};
use crate::sync::SyncBinding;
use crate::view::{EditorView, TransactionSpec, ViewPlugin, ViewTransaction, ViewUpdate};

/// A replace the view is writing to the document itself.
struct LocalEdit {
    from: usize,
    len: usize,
    text: String,
}

impl LocalEdit {
    /// Applies the edit to the mirror in place.
    fn apply(&self, rope: &mut Rope) -> Result<()> {
        let end = self.from.saturating_add(self.len);
        if end > rope.len_chars() {
            anyhow::bail!(
                "range end {} out of bounds (mirror has {} chars)",
                end,
                rope.len_chars()
            );
        }
        rope.remove(self.from..end);
        rope.insert(self.from, &self.text);
        Ok(())
    }
}

struct ViewState {
    rope: Rope,
    selection: SelectionRange,
    /// Sticky copy of `selection`, used to map it through foreign changes.
    portable: Option<PortableRange>,
}

/// A single-selection text editor bound to a document container.
pub struct TextView {
    binding: Rc<SyncBinding>,
    state: RefCell<ViewState>,
    plugins: RefCell<Vec<Box<dyn ViewPlugin>>>,
    self_ref: Weak<TextView>,
    doc_subscription: Cell<Option<SubscriptionId>>,
    /// Set while the view writes its own edit to the document.
    local_edit: RefCell<Option<LocalEdit>>,
    destroyed: Cell<bool>,
}

impl std::fmt::Debug for TextView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextView")
            .field("binding", &self.binding)
            .field("selection", &self.selection())
            .field("plugins", &self.plugin_count())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

impl TextView {
    /// Creates a view showing the binding's container and starts mirroring
    /// document changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is currently borrowed.
    pub fn new(binding: Rc<SyncBinding>) -> Result<Rc<Self>> {
        let text = binding
            .doc()
            .try_borrow()
            .map_err(|_| anyhow!("Cannot open a view while the document is in use"))?
            .text(binding.container());

        let view = Rc::new_cyclic(|weak| Self {
            binding,
            state: RefCell::new(ViewState {
                rope: Rope::from_str(&text),
                selection: SelectionRange::default(),
                portable: None,
            }),
            plugins: RefCell::new(Vec::new()),
            self_ref: weak.clone(),
            doc_subscription: Cell::new(None),
            local_edit: RefCell::new(None),
            destroyed: Cell::new(false),
        });
        view.set_selection(SelectionRange::default());

        let weak = Rc::downgrade(&view);
        let id = view
            .binding
            .doc()
            .try_borrow_mut()
            .map_err(|_| anyhow!("Cannot open a view while the document is in use"))?
            .observe_transactions(move |doc, record| {
                if let Some(view) = weak.upgrade() {
                    view.on_doc_transaction(doc, record);
                }
            });
        view.doc_subscription.set(Some(id));
        Ok(view)
    }

    /// Registers a plugin built by `factory`. Plugins run in registration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error when called from inside an update cycle.
    pub fn add_plugin<P: ViewPlugin + 'static>(
        &self,
        factory: impl FnOnce(Weak<dyn EditorView>) -> P,
    ) -> Result<()> {
        let view: Weak<dyn EditorView> = self.self_ref.clone();
        let plugin = factory(view);
        self.plugins
            .try_borrow_mut()
            .map_err(|_| anyhow!("Cannot add a plugin during an update cycle"))?
            .push(Box::new(plugin));
        Ok(())
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.try_borrow().map_or(0, |plugins| plugins.len())
    }

    pub fn binding(&self) -> &Rc<SyncBinding> {
        &self.binding
    }

    /// Returns the mirrored text.
    pub fn text(&self) -> String {
        self.state
            .try_borrow()
            .map(|state| state.rope.to_string())
            .unwrap_or_default()
    }

    pub fn len_chars(&self) -> usize {
        self.state
            .try_borrow()
            .map_or(0, |state| state.rope.len_chars())
    }

    /// Line and column of char `offset`.
    pub fn line_col(&self, offset: usize) -> Position {
        self.state
            .try_borrow()
            .map(|state| char_to_pos(&state.rope, offset))
            .unwrap_or_default()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Moves the selection as a user would.
    pub fn select(&self, selection: SelectionRange) {
        self.set_selection(selection);
        self.run_plugins(&ViewUpdate {
            selection_set: true,
            doc_changed: false,
            transactions: vec![ViewTransaction::default()],
        });
    }

    /// Replaces the selection with `text` and puts the cursor after it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document rejects the edit.
    pub fn insert(&self, text: &str) -> Result<()> {
        let selection = self.selection();
        self.replace(selection.from(), selection.len(), text)
    }

    /// Deletes the selection, or the char before the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the document rejects the edit.
    pub fn delete_backward(&self) -> Result<()> {
        let selection = self.selection();
        if !selection.is_empty() {
            return self.replace(selection.from(), selection.len(), "");
        }
        if selection.head == 0 {
            return Ok(());
        }
        self.replace(selection.head - 1, 1, "")
    }

    fn replace(&self, from: usize, len: usize, text: &str) -> Result<()> {
        let container = self.binding.container().clone();
        self.local_edit.replace(Some(LocalEdit {
            from,
            len,
            text: text.to_string(),
        }));
        let result = match self.binding.doc().try_borrow_mut() {
            Ok(mut doc) => doc.transact(Origin::Untagged, |txn| {
                txn.delete(&container, from, len)?;
                txn.insert(&container, from, text)
            }),
            Err(_) => Err(anyhow!("document is already borrowed")),
        };
        self.local_edit.replace(None);
        result.with_context(|| format!("Failed to edit '{container}' at {from}"))?;

        self.set_selection(SelectionRange::cursor(from + text.chars().count()));
        self.run_plugins(&ViewUpdate {
            selection_set: true,
            doc_changed: true,
            transactions: vec![ViewTransaction {
                annotation: None,
                doc_changed: true,
            }],
        });
        Ok(())
    }

    fn set_selection(&self, selection: SelectionRange) {
        let selection = selection.clamp(self.len_chars());
        let portable = self.binding.to_portable(selection);
        match self.state.try_borrow_mut() {
            Ok(mut state) => {
                state.selection = selection;
                state.portable = portable;
            }
            Err(_) => tracing::warn!("View state busy; selection change dropped"),
        }
    }

    /// Mirrors a committed document transaction.
    fn on_doc_transaction(&self, doc: &TextDoc, record: &TransactionRecord) {
        let container = self.binding.container();
        if self.destroyed.get() || !record.changed_parent_types.contains(container) {
            return;
        }

        {
            let Ok(mut state) = self.state.try_borrow_mut() else {
                tracing::warn!("View state busy; document change not mirrored");
                return;
            };
            let local = self
                .local_edit
                .try_borrow_mut()
                .ok()
                .and_then(|mut edit| edit.take());
            if let Some(edit) = local {
                // The selection is set by the caller once the write returns
                let applied = edit.apply(&mut state.rope);
                if let Err(e) = &applied {
                    tracing::warn!("Local edit out of step with the mirror: {e:#}");
                }
                if applied.is_err() || state.rope.len_chars() != doc.len(container) {
                    state.rope = Rope::from_str(&doc.text(container));
                }
                return;
            }
            state.rope = Rope::from_str(&doc.text(container));

            let len = state.rope.len_chars();
            let mapped = state
                .portable
                .as_ref()
                .and_then(|range| self.binding.resolve_in(doc, range))
                .unwrap_or(state.selection)
                .clamp(len);
            state.selection = mapped;
            if state.portable.is_none() {
                state.portable = self.binding.portable_in(doc, mapped);
            }
            tracing::trace!(
                origin = %record.origin,
                anchor = mapped.anchor,
                head = mapped.head,
                "Mirrored document change"
            );
        }

        self.run_plugins(&ViewUpdate {
            selection_set: true,
            doc_changed: true,
            transactions: vec![ViewTransaction {
                annotation: Some(self.binding.annotation()),
                doc_changed: true,
            }],
        });
    }

    fn run_plugins(&self, update: &ViewUpdate) {
        if self.destroyed.get() {
            return;
        }
        let Ok(mut plugins) = self.plugins.try_borrow_mut() else {
            tracing::warn!("View update dispatched from inside a plugin; plugins skipped");
            return;
        };
        for plugin in plugins.iter_mut() {
            plugin.update(update);
        }
    }

    /// Tears down plugins and stops mirroring the document. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        match self.plugins.try_borrow_mut() {
            Ok(mut plugins) => {
                for plugin in plugins.iter_mut() {
                    plugin.destroy();
                }
                plugins.clear();
            }
            Err(_) => tracing::warn!("View destroyed during an update; plugins not torn down"),
        }
        if let Some(id) = self.doc_subscription.take() {
            match self.binding.doc().try_borrow_mut() {
                Ok(mut doc) => {
                    doc.unobserve_transactions(id);
                }
                Err(_) => tracing::warn!("Document busy; view observer left registered"),
            }
        }
        tracing::debug!(binding = %self.binding.id(), "View destroyed");
    }
}

impl EditorView for TextView {
    fn selection(&self) -> SelectionRange {
        match self.state.try_borrow() {
            Ok(state) => state.selection,
            Err(_) => {
                tracing::warn!("View state busy; reporting an empty selection");
                SelectionRange::default()
            }
        }
    }

    fn dispatch(&self, spec: TransactionSpec) {
        if let Some(selection) = spec.selection {
            self.set_selection(selection);
        }
        self.run_plugins(&ViewUpdate {
            selection_set: spec.selection.is_some(),
            doc_changed: false,
            transactions: vec![ViewTransaction {
                annotation: spec.annotation,
                doc_changed: false,
            }],
        });
    }
}

impl Drop for TextView {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Annotation;
    use collab_undo_history::{ClientId, ContainerId};

    fn body() -> ContainerId {
        ContainerId::from("body")
    }

    fn new_view() -> Rc<TextView> {
        let doc = TextDoc::with_client(ClientId::new(1)).into_shared();
        TextView::new(Rc::new(SyncBinding::new(doc, body()))).unwrap()
    }

    fn remote_insert(view: &TextView, offset: usize, text: &str) {
        view.binding()
            .doc()
            .borrow_mut()
            .transact_as(ClientId::new(2), Origin::tag("remote"), |txn| {
                txn.insert(&body(), offset, text)
            })
            .unwrap();
    }

    /// Records every update it sees into a shared log.
    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<(&'static str, ViewUpdate)>>>,
        destroyed: Rc<Cell<bool>>,
    }

    impl ViewPlugin for Recorder {
        fn update(&mut self, update: &ViewUpdate) {
            self.log.borrow_mut().push((self.name, update.clone()));
        }

        fn destroy(&mut self) {
            self.destroyed.set(true);
        }
    }

    type Log = Rc<RefCell<Vec<(&'static str, ViewUpdate)>>>;

    fn add_recorder(view: &TextView, name: &'static str, log: &Log) -> Rc<Cell<bool>> {
        let destroyed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&destroyed);
        let log = Rc::clone(log);
        view.add_plugin(move |_| Recorder {
            name,
            log,
            destroyed: flag,
        })
        .unwrap();
        destroyed
    }

    #[test]
    fn test_opens_existing_text() {
        let doc = TextDoc::new().into_shared();
        doc.borrow_mut()
            .transact(Origin::Untagged, |txn| txn.insert(&body(), 0, "abc"))
            .unwrap();
        let view = TextView::new(Rc::new(SyncBinding::new(doc, body()))).unwrap();
        assert_eq!(view.text(), "abc");
        assert_eq!(view.selection(), SelectionRange::cursor(0));
    }

    #[test]
    fn test_insert_replaces_selection() {
        let view = new_view();
        view.insert("hello world").unwrap();
        assert_eq!(view.selection(), SelectionRange::cursor(11));

        view.select(SelectionRange::new(6, 11));
        view.insert("there").unwrap();
        assert_eq!(view.text(), "hello there");
        assert_eq!(view.selection(), SelectionRange::cursor(11));
        assert_eq!(
            view.binding().doc().borrow().text(&body()),
            "hello there"
        );
    }

    #[test]
    fn test_local_edits_keep_mirror_in_step() {
        let view = new_view();
        view.insert("grüße").unwrap();
        remote_insert(&view, 0, "» ");
        view.select(SelectionRange::new(2, 4));
        view.insert("ü").unwrap();
        view.delete_backward().unwrap();
        view.insert("ab\ncd").unwrap();
        view.select(SelectionRange::new(0, 1));
        view.delete_backward().unwrap();

        let doc_text = view.binding().doc().borrow().text(&body());
        assert_eq!(doc_text, " ab\ncdüße");
        assert_eq!(view.text(), doc_text);
        assert_eq!(view.len_chars(), doc_text.chars().count());
        assert_eq!(view.line_col(5), Position { line: 1, col: 1 });
    }

    #[test]
    fn test_delete_backward() {
        let view = new_view();
        view.insert("abc").unwrap();
        view.delete_backward().unwrap();
        assert_eq!(view.text(), "ab");
        assert_eq!(view.selection(), SelectionRange::cursor(2));

        view.select(SelectionRange::new(0, 2));
        view.delete_backward().unwrap();
        assert_eq!(view.text(), "");
        view.delete_backward().unwrap();
        assert_eq!(view.selection(), SelectionRange::cursor(0));
    }

    #[test]
    fn test_remote_insert_shifts_selection() {
        let view = new_view();
        view.insert("hello world").unwrap();
        view.select(SelectionRange::new(6, 11));

        remote_insert(&view, 0, ">> ");
        assert_eq!(view.text(), ">> hello world");
        assert_eq!(view.selection(), SelectionRange::new(9, 14));
    }

    #[test]
    fn test_remote_change_is_sync_annotated() {
        let view = new_view();
        let log = Rc::new(RefCell::new(Vec::new()));
        add_recorder(&view, "rec", &log);

        view.insert("a").unwrap();
        remote_insert(&view, 0, "b");

        let log = log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].1.transactions[0].annotation, None);
        assert!(log[0].1.doc_changed);
        assert_eq!(
            log[1].1.transactions[0].annotation,
            Some(view.binding().annotation())
        );
        assert!(log[1].1.selection_set);
    }

    #[test]
    fn test_changes_to_other_containers_are_ignored() {
        let view = new_view();
        let log = Rc::new(RefCell::new(Vec::new()));
        add_recorder(&view, "rec", &log);

        view.binding()
            .doc()
            .borrow_mut()
            .transact(Origin::Untagged, |txn| {
                txn.insert(&ContainerId::from("title"), 0, "T")
            })
            .unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(view.text(), "");
    }

    #[test]
    fn test_plugins_run_in_registration_order() {
        let view = new_view();
        let log = Rc::new(RefCell::new(Vec::new()));
        add_recorder(&view, "first", &log);
        add_recorder(&view, "second", &log);

        view.select(SelectionRange::cursor(0));
        let names: Vec<_> = log.borrow().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_dispatch_carries_annotation_and_clamps() {
        let view = new_view();
        view.insert("abc").unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        add_recorder(&view, "rec", &log);

        let tag = Annotation::Tag("restore".to_string());
        view.dispatch(TransactionSpec::selection(SelectionRange::new(1, 10)).annotated(tag.clone()));
        assert_eq!(view.selection(), SelectionRange::new(1, 3));

        let log = log.borrow();
        assert!(log[0].1.selection_set);
        assert!(!log[0].1.doc_changed);
        assert_eq!(log[0].1.transactions[0].annotation, Some(tag));
    }

    #[test]
    fn test_line_col() {
        let view = new_view();
        view.insert("one\ntwo").unwrap();
        assert_eq!(view.line_col(5), Position::new(1, 1));
    }

    #[test]
    fn test_destroy_tears_down_plugins_and_observer() {
        let view = new_view();
        let log = Rc::new(RefCell::new(Vec::new()));
        let destroyed = add_recorder(&view, "rec", &log);
        assert_eq!(view.binding().doc().borrow().observer_count(), 1);

        view.destroy();
        view.destroy();
        assert!(destroyed.get());
        assert!(view.is_destroyed());
        assert_eq!(view.plugin_count(), 0);
        assert_eq!(view.binding().doc().borrow().observer_count(), 0);

        remote_insert(&view, 0, "x");
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_drop_detaches_observer() {
        let doc = TextDoc::new().into_shared();
        let view = TextView::new(Rc::new(SyncBinding::new(Rc::clone(&doc), body()))).unwrap();
        drop(view);
        assert_eq!(doc.borrow().observer_count(), 0);
    }
}
