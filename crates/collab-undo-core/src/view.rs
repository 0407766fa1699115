/// The editor contract: selection access, dispatch, and update hooks.
use crate::selection::SelectionRange;
use crate::sync::SyncId;

/// Tag attached to a view transaction describing where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Annotation {
    /// The transaction mirrors document changes through this sync binding.
    Sync(SyncId),
    /// Any other named source.
    Tag(String),
}

/// One transaction that contributed to a view update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewTransaction {
    pub annotation: Option<Annotation>,
    pub doc_changed: bool,
}

impl ViewTransaction {
    pub fn is_annotated(&self, annotation: &Annotation) -> bool {
        self.annotation.as_ref() == Some(annotation)
    }
}

/// What changed in one update cycle, handed to every plugin.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewUpdate {
    pub selection_set: bool,
    pub doc_changed: bool,
    /// Transactions that caused the update, oldest first. Empty for
    /// updates not caused by a transaction.
    pub transactions: Vec<ViewTransaction>,
}

/// A change requested through `EditorView::dispatch`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionSpec {
    pub selection: Option<SelectionRange>,
    pub annotation: Option<Annotation>,
}

impl TransactionSpec {
    /// A plain selection change.
    pub fn selection(selection: SelectionRange) -> Self {
        Self {
            selection: Some(selection),
            annotation: None,
        }
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(annotation);
        self
    }
}

/// An editor view collaborators can read and steer.
pub trait EditorView {
    /// The main selection.
    fn selection(&self) -> SelectionRange;

    /// Applies `spec` and runs the resulting update cycle synchronously.
    fn dispatch(&self, spec: TransactionSpec);
}

/// A per-view extension notified after every update cycle.
///
/// Plugins run in registration order and must not dispatch from `update`.
pub trait ViewPlugin {
    fn update(&mut self, update: &ViewUpdate);

    /// Called once when the view is torn down.
    fn destroy(&mut self) {}
}
