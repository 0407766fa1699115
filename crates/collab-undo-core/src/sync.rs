/// Binding between an editor and one text container of a shared document.
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use collab_undo_history::{ContainerId, SharedDoc, TextDoc};

use crate::codec::{PortableRange, SelectionCodec};
use crate::selection::SelectionRange;
use crate::view::Annotation;

/// Counter for sync binding ids, unique within the process.
static SYNC_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one sync binding. Views tag the updates they derive from
/// document changes with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncId(u64);

impl SyncId {
    fn next() -> Self {
        Self(SYNC_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sync-{}", self.0)
    }
}

/// Ties an editor to a container of a shared document and converts
/// selections between the two coordinate systems.
pub struct SyncBinding {
    id: SyncId,
    doc: SharedDoc,
    container: ContainerId,
}

impl fmt::Debug for SyncBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBinding")
            .field("id", &self.id)
            .field("container", &self.container)
            .finish()
    }
}

impl SyncBinding {
    pub fn new(doc: SharedDoc, container: ContainerId) -> Self {
        Self {
            id: SyncId::next(),
            doc,
            container,
        }
    }

    pub fn id(&self) -> SyncId {
        self.id
    }

    /// Annotation carried by view updates that mirror document changes.
    pub fn annotation(&self) -> Annotation {
        Annotation::Sync(self.id)
    }

    pub fn doc(&self) -> &SharedDoc {
        &self.doc
    }

    pub fn container(&self) -> &ContainerId {
        &self.container
    }

    /// Encodes `selection` against an already borrowed document.
    pub fn portable_in(&self, doc: &TextDoc, selection: SelectionRange) -> Option<PortableRange> {
        Some(PortableRange {
            anchor: doc.sticky_index(&self.container, selection.anchor)?,
            head: doc.sticky_index(&self.container, selection.head)?,
        })
    }

    /// Decodes `range` against an already borrowed document.
    pub fn resolve_in(&self, doc: &TextDoc, range: &PortableRange) -> Option<SelectionRange> {
        if range.anchor.container != self.container || range.head.container != self.container {
            return None;
        }
        Some(SelectionRange::new(
            doc.resolve_sticky(&range.anchor)?,
            doc.resolve_sticky(&range.head)?,
        ))
    }
}

impl SelectionCodec for SyncBinding {
    fn to_portable(&self, selection: SelectionRange) -> Option<PortableRange> {
        let Ok(doc) = self.doc.try_borrow() else {
            tracing::warn!(binding = %self.id, "Document busy; selection not encoded");
            return None;
        };
        self.portable_in(&doc, selection)
    }

    fn from_portable(&self, range: &PortableRange) -> Option<SelectionRange> {
        let Ok(doc) = self.doc.try_borrow() else {
            tracing::warn!(binding = %self.id, "Document busy; selection not decoded");
            return None;
        };
        self.resolve_in(&doc, range)
    }
}
