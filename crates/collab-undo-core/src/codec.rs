/// Conversion between editor selections and document-relative ranges.
use collab_undo_history::StickyIndex;

use crate::selection::SelectionRange;

/// A selection expressed in sticky document positions.
///
/// Unlike offsets, a portable range keeps pointing at the same text while
/// concurrent edits insert or delete around it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortableRange {
    pub anchor: StickyIndex,
    pub head: StickyIndex,
}

/// Encodes editor selections for storage and decodes them back.
///
/// Both directions return `None` when the range cannot be expressed right
/// now, e.g. the offsets are out of range or the anchored text is unknown.
pub trait SelectionCodec {
    fn to_portable(&self, selection: SelectionRange) -> Option<PortableRange>;

    fn from_portable(&self, range: &PortableRange) -> Option<SelectionRange>;
}
