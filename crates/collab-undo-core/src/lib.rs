/// Selection-preserving undo for collaboratively edited text.
///
/// An `UndoSession` stamps the user's selection onto each undo step when
/// the history creates it and restores that selection when the step is
/// undone or redone. `UndoPlugin` drives the session from an editor
/// view's update cycle, and `bind_editor` wires a `TextView`, its
/// `SyncBinding`, and an `UndoManager` together.
pub mod codec;
pub mod commands;
pub mod editor;
pub mod history;
pub mod keymap;
pub mod plugin;
pub mod selection;
pub mod session;
pub mod setup;
pub mod sync;
pub mod view;

pub use codec::{PortableRange, SelectionCodec};
pub use commands::UndoConfig;
pub use editor::TextView;
pub use keymap::{Chord, KeyBinding, KeyOutcome, Keymap, Platform};
pub use plugin::UndoPlugin;
pub use selection::{Position, SelectionRange};
pub use session::UndoSession;
pub use setup::{bind_editor, CollabEditor};
pub use sync::{SyncBinding, SyncId};
pub use view::{Annotation, EditorView, TransactionSpec, ViewPlugin, ViewTransaction, ViewUpdate};
