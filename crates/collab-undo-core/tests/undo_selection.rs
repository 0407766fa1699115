// Integration tests for selection-preserving undo.
//
// These tests drive a TextView with the undo plugin installed, the way an
// application would, and check where the selection lands after undo and
// redo, including when remote replicas edit the same container.

use std::rc::{Rc, Weak};

use collab_undo_config::UndoSettings;
use collab_undo_core::history::{
    ClientId, ContainerId, HistoryConfig, HistoryEngine, Origin, SharedDoc, StackKind, TextDoc,
    UndoManager,
};
use collab_undo_core::{
    bind_editor, commands, Annotation, CollabEditor, EditorView, Platform, SelectionRange,
    SyncBinding, TextView, TransactionSpec, UndoConfig, UndoPlugin,
};

fn body() -> ContainerId {
    ContainerId::from("body")
}

fn settings(capture_timeout_ms: u64) -> UndoSettings {
    UndoSettings {
        capture_timeout_ms,
        ..UndoSettings::default()
    }
}

fn editor(capture_timeout_ms: u64) -> (SharedDoc, CollabEditor) {
    let doc = TextDoc::with_client(ClientId::new(1)).into_shared();
    let editor = bind_editor(Rc::clone(&doc), body(), &settings(capture_timeout_ms)).unwrap();
    (doc, editor)
}

fn remote_insert(doc: &SharedDoc, offset: usize, text: &str) {
    doc.borrow_mut()
        .transact_as(ClientId::new(2), Origin::tag("remote"), |txn| {
            txn.insert(&body(), offset, text)
        })
        .unwrap();
}

// ── Restore Round-Trip ─────────────────────────────────────────────────

#[test]
fn test_undo_restores_selection_before_edit() {
    let (_doc, editor) = editor(0);
    let view = &editor.view;
    view.insert("hello world").unwrap();

    view.select(SelectionRange::new(1, 4));
    view.insert("X").unwrap();
    assert_eq!(view.text(), "hXo world");
    assert_eq!(view.selection(), SelectionRange::cursor(2));

    assert!(editor.config.undo());
    assert_eq!(view.text(), "hello world");
    assert_eq!(view.selection(), SelectionRange::new(1, 4));
}

#[test]
fn test_redo_restores_selection_after_edit() {
    let (_doc, editor) = editor(0);
    let view = &editor.view;
    view.insert("hello world").unwrap();
    view.select(SelectionRange::new(1, 4));
    view.insert("X").unwrap();

    editor.config.undo();
    assert!(editor.config.redo());
    assert_eq!(view.text(), "hXo world");
    assert_eq!(view.selection(), SelectionRange::cursor(2));

    // The step is armed again with the pre-edit selection
    editor.config.undo();
    assert_eq!(view.selection(), SelectionRange::new(1, 4));
}

#[test]
fn test_first_edit_of_session_is_restored() {
    let (_doc, editor) = editor(0);
    editor.view.insert("abc").unwrap();
    editor.config.undo();
    assert_eq!(editor.view.text(), "");
    assert_eq!(editor.view.selection(), SelectionRange::cursor(0));
}

#[test]
fn test_undo_redo_walk_through_several_steps() {
    let (_doc, editor) = editor(0);
    let view = &editor.view;
    view.insert("one").unwrap();
    view.insert(" two").unwrap();
    view.select(SelectionRange::new(0, 3));
    view.insert("1").unwrap();
    assert_eq!(view.text(), "1 two");

    editor.config.undo();
    assert_eq!(view.text(), "one two");
    assert_eq!(view.selection(), SelectionRange::new(0, 3));

    editor.config.undo();
    assert_eq!(view.text(), "one");
    assert_eq!(view.selection(), SelectionRange::cursor(3));

    // Redo puts back the selection the user had when undoing
    editor.config.redo();
    assert_eq!(view.text(), "one two");
    assert_eq!(view.selection(), SelectionRange::new(0, 3));
}

// ── Stamp Once ─────────────────────────────────────────────────────────

#[test]
fn test_grouped_edits_keep_first_selection() {
    let (_doc, editor) = editor(60_000);
    let view = &editor.view;
    view.insert("a").unwrap();
    view.insert("b").unwrap();
    view.insert("c").unwrap();
    assert_eq!(editor.undo_depth(), 1);

    editor.config.undo();
    assert_eq!(view.text(), "");
    assert_eq!(view.selection(), SelectionRange::cursor(0));
}

#[test]
fn test_selection_moves_inside_a_group_are_not_stamped() {
    let (doc, editor) = editor(60_000);
    let view = &editor.view;
    remote_insert(&doc, 0, "0123456789");

    view.select(SelectionRange::cursor(2));
    view.insert("a").unwrap();
    view.select(SelectionRange::cursor(8));
    view.insert("b").unwrap();
    assert_eq!(view.text(), "01a23456b789");
    assert_eq!(editor.undo_depth(), 1);

    editor.config.undo();
    assert_eq!(view.text(), "0123456789");
    assert_eq!(view.selection(), SelectionRange::cursor(2));
}

// ── Relevance ──────────────────────────────────────────────────────────

#[test]
fn test_items_for_other_containers_are_not_stamped() {
    let title = ContainerId::from("title");
    let doc = TextDoc::new().into_shared();
    let sync = Rc::new(SyncBinding::new(Rc::clone(&doc), body()));
    let history = Rc::new(
        UndoManager::new(
            Rc::clone(&doc),
            [body(), title.clone()],
            HistoryConfig {
                capture_timeout_ms: 0,
                ..HistoryConfig::default()
            },
        )
        .unwrap(),
    );
    let config = UndoConfig::new(Rc::clone(&history) as Rc<dyn HistoryEngine>);
    let view = TextView::new(Rc::clone(&sync)).unwrap();
    view.add_plugin(|view| UndoPlugin::new(view, &config, &sync))
        .unwrap();

    doc.borrow_mut()
        .transact(Origin::Untagged, |txn| txn.insert(&title, 0, "Title"))
        .unwrap();
    view.insert("body text").unwrap();

    let stamped: Vec<bool> = history.inspect(StackKind::Undo, |items| {
        items.iter().map(|item| !item.meta.is_empty()).collect()
    });
    assert_eq!(stamped, vec![false, true]);
}

#[test]
fn test_edits_after_teardown_are_not_stamped() {
    let (doc, editor) = editor(0);
    editor.view.insert("abc").unwrap();
    editor.view.select(SelectionRange::cursor(1));

    editor.view.destroy();
    doc.borrow_mut()
        .transact(Origin::Untagged, |txn| txn.insert(&body(), 3, "def"))
        .unwrap();

    let stamped = editor
        .history
        .inspect(StackKind::Undo, |items| items.last().map(|item| item.meta.len()));
    assert_eq!(stamped, Some(0));
}

// ── Sync Filtering ─────────────────────────────────────────────────────

#[test]
fn test_sync_annotated_selection_is_not_captured() {
    let (_doc, editor) = editor(0);
    let view = &editor.view;
    view.insert("hello world").unwrap();
    view.select(SelectionRange::cursor(5));

    // The sync layer moves the selection; that is not the user's intent
    view.dispatch(
        TransactionSpec::selection(SelectionRange::cursor(0)).annotated(view.binding().annotation()),
    );
    view.insert("!").unwrap();

    editor.config.undo();
    assert_eq!(view.text(), "hello world");
    assert_eq!(view.selection(), SelectionRange::cursor(5));
}

#[test]
fn test_foreign_annotated_selection_is_captured() {
    let (_doc, editor) = editor(0);
    let view = &editor.view;
    view.insert("hello world").unwrap();
    view.select(SelectionRange::cursor(5));

    view.dispatch(
        TransactionSpec::selection(SelectionRange::new(0, 5))
            .annotated(Annotation::Tag("find-next".to_string())),
    );
    view.insert("bye").unwrap();
    assert_eq!(view.text(), "bye world");

    editor.config.undo();
    assert_eq!(view.selection(), SelectionRange::new(0, 5));
}

#[test]
fn test_remote_edits_do_not_move_the_anchor() {
    let (doc, editor) = editor(0);
    let view = &editor.view;
    view.insert("hello world").unwrap();
    view.select(SelectionRange::new(6, 11));
    view.insert("there").unwrap();

    remote_insert(&doc, 0, ">> ");
    assert_eq!(view.text(), ">> hello there");

    editor.config.undo();
    assert_eq!(view.text(), ">> hello world");
    // The restored selection follows the text it was anchored to
    assert_eq!(view.selection(), SelectionRange::new(9, 14));
}

#[test]
fn test_remote_edit_between_capture_and_edit() {
    let (doc, editor) = editor(0);
    let view = &editor.view;
    view.insert("abc").unwrap();
    view.select(SelectionRange::cursor(1));

    remote_insert(&doc, 0, "xyz");
    assert_eq!(view.selection(), SelectionRange::cursor(4));

    view.insert("-").unwrap();
    assert_eq!(view.text(), "xyza-bc");
    editor.config.undo();
    assert_eq!(view.text(), "xyzabc");
    assert_eq!(view.selection(), SelectionRange::cursor(4));
}

#[test]
fn test_remote_changes_are_not_undoable_locally() {
    let (doc, editor) = editor(0);
    remote_insert(&doc, 0, "remote");
    assert_eq!(editor.undo_depth(), 0);
    assert!(!editor.config.undo());
    assert_eq!(editor.view.text(), "remote");
}

// ── Depth Accessors ────────────────────────────────────────────────────

#[test]
fn test_depths_after_edits_and_undos() {
    let (_doc, editor) = editor(0);
    for ch in ["a", "b", "c", "d"] {
        editor.view.insert(ch).unwrap();
    }
    for _ in 0..3 {
        commands::undo(&editor.config);
    }
    assert_eq!(commands::undo_depth(&editor.config), 1);
    assert_eq!(commands::redo_depth(&editor.config), 3);
    assert_eq!(editor.view.text(), "a");
}

#[test]
fn test_keyboard_undo_redo() {
    let (_doc, editor) = editor(0);
    editor.view.insert("typed").unwrap();

    let (undo_key, redo_key) = match Platform::current() {
        Platform::Mac => ("Cmd-z", "Cmd-Shift-z"),
        Platform::Other => ("Ctrl-z", "Ctrl-y"),
    };
    assert!(editor.handle_key(undo_key).prevent_default);
    assert_eq!(editor.view.text(), "");
    assert!(editor.handle_key(redo_key).handled);
    assert_eq!(editor.view.text(), "typed");
    assert_eq!(editor.view.selection(), SelectionRange::cursor(5));
}

// ── Teardown ───────────────────────────────────────────────────────────

#[test]
fn test_destroyed_view_gets_no_more_restores() {
    let (_doc, editor) = editor(0);
    let view = &editor.view;
    view.insert("hello").unwrap();
    view.select(SelectionRange::cursor(2));
    view.insert("X").unwrap();

    view.destroy();
    assert!(editor.config.undo());
    // The document was reverted but nothing was dispatched to the view
    assert_eq!(view.selection(), SelectionRange::cursor(3));
}

#[test]
fn test_rebuilt_view_does_not_double_stamp() {
    let (doc, editor) = editor(0);
    editor.view.destroy();

    let sync = Rc::new(SyncBinding::new(Rc::clone(&doc), body()));
    let view = TextView::new(Rc::clone(&sync)).unwrap();
    view.add_plugin(|view| UndoPlugin::new(view, &editor.config, &sync))
        .unwrap();
    view.insert("fresh").unwrap();

    let slots = editor
        .history
        .inspect(StackKind::Undo, |items| items[0].meta.len());
    assert_eq!(slots, 1);
}

#[test]
fn test_dropped_plugin_view_is_harmless() {
    let (_doc, editor) = editor(0);
    editor.view.insert("abc").unwrap();

    // A session bound to a view that no longer exists
    let orphan: Weak<dyn EditorView> = {
        let doc = TextDoc::new().into_shared();
        let view = TextView::new(Rc::new(SyncBinding::new(doc, body()))).unwrap();
        Rc::downgrade(&view) as Weak<dyn EditorView>
    };
    let plugin = UndoPlugin::new(orphan, &editor.config, editor.view.binding());
    assert!(plugin.session().pending_selection().is_none());

    assert!(editor.config.undo());
    assert_eq!(editor.view.text(), "");
}
