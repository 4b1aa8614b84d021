//! Keyboard shortcuts of the editor.

use layers_core::storage::Storage;
use layers_core::{EditorSession, StoreError};

/// Editor command bound to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Undo,
    Redo,
    SelectAll,
    DeleteSelection,
    ClearSelection,
    Cancel,
}

impl Command {
    /// Run the command. Returns whether anything changed.
    pub fn apply<S: Storage>(self, session: &mut EditorSession<S>) -> Result<bool, StoreError> {
        match self {
            Command::Undo => session.undo(),
            Command::Redo => session.redo(),
            Command::SelectAll => session.select_all().map(|()| true),
            Command::DeleteSelection => session.delete_selected().map(|n| n > 0),
            Command::ClearSelection => session.clear_selection().map(|()| true),
            Command::Cancel => {
                if session.cancel_gesture()? {
                    Ok(true)
                } else {
                    session.clear_selection().map(|()| true)
                }
            }
        }
    }
}

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub ctrl: bool,
    pub shift: bool,
    pub command: Command,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(
        key: &'static str,
        ctrl: bool,
        shift: bool,
        command: Command,
        description: &'static str,
    ) -> Self {
        Self {
            key,
            ctrl,
            shift,
            command,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl+Z").
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(self.key);
        parts.join("+")
    }
}

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Get all registered shortcuts.
    pub fn all() -> Vec<Shortcut> {
        vec![
            Shortcut::new("Z", true, false, Command::Undo, "Undo"),
            Shortcut::new("Z", true, true, Command::Redo, "Redo"),
            Shortcut::new("Y", true, false, Command::Redo, "Redo"),
            Shortcut::new("A", true, false, Command::SelectAll, "Select all layers"),
            Shortcut::new("D", true, true, Command::ClearSelection, "Deselect"),
            Shortcut::new("Delete", false, false, Command::DeleteSelection, "Delete selected layers"),
            Shortcut::new("Backspace", false, false, Command::DeleteSelection, "Delete selected layers"),
            Shortcut::new("Escape", false, false, Command::Cancel, "Cancel drag or deselect"),
        ]
    }

    /// Command for a key press. `key` is a DOM `KeyboardEvent.key` value;
    /// letters match case-insensitively.
    pub fn lookup(key: &str, ctrl: bool, shift: bool) -> Option<Command> {
        Self::all()
            .into_iter()
            .find(|s| s.key.eq_ignore_ascii_case(key) && s.ctrl == ctrl && s.shift == shift)
            .map(|s| s.command)
    }

    /// Print all shortcuts to the console.
    pub fn print_all() {
        println!("\n=== Keyboard Shortcuts ===");
        for shortcut in Self::all() {
            println!("  {:20} {}", shortcut.format(), shortcut.description);
        }
        println!("  {:20} {}", "Shift+Drag", "Keep aspect ratio / snap rotation");
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layers_core::storage::MemoryStorage;
    use layers_core::{DraftConfig, Host};
    use serde_json::json;

    fn session() -> EditorSession<MemoryStorage> {
        let mut session = EditorSession::new("File:Test.png", None, Host::new(), DraftConfig::default());
        session
            .load_layers(
                vec![
                    json!({ "id": "a", "type": "rectangle", "x": 0, "y": 0, "width": 10, "height": 10 }),
                    json!({ "id": "b", "type": "text", "x": 50, "y": 50, "locked": true }),
                ],
                "default",
            )
            .unwrap();
        session
    }

    #[test]
    fn test_lookup() {
        assert_eq!(ShortcutRegistry::lookup("z", true, false), Some(Command::Undo));
        assert_eq!(ShortcutRegistry::lookup("Z", true, true), Some(Command::Redo));
        assert_eq!(ShortcutRegistry::lookup("Delete", false, false), Some(Command::DeleteSelection));
        assert_eq!(ShortcutRegistry::lookup("q", true, false), None);
    }

    #[test]
    fn test_format() {
        let redo = &ShortcutRegistry::all()[1];
        assert_eq!(redo.format(), "Ctrl+Shift+Z");
    }

    #[test]
    fn test_select_all_delete_undo() {
        let mut session = session();
        assert!(Command::SelectAll.apply(&mut session).unwrap());
        // Locked layers are not selectable.
        assert_eq!(session.store().selected_layer_ids().len(), 1);
        assert!(Command::DeleteSelection.apply(&mut session).unwrap());
        assert_eq!(session.store().layers().len(), 1);
        assert!(Command::Undo.apply(&mut session).unwrap());
        assert_eq!(session.store().layers().len(), 2);
        assert!(Command::Redo.apply(&mut session).unwrap());
        assert_eq!(session.store().layers().len(), 1);
    }

    #[test]
    fn test_cancel_without_gesture_deselects() {
        let mut session = session();
        Command::SelectAll.apply(&mut session).unwrap();
        assert!(Command::Cancel.apply(&mut session).unwrap());
        assert!(session.store().selected_layer_ids().is_empty());
        assert!(!Command::DeleteSelection.apply(&mut session).unwrap());
    }
}
