//! Undo/redo of layer edits.

use crate::store::{StateSnapshot, Store, StoreError};

/// Maximum number of undo states to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

/// Bounded undo/redo stacks of state snapshots.
///
/// Push the state *before* a change; undo swaps the current state onto the
/// redo stack and restores the snapshot.
#[derive(Debug, Default)]
pub struct History {
    undo_stack: Vec<StateSnapshot>,
    redo_stack: Vec<StateSnapshot>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pre-change snapshot.
    pub fn push(&mut self, before: StateSnapshot) {
        self.undo_stack.push(before);
        // Clear redo stack when new changes are made
        self.redo_stack.clear();
        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
    }

    /// Record the store's current state before mutating it.
    pub fn push_undo(&mut self, store: &Store) {
        self.push(store.snapshot());
    }

    /// Undo the last change.
    /// Returns true if undo was performed, false if nothing to undo.
    pub fn undo(&mut self, store: &Store) -> Result<bool, StoreError> {
        let Some(snapshot) = self.undo_stack.pop() else {
            return Ok(false);
        };
        let current = store.snapshot();
        if let Err(e) = store.restore(snapshot.clone()) {
            self.undo_stack.push(snapshot);
            return Err(e);
        }
        self.redo_stack.push(current);
        Ok(true)
    }

    /// Redo the last undone change.
    /// Returns true if redo was performed, false if nothing to redo.
    pub fn redo(&mut self, store: &Store) -> Result<bool, StoreError> {
        let Some(snapshot) = self.redo_stack.pop() else {
            return Ok(false);
        };
        let current = store.snapshot();
        if let Err(e) = store.restore(snapshot.clone()) {
            self.redo_stack.push(snapshot);
            return Err(e);
        }
        self.undo_stack.push(current);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Forget everything, e.g. after loading a different layer set.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;

    #[test]
    fn test_undo_redo_layer_edit() {
        let store = Store::new();
        let mut history = History::new();

        history.push_undo(&store);
        store
            .replace_layers(vec![Layer::rectangle(0.0, 0.0, 5.0, 5.0)])
            .unwrap();

        assert!(history.undo(&store).unwrap());
        assert!(store.layers().is_empty());
        assert!(history.can_redo());

        assert!(history.redo(&store).unwrap());
        assert_eq!(store.layers().len(), 1);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_new_change_clears_redo() {
        let store = Store::new();
        let mut history = History::new();
        history.push_undo(&store);
        history.undo(&store).unwrap();
        assert!(history.can_redo());
        history.push_undo(&store);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_history_is_bounded() {
        let store = Store::new();
        let mut history = History::new();
        for _ in 0..MAX_UNDO_HISTORY + 10 {
            history.push_undo(&store);
        }
        assert_eq!(history.undo_len(), MAX_UNDO_HISTORY);
    }

    #[test]
    fn test_empty_history() {
        let store = Store::new();
        let mut history = History::new();
        assert!(!history.undo(&store).unwrap());
        assert!(!history.redo(&store).unwrap());
    }
}
