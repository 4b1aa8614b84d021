//! Reactive session state.
//!
//! The [`Store`] is a keyed bag of typed values with per-key subscriptions.
//! It is a cheap `Rc` handle: every component of an editing session holds a
//! clone and all of them observe the same state.
//!
//! Listeners run synchronously, after the internal borrow is released, so a
//! listener may read the store or issue further updates. A multi-key
//! [`Store::update`] assigns every value before the first listener runs.

use crate::layer::Layer;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;

/// Keys of the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateKey {
    Layers,
    SelectedLayerIds,
    CurrentSetName,
    BackgroundVisible,
    BackgroundOpacity,
    IsDirty,
    CurrentTool,
    Zoom,
    PanX,
    PanY,
    ShowGrid,
}

impl StateKey {
    /// Every key, in declaration order.
    pub const ALL: [StateKey; 11] = [
        StateKey::Layers,
        StateKey::SelectedLayerIds,
        StateKey::CurrentSetName,
        StateKey::BackgroundVisible,
        StateKey::BackgroundOpacity,
        StateKey::IsDirty,
        StateKey::CurrentTool,
        StateKey::Zoom,
        StateKey::PanX,
        StateKey::PanY,
        StateKey::ShowGrid,
    ];

    /// Wire name of the key.
    pub fn name(self) -> &'static str {
        match self {
            StateKey::Layers => "layers",
            StateKey::SelectedLayerIds => "selectedLayerIds",
            StateKey::CurrentSetName => "currentSetName",
            StateKey::BackgroundVisible => "backgroundVisible",
            StateKey::BackgroundOpacity => "backgroundOpacity",
            StateKey::IsDirty => "isDirty",
            StateKey::CurrentTool => "currentTool",
            StateKey::Zoom => "zoom",
            StateKey::PanX => "panX",
            StateKey::PanY => "panY",
            StateKey::ShowGrid => "showGrid",
        }
    }

    /// Look a key up by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// The kind of value this key holds.
    pub fn kind(self) -> ValueKind {
        match self {
            StateKey::Layers => ValueKind::Layers,
            StateKey::SelectedLayerIds => ValueKind::Ids,
            StateKey::CurrentSetName | StateKey::CurrentTool => ValueKind::Text,
            StateKey::BackgroundVisible | StateKey::IsDirty | StateKey::ShowGrid => ValueKind::Bool,
            StateKey::BackgroundOpacity | StateKey::Zoom | StateKey::PanX | StateKey::PanY => {
                ValueKind::Number
            }
        }
    }

    /// Empty value returned by [`Store::get`] when the key is absent.
    pub fn empty_value(self) -> StateValue {
        match self.kind() {
            ValueKind::Layers => StateValue::Layers(Vec::new()),
            ValueKind::Ids => StateValue::Ids(BTreeSet::new()),
            ValueKind::Text => StateValue::Text(String::new()),
            ValueKind::Bool => StateValue::Bool(false),
            ValueKind::Number => StateValue::Number(0.0),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Layers,
    Ids,
    Text,
    Bool,
    Number,
}

/// A session state value.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
    Layers(Vec<Layer>),
    Ids(BTreeSet<String>),
    Text(String),
    Bool(bool),
    Number(f64),
}

impl StateValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            StateValue::Layers(_) => ValueKind::Layers,
            StateValue::Ids(_) => ValueKind::Ids,
            StateValue::Text(_) => ValueKind::Text,
            StateValue::Bool(_) => ValueKind::Bool,
            StateValue::Number(_) => ValueKind::Number,
        }
    }

    pub fn as_layers(&self) -> Option<&[Layer]> {
        match self {
            StateValue::Layers(layers) => Some(layers),
            _ => None,
        }
    }

    pub fn as_ids(&self) -> Option<&BTreeSet<String>> {
        match self {
            StateValue::Ids(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            StateValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Store errors.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("Key {key} expects {expected:?}, got {actual:?}")]
    TypeMismatch {
        key: StateKey,
        expected: ValueKind,
        actual: ValueKind,
    },
    #[error("State is borrowed by an in-progress read")]
    Busy,
}

/// Callback invoked with the new value of a key.
pub type Listener = Rc<dyn Fn(&StateValue)>;

struct Inner {
    values: RefCell<HashMap<StateKey, StateValue>>,
    listeners: RefCell<HashMap<StateKey, Vec<(u64, Listener)>>>,
    /// Releases that found the listener map busy.
    deferred_releases: RefCell<Vec<(StateKey, u64)>>,
    next_listener_id: Cell<u64>,
}

impl Inner {
    /// Unregister a listener. If the map is busy, the removal is queued for
    /// the next access.
    fn remove_listener(&self, key: StateKey, id: u64) {
        let Ok(mut listeners) = self.listeners.try_borrow_mut() else {
            log::trace!("Listener map busy, deferring release of {} listener {}", key, id);
            self.deferred_releases.borrow_mut().push((key, id));
            return;
        };
        let removed: Vec<(u64, Listener)> = match listeners.get_mut(&key) {
            Some(list) => {
                let (gone, kept) = std::mem::take(list).into_iter().partition(|(lid, _)| *lid == id);
                *list = kept;
                gone
            }
            None => Vec::new(),
        };
        // Listener closures may own subscriptions; drop them unborrowed.
        drop(listeners);
        drop(removed);
    }

    fn apply_deferred_releases(&self) {
        let pending = std::mem::take(&mut *self.deferred_releases.borrow_mut());
        for (key, id) in pending {
            self.remove_listener(key, id);
        }
    }
}

/// Shared reactive state for one editing session.
#[derive(Clone)]
pub struct Store {
    inner: Rc<Inner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listener_count: usize = self.inner.listeners.borrow().values().map(Vec::len).sum();
        f.debug_struct("Store")
            .field("values", &self.inner.values.borrow().len())
            .field("listeners", &listener_count)
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create a store seeded with the initial session state.
    pub fn new() -> Self {
        let store = Self::empty();
        {
            let mut values = store.inner.values.borrow_mut();
            values.insert(StateKey::Layers, StateValue::Layers(Vec::new()));
            values.insert(StateKey::SelectedLayerIds, StateValue::Ids(BTreeSet::new()));
            values.insert(
                StateKey::CurrentSetName,
                StateValue::Text(crate::draft::DEFAULT_SET_NAME.to_string()),
            );
            values.insert(StateKey::BackgroundVisible, StateValue::Bool(true));
            values.insert(StateKey::BackgroundOpacity, StateValue::Number(1.0));
            values.insert(StateKey::IsDirty, StateValue::Bool(false));
            values.insert(StateKey::CurrentTool, StateValue::Text("pointer".to_string()));
            values.insert(StateKey::Zoom, StateValue::Number(1.0));
            values.insert(StateKey::PanX, StateValue::Number(0.0));
            values.insert(StateKey::PanY, StateValue::Number(0.0));
            values.insert(StateKey::ShowGrid, StateValue::Bool(false));
        }
        store
    }

    /// Create a store with no values at all.
    pub fn empty() -> Self {
        Self {
            inner: Rc::new(Inner {
                values: RefCell::new(HashMap::new()),
                listeners: RefCell::new(HashMap::new()),
                deferred_releases: RefCell::new(Vec::new()),
                next_listener_id: Cell::new(1),
            }),
        }
    }

    /// Current value of `key`, or its empty value if absent.
    pub fn get(&self, key: StateKey) -> StateValue {
        self.inner
            .values
            .borrow()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| key.empty_value())
    }

    /// Whether `key` has been assigned.
    pub fn contains(&self, key: StateKey) -> bool {
        self.inner.values.borrow().contains_key(&key)
    }

    /// Replace one value and notify its listeners.
    pub fn set(&self, key: StateKey, value: StateValue) -> Result<(), StoreError> {
        self.update(vec![(key, value)])
    }

    /// Apply several changes as one unit.
    ///
    /// Every entry is validated before any is assigned; listeners run only
    /// after all values are in place.
    pub fn update(&self, changes: Vec<(StateKey, StateValue)>) -> Result<(), StoreError> {
        for (key, value) in &changes {
            if key.kind() != value.kind() {
                return Err(StoreError::TypeMismatch {
                    key: *key,
                    expected: key.kind(),
                    actual: value.kind(),
                });
            }
        }

        {
            let mut values = self
                .inner
                .values
                .try_borrow_mut()
                .map_err(|_| StoreError::Busy)?;
            for (key, value) in &changes {
                values.insert(*key, value.clone());
            }
        }

        for (key, value) in &changes {
            self.notify(*key, value);
        }
        Ok(())
    }

    fn notify(&self, key: StateKey, value: &StateValue) {
        self.inner.apply_deferred_releases();
        // Snapshot so listeners may subscribe or unsubscribe while running.
        let listeners: Vec<Listener> = match self.inner.listeners.borrow().get(&key) {
            Some(list) => list.iter().map(|(_, l)| Rc::clone(l)).collect(),
            None => return,
        };
        for listener in listeners {
            listener(value);
        }
    }

    /// Register `callback` for changes of `key`.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or explicitly unsubscribed.
    pub fn subscribe(&self, key: StateKey, callback: impl Fn(&StateValue) + 'static) -> Subscription {
        self.inner.apply_deferred_releases();
        let id = self.inner.next_listener_id.get();
        self.inner.next_listener_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .entry(key)
            .or_default()
            .push((id, Rc::new(callback)));
        Subscription {
            inner: Rc::downgrade(&self.inner),
            key,
            id,
        }
    }

    /// Number of listeners registered for `key`.
    pub fn listener_count(&self, key: StateKey) -> usize {
        self.inner.apply_deferred_releases();
        self.inner
            .listeners
            .borrow()
            .get(&key)
            .map_or(0, Vec::len)
    }

    // Typed accessors

    /// Owned copy of the layer list (bottom to top).
    pub fn layers(&self) -> Vec<Layer> {
        self.with_layers(<[Layer]>::to_vec)
    }

    /// Borrow the layer list without cloning it.
    pub fn with_layers<R>(&self, f: impl FnOnce(&[Layer]) -> R) -> R {
        let values = self.inner.values.borrow();
        let layers = values
            .get(&StateKey::Layers)
            .and_then(StateValue::as_layers)
            .unwrap_or(&[]);
        f(layers)
    }

    /// Copy of one layer.
    pub fn layer(&self, id: &str) -> Option<Layer> {
        self.with_layers(|layers| layers.iter().find(|l| l.id == id).cloned())
    }

    pub fn selected_layer_ids(&self) -> BTreeSet<String> {
        match self.get(StateKey::SelectedLayerIds) {
            StateValue::Ids(ids) => ids,
            _ => BTreeSet::new(),
        }
    }

    /// Selected layers in z-order.
    pub fn selected_layers(&self) -> Vec<Layer> {
        let selected = self.selected_layer_ids();
        self.with_layers(|layers| {
            layers
                .iter()
                .filter(|l| selected.contains(&l.id))
                .cloned()
                .collect()
        })
    }

    pub fn set_selection(&self, ids: BTreeSet<String>) -> Result<(), StoreError> {
        self.set(StateKey::SelectedLayerIds, StateValue::Ids(ids))
    }

    pub fn is_dirty(&self) -> bool {
        self.get(StateKey::IsDirty).as_bool().unwrap_or(false)
    }

    pub fn set_dirty(&self, dirty: bool) -> Result<(), StoreError> {
        self.set(StateKey::IsDirty, StateValue::Bool(dirty))
    }

    pub fn mark_dirty(&self) -> Result<(), StoreError> {
        self.set_dirty(true)
    }

    pub fn current_set_name(&self) -> String {
        match self.get(StateKey::CurrentSetName) {
            StateValue::Text(name) => name,
            _ => String::new(),
        }
    }

    /// Replace the whole layer list and mark the session dirty.
    pub fn replace_layers(&self, layers: Vec<Layer>) -> Result<(), StoreError> {
        self.update(vec![
            (StateKey::Layers, StateValue::Layers(layers)),
            (StateKey::IsDirty, StateValue::Bool(true)),
        ])
    }

    /// Swap in new versions of existing layers, matched by id, keeping
    /// their z-order. Layers not present in the list are ignored.
    pub fn apply_layer_changes(&self, changed: &[Layer], mark_dirty: bool) -> Result<(), StoreError> {
        let mut layers = self.layers();
        for layer in layers.iter_mut() {
            if let Some(update) = changed.iter().find(|c| c.id == layer.id) {
                *layer = update.clone();
            }
        }
        let mut changes = vec![(StateKey::Layers, StateValue::Layers(layers))];
        if mark_dirty {
            changes.push((StateKey::IsDirty, StateValue::Bool(true)));
        }
        self.update(changes)
    }

    /// Swap in a new version of one layer. Returns false if no layer has its id.
    pub fn replace_layer(&self, layer: Layer) -> Result<bool, StoreError> {
        if self.layer(&layer.id).is_none() {
            return Ok(false);
        }
        self.apply_layer_changes(std::slice::from_ref(&layer), true)?;
        Ok(true)
    }

    /// Capture the undoable part of the state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            layers: self.layers(),
            selected: self.selected_layer_ids(),
        }
    }

    /// Restore a snapshot as one update, dropping selected ids that no
    /// longer exist.
    pub fn restore(&self, snapshot: StateSnapshot) -> Result<(), StoreError> {
        let selected: BTreeSet<String> = snapshot
            .selected
            .into_iter()
            .filter(|id| snapshot.layers.iter().any(|l| &l.id == id))
            .collect();
        self.update(vec![
            (StateKey::Layers, StateValue::Layers(snapshot.layers)),
            (StateKey::SelectedLayerIds, StateValue::Ids(selected)),
            (StateKey::IsDirty, StateValue::Bool(true)),
        ])
    }
}

/// The undoable part of the session state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub layers: Vec<Layer>,
    pub selected: BTreeSet<String>,
}

/// Handle to a registered listener.
///
/// Dropping the handle unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    inner: Weak<Inner>,
    key: StateKey,
    id: u64,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

impl Subscription {
    /// Key this subscription listens to.
    pub fn key(&self) -> StateKey {
        self.key
    }

    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    fn release(&mut self) {
        let Some(inner) = std::mem::take(&mut self.inner).upgrade() else {
            return;
        };
        inner.remove_listener(self.key, self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Named subscription slots.
///
/// Storing a subscription under a name first releases whatever was stored
/// there, so re-initializing a component cannot leak listeners.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    slots: HashMap<&'static str, Vec<Subscription>>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `subscriptions` under `name`, releasing the previous ones first.
    pub fn replace(&mut self, name: &'static str, subscriptions: Vec<Subscription>) {
        if let Some(previous) = self.slots.remove(name) {
            for sub in previous {
                sub.unsubscribe();
            }
        }
        self.slots.insert(name, subscriptions);
    }

    /// Release the subscriptions stored under `name`.
    pub fn release(&mut self, name: &'static str) {
        if let Some(previous) = self.slots.remove(name) {
            for sub in previous {
                sub.unsubscribe();
            }
        }
    }

    /// Release everything.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;

    fn recorder(store: &Store, key: StateKey) -> (Rc<RefCell<Vec<StateValue>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let sub = store.subscribe(key, move |v| sink.borrow_mut().push(v.clone()));
        (seen, sub)
    }

    #[test]
    fn test_get_returns_empty_default_when_absent() {
        let store = Store::empty();
        assert_eq!(store.get(StateKey::Layers), StateValue::Layers(vec![]));
        assert_eq!(store.get(StateKey::IsDirty), StateValue::Bool(false));
        assert_eq!(store.get(StateKey::CurrentSetName), StateValue::Text(String::new()));
        assert!(!store.contains(StateKey::Zoom));
    }

    #[test]
    fn test_new_store_has_session_defaults() {
        let store = Store::new();
        assert_eq!(store.get(StateKey::BackgroundVisible), StateValue::Bool(true));
        assert_eq!(store.get(StateKey::BackgroundOpacity), StateValue::Number(1.0));
        assert_eq!(store.current_set_name(), "default");
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_set_notifies_only_that_key() {
        let store = Store::new();
        let (dirty_seen, _a) = recorder(&store, StateKey::IsDirty);
        let (zoom_seen, _b) = recorder(&store, StateKey::Zoom);

        store.set(StateKey::IsDirty, StateValue::Bool(true)).unwrap();

        assert_eq!(*dirty_seen.borrow(), vec![StateValue::Bool(true)]);
        assert!(zoom_seen.borrow().is_empty());
    }

    #[test]
    fn test_set_rejects_wrong_kind() {
        let store = Store::new();
        let err = store
            .set(StateKey::IsDirty, StateValue::Number(1.0))
            .unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { key: StateKey::IsDirty, .. }));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let store = Store::new();
        let result = store.update(vec![
            (StateKey::IsDirty, StateValue::Bool(true)),
            (StateKey::Zoom, StateValue::Text("big".into())),
        ]);
        assert!(result.is_err());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_update_listeners_see_fully_applied_state() {
        let store = Store::new();
        let observed = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&observed);
        let reader = store.clone();
        // Listener on layers reads the dirty flag from the same update.
        let _sub = store.subscribe(StateKey::Layers, move |_| {
            *sink.borrow_mut() = Some(reader.is_dirty());
        });

        store
            .replace_layers(vec![Layer::rectangle(0.0, 0.0, 1.0, 1.0)])
            .unwrap();

        assert_eq!(*observed.borrow(), Some(true));
    }

    #[test]
    fn test_unsubscribe_and_drop_remove_listener() {
        let store = Store::new();
        let (seen, sub) = recorder(&store, StateKey::Zoom);
        assert_eq!(store.listener_count(StateKey::Zoom), 1);
        sub.unsubscribe();
        assert_eq!(store.listener_count(StateKey::Zoom), 0);

        store.set(StateKey::Zoom, StateValue::Number(2.0)).unwrap();
        assert!(seen.borrow().is_empty());

        {
            let _scoped = store.subscribe(StateKey::Zoom, |_| {});
            assert_eq!(store.listener_count(StateKey::Zoom), 1);
        }
        assert_eq!(store.listener_count(StateKey::Zoom), 0);
    }

    #[test]
    fn test_dropping_listener_releases_subscriptions_it_owns() {
        let store = Store::new();
        let nested = store.subscribe(StateKey::Zoom, |_| {});
        let outer = store.subscribe(StateKey::PanX, move |_| {
            let _ = nested.key();
        });
        assert_eq!(store.listener_count(StateKey::Zoom), 1);

        drop(outer);
        assert_eq!(store.listener_count(StateKey::PanX), 0);
        assert_eq!(store.listener_count(StateKey::Zoom), 0);
    }

    #[test]
    fn test_release_while_map_busy_is_applied_later() {
        let store = Store::new();
        let (seen, sub) = recorder(&store, StateKey::Zoom);
        {
            let _busy = store.inner.listeners.borrow();
            drop(sub);
        }
        assert_eq!(store.inner.deferred_releases.borrow().len(), 1);

        store.set(StateKey::Zoom, StateValue::Number(3.0)).unwrap();
        assert!(seen.borrow().is_empty());
        assert_eq!(store.listener_count(StateKey::Zoom), 0);
        assert!(store.inner.deferred_releases.borrow().is_empty());
    }

    #[test]
    fn test_listener_may_write_back() {
        let store = Store::new();
        let writer = store.clone();
        let _sub = store.subscribe(StateKey::Layers, move |_| {
            writer.set(StateKey::ShowGrid, StateValue::Bool(true)).unwrap();
        });
        store.set(StateKey::Layers, StateValue::Layers(vec![])).unwrap();
        assert_eq!(store.get(StateKey::ShowGrid), StateValue::Bool(true));
    }

    #[test]
    fn test_update_while_reading_is_busy() {
        let store = Store::new();
        let result = store.with_layers(|_| store.set_dirty(true));
        assert_eq!(result, Err(StoreError::Busy));
    }

    #[test]
    fn test_apply_layer_changes_keeps_order() {
        let store = Store::new();
        let a = Layer::with_id("a", crate::layer::LayerType::Rectangle);
        let b = Layer::with_id("b", crate::layer::LayerType::Rectangle);
        store.replace_layers(vec![a.clone(), b]).unwrap();
        store.set_dirty(false).unwrap();

        let mut moved = a;
        moved.x = Some(42.0);
        store.apply_layer_changes(&[moved], true).unwrap();

        let layers = store.layers();
        assert_eq!(layers[0].id, "a");
        assert_eq!(layers[0].x, Some(42.0));
        assert_eq!(layers[1].id, "b");
        assert!(store.is_dirty());
    }

    #[test]
    fn test_restore_drops_missing_selection() {
        let store = Store::new();
        let snapshot = StateSnapshot {
            layers: vec![Layer::with_id("a", crate::layer::LayerType::Text)],
            selected: ["a".to_string(), "gone".to_string()].into_iter().collect(),
        };
        store.restore(snapshot).unwrap();
        let selected = store.selected_layer_ids();
        assert!(selected.contains("a"));
        assert!(!selected.contains("gone"));
    }

    #[test]
    fn test_subscription_set_replaces_previous() {
        let store = Store::new();
        let mut set = SubscriptionSet::new();
        set.replace("draft", vec![store.subscribe(StateKey::Layers, |_| {})]);
        set.replace("draft", vec![store.subscribe(StateKey::Layers, |_| {})]);
        assert_eq!(store.listener_count(StateKey::Layers), 1);
        set.release("draft");
        assert_eq!(store.listener_count(StateKey::Layers), 0);
        assert!(set.is_empty());
    }

    #[test]
    fn test_key_names_round_trip() {
        for key in StateKey::ALL {
            assert_eq!(StateKey::from_name(key.name()), Some(key));
        }
    }
}
