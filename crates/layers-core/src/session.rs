//! One editing session: input in, store updates out.
//!
//! The session owns the viewport, the active gesture and the undo history,
//! and routes pointer input through coordinate mapping, hit-testing and the
//! transform controller into the store. Redraws and draft saves follow from
//! store subscriptions.

use crate::draft::{DraftConfig, DraftManager, DraftTarget};
use crate::history::History;
use crate::host::Host;
use crate::input::{Modifiers, TouchPoint};
use crate::layer::{normalize_layers, union_bounds, Layer};
use crate::selection::{hit_test, layers_in_rect, selection_handles, Handle, HandleKind, HitTarget};
use crate::storage::Storage;
use crate::store::{StateKey, StateValue, Store, StoreError, SubscriptionSet};
use crate::transform::TransformController;
use crate::viewport::{Pinch, Viewport};
use kurbo::{Point, Rect, Size, Vec2};
use serde_json::Value;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Keys whose changes require a redraw.
const RENDER_KEYS: [StateKey; 4] = [
    StateKey::Layers,
    StateKey::SelectedLayerIds,
    StateKey::BackgroundVisible,
    StateKey::BackgroundOpacity,
];

/// Marquee selection in progress, in canvas coordinates.
#[derive(Debug, Clone)]
pub struct SelectionRect {
    pub start: Point,
    pub current: Point,
    /// Selection to add the marquee result to.
    base: BTreeSet<String>,
}

impl SelectionRect {
    pub fn to_rect(&self) -> Rect {
        Rect::from_points(self.start, self.current)
    }
}

/// An annotation editing session.
pub struct EditorSession<S: Storage> {
    store: Store,
    viewport: Viewport,
    controller: TransformController,
    history: History,
    drafts: Rc<DraftManager<S>>,
    host: Host,
    /// Client position of the canvas element's top-left corner.
    element_origin: Point,
    selection_rect: Option<SelectionRect>,
    pinch: Option<Pinch>,
    subscriptions: SubscriptionSet,
}

impl<S: Storage> std::fmt::Debug for EditorSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("store", &self.store)
            .field("viewport", &self.viewport)
            .field("controller", &self.controller)
            .field("selection_rect", &self.selection_rect)
            .finish_non_exhaustive()
    }
}

impl<S: Storage> EditorSession<S> {
    /// Create a session for `artifact`, persisting drafts to `storage`.
    pub fn new(artifact: &str, storage: Option<Rc<S>>, host: Host, config: DraftConfig) -> Self {
        let store = Store::new();
        let drafts = Rc::new(DraftManager::new(
            DraftTarget::new(artifact),
            Some(store.clone()),
            storage,
            host.clone(),
            config,
        ));

        let mut subscriptions = SubscriptionSet::new();
        let redraws = RENDER_KEYS
            .iter()
            .map(|key| {
                let host = host.clone();
                store.subscribe(*key, move |_| {
                    host.render();
                })
            })
            .collect();
        subscriptions.replace("render", redraws);

        Self {
            store,
            viewport: Viewport::new(),
            controller: TransformController::new(),
            history: History::new(),
            drafts,
            host,
            element_origin: Point::ZERO,
            selection_rect: None,
            pinch: None,
            subscriptions,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn drafts(&self) -> Rc<DraftManager<S>> {
        Rc::clone(&self.drafts)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selection_rect(&self) -> Option<&SelectionRect> {
        self.selection_rect.as_ref()
    }

    /// Update where the canvas element sits on the page.
    pub fn set_element_origin(&mut self, origin: Point) {
        self.element_origin = origin;
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        self.viewport = self.viewport.with_pixel_ratio(pixel_ratio);
    }

    /// Map a client position to canvas coordinates.
    pub fn to_canvas(&self, client: Point) -> Point {
        self.viewport.client_to_canvas(client, self.element_origin)
    }

    /// Replace the layers with a freshly loaded set.
    ///
    /// Resets selection, history and the dirty flag, and points drafts at
    /// the new set.
    pub fn load_layers(&mut self, values: Vec<Value>, set_name: &str) -> Result<usize, StoreError> {
        self.controller.cancel(&self.store)?;
        self.selection_rect = None;
        let layers = normalize_layers(values);
        let count = layers.len();
        self.store.update(vec![
            (StateKey::Layers, StateValue::Layers(layers)),
            (StateKey::SelectedLayerIds, StateValue::Ids(BTreeSet::new())),
            (StateKey::CurrentSetName, StateValue::Text(set_name.to_string())),
            (StateKey::IsDirty, StateValue::Bool(false)),
        ])?;
        self.history.clear();
        self.drafts.set_set_name(set_name);
        log::info!("Loaded {} layers for set {}", count, set_name);
        Ok(count)
    }

    /// Resolve a client position against handles and layers.
    pub fn hit_test(&self, client: Point) -> HitTarget {
        let point = self.to_canvas(client);
        let selected = self.store.selected_layer_ids();
        self.store
            .with_layers(|layers| hit_test(layers, &selected, point, self.viewport.zoom))
    }

    /// CSS cursor for the pointer position.
    pub fn cursor_at(&self, client: Point) -> &'static str {
        match self.hit_test(client) {
            HitTarget::Handle(handle) => handle.cursor,
            HitTarget::Layer(_) => "move",
            HitTarget::Empty => "default",
        }
    }

    /// Handles of the current selection, for the overlay.
    pub fn selection_handles(&self) -> Vec<Handle> {
        let selected = self.store.selected_layer_ids();
        self.store
            .with_layers(|layers| selection_handles(layers, &selected, self.viewport.zoom))
    }

    /// Mouse/pen press.
    pub fn pointer_down(&mut self, client: Point, modifiers: Modifiers) -> Result<HitTarget, StoreError> {
        if !self.controller.is_idle() {
            // A press without a release in between; keep what was done.
            self.finish_gesture();
        }
        let point = self.to_canvas(client);
        let target = self.hit_test(client);

        match &target {
            HitTarget::Handle(handle) => match handle.kind {
                HandleKind::Rotate => {
                    self.controller.start_rotation(&self.store, point);
                }
                HandleKind::Resize(resize) => {
                    self.controller.start_resize(&self.store, resize, point);
                }
            },
            HitTarget::Layer(id) => {
                let mut selected = self.store.selected_layer_ids();
                if modifiers.toggle_selection() {
                    if !selected.remove(id) {
                        selected.insert(id.clone());
                    }
                } else if modifiers.extend_selection() {
                    selected.insert(id.clone());
                } else if !selected.contains(id) {
                    selected = BTreeSet::from([id.clone()]);
                }
                let drag = selected.contains(id);
                self.store.set_selection(selected)?;
                if drag {
                    self.controller.start_move(&self.store, point);
                }
            }
            HitTarget::Empty => {
                let base = if modifiers.extend_selection() || modifiers.toggle_selection() {
                    self.store.selected_layer_ids()
                } else {
                    self.store.set_selection(BTreeSet::new())?;
                    BTreeSet::new()
                };
                self.selection_rect = Some(SelectionRect {
                    start: point,
                    current: point,
                    base,
                });
            }
        }
        Ok(target)
    }

    /// Pointer movement. Returns whether the store changed.
    pub fn pointer_move(&mut self, client: Point, modifiers: Modifiers) -> Result<bool, StoreError> {
        let point = self.to_canvas(client);
        if !self.controller.is_idle() {
            return self.controller.handle_pointer(&self.store, point, modifiers);
        }
        let Some(rect) = &mut self.selection_rect else {
            return Ok(false);
        };
        rect.current = point;
        let area = rect.to_rect();
        let mut selected = rect.base.clone();
        selected.extend(self.store.with_layers(|layers| layers_in_rect(layers, area)));
        if selected == self.store.selected_layer_ids() {
            return Ok(false);
        }
        self.store.set_selection(selected)?;
        Ok(true)
    }

    /// Release. Commits the gesture to the undo history.
    ///
    /// Gestures end at the last move position so a release does not jump.
    /// Returns whether a change was committed.
    pub fn pointer_up(&mut self, client: Point, modifiers: Modifiers) -> Result<bool, StoreError> {
        if !self.controller.is_idle() {
            return Ok(self.finish_gesture());
        }
        if self.selection_rect.is_some() {
            self.pointer_move(client, modifiers)?;
            self.selection_rect = None;
        }
        Ok(false)
    }

    fn finish_gesture(&mut self) -> bool {
        match self.controller.finish() {
            Some(outcome) if outcome.changed => {
                log::debug!("{:?} gesture committed", outcome.gesture);
                self.history.push(outcome.before);
                true
            }
            _ => false,
        }
    }

    /// Abort the active gesture or marquee, restoring the prior geometry.
    pub fn cancel_gesture(&mut self) -> Result<bool, StoreError> {
        self.pinch = None;
        if self.selection_rect.take().is_some() {
            return Ok(true);
        }
        self.controller.cancel(&self.store)
    }

    /// Touch start. Two or more contacts begin a pinch.
    pub fn touch_start(&mut self, touches: &[TouchPoint]) -> Result<(), StoreError> {
        match touches {
            [] => Ok(()),
            [single] => {
                self.pointer_down(single.position, Modifiers::default())?;
                Ok(())
            }
            _ => {
                self.cancel_gesture()?;
                self.pinch = Pinch::start(&self.viewport, touches, self.element_origin);
                Ok(())
            }
        }
    }

    pub fn touch_move(&mut self, touches: &[TouchPoint]) -> Result<bool, StoreError> {
        if let Some(pinch) = &mut self.pinch {
            pinch.update(&mut self.viewport, touches, self.element_origin);
            self.sync_viewport()?;
            return Ok(true);
        }
        match touches.first() {
            Some(touch) => self.pointer_move(touch.position, Modifiers::default()),
            None => Ok(false),
        }
    }

    /// Touch end. `remaining` are the contacts still down.
    pub fn touch_end(&mut self, remaining: &[TouchPoint], last: Option<&TouchPoint>) -> Result<bool, StoreError> {
        if self.pinch.is_some() {
            if remaining.len() < 2 {
                self.pinch = None;
            }
            return Ok(false);
        }
        match last {
            Some(touch) => self.pointer_up(touch.position, Modifiers::default()),
            None => Ok(false),
        }
    }

    /// Zoom by `factor` around a client position.
    pub fn zoom_at(&mut self, client: Point, factor: f64) -> Result<(), StoreError> {
        self.viewport
            .zoom_at(client - self.element_origin.to_vec2(), factor);
        self.sync_viewport()
    }

    pub fn pan(&mut self, delta: Vec2) -> Result<(), StoreError> {
        self.viewport.pan(delta);
        self.sync_viewport()
    }

    /// Fit every layer into an element of `size`.
    pub fn fit_to_layers(&mut self, size: Size, padding: f64) -> Result<(), StoreError> {
        match self.store.with_layers(|layers| union_bounds(layers)) {
            Some(bounds) => self.viewport.fit_to_bounds(bounds, size, padding),
            None => self.viewport.reset(),
        }
        self.sync_viewport()
    }

    fn sync_viewport(&self) -> Result<(), StoreError> {
        self.store.update(vec![
            (StateKey::Zoom, StateValue::Number(self.viewport.zoom)),
            (StateKey::PanX, StateValue::Number(self.viewport.offset.x)),
            (StateKey::PanY, StateValue::Number(self.viewport.offset.y)),
        ])
    }

    pub fn undo(&mut self) -> Result<bool, StoreError> {
        if !self.controller.is_idle() {
            return Ok(false);
        }
        self.history.undo(&self.store)
    }

    pub fn redo(&mut self) -> Result<bool, StoreError> {
        if !self.controller.is_idle() {
            return Ok(false);
        }
        self.history.redo(&self.store)
    }

    /// Select the given layers, ignoring unknown ids.
    pub fn select(&mut self, ids: impl IntoIterator<Item = String>) -> Result<(), StoreError> {
        let known: BTreeSet<String> = ids
            .into_iter()
            .filter(|id| self.store.with_layers(|layers| layers.iter().any(|l| &l.id == id)))
            .collect();
        self.store.set_selection(known)
    }

    pub fn select_all(&mut self) -> Result<(), StoreError> {
        let all = self.store.with_layers(|layers| {
            layers
                .iter()
                .filter(|l| l.is_interactive())
                .map(|l| l.id.clone())
                .collect()
        });
        self.store.set_selection(all)
    }

    pub fn clear_selection(&mut self) -> Result<(), StoreError> {
        self.store.set_selection(BTreeSet::new())
    }

    /// Remove the selected layers. Returns how many were removed.
    pub fn delete_selected(&mut self) -> Result<usize, StoreError> {
        let selected = self.store.selected_layer_ids();
        if selected.is_empty() || !self.controller.is_idle() {
            return Ok(0);
        }
        self.history.push_undo(&self.store);
        let layers: Vec<Layer> = self
            .store
            .layers()
            .into_iter()
            .filter(|l| !selected.contains(&l.id))
            .collect();
        let removed = self.store.with_layers(<[Layer]>::len) - layers.len();
        self.store.update(vec![
            (StateKey::Layers, StateValue::Layers(layers)),
            (StateKey::SelectedLayerIds, StateValue::Ids(BTreeSet::new())),
            (StateKey::IsDirty, StateValue::Bool(true)),
        ])?;
        Ok(removed)
    }

    /// Append a layer and select it.
    pub fn add_layer(&mut self, layer: Layer) -> Result<(), StoreError> {
        self.history.push_undo(&self.store);
        let id = layer.id.clone();
        let mut layers = self.store.layers();
        layers.push(layer);
        self.store.update(vec![
            (StateKey::Layers, StateValue::Layers(layers)),
            (StateKey::SelectedLayerIds, StateValue::Ids(BTreeSet::from([id]))),
            (StateKey::IsDirty, StateValue::Bool(true)),
        ])
    }

    /// Drive draft timers.
    pub async fn tick(&self) -> bool {
        self.drafts.tick().await
    }

    /// The layers were saved remotely.
    pub async fn mark_saved(&self) -> Result<bool, StoreError> {
        self.store.set_dirty(false)?;
        Ok(self.drafts.on_save_success().await)
    }

    /// Redraw now.
    pub fn render(&self) -> bool {
        self.host.render()
    }

    /// Stop timers and release subscriptions.
    pub fn destroy(&mut self) {
        self.pinch = None;
        self.selection_rect = None;
        self.drafts.destroy();
        self.subscriptions.clear();
    }
}

impl<S: Storage> Drop for EditorSession<S> {
    fn drop(&mut self) {
        self.drafts.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::CountingRenderer;
    use crate::storage::MemoryStorage;
    use crate::test_util::block_on;
    use crate::timer::{Duration, ManualClock};
    use crate::transform::Gesture;
    use serde_json::json;

    struct Fixture {
        session: EditorSession<MemoryStorage>,
        storage: Rc<MemoryStorage>,
        renderer: Rc<CountingRenderer>,
        clock: ManualClock,
    }

    fn fixture() -> Fixture {
        let storage = Rc::new(MemoryStorage::new());
        let renderer = Rc::new(CountingRenderer::default());
        let clock = ManualClock::new(1_700_000_000_000);
        let host = Host::new()
            .with_renderer(renderer.clone())
            .with_clock(Rc::new(clock.clone()));
        let mut session = EditorSession::new(
            "File:Example.jpg",
            Some(Rc::clone(&storage)),
            host,
            DraftConfig::default(),
        );
        session
            .load_layers(
                vec![
                    json!({ "id": "a", "type": "rectangle", "x": 100, "y": 100, "width": 100, "height": 100 }),
                    json!({ "id": "b", "type": "rectangle", "x": 400, "y": 400, "width": 50, "height": 50 }),
                ],
                "labels",
            )
            .unwrap();
        Fixture {
            session,
            storage,
            renderer,
            clock,
        }
    }

    fn layer_x(session: &EditorSession<MemoryStorage>, id: &str) -> f64 {
        session.store().layer(id).and_then(|l| l.x).unwrap()
    }

    #[test]
    fn test_load_layers_resets_session() {
        let f = fixture();
        assert_eq!(f.session.store().layers().len(), 2);
        assert!(!f.session.store().is_dirty());
        assert_eq!(f.session.store().current_set_name(), "labels");
        assert_eq!(
            f.session.drafts().storage_key(),
            "layers-draft-File:Example.jpg-labels"
        );
        assert!(!f.session.history().can_undo());
    }

    #[test]
    fn test_drag_moves_layer_and_is_undoable() {
        let mut f = fixture();
        let target = f
            .session
            .pointer_down(Point::new(150.0, 150.0), Modifiers::default())
            .unwrap();
        assert_eq!(target, HitTarget::Layer("a".to_string()));
        assert_eq!(f.session.controller.active(), Some(Gesture::Move));

        f.session
            .pointer_move(Point::new(160.0, 170.0), Modifiers::default())
            .unwrap();
        assert!(f
            .session
            .pointer_up(Point::new(160.0, 170.0), Modifiers::default())
            .unwrap());
        assert_eq!(layer_x(&f.session, "a"), 110.0);
        assert!(f.session.store().is_dirty());

        assert!(f.session.undo().unwrap());
        assert_eq!(layer_x(&f.session, "a"), 100.0);
        assert!(f.session.redo().unwrap());
        assert_eq!(layer_x(&f.session, "a"), 110.0);
    }

    #[test]
    fn test_click_without_drag_adds_no_history() {
        let mut f = fixture();
        f.session
            .pointer_down(Point::new(150.0, 150.0), Modifiers::default())
            .unwrap();
        assert!(!f
            .session
            .pointer_up(Point::new(150.0, 150.0), Modifiers::default())
            .unwrap());
        assert!(!f.session.history().can_undo());
        assert!(!f.session.store().is_dirty());
        assert_eq!(
            f.session.store().selected_layer_ids(),
            BTreeSet::from(["a".to_string()])
        );
    }

    #[test]
    fn test_rotate_handle_rotates_selection() {
        let mut f = fixture();
        f.session.select(["a".to_string()]).unwrap();
        // Rotate handle sits above the top edge center.
        let target = f
            .session
            .pointer_down(Point::new(150.0, 75.0), Modifiers::default())
            .unwrap();
        assert!(matches!(
            target,
            HitTarget::Handle(Handle {
                kind: HandleKind::Rotate,
                ..
            })
        ));
        f.session
            .pointer_move(Point::new(250.0, 150.0), Modifiers::default())
            .unwrap();
        assert!(f
            .session
            .pointer_up(Point::new(250.0, 150.0), Modifiers::default())
            .unwrap());
        let rotation = f.session.store().layer("a").unwrap().rotation;
        assert!((rotation - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_cancel_restores_geometry() {
        let mut f = fixture();
        f.session
            .pointer_down(Point::new(150.0, 150.0), Modifiers::default())
            .unwrap();
        f.session
            .pointer_move(Point::new(300.0, 300.0), Modifiers::default())
            .unwrap();
        assert!(f.session.cancel_gesture().unwrap());
        assert_eq!(layer_x(&f.session, "a"), 100.0);
        assert!(!f.session.store().is_dirty());
        assert!(!f.session.history().can_undo());
    }

    #[test]
    fn test_marquee_selects_intersecting_layers() {
        let mut f = fixture();
        f.session
            .pointer_down(Point::new(0.0, 0.0), Modifiers::default())
            .unwrap();
        assert!(f.session.selection_rect().is_some());
        f.session
            .pointer_up(Point::new(420.0, 420.0), Modifiers::default())
            .unwrap();
        assert!(f.session.selection_rect().is_none());
        assert_eq!(f.session.store().selected_layer_ids().len(), 2);

        f.session
            .pointer_down(Point::new(1000.0, 1000.0), Modifiers::default())
            .unwrap();
        assert!(f.session.store().selected_layer_ids().is_empty());
    }

    #[test]
    fn test_toggle_selection_with_ctrl() {
        let mut f = fixture();
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        f.session.pointer_down(Point::new(150.0, 150.0), ctrl).unwrap();
        f.session.pointer_up(Point::new(150.0, 150.0), ctrl).unwrap();
        f.session.pointer_down(Point::new(425.0, 425.0), ctrl).unwrap();
        f.session.pointer_up(Point::new(425.0, 425.0), ctrl).unwrap();
        assert_eq!(f.session.store().selected_layer_ids().len(), 2);
        f.session.pointer_down(Point::new(150.0, 150.0), ctrl).unwrap();
        assert_eq!(
            f.session.store().selected_layer_ids(),
            BTreeSet::from(["b".to_string()])
        );
        assert!(f.session.controller.is_idle());
    }

    #[test]
    fn test_pointer_maps_through_viewport() {
        let mut f = fixture();
        f.session.set_element_origin(Point::new(10.0, 20.0));
        f.session.zoom_at(Point::new(10.0, 20.0), 2.0).unwrap();
        // Canvas (150, 150) is at element (300, 300).
        assert_eq!(
            f.session.hit_test(Point::new(310.0, 320.0)),
            HitTarget::Layer("a".to_string())
        );
        assert_eq!(
            f.session.store().get(StateKey::Zoom),
            StateValue::Number(2.0)
        );
    }

    #[test]
    fn test_pinch_updates_zoom() {
        let mut f = fixture();
        f.session
            .touch_start(&[TouchPoint::new(1, 100.0, 0.0), TouchPoint::new(2, 200.0, 0.0)])
            .unwrap();
        f.session
            .touch_move(&[TouchPoint::new(1, 50.0, 0.0), TouchPoint::new(2, 250.0, 0.0)])
            .unwrap();
        assert!((f.session.viewport().zoom - 2.0).abs() < 1e-9);
        f.session.touch_end(&[], None).unwrap();
        assert!(f.session.pinch.is_none());
    }

    #[test]
    fn test_store_changes_trigger_render() {
        let mut f = fixture();
        let before = f.renderer.calls.get();
        f.session.select_all().unwrap();
        assert_eq!(f.renderer.calls.get(), before + 1);
    }

    #[test]
    fn test_delete_selected() {
        let mut f = fixture();
        f.session.select(["b".to_string(), "missing".to_string()]).unwrap();
        assert_eq!(f.session.delete_selected().unwrap(), 1);
        assert!(f.session.store().layer("b").is_none());
        assert!(f.session.undo().unwrap());
        assert!(f.session.store().layer("b").is_some());
    }

    #[test]
    fn test_edits_are_autosaved_and_cleared_on_save() {
        let mut f = fixture();
        f.session
            .add_layer(Layer::with_id("c", crate::layer::LayerType::Text))
            .unwrap();
        f.clock.advance(Duration::from_secs(3));
        assert!(block_on(f.session.tick()));
        assert!(f.storage.peek("layers-draft-File:Example.jpg-labels").is_some());

        assert!(block_on(f.session.mark_saved()).unwrap());
        assert!(f.storage.is_empty());
        assert!(!f.session.store().is_dirty());
    }

    #[test]
    fn test_destroy_releases_listeners() {
        let mut f = fixture();
        f.session.destroy();
        assert_eq!(f.session.store().listener_count(StateKey::Layers), 0);
    }
}
