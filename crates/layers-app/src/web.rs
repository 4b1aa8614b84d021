//! WebAssembly entry point and JavaScript bindings.

use crate::shortcuts::ShortcutRegistry;
use js_sys::{Array, Function, Promise, Reflect};
use kurbo::{Point, Size, Vec2};
use layers_core::storage::{BoxFuture, LocalStorage, create_default_storage};
use layers_core::{
    Confirm, DraftConfig, EditorSession, HandleKind, HitTarget, Host, Messages, Modifiers, Notifier,
    NotifyLevel, RenderError, Renderer, TouchPoint,
};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise, spawn_local};

/// Look up an optional callback on the page's callbacks object.
fn callback(callbacks: &JsValue, name: &str) -> Option<Function> {
    Reflect::get(callbacks, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
}

/// Calls `render()` on the next microtask, once the editor is no longer
/// borrowed, so the page may read layers back from inside the callback.
struct JsRenderer(Function);

impl Renderer for JsRenderer {
    fn render_layers(&self) -> Result<(), RenderError> {
        let render = self.0.clone();
        spawn_local(async move {
            if let Err(e) = render.call0(&JsValue::NULL) {
                log::warn!("render callback failed: {:?}", e);
            }
        });
        Ok(())
    }
}

/// `confirm(message)` may answer directly or with a promise.
struct JsConfirm(Function);

impl Confirm for JsConfirm {
    fn confirm(&self, message: &str) -> BoxFuture<'_, bool> {
        let answer = self.0.call1(&JsValue::NULL, &JsValue::from_str(message));
        Box::pin(async move {
            let value = match answer {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("confirm callback failed: {:?}", e);
                    return false;
                }
            };
            match JsFuture::from(Promise::resolve(&value)).await {
                Ok(resolved) => resolved.is_truthy(),
                Err(e) => {
                    log::warn!("confirm promise rejected: {:?}", e);
                    false
                }
            }
        })
    }
}

struct JsNotifier(Function);

impl Notifier for JsNotifier {
    fn notify(&self, message: &str, level: NotifyLevel) {
        let level = match level {
            NotifyLevel::Info => "info",
            NotifyLevel::Success => "success",
            NotifyLevel::Warning => "warning",
            NotifyLevel::Error => "error",
        };
        if let Err(e) = self.0.call2(
            &JsValue::NULL,
            &JsValue::from_str(message),
            &JsValue::from_str(level),
        ) {
            log::warn!("notify callback failed: {:?}", e);
        }
    }
}

/// `message(key, params)` returns a string, or nothing for unknown keys.
struct JsMessages(Function);

impl Messages for JsMessages {
    fn message(&self, key: &str, params: &[&str]) -> Option<String> {
        let params: Array = params.iter().map(|p| JsValue::from_str(p)).collect();
        self.0
            .call2(&JsValue::NULL, &JsValue::from_str(key), &params)
            .ok()
            .and_then(|value| value.as_string())
    }
}

fn host_from_callbacks(callbacks: &JsValue) -> Host {
    let mut host = Host::new();
    if let Some(f) = callback(callbacks, "render") {
        host = host.with_renderer(Rc::new(JsRenderer(f)));
    }
    if let Some(f) = callback(callbacks, "confirm") {
        host = host.with_confirm(Rc::new(JsConfirm(f)));
    }
    if let Some(f) = callback(callbacks, "notify") {
        host = host.with_notifier(Rc::new(JsNotifier(f)));
    }
    if let Some(f) = callback(callbacks, "message") {
        host = host.with_messages(Rc::new(JsMessages(f)));
    }
    host
}

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn hit_target_json(target: &HitTarget) -> Value {
    match target {
        HitTarget::Handle(handle) => match handle.kind {
            HandleKind::Resize(h) => json!({ "type": "resize", "handle": h }),
            HandleKind::Rotate => json!({ "type": "rotate" }),
        },
        HitTarget::Layer(id) => json!({ "type": "layer", "id": id }),
        HitTarget::Empty => json!({ "type": "empty" }),
    }
}

/// Editor session exposed to the page.
#[wasm_bindgen]
pub struct LayersEditor {
    session: Rc<RefCell<EditorSession<LocalStorage>>>,
}

#[wasm_bindgen]
impl LayersEditor {
    /// `callbacks` may carry `render`, `confirm`, `notify` and `message`
    /// functions. `config` is an optional JSON draft configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(artifact: &str, callbacks: JsValue, config: Option<String>) -> Result<LayersEditor, JsValue> {
        let config = match config {
            Some(text) => serde_json::from_str::<DraftConfig>(&text).map_err(to_js_error)?,
            None => DraftConfig::default(),
        };
        let storage = match create_default_storage() {
            Ok(storage) => Some(Rc::new(storage)),
            Err(e) => {
                log::warn!("Drafts disabled: {}", e);
                None
            }
        };
        let session = EditorSession::new(artifact, storage, host_from_callbacks(&callbacks), config);
        Ok(LayersEditor {
            session: Rc::new(RefCell::new(session)),
        })
    }

    /// Load layers from a JSON array. Returns how many were accepted.
    #[wasm_bindgen(js_name = loadLayers)]
    pub fn load_layers(&self, layers_json: &str, set_name: Option<String>) -> Result<usize, JsValue> {
        let values: Vec<Value> = serde_json::from_str(layers_json).map_err(to_js_error)?;
        self.session
            .borrow_mut()
            .load_layers(values, set_name.as_deref().unwrap_or(""))
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = layersJson)]
    pub fn layers_json(&self) -> Result<String, JsValue> {
        let layers = self.session.borrow().store().layers();
        serde_json::to_string(&layers).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = selectedIdsJson)]
    pub fn selected_ids_json(&self) -> Result<String, JsValue> {
        let ids = self.session.borrow().store().selected_layer_ids();
        serde_json::to_string(&ids).map_err(to_js_error)
    }

    /// Handles of the current selection in canvas coordinates.
    #[wasm_bindgen(js_name = handlesJson)]
    pub fn handles_json(&self) -> String {
        let handles: Vec<Value> = self
            .session
            .borrow()
            .selection_handles()
            .iter()
            .map(|h| {
                let mut value = hit_target_json(&HitTarget::Handle(*h));
                value["x"] = json!(h.position.x);
                value["y"] = json!(h.position.y);
                value["cursor"] = json!(h.cursor);
                value
            })
            .collect();
        Value::Array(handles).to_string()
    }

    #[wasm_bindgen(js_name = isDirty)]
    pub fn is_dirty(&self) -> bool {
        self.session.borrow().store().is_dirty()
    }

    #[wasm_bindgen(js_name = cursorAt)]
    pub fn cursor_at(&self, x: f64, y: f64) -> String {
        self.session.borrow().cursor_at(Point::new(x, y)).to_string()
    }

    #[wasm_bindgen(js_name = setElementOrigin)]
    pub fn set_element_origin(&self, left: f64, top: f64) {
        self.session.borrow_mut().set_element_origin(Point::new(left, top));
    }

    #[wasm_bindgen(js_name = setPixelRatio)]
    pub fn set_pixel_ratio(&self, ratio: f64) {
        self.session.borrow_mut().set_pixel_ratio(ratio);
    }

    /// Returns what was hit, as JSON.
    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&self, x: f64, y: f64, shift: bool, ctrl: bool, alt: bool, meta: bool) -> Result<String, JsValue> {
        let modifiers = Modifiers { shift, ctrl, alt, meta };
        let target = self
            .session
            .borrow_mut()
            .pointer_down(Point::new(x, y), modifiers)
            .map_err(to_js_error)?;
        Ok(hit_target_json(&target).to_string())
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&self, x: f64, y: f64, shift: bool, ctrl: bool, alt: bool, meta: bool) -> Result<bool, JsValue> {
        let modifiers = Modifiers { shift, ctrl, alt, meta };
        self.session
            .borrow_mut()
            .pointer_move(Point::new(x, y), modifiers)
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&self, x: f64, y: f64, shift: bool, ctrl: bool, alt: bool, meta: bool) -> Result<bool, JsValue> {
        let modifiers = Modifiers { shift, ctrl, alt, meta };
        self.session
            .borrow_mut()
            .pointer_up(Point::new(x, y), modifiers)
            .map_err(to_js_error)
    }

    /// Touches as a flat `[id, x, y, id, x, y, ...]` array.
    #[wasm_bindgen(js_name = touchStart)]
    pub fn touch_start(&self, touches: &[f64]) -> Result<(), JsValue> {
        self.session
            .borrow_mut()
            .touch_start(&touch_points(touches))
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = touchMove)]
    pub fn touch_move(&self, touches: &[f64]) -> Result<bool, JsValue> {
        self.session
            .borrow_mut()
            .touch_move(&touch_points(touches))
            .map_err(to_js_error)
    }

    /// `last` is the lifted touch as `[id, x, y]`, if known.
    #[wasm_bindgen(js_name = touchEnd)]
    pub fn touch_end(&self, remaining: &[f64], last: &[f64]) -> Result<bool, JsValue> {
        let last = touch_points(last).into_iter().next();
        self.session
            .borrow_mut()
            .touch_end(&touch_points(remaining), last.as_ref())
            .map_err(to_js_error)
    }

    pub fn cancel(&self) -> Result<bool, JsValue> {
        self.session.borrow_mut().cancel_gesture().map_err(to_js_error)
    }

    /// Zoom by `factor` keeping the client point fixed.
    #[wasm_bindgen(js_name = zoomAt)]
    pub fn zoom_at(&self, x: f64, y: f64, factor: f64) -> Result<(), JsValue> {
        self.session
            .borrow_mut()
            .zoom_at(Point::new(x, y), factor)
            .map_err(to_js_error)
    }

    pub fn pan(&self, dx: f64, dy: f64) -> Result<(), JsValue> {
        self.session.borrow_mut().pan(Vec2::new(dx, dy)).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = fitToLayers)]
    pub fn fit_to_layers(&self, width: f64, height: f64, padding: f64) -> Result<(), JsValue> {
        self.session
            .borrow_mut()
            .fit_to_layers(Size::new(width, height), padding)
            .map_err(to_js_error)
    }

    /// Run the shortcut bound to a key press. Returns whether one matched.
    #[wasm_bindgen(js_name = keyDown)]
    pub fn key_down(&self, key: &str, ctrl: bool, shift: bool) -> Result<bool, JsValue> {
        let Some(command) = ShortcutRegistry::lookup(key, ctrl, shift) else {
            return Ok(false);
        };
        command
            .apply(&mut self.session.borrow_mut())
            .map(|_| true)
            .map_err(to_js_error)
    }

    /// Drive the autosave timers. Call from a frame or interval callback.
    pub fn tick(&self) {
        let drafts = self.session.borrow().drafts();
        spawn_local(async move {
            drafts.tick().await;
        });
    }

    /// Offer to restore a stored draft. Resolves to whether one was applied.
    #[wasm_bindgen(js_name = checkRecovery)]
    pub fn check_recovery(&self) -> Promise {
        let drafts = self.session.borrow().drafts();
        future_to_promise(async move { Ok(JsValue::from_bool(drafts.check_and_recover_draft().await)) })
    }

    /// The layers were saved elsewhere; drop the draft.
    #[wasm_bindgen(js_name = markSaved)]
    pub fn mark_saved(&self) -> Promise {
        let (store, drafts) = {
            let session = self.session.borrow();
            (session.store().clone(), session.drafts())
        };
        future_to_promise(async move {
            store.set_dirty(false).map_err(to_js_error)?;
            Ok(JsValue::from_bool(drafts.on_save_success().await))
        })
    }

    pub fn destroy(&self) {
        self.session.borrow_mut().destroy();
    }
}

fn touch_points(flat: &[f64]) -> Vec<TouchPoint> {
    flat.chunks_exact(3)
        .map(|t| TouchPoint::new(t[0] as i64, t[1], t[2]))
        .collect()
}

/// Initialize logging for the module.
#[wasm_bindgen(start)]
pub fn run_wasm() {
    console_error_panic_hook::set_once();

    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&JsValue::from_str(&format!("Logger already set: {}", e)));
    }

    log::info!("Layers editor (WASM) loaded");
}
