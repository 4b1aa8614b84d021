//! Draft autosave and recovery.
//!
//! Unsaved edits are mirrored into quota-limited local storage so that a
//! closed tab or crashed page does not lose work. Writes are debounced
//! behind relevant store changes, and a periodic timer catches anything the
//! debounce missed. Storage problems never escape this module: every
//! operation reports a plain `bool`/`Option` and logs the cause.

use crate::host::{
    Host, NotifyLevel, MSG_DRAFT_IMAGES_STRIPPED, MSG_DRAFT_RECOVERED, MSG_DRAFT_RECOVER_FAILED,
    MSG_DRAFT_RECOVER_PROMPT,
};
use crate::layer::{normalize_layers, Layer, LayerType};
use crate::storage::Storage;
use crate::store::{StateKey, StateValue, Store, SubscriptionSet};
use crate::timer::{Clock, Duration, Interval, Timer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

/// Schema version written into new drafts.
pub const DRAFT_VERSION: u32 = 1;
/// Prefix shared by every draft key.
pub const DRAFT_KEY_PREFIX: &str = "layers-draft-";
/// Set name used when none is configured.
pub const DEFAULT_SET_NAME: &str = "default";

/// Store keys whose changes schedule a save.
pub const DRAFT_WATCHED_KEYS: [StateKey; 3] = [
    StateKey::Layers,
    StateKey::BackgroundVisible,
    StateKey::BackgroundOpacity,
];

const SUBSCRIPTION_SLOT: &str = "draft";

/// Autosave tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DraftConfig {
    /// Quiet period after the last change before a save, in milliseconds.
    pub debounce_ms: u64,
    /// Forced save interval while dirty, in milliseconds.
    pub autosave_interval_ms: u64,
    /// Drafts older than this are discarded, in milliseconds.
    pub max_age_ms: u64,
    /// Image sources longer than this many characters are left out of drafts.
    pub strip_threshold: usize,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2_000,
            autosave_interval_ms: 60_000,
            max_age_ms: 24 * 60 * 60 * 1000,
            strip_threshold: 1024,
        }
    }
}

impl DraftConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }
}

/// Storage key for a draft.
pub fn draft_key(artifact: &str, set_name: &str) -> String {
    let set_name = if set_name.is_empty() {
        DEFAULT_SET_NAME
    } else {
        set_name
    };
    format!("{}{}-{}", DRAFT_KEY_PREFIX, artifact, set_name)
}

/// What a draft belongs to: the annotated artifact and the layer set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftTarget {
    pub artifact: String,
    pub set_name: String,
}

impl DraftTarget {
    pub fn new(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            set_name: DEFAULT_SET_NAME.to_string(),
        }
    }

    pub fn with_set_name(mut self, set_name: impl Into<String>) -> Self {
        self.set_name = set_name.into();
        self
    }

    pub fn key(&self) -> String {
        draft_key(&self.artifact, &self.set_name)
    }
}

/// A persisted snapshot of unsaved work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub version: u32,
    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub layers: Vec<Layer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_opacity: Option<f64>,
}

impl Draft {
    /// Snapshot the store. Oversized image payloads are dropped from the
    /// copy; the live layers are not touched.
    pub fn capture(store: &Store, set_name: &str, timestamp: u64, strip_threshold: usize) -> Self {
        let layers = store.with_layers(|layers| {
            layers
                .iter()
                .map(|layer| {
                    let mut copy = layer.clone();
                    if copy.inline_payload_len() > strip_threshold {
                        copy.src = None;
                        copy.src_stripped = Some(true);
                    }
                    copy
                })
                .collect()
        });
        Self {
            version: DRAFT_VERSION,
            timestamp,
            layers,
            set_name: Some(set_name.to_string()),
            background_visible: store.get(StateKey::BackgroundVisible).as_bool(),
            background_opacity: store.get(StateKey::BackgroundOpacity).as_number(),
        }
    }

    /// Decode a stored draft. Anything that is not an object with a `layers`
    /// array and a timestamp is rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let object = value.as_object()?;
        let layers = object.get("layers")?.as_array()?.clone();
        let timestamp = object.get("timestamp").and_then(as_millis)?;
        let version = match object.get("version").and_then(Value::as_u64) {
            Some(raw) => match u32::try_from(raw) {
                Ok(version) => version,
                Err(_) => {
                    log::warn!("Ignoring draft with unsupported version {}", raw);
                    return None;
                }
            },
            None => DRAFT_VERSION,
        };
        if version > DRAFT_VERSION {
            log::warn!("Ignoring draft with unsupported version {}", version);
            return None;
        }
        Some(Self {
            version,
            timestamp,
            layers: normalize_layers(layers),
            set_name: object
                .get("setName")
                .and_then(Value::as_str)
                .map(str::to_string),
            background_visible: object.get("backgroundVisible").and_then(Value::as_bool),
            background_opacity: object
                .get("backgroundOpacity")
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
                .map(|v| v.clamp(0.0, 1.0)),
        })
    }

    /// Age at `now_ms`. A timestamp in the future counts as brand new.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp)
    }

    pub fn is_expired(&self, now_ms: u64, max_age_ms: u64) -> bool {
        self.age_ms(now_ms) > max_age_ms
    }

    /// Image layers whose payload was left out.
    pub fn stripped_count(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| l.kind == LayerType::Image && l.src_stripped == Some(true))
            .count()
    }

    pub fn info(&self, now_ms: u64) -> DraftInfo {
        DraftInfo {
            timestamp: self.timestamp,
            age_ms: self.age_ms(now_ms),
            layer_count: self.layers.len(),
            stripped_images: self.stripped_count(),
            set_name: self.set_name.clone(),
        }
    }
}

fn as_millis(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
}

/// Summary of a stored draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftInfo {
    pub timestamp: u64,
    pub age_ms: u64,
    pub layer_count: usize,
    pub stripped_images: usize,
    pub set_name: Option<String>,
}

/// Marks a draft write in flight. Lowered on drop, so a write abandoned
/// mid-await does not block later saves.
struct SavingFlag<'a>(&'a Cell<bool>);

impl<'a> SavingFlag<'a> {
    fn raise(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for SavingFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Owns the autosave timers and the draft of one editing session.
pub struct DraftManager<S: Storage> {
    target: RefCell<DraftTarget>,
    store: Option<Store>,
    storage: Option<Rc<S>>,
    host: Host,
    config: DraftConfig,
    debounce: Rc<Timer>,
    periodic: Interval,
    subscriptions: RefCell<SubscriptionSet>,
    recovery_pending: Cell<bool>,
    saving: Cell<bool>,
    destroyed: Cell<bool>,
}

impl<S: Storage> std::fmt::Debug for DraftManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftManager")
            .field("target", &self.target.borrow())
            .field("has_store", &self.store.is_some())
            .field("has_storage", &self.storage.is_some())
            .field("config", &self.config)
            .field("debounce_pending", &self.debounce.is_pending())
            .finish_non_exhaustive()
    }
}

impl<S: Storage> DraftManager<S> {
    /// Create a manager and start watching the store.
    ///
    /// Either dependency may be missing; the manager then does nothing and
    /// every operation reports failure.
    pub fn new(
        target: DraftTarget,
        store: Option<Store>,
        storage: Option<Rc<S>>,
        host: Host,
        config: DraftConfig,
    ) -> Self {
        let periodic = Interval::new(config.autosave_interval());
        let manager = Self {
            target: RefCell::new(target),
            store,
            storage,
            host,
            config,
            debounce: Rc::new(Timer::new()),
            periodic,
            subscriptions: RefCell::new(SubscriptionSet::new()),
            recovery_pending: Cell::new(false),
            saving: Cell::new(false),
            destroyed: Cell::new(false),
        };
        manager.initialize();
        manager
    }

    /// (Re)subscribe to the store and restart the periodic timer. Calling
    /// this again releases the previous subscriptions first.
    pub fn initialize(&self) {
        let Some(store) = &self.store else {
            log::debug!("Draft autosave disabled: no session store");
            return;
        };
        self.destroyed.set(false);

        let subscriptions = DRAFT_WATCHED_KEYS
            .iter()
            .map(|key| {
                let debounce = Rc::clone(&self.debounce);
                let clock: Rc<dyn Clock> = Rc::clone(&self.host.clock);
                let delay = self.config.debounce();
                store.subscribe(*key, move |_| debounce.schedule(clock.now(), delay))
            })
            .collect();
        self.subscriptions
            .borrow_mut()
            .replace(SUBSCRIPTION_SLOT, subscriptions);
        self.periodic.start(self.host.clock.now());
    }

    pub fn config(&self) -> &DraftConfig {
        &self.config
    }

    /// Current storage key.
    pub fn storage_key(&self) -> String {
        self.target.borrow().key()
    }

    /// Switch to another layer set. Later saves and loads use its key.
    pub fn set_set_name(&self, set_name: &str) {
        let mut target = self.target.borrow_mut();
        if target.set_name != set_name {
            log::debug!("Draft key moves from set {} to {}", target.set_name, set_name);
            target.set_name = set_name.to_string();
        }
    }

    /// Whether a debounced save is waiting.
    pub fn save_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Run whatever timers are due. Hosts call this from their event loop.
    ///
    /// Returns whether a draft was written.
    pub async fn tick(&self) -> bool {
        // Leaves due timers in place until the running write finishes.
        if self.destroyed.get() || self.recovery_pending.get() || self.saving.get() {
            return false;
        }
        let now = self.host.clock.now();
        let debounced = self.debounce.fire_if_due(now);
        let periodic = self.periodic.poll(now) && self.store.as_ref().is_some_and(Store::is_dirty);
        if debounced || periodic {
            self.save_draft().await
        } else {
            false
        }
    }

    /// Write the current state as a draft.
    ///
    /// Skipped (false) without storage or store, with no layers, or when
    /// nothing is unsaved.
    pub async fn save_draft(&self) -> bool {
        let (Some(storage), Some(store)) = (&self.storage, &self.store) else {
            return false;
        };
        if self.saving.get() {
            log::debug!("Draft save already in progress");
            return false;
        }
        if store.with_layers(<[Layer]>::is_empty) || !store.is_dirty() {
            return false;
        }

        // Superseded by this write.
        self.debounce.cancel();

        let key = self.storage_key();
        let set_name = self.target.borrow().set_name.clone();
        let draft = Draft::capture(
            store,
            &set_name,
            self.host.clock.epoch_millis(),
            self.config.strip_threshold,
        );
        let json = match serde_json::to_string(&draft) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Failed to serialize draft: {}", e);
                return false;
            }
        };

        let result = {
            let _saving = SavingFlag::raise(&self.saving);
            storage.set(&key, &json).await
        };

        match result {
            Ok(()) => {
                log::debug!(
                    "Saved draft {} ({} layers, {} bytes)",
                    key,
                    draft.layers.len(),
                    json.len()
                );
                true
            }
            Err(e) => {
                log::warn!("Failed to save draft {}: {}", key, e);
                false
            }
        }
    }

    async fn read_draft(&self, discard_expired: bool) -> Option<Draft> {
        let storage = self.storage.as_ref()?;
        let key = self.storage_key();
        let text = match storage.get(&key).await {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Failed to read draft {}: {}", key, e);
                return None;
            }
        };
        let Some(draft) = Draft::parse(&text) else {
            log::warn!("Ignoring malformed draft {}", key);
            return None;
        };
        if draft.is_expired(self.host.clock.epoch_millis(), self.config.max_age_ms) {
            log::info!("Draft {} expired", key);
            if discard_expired {
                if let Err(e) = storage.remove(&key).await {
                    log::warn!("Failed to delete expired draft {}: {}", key, e);
                }
            }
            return None;
        }
        Some(draft)
    }

    /// Load the stored draft. Expired drafts are deleted.
    pub async fn load_draft(&self) -> Option<Draft> {
        self.read_draft(true).await
    }

    /// Whether a usable draft exists.
    pub async fn has_draft(&self) -> bool {
        self.read_draft(false).await.is_some()
    }

    /// Summary of the stored draft, without modifying storage.
    pub async fn get_draft_info(&self) -> Option<DraftInfo> {
        let draft = self.read_draft(false).await?;
        Some(draft.info(self.host.clock.epoch_millis()))
    }

    /// Replace the session state with the stored draft.
    pub async fn recover_draft(&self) -> bool {
        if self.store.is_none() {
            return false;
        }
        match self.load_draft().await {
            Some(draft) => self.apply_draft(draft),
            None => false,
        }
    }

    /// Apply a draft to the store as one update.
    ///
    /// The selection is cleared and the session marked dirty. A renderer
    /// failure afterwards does not undo the recovery.
    pub fn apply_draft(&self, draft: Draft) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        let stripped = draft.stripped_count();
        let layer_count = draft.layers.len();

        let mut changes = vec![
            (StateKey::Layers, StateValue::Layers(draft.layers)),
            (StateKey::SelectedLayerIds, StateValue::Ids(BTreeSet::new())),
            (StateKey::IsDirty, StateValue::Bool(true)),
        ];
        if let Some(visible) = draft.background_visible {
            changes.push((StateKey::BackgroundVisible, StateValue::Bool(visible)));
        }
        if let Some(opacity) = draft.background_opacity {
            changes.push((
                StateKey::BackgroundOpacity,
                StateValue::Number(opacity.clamp(0.0, 1.0)),
            ));
        }

        if let Err(e) = store.update(changes) {
            log::warn!("Failed to apply draft: {}", e);
            return false;
        }
        log::info!("Recovered draft with {} layers", layer_count);

        self.host.render();
        if stripped > 0 {
            let count = stripped.to_string();
            self.host.notify(
                &self.host.message(MSG_DRAFT_IMAGES_STRIPPED, &[&count]),
                NotifyLevel::Warning,
            );
        }
        true
    }

    /// Offer to recover a stored draft.
    ///
    /// Accepting recovers it; declining, or having no way to ask, deletes
    /// it. Autosave is paused while the question is open.
    pub async fn check_and_recover_draft(&self) -> bool {
        let Some(draft) = self.load_draft().await else {
            return false;
        };
        let info = draft.info(self.host.clock.epoch_millis());
        let layers = info.layer_count.to_string();
        let minutes = (info.age_ms / 60_000).to_string();
        let prompt = self.host.message(MSG_DRAFT_RECOVER_PROMPT, &[&layers, &minutes]);

        self.recovery_pending.set(true);
        let accepted = self.host.confirm(&prompt).await;
        self.recovery_pending.set(false);

        if self.destroyed.get() {
            return false;
        }
        if !accepted {
            log::info!("Draft recovery declined");
            self.clear_draft().await;
            return false;
        }

        if self.recover_draft().await {
            self.host.notify(
                &self.host.message(MSG_DRAFT_RECOVERED, &[]),
                NotifyLevel::Success,
            );
            true
        } else {
            self.host.notify(
                &self.host.message(MSG_DRAFT_RECOVER_FAILED, &[]),
                NotifyLevel::Error,
            );
            false
        }
    }

    /// Delete the stored draft.
    pub async fn clear_draft(&self) -> bool {
        let Some(storage) = &self.storage else {
            return false;
        };
        let key = self.storage_key();
        match storage.remove(&key).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to delete draft {}: {}", key, e);
                false
            }
        }
    }

    /// The layers were saved remotely; the draft is no longer needed.
    pub async fn on_save_success(&self) -> bool {
        self.debounce.cancel();
        self.clear_draft().await
    }

    /// Stop all timers and release the store subscriptions.
    pub fn destroy(&self) {
        self.destroyed.set(true);
        self.debounce.cancel();
        self.periodic.stop();
        self.subscriptions.borrow_mut().clear();
    }
}

/// Every draft in `storage` with its key, newest first.
pub async fn list_drafts<S: Storage + ?Sized>(storage: &S, now_ms: u64) -> Vec<(String, Draft)> {
    let keys = match storage.keys().await {
        Ok(keys) => keys,
        Err(e) => {
            log::warn!("Failed to list drafts: {}", e);
            return Vec::new();
        }
    };
    let mut drafts = Vec::new();
    for key in keys.into_iter().filter(|k| k.starts_with(DRAFT_KEY_PREFIX)) {
        if let Ok(Some(text)) = storage.get(&key).await {
            match Draft::parse(&text) {
                Some(draft) => drafts.push((key, draft)),
                None => log::debug!("Skipping malformed draft {}", key),
            }
        }
    }
    drafts.sort_by_key(|(_, d)| d.age_ms(now_ms));
    drafts
}

/// Delete drafts older than `max_age_ms`. Returns the deleted keys.
pub async fn purge_expired<S: Storage + ?Sized>(storage: &S, now_ms: u64, max_age_ms: u64) -> Vec<String> {
    let mut purged = Vec::new();
    for (key, draft) in list_drafts(storage, now_ms).await {
        if draft.is_expired(now_ms, max_age_ms) {
            match storage.remove(&key).await {
                Ok(()) => purged.push(key),
                Err(e) => log::warn!("Failed to delete {}: {}", key, e),
            }
        }
    }
    purged
}
