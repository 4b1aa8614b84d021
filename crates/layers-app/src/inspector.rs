//! Inspect and maintain drafts left in a storage backend.

use crate::preview::render_preview;
use layers_core::draft::{Draft, DraftInfo, list_drafts, purge_expired};
use layers_core::storage::{Storage, StorageError};
use layers_render::{CanvasPool, RasterFactory, SurfaceError};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("No draft stored under {0}")]
    NotFound(String),
    #[error("Malformed draft under {0}")]
    Malformed(String),
    #[error("Draft {0} has no visible layers")]
    Empty(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("Failed to serialize draft: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

/// One line describing a stored draft.
pub fn format_summary(key: &str, info: &DraftInfo) -> String {
    let minutes = info.age_ms / 60_000;
    let mut line = format!(
        "{}  {} layer(s), {} min old",
        key, info.layer_count, minutes
    );
    if let Some(set_name) = &info.set_name {
        line.push_str(&format!(", set {}", set_name));
    }
    if info.stripped_images > 0 {
        line.push_str(&format!(", {} image(s) without pixels", info.stripped_images));
    }
    line
}

/// Summaries of every draft, newest first.
pub async fn list<S: Storage + ?Sized>(storage: &S, now_ms: u64) -> Vec<String> {
    list_drafts(storage, now_ms)
        .await
        .iter()
        .map(|(key, draft)| format_summary(key, &draft.info(now_ms)))
        .collect()
}

async fn load<S: Storage + ?Sized>(storage: &S, key: &str) -> Result<Draft, InspectError> {
    let text = storage
        .get(key)
        .await?
        .ok_or_else(|| InspectError::NotFound(key.to_string()))?;
    Draft::parse(&text).ok_or_else(|| InspectError::Malformed(key.to_string()))
}

/// The normalized draft under `key` as pretty-printed JSON.
pub async fn show<S: Storage + ?Sized>(storage: &S, key: &str) -> Result<String, InspectError> {
    let draft = load(storage, key).await?;
    Ok(serde_json::to_string_pretty(&draft)?)
}

/// Delete expired drafts. Returns the deleted keys.
pub async fn purge<S: Storage + ?Sized>(storage: &S, now_ms: u64, max_age_ms: u64) -> Vec<String> {
    let purged = purge_expired(storage, now_ms, max_age_ms).await;
    log::info!("Purged {} expired draft(s)", purged.len());
    purged
}

/// Write a PNG preview of the draft under `key`. Returns the image size.
pub async fn export_preview<S: Storage + ?Sized>(
    storage: &S,
    key: &str,
    out: &Path,
    max_size: u32,
) -> Result<(u32, u32), InspectError> {
    let draft = load(storage, key).await?;
    let mut pool = CanvasPool::new(RasterFactory);
    let surface = render_preview(&draft.layers, max_size, &mut pool)?
        .ok_or_else(|| InspectError::Empty(key.to_string()))?;
    surface.pixels().save(out)?;
    log::debug!("Preview of {} written to {}", key, out.display());
    Ok(surface.pixels().dimensions())
}
