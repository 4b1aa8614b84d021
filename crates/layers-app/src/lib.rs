//! Layers Editor Application
//!
//! Browser bindings for the annotation editor and a native tool for
//! inspecting drafts left behind by editing sessions.

pub mod preview;
mod shortcuts;

#[cfg(not(target_arch = "wasm32"))]
pub mod inspector;

pub use preview::{DEFAULT_PREVIEW_SIZE, render_preview};
pub use shortcuts::{Command, Shortcut, ShortcutRegistry};

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(target_arch = "wasm32")]
pub use web::{LayersEditor, run_wasm};
