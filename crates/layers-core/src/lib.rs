//! Layers Core Library
//!
//! Platform-agnostic editing engine for image annotation layers: session
//! state, geometry, gestures, undo and draft autosave.

pub mod draft;
pub mod history;
pub mod host;
pub mod input;
pub mod layer;
pub mod selection;
pub mod session;
pub mod storage;
pub mod store;
pub mod timer;
pub mod transform;
pub mod viewport;

pub use draft::{Draft, DraftConfig, DraftInfo, DraftManager, DraftTarget, draft_key};
pub use history::History;
pub use host::{Confirm, Host, Messages, Notifier, NotifyLevel, RenderError, Renderer};
pub use input::{Modifiers, TouchPoint};
pub use layer::{Layer, LayerError, LayerType, normalize_layers};
pub use selection::{Handle, HandleKind, HitTarget, ResizeHandle, SelectionFrame, hit_test};
pub use session::EditorSession;
pub use storage::{PlatformStorage, Storage, StorageError, StorageResult};
pub use store::{StateKey, StateValue, Store, StoreError, Subscription};
pub use timer::{Clock, ManualClock, SystemClock};
pub use transform::{Gesture, TransformController};
pub use viewport::{Pinch, Viewport};

#[cfg(test)]
pub(crate) mod test_util {
    use std::future::Future;
    use std::task::{Context, Poll, Waker};

    /// Drive a future that never actually waits.
    pub fn block_on<F: Future>(f: F) -> F::Output {
        let mut cx = Context::from_waker(Waker::noop());
        let mut f = std::pin::pin!(f);
        loop {
            if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
                return result;
            }
        }
    }

    /// Poll a future exactly once.
    pub fn poll_once<F: Future + ?Sized>(f: std::pin::Pin<&mut F>) -> Poll<F::Output> {
        f.poll(&mut Context::from_waker(Waker::noop()))
    }
}
