//! `<canvas>` backed surfaces for the browser.

use crate::surface::{Surface, SurfaceError, SurfaceFactory, SurfaceResult};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement};

/// Detached canvas element plus its 2D context.
#[derive(Debug, Clone)]
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

impl CanvasSurface {
    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    pub fn context(&self) -> &CanvasRenderingContext2d {
        &self.context
    }
}

impl Surface for CanvasSurface {
    fn size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn resize(&mut self, width: u32, height: u32) -> SurfaceResult<()> {
        let (width, height) = (width.max(1), height.max(1));
        if self.size() == (width, height) {
            self.clear();
        } else {
            // Assigning dimensions also resets the context state.
            self.canvas.set_width(width);
            self.canvas.set_height(height);
        }
        Ok(())
    }

    fn clear(&mut self) {
        let (width, height) = self.size();
        self.context
            .set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
            .ok();
        self.context
            .clear_rect(0.0, 0.0, f64::from(width), f64::from(height));
    }
}

/// Creates canvases in a document.
#[derive(Debug, Clone)]
pub struct CanvasFactory {
    document: Document,
}

impl CanvasFactory {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// Factory for the current window's document.
    pub fn from_window() -> SurfaceResult<Self> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| SurfaceError::Unavailable("no document".to_string()))?;
        Ok(Self::new(document))
    }
}

impl SurfaceFactory for CanvasFactory {
    type Surface = CanvasSurface;

    fn create(&self, width: u32, height: u32) -> SurfaceResult<CanvasSurface> {
        let canvas = self
            .document
            .create_element("canvas")
            .map_err(|e| SurfaceError::Backend(format!("{:?}", e)))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| SurfaceError::Backend("not a canvas element".to_string()))?;
        canvas.set_width(width.max(1));
        canvas.set_height(height.max(1));
        let context = canvas
            .get_context("2d")
            .map_err(|e| SurfaceError::Backend(format!("{:?}", e)))?
            .ok_or_else(|| SurfaceError::Unavailable("2d context".to_string()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| SurfaceError::Backend("unexpected context type".to_string()))?;
        Ok(CanvasSurface { canvas, context })
    }
}
