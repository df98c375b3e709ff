//! Browser/WebGL surface backend
//!
//! The hosting page owns the canvas and the browser owns presentation, so
//! this backend is thinner than the native ones: the surface format is the
//! fixed WebGL2 canvas format (antialiasing is a creation-time attribute),
//! presentation happens when control returns to the event loop, and a WebGL
//! context can never target a second canvas. The usual way in is `import`,
//! adopting a `WebGl2RenderingContext` the embedder already created.

use raw_window_handle::RawWindowHandle;
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, WebGl2RenderingContext, WebGlContextAttributes};

use crate::config::{ApiDialect, ContextDescriptor, HandleOwnership, ImportDescriptor, ResetFlags};
use crate::error::{ContextError, ContextResult};

use super::{Framebuffer, SurfaceBackend};

/// Surface token of the web backend
pub struct WebSurface {
    canvas: Option<HtmlCanvasElement>,
}

/// WebGL2-backed rendering context
pub struct WebBackend {
    gl: glow::Context,
    dialect: ApiDialect,
}

impl WebBackend {
    fn from_webgl(context: &WebGl2RenderingContext) -> Self {
        Self {
            gl: glow::Context::from_webgl2_context(context.clone()),
            dialect: ApiDialect::WebGl2,
        }
    }
}

impl SurfaceBackend for WebBackend {
    type Surface = WebSurface;

    fn connect(desc: &ContextDescriptor) -> ContextResult<(Self, Self::Surface)> {
        let Some(window) = desc.window else {
            return Err(ContextError::Negotiation(
                "a canvas handle is required for WebGL contexts".to_string(),
            ));
        };
        let canvas = lookup_canvas(window)?;
        canvas.set_width(desc.config.width);
        canvas.set_height(desc.config.height);

        let attributes = WebGlContextAttributes::new();
        attributes.set_antialias(desc.config.msaa > 1);
        attributes.set_depth(true);
        attributes.set_stencil(true);

        let context = canvas
            .get_context_with_context_options("webgl2", attributes.as_ref())
            .ok()
            .flatten()
            .and_then(|object| object.dyn_into::<WebGl2RenderingContext>().ok())
            .ok_or_else(|| {
                ContextError::Negotiation("the browser refused a WebGL2 context for the canvas".to_string())
            })?;

        let backend = Self::from_webgl(&context);
        let surface = WebSurface { canvas: Some(canvas) };
        Ok((backend, surface))
    }

    fn adopt(import: ImportDescriptor) -> ContextResult<(Self, Self::Surface)> {
        let backend = Self::from_webgl(&import.webgl);
        let canvas = import
            .webgl
            .canvas()
            .and_then(|object| object.dyn_into::<HtmlCanvasElement>().ok());
        let surface = WebSurface { canvas };
        Ok((backend, surface))
    }

    fn acquire(&mut self, _window: RawWindowHandle, _width: u32, _height: u32) -> ContextResult<Self::Surface> {
        // A WebGL context is bound to exactly one canvas for its lifetime
        Err(ContextError::IncompatibleSurface(
            "WebGL contexts cannot present to a second canvas".to_string(),
        ))
    }

    fn release(&mut self, _surface: Self::Surface) {}

    fn make_current(&mut self, _surface: &Self::Surface) -> ContextResult<()> {
        // The browser keeps the context implicitly current
        Ok(())
    }

    fn present(&mut self, _surface: &Self::Surface) -> ContextResult<()> {
        // The compositor presents when control returns to the event loop
        unsafe {
            use glow::HasContext;
            self.gl.flush();
        }
        Ok(())
    }

    fn resize(&mut self, surface: &mut Self::Surface, width: u32, height: u32, _flags: ResetFlags) -> ContextResult<()> {
        if let Some(canvas) = &surface.canvas {
            canvas.set_width(width);
            canvas.set_height(height);
        }
        Ok(())
    }

    fn backbuffer_fbo(&self, _surface: &Self::Surface) -> Option<Framebuffer> {
        None
    }

    fn reported_features(&self) -> Vec<String> {
        use glow::HasContext;
        self.gl.supported_extensions().iter().cloned().collect()
    }

    fn dialect(&self) -> ApiDialect {
        self.dialect
    }

    fn disconnect(self, _ownership: HandleOwnership) {
        // The canvas and its context belong to the page either way
    }
}

fn lookup_canvas(window: RawWindowHandle) -> ContextResult<HtmlCanvasElement> {
    let RawWindowHandle::Web(handle) = window else {
        return Err(ContextError::UnsupportedHandle("the web backend accepts canvas handles"));
    };
    web_sys::window()
        .and_then(|w| w.document())
        .and_then(|document| {
            document
                .query_selector(&format!("canvas[data-raw-handle=\"{}\"]", handle.id))
                .ok()
                .flatten()
        })
        .and_then(|element| element.dyn_into::<HtmlCanvasElement>().ok())
        .ok_or_else(|| ContextError::Platform(format!("no canvas tagged data-raw-handle={}", handle.id)))
}
