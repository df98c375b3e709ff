//! Native surface backends
//!
//! One module per backend family translates the backend-neutral surface
//! requests into platform object graphs: EGL config negotiation, GLX
//! FBConfig selection, a fixed-format WebGL canvas, or a WGL pixel format
//! descriptor. Exactly one backend compiles in per build target; the
//! [`ActiveBackend`] alias names it. The contract every variant implements
//! is [`SurfaceBackend`], which is all the rendering context relies on.

pub mod headless;

#[cfg(all(unix, not(target_arch = "wasm32")))]
pub mod egl;

#[cfg(all(unix, not(target_arch = "wasm32"), feature = "x11"))]
pub mod glx;

#[cfg(windows)]
pub mod wgl;

#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(any(all(unix, not(target_arch = "wasm32")), windows))]
pub(crate) mod msaa_fbo;

use raw_window_handle::RawWindowHandle;

use crate::config::{ApiDialect, ContextDescriptor, HandleOwnership, ImportDescriptor, ResetFlags};
use crate::error::ContextResult;

/// Framebuffer object handle type shared across backends
pub type Framebuffer = <glow::Context as glow::HasContext>::Framebuffer;

/// Contract between the rendering context and a platform backend
///
/// A backend owns the native GL context handle and the platform machinery to
/// negotiate surfaces for it. Surfaces are opaque tokens owned by the swap
/// chains of the rendering context; the backend hands them out in
/// [`connect`](Self::connect)/[`acquire`](Self::acquire) and takes them back
/// in [`release`](Self::release).
pub trait SurfaceBackend: Sized {
    /// Opaque token for one presentable surface
    type Surface;

    /// Negotiate a pixel format, create the native context, and create the
    /// primary surface described by `desc`.
    ///
    /// # Errors
    /// Fails with [`crate::ContextError::Negotiation`] when no compatible
    /// format or context can be created; no partial state survives.
    fn connect(desc: &ContextDescriptor) -> ContextResult<(Self, Self::Surface)>;

    /// Adopt a context/surface pair created by the hosting environment
    ///
    /// The adopted native handles are treated as borrowed throughout.
    ///
    /// # Errors
    /// Fails when the foreign handles are unusable on this backend.
    fn adopt(import: ImportDescriptor) -> ContextResult<(Self, Self::Surface)>;

    /// Bind an additional native window as a presentable surface
    ///
    /// # Errors
    /// Fails with [`crate::ContextError::IncompatibleSurface`] when the
    /// window cannot share the context's format; the context is unaffected.
    fn acquire(&mut self, window: RawWindowHandle, width: u32, height: u32) -> ContextResult<Self::Surface>;

    /// Release a surface token and the resources behind it
    fn release(&mut self, surface: Self::Surface);

    /// Bind the native context to the calling thread with `surface` as the
    /// target of subsequent draws
    ///
    /// # Errors
    /// Fails when the platform rejects the binding.
    fn make_current(&mut self, surface: &Self::Surface) -> ContextResult<()>;

    /// Present the surface to its native window
    ///
    /// # Errors
    /// Fails when the platform present call fails.
    fn present(&mut self, surface: &Self::Surface) -> ContextResult<()>;

    /// Apply new dimensions and reset flags to a surface
    ///
    /// Reallocates backing renderbuffers where the backend composites
    /// through an intermediate framebuffer.
    ///
    /// # Errors
    /// Fails when backing resources cannot be reallocated.
    fn resize(&mut self, surface: &mut Self::Surface, width: u32, height: u32, flags: ResetFlags) -> ContextResult<()>;

    /// Framebuffer object backing the surface's color target, where the
    /// backend composites into an intermediate framebuffer (`None` means the
    /// default framebuffer)
    fn backbuffer_fbo(&self, surface: &Self::Surface) -> Option<Framebuffer>;

    /// Feature/extension identifiers reported by the driver
    fn reported_features(&self) -> Vec<String>;

    /// Which API dialect was negotiated
    fn dialect(&self) -> ApiDialect;

    /// Tear down the backend
    ///
    /// With [`HandleOwnership::Borrowed`] only layer-owned auxiliary
    /// resources are released; the native context handle is left untouched.
    fn disconnect(self, ownership: HandleOwnership);
}

#[cfg(feature = "headless")]
pub use headless::HeadlessBackend as ActiveBackend;

#[cfg(all(not(feature = "headless"), target_arch = "wasm32"))]
pub use web::WebBackend as ActiveBackend;

#[cfg(all(not(feature = "headless"), windows))]
pub use wgl::WglBackend as ActiveBackend;

#[cfg(all(not(feature = "headless"), unix, not(target_arch = "wasm32"), feature = "x11"))]
pub use glx::GlxBackend as ActiveBackend;

#[cfg(all(not(feature = "headless"), unix, not(target_arch = "wasm32"), not(feature = "x11")))]
pub use egl::EglBackend as ActiveBackend;

#[cfg(all(
    not(feature = "headless"),
    not(target_arch = "wasm32"),
    not(windows),
    not(unix)
))]
compile_error!("no rendering context backend for this target; enable the `headless` feature");
