//! Rendering context lifecycle
//!
//! [`RenderingContext`] owns the native GL context of its backend, the swap
//! chains presenting it, the "current" pointer selecting which chain receives
//! subsequent draws, and the capability bitmask computed at creation. The
//! state machine is deliberately small: `Uninitialized → Valid → Uninitialized`,
//! with creation failure leaving nothing behind. Programmer errors (operating
//! on an invalid context, double-destroying a chain, presenting a chain that
//! was never bound) panic rather than limp along on inconsistent GPU state;
//! the only locally recoverable failure is secondary swap chain creation.

mod lifecycle_tests;
mod swap_chain;

use std::marker::PhantomData;

use raw_window_handle::RawWindowHandle;
use slotmap::SlotMap;

pub use swap_chain::SwapChainHandle;
use swap_chain::SwapChainSlot;

use crate::backends::{ActiveBackend, Framebuffer, SurfaceBackend};
use crate::caps::{CapabilityRegistry, Caps};
use crate::config::{ApiDialect, ContextDescriptor, HandleOwnership, ImportDescriptor, ResetFlags};
use crate::error::{ContextError, ContextResult};

/// Rendering context backed by the platform backend of this build target
pub type Context = RenderingContext<ActiveBackend>;

/// One live binding to a GPU driver instance
///
/// Created by [`create`](Self::create) or [`import`](Self::import); destroyed
/// by [`destroy`](Self::destroy) or on drop. The primary swap chain is
/// created together with the context and lives exactly as long as it does;
/// secondary swap chains are created and destroyed explicitly and must all be
/// gone before `destroy`.
///
/// The type is `!Send`: the native context handle carries OS-level thread
/// affinity, so a context stays on the thread that made it current.
pub struct RenderingContext<B: SurfaceBackend> {
    /// `None` is the invalid state; every operation but `destroy` and
    /// `is_valid` requires `Some`
    backend: Option<B>,
    chains: SlotMap<SwapChainHandle, SwapChainSlot<B::Surface>>,
    primary: SwapChainHandle,
    current: SwapChainHandle,
    caps: Caps,
    dialect: ApiDialect,
    ownership: HandleOwnership,
    width: u32,
    height: u32,
    flags: ResetFlags,
    _thread_bound: PhantomData<*mut ()>,
}

impl<B: SurfaceBackend> RenderingContext<B> {
    /// Create a context and its primary swap chain
    ///
    /// Negotiates a surface format with the hosting windowing system, creates
    /// the native context, and computes the capability bitmask. Zero
    /// dimensions are clamped to 1.
    ///
    /// # Errors
    /// Returns [`ContextError::Negotiation`] or [`ContextError::Platform`]
    /// when no compatible format or context exists. GPU initialization
    /// failure is unrecoverable at this layer; no partially valid context is
    /// ever observable.
    pub fn create(desc: &ContextDescriptor) -> ContextResult<Self> {
        let mut desc = desc.clone();
        if desc.config.width == 0 || desc.config.height == 0 {
            log::warn!(
                "zero-size context request ({}x{}) clamped",
                desc.config.width,
                desc.config.height
            );
            desc.config.width = desc.config.width.max(1);
            desc.config.height = desc.config.height.max(1);
        }

        let (backend, surface) = B::connect(&desc)?;
        Ok(Self::assemble(
            backend,
            surface,
            desc.config.width,
            desc.config.height,
            desc.config.reset_flags(),
            HandleOwnership::Owned,
        ))
    }

    /// Adopt a context/surface pair created by the hosting environment
    ///
    /// The adopted context behaves exactly like a created one except that the
    /// native handle is marked [`HandleOwnership::Borrowed`]: `destroy`
    /// releases only this layer's auxiliary resources (framebuffers,
    /// renderbuffers), never the foreign handle.
    ///
    /// # Errors
    /// Returns [`ContextError::Negotiation`] when the foreign handles are
    /// unusable on this backend.
    pub fn import(import: ImportDescriptor) -> ContextResult<Self> {
        let width = import.width.max(1);
        let height = import.height.max(1);
        let (backend, surface) = B::adopt(import)?;
        Ok(Self::assemble(
            backend,
            surface,
            width,
            height,
            ResetFlags::default(),
            HandleOwnership::Borrowed,
        ))
    }

    fn assemble(
        backend: B,
        primary_surface: B::Surface,
        width: u32,
        height: u32,
        flags: ResetFlags,
        ownership: HandleOwnership,
    ) -> Self {
        let features = backend.reported_features();
        let caps = CapabilityRegistry::resolve(features.iter().map(String::as_str));
        let dialect = backend.dialect();

        let mut chains = SlotMap::with_key();
        // connect/adopt leave the primary surface current, so it counts as
        // bound from the start
        let primary = chains.insert(SwapChainSlot {
            surface: primary_surface,
            width,
            height,
            bound_once: true,
        });

        log::info!("rendering context ready: {width}x{height}, {dialect:?}, caps {caps:?}");
        Self {
            backend: Some(backend),
            chains,
            primary,
            current: primary,
            caps,
            dialect,
            ownership,
            width,
            height,
            flags,
            _thread_bound: PhantomData,
        }
    }

    /// Whether the context holds a live native handle
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.backend.is_some()
    }

    /// Destroy the context and its primary swap chain
    ///
    /// Idempotent when the context is already invalid. For an imported
    /// context the foreign native handle is left untouched.
    ///
    /// # Panics
    /// Panics when secondary swap chains are still alive; the caller owns
    /// their lifecycle and must destroy them first.
    pub fn destroy(&mut self) {
        if self.backend.is_none() {
            log::debug!("destroy called on an already invalid rendering context");
            return;
        }
        assert!(
            self.chains.len() <= 1,
            "destroying a rendering context with {} live secondary swap chain(s); destroy them first",
            self.chains.len() - 1
        );
        self.teardown();
    }

    /// Normalized capability bitmask, computed once at creation
    ///
    /// # Panics
    /// Panics when the context is invalid.
    #[must_use]
    pub fn caps(&self) -> Caps {
        assert!(self.is_valid(), "caps queried on an invalid rendering context");
        self.caps
    }

    /// Which GL dialect the context speaks
    ///
    /// # Panics
    /// Panics when the context is invalid.
    #[must_use]
    pub fn dialect(&self) -> ApiDialect {
        assert!(self.is_valid(), "dialect queried on an invalid rendering context");
        self.dialect
    }

    /// Whether the native handle is owned or adopted
    #[must_use]
    pub fn ownership(&self) -> HandleOwnership {
        self.ownership
    }

    /// Current primary swap chain dimensions
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Handle of the primary swap chain
    ///
    /// # Panics
    /// Panics when the context is invalid.
    #[must_use]
    pub fn primary_swap_chain(&self) -> SwapChainHandle {
        assert!(self.is_valid(), "primary_swap_chain queried on an invalid rendering context");
        self.primary
    }

    /// Dimensions of a swap chain, `None` meaning the primary
    ///
    /// Returns `None` for stale handles.
    #[must_use]
    pub fn swap_chain_size(&self, chain: Option<SwapChainHandle>) -> Option<(u32, u32)> {
        let key = chain.unwrap_or(self.primary);
        self.chains.get(key).map(|slot| (slot.width, slot.height))
    }

    /// Borrow the backend, e.g. for backend-specific queries
    #[must_use]
    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    /// Resize the primary swap chain and apply new reset flags
    ///
    /// A no-op when dimensions and flags are both unchanged, so callers can
    /// forward window events without churning GPU resources. Zero dimensions
    /// are clamped to 1 and logged. Backend failures are logged, never fatal.
    ///
    /// # Panics
    /// Panics when the context is invalid.
    pub fn resize(&mut self, width: u32, height: u32, flags: ResetFlags) {
        let Some(backend) = self.backend.as_mut() else {
            panic!("resize called on an invalid rendering context");
        };

        let (mut width, mut height) = (width, height);
        if width == 0 || height == 0 {
            log::warn!("zero-size resize request ({width}x{height}) clamped");
            width = width.max(1);
            height = height.max(1);
        }
        if width == self.width && height == self.height && flags == self.flags {
            log::debug!("resize to {width}x{height} is a no-op");
            return;
        }

        let slot = self
            .chains
            .get_mut(self.primary)
            .expect("a valid context always holds its primary swap chain");
        match backend.resize(&mut slot.surface, width, height, flags) {
            Ok(()) => {
                slot.width = width;
                slot.height = height;
                self.width = width;
                self.height = height;
                self.flags = flags;
            }
            Err(e) => log::error!("resize to {width}x{height} failed: {e}"),
        }
    }

    /// Create an additional swap chain presenting to `window`
    ///
    /// The new chain shares the context's GPU resources. Failure is
    /// recoverable: the context is unaffected and remains valid.
    ///
    /// # Errors
    /// Returns [`ContextError::IncompatibleSurface`] when the window cannot
    /// share the context's surface format.
    ///
    /// # Panics
    /// Panics when the context is invalid.
    pub fn create_swap_chain(
        &mut self,
        window: RawWindowHandle,
        width: u32,
        height: u32,
    ) -> ContextResult<SwapChainHandle> {
        let Some(backend) = self.backend.as_mut() else {
            panic!("create_swap_chain called on an invalid rendering context");
        };
        let width = width.max(1);
        let height = height.max(1);

        let surface = match backend.acquire(window, width, height) {
            Ok(surface) => surface,
            Err(e) => {
                log::warn!("swap chain creation failed: {e}");
                return Err(e);
            }
        };
        Ok(self.chains.insert(SwapChainSlot {
            surface,
            width,
            height,
            bound_once: false,
        }))
    }

    /// Destroy a secondary swap chain
    ///
    /// When the destroyed chain is the current one, the current pointer falls
    /// back to the primary swap chain before any resources are released.
    ///
    /// # Panics
    /// Panics when the context is invalid, when `chain` is the primary (it is
    /// owned by the context lifecycle), or when `chain` is stale. A double
    /// destroy is a programmer error, not a recoverable condition.
    pub fn destroy_swap_chain(&mut self, chain: SwapChainHandle) {
        let Some(backend) = self.backend.as_mut() else {
            panic!("destroy_swap_chain called on an invalid rendering context");
        };
        assert!(
            chain != self.primary,
            "the primary swap chain is owned by the context lifecycle and cannot be destroyed directly"
        );
        let Some(slot) = self.chains.remove(chain) else {
            panic!("destroy_swap_chain called with a stale swap chain handle");
        };

        if self.current == chain {
            let primary = self
                .chains
                .get_mut(self.primary)
                .expect("a valid context always holds its primary swap chain");
            if let Err(e) = backend.make_current(&primary.surface) {
                log::error!("falling back to the primary swap chain failed: {e}");
            }
            primary.bound_once = true;
            self.current = self.primary;
        }
        backend.release(slot.surface);
    }

    /// Bind the context to the calling thread with `chain` as the target of
    /// subsequent draw and present calls (`None` means the primary)
    ///
    /// # Panics
    /// Panics when the context is invalid, when `chain` is stale (dangling
    /// GPU resources must not be reachable), or when the platform rejects the
    /// binding.
    pub fn make_current(&mut self, chain: Option<SwapChainHandle>) {
        let Some(backend) = self.backend.as_mut() else {
            panic!("make_current called on an invalid rendering context");
        };
        let key = chain.unwrap_or(self.primary);
        let Some(slot) = self.chains.get_mut(key) else {
            panic!("make_current called with a destroyed swap chain handle");
        };
        if let Err(e) = backend.make_current(&slot.surface) {
            panic!("make_current failed at the platform level: {e}");
        }
        slot.bound_once = true;
        self.current = key;
    }

    /// Present a swap chain to its native surface (`None` means the primary)
    ///
    /// # Errors
    /// Returns [`ContextError::StaleSwapChain`] (logged, otherwise a no-op)
    /// when the handle refers to a destroyed chain, or
    /// [`ContextError::Platform`] when the platform present call fails.
    ///
    /// # Panics
    /// Panics when the context is invalid or when the chain has never been
    /// targeted by [`make_current`](Self::make_current).
    pub fn swap(&mut self, chain: Option<SwapChainHandle>) -> ContextResult<()> {
        let Some(backend) = self.backend.as_mut() else {
            panic!("swap called on an invalid rendering context");
        };
        let key = chain.unwrap_or(self.primary);
        let Some(slot) = self.chains.get(key) else {
            log::error!("swap called with a destroyed swap chain handle");
            return Err(ContextError::StaleSwapChain);
        };
        assert!(
            slot.bound_once,
            "swap called on a swap chain that was never targeted by make_current"
        );
        backend.present(&slot.surface)
    }

    /// Framebuffer object backing the currently bound swap chain's color
    /// target, where the backend composites through an intermediate
    /// framebuffer (`None` means the default framebuffer)
    ///
    /// # Panics
    /// Panics when the context is invalid.
    #[must_use]
    pub fn backbuffer_fbo(&self) -> Option<Framebuffer> {
        let Some(backend) = self.backend.as_ref() else {
            panic!("backbuffer_fbo queried on an invalid rendering context");
        };
        let slot = self
            .chains
            .get(self.current)
            .expect("current always names a live swap chain");
        backend.backbuffer_fbo(&slot.surface)
    }

    /// Ordered teardown: secondaries, then the primary, then the native
    /// handle. Ownership is strictly tree-shaped, so this order is the only
    /// one that never leaves a dangling surface token.
    fn teardown(&mut self) {
        let Some(mut backend) = self.backend.take() else {
            return;
        };
        let secondaries: Vec<SwapChainHandle> =
            self.chains.keys().filter(|&key| key != self.primary).collect();
        for key in secondaries {
            if let Some(slot) = self.chains.remove(key) {
                backend.release(slot.surface);
            }
        }
        if let Some(primary) = self.chains.remove(self.primary) {
            backend.release(primary.surface);
        }
        backend.disconnect(self.ownership);
        log::info!("rendering context destroyed");
    }
}

impl<B: SurfaceBackend> Drop for RenderingContext<B> {
    fn drop(&mut self) {
        if self.backend.is_some() {
            let leaked = self.chains.len().saturating_sub(1);
            if leaked > 0 {
                log::warn!("rendering context dropped with {leaked} live secondary swap chain(s)");
            }
            self.teardown();
        }
    }
}
