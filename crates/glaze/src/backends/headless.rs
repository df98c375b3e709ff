//! Bookkeeping-only backend
//!
//! Implements the full [`SurfaceBackend`] contract without touching any GPU
//! or windowing API. Selected by the `headless` feature for servers and CI,
//! and instantiated directly by the lifecycle tests, where its operation
//! counters stand in for a mock driver: every acquire/release/present is
//! tallied, and the native-handle flag records whether teardown released the
//! context handle.

use std::cell::Cell;
use std::rc::Rc;

use raw_window_handle::RawWindowHandle;

use crate::config::{ApiDialect, ContextDescriptor, HandleOwnership, ImportDescriptor, ResetFlags};
use crate::error::{ContextError, ContextResult};

use super::{Framebuffer, SurfaceBackend};

/// Highest MSAA level the headless driver accepts; requests above it fail
/// negotiation the way an unsupported pixel format would on a real driver.
pub const MAX_SAMPLES: u32 = 16;

/// Fixed extension set the headless driver reports
const REPORTED_EXTENSIONS: &[&str] = &[
    "GL_ARB_multisample",
    "GL_EXT_framebuffer_blit",
    "GL_ARB_get_program_binary",
    "GL_ARB_timer_query",
    "GL_ARB_instanced_arrays",
];

/// Operation counters recorded by the headless backend
#[derive(Debug, Default)]
pub struct BackendStats {
    /// Surface tokens handed out, the primary included
    pub acquired: Cell<u32>,
    /// Surface tokens taken back
    pub released: Cell<u32>,
    /// Present calls
    pub presents: Cell<u32>,
    /// Make-current calls
    pub make_current_calls: Cell<u32>,
    /// Backing-buffer reallocations caused by resize
    pub reallocations: Cell<u32>,
    /// Whether teardown released the native context handle
    pub native_handle_released: Cell<bool>,
    /// Teardown calls
    pub disconnects: Cell<u32>,
    /// Whether the most recent present targeted the primary surface
    pub last_present_primary: Cell<Option<bool>>,
}

/// Surface token of the headless backend
#[derive(Debug)]
pub struct HeadlessSurface {
    width: u32,
    height: u32,
    samples: u32,
    primary: bool,
}

impl HeadlessSurface {
    /// Current width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Current height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Backend that records operations instead of performing them
#[derive(Debug)]
pub struct HeadlessBackend {
    dialect: ApiDialect,
    stats: Rc<BackendStats>,
}

impl HeadlessBackend {
    /// Shared handle to the operation counters
    ///
    /// The counters outlive the backend, so tests can assert on teardown
    /// behavior after the owning context was destroyed.
    #[must_use]
    pub fn stats(&self) -> Rc<BackendStats> {
        Rc::clone(&self.stats)
    }
}

impl SurfaceBackend for HeadlessBackend {
    type Surface = HeadlessSurface;

    fn connect(desc: &ContextDescriptor) -> ContextResult<(Self, Self::Surface)> {
        if desc.config.msaa > MAX_SAMPLES {
            return Err(ContextError::Negotiation(format!(
                "{}x MSAA exceeds the supported maximum of {MAX_SAMPLES}x",
                desc.config.msaa
            )));
        }

        let backend = Self {
            dialect: ApiDialect::OpenGl { major: 3, minor: 3 },
            stats: Rc::new(BackendStats::default()),
        };
        backend.stats.acquired.set(1);

        let surface = HeadlessSurface {
            width: desc.config.width,
            height: desc.config.height,
            samples: desc.config.msaa.max(1),
            primary: true,
        };
        Ok((backend, surface))
    }

    fn adopt(import: ImportDescriptor) -> ContextResult<(Self, Self::Surface)> {
        let backend = Self {
            dialect: import.dialect,
            stats: Rc::new(BackendStats::default()),
        };
        backend.stats.acquired.set(1);

        let surface = HeadlessSurface {
            width: import.width,
            height: import.height,
            samples: 1,
            primary: true,
        };
        Ok((backend, surface))
    }

    fn acquire(&mut self, _window: RawWindowHandle, width: u32, height: u32) -> ContextResult<Self::Surface> {
        self.stats.acquired.set(self.stats.acquired.get() + 1);
        Ok(HeadlessSurface {
            width,
            height,
            samples: 1,
            primary: false,
        })
    }

    fn release(&mut self, _surface: Self::Surface) {
        self.stats.released.set(self.stats.released.get() + 1);
    }

    fn make_current(&mut self, _surface: &Self::Surface) -> ContextResult<()> {
        self.stats.make_current_calls.set(self.stats.make_current_calls.get() + 1);
        Ok(())
    }

    fn present(&mut self, surface: &Self::Surface) -> ContextResult<()> {
        self.stats.presents.set(self.stats.presents.get() + 1);
        self.stats.last_present_primary.set(Some(surface.primary));
        Ok(())
    }

    fn resize(&mut self, surface: &mut Self::Surface, width: u32, height: u32, flags: ResetFlags) -> ContextResult<()> {
        let samples = flags.msaa_samples();
        if surface.width != width || surface.height != height || surface.samples != samples {
            self.stats.reallocations.set(self.stats.reallocations.get() + 1);
        }
        surface.width = width;
        surface.height = height;
        surface.samples = samples;
        Ok(())
    }

    fn backbuffer_fbo(&self, _surface: &Self::Surface) -> Option<Framebuffer> {
        None
    }

    fn reported_features(&self) -> Vec<String> {
        REPORTED_EXTENSIONS.iter().map(|s| (*s).to_string()).collect()
    }

    fn dialect(&self) -> ApiDialect {
        self.dialect
    }

    fn disconnect(self, ownership: HandleOwnership) {
        self.stats.disconnects.set(self.stats.disconnects.get() + 1);
        if ownership == HandleOwnership::Owned {
            self.stats.native_handle_released.set(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SurfaceConfig;

    fn descriptor(msaa: u32) -> ContextDescriptor {
        ContextDescriptor::windowless(SurfaceConfig {
            width: 800,
            height: 600,
            msaa,
            ..SurfaceConfig::default()
        })
    }

    #[test]
    fn connect_rejects_unsupported_msaa() {
        let result = HeadlessBackend::connect(&descriptor(32));
        assert!(matches!(result, Err(ContextError::Negotiation(_))));
    }

    #[test]
    fn acquire_and_release_are_tallied() {
        let (mut backend, primary) = HeadlessBackend::connect(&descriptor(1)).unwrap();
        let stats = backend.stats();
        let window = RawWindowHandle::Xlib(raw_window_handle::XlibWindowHandle::empty());

        let secondary = backend.acquire(window, 320, 240).unwrap();
        assert_eq!(stats.acquired.get(), 2);

        backend.release(secondary);
        backend.release(primary);
        assert_eq!(stats.released.get(), 2);

        backend.disconnect(HandleOwnership::Owned);
        assert!(stats.native_handle_released.get());
    }

    #[test]
    fn borrowed_disconnect_keeps_native_handle() {
        let import = ImportDescriptor {
            context: std::ptr::null_mut(),
            display: std::ptr::null_mut(),
            surface: std::ptr::null_mut(),
            dialect: ApiDialect::OpenGlEs { major: 2, minor: 0 },
            width: 640,
            height: 480,
        };
        let (mut backend, primary) = HeadlessBackend::adopt(import).unwrap();
        let stats = backend.stats();

        backend.release(primary);
        backend.disconnect(HandleOwnership::Borrowed);

        assert_eq!(stats.disconnects.get(), 1);
        assert!(!stats.native_handle_released.get());
    }
}
