//! # Glaze
//!
//! Platform-abstracted OpenGL context and swap chain management.
//!
//! ## Features
//!
//! - **One interface, four windowing APIs**: EGL (embedded/mobile), GLX
//!   (X11), WebGL2 (browser), and WGL (Windows) behind a single contract,
//!   selected at build time
//! - **Swap chains**: bind a context to any number of native windows and
//!   switch which one receives draws
//! - **Generation-checked handles**: stale swap chain references are
//!   detected instead of reaching freed GPU objects
//! - **Import**: adopt a context the hosting environment created, without
//!   ever releasing a handle this layer does not own
//! - **Normalized capabilities**: one bitmask abstracting driver extension
//!   strings across all backends
//! - **Headless backend**: the full lifecycle without a GPU, for servers and
//!   tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glaze::{Context, ContextDescriptor, ResetFlags, SurfaceConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut context = Context::create(&ContextDescriptor::windowless(SurfaceConfig::default()))?;
//!     assert!(context.is_valid());
//!
//!     context.make_current(None);
//!     // record and submit GPU commands here
//!     context.swap(None)?;
//!
//!     context.resize(1920, 1080, ResetFlags::VSYNC);
//!     context.destroy();
//!     Ok(())
//! }
//! ```
//!
//! Window and display handles come from the windowing collaborator as
//! [`raw_window_handle`] values; event loops and window creation are out of
//! scope for this crate.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod backends;
pub mod caps;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;

pub use backends::{ActiveBackend, Framebuffer, SurfaceBackend};
pub use caps::{CapabilityRegistry, Caps};
pub use config::{
    ApiDialect, Config, ConfigError, ContextDescriptor, HandleOwnership, ImportDescriptor,
    ResetFlags, SurfaceConfig,
};
pub use context::{Context, RenderingContext, SwapChainHandle};
pub use error::{ContextError, ContextResult};

/// Common imports for crate users
pub mod prelude {
    pub use crate::caps::Caps;
    pub use crate::config::{
        ApiDialect, ContextDescriptor, HandleOwnership, ImportDescriptor, ResetFlags, SurfaceConfig,
    };
    pub use crate::context::{Context, RenderingContext, SwapChainHandle};
    pub use crate::error::{ContextError, ContextResult};
}
