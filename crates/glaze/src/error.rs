//! Context error types
//!
//! Error taxonomy for context and swap chain operations. Fatal negotiation
//! failures and recoverable surface failures are distinct variants so callers
//! can tell them apart without string matching.

use thiserror::Error;

/// Errors reported by context and swap chain operations
#[derive(Error, Debug)]
pub enum ContextError {
    /// Pixel format or context negotiation failed during creation.
    /// The context is left invalid; there is no degraded mode.
    #[error("context negotiation failed: {0}")]
    Negotiation(String),

    /// The underlying windowing or GL platform call failed
    #[error("platform error: {0}")]
    Platform(String),

    /// A secondary surface could not be bound to the context
    /// (e.g. wrong pixel format). The context itself remains valid.
    #[error("native surface is incompatible with the context: {0}")]
    IncompatibleSurface(String),

    /// The swap chain handle refers to a chain that was already destroyed
    #[error("swap chain handle is stale or destroyed")]
    StaleSwapChain,

    /// The native window handle variant is not usable on this backend
    #[error("unsupported native window handle: {0}")]
    UnsupportedHandle(&'static str),
}

/// Result type for context operations
pub type ContextResult<T> = Result<T, ContextError>;
