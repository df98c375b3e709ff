//! Swap chain handles and bookkeeping

use slotmap::new_key_type;

new_key_type! {
    /// Generation-checked handle to a swap chain
    ///
    /// Handles are arena keys (index + generation), so a handle kept around
    /// after `destroy_swap_chain` is detected as stale instead of reaching
    /// freed GPU resources.
    pub struct SwapChainHandle;
}

/// Bookkeeping for one presentable surface owned by the context
pub(crate) struct SwapChainSlot<S> {
    /// Backend surface token
    pub(crate) surface: S,
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// Whether `make_current` has targeted this chain at least once;
    /// presenting before that is a usage error
    pub(crate) bound_once: bool,
}
