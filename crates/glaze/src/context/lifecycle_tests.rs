//! Tests for the rendering context lifecycle
//!
//! All tests run against the headless backend, whose operation counters act
//! as the mock driver: no GPU or window system is required to exercise the
//! full create/bind/present/destroy state machine.

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use raw_window_handle::{RawWindowHandle, XlibWindowHandle};

    use crate::backends::headless::{BackendStats, HeadlessBackend};
    use crate::caps::Caps;
    use crate::config::{
        ApiDialect, ContextDescriptor, HandleOwnership, ImportDescriptor, ResetFlags, SurfaceConfig,
    };
    use crate::context::RenderingContext;
    use crate::error::ContextError;

    type TestContext = RenderingContext<HeadlessBackend>;

    fn descriptor(width: u32, height: u32) -> ContextDescriptor {
        ContextDescriptor::windowless(SurfaceConfig {
            width,
            height,
            ..SurfaceConfig::default()
        })
    }

    fn window() -> RawWindowHandle {
        RawWindowHandle::Xlib(XlibWindowHandle::empty())
    }

    fn stats_of(context: &TestContext) -> Rc<BackendStats> {
        context.backend().expect("context is valid").stats()
    }

    fn import_descriptor() -> ImportDescriptor {
        ImportDescriptor {
            context: std::ptr::null_mut(),
            display: std::ptr::null_mut(),
            surface: std::ptr::null_mut(),
            dialect: ApiDialect::OpenGlEs { major: 2, minor: 0 },
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn create_reports_valid_with_stable_caps() {
        let context = TestContext::create(&descriptor(800, 600)).unwrap();
        assert!(context.is_valid());
        assert_eq!(context.size(), (800, 600));

        let caps = context.caps();
        assert!(!caps.is_empty());
        assert!(caps.contains(Caps::SWAP_CHAIN));
        // Repeated queries return the identical bitmask
        assert_eq!(context.caps(), caps);
        assert_eq!(context.caps(), caps);
    }

    #[test]
    fn failed_negotiation_reports_fatal_and_leaves_nothing() {
        let result = TestContext::create(&ContextDescriptor::windowless(SurfaceConfig {
            msaa: 32, // beyond what the driver negotiates
            ..SurfaceConfig::default()
        }));
        assert!(matches!(result, Err(ContextError::Negotiation(_))));
    }

    #[test]
    fn destroy_invalidates_and_is_idempotent() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        let stats = stats_of(&context);

        context.destroy();
        assert!(!context.is_valid());
        assert_eq!(stats.disconnects.get(), 1);
        assert!(stats.native_handle_released.get());

        // Second destroy is a no-op
        context.destroy();
        assert!(!context.is_valid());
        assert_eq!(stats.disconnects.get(), 1);
    }

    #[test]
    fn zero_size_create_is_clamped() {
        let context = TestContext::create(&descriptor(0, 0)).unwrap();
        assert_eq!(context.size(), (1, 1));
    }

    #[test]
    fn secondary_chains_are_independent() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        let s1 = context.create_swap_chain(window(), 320, 240).unwrap();
        let s2 = context.create_swap_chain(window(), 640, 480).unwrap();

        context.destroy_swap_chain(s1);
        assert!(context.is_valid());

        // S2 stays usable for make_current and swap
        context.make_current(Some(s2));
        context.swap(Some(s2)).unwrap();
        assert_eq!(context.swap_chain_size(Some(s2)), Some((640, 480)));

        context.destroy_swap_chain(s2);
        context.destroy();
    }

    #[test]
    fn destroying_bound_chain_falls_back_to_primary() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        let stats = stats_of(&context);
        let secondary = context.create_swap_chain(window(), 320, 240).unwrap();

        context.make_current(Some(secondary));
        context.destroy_swap_chain(secondary);

        // The current pointer fell back; swap(None) presents the primary
        context.swap(None).unwrap();
        assert_eq!(stats.last_present_primary.get(), Some(true));
        context.destroy();
    }

    #[test]
    fn swap_with_stale_handle_is_a_recoverable_error() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        let secondary = context.create_swap_chain(window(), 320, 240).unwrap();
        context.make_current(Some(secondary));
        context.destroy_swap_chain(secondary);

        assert!(matches!(context.swap(Some(secondary)), Err(ContextError::StaleSwapChain)));
        assert!(context.is_valid());
        context.destroy();
    }

    #[test]
    fn resize_is_idempotent_without_changes() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        let stats = stats_of(&context);
        let flags = SurfaceConfig::default().reset_flags();

        // Same dimensions and flags as creation: nothing reaches the backend
        context.resize(800, 600, flags);
        context.resize(800, 600, flags);
        assert_eq!(stats.reallocations.get(), 0);

        context.resize(1024, 768, flags);
        assert_eq!(stats.reallocations.get(), 1);
        assert_eq!(context.size(), (1024, 768));

        context.resize(1024, 768, flags);
        assert_eq!(stats.reallocations.get(), 1);

        // A flag change with unchanged dimensions still reaches the backend
        context.resize(1024, 768, flags | ResetFlags::MSAA_X4);
        assert_eq!(stats.reallocations.get(), 2);
    }

    #[test]
    fn zero_size_resize_is_clamped_not_fatal() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        context.resize(0, 600, ResetFlags::default());
        assert_eq!(context.size(), (1, 600));
        assert!(context.is_valid());
    }

    #[test]
    fn full_lifecycle_scenario() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        assert!(context.is_valid());
        let stats = stats_of(&context);

        let secondary = context.create_swap_chain(window(), 400, 300).unwrap();
        context.make_current(Some(secondary));
        context.swap(Some(secondary)).unwrap();
        assert_eq!(stats.presents.get(), 1);
        assert_eq!(stats.last_present_primary.get(), Some(false));

        context.destroy_swap_chain(secondary);
        context.destroy();
        assert!(!context.is_valid());

        // Primary + secondary both went through acquire/release
        assert_eq!(stats.acquired.get(), 2);
        assert_eq!(stats.released.get(), 2);
    }

    #[test]
    fn import_behaves_like_create_but_never_releases_the_handle() {
        let mut context = TestContext::import(import_descriptor()).unwrap();
        assert!(context.is_valid());
        assert_eq!(context.ownership(), HandleOwnership::Borrowed);
        assert_eq!(context.dialect(), ApiDialect::OpenGlEs { major: 2, minor: 0 });
        assert!(context.caps().contains(Caps::SWAP_CHAIN));
        let stats = stats_of(&context);

        context.make_current(None);
        context.swap(None).unwrap();

        context.destroy();
        assert!(!context.is_valid());
        // Auxiliary resources were released, the native handle was not
        assert_eq!(stats.released.get(), 1);
        assert_eq!(stats.disconnects.get(), 1);
        assert!(!stats.native_handle_released.get());
    }

    #[test]
    fn drop_releases_everything_in_order() {
        let stats;
        {
            let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
            stats = stats_of(&context);
            // Leaked on purpose; drop must still release it without panicking
            let _secondary = context.create_swap_chain(window(), 320, 240).unwrap();
        }
        assert_eq!(stats.released.get(), 2);
        assert_eq!(stats.disconnects.get(), 1);
    }

    #[test]
    fn backbuffer_fbo_defaults_to_the_window_framebuffer() {
        let context = TestContext::create(&descriptor(800, 600)).unwrap();
        assert_eq!(context.backbuffer_fbo(), None);
    }

    #[test]
    #[should_panic(expected = "live secondary swap chain")]
    fn destroy_with_live_secondaries_panics() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        let _secondary = context.create_swap_chain(window(), 320, 240).unwrap();
        context.destroy();
    }

    #[test]
    #[should_panic(expected = "destroyed swap chain handle")]
    fn make_current_with_stale_handle_panics() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        let secondary = context.create_swap_chain(window(), 320, 240).unwrap();
        context.destroy_swap_chain(secondary);
        context.make_current(Some(secondary));
    }

    #[test]
    #[should_panic(expected = "stale swap chain handle")]
    fn double_destroy_of_a_swap_chain_panics() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        let secondary = context.create_swap_chain(window(), 320, 240).unwrap();
        context.destroy_swap_chain(secondary);
        context.destroy_swap_chain(secondary);
    }

    #[test]
    #[should_panic(expected = "primary swap chain is owned by the context lifecycle")]
    fn destroying_the_primary_directly_panics() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        let primary = context.primary_swap_chain();
        context.destroy_swap_chain(primary);
    }

    #[test]
    #[should_panic(expected = "never targeted by make_current")]
    fn swap_before_make_current_panics() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        let secondary = context.create_swap_chain(window(), 320, 240).unwrap();
        let _ = context.swap(Some(secondary));
    }

    #[test]
    #[should_panic(expected = "invalid rendering context")]
    fn caps_on_an_invalid_context_panics() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        context.destroy();
        let _ = context.caps();
    }

    #[test]
    #[should_panic(expected = "invalid rendering context")]
    fn resize_on_an_invalid_context_panics() {
        let mut context = TestContext::create(&descriptor(800, 600)).unwrap();
        context.destroy();
        context.resize(100, 100, ResetFlags::default());
    }
}
