//! EGL surface backend
//!
//! Covers embedded and mobile windowing (Android, Wayland, and X11 through
//! the EGL platform layer). Pixel formats are negotiated by enumerating EGL
//! configs, relaxing the MSAA request step by step until the driver accepts
//! one; the context client version falls back from GLES 3 to GLES 2 the same
//! way. libEGL is loaded dynamically so nothing links at build time.

use std::ffi::c_void;

use glow::HasContext;
use khronos_egl as egl;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::config::{ApiDialect, ContextDescriptor, HandleOwnership, ImportDescriptor, ResetFlags};
use crate::error::{ContextError, ContextResult};

use super::msaa_fbo::MsaaBackBuffer;
use super::{Framebuffer, SurfaceBackend};

type EglInstance = egl::DynamicInstance<egl::EGL1_4>;

/// Surface token of the EGL backend
pub struct EglSurface {
    surface: egl::Surface,
    msaa: Option<MsaaBackBuffer>,
    /// Offscreen pbuffer surfaces are fixed-size and recreated on resize
    pbuffer: bool,
    /// Adopted from the host; never destroyed here
    external: bool,
}

/// EGL-backed rendering context
pub struct EglBackend {
    egl: EglInstance,
    display: egl::Display,
    context: egl::Context,
    /// Config used for the primary surface; secondary surfaces share it.
    /// Adopted contexts have none, so they cannot grow new swap chains.
    config: Option<egl::Config>,
    /// Sample count the negotiated config provides natively
    config_samples: u32,
    gl: Option<glow::Context>,
    dialect: ApiDialect,
}

impl EglBackend {
    fn load() -> ContextResult<EglInstance> {
        unsafe { EglInstance::load_required() }
            .map_err(|e| ContextError::Negotiation(format!("cannot load libEGL: {e:?}")))
    }

    fn load_gl(egl: &EglInstance) -> glow::Context {
        unsafe {
            glow::Context::from_loader_function(|name| {
                egl.get_proc_address(name)
                    .map_or(std::ptr::null(), |p| p as *const c_void)
            })
        }
    }

    fn bind(&self, surface: egl::Surface) -> ContextResult<()> {
        unsafe {
            self.egl
                .make_current(self.display, Some(surface), Some(surface), Some(self.context))
        }
        .map_err(|e| ContextError::Platform(format!("eglMakeCurrent failed: {e:?}")))
    }

    /// Enumerate configs, relaxing MSAA until the driver accepts one
    fn choose_config(
        egl: &EglInstance,
        display: egl::Display,
        windowed: bool,
        msaa: u32,
    ) -> ContextResult<(egl::Config, u32)> {
        let mut samples = msaa.max(1);
        loop {
            let attribs = [
                egl::SURFACE_TYPE,
                if windowed { egl::WINDOW_BIT } else { egl::PBUFFER_BIT },
                egl::RENDERABLE_TYPE,
                egl::OPENGL_ES2_BIT,
                egl::RED_SIZE,
                8,
                egl::GREEN_SIZE,
                8,
                egl::BLUE_SIZE,
                8,
                egl::DEPTH_SIZE,
                24,
                egl::STENCIL_SIZE,
                8,
                egl::SAMPLE_BUFFERS,
                i32::from(samples > 1),
                egl::SAMPLES,
                if samples > 1 { samples as egl::Int } else { 0 },
                egl::NONE,
            ];

            match unsafe { egl.choose_first_config(display, &attribs) } {
                Ok(Some(config)) => return Ok((config, samples)),
                _ if samples > 1 => {
                    log::warn!("EGL config with {samples}x MSAA unavailable, relaxing");
                    samples /= 2;
                }
                Ok(None) => {
                    return Err(ContextError::Negotiation(
                        "no compatible EGL config for the requested surface format".to_string(),
                    ))
                }
                Err(e) => {
                    return Err(ContextError::Negotiation(format!("eglChooseConfig failed: {e:?}")));
                }
            }
        }
    }

    fn create_pbuffer(&self, width: u32, height: u32) -> ContextResult<egl::Surface> {
        let config = self
            .config
            .ok_or_else(|| ContextError::Platform("adopted context has no EGL config".to_string()))?;
        unsafe {
            self.egl
                .create_pbuffer_surface(self.display, config, &pbuffer_attribs(width, height))
        }
        .map_err(|e| ContextError::Platform(format!("eglCreatePbufferSurface failed: {e:?}")))
    }
}

impl SurfaceBackend for EglBackend {
    type Surface = EglSurface;

    fn connect(desc: &ContextDescriptor) -> ContextResult<(Self, Self::Surface)> {
        let egl = Self::load()?;

        let display = unsafe { egl.get_display(native_display_ptr(desc.display)) }
            .ok_or_else(|| ContextError::Negotiation("no EGL display available".to_string()))?;
        let (major, minor) = unsafe { egl.initialize(display) }
            .map_err(|e| ContextError::Negotiation(format!("eglInitialize failed: {e:?}")))?;
        log::info!("EGL {major}.{minor} initialized");

        let windowed = desc.window.is_some();
        let (config, config_samples) = Self::choose_config(&egl, display, windowed, desc.config.msaa)?;

        // Prefer a GLES 3 context, settle for GLES 2
        let attribs3 = [egl::CONTEXT_CLIENT_VERSION, 3, egl::NONE];
        let attribs2 = [egl::CONTEXT_CLIENT_VERSION, 2, egl::NONE];
        let (context, es_major) = match unsafe { egl.create_context(display, config, None, &attribs3) } {
            Ok(context) => (context, 3u8),
            Err(_) => {
                let context = unsafe { egl.create_context(display, config, None, &attribs2) }.map_err(|e| {
                    let _ = unsafe { egl.terminate(display) };
                    ContextError::Negotiation(format!("eglCreateContext failed: {e:?}"))
                })?;
                (context, 2u8)
            }
        };

        let (surface, pbuffer) = match desc.window {
            Some(window) => {
                let surface = unsafe {
                    egl.create_window_surface(display, config, native_window_ptr(window)?, None)
                }
                .map_err(|e| {
                    unsafe {
                        let _ = egl.destroy_context(display, context);
                        let _ = egl.terminate(display);
                    }
                    ContextError::Negotiation(format!("eglCreateWindowSurface failed: {e:?}"))
                })?;
                (surface, false)
            }
            None => {
                let surface = unsafe {
                    egl.create_pbuffer_surface(
                        display,
                        config,
                        &pbuffer_attribs(desc.config.width, desc.config.height),
                    )
                }
                .map_err(|e| {
                    unsafe {
                        let _ = egl.destroy_context(display, context);
                        let _ = egl.terminate(display);
                    }
                    ContextError::Negotiation(format!("eglCreatePbufferSurface failed: {e:?}"))
                })?;
                (surface, true)
            }
        };

        unsafe { egl.make_current(display, Some(surface), Some(surface), Some(context)) }
            .map_err(|e| ContextError::Platform(format!("eglMakeCurrent failed: {e:?}")))?;
        if let Err(e) = unsafe { egl.swap_interval(display, i32::from(desc.config.vsync)) } {
            log::warn!("eglSwapInterval failed: {e:?}");
        }

        let gl = Self::load_gl(&egl);
        log::info!("GLES {es_major} context created ({}x MSAA)", config_samples.max(1));

        let backend = Self {
            egl,
            display,
            context,
            config: Some(config),
            config_samples,
            gl: Some(gl),
            dialect: ApiDialect::OpenGlEs {
                major: es_major,
                minor: 0,
            },
        };
        let surface = EglSurface {
            surface,
            msaa: None,
            pbuffer,
            external: false,
        };
        Ok((backend, surface))
    }

    fn adopt(import: ImportDescriptor) -> ContextResult<(Self, Self::Surface)> {
        if import.context.is_null() || import.surface.is_null() {
            return Err(ContextError::Negotiation(
                "imported EGL context/surface handles are null".to_string(),
            ));
        }

        let egl = Self::load()?;
        let display = if import.display.is_null() {
            unsafe { egl.get_display(egl::DEFAULT_DISPLAY) }
                .ok_or_else(|| ContextError::Negotiation("no EGL display available".to_string()))?
        } else {
            unsafe { egl::Display::from_ptr(import.display) }
        };
        let context = unsafe { egl::Context::from_ptr(import.context) };
        let surface = unsafe { egl::Surface::from_ptr(import.surface) };

        unsafe { egl.make_current(display, Some(surface), Some(surface), Some(context)) }
            .map_err(|e| ContextError::Negotiation(format!("imported EGL context rejected: {e:?}")))?;
        let gl = Self::load_gl(&egl);

        let backend = Self {
            egl,
            display,
            context,
            config: None,
            config_samples: 1,
            gl: Some(gl),
            dialect: import.dialect,
        };
        let surface = EglSurface {
            surface,
            msaa: None,
            pbuffer: false,
            external: true,
        };
        Ok((backend, surface))
    }

    fn acquire(&mut self, window: RawWindowHandle, _width: u32, _height: u32) -> ContextResult<Self::Surface> {
        let config = self.config.ok_or_else(|| {
            ContextError::IncompatibleSurface("adopted context has no EGL config to share".to_string())
        })?;

        let surface = unsafe {
            self.egl
                .create_window_surface(self.display, config, native_window_ptr(window)?, None)
        }
        .map_err(|e| ContextError::IncompatibleSurface(format!("eglCreateWindowSurface failed: {e:?}")))?;

        Ok(EglSurface {
            surface,
            msaa: None,
            pbuffer: false,
            external: false,
        })
    }

    fn release(&mut self, surface: Self::Surface) {
        if let Some(msaa) = surface.msaa {
            // The backbuffer FBO needs the context current to be deleted
            if let Some(gl) = &self.gl {
                let _ = self.bind(surface.surface);
                msaa.destroy(gl);
            }
        }
        if !surface.external {
            if let Err(e) = unsafe { self.egl.destroy_surface(self.display, surface.surface) } {
                log::warn!("eglDestroySurface failed: {e:?}");
            }
        }
    }

    fn make_current(&mut self, surface: &Self::Surface) -> ContextResult<()> {
        self.bind(surface.surface)
    }

    fn present(&mut self, surface: &Self::Surface) -> ContextResult<()> {
        if let Some(msaa) = &surface.msaa {
            self.bind(surface.surface)?;
            if let Some(gl) = &self.gl {
                msaa.resolve_to_default(gl);
            }
        }
        unsafe { self.egl.swap_buffers(self.display, surface.surface) }
            .map_err(|e| ContextError::Platform(format!("eglSwapBuffers failed: {e:?}")))
    }

    fn resize(&mut self, surface: &mut Self::Surface, width: u32, height: u32, flags: ResetFlags) -> ContextResult<()> {
        let interval = i32::from(flags.contains(ResetFlags::VSYNC));
        if let Err(e) = unsafe { self.egl.swap_interval(self.display, interval) } {
            log::warn!("eglSwapInterval failed: {e:?}");
        }

        // Window surfaces track their window size; pbuffers are recreated
        if surface.pbuffer {
            let new_surface = self.create_pbuffer(width, height)?;
            let _ = self.bind(new_surface);
            if let Err(e) = unsafe { self.egl.destroy_surface(self.display, surface.surface) } {
                log::warn!("eglDestroySurface failed: {e:?}");
            }
            surface.surface = new_surface;
        }

        // The driver multisamples up to the config's sample count; anything
        // beyond that goes through the intermediate backbuffer.
        let samples = flags.msaa_samples();
        if samples > self.config_samples.max(1) {
            self.bind(surface.surface)?;
            if let Some(gl) = &self.gl {
                match surface.msaa.as_mut() {
                    Some(msaa) => msaa.resize(gl, width, height, samples),
                    None => surface.msaa = Some(MsaaBackBuffer::new(gl, width, height, samples)?),
                }
            }
        } else if let Some(msaa) = surface.msaa.take() {
            if let Some(gl) = &self.gl {
                msaa.destroy(gl);
            }
        }
        Ok(())
    }

    fn backbuffer_fbo(&self, surface: &Self::Surface) -> Option<Framebuffer> {
        surface.msaa.as_ref().map(MsaaBackBuffer::fbo)
    }

    fn reported_features(&self) -> Vec<String> {
        self.gl
            .as_ref()
            .map(|gl| gl.supported_extensions().iter().cloned().collect())
            .unwrap_or_default()
    }

    fn dialect(&self) -> ApiDialect {
        self.dialect
    }

    fn disconnect(self, ownership: HandleOwnership) {
        unsafe {
            let _ = self.egl.make_current(self.display, None, None, None);
        }
        drop(self.gl);
        if ownership == HandleOwnership::Owned {
            unsafe {
                if let Err(e) = self.egl.destroy_context(self.display, self.context) {
                    log::warn!("eglDestroyContext failed: {e:?}");
                }
                if let Err(e) = self.egl.terminate(self.display) {
                    log::warn!("eglTerminate failed: {e:?}");
                }
            }
        }
    }
}

fn pbuffer_attribs(width: u32, height: u32) -> [egl::Int; 5] {
    [
        egl::WIDTH,
        width as egl::Int,
        egl::HEIGHT,
        height as egl::Int,
        egl::NONE,
    ]
}

fn native_window_ptr(window: RawWindowHandle) -> ContextResult<egl::NativeWindowType> {
    match window {
        RawWindowHandle::Xlib(handle) => Ok(handle.window as egl::NativeWindowType),
        RawWindowHandle::Wayland(handle) => Ok(handle.surface.cast()),
        RawWindowHandle::AndroidNdk(handle) => Ok(handle.a_native_window.cast()),
        _ => Err(ContextError::UnsupportedHandle(
            "EGL accepts Xlib, Wayland, or Android window handles",
        )),
    }
}

fn native_display_ptr(display: Option<RawDisplayHandle>) -> egl::NativeDisplayType {
    match display {
        Some(RawDisplayHandle::Xlib(handle)) => handle.display.cast(),
        Some(RawDisplayHandle::Wayland(handle)) => handle.display.cast(),
        _ => egl::DEFAULT_DISPLAY,
    }
}
