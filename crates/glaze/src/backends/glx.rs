//! GLX surface backend
//!
//! X11 desktop windowing. Pixel formats are negotiated by enumerating GLX
//! FBConfigs with the same MSAA relaxation loop as the EGL backend; windows
//! provided by the caller are used directly as drawables, offscreen contexts
//! get a pbuffer. libX11 and libGL are loaded at runtime through `x11-dl`,
//! so nothing links at build time.

use std::ffi::{c_void, CString};
use std::os::raw::c_int;
use std::ptr;

use glow::HasContext;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use x11_dl::glx::{self, Glx, GLXContext, GLXDrawable, GLXFBConfig};
use x11_dl::xlib::{self, Xlib};

use crate::config::{ApiDialect, ContextDescriptor, HandleOwnership, ImportDescriptor, ResetFlags};
use crate::error::{ContextError, ContextResult};

use super::msaa_fbo::MsaaBackBuffer;
use super::{Framebuffer, SurfaceBackend};

type SwapIntervalExt = unsafe extern "C" fn(*mut xlib::Display, GLXDrawable, c_int);
type SwapIntervalMesa = unsafe extern "C" fn(c_int) -> c_int;

/// Surface token of the GLX backend
pub struct GlxSurface {
    drawable: GLXDrawable,
    msaa: Option<MsaaBackBuffer>,
    /// Offscreen pbuffers are owned by this layer and recreated on resize;
    /// window drawables belong to the windowing collaborator.
    pbuffer: bool,
    external: bool,
}

/// GLX-backed rendering context
pub struct GlxBackend {
    xlib: Xlib,
    glx: Glx,
    display: *mut xlib::Display,
    /// Display connection opened by this layer rather than the caller
    owns_display: bool,
    context: GLXContext,
    fbconfig: Option<GLXFBConfig>,
    config_samples: u32,
    swap_interval_ext: Option<SwapIntervalExt>,
    swap_interval_mesa: Option<SwapIntervalMesa>,
    gl: Option<glow::Context>,
    dialect: ApiDialect,
}

impl GlxBackend {
    fn open_libs() -> ContextResult<(Xlib, Glx)> {
        let xlib = Xlib::open()
            .map_err(|e| ContextError::Negotiation(format!("cannot load libX11: {e}")))?;
        let glx = Glx::open()
            .map_err(|e| ContextError::Negotiation(format!("cannot load libGL: {e}")))?;
        Ok((xlib, glx))
    }

    fn proc_address(&self, name: &str) -> *const c_void {
        let Ok(cname) = CString::new(name) else {
            return ptr::null();
        };
        unsafe { (self.glx.glXGetProcAddress)(cname.as_ptr().cast()) }
            .map_or(ptr::null(), |p| p as *const c_void)
    }

    fn load_gl(&self) -> glow::Context {
        unsafe { glow::Context::from_loader_function(|name| self.proc_address(name)) }
    }

    /// Enumerate FBConfigs, relaxing MSAA until the server offers one
    fn choose_fbconfig(
        xlib: &Xlib,
        glx: &Glx,
        display: *mut xlib::Display,
        screen: c_int,
        windowed: bool,
        msaa: u32,
    ) -> ContextResult<(GLXFBConfig, u32)> {
        let mut samples = msaa.max(1);
        loop {
            let attribs = [
                glx::GLX_X_RENDERABLE,
                xlib::True,
                glx::GLX_DRAWABLE_TYPE,
                if windowed { glx::GLX_WINDOW_BIT } else { glx::GLX_PBUFFER_BIT },
                glx::GLX_RENDER_TYPE,
                glx::GLX_RGBA_BIT,
                glx::GLX_RED_SIZE,
                8,
                glx::GLX_GREEN_SIZE,
                8,
                glx::GLX_BLUE_SIZE,
                8,
                glx::GLX_DEPTH_SIZE,
                24,
                glx::GLX_STENCIL_SIZE,
                8,
                glx::GLX_DOUBLEBUFFER,
                xlib::True,
                glx::GLX_SAMPLE_BUFFERS,
                c_int::from(samples > 1),
                glx::GLX_SAMPLES,
                if samples > 1 { samples as c_int } else { 0 },
                0,
            ];

            let mut count = 0;
            let configs = unsafe { (glx.glXChooseFBConfig)(display, screen, attribs.as_ptr(), &mut count) };
            if !configs.is_null() && count > 0 {
                let config = unsafe { *configs };
                unsafe {
                    (xlib.XFree)(configs.cast());
                }
                return Ok((config, samples));
            }
            if !configs.is_null() {
                unsafe {
                    (xlib.XFree)(configs.cast());
                }
            }
            if samples > 1 {
                log::warn!("GLX FBConfig with {samples}x MSAA unavailable, relaxing");
                samples /= 2;
            } else {
                return Err(ContextError::Negotiation(
                    "no compatible GLX FBConfig for the requested surface format".to_string(),
                ));
            }
        }
    }

    fn create_pbuffer(&self, width: u32, height: u32) -> ContextResult<GLXDrawable> {
        let config = self
            .fbconfig
            .ok_or_else(|| ContextError::Platform("adopted context has no GLX FBConfig".to_string()))?;
        let attribs = [
            glx::GLX_PBUFFER_WIDTH,
            width as c_int,
            glx::GLX_PBUFFER_HEIGHT,
            height as c_int,
            0,
        ];
        let pbuffer = unsafe { (self.glx.glXCreatePbuffer)(self.display, config, attribs.as_ptr()) };
        if pbuffer == 0 {
            return Err(ContextError::Platform("glXCreatePbuffer failed".to_string()));
        }
        Ok(pbuffer)
    }

    fn bind(&self, drawable: GLXDrawable) -> ContextResult<()> {
        let ok = unsafe { (self.glx.glXMakeCurrent)(self.display, drawable, self.context) };
        if ok == xlib::False {
            return Err(ContextError::Platform("glXMakeCurrent failed".to_string()));
        }
        Ok(())
    }

    fn apply_swap_interval(&self, drawable: GLXDrawable, interval: c_int) {
        if let Some(ext) = self.swap_interval_ext {
            unsafe { ext(self.display, drawable, interval) };
        } else if let Some(mesa) = self.swap_interval_mesa {
            unsafe {
                mesa(interval);
            }
        } else {
            log::debug!("no GLX swap interval extension available");
        }
    }
}

impl SurfaceBackend for GlxBackend {
    type Surface = GlxSurface;

    fn connect(desc: &ContextDescriptor) -> ContextResult<(Self, Self::Surface)> {
        let (xlib, glx) = Self::open_libs()?;

        let (display, owns_display, screen) = match desc.display {
            Some(RawDisplayHandle::Xlib(handle)) if !handle.display.is_null() => {
                (handle.display.cast::<xlib::Display>(), false, handle.screen)
            }
            _ => {
                let display = unsafe { (xlib.XOpenDisplay)(ptr::null()) };
                if display.is_null() {
                    return Err(ContextError::Negotiation("cannot open X display".to_string()));
                }
                let screen = unsafe { (xlib.XDefaultScreen)(display) };
                (display, true, screen)
            }
        };

        let (mut major, mut minor) = (0, 0);
        unsafe {
            (glx.glXQueryVersion)(display, &mut major, &mut minor);
        }
        if major < 1 || (major == 1 && minor < 3) {
            return Err(ContextError::Negotiation(format!(
                "GLX {major}.{minor} is too old, 1.3 is required"
            )));
        }
        log::info!("GLX {major}.{minor} on screen {screen}");

        let windowed = desc.window.is_some();
        let (fbconfig, config_samples) =
            Self::choose_fbconfig(&xlib, &glx, display, screen, windowed, desc.config.msaa)?;

        let context = unsafe {
            (glx.glXCreateNewContext)(display, fbconfig, glx::GLX_RGBA_TYPE, ptr::null_mut(), xlib::True)
        };
        if context.is_null() {
            return Err(ContextError::Negotiation("glXCreateNewContext failed".to_string()));
        }

        let mut backend = Self {
            xlib,
            glx,
            display,
            owns_display,
            context,
            fbconfig: Some(fbconfig),
            config_samples,
            swap_interval_ext: None,
            swap_interval_mesa: None,
            gl: None,
            dialect: ApiDialect::OpenGl { major: 2, minor: 1 },
        };

        let (drawable, pbuffer) = match desc.window {
            Some(window) => (window_drawable(window)?, false),
            None => (backend.create_pbuffer(desc.config.width, desc.config.height)?, true),
        };
        backend.bind(drawable)?;

        let ext = backend.proc_address("glXSwapIntervalEXT");
        if !ext.is_null() {
            backend.swap_interval_ext = Some(unsafe { std::mem::transmute::<*const c_void, SwapIntervalExt>(ext) });
        }
        let mesa = backend.proc_address("glXSwapIntervalMESA");
        if !mesa.is_null() {
            backend.swap_interval_mesa =
                Some(unsafe { std::mem::transmute::<*const c_void, SwapIntervalMesa>(mesa) });
        }
        backend.apply_swap_interval(drawable, c_int::from(desc.config.vsync));

        let gl = backend.load_gl();
        let version = gl.version();
        backend.dialect = ApiDialect::OpenGl {
            major: version.major as u8,
            minor: version.minor as u8,
        };
        log::info!(
            "OpenGL {}.{} context created ({}x MSAA)",
            version.major,
            version.minor,
            config_samples.max(1)
        );
        backend.gl = Some(gl);

        let surface = GlxSurface {
            drawable,
            msaa: None,
            pbuffer,
            external: false,
        };
        Ok((backend, surface))
    }

    fn adopt(import: ImportDescriptor) -> ContextResult<(Self, Self::Surface)> {
        if import.context.is_null() || import.display.is_null() {
            return Err(ContextError::Negotiation(
                "imported GLX context/display handles are null".to_string(),
            ));
        }

        let (xlib, glx) = Self::open_libs()?;
        let display = import.display.cast::<xlib::Display>();
        let context = import.context as GLXContext;
        let drawable = import.surface as GLXDrawable;

        let mut backend = Self {
            xlib,
            glx,
            display,
            owns_display: false,
            context,
            fbconfig: None,
            config_samples: 1,
            swap_interval_ext: None,
            swap_interval_mesa: None,
            gl: None,
            dialect: import.dialect,
        };
        backend
            .bind(drawable)
            .map_err(|_| ContextError::Negotiation("imported GLX context rejected".to_string()))?;
        backend.gl = Some(backend.load_gl());

        let surface = GlxSurface {
            drawable,
            msaa: None,
            pbuffer: false,
            external: true,
        };
        Ok((backend, surface))
    }

    fn acquire(&mut self, window: RawWindowHandle, _width: u32, _height: u32) -> ContextResult<Self::Surface> {
        let drawable = window_drawable(window)
            .map_err(|_| ContextError::IncompatibleSurface("GLX requires an Xlib window handle".to_string()))?;
        Ok(GlxSurface {
            drawable,
            msaa: None,
            pbuffer: false,
            external: false,
        })
    }

    fn release(&mut self, surface: Self::Surface) {
        if let Some(msaa) = surface.msaa {
            if let Some(gl) = &self.gl {
                let _ = self.bind(surface.drawable);
                msaa.destroy(gl);
            }
        }
        if surface.pbuffer && !surface.external {
            unsafe {
                (self.glx.glXDestroyPbuffer)(self.display, surface.drawable);
            }
        }
    }

    fn make_current(&mut self, surface: &Self::Surface) -> ContextResult<()> {
        self.bind(surface.drawable)
    }

    fn present(&mut self, surface: &Self::Surface) -> ContextResult<()> {
        if let Some(msaa) = &surface.msaa {
            self.bind(surface.drawable)?;
            if let Some(gl) = &self.gl {
                msaa.resolve_to_default(gl);
            }
        }
        unsafe {
            (self.glx.glXSwapBuffers)(self.display, surface.drawable);
        }
        Ok(())
    }

    fn resize(&mut self, surface: &mut Self::Surface, width: u32, height: u32, flags: ResetFlags) -> ContextResult<()> {
        self.apply_swap_interval(surface.drawable, c_int::from(flags.contains(ResetFlags::VSYNC)));

        // X windows resize with the window; pbuffers are recreated
        if surface.pbuffer {
            let new_drawable = self.create_pbuffer(width, height)?;
            let _ = self.bind(new_drawable);
            unsafe {
                (self.glx.glXDestroyPbuffer)(self.display, surface.drawable);
            }
            surface.drawable = new_drawable;
        }

        let samples = flags.msaa_samples();
        if samples > self.config_samples.max(1) {
            self.bind(surface.drawable)?;
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
            (self.glx.glXMakeCurrent)(self.display, 0, ptr::null_mut());
        }
        drop(self.gl);
        if ownership == HandleOwnership::Owned {
            unsafe {
                (self.glx.glXDestroyContext)(self.display, self.context);
            }
        }
        if self.owns_display {
            unsafe {
                (self.xlib.XCloseDisplay)(self.display);
            }
        }
    }
}

fn window_drawable(window: RawWindowHandle) -> ContextResult<GLXDrawable> {
    match window {
        RawWindowHandle::Xlib(handle) => Ok(handle.window as GLXDrawable),
        _ => Err(ContextError::UnsupportedHandle("GLX accepts Xlib window handles")),
    }
}
