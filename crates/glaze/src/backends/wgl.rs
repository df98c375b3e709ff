//! WGL surface backend
//!
//! Desktop compositor windowing on Windows. Pixel formats are negotiated
//! through `ChoosePixelFormat` with a fixed RGBA8 + D24S8 descriptor;
//! secondary windows must accept the same descriptor or swap chain creation
//! fails recoverably. Core GL entry points come from opengl32.dll, extension
//! entry points from `wglGetProcAddress`.

use std::ffi::{c_void, CString};
use std::ptr;

use glow::HasContext;
use raw_window_handle::RawWindowHandle;
use winapi::shared::minwindef::HMODULE;
use winapi::shared::windef::{HDC, HGLRC, HWND};
use winapi::um::libloaderapi::{GetProcAddress, LoadLibraryA};
use winapi::um::wingdi::{
    wglCreateContext, wglDeleteContext, wglGetProcAddress, wglMakeCurrent, ChoosePixelFormat,
    SetPixelFormat, SwapBuffers, PFD_DOUBLEBUFFER, PFD_DRAW_TO_WINDOW, PFD_MAIN_PLANE,
    PFD_SUPPORT_OPENGL, PFD_TYPE_RGBA, PIXELFORMATDESCRIPTOR,
};
use winapi::um::winuser::{GetDC, ReleaseDC};

use crate::config::{ApiDialect, ContextDescriptor, HandleOwnership, ImportDescriptor, ResetFlags};
use crate::error::{ContextError, ContextResult};

use super::msaa_fbo::MsaaBackBuffer;
use super::{Framebuffer, SurfaceBackend};

type SwapIntervalExt = unsafe extern "system" fn(i32) -> i32;

/// Surface token of the WGL backend
pub struct WglSurface {
    hwnd: HWND,
    hdc: HDC,
    msaa: Option<MsaaBackBuffer>,
    external: bool,
}

/// WGL-backed rendering context
pub struct WglBackend {
    context: HGLRC,
    opengl32: HMODULE,
    swap_interval_ext: Option<SwapIntervalExt>,
    /// WGL always presents the window-system backbuffer directly; MSAA goes
    /// through the intermediate framebuffer.
    config_samples: u32,
    gl: Option<glow::Context>,
    dialect: ApiDialect,
}

impl WglBackend {
    fn descriptor() -> PIXELFORMATDESCRIPTOR {
        let mut pfd: PIXELFORMATDESCRIPTOR = unsafe { std::mem::zeroed() };
        pfd.nSize = std::mem::size_of::<PIXELFORMATDESCRIPTOR>() as u16;
        pfd.nVersion = 1;
        pfd.dwFlags = PFD_DRAW_TO_WINDOW | PFD_SUPPORT_OPENGL | PFD_DOUBLEBUFFER;
        pfd.iPixelType = PFD_TYPE_RGBA;
        pfd.cColorBits = 32;
        pfd.cDepthBits = 24;
        pfd.cStencilBits = 8;
        pfd.iLayerType = PFD_MAIN_PLANE;
        pfd
    }

    /// Apply the shared pixel format to a window's device context
    fn setup_dc(hwnd: HWND) -> ContextResult<HDC> {
        let hdc = unsafe { GetDC(hwnd) };
        if hdc.is_null() {
            return Err(ContextError::Platform("GetDC failed".to_string()));
        }
        let pfd = Self::descriptor();
        let format = unsafe { ChoosePixelFormat(hdc, &pfd) };
        if format == 0 || unsafe { SetPixelFormat(hdc, format, &pfd) } == 0 {
            unsafe {
                ReleaseDC(hwnd, hdc);
            }
            return Err(ContextError::Negotiation(
                "no compatible pixel format for the window".to_string(),
            ));
        }
        Ok(hdc)
    }

    fn proc_address(&self, name: &str) -> *const c_void {
        let Ok(cname) = CString::new(name) else {
            return ptr::null();
        };
        let p = unsafe { wglGetProcAddress(cname.as_ptr()) };
        if !p.is_null() {
            return p.cast();
        }
        unsafe { GetProcAddress(self.opengl32, cname.as_ptr()) }.cast()
    }

    fn load_gl(&self) -> glow::Context {
        unsafe { glow::Context::from_loader_function(|name| self.proc_address(name)) }
    }

    fn bind(&self, hdc: HDC) -> ContextResult<()> {
        if unsafe { wglMakeCurrent(hdc, self.context) } == 0 {
            return Err(ContextError::Platform("wglMakeCurrent failed".to_string()));
        }
        Ok(())
    }
}

impl SurfaceBackend for WglBackend {
    type Surface = WglSurface;

    fn connect(desc: &ContextDescriptor) -> ContextResult<(Self, Self::Surface)> {
        let Some(window) = desc.window else {
            return Err(ContextError::Negotiation(
                "a native window is required for WGL contexts".to_string(),
            ));
        };
        let hwnd = window_hwnd(window)?;
        let hdc = Self::setup_dc(hwnd)?;

        let context = unsafe { wglCreateContext(hdc) };
        if context.is_null() {
            unsafe {
                ReleaseDC(hwnd, hdc);
            }
            return Err(ContextError::Negotiation("wglCreateContext failed".to_string()));
        }

        let opengl32 = unsafe { LoadLibraryA(b"opengl32.dll\0".as_ptr().cast()) };
        let mut backend = Self {
            context,
            opengl32,
            swap_interval_ext: None,
            config_samples: 1,
            gl: None,
            dialect: ApiDialect::OpenGl { major: 2, minor: 1 },
        };
        backend.bind(hdc)?;

        let ext = backend.proc_address("wglSwapIntervalEXT");
        if !ext.is_null() {
            backend.swap_interval_ext =
                Some(unsafe { std::mem::transmute::<*const c_void, SwapIntervalExt>(ext) });
        }
        if let Some(swap_interval) = backend.swap_interval_ext {
            unsafe {
                swap_interval(i32::from(desc.config.vsync));
            }
        }

        let gl = backend.load_gl();
        let version = gl.version();
        backend.dialect = ApiDialect::OpenGl {
            major: version.major as u8,
            minor: version.minor as u8,
        };
        log::info!("OpenGL {}.{} context created", version.major, version.minor);
        backend.gl = Some(gl);

        let mut surface = WglSurface {
            hwnd,
            hdc,
            msaa: None,
            external: false,
        };

        // The fixed descriptor is single-sampled; MSAA always goes through
        // the intermediate backbuffer here.
        let samples = desc.config.msaa.max(1);
        if samples > 1 {
            if let Some(gl) = &backend.gl {
                surface.msaa = Some(MsaaBackBuffer::new(gl, desc.config.width, desc.config.height, samples)?);
            }
        }
        Ok((backend, surface))
    }

    fn adopt(import: ImportDescriptor) -> ContextResult<(Self, Self::Surface)> {
        if import.context.is_null() || import.surface.is_null() {
            return Err(ContextError::Negotiation(
                "imported WGL context/device handles are null".to_string(),
            ));
        }
        let context = import.context as HGLRC;
        let hdc = import.surface as HDC;

        let opengl32 = unsafe { LoadLibraryA(b"opengl32.dll\0".as_ptr().cast()) };
        let mut backend = Self {
            context,
            opengl32,
            swap_interval_ext: None,
            config_samples: 1,
            gl: None,
            dialect: import.dialect,
        };
        backend
            .bind(hdc)
            .map_err(|_| ContextError::Negotiation("imported WGL context rejected".to_string()))?;
        backend.gl = Some(backend.load_gl());

        let surface = WglSurface {
            hwnd: ptr::null_mut(),
            hdc,
            msaa: None,
            external: true,
        };
        Ok((backend, surface))
    }

    fn acquire(&mut self, window: RawWindowHandle, _width: u32, _height: u32) -> ContextResult<Self::Surface> {
        let hwnd = window_hwnd(window)
            .map_err(|_| ContextError::IncompatibleSurface("WGL requires a Win32 window handle".to_string()))?;
        let hdc = Self::setup_dc(hwnd)
            .map_err(|e| ContextError::IncompatibleSurface(format!("window rejects the shared pixel format: {e}")))?;
        Ok(WglSurface {
            hwnd,
            hdc,
            msaa: None,
            external: false,
        })
    }

    fn release(&mut self, surface: Self::Surface) {
        if let Some(msaa) = surface.msaa {
            if let Some(gl) = &self.gl {
                let _ = self.bind(surface.hdc);
                msaa.destroy(gl);
            }
        }
        if !surface.external {
            unsafe {
                ReleaseDC(surface.hwnd, surface.hdc);
            }
        }
    }

    fn make_current(&mut self, surface: &Self::Surface) -> ContextResult<()> {
        self.bind(surface.hdc)
    }

    fn present(&mut self, surface: &Self::Surface) -> ContextResult<()> {
        if let Some(msaa) = &surface.msaa {
            self.bind(surface.hdc)?;
            if let Some(gl) = &self.gl {
                msaa.resolve_to_default(gl);
            }
        }
        if unsafe { SwapBuffers(surface.hdc) } == 0 {
            return Err(ContextError::Platform("SwapBuffers failed".to_string()));
        }
        Ok(())
    }

    fn resize(&mut self, surface: &mut Self::Surface, width: u32, height: u32, flags: ResetFlags) -> ContextResult<()> {
        if let Some(swap_interval) = self.swap_interval_ext {
            unsafe {
                swap_interval(i32::from(flags.contains(ResetFlags::VSYNC)));
            }
        }
        let samples = flags.msaa_samples();
        if samples > self.config_samples.max(1) {
            self.bind(surface.hdc)?;
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
            wglMakeCurrent(ptr::null_mut(), ptr::null_mut());
        }
        drop(self.gl);
        if ownership == HandleOwnership::Owned {
            unsafe {
                wglDeleteContext(self.context);
            }
        }
    }
}

fn window_hwnd(window: RawWindowHandle) -> ContextResult<HWND> {
    match window {
        RawWindowHandle::Win32(handle) => Ok(handle.hwnd.cast()),
        _ => Err(ContextError::UnsupportedHandle("WGL accepts Win32 window handles")),
    }
}
