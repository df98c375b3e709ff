//! Intermediate multisampled backbuffer
//!
//! Where a backend presents through the window-system framebuffer but the
//! caller asked for MSAA, drawing goes into this framebuffer object instead
//! and is resolved into the default framebuffer right before the platform
//! swap. Owned by the surface token of the backend that created it.

use glow::HasContext;

use crate::error::{ContextError, ContextResult};

use super::Framebuffer;

type Renderbuffer = <glow::Context as glow::HasContext>::Renderbuffer;

/// Multisampled color + depth/stencil renderbuffers behind one FBO
pub(crate) struct MsaaBackBuffer {
    fbo: Framebuffer,
    color: Renderbuffer,
    depth_stencil: Renderbuffer,
    samples: u32,
    width: u32,
    height: u32,
}

impl MsaaBackBuffer {
    /// Allocate the framebuffer at the given size and sample count
    ///
    /// Requires the owning context to be current.
    pub(crate) fn new(gl: &glow::Context, width: u32, height: u32, samples: u32) -> ContextResult<Self> {
        unsafe {
            let fbo = gl.create_framebuffer().map_err(ContextError::Platform)?;
            let color = gl.create_renderbuffer().map_err(ContextError::Platform)?;
            let depth_stencil = gl.create_renderbuffer().map_err(ContextError::Platform)?;

            allocate_storage(gl, color, depth_stencil, width, height, samples);

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.framebuffer_renderbuffer(glow::FRAMEBUFFER, glow::COLOR_ATTACHMENT0, glow::RENDERBUFFER, Some(color));
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_STENCIL_ATTACHMENT,
                glow::RENDERBUFFER,
                Some(depth_stencil),
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);

            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(fbo);
                gl.delete_renderbuffer(color);
                gl.delete_renderbuffer(depth_stencil);
                return Err(ContextError::Platform(format!(
                    "multisampled backbuffer incomplete (status {status:#x})"
                )));
            }

            Ok(Self {
                fbo,
                color,
                depth_stencil,
                samples,
                width,
                height,
            })
        }
    }

    /// The framebuffer object draws should target
    pub(crate) fn fbo(&self) -> Framebuffer {
        self.fbo
    }

    /// Reallocate backing storage for new dimensions or sample count
    ///
    /// No-op when nothing changed.
    pub(crate) fn resize(&mut self, gl: &glow::Context, width: u32, height: u32, samples: u32) {
        if self.width == width && self.height == height && self.samples == samples {
            return;
        }
        unsafe {
            allocate_storage(gl, self.color, self.depth_stencil, width, height, samples);
        }
        self.width = width;
        self.height = height;
        self.samples = samples;
    }

    /// Resolve the multisampled color target into the default framebuffer
    ///
    /// Leaves the FBO bound again afterwards so subsequent draws keep
    /// targeting it.
    pub(crate) fn resolve_to_default(&self, gl: &glow::Context) {
        let (w, h) = (self.width as i32, self.height as i32);
        unsafe {
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(self.fbo));
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
            gl.blit_framebuffer(0, 0, w, h, 0, 0, w, h, glow::COLOR_BUFFER_BIT, glow::NEAREST);
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
        }
    }

    /// Release the GL objects
    ///
    /// Requires the owning context to be current.
    pub(crate) fn destroy(self, gl: &glow::Context) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.delete_framebuffer(self.fbo);
            gl.delete_renderbuffer(self.color);
            gl.delete_renderbuffer(self.depth_stencil);
        }
    }
}

unsafe fn allocate_storage(
    gl: &glow::Context,
    color: Renderbuffer,
    depth_stencil: Renderbuffer,
    width: u32,
    height: u32,
    samples: u32,
) {
    let (w, h) = (width as i32, height as i32);
    let samples = samples.max(1) as i32;
    gl.bind_renderbuffer(glow::RENDERBUFFER, Some(color));
    gl.renderbuffer_storage_multisample(glow::RENDERBUFFER, samples, glow::RGBA8, w, h);
    gl.bind_renderbuffer(glow::RENDERBUFFER, Some(depth_stencil));
    gl.renderbuffer_storage_multisample(glow::RENDERBUFFER, samples, glow::DEPTH24_STENCIL8, w, h);
    gl.bind_renderbuffer(glow::RENDERBUFFER, None);
}
