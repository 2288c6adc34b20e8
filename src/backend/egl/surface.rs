//! EGL surface related structs

use std::{fmt, os::raw::c_int, sync::Arc};

use tracing::{debug, trace};
use wayland_client::backend::ObjectId;
use wayland_egl::WlEglSurface;

use super::{
    display::{EGLDisplay, EGLDisplayHandle},
    ffi, wrap_egl_call, EGLError, Error,
};
use crate::utils::Size;

/// EGL window surface on top of a `wl_egl_window`
///
/// Drop order matters: the EGL surface is destroyed before the `wl_egl_window` it renders to.
pub struct EGLSurface {
    pub(crate) display: Arc<EGLDisplayHandle>,
    pub(crate) surface: ffi::egl::types::EGLSurface,
    window: WlEglSurface,
}

impl fmt::Debug for EGLSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EGLSurface")
            .field("display", &self.display)
            .field("surface", &self.surface)
            .finish_non_exhaustive()
    }
}

impl EGLSurface {
    /// Create a `wl_egl_window` for the `wl_surface` identified by `surface` and an EGL
    /// window surface rendering into it
    pub fn new(
        display: &EGLDisplay,
        config: ffi::egl::types::EGLConfig,
        surface: ObjectId,
        size: Size,
    ) -> Result<EGLSurface, Error> {
        let window =
            WlEglSurface::new(surface, size.w as i32, size.h as i32).map_err(Error::NativeWindow)?;
        let attributes: [c_int; 1] = [ffi::egl::NONE as c_int];

        let ptr = window.ptr();
        let egl_surface = if display.platform_surfaces {
            trace!("Creating EGL window surface via EGL_EXT_platform_base");
            wrap_egl_call(|| unsafe {
                ffi::egl::CreatePlatformWindowSurfaceEXT(
                    **display.display,
                    config,
                    ptr as *mut _,
                    attributes.as_ptr(),
                )
            })
        } else {
            trace!("Creating EGL window surface via eglCreateWindowSurface");
            wrap_egl_call(|| unsafe {
                ffi::egl::CreateWindowSurface(
                    **display.display,
                    config,
                    ptr as ffi::NativeWindowType,
                    attributes.as_ptr(),
                )
            })
        }
        .map_err(Error::SurfaceCreationFailed)?;

        if egl_surface == ffi::egl::NO_SURFACE {
            return Err(Error::SurfaceCreationFailed(EGLError::BadSurface));
        }
        debug!("EGL surface created at {}x{}", size.w, size.h);

        Ok(EGLSurface {
            display: display.display.clone(),
            surface: egl_surface,
            window,
        })
    }

    /// Swaps the buffers, this commits the `wl_surface`
    pub fn swap_buffers(&self) -> Result<(), Error> {
        wrap_egl_call(|| unsafe { ffi::egl::SwapBuffers(**self.display, self.surface) })
            .map(|_| ())
            .map_err(Error::SwapBuffers)
    }

    /// Resize the underlying `wl_egl_window`, taking effect on the next swap
    pub fn resize(&self, size: Size) {
        self.window.resize(size.w as i32, size.h as i32, 0, 0);
    }
}

impl Drop for EGLSurface {
    fn drop(&mut self) {
        unsafe {
            ffi::egl::DestroySurface(**self.display, self.surface);
        }
    }
}
