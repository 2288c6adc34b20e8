//! Hardware accelerated presentation through EGL and OpenGL ES 2
//!
//! libEGL is loaded at runtime, the GLES entry points are resolved through
//! `eglGetProcAddress`. The [`EglPresenter`] owns the whole chain needed to draw into the
//! toplevel surface: an [`EGLDisplay`] on the wayland connection, an [`EGLContext`] and an
//! [`EGLSurface`] wrapping a `wl_egl_window`.
//!
//! Frames only clear the surface to a fixed color. Swapping buffers commits the `wl_surface`,
//! so the frame callback has to be requested before the swap.

use std::{
    ffi::CString,
    fmt,
    os::raw::c_void,
    ptr,
};

use tracing::{debug, info, warn};
use wayland_client::backend::ObjectId;

use crate::{
    backend::{Presented, Presenter},
    utils::Size,
    wayland::handshake::Requests,
};

pub mod context;
pub mod display;
mod error;
#[allow(non_camel_case_types, dead_code, unused_mut, non_upper_case_globals)]
pub mod ffi;
pub mod surface;

pub use self::context::EGLContext;
pub use self::display::EGLDisplay;
pub(crate) use self::error::wrap_egl_call;
pub use self::error::{EGLError, Error};
pub use self::surface::EGLSurface;

/// Returns the address of an OpenGL function.
///
/// Result is independent of displays and does not guarantee an extension is actually supported at runtime.
///
/// # Safety
///
/// This function should only be invoked after libEGL was loaded, see [`ffi::make_sure_egl_is_loaded`]
pub unsafe fn get_proc_address(symbol: &str) -> *const c_void {
    let addr = match CString::new(symbol.as_bytes()) {
        Ok(addr) => addr,
        Err(_) => return ptr::null(),
    };
    ffi::egl::GetProcAddress(addr.as_ptr()) as *const _
}

/// [`Presenter`] clearing the surface with OpenGL ES 2
pub struct EglPresenter {
    gl: ffi::gl::Gles2,
    surface: EGLSurface,
    context: EGLContext,
    display: EGLDisplay,
    clear_color: [f32; 4],
    size: Size,
}

impl fmt::Debug for EglPresenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EglPresenter")
            .field("surface", &self.surface)
            .field("context", &self.context)
            .field("display", &self.display)
            .field("clear_color", &self.clear_color)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl EglPresenter {
    /// Set up EGL on the `wl_display` behind `display` and make a context current on
    /// the `wl_surface` identified by `surface`
    ///
    /// # Safety
    ///
    /// `display` must be the `wl_display` pointer of the connection `surface` belongs to,
    /// and stay valid for the lifetime of the presenter.
    pub unsafe fn new(
        display: *mut c_void,
        surface: ObjectId,
        size: Size,
        clear_color: [f32; 4],
    ) -> Result<EglPresenter, Error> {
        let display = EGLDisplay::new(display)?;
        let config = display.choose_config()?;
        let context = EGLContext::new(&display, config)?;
        let surface = EGLSurface::new(&display, config, surface, size)?;
        context.make_current_with_surface(&surface)?;

        // frames are paced by wl_surface.frame, swaps must not wait on their own
        if let Err(err) = wrap_egl_call(|| ffi::egl::SwapInterval(**display.display, 0)) {
            warn!("Unable to disable vsync on the EGL surface: {}", err);
        }

        let gl = ffi::gl::Gles2::load_with(|symbol| get_proc_address(symbol));
        let version = display.version();
        info!("EGL {:?} context ready", version);

        let presenter = EglPresenter {
            gl,
            surface,
            context,
            display,
            clear_color,
            size,
        };
        presenter.viewport();
        Ok(presenter)
    }

    fn viewport(&self) {
        unsafe {
            self.gl.Viewport(0, 0, self.size.w as i32, self.size.h as i32);
        }
    }
}

impl Presenter for EglPresenter {
    fn name(&self) -> &'static str {
        "egl"
    }

    fn init(&mut self, size: Size, requests: &mut dyn Requests) -> Result<(), crate::Error> {
        self.resize(size, requests)
    }

    fn resize(&mut self, size: Size, _requests: &mut dyn Requests) -> Result<(), crate::Error> {
        if size == self.size {
            return Ok(());
        }
        debug!("Resizing wl_egl_window to {}x{}", size.w, size.h);
        self.surface.resize(size);
        self.size = size;
        self.viewport();
        Ok(())
    }

    fn present(&mut self, requests: &mut dyn Requests) -> Result<Presented, crate::Error> {
        requests.frame();

        let [r, g, b, a] = self.clear_color;
        unsafe {
            self.gl.ClearColor(r, g, b, a);
            self.gl.Clear(ffi::gl::COLOR_BUFFER_BIT);
        }
        self.surface.swap_buffers()?;
        Ok(Presented::Frame)
    }
}

impl Drop for EglPresenter {
    fn drop(&mut self) {
        if let Err(err) = self.context.unbind() {
            warn!("Failed to unbind the EGL context: {}", err);
        }
    }
}
