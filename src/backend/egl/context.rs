//! EGL context related structs

use std::{os::raw::c_int, ptr, sync::Arc};

use tracing::trace;

use super::{
    display::{EGLDisplay, EGLDisplayHandle},
    ffi, wrap_egl_call, EGLSurface, Error,
};

/// OpenGL ES 2 context bound to an [`EGLDisplay`]
#[derive(Debug)]
pub struct EGLContext {
    context: ffi::egl::types::EGLContext,
    display: Arc<EGLDisplayHandle>,
}

impl EGLContext {
    /// Create an OpenGL ES 2 context for `config`
    pub fn new(display: &EGLDisplay, config_id: ffi::egl::types::EGLConfig) -> Result<EGLContext, Error> {
        trace!("Setting CONTEXT_CLIENT_VERSION to 2");
        let context_attributes: [c_int; 3] = [
            ffi::egl::CONTEXT_CLIENT_VERSION as c_int,
            2,
            ffi::egl::NONE as c_int,
        ];

        let context = wrap_egl_call(|| unsafe {
            ffi::egl::CreateContext(
                **display.display,
                config_id,
                ptr::null(),
                context_attributes.as_ptr(),
            )
        })
        .map_err(Error::CreationFailed)?;

        if context == ffi::egl::NO_CONTEXT {
            return Err(Error::CreationFailed(super::EGLError::BadContext));
        }

        trace!("EGL context successfully created");

        Ok(EGLContext {
            context,
            display: display.display.clone(),
        })
    }

    /// Makes the OpenGL context the current context in the current thread with a surface to
    /// read/draw to.
    ///
    /// # Safety
    ///
    /// The context cannot be made current on multiple threads without being unbound again
    pub unsafe fn make_current_with_surface(&self, surface: &EGLSurface) -> Result<(), Error> {
        let surface_ptr = surface.surface;
        wrap_egl_call(|| ffi::egl::MakeCurrent(**self.display, surface_ptr, surface_ptr, self.context))
            .map(|_| ())
            .map_err(Error::MakeCurrent)
    }

    /// Returns true if the OpenGL context is the current one in the thread.
    pub fn is_current(&self) -> bool {
        unsafe { ffi::egl::GetCurrentContext() == self.context as *const _ }
    }

    /// Unbinds this context from the current thread, if set.
    pub fn unbind(&self) -> Result<(), Error> {
        if self.is_current() {
            wrap_egl_call(|| unsafe {
                ffi::egl::MakeCurrent(
                    **self.display,
                    ffi::egl::NO_SURFACE,
                    ffi::egl::NO_SURFACE,
                    ffi::egl::NO_CONTEXT,
                )
            })
            .map_err(Error::MakeCurrent)?;
        }
        Ok(())
    }
}

impl Drop for EGLContext {
    fn drop(&mut self) {
        unsafe {
            // the context has to be unbound, otherwise egl stalls the destroy call
            let _ = self.unbind();
            ffi::egl::DestroyContext(**self.display, self.context);
        }
    }
}
