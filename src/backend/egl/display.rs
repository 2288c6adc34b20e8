//! Type safe EGL display initialisation

use std::{
    ffi::CStr,
    mem::MaybeUninit,
    ops::Deref,
    os::raw::{c_int, c_void},
    ptr,
    sync::Arc,
};

use tracing::{debug, info, trace};

use super::{ffi, wrap_egl_call, EGLError, Error};

/// Wrapper around [`ffi::EGLDisplay`](ffi::egl::types::EGLDisplay) to ensure display is only destroyed
/// once all resources bound to it have been dropped.
#[derive(Debug)]
pub(crate) struct EGLDisplayHandle {
    handle: ffi::egl::types::EGLDisplay,
}

impl Deref for EGLDisplayHandle {
    type Target = ffi::egl::types::EGLDisplay;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for EGLDisplayHandle {
    fn drop(&mut self) {
        unsafe {
            // ignore errors on drop
            ffi::egl::Terminate(self.handle);
        }
    }
}

/// [`EGLDisplay`] represents an initialised EGL environment on a wayland connection
#[derive(Debug)]
pub struct EGLDisplay {
    pub(crate) display: Arc<EGLDisplayHandle>,
    pub(crate) egl_version: (i32, i32),
    pub(crate) platform_surfaces: bool,
}

impl EGLDisplay {
    /// Initialise EGL on a `wl_display`.
    ///
    /// # Safety
    ///
    /// `native` must point to a valid `wl_display` that outlives the returned value
    /// and everything created from it.
    pub unsafe fn new(native: *mut c_void) -> Result<EGLDisplay, Error> {
        let dp_extensions = ffi::make_sure_egl_is_loaded()?;
        debug!("EGL No-Display Extensions: {:?}", dp_extensions);
        let has_dp_extension = |e: &str| dp_extensions.iter().any(|s| s == e);

        let (display, platform_surfaces) = if has_dp_extension("EGL_KHR_platform_wayland")
            && ffi::egl::GetPlatformDisplay::is_loaded()
        {
            trace!("EGL Display Initialization via EGL_KHR_platform_wayland");
            let display = wrap_egl_call(|| {
                ffi::egl::GetPlatformDisplay(ffi::egl::PLATFORM_WAYLAND_KHR, native, ptr::null())
            })
            .map_err(Error::DisplayNotSupported)?;
            (display, ffi::egl::CreatePlatformWindowSurfaceEXT::is_loaded())
        } else if has_dp_extension("EGL_EXT_platform_wayland") && ffi::egl::GetPlatformDisplayEXT::is_loaded() {
            trace!("EGL Display Initialization via EGL_EXT_platform_wayland");
            let display = wrap_egl_call(|| {
                ffi::egl::GetPlatformDisplayEXT(ffi::egl::PLATFORM_WAYLAND_EXT, native, ptr::null())
            })
            .map_err(Error::DisplayNotSupported)?;
            (display, ffi::egl::CreatePlatformWindowSurfaceEXT::is_loaded())
        } else {
            trace!("Default EGL Display Initialization via GetDisplay");
            let display = wrap_egl_call(|| ffi::egl::GetDisplay(native as ffi::NativeDisplayType))
                .map_err(Error::DisplayNotSupported)?;
            (display, false)
        };

        if display == ffi::egl::NO_DISPLAY {
            return Err(Error::DisplayNotSupported(EGLError::BadDisplay));
        }

        let egl_version = {
            let mut major: MaybeUninit<ffi::egl::types::EGLint> = MaybeUninit::uninit();
            let mut minor: MaybeUninit<ffi::egl::types::EGLint> = MaybeUninit::uninit();

            wrap_egl_call(|| ffi::egl::Initialize(display, major.as_mut_ptr(), minor.as_mut_ptr()))
                .map_err(Error::InitFailed)?;

            let major = major.assume_init();
            let minor = minor.assume_init();

            info!("EGL Initialized");
            info!("EGL Version: {:?}", (major, minor));

            (major, minor)
        };
        let handle = Arc::new(EGLDisplayHandle { handle: display });

        // the list of extensions supported by the client once initialized is different from the
        // list of extensions obtained earlier
        let extensions = if egl_version >= (1, 2) {
            let p = CStr::from_ptr(
                wrap_egl_call(|| ffi::egl::QueryString(display, ffi::egl::EXTENSIONS as i32))
                    .map_err(Error::InitFailed)?,
            );
            let list = String::from_utf8(p.to_bytes().to_vec()).unwrap_or_else(|_| String::new());
            list.split(' ').map(|e| e.to_string()).collect::<Vec<_>>()
        } else {
            vec![]
        };
        debug!("EGL Extensions: {:?}", extensions);

        if egl_version < (1, 3) {
            return Err(Error::OpenGlesNotSupported(None));
        }
        wrap_egl_call(|| ffi::egl::BindAPI(ffi::egl::OPENGL_ES_API))
            .map_err(|source| Error::OpenGlesNotSupported(Some(source)))?;

        Ok(EGLDisplay {
            display: handle,
            egl_version,
            platform_surfaces,
        })
    }

    /// Finds a window capable RGBA8888 config renderable with OpenGL ES 2
    pub fn choose_config(&self) -> Result<ffi::egl::types::EGLConfig, Error> {
        let descriptor: [c_int; 13] = [
            ffi::egl::SURFACE_TYPE as c_int,
            ffi::egl::WINDOW_BIT as c_int,
            ffi::egl::RED_SIZE as c_int,
            8,
            ffi::egl::GREEN_SIZE as c_int,
            8,
            ffi::egl::BLUE_SIZE as c_int,
            8,
            ffi::egl::ALPHA_SIZE as c_int,
            8,
            ffi::egl::RENDERABLE_TYPE as c_int,
            ffi::egl::OPENGL_ES2_BIT as c_int,
            ffi::egl::NONE as c_int,
        ];

        let mut count = 0;
        wrap_egl_call(|| unsafe { ffi::egl::GetConfigs(**self.display, ptr::null_mut(), 0, &mut count) })
            .map_err(Error::ConfigFailed)?;
        debug!("EGL has {} configs", count);

        let mut config_ids: Vec<ffi::egl::types::EGLConfig> = Vec::with_capacity(count.max(0) as usize);
        let mut num_configs = 0;
        wrap_egl_call(|| unsafe {
            ffi::egl::ChooseConfig(
                **self.display,
                descriptor.as_ptr(),
                config_ids.as_mut_ptr(),
                count,
                &mut num_configs,
            )
        })
        .map_err(Error::ConfigFailed)?;
        if num_configs <= 0 {
            return Err(Error::NoAvailablePixelFormat);
        }
        unsafe {
            config_ids.set_len(num_configs as usize);
        }

        // go home with the first config
        let config_id = config_ids[0];
        for (name, attribute) in [
            ("Buffer", ffi::egl::BUFFER_SIZE),
            ("Red", ffi::egl::RED_SIZE),
            ("Alpha", ffi::egl::ALPHA_SIZE),
        ] {
            let mut value = 0;
            let _ = wrap_egl_call(|| unsafe {
                ffi::egl::GetConfigAttrib(**self.display, config_id, attribute as c_int, &mut value)
            });
            debug!("{} size for config is {}", name, value);
        }

        Ok(config_id)
    }

    /// EGL version as `(major, minor)`
    pub fn version(&self) -> (i32, i32) {
        self.egl_version
    }
}
