//! Window and backend configuration
//!
//! The defaults mirror what the bootstrap programs always did: a 1280x720 toplevel, presented
//! through EGL when available. A few values can be overridden from the environment:
//!
//! - `WLBOOT_BACKEND`: `egl` or `shm`, the presentation backend used when none is given explicitly.
//! - `XDG_RUNTIME_DIR`: directory holding the anonymous files backing shared-memory buffers.

use std::{fmt, path::PathBuf, str::FromStr};

use tracing::warn;

use crate::utils::Size;

/// Environment variable selecting the default presentation backend
pub const BACKEND_ENV: &str = "WLBOOT_BACKEND";

/// Way pixels reach the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Hardware accelerated rendering through EGL and OpenGL ES 2
    Egl,
    /// CPU painted `wl_shm` buffers
    Shm,
}

impl BackendKind {
    /// Name used on the command line and in the environment
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Egl => "egl",
            BackendKind::Shm => "shm",
        }
    }

    /// Whether support for this backend was compiled in
    pub fn is_available(self) -> bool {
        match self {
            BackendKind::Egl => cfg!(feature = "backend_egl"),
            BackendKind::Shm => cfg!(feature = "backend_shm"),
        }
    }
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(feature = "backend_egl") {
            BackendKind::Egl
        } else {
            BackendKind::Shm
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown backend or shell name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value `{value}`, expected one of {expected:?}")]
pub struct ParseError {
    value: String,
    expected: &'static [&'static str],
}

impl FromStr for BackendKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "egl" | "gles" | "gl" => Ok(BackendKind::Egl),
            "shm" => Ok(BackendKind::Shm),
            _ => Err(ParseError {
                value: s.to_owned(),
                expected: &["egl", "shm"],
            }),
        }
    }
}

/// Which shell protocol gives the surface its toplevel role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShellPreference {
    /// `xdg_wm_base` when advertised, `wl_shell` otherwise
    #[default]
    Auto,
    /// Only `xdg_wm_base`
    Xdg,
    /// Only the legacy `wl_shell`
    WlShell,
}

impl FromStr for ShellPreference {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(ShellPreference::Auto),
            "xdg" | "xdg-shell" | "xdg_wm_base" => Ok(ShellPreference::Xdg),
            "wl-shell" | "wl_shell" => Ok(ShellPreference::WlShell),
            _ => Err(ParseError {
                value: s.to_owned(),
                expected: &["auto", "xdg", "wl-shell"],
            }),
        }
    }
}

/// Everything the bootstrap sequence needs to know up front
#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    /// Title given to the toplevel
    pub title: String,
    /// Initial size, kept until the compositor suggests another one
    pub size: Size,
    /// Presentation backend
    pub backend: BackendKind,
    /// Shell protocol selection
    pub shell: ShellPreference,
    /// RGBA color the EGL backend clears each frame with
    pub clear_color: [f32; 4],
    /// Directory for shared-memory backing files, usually `$XDG_RUNTIME_DIR`
    pub runtime_dir: Option<PathBuf>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            title: String::from("wlboot"),
            size: Size::new(1280, 720),
            backend: BackendKind::default(),
            shell: ShellPreference::default(),
            clear_color: [0.0, 0.0, 0.1, 1.0],
            runtime_dir: None,
        }
    }
}

impl WindowConfig {
    /// Default configuration with the environment overrides applied
    pub fn from_env() -> Self {
        let backend = match std::env::var(BACKEND_ENV) {
            Ok(value) => value.parse().unwrap_or_else(|err| {
                warn!("Ignoring {}: {}", BACKEND_ENV, err);
                BackendKind::default()
            }),
            Err(_) => BackendKind::default(),
        };

        WindowConfig {
            backend,
            runtime_dir: std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from),
            ..Default::default()
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the initial size
    pub fn with_size(mut self, size: impl Into<Size>) -> Self {
        self.size = size.into();
        self
    }

    /// Set the presentation backend
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the shell preference
    pub fn with_shell(mut self, shell: ShellPreference) -> Self {
        self.shell = shell;
        self
    }
}
