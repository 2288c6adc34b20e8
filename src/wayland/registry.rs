//! Selection of the compositor globals the bootstrap binds
//!
//! The compositor advertises every global it supports. Only a small, fixed set of them is
//! of interest here, and which ones depends on the presentation backend and shell preference.
//! [`RequiredGlobals`] decides for each advertisement whether it gets bound, remembers what
//! was bound and validates the result once the initial roundtrip is done.

use tracing::{debug, trace, warn};

use crate::{
    config::{BackendKind, ShellPreference},
    Error,
};

/// A global advertised through `wl_registry.global`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    /// Numeric name of the global, used to bind it
    pub name: u32,
    /// Interface name, e.g. `wl_compositor`
    pub interface: String,
    /// Highest version the compositor supports
    pub version: u32,
}

impl Global {
    /// Create a new global entry
    pub fn new(name: u32, interface: impl Into<String>, version: u32) -> Self {
        Global {
            name,
            interface: interface.into(),
            version,
        }
    }
}

/// The interfaces this crate knows how to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    /// `wl_compositor`, the surface factory
    Compositor,
    /// `xdg_wm_base`, the stable shell
    XdgWmBase,
    /// `wl_shell`, the legacy shell
    WlShell,
    /// `wl_shm`, the shared-memory buffer factory
    Shm,
}

impl Interface {
    /// Every known interface
    pub const ALL: [Interface; 4] = [
        Interface::Compositor,
        Interface::XdgWmBase,
        Interface::WlShell,
        Interface::Shm,
    ];

    /// Protocol name of the interface
    pub fn name(self) -> &'static str {
        match self {
            Interface::Compositor => "wl_compositor",
            Interface::XdgWmBase => "xdg_wm_base",
            Interface::WlShell => "wl_shell",
            Interface::Shm => "wl_shm",
        }
    }

    /// Look up an interface by its protocol name
    pub fn from_name(name: &str) -> Option<Interface> {
        Interface::ALL.into_iter().find(|interface| interface.name() == name)
    }

    /// Highest version whose events are handled
    pub fn max_version(self) -> u32 {
        match self {
            // v4 brings `damage_buffer`
            Interface::Compositor => 4,
            Interface::XdgWmBase => 1,
            Interface::WlShell => 1,
            Interface::Shm => 1,
        }
    }
}

/// Instruction to bind a global at a given version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindRequest {
    /// Numeric name of the global
    pub name: u32,
    /// Interface to bind it as
    pub interface: Interface,
    /// Negotiated version
    pub version: u32,
}

/// Shell protocol giving the surface its toplevel role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellKind {
    /// `xdg_wm_base` / `xdg_surface` / `xdg_toplevel`
    Xdg,
    /// `wl_shell` / `wl_shell_surface`
    WlShell,
}

impl ShellKind {
    /// Whether the compositor has to send an acknowledged configure before the
    /// surface may be presented
    pub fn requires_configure(self) -> bool {
        match self {
            ShellKind::Xdg => true,
            ShellKind::WlShell => false,
        }
    }

    fn interface(self) -> Interface {
        match self {
            ShellKind::Xdg => Interface::XdgWmBase,
            ShellKind::WlShell => Interface::WlShell,
        }
    }
}

/// Bookkeeping of the globals that were bound
#[derive(Debug)]
pub struct RequiredGlobals {
    backend: BackendKind,
    shell: ShellPreference,
    bound: Vec<(Interface, u32, u32)>,
}

impl RequiredGlobals {
    /// Globals needed by `backend`, restricted by the `shell` preference
    pub fn new(backend: BackendKind, shell: ShellPreference) -> Self {
        RequiredGlobals {
            backend,
            shell,
            bound: Vec::with_capacity(4),
        }
    }

    /// Whether an interface belongs to the set this configuration binds
    pub fn wants(&self, interface: Interface) -> bool {
        match interface {
            Interface::Compositor => true,
            Interface::XdgWmBase => self.shell != ShellPreference::WlShell,
            Interface::WlShell => self.shell != ShellPreference::Xdg,
            Interface::Shm => self.backend == BackendKind::Shm,
        }
    }

    /// Consider an advertised global.
    ///
    /// Returns the bind request if the global is wanted and no global of the same
    /// interface is bound yet.
    pub fn offer(&mut self, global: &Global) -> Option<BindRequest> {
        trace!(name = global.name, interface = %global.interface, version = global.version, "Global advertised");

        let interface = Interface::from_name(&global.interface)?;
        if !self.wants(interface) {
            return None;
        }
        if self.is_bound(interface) {
            debug!("Ignoring duplicate {} global {}", interface.name(), global.name);
            return None;
        }

        let version = global.version.min(interface.max_version());
        self.bound.push((interface, global.name, version));
        debug!("Binding {} (name {}) at version {}", interface.name(), global.name, version);

        Some(BindRequest {
            name: global.name,
            interface,
            version,
        })
    }

    /// Forget a global withdrawn by the compositor
    pub fn remove(&mut self, name: u32) -> Option<Interface> {
        let index = self.bound.iter().position(|(_, bound_name, _)| *bound_name == name)?;
        let (interface, _, _) = self.bound.remove(index);
        warn!("The compositor removed the {} global", interface.name());
        Some(interface)
    }

    /// Whether a global of `interface` is bound
    pub fn is_bound(&self, interface: Interface) -> bool {
        self.bound.iter().any(|(bound, _, _)| *bound == interface)
    }

    /// Version a bound interface was bound at
    pub fn version(&self, interface: Interface) -> Option<u32> {
        self.bound
            .iter()
            .find(|(bound, _, _)| *bound == interface)
            .map(|(_, _, version)| *version)
    }

    /// Shell that will be used, preferring `xdg_wm_base`
    pub fn shell(&self) -> Option<ShellKind> {
        [ShellKind::Xdg, ShellKind::WlShell]
            .into_iter()
            .find(|shell| self.is_bound(shell.interface()))
    }

    /// Check that everything needed by the configuration is bound
    pub fn validate(&self) -> Result<ShellKind, Error> {
        if !self.is_bound(Interface::Compositor) {
            return Err(Error::NoCompositor);
        }

        let shell = self.shell().ok_or(Error::NoShell(match self.shell {
            ShellPreference::Auto => &["xdg_wm_base", "wl_shell"],
            ShellPreference::Xdg => &["xdg_wm_base"],
            ShellPreference::WlShell => &["wl_shell"],
        }))?;

        if self.backend == BackendKind::Shm && !self.is_bound(Interface::Shm) {
            return Err(Error::MissingGlobal(Interface::Shm.name()));
        }

        Ok(shell)
    }
}
