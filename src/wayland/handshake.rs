//! The bootstrap state machine
//!
//! A [`Sequencer`] owns everything the bootstrap needs to remember between compositor events:
//! the globals that were bound, the state of the surface, the size negotiated with the
//! compositor and the installed [`Presenter`]. It never talks to the socket itself. Every
//! protocol request goes through the [`Requests`] sink it is handed, and every protocol event
//! comes in as an [`Event`] through [`Sequencer::handle`].
//!
//! The surface goes through the following states:
//!
//! ```text
//! Unbound --finish_registry--> GlobalsBound --create_window--> AwaitingConfigure
//!     --configure + ack--> Configured --shutdown--> Destroyed
//! ```
//!
//! With `wl_shell` there is no acknowledged configure, so `create_window` moves straight to
//! [`SurfaceState::Configured`]. Pings are answered in every state but `Destroyed`.

use std::os::unix::io::BorrowedFd;

use tracing::{debug, info, trace, warn};
use wayland_client::protocol::wl_shm;

use crate::{
    backend::{BufferId, BufferLayout, Presented, Presenter},
    config::WindowConfig,
    utils::{Rectangle, Size},
    wayland::registry::{BindRequest, Global, Interface, RequiredGlobals, ShellKind},
    Error,
};

/// Lifecycle of the single surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceState {
    /// Waiting for the registry roundtrip
    Unbound,
    /// Required globals are bound, no surface yet
    GlobalsBound,
    /// Surface and role exist, the compositor has not configured them yet
    AwaitingConfigure,
    /// The surface may be presented
    Configured,
    /// Torn down, no further requests are sent
    Destroyed,
}

/// Compositor events relevant to the bootstrap, keyed by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `wl_registry.global`
    Global(Global),
    /// `wl_registry.global_remove`
    GlobalRemove(u32),
    /// `wl_shm.format`
    ShmFormat(wl_shm::Format),
    /// `xdg_wm_base.ping` or `wl_shell_surface.ping`
    Ping {
        /// Shell whose object sent the ping
        source: ShellKind,
        /// Serial to echo back
        serial: u32,
    },
    /// `xdg_toplevel.configure`, `None` when the client should choose the size
    ToplevelConfigure {
        /// Suggested size, an axis at `0` is left to the client
        size: Option<Size>,
    },
    /// `xdg_surface.configure`, ends a configure sequence
    SurfaceConfigure {
        /// Serial to acknowledge
        serial: u32,
    },
    /// `wl_shell_surface.configure`
    ShellSurfaceConfigure {
        /// Suggested size, an axis at `0` is left to the client
        size: Option<Size>,
    },
    /// `xdg_toplevel.close`
    Close,
    /// `wl_callback.done` of a frame callback
    Frame {
        /// Timestamp in milliseconds
        time: u32,
    },
    /// `wl_buffer.release`
    BufferReleased(BufferId),
}

impl Event {
    /// Whether the compositor waits for an answer to this event
    ///
    /// Such events are handled even while the event loop is winding down.
    pub fn needs_reply(&self) -> bool {
        matches!(self, Event::Ping { .. })
    }
}

/// What the event loop should do after an event was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Keep dispatching
    Continue,
    /// The window was closed, leave the loop
    Exit,
}

/// Sink for the protocol requests issued by the bootstrap
///
/// Implemented on top of real protocol objects by the wayland session, and by recorders in tests.
/// Requests are sent in the order the methods are called.
pub trait Requests {
    /// Bind a global from the registry
    fn bind(&mut self, request: BindRequest);

    /// Create the surface, give it the toplevel role of `shell`, set its title
    /// and send the initial commit
    fn create_window(&mut self, shell: ShellKind, title: &str) -> Result<(), Error>;

    /// Answer a ping on the object of `source`
    fn pong(&mut self, source: ShellKind, serial: u32);

    /// `xdg_surface.ack_configure`
    fn ack_configure(&mut self, serial: u32);

    /// `wl_surface.commit`
    fn commit(&mut self);

    /// Request a frame callback for the next commit
    fn frame(&mut self);

    /// Damage a region of the attached buffer
    fn damage(&mut self, damage: Rectangle);

    /// Create a `wl_shm_pool` over `fd` and one `wl_buffer` per layout, then release the pool
    fn create_buffers(
        &mut self,
        fd: BorrowedFd<'_>,
        pool_size: usize,
        buffers: &[BufferLayout],
    ) -> Result<(), Error>;

    /// Destroy every `wl_buffer` created by [`Requests::create_buffers`]
    fn destroy_buffers(&mut self);

    /// Attach a buffer, or detach with `None`
    fn attach(&mut self, buffer: Option<BufferId>);

    /// Destroy the role objects and the surface
    fn destroy_window(&mut self);
}

/// Drives the bootstrap from registry discovery to presentation
#[derive(Debug)]
pub struct Sequencer {
    config: WindowConfig,
    state: SurfaceState,
    globals: RequiredGlobals,
    shell: Option<ShellKind>,
    formats: Vec<wl_shm::Format>,
    pending_size: Option<Size>,
    size: Size,
    presenter: Option<Box<dyn Presenter>>,
    starved: bool,
}

impl Sequencer {
    /// Create a sequencer for the given window
    pub fn new(config: WindowConfig) -> Self {
        Sequencer {
            globals: RequiredGlobals::new(config.backend, config.shell),
            size: config.size,
            config,
            state: SurfaceState::Unbound,
            shell: None,
            formats: Vec::new(),
            pending_size: None,
            presenter: None,
            starved: false,
        }
    }

    /// Current state of the surface
    pub fn state(&self) -> SurfaceState {
        self.state
    }

    /// Size the surface is presented at
    pub fn size(&self) -> Size {
        self.size
    }

    /// Shell selected by [`Sequencer::finish_registry`]
    pub fn shell(&self) -> Option<ShellKind> {
        self.shell
    }

    /// `wl_shm` formats advertised so far, in order
    pub fn formats(&self) -> &[wl_shm::Format] {
        &self.formats
    }

    /// Bound globals
    pub fn globals(&self) -> &RequiredGlobals {
        &self.globals
    }

    /// Configuration this sequencer was created with
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Whether a presenter is installed
    pub fn has_presenter(&self) -> bool {
        self.presenter.is_some()
    }

    /// Validate the globals collected during the registry roundtrip
    pub fn finish_registry(&mut self) -> Result<ShellKind, Error> {
        self.expect_state("finish_registry", SurfaceState::Unbound)?;

        let shell = self.globals.validate()?;
        info!("Compositor bound, using {:?} shell", shell);

        self.shell = Some(shell);
        self.state = SurfaceState::GlobalsBound;
        Ok(shell)
    }

    /// Create the surface and its toplevel role
    pub fn create_window(&mut self, requests: &mut dyn Requests) -> Result<(), Error> {
        self.expect_state("create_window", SurfaceState::GlobalsBound)?;
        let shell = self.shell.ok_or(Error::InvalidState {
            operation: "create_window",
            state: self.state,
        })?;

        requests.create_window(shell, &self.config.title)?;
        debug!("Surface created with title {:?}", self.config.title);

        self.state = if shell.requires_configure() {
            SurfaceState::AwaitingConfigure
        } else {
            SurfaceState::Configured
        };
        Ok(())
    }

    /// Install the presentation strategy
    ///
    /// Presents the first frame right away if the surface is already displayable.
    pub fn attach_presenter(
        &mut self,
        mut presenter: Box<dyn Presenter>,
        requests: &mut dyn Requests,
    ) -> Result<(), Error> {
        match self.state {
            SurfaceState::AwaitingConfigure | SurfaceState::Configured => {}
            state => {
                return Err(Error::InvalidState {
                    operation: "attach_presenter",
                    state,
                })
            }
        }

        presenter.init(self.size, requests)?;
        info!("Presenting through {}", presenter.name());
        self.presenter = Some(presenter);

        if self.state == SurfaceState::Configured {
            self.present(requests)?;
        }
        Ok(())
    }

    /// Handle one compositor event
    pub fn handle(&mut self, event: Event, requests: &mut dyn Requests) -> Result<Control, Error> {
        if self.state == SurfaceState::Destroyed {
            trace!("Dropping {:?} received after shutdown", event);
            return Ok(Control::Continue);
        }

        match event {
            Event::Global(global) => {
                if let Some(bind) = self.globals.offer(&global) {
                    requests.bind(bind);
                }
            }
            Event::GlobalRemove(name) => {
                if let Some(interface) = self.globals.remove(name) {
                    if interface == Interface::Compositor && self.state != SurfaceState::Unbound {
                        warn!("The surface factory went away, the window stays as it is");
                    }
                }
            }
            Event::ShmFormat(format) => {
                debug!("Received shm format: {:?}", format);
                if !self.formats.contains(&format) {
                    self.formats.push(format);
                }
            }
            Event::Ping { source, serial } => {
                requests.pong(source, serial);
                trace!("Pinged and ponged ({})", serial);
            }
            Event::ToplevelConfigure { size } => {
                trace!("Toplevel configure: {:?}", size);
                if size.is_some() {
                    self.pending_size = size;
                }
            }
            Event::SurfaceConfigure { serial } => {
                self.configure(serial, requests)?;
            }
            Event::ShellSurfaceConfigure { size } => {
                debug!("Shell surface configure: {:?}", size);
                if let Some(size) = size {
                    self.apply_size(size, requests)?;
                }
            }
            Event::Close => {
                info!("The compositor asked to close the window");
                return Ok(Control::Exit);
            }
            Event::Frame { time } => {
                trace!("Frame callback at {}ms", time);
                if self.state == SurfaceState::Configured {
                    self.present(requests)?;
                }
            }
            Event::BufferReleased(buffer) => {
                if let Some(presenter) = self.presenter.as_mut() {
                    presenter.release(buffer);
                }
                if self.starved && self.state == SurfaceState::Configured {
                    self.starved = false;
                    self.present(requests)?;
                }
            }
        }

        Ok(Control::Continue)
    }

    /// Present one frame through the installed presenter
    ///
    /// Fails with [`Error::NotConfigured`] until the configure handshake completed.
    pub fn present(&mut self, requests: &mut dyn Requests) -> Result<Presented, Error> {
        if self.state != SurfaceState::Configured {
            return Err(Error::NotConfigured);
        }
        let presenter = self.presenter.as_mut().ok_or(Error::NotConfigured)?;

        let presented = presenter.present(requests)?;
        if presented == Presented::Skipped {
            debug!("No buffer available, waiting for a release");
            self.starved = true;
        }
        Ok(presented)
    }

    /// Tear everything down, presenter first
    pub fn shutdown(&mut self, requests: &mut dyn Requests) {
        if self.state == SurfaceState::Destroyed {
            return;
        }

        if let Some(mut presenter) = self.presenter.take() {
            presenter.finish(requests);
        }
        if matches!(
            self.state,
            SurfaceState::AwaitingConfigure | SurfaceState::Configured
        ) {
            requests.destroy_window();
        }

        debug!("Surface destroyed");
        self.state = SurfaceState::Destroyed;
    }

    fn configure(&mut self, serial: u32, requests: &mut dyn Requests) -> Result<(), Error> {
        let first = match self.state {
            SurfaceState::AwaitingConfigure => true,
            SurfaceState::Configured => false,
            state => {
                return Err(Error::InvalidState {
                    operation: "configure",
                    state,
                })
            }
        };

        requests.ack_configure(serial);
        self.state = SurfaceState::Configured;

        if let Some(size) = self.pending_size.take() {
            self.apply_size(size, requests)?;
        }

        if first {
            info!("Window initial configure ({}x{})", self.size.w, self.size.h);
            if self.presenter.is_some() {
                self.present(requests)?;
            }
        } else {
            debug!("Window configure ({}x{})", self.size.w, self.size.h);
        }
        Ok(())
    }

    fn apply_size(&mut self, size: Size, requests: &mut dyn Requests) -> Result<(), Error> {
        let size = size.or_axes_of(self.size);
        if size == self.size {
            return Ok(());
        }

        debug!("Resizing from {}x{} to {}x{}", self.size.w, self.size.h, size.w, size.h);
        self.size = size;
        if let Some(presenter) = self.presenter.as_mut() {
            presenter.resize(size, requests)?;
        }
        // releases of the dropped buffers never arrive
        if self.starved && self.state == SurfaceState::Configured {
            self.starved = false;
            self.present(requests)?;
        }
        Ok(())
    }

    fn expect_state(&self, operation: &'static str, expected: SurfaceState) -> Result<(), Error> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}
