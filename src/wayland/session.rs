//! A live connection to the compositor
//!
//! [`Session`] owns the connection, the [`Sequencer`] and the protocol objects created on its
//! behalf. It is the state of the event queue: every `Dispatch` implementation below turns a
//! protocol event into an [`Event`] and hands it to the sequencer, which answers through the
//! [`Requests`] implementation of [`Objects`].

use std::os::unix::io::BorrowedFd;

use tracing::{debug, error, info, trace, warn};
use wayland_client::{
    delegate_noop,
    protocol::{
        wl_buffer, wl_callback, wl_compositor, wl_registry, wl_shell, wl_shell_surface, wl_shm,
        wl_shm_pool, wl_surface,
    },
    Connection, Dispatch, EventQueue, Proxy, QueueHandle, WEnum,
};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use crate::{
    backend::{BufferId, BufferLayout, Presenter},
    config::{BackendKind, WindowConfig},
    utils::{Rectangle, Size},
    wayland::{
        handshake::{Control, Event, Requests, Sequencer},
        registry::{BindRequest, Global, Interface, ShellKind},
    },
    Error,
};

/// Toplevel role of the surface
#[derive(Debug)]
enum Role {
    Xdg {
        surface: xdg_surface::XdgSurface,
        toplevel: xdg_toplevel::XdgToplevel,
    },
    Shell(wl_shell_surface::WlShellSurface),
}

/// Protocol objects of the session
#[derive(Debug)]
pub struct Objects {
    qh: QueueHandle<Session>,
    registry: wl_registry::WlRegistry,
    compositor: Option<(wl_compositor::WlCompositor, u32)>,
    wm_base: Option<xdg_wm_base::XdgWmBase>,
    shell: Option<wl_shell::WlShell>,
    shm: Option<wl_shm::WlShm>,
    surface: Option<wl_surface::WlSurface>,
    role: Option<Role>,
    buffers: Vec<(BufferId, wl_buffer::WlBuffer)>,
}

impl Objects {
    fn new(registry: wl_registry::WlRegistry, qh: QueueHandle<Session>) -> Self {
        Objects {
            qh,
            registry,
            compositor: None,
            wm_base: None,
            shell: None,
            shm: None,
            surface: None,
            role: None,
            buffers: Vec::new(),
        }
    }

    /// The `wl_surface` of the window, once created
    pub fn surface(&self) -> Option<&wl_surface::WlSurface> {
        self.surface.as_ref()
    }
}

impl Requests for Objects {
    fn bind(&mut self, request: BindRequest) {
        let BindRequest {
            name,
            interface,
            version,
        } = request;
        debug!("Binding {} v{} (name {})", interface.name(), version, name);

        let qh = &self.qh;
        match interface {
            Interface::Compositor => {
                let compositor = self
                    .registry
                    .bind::<wl_compositor::WlCompositor, _, _>(name, version, qh, ());
                self.compositor = Some((compositor, version));
            }
            Interface::XdgWmBase => {
                self.wm_base = Some(self.registry.bind::<xdg_wm_base::XdgWmBase, _, _>(name, version, qh, ()));
            }
            Interface::WlShell => {
                self.shell = Some(self.registry.bind::<wl_shell::WlShell, _, _>(name, version, qh, ()));
            }
            Interface::Shm => {
                self.shm = Some(self.registry.bind::<wl_shm::WlShm, _, _>(name, version, qh, ()));
            }
        }
    }

    fn create_window(&mut self, shell: ShellKind, title: &str) -> Result<(), Error> {
        let (compositor, _) = self
            .compositor
            .as_ref()
            .ok_or(Error::MissingGlobal(Interface::Compositor.name()))?;
        let surface = compositor.create_surface(&self.qh, ());

        let role = match shell {
            ShellKind::Xdg => {
                let wm_base = self
                    .wm_base
                    .as_ref()
                    .ok_or(Error::MissingGlobal(Interface::XdgWmBase.name()))?;
                let xdg_surface = wm_base.get_xdg_surface(&surface, &self.qh, ());
                let toplevel = xdg_surface.get_toplevel(&self.qh, ());
                toplevel.set_title(title.to_owned());
                Role::Xdg {
                    surface: xdg_surface,
                    toplevel,
                }
            }
            ShellKind::WlShell => {
                let wl_shell = self
                    .shell
                    .as_ref()
                    .ok_or(Error::MissingGlobal(Interface::WlShell.name()))?;
                let shell_surface = wl_shell.get_shell_surface(&surface, &self.qh, ());
                shell_surface.set_toplevel();
                shell_surface.set_title(title.to_owned());
                Role::Shell(shell_surface)
            }
        };
        surface.commit();

        self.surface = Some(surface);
        self.role = Some(role);
        Ok(())
    }

    fn pong(&mut self, source: ShellKind, serial: u32) {
        match source {
            ShellKind::Xdg => {
                if let Some(wm_base) = self.wm_base.as_ref() {
                    wm_base.pong(serial);
                }
            }
            ShellKind::WlShell => {
                if let Some(Role::Shell(shell_surface)) = self.role.as_ref() {
                    shell_surface.pong(serial);
                }
            }
        }
    }

    fn ack_configure(&mut self, serial: u32) {
        if let Some(Role::Xdg { surface, .. }) = self.role.as_ref() {
            surface.ack_configure(serial);
        }
    }

    fn commit(&mut self) {
        if let Some(surface) = self.surface.as_ref() {
            surface.commit();
        }
    }

    fn frame(&mut self) {
        if let Some(surface) = self.surface.as_ref() {
            surface.frame(&self.qh, ());
        }
    }

    fn damage(&mut self, damage: Rectangle) {
        let Some(surface) = self.surface.as_ref() else {
            return;
        };
        match self.compositor.as_ref() {
            Some((_, version)) if *version >= 4 => {
                surface.damage_buffer(damage.x, damage.y, damage.width, damage.height)
            }
            _ => surface.damage(damage.x, damage.y, damage.width, damage.height),
        }
    }

    fn create_buffers(
        &mut self,
        fd: BorrowedFd<'_>,
        pool_size: usize,
        buffers: &[BufferLayout],
    ) -> Result<(), Error> {
        let shm = self.shm.as_ref().ok_or(Error::MissingGlobal(Interface::Shm.name()))?;
        let pool_size = i32::try_from(pool_size).map_err(|_| {
            Error::Shm(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "shm pool exceeds the protocol size limit",
            ))
        })?;

        let pool = shm.create_pool(fd, pool_size, &self.qh, ());
        for layout in buffers {
            let buffer = pool.create_buffer(
                layout.offset,
                layout.width,
                layout.height,
                layout.stride,
                layout.format,
                &self.qh,
                layout.id,
            );
            self.buffers.push((layout.id, buffer));
        }
        // buffers keep the memory alive on the compositor side
        pool.destroy();
        Ok(())
    }

    fn destroy_buffers(&mut self) {
        for (_, buffer) in self.buffers.drain(..) {
            buffer.destroy();
        }
    }

    fn attach(&mut self, buffer: Option<BufferId>) {
        let Some(surface) = self.surface.as_ref() else {
            return;
        };
        let buffer = buffer.and_then(|id| {
            self.buffers
                .iter()
                .find(|(candidate, _)| *candidate == id)
                .map(|(_, buffer)| buffer)
        });
        surface.attach(buffer, 0, 0);
    }

    fn destroy_window(&mut self) {
        match self.role.take() {
            Some(Role::Xdg { surface, toplevel }) => {
                toplevel.destroy();
                surface.destroy();
            }
            // wl_shell_surface has no destructor, it dies with the surface
            Some(Role::Shell(_)) | None => {}
        }
        if let Some(surface) = self.surface.take() {
            surface.destroy();
        }
    }
}

/// State of the event queue driving the bootstrap
#[derive(Debug)]
pub struct Session {
    conn: Connection,
    sequencer: Sequencer,
    objects: Objects,
    error: Option<Error>,
    exit: bool,
}

impl Session {
    /// Connect to the compositor named by `$WAYLAND_DISPLAY`, bind the globals, create the
    /// window and install the presenter
    ///
    /// The window is not displayable yet when this returns with the xdg shell, the initial
    /// configure arrives while [`Session::run`] dispatches.
    pub fn connect(config: WindowConfig) -> Result<(Session, EventQueue<Session>), Error> {
        let conn = Connection::connect_to_env()?;
        info!("Connected to the wayland display");

        let mut queue = conn.new_event_queue();
        let qh = queue.handle();
        let registry = conn.display().get_registry(&qh, ());

        let mut session = Session {
            conn,
            sequencer: Sequencer::new(config),
            objects: Objects::new(registry, qh),
            error: None,
            exit: false,
        };

        // globals, then the events of the freshly bound globals (shm formats)
        queue.roundtrip(&mut session)?;
        session.take_error()?;
        queue.roundtrip(&mut session)?;
        session.take_error()?;

        session.sequencer.finish_registry()?;
        session.sequencer.create_window(&mut session.objects)?;

        let presenter = session.create_presenter()?;
        session.sequencer.attach_presenter(presenter, &mut session.objects)?;
        session.conn.flush().map_err(Error::Flush)?;

        Ok((session, queue))
    }

    /// Dispatch events until the window is closed or the connection fails
    pub fn run(&mut self, queue: &mut EventQueue<Session>) -> Result<(), Error> {
        loop {
            queue.blocking_dispatch(self)?;
            self.take_error()?;
            if self.exit {
                info!("Leaving the event loop");
                return Ok(());
            }
        }
    }

    /// The bootstrap state machine
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    fn create_presenter(&self) -> Result<Box<dyn Presenter>, Error> {
        let config = self.sequencer.config();
        match config.backend {
            #[cfg(feature = "backend_egl")]
            BackendKind::Egl => {
                let surface = self
                    .objects
                    .surface()
                    .ok_or(Error::NotConfigured)?
                    .id();
                let display = self.conn.backend().display_ptr() as *mut std::os::raw::c_void;
                // SAFETY: the display pointer belongs to `self.conn`, which outlives the
                // presenter since the sequencer drops it on shutdown
                let presenter = unsafe {
                    crate::backend::egl::EglPresenter::new(
                        display,
                        surface,
                        self.sequencer.size(),
                        config.clear_color,
                    )?
                };
                Ok(Box::new(presenter))
            }
            #[cfg(feature = "backend_shm")]
            BackendKind::Shm => Ok(Box::new(crate::backend::shm::ShmPresenter::new(
                config.runtime_dir.clone(),
                self.sequencer.formats(),
            ))),
            #[allow(unreachable_patterns)]
            backend => Err(Error::BackendUnavailable(backend.name())),
        }
    }

    fn dispatch(&mut self, event: Event) {
        if (self.error.is_some() || self.exit) && !event.needs_reply() {
            trace!("Ignoring {:?}, the loop is stopping", event);
            return;
        }
        match self.sequencer.handle(event, &mut self.objects) {
            Ok(Control::Continue) => {}
            Ok(Control::Exit) => self.exit = true,
            Err(err) => {
                error!("Event handling failed: {}", err);
                self.error.get_or_insert(err);
            }
        }
    }

    fn take_error(&mut self) -> Result<(), Error> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.sequencer.shutdown(&mut self.objects);
        if let Err(err) = self.conn.flush() {
            warn!("Failed to flush the final requests: {}", err);
        }
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for Session {
    fn event(
        state: &mut Self,
        _: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                trace!("Global {} v{} (name {})", interface, version, name);
                state.dispatch(Event::Global(Global::new(name, interface, version)));
            }
            wl_registry::Event::GlobalRemove { name } => state.dispatch(Event::GlobalRemove(name)),
            _ => {}
        }
    }
}

impl Dispatch<wl_shm::WlShm, ()> for Session {
    fn event(
        state: &mut Self,
        _: &wl_shm::WlShm,
        event: wl_shm::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_shm::Event::Format { format } = event {
            match format {
                WEnum::Value(format) => state.dispatch(Event::ShmFormat(format)),
                WEnum::Unknown(raw) => debug!("Ignoring unknown shm format {:#x}", raw),
            }
        }
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for Session {
    fn event(
        state: &mut Self,
        _: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            state.dispatch(Event::Ping {
                source: ShellKind::Xdg,
                serial,
            });
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for Session {
    fn event(
        state: &mut Self,
        _: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            state.dispatch(Event::SurfaceConfigure { serial });
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for Session {
    fn event(
        state: &mut Self,
        _: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                state.dispatch(Event::ToplevelConfigure {
                    size: Size::from_configure(width, height),
                });
            }
            xdg_toplevel::Event::Close => state.dispatch(Event::Close),
            _ => {}
        }
    }
}

impl Dispatch<wl_shell_surface::WlShellSurface, ()> for Session {
    fn event(
        state: &mut Self,
        _: &wl_shell_surface::WlShellSurface,
        event: wl_shell_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_shell_surface::Event::Ping { serial } => state.dispatch(Event::Ping {
                source: ShellKind::WlShell,
                serial,
            }),
            wl_shell_surface::Event::Configure { width, height, .. } => {
                state.dispatch(Event::ShellSurfaceConfigure {
                    size: Size::from_configure(width, height),
                });
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_callback::WlCallback, ()> for Session {
    fn event(
        state: &mut Self,
        _: &wl_callback::WlCallback,
        event: wl_callback::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { callback_data } = event {
            state.dispatch(Event::Frame { time: callback_data });
        }
    }
}

impl Dispatch<wl_buffer::WlBuffer, BufferId> for Session {
    fn event(
        state: &mut Self,
        _: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        id: &BufferId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            state.dispatch(Event::BufferReleased(*id));
        }
    }
}

delegate_noop!(Session: wl_compositor::WlCompositor);
delegate_noop!(Session: wl_shell::WlShell);
delegate_noop!(Session: wl_shm_pool::WlShmPool);
delegate_noop!(Session: ignore wl_surface::WlSurface);
