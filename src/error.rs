use crate::wayland::handshake::SurfaceState;

/// Errors that stop the bootstrap sequence or the presentation loop
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The wayland socket could not be reached
    #[error("Failed to connect to the wayland display: {0}")]
    Connect(#[from] wayland_client::ConnectError),
    /// Reading or dispatching wayland events failed, usually because the compositor went away
    #[error("Failed to dispatch wayland events: {0}")]
    Dispatch(#[from] wayland_client::DispatchError),
    /// Flushing requests to the compositor failed
    #[error("Failed to send requests to the compositor: {0}")]
    Flush(#[source] wayland_client::backend::WaylandError),
    /// `wl_compositor` was never advertised
    #[error("No compositor: `wl_compositor` is not advertised")]
    NoCompositor,
    /// None of the acceptable shell globals was advertised
    #[error("No shell: none of {0:?} is advertised")]
    NoShell(&'static [&'static str]),
    /// Another global the selected backend depends on is missing
    #[error("The compositor does not advertise `{0}`")]
    MissingGlobal(&'static str),
    /// A presentation call happened before the configure handshake completed
    #[error("The surface has not completed its configure handshake")]
    NotConfigured,
    /// An operation of the bootstrap sequence was called out of order
    #[error("Operation `{operation}` is invalid in state {state:?}")]
    InvalidState {
        /// The rejected operation
        operation: &'static str,
        /// State the surface was in
        state: SurfaceState,
    },
    /// The requested backend was not compiled in
    #[error("The `{0}` backend is not available in this build")]
    BackendUnavailable(&'static str),
    /// `$XDG_RUNTIME_DIR` is needed for shared-memory buffers but not set
    #[error("XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,
    /// Creating, sizing or mapping shared memory failed
    #[error("Shared memory failure: {0}")]
    Shm(#[from] std::io::Error),
    /// The client tried to write a buffer the compositor still holds
    #[error("Buffer slot {0} is still owned by the compositor")]
    BufferBusy(usize),
    /// EGL setup or presentation failed
    #[cfg(feature = "backend_egl")]
    #[error(transparent)]
    Egl(#[from] crate::backend::egl::Error),
}
