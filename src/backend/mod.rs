//! Presentation backends
//!
//! A backend turns a configured surface into something visible. Two of them exist:
//!
//! - [`egl`] renders with OpenGL ES 2 and lets EGL swap buffers onto the surface,
//! - [`shm`] paints pixels by hand into shared-memory buffers.
//!
//! Both implement [`Presenter`] and are driven the same way by the
//! [`Sequencer`](crate::wayland::handshake::Sequencer): `init` once the surface exists,
//! `present` for every frame, `resize` whenever the compositor settles on a new size.

use std::fmt;

use wayland_client::protocol::wl_shm;

use crate::{utils::Size, wayland::handshake::Requests, Error};

#[cfg(feature = "backend_egl")]
pub mod egl;
#[cfg(feature = "backend_shm")]
pub mod shm;

/// Outcome of a presentation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presented {
    /// A new frame was submitted
    Frame,
    /// Nothing could be drawn right now, the backend waits for a buffer release
    Skipped,
}

/// Strategy producing the pixels of the surface
pub trait Presenter: fmt::Debug {
    /// Human readable backend name
    fn name(&self) -> &'static str;

    /// Prepare the resources needed for presenting at `size`
    fn init(&mut self, size: Size, requests: &mut dyn Requests) -> Result<(), Error>;

    /// Adapt to a new surface size; the next presented frame has exactly this size
    fn resize(&mut self, size: Size, requests: &mut dyn Requests) -> Result<(), Error>;

    /// Draw and submit a frame, requesting a frame callback for the next one
    fn present(&mut self, requests: &mut dyn Requests) -> Result<Presented, Error>;

    /// The compositor gave a buffer back
    fn release(&mut self, _buffer: BufferId) {}

    /// Release protocol resources before the surface goes away
    fn finish(&mut self, _requests: &mut dyn Requests) {}
}

/// Identifies a `wl_buffer` handed out by a shared-memory pool
///
/// The generation changes whenever the pool is reallocated, so releases of buffers from
/// an earlier allocation can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId {
    /// Allocation the buffer belongs to
    pub generation: u32,
    /// Slot inside the pool
    pub slot: usize,
}

/// Placement of a buffer inside a shared-memory pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    /// Buffer the layout describes
    pub id: BufferId,
    /// Byte offset inside the pool
    pub offset: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
    /// Bytes per row
    pub stride: i32,
    /// Pixel format
    pub format: wl_shm::Format,
}
