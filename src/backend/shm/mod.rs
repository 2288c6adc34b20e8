//! Shared-memory presentation
//!
//! Pixels are painted by the CPU into `wl_shm` buffers. The pool holds two buffers so a frame
//! can be drawn while the compositor still reads the previous one. When both are held by the
//! compositor the frame is skipped and drawing resumes as soon as one is released.
//!
//! Frames are painted into a client side copy of the surface contents, which is then copied
//! whole into the free slot. Consecutive commits therefore only differ by the painted rows,
//! which is exactly the damage sent along.

use std::path::PathBuf;

use tracing::{debug, info, warn};
use wayland_client::protocol::wl_shm;

use crate::{
    backend::{BufferId, Presented, Presenter},
    utils::{Rectangle, Size},
    wayland::handshake::Requests,
    Error,
};

mod file;
pub mod paint;
pub mod pool;

pub use self::file::create_anonymous_file;
use self::paint::{ColorCycle, RowSweep};
pub use self::pool::ShmPool;

/// Buffers per pool
pub const SLOTS: usize = 2;

/// Pick the format to paint in from the ones advertised by `wl_shm`
///
/// The first of ARGB8888 or XRGB8888 wins. If neither was announced the first announced
/// format is used, and with no announcement at all ARGB8888, which every compositor supports.
pub fn choose_format(formats: &[wl_shm::Format]) -> wl_shm::Format {
    formats
        .iter()
        .copied()
        .find(|format| matches!(format, wl_shm::Format::Argb8888 | wl_shm::Format::Xrgb8888))
        .or_else(|| formats.first().copied())
        .unwrap_or(wl_shm::Format::Argb8888)
}

/// [`Presenter`] painting a color animation into shared memory
#[derive(Debug)]
pub struct ShmPresenter {
    runtime_dir: Option<PathBuf>,
    format: wl_shm::Format,
    pool: Option<ShmPool>,
    frame: Vec<u8>,
    generation: u32,
    colors: ColorCycle,
    sweep: RowSweep,
}

impl ShmPresenter {
    /// Create a presenter allocating its buffers in `runtime_dir`
    pub fn new(runtime_dir: Option<PathBuf>, formats: &[wl_shm::Format]) -> Self {
        let format = choose_format(formats);
        info!("Chosen shm format is {:?}", format);
        if !matches!(format, wl_shm::Format::Argb8888 | wl_shm::Format::Xrgb8888) {
            warn!("Format {:?} is not painted, the window will stay black", format);
        }

        ShmPresenter {
            runtime_dir,
            format,
            pool: None,
            frame: Vec::new(),
            generation: 0,
            colors: ColorCycle::new(),
            sweep: RowSweep::new(0),
        }
    }

    /// Format the buffers use
    pub fn format(&self) -> wl_shm::Format {
        self.format
    }

    fn allocate(&mut self, size: Size, requests: &mut dyn Requests) -> Result<(), Error> {
        let generation = self.generation.wrapping_add(1);
        let pool = ShmPool::new(self.runtime_dir.as_deref(), size, self.format, SLOTS, generation)?;

        if self.pool.is_some() {
            requests.destroy_buffers();
        }
        requests.create_buffers(pool.fd(), pool.len(), &pool.layouts())?;
        debug!("Allocated {} shm buffers of {}x{}", SLOTS, size.w, size.h);

        self.generation = generation;
        self.sweep.reset(size.h);
        self.frame.clear();
        self.frame.resize(pool.buffer_len(), 0);
        self.pool = Some(pool);
        Ok(())
    }
}

impl Presenter for ShmPresenter {
    fn name(&self) -> &'static str {
        "shm"
    }

    fn init(&mut self, size: Size, requests: &mut dyn Requests) -> Result<(), Error> {
        self.allocate(size, requests)
    }

    fn resize(&mut self, size: Size, requests: &mut dyn Requests) -> Result<(), Error> {
        self.allocate(size, requests)
    }

    fn present(&mut self, requests: &mut dyn Requests) -> Result<Presented, Error> {
        let pool = self.pool.as_mut().ok_or(Error::NotConfigured)?;
        let slot = match pool.free_slot() {
            Some(slot) => slot,
            None => return Ok(Presented::Skipped),
        };

        let size = pool.size();
        let rows = self.sweep.next_rows();
        let color = self.colors.color_for(self.format);
        paint::fill_rows(&mut self.frame, size.w, rows, color);
        self.colors.advance();

        // the slot still holds an older frame, bring it up to date before handing it out
        let canvas = pool.canvas(slot).ok_or(Error::BufferBusy(slot))?;
        canvas.copy_from_slice(&self.frame);

        requests.damage(Rectangle::from_size(size.w, rows));
        requests.frame();
        let buffer = pool.attach(slot)?;
        requests.attach(Some(buffer));
        requests.commit();

        Ok(Presented::Frame)
    }

    fn release(&mut self, buffer: BufferId) {
        if let Some(pool) = self.pool.as_mut() {
            pool.release(buffer);
        }
    }

    fn finish(&mut self, requests: &mut dyn Requests) {
        if self.pool.take().is_some() {
            requests.destroy_buffers();
        }
    }
}
