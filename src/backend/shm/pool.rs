//! A double-buffered shared-memory pool
//!
//! One anonymous file is mapped once and cut into equally sized buffer slots. A slot belongs to
//! the client until it is attached to the surface, and to the compositor from then on until the
//! matching `wl_buffer.release`. [`ShmPool::canvas`] refuses to hand out memory the compositor
//! currently owns.

use std::{
    fs::File,
    io,
    os::unix::io::{AsFd, BorrowedFd},
    path::Path,
    ptr::{self, NonNull},
    slice,
};

use rustix::mm::{self, MapFlags, ProtFlags};
use tracing::{trace, warn};
use wayland_client::protocol::wl_shm;

use super::file::create_anonymous_file;
use crate::{
    backend::{BufferId, BufferLayout},
    utils::Size,
    Error,
};

/// Bytes per pixel of every format painted by this crate
pub const BYTES_PER_PIXEL: usize = 4;

struct MemMap {
    ptr: NonNull<u8>,
    len: usize,
}

impl MemMap {
    fn new(fd: BorrowedFd<'_>, len: usize) -> io::Result<MemMap> {
        // SAFETY: a fresh shared mapping of a file we own, nothing else aliases it in this process
        let ptr = unsafe {
            mm::mmap(
                ptr::null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                fd,
                0,
            )?
        };
        let ptr = NonNull::new(ptr as *mut u8).ok_or_else(|| io::Error::from(io::ErrorKind::Other))?;
        Ok(MemMap { ptr, len })
    }

    fn slice_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        assert!(offset + len <= self.len, "slice out of the mapping");
        // SAFETY: bounds checked above, the mapping lives as long as self
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr().add(offset), len) }
    }
}

impl Drop for MemMap {
    fn drop(&mut self) {
        // SAFETY: ptr and len come from the successful mmap in `new`
        if let Err(err) = unsafe { mm::munmap(self.ptr.as_ptr().cast(), self.len) } {
            warn!("Failed to unmap shm pool: {}", err);
        }
    }
}

impl std::fmt::Debug for MemMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemMap")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: usize,
    busy: bool,
}

/// Buffers of a single size and format sharing one mapping
#[derive(Debug)]
pub struct ShmPool {
    map: MemMap,
    file: File,
    generation: u32,
    size: Size,
    format: wl_shm::Format,
    slots: Vec<Slot>,
}

impl ShmPool {
    /// Allocate `slots` buffers of `size` in a new file inside `dir`
    pub fn new(
        dir: Option<&Path>,
        size: Size,
        format: wl_shm::Format,
        slots: usize,
        generation: u32,
    ) -> Result<ShmPool, Error> {
        if size.is_empty() || slots == 0 {
            return Err(Error::Shm(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Cannot allocate {} buffers of {}x{}", slots, size.w, size.h),
            )));
        }

        let buffer_len = size.area() * BYTES_PER_PIXEL;
        let len = buffer_len * slots;
        if i32::try_from(len).is_err() {
            return Err(Error::Shm(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("A pool of {} bytes is too large", len),
            )));
        }

        let file = create_anonymous_file(dir, len as u64)?;
        let map = MemMap::new(file.as_fd(), len)?;
        trace!("Mapped shm pool of {} bytes ({} slots)", len, slots);

        Ok(ShmPool {
            map,
            file,
            generation,
            size,
            format,
            slots: (0..slots)
                .map(|index| Slot {
                    offset: index * buffer_len,
                    busy: false,
                })
                .collect(),
        })
    }

    /// File descriptor to share with the compositor
    pub fn fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }

    /// Total size of the pool in bytes
    pub(crate) fn len(&self) -> usize {
        self.map.len
    }

    /// Size of every buffer
    pub fn size(&self) -> Size {
        self.size
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.size.w as usize * BYTES_PER_PIXEL
    }

    /// Bytes per buffer
    pub fn buffer_len(&self) -> usize {
        self.stride() * self.size.h as usize
    }

    /// Description of every buffer, for creating the matching `wl_buffer`s
    pub fn layouts(&self) -> Vec<BufferLayout> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| BufferLayout {
                id: BufferId {
                    generation: self.generation,
                    slot: index,
                },
                offset: slot.offset as i32,
                width: self.size.w as i32,
                height: self.size.h as i32,
                stride: self.stride() as i32,
                format: self.format,
            })
            .collect()
    }

    /// First slot the client owns
    pub fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|slot| !slot.busy)
    }

    /// Whether the compositor currently holds `slot`
    pub fn is_busy(&self, slot: usize) -> bool {
        self.slots.get(slot).map(|slot| slot.busy).unwrap_or(false)
    }

    /// Writable memory of `slot`, or `None` while the compositor holds it
    pub fn canvas(&mut self, slot: usize) -> Option<&mut [u8]> {
        if self.is_busy(slot) {
            return None;
        }
        let offset = self.slots.get(slot)?.offset;
        let len = self.buffer_len();
        Some(self.map.slice_mut(offset, len))
    }

    /// Hand `slot` to the compositor
    pub fn attach(&mut self, slot: usize) -> Result<BufferId, Error> {
        let generation = self.generation;
        match self.slots.get_mut(slot) {
            Some(entry) if !entry.busy => {
                entry.busy = true;
                Ok(BufferId { generation, slot })
            }
            _ => Err(Error::BufferBusy(slot)),
        }
    }

    /// Take a buffer back from the compositor
    ///
    /// Returns `false` for buffers of another generation or unknown slots.
    pub fn release(&mut self, buffer: BufferId) -> bool {
        if buffer.generation != self.generation {
            trace!("Ignoring release of stale buffer {:?}", buffer);
            return false;
        }
        match self.slots.get_mut(buffer.slot) {
            Some(slot) => {
                slot.busy = false;
                true
            }
            None => false,
        }
    }
}
