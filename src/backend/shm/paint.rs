//! The animation painted into shared-memory buffers
//!
//! Every frame fills a shrinking band of rows from the top of the buffer with a solid color.
//! The color walks through blue, then green, then red intensities before starting over.

use wayland_client::protocol::wl_shm;

const OPAQUE: u32 = 0xFF00_0000;

/// Solid color advancing one step per frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorCycle {
    value: u32,
}

impl ColorCycle {
    /// Start at black
    pub fn new() -> Self {
        ColorCycle::default()
    }

    /// Raw 24-bit value of the cycle
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Pixel value to write for the current step in `format`
    ///
    /// Formats other than ARGB8888 and XRGB8888 are painted black.
    pub fn color_for(&self, format: wl_shm::Format) -> u32 {
        match format {
            wl_shm::Format::Argb8888 => OPAQUE | self.value,
            wl_shm::Format::Xrgb8888 => 0x00FF_FFFF - (self.value & 0x00FF_FFFF),
            _ => 0,
        }
    }

    /// Move to the next step
    pub fn advance(&mut self) {
        self.value = if self.value < 0x100 {
            // varying blue
            self.value + 0x01
        } else if self.value < 0x1_0000 {
            // varying green
            self.value + 0x100
        } else if self.value < 0x100_0000 {
            self.value + 0x1_0000
        } else {
            0
        };
    }
}

/// Number of rows painted per frame, counting down from the full height
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSweep {
    height: u32,
    next: u32,
}

impl RowSweep {
    /// Sweep over a buffer of `height` rows
    pub fn new(height: u32) -> Self {
        RowSweep { height, next: 0 }
    }

    /// Restart with a new height
    pub fn reset(&mut self, height: u32) {
        *self = RowSweep::new(height);
    }

    /// Rows to paint for the next frame
    pub fn next_rows(&mut self) -> u32 {
        if self.next == 0 {
            self.next = self.height;
        }
        let rows = self.next;
        self.next = self.next.saturating_sub(1);
        rows
    }
}

/// Fill the first `rows` rows of a tightly packed 32 bit canvas with `color`
pub fn fill_rows(canvas: &mut [u8], width: u32, rows: u32, color: u32) {
    let pixels = width as usize * rows as usize;
    let bytes = color.to_le_bytes();
    canvas
        .chunks_exact_mut(4)
        .take(pixels)
        .for_each(|chunk| chunk.copy_from_slice(&bytes));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_steps_through_channels() {
        let mut cycle = ColorCycle::new();
        for _ in 0..0x100 {
            cycle.advance();
        }
        assert_eq!(cycle.value(), 0x100);

        cycle.advance();
        assert_eq!(cycle.value(), 0x200);

        let mut cycle = ColorCycle { value: 0xFF00 };
        cycle.advance();
        assert_eq!(cycle.value(), 0x1_0000);
        cycle.advance();
        assert_eq!(cycle.value(), 0x2_0000);
    }

    #[test]
    fn cycle_wraps_to_black() {
        let mut cycle = ColorCycle { value: 0xFF_0000 };
        cycle.advance();
        assert_eq!(cycle.value(), 0x100_0000);
        cycle.advance();
        assert_eq!(cycle.value(), 0);
    }

    #[test]
    fn color_depends_on_format() {
        let cycle = ColorCycle { value: 0x20 };
        assert_eq!(cycle.color_for(wl_shm::Format::Argb8888), 0xFF00_0020);
        assert_eq!(cycle.color_for(wl_shm::Format::Xrgb8888), 0x00FF_FFDF);
        assert_eq!(cycle.color_for(wl_shm::Format::Rgb565), 0);
    }

    #[test]
    fn sweep_counts_down_and_wraps() {
        let mut sweep = RowSweep::new(3);
        let rows: Vec<_> = (0..7).map(|_| sweep.next_rows()).collect();
        assert_eq!(rows, vec![3, 2, 1, 3, 2, 1, 3]);
    }

    #[test]
    fn fill_only_touches_requested_rows() {
        let mut canvas = vec![0u8; 4 * 4 * 3];
        fill_rows(&mut canvas, 4, 2, 0xAABBCCDD);

        let (painted, untouched) = canvas.split_at(4 * 4 * 2);
        assert!(painted.chunks_exact(4).all(|px| px == [0xDD, 0xCC, 0xBB, 0xAA]));
        assert!(untouched.iter().all(|byte| *byte == 0));
    }
}
