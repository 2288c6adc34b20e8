/// Dimensions of a surface, in surface-local pixels
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    /// horizontal extent
    pub w: u32,
    /// vertical extent
    pub h: u32,
}

impl Size {
    /// Create a new size
    pub const fn new(w: u32, h: u32) -> Self {
        Size { w, h }
    }

    /// Size from the signed dimensions found in configure events.
    ///
    /// Compositors send `0` (or a negative value) on an axis to let the client pick it.
    /// Such an axis is kept at `0`, see [`Size::or_axes_of`]. `None` is returned when
    /// both axes are left to the client.
    pub fn from_configure(w: i32, h: i32) -> Option<Self> {
        let size = Size::new(w.max(0) as u32, h.max(0) as u32);
        if size.w == 0 && size.h == 0 {
            None
        } else {
            Some(size)
        }
    }

    /// Fill the axes left at `0` with the ones of `current`
    pub fn or_axes_of(self, current: Size) -> Size {
        Size {
            w: if self.w == 0 { current.w } else { self.w },
            h: if self.h == 0 { current.h } else { self.h },
        }
    }

    /// Number of pixels covered
    pub fn area(&self) -> usize {
        self.w as usize * self.h as usize
    }

    /// Whether either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

impl From<(u32, u32)> for Size {
    fn from((w, h): (u32, u32)) -> Self {
        Size::new(w, h)
    }
}

/// A rectangle defined by its top-left corner and dimensions
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Rectangle {
    /// horizontal position of the top-left corner of the rectangle, in buffer coordinates
    pub x: i32,
    /// vertical position of the top-left corner of the rectangle, in buffer coordinates
    pub y: i32,
    /// width of the rectangle
    pub width: i32,
    /// height of the rectangle
    pub height: i32,
}

impl Rectangle {
    /// Rectangle anchored at the origin covering `width` x `height`
    pub fn from_size(width: u32, height: u32) -> Self {
        Rectangle {
            x: 0,
            y: 0,
            width: width as i32,
            height: height as i32,
        }
    }
}
