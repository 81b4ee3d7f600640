use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Rectangle in integer screen coordinates. `x2`/`y2` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Region {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Builds a region from two drag corners in any order.
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Self {
        Self {
            x1: a.0.min(b.0),
            y1: a.1.min(b.1),
            x2: a.0.max(b.0),
            y2: a.1.max(b.1),
        }
    }

    pub fn width(&self) -> i64 {
        i64::from(self.x2) - i64::from(self.x1)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.y2) - i64::from(self.y1)
    }

    pub fn area(&self) -> i64 {
        if self.is_degenerate() {
            0
        } else {
            self.width() * self.height()
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    /// Maps `sub` (absolute screen coordinates) into pixel coordinates of an image
    /// captured from `self`, clamped to the parent's bounds. The result may be
    /// degenerate; callers must check before cropping.
    pub fn to_local(&self, sub: &Region) -> Region {
        to_local(self, sub)
    }

    /// Crops `image` to this region. The region must already be local to the image.
    pub fn crop(&self, image: &DynamicImage) -> Option<DynamicImage> {
        let bounds = Region::new(
            0,
            0,
            i32::try_from(image.width()).ok()?,
            i32::try_from(image.height()).ok()?,
        );
        let local = to_local(&bounds, self);
        if local.is_degenerate() {
            return None;
        }
        Some(image.crop_imm(
            local.x1 as u32,
            local.y1 as u32,
            local.width() as u32,
            local.height() as u32,
        ))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}) - ({}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Shifts `sub` so it is relative to `parent`'s origin, then clamps every
/// coordinate into `[0, parent_width] x [0, parent_height]`.
pub fn to_local(parent: &Region, sub: &Region) -> Region {
    let max_x = parent.width().max(0);
    let max_y = parent.height().max(0);
    let shift = |value: i32, origin: i32, max: i64| -> i32 {
        // Bounded by max, which itself fits in i32 for any real screen.
        (i64::from(value) - i64::from(origin)).clamp(0, max) as i32
    };

    Region {
        x1: shift(sub.x1, parent.x1, max_x),
        y1: shift(sub.y1, parent.y1, max_y),
        x2: shift(sub.x2, parent.x1, max_x),
        y2: shift(sub.y2, parent.y1, max_y),
    }
}
