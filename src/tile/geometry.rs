use std::fmt;

use serde::{Deserialize, Serialize};

/// Width and height in pixels or tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of `tile`-sized tiles needed to cover this size.
    pub fn tiled_by(self, tile: Size) -> Size {
        Size::new(
            self.width.div_ceil(tile.width.max(1)),
            self.height.div_ceil(tile.height.max(1)),
        )
    }

    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether `point` lies inside `[0, width) x [0, height)`.
    pub fn contains(self, point: Point) -> bool {
        point.x < self.width && point.y < self.height
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Size::new(width, height)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Position in pixels or tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Pixel rectangle `[origin, origin + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub origin: Point,
    pub size: Size,
}

impl Region {
    /// Pixel rectangle of tile `tile` in a grid of `tile_size` tiles.
    pub fn of_tile(tile: Point, tile_size: Size) -> Region {
        Region {
            origin: Point::new(tile.x * tile_size.width, tile.y * tile_size.height),
            size: tile_size,
        }
    }

    /// The part of this region inside an image of size `bounds`.
    pub fn clipped_to(self, bounds: Size) -> Option<Region> {
        if !bounds.contains(self.origin) {
            return None;
        }
        let width = self.size.width.min(bounds.width - self.origin.x);
        let height = self.size.height.min(bounds.height - self.origin.y);
        (width > 0 && height > 0).then_some(Region {
            origin: self.origin,
            size: Size::new(width, height),
        })
    }
}
