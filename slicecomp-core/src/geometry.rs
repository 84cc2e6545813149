use serde::{Deserialize, Serialize};

/// A 2D point in world (physical) or slice coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// A 3D vector used for camera parameters.
pub type Vec3 = [f64; 3];

/// Pixel dimensions of a drawing surface or viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A rectangle in surface pixels, origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn top(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x as f64 && x < self.right() as f64 && y >= self.y as f64 && y < self.top() as f64
    }

    /// Whether the two rectangles share any interior area.
    pub fn overlaps(&self, other: &PixelRect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.top() && other.y < self.top()
    }

    /// Map the rectangle edges into [0, 1] relative to the surface.
    pub fn normalized(&self, surface: Size) -> NormalizedRect {
        if surface.is_empty() {
            return NormalizedRect::default();
        }
        let w = surface.width as f64;
        let h = surface.height as f64;
        NormalizedRect {
            x0: (self.x as f64 / w).clamp(0.0, 1.0),
            y0: (self.y as f64 / h).clamp(0.0, 1.0),
            x1: (self.right() as f64 / w).clamp(0.0, 1.0),
            y1: (self.top() as f64 / h).clamp(0.0, 1.0),
        }
    }
}

/// A rectangle in normalized surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Default for NormalizedRect {
    fn default() -> Self {
        Self {
            x0: 0.0,
            y0: 0.0,
            x1: 1.0,
            y1: 1.0,
        }
    }
}

impl NormalizedRect {
    pub fn is_within_unit_square(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
            && self.x0 <= self.x1
            && self.y0 <= self.y1
    }
}

/// An RGB color with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub fn to_f32_array(&self, opacity: f64) -> [f32; 4] {
        [self.r as f32, self.g as f32, self.b as f32, opacity as f32]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}
