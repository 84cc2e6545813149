use serde::{Deserialize, Serialize};

use slicecomp_core::{Point, Size};

/// World-space mapping of one viewport.
///
/// Screen coordinates are physical pixels relative to the viewport's
/// lower-left corner. World coordinates are physical units (slice voxels times
/// spacing).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    /// World position shown at the center of the viewport.
    pub center: Point,
    /// Logical screen pixels per world unit, including any thumbnail scaling.
    pub zoom: f64,
    /// Viewport size in physical pixels.
    pub size: Size,
    /// Physical pixels per logical pixel.
    pub pixel_ratio: f64,
    /// World units per slice voxel.
    pub spacing: [f64; 2],
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            center: Point::new(0.0, 0.0),
            zoom: 1.0,
            size: Size::default(),
            pixel_ratio: 1.0,
            spacing: [1.0, 1.0],
        }
    }
}

impl ViewTransform {
    /// Physical pixels per world unit.
    pub fn pixels_per_unit(&self) -> f64 {
        self.zoom * self.pixel_ratio
    }

    /// World height covered by the viewport, as used for the camera's parallel scale.
    pub fn parallel_scale(&self) -> f64 {
        (self.size.height as f64 / self.pixel_ratio) / self.zoom
    }

    pub fn screen_to_world(&self, screen: Point) -> Point {
        let ppu = self.pixels_per_unit();
        Point::new(
            (screen.x - self.size.width as f64 / 2.0) / ppu + self.center.x,
            (screen.y - self.size.height as f64 / 2.0) / ppu + self.center.y,
        )
    }

    pub fn world_to_screen(&self, world: Point) -> Point {
        let ppu = self.pixels_per_unit();
        Point::new(
            (world.x - self.center.x) * ppu + self.size.width as f64 / 2.0,
            (world.y - self.center.y) * ppu + self.size.height as f64 / 2.0,
        )
    }

    pub fn slice_to_world(&self, slice: Point) -> Point {
        Point::new(slice.x * self.spacing[0], slice.y * self.spacing[1])
    }

    pub fn world_to_slice(&self, world: Point) -> Point {
        Point::new(world.x / self.spacing[0], world.y / self.spacing[1])
    }

    /// Visible world rectangle as (min_x, min_y, max_x, max_y).
    pub fn visible_bounds(&self) -> (f64, f64, f64, f64) {
        let ppu = self.pixels_per_unit();
        let half_w = self.size.width as f64 / (2.0 * ppu);
        let half_h = self.size.height as f64 / (2.0 * ppu);
        (
            self.center.x - half_w,
            self.center.y - half_h,
            self.center.x + half_w,
            self.center.y + half_h,
        )
    }
}

/// Zoom multiplier for a thumbnail so that the whole canvas fits into it.
pub fn thumbnail_zoom_factor(thumbnail: Size, canvas: Size) -> f64 {
    if canvas.is_empty() {
        return 1.0;
    }
    let sx = thumbnail.width as f64 / canvas.width as f64;
    let sy = thumbnail.height as f64 / canvas.height as f64;
    sx.max(sy)
}
