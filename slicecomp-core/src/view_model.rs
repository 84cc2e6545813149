use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{ChangeEvent, EventBucket};
use crate::geometry::{Point, Size};
use crate::layer::{LayerId, SliceAxis};

/// Zoom factor bounds, in screen pixels per physical unit.
pub const MIN_ZOOM: f64 = 0.001;
pub const MAX_ZOOM: f64 = 1_000_000.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TilingError {
    #[error("Tiling must have at least one row and one column (got {rows}x{cols})")]
    EmptyGrid { rows: u32, cols: u32 },

    #[error("Tiling {rows}x{cols} needs {expected} cell assignments, got {actual}")]
    CellCountMismatch {
        rows: u32,
        cols: u32,
        expected: usize,
        actual: usize,
    },
}

/// Which layer occupies which cell of the slice window.
///
/// `cells` is row-major with row 0 at the top. Thumbnails are drawn over the
/// grid, stacked from a corner, and do not take part in the tiling.
///
/// Deserialization goes through [`TilingConfig::new`], so a config read from
/// disk holds the same invariants as one built in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTilingConfig")]
pub struct TilingConfig {
    rows: u32,
    cols: u32,
    cells: Vec<LayerId>,
    thumbnails: Vec<LayerId>,
}

#[derive(Deserialize)]
struct RawTilingConfig {
    rows: u32,
    cols: u32,
    cells: Vec<LayerId>,
    #[serde(default)]
    thumbnails: Vec<LayerId>,
}

impl TryFrom<RawTilingConfig> for TilingConfig {
    type Error = TilingError;

    fn try_from(raw: RawTilingConfig) -> Result<Self, Self::Error> {
        Ok(Self::new(raw.rows, raw.cols, raw.cells)?.with_thumbnails(raw.thumbnails))
    }
}

impl TilingConfig {
    pub fn new(rows: u32, cols: u32, cells: Vec<LayerId>) -> Result<Self, TilingError> {
        if rows == 0 || cols == 0 {
            return Err(TilingError::EmptyGrid { rows, cols });
        }
        let expected = rows as usize * cols as usize;
        if cells.len() != expected {
            return Err(TilingError::CellCountMismatch {
                rows,
                cols,
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            cells,
            thumbnails: Vec::new(),
        })
    }

    /// One full-size cell.
    pub fn single(layer: LayerId) -> Self {
        Self {
            rows: 1,
            cols: 1,
            cells: vec![layer],
            thumbnails: Vec::new(),
        }
    }

    pub fn with_thumbnails(mut self, thumbnails: Vec<LayerId>) -> Self {
        self.thumbnails = thumbnails;
        self
    }

    /// Build the default arrangement for a set of base layers.
    ///
    /// A 1x1 grid shows the selected layer (or the first one) full size and every
    /// other base layer as a thumbnail. A larger grid fills cells in layer order;
    /// unused cells repeat the last layer and surplus layers are not shown.
    pub fn for_layers(
        base_layers: &[LayerId],
        rows: u32,
        cols: u32,
        selected: Option<LayerId>,
    ) -> Result<Self, TilingError> {
        if rows == 0 || cols == 0 {
            return Err(TilingError::EmptyGrid { rows, cols });
        }
        let Some(&first) = base_layers.first() else {
            return Err(TilingError::CellCountMismatch {
                rows,
                cols,
                expected: rows as usize * cols as usize,
                actual: 0,
            });
        };

        if rows == 1 && cols == 1 {
            let main = selected
                .filter(|s| base_layers.contains(s))
                .unwrap_or(first);
            let thumbnails = if base_layers.len() > 1 {
                base_layers.to_vec()
            } else {
                Vec::new()
            };
            return Ok(Self::single(main).with_thumbnails(thumbnails));
        }

        let count = rows as usize * cols as usize;
        let last = *base_layers.last().unwrap_or(&first);
        let cells = (0..count)
            .map(|i| base_layers.get(i).copied().unwrap_or(last))
            .collect();
        Self::new(rows, cols, cells)
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn cells(&self) -> &[LayerId] {
        &self.cells
    }

    pub fn thumbnails(&self) -> &[LayerId] {
        &self.thumbnails
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<LayerId> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get((row * self.cols + col) as usize).copied()
    }

    /// More than one grid cell.
    pub fn is_tiled(&self) -> bool {
        self.rows > 1 || self.cols > 1
    }
}

/// The state of one slice window: zoom, pan, surface and layout.
///
/// Setters record the matching [`ChangeEvent`]; the owner forwards them to the
/// renderer with [`SliceViewModel::take_events`].
#[derive(Debug, Clone)]
pub struct SliceViewModel {
    axis: SliceAxis,
    /// Screen pixels per physical unit.
    zoom: f64,
    /// World position at the center of each cell.
    view_position: Point,
    slice_spacing: [f64; 2],
    /// Slice size in voxels.
    slice_size: [u32; 2],
    surface: Size,
    pixel_ratio: f64,
    tiling: TilingConfig,
    thumbnail_on: bool,
    selected_layer: Option<LayerId>,
    selected_segmentation: Option<LayerId>,
    hovered_layer: Option<LayerId>,
    segmentation_alpha: f64,
    events: EventBucket,
}

impl SliceViewModel {
    pub fn new(axis: SliceAxis, surface: Size, tiling: TilingConfig) -> Self {
        Self {
            axis,
            zoom: 1.0,
            view_position: Point::new(0.0, 0.0),
            slice_spacing: [1.0, 1.0],
            slice_size: [0, 0],
            surface,
            pixel_ratio: 1.0,
            tiling,
            thumbnail_on: true,
            selected_layer: None,
            selected_segmentation: None,
            hovered_layer: None,
            segmentation_alpha: 0.5,
            events: EventBucket::all(),
        }
    }

    pub fn axis(&self) -> SliceAxis {
        self.axis
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn view_position(&self) -> Point {
        self.view_position
    }

    pub fn slice_spacing(&self) -> [f64; 2] {
        self.slice_spacing
    }

    pub fn slice_size(&self) -> [u32; 2] {
        self.slice_size
    }

    pub fn surface(&self) -> Size {
        self.surface
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn tiling(&self) -> &TilingConfig {
        &self.tiling
    }

    pub fn is_thumbnail_on(&self) -> bool {
        self.thumbnail_on
    }

    pub fn selected_layer(&self) -> Option<LayerId> {
        self.selected_layer
    }

    pub fn selected_segmentation(&self) -> Option<LayerId> {
        self.selected_segmentation
    }

    pub fn hovered_layer(&self) -> Option<LayerId> {
        self.hovered_layer
    }

    pub fn segmentation_alpha(&self) -> f64 {
        self.segmentation_alpha
    }

    // ── Mutation ─────────────────────────────────────────────────────

    pub fn set_zoom(&mut self, zoom: f64) {
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if zoom != self.zoom {
            self.zoom = zoom;
            self.events.fire(ChangeEvent::ZoomPanChanged);
        }
    }

    pub fn set_view_position(&mut self, position: Point) {
        if position != self.view_position {
            self.view_position = position;
            self.events.fire(ChangeEvent::ZoomPanChanged);
        }
    }

    /// Pan by a delta in logical screen pixels.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let position = self.view_position.translate(-dx / self.zoom, -dy / self.zoom);
        self.set_view_position(position);
    }

    /// Zoom by `factor`, keeping the world point under (`screen_x`, `screen_y`)
    /// fixed. Screen coordinates are relative to the cell center.
    pub fn zoom_at(&mut self, screen_x: f64, screen_y: f64, factor: f64) {
        let world_x = screen_x / self.zoom + self.view_position.x;
        let world_y = screen_y / self.zoom + self.view_position.y;

        self.set_zoom(self.zoom * factor);

        let position = Point::new(world_x - screen_x / self.zoom, world_y - screen_y / self.zoom);
        self.set_view_position(position);
    }

    /// Center the slice and pick the largest zoom that shows all of it in a
    /// cell of `canvas` pixels.
    pub fn fit_to_canvas(&mut self, canvas: Size) {
        let width = self.slice_size[0] as f64 * self.slice_spacing[0];
        let height = self.slice_size[1] as f64 * self.slice_spacing[1];
        if width <= 0.0 || height <= 0.0 || canvas.is_empty() {
            return;
        }
        let logical_w = canvas.width as f64 / self.pixel_ratio;
        let logical_h = canvas.height as f64 / self.pixel_ratio;
        self.set_view_position(Point::new(width / 2.0, height / 2.0));
        self.set_zoom((logical_w / width).min(logical_h / height));
    }

    pub fn set_slice_geometry(&mut self, size: [u32; 2], spacing: [f64; 2]) {
        if size != self.slice_size || spacing != self.slice_spacing {
            self.slice_size = size;
            self.slice_spacing = spacing;
            self.events.fire(ChangeEvent::ZoomPanChanged);
        }
    }

    pub fn resize(&mut self, surface: Size, pixel_ratio: f64) {
        let pixel_ratio = if pixel_ratio > 0.0 { pixel_ratio } else { 1.0 };
        if surface != self.surface || pixel_ratio != self.pixel_ratio {
            self.surface = surface;
            self.pixel_ratio = pixel_ratio;
            self.events.fire(ChangeEvent::SurfaceResized);
        }
    }

    pub fn set_tiling(&mut self, tiling: TilingConfig) {
        if tiling != self.tiling {
            self.tiling = tiling;
            self.events.fire(ChangeEvent::LayoutChanged);
        }
    }

    pub fn set_thumbnail_on(&mut self, on: bool) {
        if on != self.thumbnail_on {
            self.thumbnail_on = on;
            self.events.fire(ChangeEvent::LayoutChanged);
        }
    }

    pub fn set_selected_layer(&mut self, id: Option<LayerId>) {
        if id != self.selected_layer {
            self.selected_layer = id;
            self.events.fire(ChangeEvent::SelectionChanged);
        }
    }

    pub fn set_selected_segmentation(&mut self, id: Option<LayerId>) {
        if id != self.selected_segmentation {
            self.selected_segmentation = id;
            self.events.fire(ChangeEvent::SelectionChanged);
        }
    }

    pub fn set_hovered_layer(&mut self, id: Option<LayerId>) {
        if id != self.hovered_layer {
            self.hovered_layer = id;
            self.events.fire(ChangeEvent::SelectionChanged);
        }
    }

    pub fn set_segmentation_alpha(&mut self, alpha: f64) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha != self.segmentation_alpha {
            self.segmentation_alpha = alpha;
            self.events.fire(ChangeEvent::SegmentationOpacityChanged);
        }
    }

    /// Events recorded since the last call.
    pub fn take_events(&mut self) -> EventBucket {
        self.events.take()
    }
}
