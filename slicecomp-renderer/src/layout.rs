//! Tiling of the drawing surface into viewports.
//!
//! Grid cells split the surface exactly: column `k` starts at
//! `floor(k * W / C)` and row boundaries are computed the same way from the
//! top edge, so the cells cover every pixel once. Thumbnails float over the
//! grid, stacked from one corner.

use log::debug;
use serde::{Deserialize, Serialize};

use slicecomp_core::{LayerId, NormalizedRect, PixelRect, Point, Size, SliceViewModel, TilingConfig};

use crate::spatial::{ViewportEntry, ViewportIndex};
use crate::viewport::{thumbnail_zoom_factor, ViewTransform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Placement of layer thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailRule {
    pub corner: Corner,
    /// Thumbnail size relative to a grid cell.
    pub size_fraction: f64,
    /// Distance from the surface edges, in pixels.
    pub margin: u32,
    /// Gap between stacked thumbnails, in pixels.
    pub spacing: u32,
}

impl Default for ThumbnailRule {
    fn default() -> Self {
        Self {
            corner: Corner::TopRight,
            size_fraction: 0.2,
            margin: 4,
            spacing: 4,
        }
    }
}

/// One sub-region of the surface and what it shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportDescriptor {
    pub layer_id: LayerId,
    pub rect: PixelRect,
    pub thumbnail: bool,
    /// Rect edges divided by the surface size.
    pub normalized: NormalizedRect,
    /// (row, column) for grid cells.
    pub cell: Option<(u32, u32)>,
    pub transform: ViewTransform,
}

/// Zoom, pan and spacing shared by every viewport of a slice window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    pub center: Point,
    pub zoom: f64,
    pub spacing: [f64; 2],
    pub pixel_ratio: f64,
}

impl ViewParams {
    pub fn from_model(model: &SliceViewModel) -> Self {
        Self {
            center: model.view_position(),
            zoom: model.zoom(),
            spacing: model.slice_spacing(),
            pixel_ratio: model.pixel_ratio(),
        }
    }
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            center: Point::new(0.0, 0.0),
            zoom: 1.0,
            spacing: [1.0, 1.0],
            pixel_ratio: 1.0,
        }
    }
}

/// The ordered viewports of a slice window: grid cells first, then thumbnails.
#[derive(Debug, Default)]
pub struct ViewportLayout {
    viewports: Vec<ViewportDescriptor>,
    surface: Size,
    canvas: Size,
    tiled: bool,
    index: ViewportIndex,
}

impl ViewportLayout {
    pub fn viewports(&self) -> &[ViewportDescriptor] {
        &self.viewports
    }

    pub fn surface(&self) -> Size {
        self.surface
    }

    /// Size of a grid cell (the first one when the split is uneven).
    pub fn canvas(&self) -> Size {
        self.canvas
    }

    pub fn is_tiled(&self) -> bool {
        self.tiled
    }

    pub fn len(&self) -> usize {
        self.viewports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewports.is_empty()
    }

    /// The viewport under a surface pixel position; thumbnails take precedence.
    pub fn viewport_at(&self, x: f64, y: f64) -> Option<&ViewportDescriptor> {
        self.index
            .query_point(x, y)
            .and_then(|e| self.viewports.get(e.index))
    }

    /// Recompute every viewport's world mapping.
    pub fn update_transforms(&mut self, params: &ViewParams) {
        let canvas = self.canvas;
        for vp in &mut self.viewports {
            let zoom = if vp.thumbnail {
                params.zoom * thumbnail_zoom_factor(vp.rect.size(), canvas)
            } else {
                params.zoom
            };
            vp.transform = ViewTransform {
                center: params.center,
                zoom,
                size: vp.rect.size(),
                pixel_ratio: params.pixel_ratio,
                spacing: params.spacing,
            };
        }
    }
}

/// Split `total` pixels into `parts` contiguous spans; returns the boundaries.
fn split(total: u32, parts: u32) -> Vec<u32> {
    (0..=parts)
        .map(|k| (k as u64 * total as u64 / parts as u64) as u32)
        .collect()
}

/// Compute the viewport rectangles for a tiling and surface size.
pub fn compute_layout(
    tiling: &TilingConfig,
    surface: Size,
    thumbnails_on: bool,
    rule: &ThumbnailRule,
) -> ViewportLayout {
    let mut layout = ViewportLayout {
        surface,
        tiled: tiling.is_tiled(),
        ..ViewportLayout::default()
    };
    if surface.is_empty() {
        return layout;
    }

    let xs = split(surface.width, tiling.cols());
    let ys = split(surface.height, tiling.rows());
    for row in 0..tiling.rows() {
        for col in 0..tiling.cols() {
            let Some(layer_id) = tiling.cell(row, col) else {
                continue;
            };
            let (r, c) = (row as usize, col as usize);
            let rect = PixelRect::new(
                xs[c] as i32,
                (surface.height - ys[r + 1]) as i32,
                xs[c + 1] - xs[c],
                ys[r + 1] - ys[r],
            );
            layout.viewports.push(ViewportDescriptor {
                layer_id,
                rect,
                thumbnail: false,
                normalized: rect.normalized(surface),
                cell: Some((row, col)),
                transform: ViewTransform::default(),
            });
        }
    }
    layout.canvas = layout
        .viewports
        .first()
        .map(|vp| vp.rect.size())
        .unwrap_or(surface);

    if thumbnails_on {
        place_thumbnails(&mut layout, tiling.thumbnails(), rule);
    }

    let entries = layout
        .viewports
        .iter()
        .enumerate()
        .map(|(index, vp)| ViewportEntry {
            index,
            rect: vp.rect,
            thumbnail: vp.thumbnail,
        })
        .collect();
    layout.index = ViewportIndex::build(entries);
    layout
}

fn place_thumbnails(layout: &mut ViewportLayout, thumbnails: &[LayerId], rule: &ThumbnailRule) {
    let surface = layout.surface;
    let fraction = rule.size_fraction.clamp(0.0, 1.0);
    let tw = ((layout.canvas.width as f64 * fraction).round() as u32).max(1);
    let th = ((layout.canvas.height as f64 * fraction).round() as u32).max(1);
    let margin = rule.margin as i64;
    let pitch = th as i64 + rule.spacing as i64;

    let x = match rule.corner {
        Corner::TopLeft | Corner::BottomLeft => margin,
        Corner::TopRight | Corner::BottomRight => surface.width as i64 - margin - tw as i64,
    };

    for (i, &layer_id) in thumbnails.iter().enumerate() {
        let y = match rule.corner {
            Corner::TopLeft | Corner::TopRight => {
                surface.height as i64 - margin - th as i64 - i as i64 * pitch
            }
            Corner::BottomLeft | Corner::BottomRight => margin + i as i64 * pitch,
        };
        let fits = x >= 0
            && y >= 0
            && x + tw as i64 <= surface.width as i64
            && y + th as i64 <= surface.height as i64;
        if !fits {
            debug!(
                "thumbnail {} of {} does not fit on a {}x{} surface",
                i + 1,
                thumbnails.len(),
                surface.width,
                surface.height
            );
            break;
        }
        let rect = PixelRect::new(x as i32, y as i32, tw, th);
        layout.viewports.push(ViewportDescriptor {
            layer_id,
            rect,
            thumbnail: true,
            normalized: rect.normalized(surface),
            cell: None,
            transform: ViewTransform::default(),
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
struct LayoutInputs {
    tiling: TilingConfig,
    surface: Size,
    thumbnails_on: bool,
}

/// Keeps the current layout and recomputes it only when its inputs change.
#[derive(Debug, Default)]
pub struct LayoutEngine {
    rule: ThumbnailRule,
    inputs: Option<LayoutInputs>,
    layout: ViewportLayout,
    recomputes: u64,
}

impl LayoutEngine {
    pub fn new(rule: ThumbnailRule) -> Self {
        Self {
            rule,
            ..Self::default()
        }
    }

    /// Returns true if the rectangles were recomputed.
    pub fn update(&mut self, tiling: &TilingConfig, surface: Size, thumbnails_on: bool) -> bool {
        let inputs = LayoutInputs {
            tiling: tiling.clone(),
            surface,
            thumbnails_on,
        };
        if self.inputs.as_ref() == Some(&inputs) {
            return false;
        }
        self.layout = compute_layout(tiling, surface, thumbnails_on, &self.rule);
        self.inputs = Some(inputs);
        self.recomputes += 1;
        debug!(
            "layout {}x{} on {}x{}: {} viewports",
            tiling.rows(),
            tiling.cols(),
            surface.width,
            surface.height,
            self.layout.len()
        );
        true
    }

    pub fn update_transforms(&mut self, params: &ViewParams) {
        self.layout.update_transforms(params);
    }

    pub fn layout(&self) -> &ViewportLayout {
        &self.layout
    }

    /// How many times the rectangles have been computed.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }

    pub fn rule(&self) -> &ThumbnailRule {
        &self.rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: u32, cols: u32) -> TilingConfig {
        let cells = (0..rows * cols).map(|i| LayerId(i as u64 + 1)).collect();
        TilingConfig::new(rows, cols, cells).unwrap()
    }

    fn assert_exact_tiling(layout: &ViewportLayout, surface: Size) {
        let cells: Vec<&ViewportDescriptor> =
            layout.viewports().iter().filter(|v| !v.thumbnail).collect();
        let area: u64 = cells.iter().map(|v| v.rect.area()).sum();
        assert_eq!(area, surface.area(), "cells must cover the surface");
        for (i, a) in cells.iter().enumerate() {
            assert!(a.rect.x >= 0 && a.rect.y >= 0);
            assert!(a.rect.right() <= surface.width as i32);
            assert!(a.rect.top() <= surface.height as i32);
            assert!(a.normalized.is_within_unit_square());
            for b in &cells[i + 1..] {
                assert!(!a.rect.overlaps(&b.rect), "{:?} overlaps {:?}", a.rect, b.rect);
            }
        }
    }

    #[test]
    fn test_grid_tiles_surface_exactly() {
        let configs = [(1, 1), (1, 2), (2, 2), (3, 3), (2, 5), (4, 1)];
        let surfaces = [Size::new(800, 600), Size::new(641, 479), Size::new(7, 5)];
        for (rows, cols) in configs {
            for surface in surfaces {
                let layout = compute_layout(&grid(rows, cols), surface, true, &ThumbnailRule::default());
                assert_eq!(layout.len(), (rows * cols) as usize);
                assert_exact_tiling(&layout, surface);
            }
        }
    }

    #[test]
    fn test_row_zero_is_top() {
        let layout = compute_layout(&grid(2, 1), Size::new(100, 100), false, &ThumbnailRule::default());
        let top = &layout.viewports()[0];
        assert_eq!(top.cell, Some((0, 0)));
        assert_eq!(top.rect, PixelRect::new(0, 50, 100, 50));
        assert!((top.normalized.y1 - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_thumbnails_stack_from_corner() {
        let tiling = TilingConfig::single(LayerId(1)).with_thumbnails(vec![LayerId(1), LayerId(2)]);
        let rule = ThumbnailRule::default();
        let layout = compute_layout(&tiling, Size::new(500, 400), true, &rule);
        assert_eq!(layout.len(), 3);

        let thumbs: Vec<&ViewportDescriptor> =
            layout.viewports().iter().filter(|v| v.thumbnail).collect();
        assert_eq!(thumbs[0].rect, PixelRect::new(396, 316, 100, 80));
        assert_eq!(thumbs[1].rect, PixelRect::new(396, 232, 100, 80));
        assert!(thumbs.iter().all(|t| t.normalized.is_within_unit_square()));
        assert_exact_tiling(&layout, Size::new(500, 400));

        let hidden = compute_layout(&tiling, Size::new(500, 400), false, &rule);
        assert_eq!(hidden.len(), 1);
    }

    #[test]
    fn test_thumbnails_that_do_not_fit_are_dropped() {
        let many: Vec<LayerId> = (0..20).map(LayerId).collect();
        let tiling = TilingConfig::single(LayerId(0)).with_thumbnails(many);
        let rule = ThumbnailRule {
            corner: Corner::BottomLeft,
            ..ThumbnailRule::default()
        };
        let layout = compute_layout(&tiling, Size::new(100, 100), true, &rule);
        let thumbs: Vec<&ViewportDescriptor> =
            layout.viewports().iter().filter(|v| v.thumbnail).collect();
        // 20 px thumbnails with 4 px gaps starting at y = 4.
        assert_eq!(thumbs.len(), 4);
        assert_eq!(thumbs[0].rect, PixelRect::new(4, 4, 20, 20));
        assert!(thumbs.iter().all(|t| t.rect.top() <= 100));
    }

    #[test]
    fn test_empty_surface_has_no_viewports() {
        let layout = compute_layout(&grid(2, 2), Size::new(0, 300), true, &ThumbnailRule::default());
        assert!(layout.is_empty());
    }

    #[test]
    fn test_engine_is_idempotent() {
        let mut engine = LayoutEngine::new(ThumbnailRule::default());
        let tiling = grid(2, 2);
        assert!(engine.update(&tiling, Size::new(400, 400), true));
        assert!(!engine.update(&tiling, Size::new(400, 400), true));
        assert_eq!(engine.recompute_count(), 1);

        assert!(engine.update(&tiling, Size::new(400, 300), true));
        assert!(engine.update(&grid(1, 2), Size::new(400, 300), true));
        let reassigned = TilingConfig::new(1, 2, vec![LayerId(9), LayerId(2)]).unwrap();
        assert!(engine.update(&reassigned, Size::new(400, 300), true));
        assert_eq!(engine.recompute_count(), 4);
    }

    #[test]
    fn test_transforms_and_hit_test() {
        let tiling = TilingConfig::single(LayerId(1)).with_thumbnails(vec![LayerId(2)]);
        let mut engine = LayoutEngine::new(ThumbnailRule::default());
        engine.update(&tiling, Size::new(500, 400), true);
        engine.update_transforms(&ViewParams {
            center: Point::new(5.0, 6.0),
            zoom: 2.0,
            spacing: [1.0, 1.0],
            pixel_ratio: 1.0,
        });
        let layout = engine.layout();
        let main = &layout.viewports()[0];
        let thumb = &layout.viewports()[1];
        assert!((main.transform.zoom - 2.0).abs() < 1e-10);
        assert!((thumb.transform.zoom - 0.4).abs() < 1e-10);
        assert_eq!(thumb.transform.center, Point::new(5.0, 6.0));

        assert_eq!(layout.viewport_at(10.0, 10.0).unwrap().layer_id, LayerId(1));
        assert_eq!(layout.viewport_at(450.0, 350.0).unwrap().layer_id, LayerId(2));
        assert!(layout.viewport_at(-1.0, 10.0).is_none());
    }
}
