use log::debug;
use serde::{Deserialize, Serialize};

use slicecomp_core::{Size, SliceViewModel};

/// Size of one grid cell of a slice window, in physical pixels.
pub fn canvas_size(model: &SliceViewModel) -> Size {
    let surface = model.surface();
    let tiling = model.tiling();
    Size::new(surface.width / tiling.cols(), surface.height / tiling.rows())
}

/// Zoom that fits the whole slice into one cell of the window.
pub fn optimal_zoom(model: &SliceViewModel) -> Option<f64> {
    let [sw, sh] = model.slice_size();
    let [dx, dy] = model.slice_spacing();
    let (width, height) = (sw as f64 * dx, sh as f64 * dy);
    let canvas = canvas_size(model);
    if width <= 0.0 || height <= 0.0 || canvas.is_empty() {
        return None;
    }
    let logical_w = canvas.width as f64 / model.pixel_ratio();
    let logical_h = canvas.height as f64 / model.pixel_ratio();
    Some((logical_w / width).min(logical_h / height))
}

/// Keeps zoom consistent across the slice windows it is handed.
///
/// The coordinator owns no windows; callers pass the view models in on each call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceCoordinator {
    linked_zoom: bool,
}

impl SliceCoordinator {
    pub fn new(linked_zoom: bool) -> Self {
        Self { linked_zoom }
    }

    pub fn is_linked_zoom(&self) -> bool {
        self.linked_zoom
    }

    /// Turning the link on snaps every window to the zoom of the first one.
    pub fn set_linked_zoom(&mut self, linked: bool, models: &mut [SliceViewModel]) {
        self.linked_zoom = linked;
        if linked {
            if let Some(zoom) = models.first().map(|m| m.zoom()) {
                self.set_common_zoom(models, zoom);
            }
        }
    }

    /// The largest zoom at which every window shows its whole slice.
    pub fn common_optimal_zoom(&self, models: &[SliceViewModel]) -> Option<f64> {
        models.iter().filter_map(optimal_zoom).reduce(f64::min)
    }

    pub fn set_common_zoom(&self, models: &mut [SliceViewModel], zoom: f64) {
        for model in models.iter_mut() {
            model.set_zoom(zoom);
        }
    }

    /// Center every slice and fit it to its window, at a shared zoom when linked.
    pub fn reset_views(&self, models: &mut [SliceViewModel]) {
        for model in models.iter_mut() {
            let canvas = canvas_size(model);
            model.fit_to_canvas(canvas);
        }
        if self.linked_zoom {
            if let Some(zoom) = self.common_optimal_zoom(models) {
                debug!("reset {} views to common zoom {}", models.len(), zoom);
                self.set_common_zoom(models, zoom);
            }
        }
    }

    /// Apply a zoom change made in window `source` to the others, if linked.
    pub fn zoom_changed(&self, models: &mut [SliceViewModel], source: usize) {
        if !self.linked_zoom {
            return;
        }
        let Some(zoom) = models.get(source).map(|m| m.zoom()) else {
            return;
        };
        self.set_common_zoom(models, zoom);
    }

    /// Multiply the zoom of window `source` (and of the others, if linked).
    pub fn zoom_by(&self, models: &mut [SliceViewModel], source: usize, factor: f64) {
        if let Some(model) = models.get_mut(source) {
            let zoom = model.zoom() * factor;
            model.set_zoom(zoom);
        }
        self.zoom_changed(models, source);
    }
}
