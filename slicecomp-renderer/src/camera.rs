use log::debug;

use slicecomp_core::{Camera, CameraState, Point};

/// Holds at most one saved camera snapshot.
///
/// Saving overwrites the previous snapshot. Restoring copies every field back
/// and leaves the snapshot in place, so it can be restored again.
#[derive(Debug, Clone, Default)]
pub struct CameraStateManager {
    saved: Option<CameraState>,
}

impl CameraStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `camera` and return the snapshot.
    pub fn save(&mut self, camera: &Camera) -> CameraState {
        let state = camera.state();
        self.saved = Some(state);
        debug!("saved camera state at {:?}", state.position);
        state
    }

    /// Copy the saved snapshot into `camera`. Returns false if nothing is saved.
    pub fn restore(&self, camera: &mut Camera) -> bool {
        match self.saved {
            Some(state) => {
                camera.set_state(state);
                true
            }
            None => false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.saved.is_some()
    }

    pub fn saved(&self) -> Option<CameraState> {
        self.saved
    }

    pub fn clear(&mut self) {
        self.saved = None;
    }
}

/// Point a slice view camera at `pan`.
///
/// The camera looks down the z axis from one unit above the slice plane, with
/// y up. `height_px` is the viewport height in physical pixels.
pub fn sync_slice_camera(camera: &mut Camera, pan: Point, zoom: f64, height_px: u32, pixel_ratio: f64) {
    let mut state = camera.state();
    state.focal_point = [pan.x, pan.y, 0.0];
    state.position = [pan.x, pan.y, 1.0];
    state.view_up = [0.0, 1.0, 0.0];
    state.parallel_projection = true;
    if zoom > 0.0 && pixel_ratio > 0.0 {
        state.parallel_scale = (height_px as f64 / pixel_ratio) / zoom;
    }
    camera.set_state(state);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moved_camera() -> Camera {
        let mut camera = Camera::new();
        camera.set_position([10.0, -4.0, 250.0]);
        camera.set_focal_point([1.0, 2.0, 3.0]);
        camera.set_view_up([0.0, 0.0, 1.0]);
        camera.set_parallel_scale(42.0);
        camera
    }

    #[test]
    fn test_round_trip() {
        let mut camera = moved_camera();
        let mut manager = CameraStateManager::new();
        assert!(!manager.is_available());

        let saved = manager.save(&camera);
        assert!(manager.is_available());

        camera.set_position([0.0, 0.0, 5.0]);
        camera.set_parallel_projection(true);
        assert_ne!(camera.state(), saved);

        assert!(manager.restore(&mut camera));
        assert_eq!(camera.state(), saved);
        assert_eq!(camera.state(), moved_camera().state());
    }

    #[test]
    fn test_restore_without_snapshot() {
        let mut camera = moved_camera();
        let before = camera.state();
        let manager = CameraStateManager::new();
        assert!(!manager.restore(&mut camera));
        assert_eq!(camera.state(), before);
    }

    #[test]
    fn test_save_overwrites_and_clear() {
        let mut camera = Camera::new();
        let mut manager = CameraStateManager::new();
        manager.save(&camera);
        camera.set_parallel_scale(7.0);
        let second = manager.save(&camera);
        assert_eq!(manager.saved(), Some(second));

        manager.clear();
        assert!(!manager.is_available());
        assert_eq!(manager.saved(), None);
    }

    #[test]
    fn test_sync_slice_camera() {
        let mut camera = Camera::parallel();
        sync_slice_camera(&mut camera, Point::new(12.0, -3.0), 4.0, 400, 2.0);
        assert_eq!(camera.focal_point(), [12.0, -3.0, 0.0]);
        assert_eq!(camera.position(), [12.0, -3.0, 1.0]);
        assert_eq!(camera.view_up(), [0.0, 1.0, 0.0]);
        assert!((camera.parallel_scale() - 50.0).abs() < 1e-10);

        let count = camera.modified_count();
        sync_slice_camera(&mut camera, Point::new(12.0, -3.0), 4.0, 400, 2.0);
        assert_eq!(camera.modified_count(), count);
    }
}
