use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;

/// A value snapshot of camera parameters.
///
/// Snapshots are independent of the live [`Camera`] they were copied from and
/// compare structurally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub position: Vec3,
    pub focal_point: Vec3,
    pub view_up: Vec3,
    pub clipping_range: [f64; 2],
    /// Vertical view angle in degrees (perspective projection).
    pub view_angle: f64,
    /// Half-height of the view in world units (parallel projection).
    pub parallel_scale: f64,
    pub parallel_projection: bool,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 1.0],
            focal_point: [0.0, 0.0, 0.0],
            view_up: [0.0, 1.0, 0.0],
            clipping_range: [0.01, 1000.01],
            view_angle: 30.0,
            parallel_scale: 1.0,
            parallel_projection: false,
        }
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp3(a: Vec3, b: Vec3, t: f64) -> Vec3 {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

impl CameraState {
    /// Blend towards `other`; `t` is clamped to [0, 1].
    ///
    /// The projection mode switches at the midpoint. The interpolated view-up is
    /// renormalized unless it degenerates to zero, in which case `other`'s is used.
    pub fn interpolate(&self, other: &CameraState, t: f64) -> CameraState {
        let t = t.clamp(0.0, 1.0);
        let mut view_up = lerp3(self.view_up, other.view_up, t);
        let len = (view_up[0].powi(2) + view_up[1].powi(2) + view_up[2].powi(2)).sqrt();
        if len > 1e-12 {
            view_up = [view_up[0] / len, view_up[1] / len, view_up[2] / len];
        } else {
            view_up = other.view_up;
        }
        CameraState {
            position: lerp3(self.position, other.position, t),
            focal_point: lerp3(self.focal_point, other.focal_point, t),
            view_up,
            clipping_range: [
                lerp(self.clipping_range[0], other.clipping_range[0], t),
                lerp(self.clipping_range[1], other.clipping_range[1], t),
            ],
            view_angle: lerp(self.view_angle, other.view_angle, t),
            parallel_scale: lerp(self.parallel_scale, other.parallel_scale, t),
            parallel_projection: if t < 0.5 {
                self.parallel_projection
            } else {
                other.parallel_projection
            },
        }
    }

    /// Distance between position and focal point.
    pub fn distance(&self) -> f64 {
        let d = [
            self.position[0] - self.focal_point[0],
            self.position[1] - self.focal_point[1],
            self.position[2] - self.focal_point[2],
        ];
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    }
}

/// A live camera owned by a render context.
#[derive(Debug, Clone, Default)]
pub struct Camera {
    state: CameraState,
    modified: u64,
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// A camera with parallel projection enabled, as used by slice views.
    pub fn parallel() -> Self {
        let mut camera = Self::new();
        camera.state.parallel_projection = true;
        camera
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Replace every field; bumps the modification counter only on change.
    pub fn set_state(&mut self, state: CameraState) {
        if self.state != state {
            self.state = state;
            self.modified += 1;
        }
    }

    /// Number of times the camera parameters actually changed.
    pub fn modified_count(&self) -> u64 {
        self.modified
    }

    pub fn position(&self) -> Vec3 {
        self.state.position
    }

    pub fn focal_point(&self) -> Vec3 {
        self.state.focal_point
    }

    pub fn view_up(&self) -> Vec3 {
        self.state.view_up
    }

    pub fn parallel_scale(&self) -> f64 {
        self.state.parallel_scale
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.update(|s| s.position = position);
    }

    pub fn set_focal_point(&mut self, focal_point: Vec3) {
        self.update(|s| s.focal_point = focal_point);
    }

    pub fn set_view_up(&mut self, view_up: Vec3) {
        self.update(|s| s.view_up = view_up);
    }

    pub fn set_parallel_scale(&mut self, scale: f64) {
        self.update(|s| s.parallel_scale = scale);
    }

    pub fn set_parallel_projection(&mut self, on: bool) {
        self.update(|s| s.parallel_projection = on);
    }

    fn update(&mut self, f: impl FnOnce(&mut CameraState)) {
        let mut state = self.state;
        f(&mut state);
        self.set_state(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_value() {
        let mut camera = Camera::new();
        let snapshot = camera.state();
        camera.set_position([5.0, 5.0, 5.0]);
        assert_eq!(snapshot.position, [0.0, 0.0, 1.0]);
        assert_ne!(snapshot, camera.state());
    }

    #[test]
    fn test_modified_counter_ignores_noop() {
        let mut camera = Camera::parallel();
        let before = camera.modified_count();
        camera.set_parallel_projection(true);
        assert_eq!(camera.modified_count(), before);
        camera.set_parallel_scale(3.0);
        assert_eq!(camera.modified_count(), before + 1);
    }

    #[test]
    fn test_interpolate_endpoints() {
        let a = CameraState::default();
        let b = CameraState {
            position: [10.0, 0.0, 0.0],
            parallel_scale: 4.0,
            parallel_projection: true,
            ..CameraState::default()
        };
        assert_eq!(a.interpolate(&b, 0.0), a);
        assert_eq!(a.interpolate(&b, 1.0), b);

        let mid = a.interpolate(&b, 0.5);
        assert!((mid.position[0] - 5.0).abs() < 1e-10);
        assert!((mid.parallel_scale - 2.5).abs() < 1e-10);
        assert!(mid.parallel_projection);
    }
}
