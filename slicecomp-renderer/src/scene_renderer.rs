//! 3D view of segmentation meshes.
//!
//! Each segmentation label present in the current mesh set is drawn by one
//! pooled actor, found by label. Switching to another layer or time point
//! returns every actor to the pool before the new meshes are bound.

use std::collections::HashSet;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use slicecomp_core::{Camera, CameraState, Color, LayerId, Vec3};

use crate::actor::{ActorHandle, ActorPool, DEFAULT_BATCH_SIZE};
use crate::camera::CameraStateManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabelId(pub u16);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "label {}", self.0)
    }
}

/// Axis-aligned bounds in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds3 {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn union(&self, other: &Bounds3) -> Bounds3 {
        let mut out = *self;
        for d in 0..3 {
            out.min[d] = out.min[d].min(other.min[d]);
            out.max[d] = out.max[d].max(other.max[d]);
        }
        out
    }

    pub fn center(&self) -> Vec3 {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    /// Half the diagonal.
    pub fn radius(&self) -> f64 {
        let d: f64 = (0..3).map(|i| (self.max[i] - self.min[i]).powi(2)).sum();
        d.sqrt() / 2.0
    }
}

/// The surface of one label, as produced by the mesh pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMesh {
    pub label: LabelId,
    pub color: Color,
    pub opacity: f64,
    pub visible: bool,
    pub bounds: Bounds3,
}

/// Counts from one [`SceneRenderer::sync_meshes`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MeshSyncStats {
    pub created: usize,
    pub updated: usize,
    pub recycled: usize,
}

pub struct SceneRenderer {
    pool: ActorPool<LabelId>,
    current: Option<(LayerId, u32)>,
    bounds: Option<Bounds3>,
    camera: Camera,
    saved: CameraStateManager,
}

impl Default for SceneRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl SceneRenderer {
    pub fn new(pool_batch_size: usize) -> Self {
        Self {
            pool: ActorPool::with_batch_size(pool_batch_size),
            current: None,
            bounds: None,
            camera: Camera::new(),
            saved: CameraStateManager::new(),
        }
    }

    /// Bind `meshes` (the meshes of `layer_id` at `timepoint`) to actors.
    pub fn sync_meshes(&mut self, layer_id: LayerId, timepoint: u32, meshes: &[LabelMesh]) -> MeshSyncStats {
        let mut stats = MeshSyncStats::default();
        if self.current != Some((layer_id, timepoint)) {
            if self.current.is_some() {
                debug!("mesh source changed to {} t={}, recycling actors", layer_id, timepoint);
            }
            stats.recycled += self.recycle_all();
            self.current = Some((layer_id, timepoint));
        }

        let mut seen = HashSet::with_capacity(meshes.len());
        let mut bounds: Option<Bounds3> = None;
        for mesh in meshes {
            if !seen.insert(mesh.label) {
                debug!("{} appears twice in the mesh set", mesh.label);
                continue;
            }
            let handle = match self.pool.get_by_key(&mesh.label) {
                Some(handle) => {
                    stats.updated += 1;
                    handle
                }
                None => {
                    let handle = self.pool.acquire();
                    if let Err(e) = self.pool.register(mesh.label, handle) {
                        debug!("could not key actor for {}: {}", mesh.label, e);
                    }
                    stats.created += 1;
                    handle
                }
            };
            if let Some(actor) = self.pool.actor_mut(handle) {
                actor.color = mesh.color;
                actor.opacity = mesh.opacity;
                actor.visible = mesh.visible;
            }
            bounds = Some(match bounds {
                Some(b) => b.union(&mesh.bounds),
                None => mesh.bounds,
            });
        }

        let vanished: Vec<LabelId> = self
            .pool
            .active()
            .map(|(label, _)| *label)
            .filter(|label| !seen.contains(label))
            .collect();
        for label in vanished {
            if self.pool.release(&label).is_some() {
                stats.recycled += 1;
            }
        }

        self.bounds = bounds;
        stats
    }

    /// Drop every mesh actor and forget the mesh source.
    pub fn clear_rendering(&mut self) {
        self.recycle_all();
        self.current = None;
        self.bounds = None;
    }

    fn recycle_all(&mut self) -> usize {
        let handles: Vec<ActorHandle> = self.pool.active().map(|(_, h)| h).collect();
        handles.into_iter().filter(|&h| self.pool.recycle(h)).count()
    }

    /// Frame the current meshes, looking along +y with z up.
    pub fn reset_view(&mut self) {
        let mut state = CameraState::default();
        if let Some(bounds) = self.bounds {
            let center = bounds.center();
            let radius = bounds.radius().max(1e-6);
            let half_angle = (state.view_angle / 2.0).to_radians();
            let distance = radius / half_angle.sin();
            state.focal_point = center;
            state.position = [center[0], center[1] - distance, center[2]];
            state.view_up = [0.0, 0.0, 1.0];
            state.clipping_range = [(distance - radius).max(distance * 1e-3), distance + radius];
            state.parallel_scale = radius;
        }
        self.camera.set_state(state);
    }

    pub fn save_camera_state(&mut self) -> CameraState {
        self.saved.save(&self.camera)
    }

    pub fn restore_saved_camera_state(&mut self) -> bool {
        self.saved.restore(&mut self.camera)
    }

    pub fn delete_saved_camera_state(&mut self) {
        self.saved.clear();
    }

    pub fn is_saved_camera_state_available(&self) -> bool {
        self.saved.is_available()
    }

    pub fn camera_state(&self) -> CameraState {
        self.camera.state()
    }

    pub fn set_camera_state(&mut self, state: CameraState) {
        self.camera.set_state(state);
    }

    /// The camera part way between its current state and the saved one.
    pub fn camera_state_towards_saved(&self, t: f64) -> Option<CameraState> {
        self.saved
            .saved()
            .map(|saved| self.camera.state().interpolate(&saved, t))
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn bounds(&self) -> Option<Bounds3> {
        self.bounds
    }

    pub fn mesh_source(&self) -> Option<(LayerId, u32)> {
        self.current
    }

    pub fn actor_for(&self, label: LabelId) -> Option<ActorHandle> {
        self.pool.get_by_key(&label)
    }

    pub fn pool(&self) -> &ActorPool<LabelId> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(label: u16, lo: f64, hi: f64) -> LabelMesh {
        LabelMesh {
            label: LabelId(label),
            color: Color::rgb(0.2 * label as f64, 0.5, 0.1),
            opacity: 0.9,
            visible: true,
            bounds: Bounds3::new([lo, lo, lo], [hi, hi, hi]),
        }
    }

    #[test]
    fn test_meshes_get_actors_by_label() {
        let mut scene = SceneRenderer::default();
        let stats = scene.sync_meshes(LayerId(1), 0, &[mesh(1, 0.0, 1.0), mesh(2, 0.0, 2.0)]);
        assert_eq!(stats, MeshSyncStats { created: 2, updated: 0, recycled: 0 });

        let h1 = scene.actor_for(LabelId(1)).unwrap();
        let actor = scene.pool().actor(h1).unwrap();
        assert!((actor.opacity - 0.9).abs() < 1e-10);
        assert!((actor.color.r - 0.2).abs() < 1e-10);
        assert!(scene.actor_for(LabelId(7)).is_none());
    }

    #[test]
    fn test_vanished_labels_are_recycled() {
        let mut scene = SceneRenderer::default();
        scene.sync_meshes(LayerId(1), 0, &[mesh(1, 0.0, 1.0), mesh(2, 0.0, 1.0), mesh(3, 0.0, 1.0)]);
        let h1 = scene.actor_for(LabelId(1)).unwrap();
        let h2 = scene.actor_for(LabelId(2)).unwrap();

        let stats = scene.sync_meshes(LayerId(1), 0, &[mesh(1, 0.0, 1.0), mesh(3, 0.0, 1.0)]);
        assert_eq!(stats, MeshSyncStats { created: 0, updated: 2, recycled: 1 });
        assert_eq!(scene.actor_for(LabelId(1)), Some(h1));
        assert!(scene.pool().is_spare(h2));
        assert!(scene.pool().actor(h2).unwrap().is_neutral());
    }

    #[test]
    fn test_source_change_recycles_everything() {
        let mut scene = SceneRenderer::new(4);
        scene.sync_meshes(LayerId(1), 0, &[mesh(1, 0.0, 1.0), mesh(2, 0.0, 1.0)]);
        let capacity = scene.pool().capacity();

        let stats = scene.sync_meshes(LayerId(1), 1, &[mesh(1, 0.0, 1.0)]);
        assert_eq!(stats.recycled, 2);
        assert_eq!(stats.created, 1);
        assert_eq!(scene.pool().active_count(), 1);
        assert_eq!(scene.pool().capacity(), capacity);
        assert_eq!(scene.mesh_source(), Some((LayerId(1), 1)));

        scene.clear_rendering();
        assert_eq!(scene.pool().active_count(), 0);
        assert!(scene.bounds().is_none());
    }

    #[test]
    fn test_reset_view_frames_meshes() {
        let mut scene = SceneRenderer::default();
        scene.sync_meshes(LayerId(1), 0, &[mesh(1, 0.0, 2.0), mesh(2, -2.0, 0.0)]);
        scene.reset_view();

        let state = scene.camera_state();
        assert_eq!(state.focal_point, [0.0, 0.0, 0.0]);
        assert_eq!(state.view_up, [0.0, 0.0, 1.0]);
        let radius = scene.bounds().unwrap().radius();
        let expected = radius / 15f64.to_radians().sin();
        assert!((state.distance() - expected).abs() < 1e-9);
        assert!(state.clipping_range[0] < state.clipping_range[1]);
    }

    #[test]
    fn test_saved_camera_state() {
        let mut scene = SceneRenderer::default();
        assert!(!scene.is_saved_camera_state_available());
        assert!(!scene.restore_saved_camera_state());

        scene.sync_meshes(LayerId(1), 0, &[mesh(1, 0.0, 4.0)]);
        scene.reset_view();
        let saved = scene.save_camera_state();
        assert!(scene.is_saved_camera_state_available());

        let mut moved = saved;
        moved.position = [100.0, 100.0, 100.0];
        scene.set_camera_state(moved);
        assert_eq!(scene.camera_state(), moved);

        let halfway = scene.camera_state_towards_saved(0.5).unwrap();
        assert!((halfway.position[0] - (100.0 + saved.position[0]) / 2.0).abs() < 1e-10);

        assert!(scene.restore_saved_camera_state());
        assert_eq!(scene.camera_state(), saved);

        scene.delete_saved_camera_state();
        assert!(!scene.is_saved_camera_state_available());
        assert!(scene.camera_state_towards_saved(0.5).is_none());
    }
}
