//! # Slicecomp Renderer
//!
//! Compositing pipeline for slice views: per-layer texture resources kept in
//! step with the layer set, pooled actors, draw-order depths, viewport tiling
//! and per-viewport cameras. The output is a [`RenderFrame`] draw list that a
//! [`RenderSurface`] backend turns into pixels.
//!
//! [`SceneRenderer`] covers the 3D view: label meshes on pooled actors and a
//! saved camera.

pub mod actor;
pub mod camera;
pub mod config;
pub mod coordinator;
pub mod depth;
pub mod layout;
pub mod render_data;
pub mod resource;
pub mod scene_renderer;
pub mod slice_renderer;
pub mod spatial;
pub mod viewport;

pub use actor::{Actor, ActorHandle, ActorPool, PoolError, DEFAULT_BATCH_SIZE};
pub use camera::{sync_slice_camera, CameraStateManager};
pub use config::RendererConfig;
pub use coordinator::SliceCoordinator;
pub use depth::{assign_depths, DepthAssigner, DepthOrder, DepthPolicy};
pub use layout::{Corner, LayoutEngine, ThumbnailRule, ViewParams, ViewportDescriptor, ViewportLayout};
pub use render_data::{DrawCommand, DrawItem, RecordingSurface, RenderFrame, RenderSurface, ViewportFrame};
pub use resource::{
    BaseAssembly, BaseAssemblyCache, QuadGeometry, ReconcileStats, RenderContext, ResourceCache, ResourceError,
    ResourceHandle, ResourceKey, Texture,
};
pub use scene_renderer::{Bounds3, LabelId, LabelMesh, MeshSyncStats, SceneRenderer};
pub use slice_renderer::{FrameContext, SliceRenderer, UpdateReport, UpdateStage};
pub use viewport::ViewTransform;
