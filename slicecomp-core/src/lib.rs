//! # Slicecomp Core
//!
//! Value types shared by the slice compositing pipeline: image layers and their
//! display slices, pixel and world geometry, camera snapshots, appearance
//! settings, the per-window view model and the change notifications that drive
//! incremental updates.
//!
//! Nothing in this crate talks to a rendering library; it describes what the
//! renderer is asked to show.

pub mod appearance;
pub mod camera;
pub mod events;
pub mod geometry;
pub mod layer;
pub mod view_model;

pub use appearance::{AppearanceSettings, InterpolationMode, LineStyle};
pub use camera::{Camera, CameraState};
pub use events::{ChangeEvent, EventBucket};
pub use geometry::{Color, NormalizedRect, PixelRect, Point, Size, Vec3};
pub use layer::{
    DisplaySlice, ImageDataProvider, Layer, LayerId, LayerRole, LayerStack, RoleFilter, SliceAxis,
    SliceToken,
};
pub use view_model::{SliceViewModel, TilingConfig, TilingError};
