use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::Point;

/// A stable layer identifier, unique for the lifetime of the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// The role a layer plays in the image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerRole {
    /// The main anatomical image.
    Main,
    /// Additional anatomical images.
    Overlay,
    /// Segmentation (label) images.
    Label,
    /// Derived images such as speed or level-set layers.
    Auxiliary,
}

impl LayerRole {
    /// Whether a layer with this role gets its own viewport (and base assembly).
    pub fn is_base_displayable(self) -> bool {
        match self {
            LayerRole::Main | LayerRole::Overlay | LayerRole::Auxiliary => true,
            LayerRole::Label => false,
        }
    }
}

/// Selects which roles a layer query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleFilter {
    main: bool,
    overlay: bool,
    label: bool,
    auxiliary: bool,
}

impl RoleFilter {
    pub const ALL: RoleFilter = RoleFilter {
        main: true,
        overlay: true,
        label: true,
        auxiliary: true,
    };

    pub const NONE: RoleFilter = RoleFilter {
        main: false,
        overlay: false,
        label: false,
        auxiliary: false,
    };

    pub fn only(role: LayerRole) -> Self {
        Self::NONE.with(role)
    }

    pub fn with(mut self, role: LayerRole) -> Self {
        match role {
            LayerRole::Main => self.main = true,
            LayerRole::Overlay => self.overlay = true,
            LayerRole::Label => self.label = true,
            LayerRole::Auxiliary => self.auxiliary = true,
        }
        self
    }

    pub fn accepts(&self, role: LayerRole) -> bool {
        match role {
            LayerRole::Main => self.main,
            LayerRole::Overlay => self.overlay,
            LayerRole::Label => self.label,
            LayerRole::Auxiliary => self.auxiliary,
        }
    }
}

impl Default for RoleFilter {
    fn default() -> Self {
        Self::ALL
    }
}

/// One of the three orthogonal slice views a layer is displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SliceAxis {
    Axial,
    Coronal,
    Sagittal,
}

impl SliceAxis {
    pub const ALL: [SliceAxis; 3] = [SliceAxis::Axial, SliceAxis::Coronal, SliceAxis::Sagittal];

    pub fn index(self) -> usize {
        match self {
            SliceAxis::Axial => 0,
            SliceAxis::Coronal => 1,
            SliceAxis::Sagittal => 2,
        }
    }
}

/// Identity token of a display slice. A new slice object always gets a new token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SliceToken(pub Uuid);

impl SliceToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SliceToken {
    fn default() -> Self {
        Self::new()
    }
}

/// RGBA pixel data of one display slice, produced by the imaging pipeline.
///
/// Slices are shared through `Arc` and never mutated after construction; a
/// changed slice is a new object with a new token.
#[derive(Debug)]
pub struct DisplaySlice {
    token: SliceToken,
    width: u32,
    height: u32,
    /// Physical size of one slice pixel, per axis.
    spacing: [f64; 2],
    /// RGBA8, row-major, `width * height * 4` bytes.
    pixels: Vec<u8>,
}

impl DisplaySlice {
    pub fn new(width: u32, height: u32, spacing: [f64; 2], pixels: Vec<u8>) -> Self {
        Self {
            token: SliceToken::new(),
            width,
            height,
            spacing,
            pixels,
        }
    }

    /// A slice filled with a single RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self::new(width, height, [1.0, 1.0], pixels)
    }

    pub fn with_spacing(mut self, spacing: [f64; 2]) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn token(&self) -> SliceToken {
        self.token
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn spacing(&self) -> [f64; 2] {
        self.spacing
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Whether the pixel buffer matches the declared dimensions.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == self.width as usize * self.height as usize * 4
    }

    /// Slice corners in slice coordinates (voxel units), lower-left and upper-right.
    pub fn corners(&self) -> (Point, Point) {
        (
            Point::new(0.0, 0.0),
            Point::new(self.width as f64, self.height as f64),
        )
    }
}

/// An image layer as seen by the renderer.
#[derive(Debug, Clone)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub role: LayerRole,
    pub sticky: bool,
    alpha: f64,
    pub drawable: bool,
    pub slicing_orthogonal: bool,
    slices: [Option<Arc<DisplaySlice>>; 3],
}

impl Layer {
    pub fn new(id: LayerId, name: &str, role: LayerRole) -> Self {
        Self {
            id,
            name: name.to_string(),
            role,
            // Label layers always composite over the base.
            sticky: matches!(role, LayerRole::Label),
            alpha: 1.0,
            drawable: true,
            slicing_orthogonal: true,
            slices: [None, None, None],
        }
    }

    pub fn with_sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.set_alpha(alpha);
        self
    }

    pub fn with_slicing_orthogonal(mut self, orthogonal: bool) -> Self {
        self.slicing_orthogonal = orthogonal;
        self
    }

    /// Attach the same slice to every axis.
    pub fn with_slice(mut self, slice: Arc<DisplaySlice>) -> Self {
        for axis in SliceAxis::ALL {
            self.slices[axis.index()] = Some(Arc::clone(&slice));
        }
        self
    }

    pub fn unique_id(&self) -> LayerId {
        self.id
    }

    pub fn is_sticky(&self) -> bool {
        self.sticky
    }

    pub fn is_drawable(&self) -> bool {
        self.drawable
    }

    pub fn is_slicing_orthogonal(&self) -> bool {
        self.slicing_orthogonal
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn display_slice(&self, axis: SliceAxis) -> Option<&Arc<DisplaySlice>> {
        self.slices[axis.index()].as_ref()
    }

    pub fn set_display_slice(&mut self, axis: SliceAxis, slice: Arc<DisplaySlice>) {
        self.slices[axis.index()] = Some(slice);
    }

    pub fn clear_display_slice(&mut self, axis: SliceAxis) {
        self.slices[axis.index()] = None;
    }

    pub fn is_initialized(&self, axis: SliceAxis) -> bool {
        self.display_slice(axis).is_some()
    }
}

/// Read access to the current set of image layers.
pub trait ImageDataProvider {
    /// Layers matching the filter, in display order.
    fn layers(&self, filter: RoleFilter) -> Vec<&Layer>;

    fn find_layer(&self, id: LayerId) -> Option<&Layer>;
}

/// An ordered collection of layers; the main layer, if any, comes first.
#[derive(Debug, Clone, Default)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Adds a layer, replacing any layer with the same id.
    /// Add a layer, or replace the one with the same id.
    ///
    /// A replacement keeps its position unless its role changed, in which case
    /// it is re-inserted as a new layer.
    pub fn add_layer(&mut self, layer: Layer) {
        if let Some(index) = self.layers.iter().position(|l| l.id == layer.id) {
            if self.layers[index].role == layer.role {
                self.layers[index] = layer;
                return;
            }
            self.layers.remove(index);
        }
        if layer.role == LayerRole::Main {
            self.layers.insert(0, layer);
        } else {
            self.layers.push(layer);
        }
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let index = self.layers.iter().position(|l| l.id == id)?;
        Some(self.layers.remove(index))
    }

    pub fn get_layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn main(&self) -> Option<&Layer> {
        self.layers.iter().find(|l| l.role == LayerRole::Main)
    }

    pub fn all_layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl ImageDataProvider for LayerStack {
    fn layers(&self, filter: RoleFilter) -> Vec<&Layer> {
        self.layers.iter().filter(|l| filter.accepts(l.role)).collect()
    }

    fn find_layer(&self, id: LayerId) -> Option<&Layer> {
        self.get_layer(id)
    }
}
