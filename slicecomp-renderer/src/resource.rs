//! Per-layer rendering resources and the caches that keep them in sync with
//! the current layer set.
//!
//! [`ResourceCache`] owns one [`ResourceHandle`] per drawable layer (texture,
//! quad geometry and a pooled actor). [`BaseAssemblyCache`] owns the pair of
//! render contexts (primary view and thumbnail) of every layer that can be
//! shown in its own viewport. Both are reconciled against the layer list in a
//! single keyed pass.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use slicecomp_core::{
    AppearanceSettings, Camera, Color, DisplaySlice, InterpolationMode, Layer, LayerId, NormalizedRect,
    Size, SliceAxis, SliceToken,
};

use crate::actor::{ActorHandle, ActorPool};

/// Opaque key of a texture or geometry object handed to the draw backend.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey(pub u64);

impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceKey({})", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("Layer {0} has no display slice for this view")]
    Uninitialized(LayerId),

    #[error("Display slice of layer {layer} is malformed ({width}x{height}, {bytes} bytes)")]
    MalformedSlice {
        layer: LayerId,
        width: u32,
        height: u32,
        bytes: usize,
    },
}

/// A texture backed by an RGBA staging copy of a display slice.
#[derive(Debug)]
pub struct Texture {
    key: ResourceKey,
    size: Size,
    pixels: Vec<u8>,
    pub interpolation: InterpolationMode,
    pub mipmapping: bool,
}

impl Texture {
    fn from_slice(key: ResourceKey, layer: LayerId, slice: &DisplaySlice) -> Result<Self, ResourceError> {
        if !slice.is_valid() {
            return Err(ResourceError::MalformedSlice {
                layer,
                width: slice.width(),
                height: slice.height(),
                bytes: slice.pixels().len(),
            });
        }
        Ok(Self {
            key,
            size: Size::new(slice.width(), slice.height()),
            pixels: slice.pixels().to_vec(),
            interpolation: InterpolationMode::Nearest,
            mipmapping: false,
        })
    }

    pub fn key(&self) -> ResourceKey {
        self.key
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// A textured quad covering a slice, in physical units.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadGeometry {
    key: ResourceKey,
    /// Counter-clockwise from the lower-left corner.
    pub corners: [[f64; 3]; 4],
    pub tex_coords: [[f32; 2]; 4],
}

impl QuadGeometry {
    fn for_slice(key: ResourceKey, slice: &DisplaySlice) -> Self {
        let (c0, c1) = slice.corners();
        let [sx, sy] = slice.spacing();
        let (x0, y0, x1, y1) = (c0.x * sx, c0.y * sy, c1.x * sx, c1.y * sy);
        Self {
            key,
            corners: [[x0, y0, 0.0], [x0, y1, 0.0], [x1, y1, 0.0], [x1, y0, 0.0]],
            tex_coords: [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]],
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.key
    }

    pub fn width(&self) -> f64 {
        self.corners[2][0] - self.corners[0][0]
    }

    pub fn height(&self) -> f64 {
        self.corners[2][1] - self.corners[0][1]
    }
}

/// Cached drawable for one layer.
///
/// The source slice is held weakly together with the token seen at build time;
/// when either no longer matches, the handle is replaced rather than edited.
#[derive(Debug)]
pub struct ResourceHandle {
    serial: u64,
    layer_id: LayerId,
    source: Weak<DisplaySlice>,
    source_token: SliceToken,
    texture: Texture,
    geometry: QuadGeometry,
    actor: ActorHandle,
    depth: f64,
}

impl ResourceHandle {
    /// Unique per construction; a rebuilt handle gets a new serial.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer_id
    }

    pub fn source_token(&self) -> SliceToken {
        self.source_token
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn geometry(&self) -> &QuadGeometry {
        &self.geometry
    }

    pub fn actor(&self) -> ActorHandle {
        self.actor
    }

    pub fn depth(&self) -> f64 {
        self.depth
    }

    /// Same slice object as the one this handle was built from.
    pub fn is_source_current(&self, slice: &Arc<DisplaySlice>) -> bool {
        self.source_token == slice.token() && std::ptr::eq(self.source.as_ptr(), Arc::as_ptr(slice))
    }
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub reused: usize,
    pub rebuilt: usize,
    pub created: usize,
    pub dropped: usize,
    pub failed: usize,
}

/// Keyed store of resource handles for one slice axis.
#[derive(Debug)]
pub struct ResourceCache {
    axis: SliceAxis,
    handles: HashMap<LayerId, Box<ResourceHandle>>,
    pool: ActorPool<LayerId>,
    next_serial: u64,
    next_key: u64,
}

impl ResourceCache {
    pub fn new(axis: SliceAxis, pool_batch_size: usize) -> Self {
        Self {
            axis,
            handles: HashMap::new(),
            pool: ActorPool::with_batch_size(pool_batch_size),
            next_serial: 0,
            next_key: 0,
        }
    }

    /// Bring the handle map in line with `layers`.
    ///
    /// Unchanged sources keep their handle; changed sources get a new handle
    /// that inherits the actor; absent layers give their actor back to the pool.
    /// Layers whose resources cannot be built are left without a handle.
    pub fn reconcile(&mut self, layers: &[&Layer], appearance: &AppearanceSettings) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        let mut old = std::mem::take(&mut self.handles);
        let mut new: HashMap<LayerId, Box<ResourceHandle>> = HashMap::with_capacity(layers.len());

        for layer in layers {
            let id = layer.id;
            if new.contains_key(&id) {
                warn!("layer {} listed twice, ignoring the duplicate", id);
                continue;
            }

            let previous = old.remove(&id);
            let Some(slice) = layer.display_slice(self.axis) else {
                debug!("{} not initialized for {:?}, no resources yet", id, self.axis);
                if let Some(handle) = previous {
                    self.pool.recycle(handle.actor);
                }
                stats.failed += 1;
                continue;
            };

            let outcome = match previous {
                Some(handle) if handle.is_source_current(slice) => {
                    stats.reused += 1;
                    Ok(handle)
                }
                Some(handle) => {
                    let actor = handle.actor;
                    let built = self.build(id, slice, actor);
                    if built.is_ok() {
                        stats.rebuilt += 1;
                    } else {
                        self.pool.recycle(actor);
                    }
                    built
                }
                None => {
                    let actor = self.pool.acquire();
                    let built = self.build(id, slice, actor);
                    match built {
                        Ok(_) => {
                            // Freshly acquired, so registration cannot fail.
                            if let Err(e) = self.pool.register(id, actor) {
                                warn!("could not key actor for {}: {}", id, e);
                            }
                            stats.created += 1;
                        }
                        Err(_) => {
                            self.pool.recycle(actor);
                        }
                    }
                    built
                }
            };

            match outcome {
                Ok(mut handle) => {
                    handle.texture.interpolation = appearance.interpolation;
                    handle.texture.mipmapping = layer.is_slicing_orthogonal();
                    new.insert(id, handle);
                }
                Err(e) => {
                    debug!("no resources for {}: {}", id, e);
                    stats.failed += 1;
                }
            }
        }

        for (id, handle) in old.drain() {
            debug!("dropping resources of removed {}", id);
            self.pool.recycle(handle.actor);
            stats.dropped += 1;
        }

        self.handles = new;
        stats
    }

    fn build(
        &mut self,
        layer_id: LayerId,
        slice: &Arc<DisplaySlice>,
        actor: ActorHandle,
    ) -> Result<Box<ResourceHandle>, ResourceError> {
        let texture = Texture::from_slice(self.alloc_key(), layer_id, slice)?;
        let geometry = QuadGeometry::for_slice(self.alloc_key(), slice);

        let depth = self.pool.actor(actor).map_or(0.0, |a| a.depth());
        if let Some(a) = self.pool.actor_mut(actor) {
            a.texture = Some(texture.key());
            a.geometry = Some(geometry.key());
            a.color = Color::WHITE;
        }

        self.next_serial += 1;
        Ok(Box::new(ResourceHandle {
            serial: self.next_serial,
            layer_id,
            source: Arc::downgrade(slice),
            source_token: slice.token(),
            texture,
            geometry,
            actor,
            depth,
        }))
    }

    fn alloc_key(&mut self) -> ResourceKey {
        self.next_key += 1;
        ResourceKey(self.next_key)
    }

    /// Refresh sampling parameters without rebuilding anything.
    pub fn apply_texture_settings(&mut self, layers: &[&Layer], appearance: &AppearanceSettings) {
        for layer in layers {
            if let Some(handle) = self.handles.get_mut(&layer.id) {
                handle.texture.interpolation = appearance.interpolation;
                handle.texture.mipmapping = layer.is_slicing_orthogonal();
            }
        }
    }

    /// Record a draw depth on both the handle and its actor.
    pub fn set_depth(&mut self, id: LayerId, depth: f64) {
        if let Some(handle) = self.handles.get_mut(&id) {
            handle.depth = depth;
            if let Some(actor) = self.pool.actor_mut(handle.actor) {
                actor.set_depth(depth);
            }
        }
    }

    pub fn set_opacity(&mut self, id: LayerId, opacity: f64) {
        if let Some(handle) = self.handles.get(&id) {
            if let Some(actor) = self.pool.actor_mut(handle.actor) {
                actor.opacity = opacity;
            }
        }
    }

    pub fn get(&self, id: LayerId) -> Option<&ResourceHandle> {
        self.handles.get(&id).map(|h| h.as_ref())
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.handles.contains_key(&id)
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.handles.keys().copied()
    }

    pub fn handles(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.handles.values().map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn pool(&self) -> &ActorPool<LayerId> {
        &self.pool
    }

    pub fn axis(&self) -> SliceAxis {
        self.axis
    }
}

/// One output region of the draw backend: viewport, camera and the actors it shows.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub viewport: NormalizedRect,
    pub pixel_size: Size,
    pub camera: Camera,
    pub background: Color,
    /// Whether the current layout places this context on screen.
    pub placed: bool,
    props: Vec<(LayerId, ActorHandle)>,
}

impl RenderContext {
    fn new() -> Self {
        Self {
            viewport: NormalizedRect::default(),
            pixel_size: Size::default(),
            camera: Camera::parallel(),
            background: Color::BLACK,
            placed: false,
            props: Vec::new(),
        }
    }

    /// Actors in draw order.
    pub fn props(&self) -> &[(LayerId, ActorHandle)] {
        &self.props
    }

    pub fn set_props(&mut self, props: Vec<(LayerId, ActorHandle)>) {
        self.props = props;
    }

    pub fn unplace(&mut self) {
        self.placed = false;
        self.props.clear();
    }
}

/// Render contexts for a layer that can be the base of a viewport.
#[derive(Debug, Clone)]
pub struct BaseAssembly {
    layer_id: LayerId,
    pub primary: RenderContext,
    pub thumbnail: RenderContext,
}

impl BaseAssembly {
    fn new(layer_id: LayerId) -> Self {
        Self {
            layer_id,
            primary: RenderContext::new(),
            thumbnail: RenderContext::new(),
        }
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer_id
    }

    pub fn context(&self, thumbnail: bool) -> &RenderContext {
        if thumbnail {
            &self.thumbnail
        } else {
            &self.primary
        }
    }

    pub fn context_mut(&mut self, thumbnail: bool) -> &mut RenderContext {
        if thumbnail {
            &mut self.thumbnail
        } else {
            &mut self.primary
        }
    }
}

/// One [`BaseAssembly`] per base-displayable layer, created on first sight.
#[derive(Debug, Default)]
pub struct BaseAssemblyCache {
    assemblies: HashMap<LayerId, Box<BaseAssembly>>,
}

impl BaseAssemblyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns (created, dropped).
    pub fn reconcile(&mut self, layers: &[&Layer]) -> (usize, usize) {
        let mut old = std::mem::take(&mut self.assemblies);
        let mut created = 0;
        for layer in layers.iter().filter(|l| l.role.is_base_displayable()) {
            if self.assemblies.contains_key(&layer.id) {
                continue;
            }
            let assembly = old.remove(&layer.id).unwrap_or_else(|| {
                created += 1;
                Box::new(BaseAssembly::new(layer.id))
            });
            self.assemblies.insert(layer.id, assembly);
        }
        (created, old.len())
    }

    pub fn get(&self, id: LayerId) -> Option<&BaseAssembly> {
        self.assemblies.get(&id).map(|a| a.as_ref())
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut BaseAssembly> {
        self.assemblies.get_mut(&id).map(|a| a.as_mut())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BaseAssembly> {
        self.assemblies.values_mut().map(|a| a.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &BaseAssembly> {
        self.assemblies.values().map(|a| a.as_ref())
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.assemblies.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }
}
