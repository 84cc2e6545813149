//! The per-window slice compositing pipeline.
//!
//! Change notifications accumulate in an [`EventBucket`]. [`SliceRenderer::on_update`]
//! turns them into the stages that need to run, in a fixed order:
//!
//! | stage | runs on |
//! |---|---|
//! | assemblies | layers |
//! | layout | layers, layout, surface size |
//! | layer appearance | layers, display mapping, segmentation opacity |
//! | scene appearance | layers, appearance settings |
//! | cameras | layers, layout, surface size, zoom/pan |
//!
//! Painting never mutates the renderer.

use log::{debug, info};
use serde::Serialize;

use slicecomp_core::{
    AppearanceSettings, ChangeEvent, EventBucket, ImageDataProvider, Layer, LayerId, LayerRole, RoleFilter,
    SliceAxis, SliceViewModel,
};

use crate::actor::ActorHandle;
use crate::camera::sync_slice_camera;
use crate::config::RendererConfig;
use crate::depth::{DepthAssigner, DepthOrder};
use crate::layout::{LayoutEngine, ViewParams, ViewportDescriptor, ViewportLayout};
use crate::render_data::{DrawItem, RenderFrame, RenderSurface, ViewportFrame};
use crate::resource::{BaseAssemblyCache, ReconcileStats, ResourceCache, ResourceHandle};

/// Inputs shared by the update and paint passes.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    pub data: &'a dyn ImageDataProvider,
    pub model: &'a SliceViewModel,
    pub appearance: &'a AppearanceSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateStage {
    Assemblies,
    Layout,
    LayerAppearance,
    SceneAppearance,
    Cameras,
}

impl UpdateStage {
    fn triggered_by(self, events: &EventBucket) -> bool {
        use ChangeEvent::*;
        match self {
            UpdateStage::Assemblies => events.has(LayersChanged),
            UpdateStage::Layout => events.has_any(&[LayersChanged, LayoutChanged, SurfaceResized]),
            UpdateStage::LayerAppearance => {
                events.has_any(&[LayersChanged, DisplayMappingChanged, SegmentationOpacityChanged])
            }
            UpdateStage::SceneAppearance => events.has_any(&[LayersChanged, AppearanceChanged]),
            UpdateStage::Cameras => {
                events.has_any(&[LayersChanged, LayoutChanged, SurfaceResized, ZoomPanChanged])
            }
        }
    }

    const ORDER: [UpdateStage; 5] = [
        UpdateStage::Assemblies,
        UpdateStage::Layout,
        UpdateStage::LayerAppearance,
        UpdateStage::SceneAppearance,
        UpdateStage::Cameras,
    ];
}

/// What one [`SliceRenderer::on_update`] call did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateReport {
    pub stages: Vec<UpdateStage>,
    pub reconcile: Option<ReconcileStats>,
    pub depths_recomputed: bool,
    pub layout_recomputed: bool,
}

impl UpdateReport {
    pub fn ran(&self, stage: UpdateStage) -> bool {
        self.stages.contains(&stage)
    }
}

/// Opacity an actor gets for a layer.
fn layer_opacity(layer: &Layer, segmentation_alpha: f64) -> f64 {
    match layer.role {
        LayerRole::Label => segmentation_alpha,
        _ if layer.is_sticky() => layer.alpha(),
        _ => 1.0,
    }
}

pub struct SliceRenderer {
    axis: SliceAxis,
    config: RendererConfig,
    events: EventBucket,
    resources: ResourceCache,
    assemblies: BaseAssemblyCache,
    depth: DepthAssigner,
    layout: LayoutEngine,
}

impl SliceRenderer {
    /// A renderer for one slice axis. Every stage is pending until the first update.
    pub fn new(axis: SliceAxis, config: RendererConfig) -> Self {
        Self {
            axis,
            resources: ResourceCache::new(axis, config.pool_batch_size),
            assemblies: BaseAssemblyCache::new(),
            depth: DepthAssigner::new(config.depth),
            layout: LayoutEngine::new(config.thumbnails),
            events: EventBucket::all(),
            config,
        }
    }

    pub fn notify(&mut self, event: ChangeEvent) {
        self.events.fire(event);
    }

    pub fn notify_all(&mut self, events: EventBucket) {
        self.events.merge(events);
    }

    pub fn pending_events(&self) -> EventBucket {
        self.events
    }

    /// Run the stages the pending events call for, then clear them.
    pub fn on_update(&mut self, ctx: &FrameContext<'_>) -> UpdateReport {
        let events = self.events.take();
        let mut report = UpdateReport::default();
        if events.is_empty() {
            return report;
        }

        let layers = ctx.data.layers(RoleFilter::ALL);
        for stage in UpdateStage::ORDER {
            if !stage.triggered_by(&events) {
                continue;
            }
            match stage {
                UpdateStage::Assemblies => {
                    let stats = self.resources.reconcile(&layers, ctx.appearance);
                    let (created, dropped) = self.assemblies.reconcile(&layers);
                    debug!(
                        "{:?} assemblies: {:?}, base assemblies +{} -{}",
                        self.axis, stats, created, dropped
                    );
                    report.reconcile = Some(stats);
                }
                UpdateStage::Layout => {
                    report.depths_recomputed = self.update_depths(&layers);
                    report.layout_recomputed = self.layout.update(
                        ctx.model.tiling(),
                        ctx.model.surface(),
                        ctx.model.is_thumbnail_on(),
                    );
                    self.place_assemblies();
                }
                UpdateStage::LayerAppearance => {
                    for layer in &layers {
                        self.resources
                            .set_opacity(layer.id, layer_opacity(layer, ctx.model.segmentation_alpha()));
                    }
                }
                UpdateStage::SceneAppearance => {
                    self.resources.apply_texture_settings(&layers, ctx.appearance);
                    for assembly in self.assemblies.iter_mut() {
                        assembly.primary.background = ctx.appearance.background;
                        assembly.thumbnail.background = ctx.appearance.background;
                    }
                }
                UpdateStage::Cameras => self.update_cameras(ctx.model),
            }
            report.stages.push(stage);
        }

        info!("{:?} update {:?} ran {:?}", self.axis, events, report.stages);
        report
    }

    fn update_depths(&mut self, layers: &[&Layer]) -> bool {
        let recomputed = self.depth.assign(layers);
        let order = self.depth.order();
        let ids: Vec<LayerId> = self.resources.layer_ids().collect();
        for id in ids {
            self.resources.set_depth(id, order.depth(id).unwrap_or(0.0));
        }
        recomputed
    }

    /// Point each base assembly's contexts at their viewports and fill their prop lists.
    fn place_assemblies(&mut self) {
        for assembly in self.assemblies.iter_mut() {
            assembly.primary.unplace();
            assembly.thumbnail.unplace();
        }

        let overlays: Vec<_> = self
            .depth
            .order()
            .overlays()
            .iter()
            .filter_map(|&id| self.resources.get(id).map(|h| (id, h.actor())))
            .collect();

        for vp in self.layout.layout().viewports() {
            let Some(assembly) = self.assemblies.get_mut(vp.layer_id) else {
                debug!("no base assembly for {} in {:?} viewport", vp.layer_id, self.axis);
                continue;
            };
            let mut props = Vec::with_capacity(overlays.len() + 1);
            if let Some(handle) = self.resources.get(vp.layer_id) {
                props.push((vp.layer_id, handle.actor()));
            }
            props.extend(overlays.iter().filter(|(id, _)| *id != vp.layer_id).copied());

            let context = assembly.context_mut(vp.thumbnail);
            context.viewport = vp.normalized;
            context.pixel_size = vp.rect.size();
            context.placed = true;
            context.set_props(props);
        }
    }

    fn update_cameras(&mut self, model: &SliceViewModel) {
        self.layout.update_transforms(&ViewParams::from_model(model));
        for vp in self.layout.layout().viewports() {
            if let Some(assembly) = self.assemblies.get_mut(vp.layer_id) {
                let t = &vp.transform;
                sync_slice_camera(
                    &mut assembly.context_mut(vp.thumbnail).camera,
                    t.center,
                    t.zoom,
                    vp.rect.height,
                    t.pixel_ratio,
                );
            }
        }
    }

    /// Assemble the draw list for the current state.
    pub fn build_frame(&self, ctx: &FrameContext<'_>) -> RenderFrame {
        let mut frame = RenderFrame::empty(ctx.model.surface(), ctx.appearance.background);
        frame.overall_visibility = ctx.appearance.overall_visibility;
        if self.resources.is_empty() {
            return frame;
        }

        let layout = self.layout.layout();
        let segmentation = self.visible_segmentation(ctx);
        let selected = ctx
            .model
            .selected_layer()
            .or_else(|| ctx.model.tiling().cells().first().copied());

        for vp in layout.viewports() {
            if ctx.data.find_layer(vp.layer_id).is_none() {
                debug!("{} is gone, skipping its viewport", vp.layer_id);
                continue;
            }
            let Some(assembly) = self.assemblies.get(vp.layer_id) else {
                debug!("{} has no base assembly, skipping its viewport", vp.layer_id);
                continue;
            };
            let context = assembly.context(vp.thumbnail);

            let items = self.viewport_items(ctx, layout, vp, context.props(), segmentation);
            let highlight = if vp.thumbnail {
                ctx.appearance
                    .thumbnail_highlight(
                        selected == Some(vp.layer_id),
                        ctx.model.hovered_layer() == Some(vp.layer_id),
                    )
                    .copied()
            } else {
                None
            };

            frame.viewports.push(ViewportFrame {
                layer_id: vp.layer_id,
                rect: vp.rect,
                normalized: vp.normalized,
                thumbnail: vp.thumbnail,
                camera: context.camera.state(),
                background: context.background,
                items,
                highlight,
            });
        }
        frame
    }

    /// The label layer drawn over the image, if segmentation is visible at all.
    fn visible_segmentation(&self, ctx: &FrameContext<'_>) -> Option<LayerId> {
        if ctx.model.segmentation_alpha() <= 0.0 || !ctx.appearance.overall_visibility {
            return None;
        }
        match ctx.model.selected_segmentation() {
            Some(id) => ctx
                .data
                .find_layer(id)
                .filter(|l| l.role == LayerRole::Label)
                .map(|l| l.id),
            None => ctx
                .data
                .layers(RoleFilter::only(LayerRole::Label))
                .first()
                .map(|l| l.id),
        }
    }

    fn viewport_items(
        &self,
        ctx: &FrameContext<'_>,
        layout: &ViewportLayout,
        vp: &ViewportDescriptor,
        props: &[(LayerId, ActorHandle)],
        segmentation: Option<LayerId>,
    ) -> Vec<DrawItem> {
        let mut items = Vec::new();
        let mut label_item = None;
        for &(id, _) in props {
            let Some(handle) = self.resources.get(id) else {
                continue;
            };
            let Some(layer) = ctx.data.find_layer(id).filter(|l| l.is_drawable()) else {
                continue;
            };
            if id == vp.layer_id {
                items.extend(self.draw_item(handle));
                continue;
            }
            if vp.thumbnail {
                continue;
            }
            if layer.role == LayerRole::Label {
                if segmentation == Some(id) {
                    label_item = self.draw_item(handle);
                }
                continue;
            }
            let eligible = layer.is_sticky()
                && layer.alpha() > 0.0
                && !(layout.is_tiled() && layer.role == LayerRole::Main);
            if eligible {
                items.extend(self.draw_item(handle));
            }
        }
        items.extend(label_item);
        items
    }

    fn draw_item(&self, handle: &ResourceHandle) -> Option<DrawItem> {
        let actor = self.resources.pool().actor(handle.actor())?;
        if !actor.visible {
            return None;
        }
        Some(DrawItem {
            layer_id: handle.layer_id(),
            actor: handle.actor(),
            texture: handle.texture().key(),
            geometry: handle.geometry().key(),
            depth: handle.depth(),
            color: actor.color.to_f32_array(actor.opacity),
            interpolation: handle.texture().interpolation,
            mipmapping: handle.texture().mipmapping,
        })
    }

    /// Issue the draw calls for the current state and return the frame that was drawn.
    pub fn paint(&self, ctx: &FrameContext<'_>, surface: &mut dyn RenderSurface) -> RenderFrame {
        let frame = self.build_frame(ctx);
        surface.clear(frame.background, frame.surface);
        for vp in &frame.viewports {
            surface.begin_viewport(vp);
            for item in &vp.items {
                if let Some(handle) = self.resources.get(item.layer_id) {
                    surface.draw(item, handle.texture(), handle.geometry());
                }
            }
            if let Some(style) = &vp.highlight {
                surface.draw_outline(vp.rect, style);
            }
            surface.end_viewport(vp);
        }
        frame
    }

    /// The viewport under a surface pixel position.
    pub fn viewport_at(&self, x: f64, y: f64) -> Option<&ViewportDescriptor> {
        self.layout.layout().viewport_at(x, y)
    }

    pub fn axis(&self) -> SliceAxis {
        self.axis
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn resources(&self) -> &ResourceCache {
        &self.resources
    }

    pub fn assemblies(&self) -> &BaseAssemblyCache {
        &self.assemblies
    }

    pub fn depth_order(&self) -> &DepthOrder {
        self.depth.order()
    }

    pub fn layout(&self) -> &ViewportLayout {
        self.layout.layout()
    }
}
