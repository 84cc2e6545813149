use serde::{Deserialize, Serialize};

use slicecomp_core::{CameraState, Color, InterpolationMode, LayerId, LineStyle, NormalizedRect, PixelRect, Size};

use crate::actor::ActorHandle;
use crate::resource::{QuadGeometry, ResourceKey, Texture};

/// One textured quad to draw, with the state of the actor that shows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawItem {
    pub layer_id: LayerId,
    pub actor: ActorHandle,
    pub texture: ResourceKey,
    pub geometry: ResourceKey,
    pub depth: f64,
    pub color: [f32; 4], // RGBA, alpha is the actor opacity
    pub interpolation: InterpolationMode,
    pub mipmapping: bool,
}

/// Everything drawn inside one viewport, back to front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportFrame {
    pub layer_id: LayerId,
    pub rect: PixelRect,
    pub normalized: NormalizedRect,
    pub thumbnail: bool,
    pub camera: CameraState,
    pub background: Color,
    pub items: Vec<DrawItem>,
    /// Outline around a selected or hovered thumbnail.
    pub highlight: Option<LineStyle>,
}

/// Complete draw list for one slice window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub surface: Size,
    pub background: Color,
    pub overall_visibility: bool,
    pub viewports: Vec<ViewportFrame>,
}

impl RenderFrame {
    pub fn empty(surface: Size, background: Color) -> Self {
        Self {
            surface,
            background,
            overall_visibility: true,
            viewports: Vec::new(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.viewports.iter().map(|v| v.items.len()).sum()
    }

    pub fn viewport_for(&self, layer_id: LayerId, thumbnail: bool) -> Option<&ViewportFrame> {
        self.viewports
            .iter()
            .find(|v| v.layer_id == layer_id && v.thumbnail == thumbnail)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Receiver of the draw calls issued by [`crate::SliceRenderer::paint`].
pub trait RenderSurface {
    fn clear(&mut self, background: Color, surface: Size);

    fn begin_viewport(&mut self, viewport: &ViewportFrame);

    fn draw(&mut self, item: &DrawItem, texture: &Texture, geometry: &QuadGeometry);

    fn draw_outline(&mut self, _rect: PixelRect, _style: &LineStyle) {}

    fn end_viewport(&mut self, _viewport: &ViewportFrame) {}
}

/// A draw call as recorded by [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    Clear { background: Color, surface: Size },
    BeginViewport { layer_id: LayerId, rect: PixelRect, thumbnail: bool },
    Draw { layer_id: LayerId, texture: ResourceKey, depth: f64, opacity: f32, texture_size: Size },
    Outline { rect: PixelRect, color: Color, thickness: f64 },
    EndViewport,
}

/// A surface that only records what it was asked to draw.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RecordingSurface {
    pub commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layers drawn, in call order.
    pub fn drawn_layers(&self) -> Vec<LayerId> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Draw { layer_id, .. } => Some(*layer_id),
                _ => None,
            })
            .collect()
    }
}

impl RenderSurface for RecordingSurface {
    fn clear(&mut self, background: Color, surface: Size) {
        self.commands.push(DrawCommand::Clear { background, surface });
    }

    fn begin_viewport(&mut self, viewport: &ViewportFrame) {
        self.commands.push(DrawCommand::BeginViewport {
            layer_id: viewport.layer_id,
            rect: viewport.rect,
            thumbnail: viewport.thumbnail,
        });
    }

    fn draw(&mut self, item: &DrawItem, texture: &Texture, _geometry: &QuadGeometry) {
        self.commands.push(DrawCommand::Draw {
            layer_id: item.layer_id,
            texture: texture.key(),
            depth: item.depth,
            opacity: item.color[3],
            texture_size: texture.size(),
        });
    }

    fn draw_outline(&mut self, rect: PixelRect, style: &LineStyle) {
        self.commands.push(DrawCommand::Outline {
            rect,
            color: style.color,
            thickness: style.thickness,
        });
    }

    fn end_viewport(&mut self, _viewport: &ViewportFrame) {
        self.commands.push(DrawCommand::EndViewport);
    }
}
