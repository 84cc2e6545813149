//! Walks a small three-layer dataset through the slice and scene renderers,
//! logging every draw call and printing the final frame as JSON.
//!
//! Usage: `slicecomp-demo [settings.json]`

use std::error::Error;
use std::sync::Arc;

use log::info;

use slicecomp_core::{
    ChangeEvent, Color, DisplaySlice, Layer, LayerId, LayerRole, LayerStack, LineStyle, PixelRect, Size,
    SliceAxis, SliceViewModel, TilingConfig,
};
use slicecomp_io::RendererSettings;
use slicecomp_renderer::{
    Bounds3, DrawItem, FrameContext, LabelId, LabelMesh, QuadGeometry, RenderSurface, SceneRenderer,
    SliceCoordinator, SliceRenderer, Texture, ViewportFrame,
};

const ANATOMY: LayerId = LayerId(1);
const OVERLAY: LayerId = LayerId(2);
const SEGMENTATION: LayerId = LayerId(3);

/// A surface that logs each call instead of drawing.
struct LogSurface;

impl RenderSurface for LogSurface {
    fn clear(&mut self, background: Color, surface: Size) {
        info!("clear {}x{} to {:?}", surface.width, surface.height, background);
    }

    fn begin_viewport(&mut self, viewport: &ViewportFrame) {
        info!(
            "viewport {} at {:?}{}",
            viewport.layer_id,
            viewport.rect,
            if viewport.thumbnail { " (thumbnail)" } else { "" }
        );
    }

    fn draw(&mut self, item: &DrawItem, texture: &Texture, geometry: &QuadGeometry) {
        info!(
            "  draw {} z={:.3} alpha={:.2} texture {}x{} quad {:.1}x{:.1}",
            item.layer_id,
            item.depth,
            item.color[3],
            texture.size().width,
            texture.size().height,
            geometry.width(),
            geometry.height()
        );
    }

    fn draw_outline(&mut self, rect: PixelRect, style: &LineStyle) {
        info!("  outline {:?} width {}", rect, style.thickness);
    }
}

fn gradient_slice(width: u32, height: u32, tint: [u8; 3]) -> Arc<DisplaySlice> {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = ((x + y) * 255 / (width + height).max(1)) as u8;
            pixels.extend_from_slice(&[v / 2 + tint[0] / 2, v / 2 + tint[1] / 2, v / 2 + tint[2] / 2, 255]);
        }
    }
    Arc::new(DisplaySlice::new(width, height, [0.8, 0.8], pixels))
}

fn dataset() -> LayerStack {
    let mut stack = LayerStack::new();
    stack.add_layer(Layer::new(ANATOMY, "T1", LayerRole::Main).with_slice(gradient_slice(128, 96, [200, 200, 200])));
    stack.add_layer(
        Layer::new(OVERLAY, "PET", LayerRole::Overlay)
            .with_sticky(true)
            .with_alpha(0.5)
            .with_slice(gradient_slice(128, 96, [255, 80, 0])),
    );
    stack.add_layer(
        Layer::new(SEGMENTATION, "labels", LayerRole::Label).with_slice(gradient_slice(128, 96, [0, 255, 0])),
    );
    stack
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let settings = match std::env::args().nth(1) {
        Some(path) => RendererSettings::load(path)?,
        None => RendererSettings::default(),
    };
    let mut stack = dataset();

    let mut models: Vec<SliceViewModel> = SliceAxis::ALL
        .iter()
        .map(|&axis| {
            let tiling = TilingConfig::for_layers(&[ANATOMY, OVERLAY], 1, 1, None)?;
            let mut model = SliceViewModel::new(axis, Size::new(640, 480), tiling);
            model.set_slice_geometry([128, 96], [0.8, 0.8]);
            Ok(model)
        })
        .collect::<Result<_, slicecomp_core::TilingError>>()?;
    let coordinator = SliceCoordinator::new(settings.linked_zoom);
    coordinator.reset_views(&mut models);

    let mut renderers: Vec<SliceRenderer> = SliceAxis::ALL
        .iter()
        .map(|&axis| SliceRenderer::new(axis, settings.renderer.clone()))
        .collect();

    for (renderer, model) in renderers.iter_mut().zip(models.iter_mut()) {
        renderer.notify_all(model.take_events());
        let ctx = FrameContext {
            data: &stack,
            model,
            appearance: &settings.appearance,
        };
        let report = renderer.on_update(&ctx);
        info!("{:?}: {:?}", renderer.axis(), report.reconcile);
        renderer.paint(&ctx, &mut LogSurface);
    }

    // Drop the overlay and repaint the axial view.
    stack.remove_layer(OVERLAY);
    let (renderer, model) = (&mut renderers[0], &mut models[0]);
    model.set_tiling(TilingConfig::single(ANATOMY));
    renderer.notify(ChangeEvent::LayersChanged);
    renderer.notify_all(model.take_events());
    let ctx = FrameContext {
        data: &stack,
        model,
        appearance: &settings.appearance,
    };
    let report = renderer.on_update(&ctx);
    info!("after removing {}: {:?}", OVERLAY, report.reconcile);
    let frame = renderer.paint(&ctx, &mut LogSurface);
    println!("{}", frame.to_json()?);

    let mut scene = SceneRenderer::new(settings.renderer.pool_batch_size);
    let meshes = [
        LabelMesh {
            label: LabelId(1),
            color: Color::rgb(1.0, 0.0, 0.0),
            opacity: 1.0,
            visible: true,
            bounds: Bounds3::new([0.0, 0.0, 0.0], [40.0, 30.0, 20.0]),
        },
        LabelMesh {
            label: LabelId(2),
            color: Color::rgb(0.0, 1.0, 0.0),
            opacity: 0.6,
            visible: true,
            bounds: Bounds3::new([20.0, 10.0, 5.0], [90.0, 70.0, 40.0]),
        },
    ];
    let stats = scene.sync_meshes(SEGMENTATION, 0, &meshes);
    scene.reset_view();
    let saved = scene.save_camera_state();
    info!("3D view: {:?}, camera saved at {:?}", stats, saved.position);
    println!("{}", serde_json::to_string_pretty(&scene.camera_state())?);

    Ok(())
}
