use std::collections::HashSet;
use std::sync::Arc;

use slicecomp_core::{
    AppearanceSettings, ChangeEvent, DisplaySlice, Layer, LayerId, LayerRole, LayerStack, Size, SliceAxis,
    SliceViewModel, TilingConfig,
};
use slicecomp_renderer::{FrameContext, RecordingSurface, RendererConfig, SliceRenderer, UpdateReport};

const A: LayerId = LayerId(10);
const B: LayerId = LayerId(20);
const S: LayerId = LayerId(30);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn slice(w: u32, h: u32) -> Arc<DisplaySlice> {
    Arc::new(DisplaySlice::filled(w, h, [128, 128, 128, 255]))
}

fn scenario() -> LayerStack {
    let mut stack = LayerStack::new();
    stack.add_layer(Layer::new(A, "anatomy", LayerRole::Main).with_slice(slice(64, 48)));
    stack.add_layer(
        Layer::new(B, "overlay", LayerRole::Overlay)
            .with_sticky(true)
            .with_alpha(0.5)
            .with_slice(slice(64, 48)),
    );
    stack.add_layer(Layer::new(S, "segmentation", LayerRole::Label).with_slice(slice(64, 48)));
    stack
}

fn run(
    renderer: &mut SliceRenderer,
    stack: &LayerStack,
    model: &mut SliceViewModel,
    appearance: &AppearanceSettings,
) -> UpdateReport {
    renderer.notify_all(model.take_events());
    renderer.on_update(&FrameContext {
        data: stack,
        model,
        appearance,
    })
}

fn key_set(renderer: &SliceRenderer) -> HashSet<LayerId> {
    renderer.resources().layer_ids().collect()
}

#[test]
fn test_depth_order_and_removal() {
    init_logging();
    let mut stack = scenario();
    let mut model = SliceViewModel::new(SliceAxis::Axial, Size::new(640, 480), TilingConfig::single(A));
    let appearance = AppearanceSettings::default();
    let mut renderer = SliceRenderer::new(SliceAxis::Axial, RendererConfig::default());

    run(&mut renderer, &stack, &mut model, &appearance);
    assert_eq!(key_set(&renderer), [A, B, S].into_iter().collect());

    let depth = |r: &SliceRenderer, id: LayerId| r.resources().get(id).unwrap().depth();
    assert!(depth(&renderer, A) < depth(&renderer, B));
    assert!(depth(&renderer, B) < depth(&renderer, S));

    let a_serial = renderer.resources().get(A).unwrap().serial();
    let s_serial = renderer.resources().get(S).unwrap().serial();
    let b_actor = renderer.resources().get(B).unwrap().actor();

    stack.remove_layer(B);
    renderer.notify(ChangeEvent::LayersChanged);
    let report = run(&mut renderer, &stack, &mut model, &appearance);

    let stats = report.reconcile.unwrap();
    assert_eq!(stats.reused, 2);
    assert_eq!(stats.dropped, 1);
    assert_eq!(key_set(&renderer), [A, S].into_iter().collect());
    assert!(renderer.resources().pool().is_spare(b_actor));
    assert_eq!(renderer.resources().get(A).unwrap().serial(), a_serial);
    assert_eq!(renderer.resources().get(S).unwrap().serial(), s_serial);
    assert!(depth(&renderer, A) < depth(&renderer, S));

    let mut surface = RecordingSurface::new();
    let frame = renderer.paint(
        &FrameContext {
            data: &stack,
            model: &model,
            appearance: &appearance,
        },
        &mut surface,
    );
    assert_eq!(surface.drawn_layers(), vec![A, S]);
    assert!(frame.to_json().unwrap().contains("\"viewports\""));
}

#[test]
fn test_readded_layer_reuses_pooled_actor() {
    init_logging();
    let mut stack = scenario();
    let mut model = SliceViewModel::new(SliceAxis::Axial, Size::new(640, 480), TilingConfig::single(A));
    let appearance = AppearanceSettings::default();
    let mut renderer = SliceRenderer::new(SliceAxis::Axial, RendererConfig::default());
    run(&mut renderer, &stack, &mut model, &appearance);
    let capacity = renderer.resources().pool().capacity();

    let removed = stack.remove_layer(B).unwrap();
    renderer.notify(ChangeEvent::LayersChanged);
    run(&mut renderer, &stack, &mut model, &appearance);

    stack.add_layer(removed);
    renderer.notify(ChangeEvent::LayersChanged);
    let report = run(&mut renderer, &stack, &mut model, &appearance);
    assert_eq!(report.reconcile.unwrap().created, 1);
    assert_eq!(renderer.resources().pool().capacity(), capacity);
    assert_eq!(renderer.resources().pool().active_count(), 3);
}

#[test]
fn test_new_slice_rebuilds_only_that_layer() {
    init_logging();
    let mut stack = scenario();
    let mut model = SliceViewModel::new(SliceAxis::Axial, Size::new(640, 480), TilingConfig::single(A));
    let appearance = AppearanceSettings::default();
    let mut renderer = SliceRenderer::new(SliceAxis::Axial, RendererConfig::default());
    run(&mut renderer, &stack, &mut model, &appearance);
    let b_before = renderer.resources().get(B).unwrap().serial();
    let s_actor = renderer.resources().get(S).unwrap().actor();

    if let Some(seg) = stack.get_layer_mut(S) {
        seg.set_display_slice(SliceAxis::Axial, slice(32, 24));
    }
    renderer.notify(ChangeEvent::LayersChanged);
    let stats = run(&mut renderer, &stack, &mut model, &appearance).reconcile.unwrap();
    assert_eq!(stats.rebuilt, 1);
    assert_eq!(stats.reused, 2);
    assert_eq!(renderer.resources().get(B).unwrap().serial(), b_before);
    assert_eq!(renderer.resources().get(S).unwrap().actor(), s_actor);
    assert_eq!(renderer.resources().get(S).unwrap().texture().size(), Size::new(32, 24));
}

#[test]
fn test_grid_layout_over_resize() {
    init_logging();
    let stack = scenario();
    let tiling = TilingConfig::for_layers(&[A, B], 1, 2, None).unwrap();
    let mut model = SliceViewModel::new(SliceAxis::Coronal, Size::new(601, 400), tiling);
    let appearance = AppearanceSettings::default();
    let mut renderer = SliceRenderer::new(SliceAxis::Coronal, RendererConfig::default());
    run(&mut renderer, &stack, &mut model, &appearance);

    let widths: Vec<u32> = renderer.layout().viewports().iter().map(|v| v.rect.width).collect();
    assert_eq!(widths.iter().sum::<u32>(), 601);

    model.resize(Size::new(800, 300), 2.0);
    let report = run(&mut renderer, &stack, &mut model, &appearance);
    assert!(report.layout_recomputed);
    let last = renderer.layout().viewports().last().unwrap();
    assert_eq!(last.rect.right(), 800);
    assert!((last.normalized.x1 - 1.0).abs() < 1e-10);
}
