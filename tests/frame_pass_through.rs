//! Full frame pipeline without the OS: build a UI frame, collect its hit
//! regions, run them through the shaper, and check the hit-test answers the
//! window procedure would give.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use overlay_renderer::hit_regions::{HitRegion, HitRegionAccumulator};
use overlay_renderer::overlay::{HitTestResponse, OverlayShared};
use overlay_renderer::shaper::{ShapeStrategy, ShapeTarget, WindowShaper};
use overlay_renderer::ui::{apply_overlay_style, OverlayPanel};

/// Routes shaping to shared window state the way the overlay window does.
struct SharedTarget(Arc<OverlayShared>);

impl ShapeTarget for SharedTarget {
    fn apply_native_shape(&self, _regions: &[HitRegion]) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_hit_test_regions(&self, regions: Vec<HitRegion>) {
        self.0.set_hit_regions(regions);
    }
}

fn synthetic_shared(width: i32, height: i32) -> Arc<OverlayShared> {
    let shared = Arc::new(OverlayShared::default());
    shared.set_client_size(width, height);
    shared.synthetic_hit_test.store(true, Ordering::Relaxed);
    shared
}

#[test]
fn panel_is_interactive_and_everything_else_passes_through() {
    let shared = synthetic_shared(1280, 720);
    let target = SharedTarget(Arc::clone(&shared));
    let mut shaper = WindowShaper::new(ShapeStrategy::Synthetic);
    let mut regions = HitRegionAccumulator::new();

    let ctx = egui::Context::default();
    apply_overlay_style(&ctx);
    let mut panel = OverlayPanel::default();

    let _ = ctx.run(egui::RawInput::default(), |ctx| {
        regions.begin_frame();
        panel.show(ctx, &mut regions);
    });
    shaper.apply(&target, regions.regions(), 1280, 720);

    let panel_rect = regions.regions()[0];
    let inside = (
        (panel_rect.left + panel_rect.right) / 2,
        (panel_rect.top + panel_rect.bottom) / 2,
    );
    assert_eq!(
        shared.hit_test_response(inside.0, inside.1),
        HitTestResponse::Client
    );

    // Far corner away from the panel passes through to the target app.
    assert_eq!(
        shared.hit_test_response(1279, 719),
        HitTestResponse::Transparent
    );
}

#[test]
fn frame_with_no_ui_passes_everything_through() {
    let shared = synthetic_shared(800, 600);
    let target = SharedTarget(Arc::clone(&shared));
    let mut shaper = WindowShaper::new(ShapeStrategy::Synthetic);

    let mut regions = HitRegionAccumulator::new();
    regions.begin_frame();
    shaper.apply(&target, regions.regions(), 800, 600);

    for (x, y) in [(0, 0), (400, 300), (799, 599)] {
        assert_eq!(shared.hit_test_response(x, y), HitTestResponse::Transparent);
    }
}

#[test]
fn margin_from_settings_reaches_the_hit_test() {
    let shared = synthetic_shared(800, 600);
    shared.hit_margin.store(6, Ordering::Relaxed);
    let target = SharedTarget(Arc::clone(&shared));
    let mut shaper = WindowShaper::new(ShapeStrategy::Synthetic);

    let mut regions = HitRegionAccumulator::new();
    regions.begin_frame();
    regions.add_rect(100.0, 100.0, 50.0, 50.0);
    shaper.apply(&target, regions.regions(), 800, 600);

    assert_eq!(shared.hit_test_response(95, 100), HitTestResponse::Client);
    assert_eq!(
        shared.hit_test_response(93, 100),
        HitTestResponse::Transparent
    );
}
