//! The frame loop: pump window messages, gather input, build the UI, shape
//! the window to the frame's hit regions, and paint.

use anyhow::Result;

use crate::settings::Settings;

#[cfg(windows)]
pub fn run(settings: Settings, process_name: &str) -> Result<()> {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Context;
    use tracing::{info, warn};

    use crate::gpu::SurfaceHost;
    use crate::hit_regions::HitRegionAccumulator;
    use crate::input::{poll_keyboard, poll_pointer, InputCollector};
    use crate::overlay::{pump_messages, OverlayWindow};
    use crate::render::Painter;
    use crate::shaper::{ShapeStrategy, WindowShaper};
    use crate::target;
    use crate::tracker::{TargetProbe, TargetState, Win32Probe, WindowTracker};
    use crate::ui::{apply_overlay_style, OverlayPanel};

    let target_hwnd = target::wait_for_main_window(process_name)
        .with_context(|| format!("no visible window found for process '{process_name}'"))?;

    let mut overlay = OverlayWindow::create(target_hwnd)?;
    unsafe {
        use windows::Win32::Foundation::HWND;
        use windows::Win32::UI::WindowsAndMessaging::SetForegroundWindow;
        let _ = SetForegroundWindow(HWND(target_hwnd as *mut core::ffi::c_void));
    }
    let shared = overlay.shared();
    shared.synthetic_hit_test.store(
        settings.shape_strategy == ShapeStrategy::Synthetic,
        Ordering::Relaxed,
    );
    shared
        .hit_margin
        .store(settings.hit_test_margin, Ordering::Relaxed);

    // First placement before the tracker takes over.
    let mut probe = Win32Probe::new(target_hwnd);
    let mut bounds_seen = false;
    match probe.query() {
        TargetState::Bounds(rect) => {
            overlay.update_bounds(rect);
            bounds_seen = true;
        }
        TargetState::Hidden => info!("target currently hidden, waiting for it"),
        TargetState::Closed => anyhow::bail!("target window closed before attach"),
    }
    let mut tracker = WindowTracker::spawn(probe, Duration::from_millis(settings.tracker_poll_ms));

    let (width, height) = overlay.client_size();
    let mut surface = SurfaceHost::new(
        overlay.raw_display_handle(),
        overlay.raw_window_handle(),
        width as u32,
        height as u32,
    )?;
    let mut painter = Painter::new(
        Arc::clone(&surface.device),
        Arc::clone(&surface.queue),
        surface.surface_format(),
    );

    let ctx = egui::Context::default();
    apply_overlay_style(&ctx);
    let mut collector = InputCollector::new(Arc::clone(&shared));
    let mut panel = OverlayPanel::default();
    let mut regions = HitRegionAccumulator::new();
    let mut shaper = WindowShaper::new(settings.shape_strategy);
    let frame_sleep = Duration::from_millis(settings.frame_sleep_ms);

    // Stay hidden until the target's bounds have been mirrored at least
    // once so the overlay never flashes at a stale placement.
    overlay.set_visible(bounds_seen);
    info!("overlay running");

    loop {
        if !pump_messages() {
            info!("quit message received");
            break;
        }
        if tracker.target_closed() {
            info!("target closed, shutting down");
            break;
        }
        if !overlay.is_alive() {
            warn!("overlay window destroyed externally");
            break;
        }

        if let Some(rect) = tracker.take_bounds_change() {
            overlay.update_bounds(rect);
            surface.ensure_size(rect.width().max(1) as u32, rect.height().max(1) as u32);
            bounds_seen = true;
        }

        let target_visible = bounds_seen && tracker.target_visible();
        if overlay.visible() != target_visible {
            overlay.set_visible(target_visible);
        }
        if !target_visible {
            std::thread::sleep(frame_sleep);
            continue;
        }

        let (width, height) = surface.size();

        panel.record_drops(overlay.take_file_drops());
        shared.force_pass_through.store(
            settings.force_pass_through || panel.force_pass_through,
            Ordering::Relaxed,
        );

        let raw_input = collector.collect(
            poll_pointer(overlay.hwnd()),
            &poll_keyboard(),
            width,
            height,
        );

        regions.begin_frame();
        let output = ctx.run(raw_input, |ctx| {
            panel.show(ctx, &mut regions);
        });

        shaper.apply(&overlay, regions.regions(), width as i32, height as i32);

        let primitives = ctx.tessellate(output.shapes, output.pixels_per_point);
        let frame = match surface.acquire_frame() {
            Ok(frame) => frame,
            Err(err) => {
                warn!("skipping frame: {err:#}");
                std::thread::sleep(frame_sleep);
                continue;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = surface
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("overlay_frame"),
            });
        painter.paint(
            &mut encoder,
            &view,
            &primitives,
            &output.textures_delta,
            width,
            height,
        );
        surface.queue.submit(Some(encoder.finish()));
        frame.present();

        std::thread::sleep(frame_sleep);
    }

    tracker.shutdown();
    overlay.set_visible(false);
    Ok(())
}

#[cfg(not(windows))]
pub fn run(_settings: Settings, _process_name: &str) -> Result<()> {
    anyhow::bail!("the overlay requires a Windows host")
}
