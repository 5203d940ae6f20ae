//! The built-in overlay panel: a small status window demonstrating hit
//! regions, pass-through control, and file drops. Everything it draws
//! registers its rect as a hit region so it stays clickable.

use std::collections::VecDeque;

use crate::hit_regions::HitRegionAccumulator;
use crate::overlay::FileDrop;

const MAX_VISIBLE_DROPS: usize = 8;

/// Dark, slightly translucent styling so the overlay reads as a HUD over the
/// target window rather than a solid app.
pub fn apply_overlay_style(ctx: &egui::Context) {
    let mut visuals = egui::Visuals::dark();
    visuals.window_fill = egui::Color32::from_rgba_unmultiplied(20, 20, 24, 235);
    visuals.panel_fill = visuals.window_fill;
    visuals.window_rounding = egui::Rounding::same(6.0);
    visuals.window_shadow = egui::epaint::Shadow::NONE;
    ctx.set_visuals(visuals);
}

#[derive(Default)]
pub struct OverlayPanel {
    /// Pass-through override toggled from the panel; the frame loop mirrors
    /// it into the shared window state.
    pub force_pass_through: bool,
    recent_drops: VecDeque<FileDrop>,
    frame_count: u64,
}

impl OverlayPanel {
    pub fn record_drops(&mut self, drops: Vec<FileDrop>) {
        for drop in drops {
            if self.recent_drops.len() >= MAX_VISIBLE_DROPS {
                self.recent_drops.pop_front();
            }
            self.recent_drops.push_back(drop);
        }
    }

    /// Draw the panel and register its bounds as this frame's hit region.
    pub fn show(&mut self, ctx: &egui::Context, regions: &mut HitRegionAccumulator) {
        self.frame_count += 1;

        let response = egui::Window::new("Overlay")
            .default_pos(egui::pos2(24.0, 24.0))
            .default_width(260.0)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(format!("frame {}", self.frame_count));
                ui.checkbox(&mut self.force_pass_through, "Pass all input through");

                ui.separator();
                ui.label("Dropped files:");
                if self.recent_drops.is_empty() {
                    ui.weak("drag files onto this window");
                } else {
                    for drop in &self.recent_drops {
                        let name = drop
                            .path
                            .file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .unwrap_or_else(|| drop.path.display().to_string());
                        ui.monospace(format!(
                            "{name}  @ ({}, {})",
                            drop.point.0, drop.point.1
                        ));
                    }
                }
            });

        if let Some(response) = response {
            regions.add_egui_rect(response.response.rect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_log_keeps_only_recent_entries() {
        let mut panel = OverlayPanel::default();
        panel.record_drops(
            (0..20)
                .map(|i| FileDrop {
                    path: format!("{i}.txt").into(),
                    point: (0, 0),
                })
                .collect(),
        );
        assert_eq!(panel.recent_drops.len(), MAX_VISIBLE_DROPS);
        assert_eq!(
            panel.recent_drops.back().unwrap().path,
            std::path::PathBuf::from("19.txt")
        );
    }

    #[test]
    fn panel_registers_a_hit_region() {
        let ctx = egui::Context::default();
        apply_overlay_style(&ctx);
        let mut panel = OverlayPanel::default();
        let mut regions = HitRegionAccumulator::default();

        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            regions.begin_frame();
            panel.show(ctx, &mut regions);
        });

        assert_eq!(regions.len(), 1);
        assert!(!regions.regions()[0].is_degenerate());
    }
}
