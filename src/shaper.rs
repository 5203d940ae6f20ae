//! Applies the frame's accumulated hit regions to the overlay window.
//!
//! Two strategies exist. `Native` installs the union of all regions as an
//! OS-level window shape, so the window manager itself decides hit results.
//! `Synthetic` leaves the window un-shaped and answers the window manager's
//! hit-test query per point against the stored region set. The union/scan
//! logic is platform independent; only the [`ShapeTarget`] implementation
//! touches the OS.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::hit_regions::{clamp_regions, HitRegion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeStrategy {
    /// Shape the window to the union of the hit regions.
    Native,
    /// Keep the window un-shaped and answer hit-test queries per point.
    Synthetic,
}

impl Default for ShapeStrategy {
    fn default() -> Self {
        ShapeStrategy::Native
    }
}

/// A window that can either install a union region as its input-accepting
/// shape or expose a point-wise hit-test predicate over a region set.
pub trait ShapeTarget {
    /// Install the union of `regions` as the window shape. An empty slice
    /// installs an empty shape: the window accepts input nowhere.
    fn apply_native_shape(&self, regions: &[HitRegion]) -> anyhow::Result<()>;

    /// Replace the region set consulted by synthetic hit-test queries.
    fn set_hit_test_regions(&self, regions: Vec<HitRegion>);
}

/// Consumes the accumulated regions once per frame and updates the overlay
/// window's effective input-accepting area.
#[derive(Debug)]
pub struct WindowShaper {
    strategy: ShapeStrategy,
    /// Last clamped set successfully committed to the target. `None` after a
    /// failed OS call so the next frame retries instead of wrongly skipping.
    committed: Option<Vec<HitRegion>>,
}

impl WindowShaper {
    pub fn new(strategy: ShapeStrategy) -> Self {
        Self {
            strategy,
            committed: None,
        }
    }

    pub fn strategy(&self) -> ShapeStrategy {
        self.strategy
    }

    /// Called exactly once per frame after UI building completes.
    ///
    /// Regions are clamped to the client bounds first; re-applying an
    /// identical post-clamp set performs no OS call. A failed shaping call is
    /// logged and skipped; the overlay keeps whatever shape it had.
    pub fn apply<T: ShapeTarget>(
        &mut self,
        target: &T,
        regions: &[HitRegion],
        client_width: i32,
        client_height: i32,
    ) {
        let clamped = clamp_regions(regions, client_width, client_height);
        if self.committed.as_deref() == Some(clamped.as_slice()) {
            return;
        }

        match self.strategy {
            ShapeStrategy::Native => match target.apply_native_shape(&clamped) {
                Ok(()) => self.committed = Some(clamped),
                Err(err) => {
                    warn!("window shaping failed, keeping previous shape: {err:#}");
                    self.committed = None;
                }
            },
            ShapeStrategy::Synthetic => {
                target.set_hit_test_regions(clamped.clone());
                self.committed = Some(clamped);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct RecordingTarget {
        native_calls: Cell<usize>,
        synthetic_calls: Cell<usize>,
        last_native: RefCell<Vec<HitRegion>>,
        last_synthetic: RefCell<Vec<HitRegion>>,
        fail_native: Cell<bool>,
    }

    impl ShapeTarget for RecordingTarget {
        fn apply_native_shape(&self, regions: &[HitRegion]) -> anyhow::Result<()> {
            self.native_calls.set(self.native_calls.get() + 1);
            if self.fail_native.get() {
                anyhow::bail!("simulated SetWindowRgn failure");
            }
            *self.last_native.borrow_mut() = regions.to_vec();
            Ok(())
        }

        fn set_hit_test_regions(&self, regions: Vec<HitRegion>) {
            self.synthetic_calls.set(self.synthetic_calls.get() + 1);
            *self.last_synthetic.borrow_mut() = regions;
        }
    }

    fn rect(x: f32, y: f32, w: f32, h: f32) -> HitRegion {
        HitRegion::from_rect(x, y, w, h)
    }

    #[test]
    fn identical_set_is_applied_once() {
        let target = RecordingTarget::default();
        let mut shaper = WindowShaper::new(ShapeStrategy::Native);
        let regions = [rect(10.0, 10.0, 100.0, 40.0), rect(0.0, 200.0, 50.0, 50.0)];

        shaper.apply(&target, &regions, 1280, 720);
        shaper.apply(&target, &regions, 1280, 720);
        shaper.apply(&target, &regions, 1280, 720);
        assert_eq!(target.native_calls.get(), 1);
    }

    #[test]
    fn post_clamp_equality_counts_as_identical() {
        let target = RecordingTarget::default();
        let mut shaper = WindowShaper::new(ShapeStrategy::Native);

        // Both frames clamp to the full client rect even though the raw
        // rectangles differ.
        shaper.apply(&target, &[rect(-10.0, -10.0, 5000.0, 5000.0)], 800, 600);
        shaper.apply(&target, &[rect(-99.0, -99.0, 9000.0, 9000.0)], 800, 600);
        assert_eq!(target.native_calls.get(), 1);
        assert_eq!(
            target.last_native.borrow().as_slice(),
            &[HitRegion {
                left: 0,
                top: 0,
                right: 800,
                bottom: 600
            }]
        );
    }

    #[test]
    fn changed_set_reapplies() {
        let target = RecordingTarget::default();
        let mut shaper = WindowShaper::new(ShapeStrategy::Native);

        shaper.apply(&target, &[rect(0.0, 0.0, 10.0, 10.0)], 800, 600);
        shaper.apply(&target, &[rect(0.0, 0.0, 20.0, 10.0)], 800, 600);
        assert_eq!(target.native_calls.get(), 2);
    }

    #[test]
    fn client_resize_invalidates_clamped_set() {
        let target = RecordingTarget::default();
        let mut shaper = WindowShaper::new(ShapeStrategy::Native);
        let regions = [rect(0.0, 0.0, 2000.0, 2000.0)];

        shaper.apply(&target, &regions, 800, 600);
        shaper.apply(&target, &regions, 1024, 768);
        assert_eq!(target.native_calls.get(), 2);
    }

    #[test]
    fn empty_set_still_commits_once() {
        let target = RecordingTarget::default();
        let mut shaper = WindowShaper::new(ShapeStrategy::Native);

        shaper.apply(&target, &[], 800, 600);
        shaper.apply(&target, &[], 800, 600);
        assert_eq!(target.native_calls.get(), 1);
        assert!(target.last_native.borrow().is_empty());
    }

    #[test]
    fn failed_native_call_retries_next_frame() {
        let target = RecordingTarget::default();
        let mut shaper = WindowShaper::new(ShapeStrategy::Native);
        let regions = [rect(0.0, 0.0, 10.0, 10.0)];

        target.fail_native.set(true);
        shaper.apply(&target, &regions, 800, 600);
        assert_eq!(target.native_calls.get(), 1);

        // Same set again: the failure must not be remembered as committed.
        target.fail_native.set(false);
        shaper.apply(&target, &regions, 800, 600);
        assert_eq!(target.native_calls.get(), 2);

        shaper.apply(&target, &regions, 800, 600);
        assert_eq!(target.native_calls.get(), 2);
    }

    #[test]
    fn synthetic_mode_routes_to_predicate_state() {
        let target = RecordingTarget::default();
        let mut shaper = WindowShaper::new(ShapeStrategy::Synthetic);

        shaper.apply(&target, &[rect(5.0, 5.0, 10.0, 10.0)], 800, 600);
        assert_eq!(target.native_calls.get(), 0);
        assert_eq!(target.synthetic_calls.get(), 1);
        assert_eq!(target.last_synthetic.borrow().len(), 1);

        shaper.apply(&target, &[rect(5.0, 5.0, 10.0, 10.0)], 800, 600);
        assert_eq!(target.synthetic_calls.get(), 1);
    }
}
