//! Interactive-region accumulation for the overlay.
//!
//! UI code reports the rectangles that should intercept mouse input while it
//! builds the frame; everything outside them is click-through. Regions are in
//! overlay client coordinates and use half-open bounds: a point on the
//! `right`/`bottom` edge is outside.

/// Axis-aligned rectangle in overlay client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRegion {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl HitRegion {
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            left: x as i32,
            top: y as i32,
            right: (x + width) as i32,
            bottom: (y + height) as i32,
        }
    }

    /// Zero-area rectangles (including negative extents) match no point.
    pub fn is_degenerate(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Clamp to `[0, width] x [0, height]`.
    pub fn clamped(&self, width: i32, height: i32) -> Self {
        Self {
            left: self.left.max(0),
            top: self.top.max(0),
            right: self.right.min(width),
            bottom: self.bottom.min(height),
        }
    }

    /// Grow every edge outward by `margin` pixels.
    pub fn inflated(&self, margin: i32) -> Self {
        Self {
            left: self.left - margin,
            top: self.top - margin,
            right: self.right + margin,
            bottom: self.bottom + margin,
        }
    }

    /// Half-open containment: `x in [left, right)`, `y in [top, bottom)`.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        !self.is_degenerate() && x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

impl From<egui::Rect> for HitRegion {
    fn from(rect: egui::Rect) -> Self {
        Self::from_rect(rect.min.x, rect.min.y, rect.width(), rect.height())
    }
}

/// Normalize a frame's region set against the client bounds.
///
/// The order of the input is preserved so identical frames diff as identical.
pub fn clamp_regions(regions: &[HitRegion], width: i32, height: i32) -> Vec<HitRegion> {
    regions.iter().map(|r| r.clamped(width, height)).collect()
}

/// Point-in-region scan used by synthetic hit testing.
///
/// Each region is inflated by `margin` and then clamped to the client bounds
/// before the half-open containment check. First match wins; an empty set
/// matches nothing.
pub fn hit_test(regions: &[HitRegion], margin: i32, width: i32, height: i32, x: i32, y: i32) -> bool {
    regions
        .iter()
        .any(|r| r.inflated(margin).clamped(width, height).contains(x, y))
}

/// Per-frame collector for hit regions.
///
/// `begin_frame` resets the sequence without releasing its allocation; UI code
/// appends while it builds widgets. Single-threaded by design: only the frame
/// loop touches it.
#[derive(Debug, Default)]
pub struct HitRegionAccumulator {
    regions: Vec<HitRegion>,
}

impl HitRegionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear collected regions at the start of each frame.
    pub fn begin_frame(&mut self) {
        self.regions.clear();
    }

    /// Add a rectangle in overlay client coordinates. Negative sizes are kept
    /// as degenerate rectangles that never match a point.
    pub fn add_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.regions.push(HitRegion::from_rect(x, y, width, height));
    }

    pub fn add_egui_rect(&mut self, rect: egui::Rect) {
        self.regions.push(rect.into());
    }

    /// Convenience: register the current egui window as interactive. Call
    /// between `Window::show`'s closure start and end, or with the response
    /// rect of a finished window.
    pub fn add_window_response(&mut self, response: &egui::Response) {
        self.add_egui_rect(response.rect);
    }

    pub fn regions(&self) -> &[HitRegion] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
