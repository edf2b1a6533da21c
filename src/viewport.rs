//! Horizontal window onto the chain.
//!
//! The viewport decides which stages are worth evaluating at all: per-frame
//! work is bounded by the canvas width, not by the length of the chain.

use std::ops::Range;

use crate::config::{LayoutConfig, ViewportConfig};

#[derive(Debug, Clone, Copy)]
struct DragAnchor {
    pointer_x: f64,
    offset: f64,
}

#[derive(Debug, Clone)]
pub struct Viewport {
    config: ViewportConfig,
    stage_count: usize,
    stage_spacing: f64,
    left_margin: f64,
    // Stages whose centre is this far left of the offset can still show.
    lead_margin: f64,
    offset: f64,
    canvas_width: f64,
    canvas_height: f64,
    drag: Option<DragAnchor>,
}

impl Viewport {
    pub fn new(
        config: ViewportConfig,
        layout: &LayoutConfig,
        stage_count: usize,
        canvas_width: f64,
        canvas_height: f64,
    ) -> Self {
        let mut viewport = Self {
            stage_count,
            stage_spacing: layout.stage_spacing,
            left_margin: layout.left_margin,
            lead_margin: layout.left_margin + layout.large_radius,
            offset: 0.0,
            canvas_width: config.min_canvas_width,
            canvas_height: config.min_canvas_height,
            drag: None,
            config,
        };
        viewport.set_canvas_size(canvas_width, canvas_height);
        viewport
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn canvas_width(&self) -> f64 {
        self.canvas_width
    }

    pub fn canvas_height(&self) -> f64 {
        self.canvas_height
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Adopts a new canvas size. Degenerate sizes are raised to the minimum
    /// extent and the offset is re-clamped against the new width.
    pub fn set_canvas_size(&mut self, width: f64, height: f64) {
        self.canvas_width = self.sanitize_width(width);
        self.canvas_height = if height.is_finite() {
            height.max(self.config.min_canvas_height)
        } else {
            self.config.min_canvas_height
        };
        self.offset = self.clamp_offset(self.offset, self.canvas_width);
    }

    /// Horizontal extent of the whole chain, from x = 0 to the last stage.
    pub fn chain_extent(&self) -> f64 {
        self.left_margin + self.stage_count as f64 * self.stage_spacing
    }

    pub fn max_scroll_for(&self, canvas_width: f64) -> f64 {
        let width = self.sanitize_width(canvas_width);
        (self.chain_extent() - width + self.config.trailing_margin).max(0.0)
    }

    pub fn max_scroll(&self) -> f64 {
        self.max_scroll_for(self.canvas_width)
    }

    /// Clamps `candidate` into `[0, max_scroll]`. NaN maps to 0.
    pub fn clamp_offset(&self, candidate: f64, canvas_width: f64) -> f64 {
        if candidate.is_nan() {
            return 0.0;
        }
        candidate.clamp(0.0, self.max_scroll_for(canvas_width))
    }

    /// Stage indices that must be drawn at `offset` on a canvas `canvas_width` wide.
    pub fn visible_range_for(&self, offset: f64, canvas_width: f64) -> Range<usize> {
        let width = self.sanitize_width(canvas_width);
        let first = ((offset - self.lead_margin) / self.stage_spacing).floor();
        let start = if first.is_finite() && first > 0.0 {
            (first as usize).min(self.stage_count)
        } else {
            0
        };
        let across = (width / self.stage_spacing).ceil() as usize;
        let end = start
            .saturating_add(across)
            .saturating_add(self.config.overscan)
            .min(self.stage_count);
        start..end
    }

    pub fn visible_range(&self) -> Range<usize> {
        self.visible_range_for(self.offset, self.canvas_width)
    }

    /// One-based first and last stage shown in the status line.
    pub fn visible_summary(&self) -> (usize, usize) {
        let last_stage = self.stage_count.max(1);
        let first = ((self.offset / self.stage_spacing).floor() as usize)
            .saturating_add(1)
            .clamp(1, last_stage);
        let across = (self.canvas_width / self.stage_spacing).floor() as usize;
        let last = first.saturating_add(across).saturating_add(1).min(last_stage);
        (first, last)
    }

    /// Centres the viewport on `index` and returns the resulting offset.
    pub fn scroll_to_index(&mut self, index: usize) -> f64 {
        let index = index.min(self.stage_count.saturating_sub(1));
        let target = self.left_margin + index as f64 * self.stage_spacing
            - self.canvas_width / 2.0;
        self.set_offset(target)
    }

    /// Jumps to a one-based stage number as typed by the operator.
    pub fn jump_to_stage(&mut self, one_based: i64) -> f64 {
        let last = self.stage_count.saturating_sub(1) as i64;
        let index = one_based.saturating_sub(1).clamp(0, last.max(0));
        log::debug!("jumping to stage {}", index + 1);
        self.scroll_to_index(index as usize)
    }

    pub fn pan_by(&mut self, delta_pixels: f64) {
        if delta_pixels.is_finite() {
            self.set_offset(self.offset + delta_pixels);
        }
    }

    pub fn wheel(&mut self, delta_pixels: f64) {
        self.pan_by(delta_pixels * self.config.wheel_factor);
    }

    /// Pans by a whole number of stage spacings.
    pub fn step(&mut self, stages: f64) {
        self.pan_by(stages * self.stage_spacing);
    }

    pub fn page(&mut self, forward: bool) {
        let stages = if forward {
            self.config.page_stages
        } else {
            -self.config.page_stages
        };
        self.step(stages);
    }

    pub fn scroll_home(&mut self) {
        self.set_offset(0.0);
    }

    pub fn scroll_end(&mut self) {
        self.set_offset(self.max_scroll());
    }

    pub fn begin_drag(&mut self, pointer_x: f64) {
        self.drag = Some(DragAnchor {
            pointer_x,
            offset: self.offset,
        });
    }

    /// Moves the chain with the pointer, relative to where the drag began.
    pub fn drag_to(&mut self, pointer_x: f64) {
        if let Some(anchor) = self.drag {
            self.set_offset(anchor.offset + anchor.pointer_x - pointer_x);
        }
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    fn set_offset(&mut self, candidate: f64) -> f64 {
        self.offset = self.clamp_offset(candidate, self.canvas_width);
        self.offset
    }

    fn sanitize_width(&self, width: f64) -> f64 {
        if width.is_finite() {
            width.max(self.config.min_canvas_width)
        } else {
            self.config.min_canvas_width
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    fn viewport(width: f64) -> Viewport {
        Viewport::new(
            ViewportConfig::default(),
            &LayoutConfig::default(),
            100,
            width,
            480.0,
        )
    }

    #[test]
    fn max_scroll_leaves_a_trailing_margin() {
        let view = viewport(1000.0);
        // 120 + 100 * 140 - 1000 + 100
        assert!(approx_eq!(f64, view.max_scroll(), 13220.0));
    }

    #[test]
    fn wide_canvas_does_not_scroll() {
        let view = viewport(20_000.0);
        assert_eq!(view.max_scroll(), 0.0);
        assert_eq!(view.visible_range(), 0..100);
    }

    #[test]
    fn clamp_handles_every_candidate() {
        let view = viewport(1000.0);
        assert_eq!(view.clamp_offset(-50.0, 1000.0), 0.0);
        assert_eq!(view.clamp_offset(f64::NAN, 1000.0), 0.0);
        assert_eq!(view.clamp_offset(f64::INFINITY, 1000.0), view.max_scroll());
        assert_eq!(view.clamp_offset(f64::NEG_INFINITY, 1000.0), 0.0);
        assert_eq!(view.clamp_offset(500.0, 1000.0), 500.0);
    }

    #[test]
    fn visible_range_is_bounded_by_the_canvas() {
        let view = viewport(1000.0);
        // ceil(1000 / 140) = 8, plus 3 overscan
        assert_eq!(view.visible_range_for(0.0, 1000.0), 0..11);
        assert_eq!(view.visible_range_for(1400.0, 1000.0), 8..19);
        let end = view.visible_range_for(view.max_scroll(), 1000.0);
        assert_eq!(end.end, 100);
    }

    #[test]
    fn visible_range_tolerates_wild_offsets() {
        let view = viewport(1000.0);
        assert_eq!(view.visible_range_for(f64::NAN, 1000.0), 0..11);
        assert_eq!(view.visible_range_for(1e300, 1000.0), 100..100);
    }

    #[test]
    fn degenerate_canvas_is_raised_to_the_minimum() {
        let mut view = viewport(1000.0);
        view.set_canvas_size(0.0, -10.0);
        assert!(approx_eq!(f64, view.canvas_width(), 1.0));
        assert!(approx_eq!(f64, view.canvas_height(), 420.0));
        view.set_canvas_size(f64::NAN, f64::INFINITY);
        assert!(approx_eq!(f64, view.canvas_width(), 1.0));
        assert!(approx_eq!(f64, view.canvas_height(), 420.0));
        let range = view.visible_range();
        assert!(!range.is_empty());
    }

    #[test]
    fn growing_the_canvas_reclamps_the_offset() {
        let mut view = viewport(1000.0);
        view.scroll_end();
        view.set_canvas_size(4000.0, 480.0);
        assert_eq!(view.offset(), view.max_scroll());
    }

    #[test]
    fn jump_centres_the_stage() {
        let mut view = viewport(1000.0);
        let offset = view.jump_to_stage(50);
        // stage 50 is index 49: 120 + 49 * 140 - 500
        assert!(approx_eq!(f64, offset, 6480.0));
        assert!(view.visible_range().contains(&49));
    }

    #[test]
    fn jump_targets_are_clamped() {
        let mut view = viewport(1000.0);
        assert_eq!(view.jump_to_stage(0), 0.0);
        assert_eq!(view.jump_to_stage(-7), 0.0);
        let last = view.jump_to_stage(i64::MAX);
        assert_eq!(last, view.max_scroll());
        assert!(view.visible_range().contains(&99));
    }

    #[test]
    fn keyboard_navigation() {
        let mut view = viewport(1000.0);
        view.step(1.0);
        assert!(approx_eq!(f64, view.offset(), 140.0));
        view.page(true);
        assert!(approx_eq!(f64, view.offset(), 560.0));
        view.page(false);
        view.step(-1.0);
        assert_eq!(view.offset(), 0.0);
        view.step(-1.0);
        assert_eq!(view.offset(), 0.0);
        view.scroll_end();
        assert_eq!(view.offset(), view.max_scroll());
        view.scroll_home();
        assert_eq!(view.offset(), 0.0);
    }

    #[test]
    fn wheel_is_damped() {
        let mut view = viewport(1000.0);
        view.wheel(100.0);
        assert!(approx_eq!(f64, view.offset(), 80.0));
        view.wheel(f64::NAN);
        assert!(approx_eq!(f64, view.offset(), 80.0));
    }

    #[test]
    fn drag_follows_the_pointer_from_its_anchor() {
        let mut view = viewport(1000.0);
        view.pan_by(500.0);
        view.begin_drag(400.0);
        assert!(view.is_dragging());
        view.drag_to(300.0);
        assert!(approx_eq!(f64, view.offset(), 600.0));
        // overshooting the left edge and coming back is anchored, not cumulative
        view.drag_to(2000.0);
        assert_eq!(view.offset(), 0.0);
        view.drag_to(400.0);
        assert!(approx_eq!(f64, view.offset(), 500.0));
        view.end_drag();
        view.drag_to(0.0);
        assert!(approx_eq!(f64, view.offset(), 500.0));
    }

    #[test]
    fn summary_reports_one_based_stages() {
        let mut view = viewport(1000.0);
        assert_eq!(view.visible_summary(), (1, 9));
        view.scroll_end();
        let (first, last) = view.visible_summary();
        assert_eq!(last, 100);
        assert!(first <= last);
    }

    proptest! {
        #[test]
        fn clamping_is_idempotent(x in any::<f64>(), width in 1.0f64..30_000.0) {
            let view = viewport(width);
            let once = view.clamp_offset(x, width);
            prop_assert_eq!(view.clamp_offset(once, width), once);
        }

        #[test]
        fn origin_always_shows_the_first_stage(width in 1.0f64..30_000.0) {
            let view = viewport(width);
            prop_assert!(view.visible_range_for(0.0, width).contains(&0));
        }

        #[test]
        fn scrolling_to_a_stage_makes_it_visible(index in 0usize..100, width in 1.0f64..30_000.0) {
            let mut view = viewport(width);
            view.scroll_to_index(index);
            prop_assert!(view.visible_range().contains(&index));
        }

        #[test]
        fn work_is_independent_of_chain_length(offset in 0.0f64..1e6, width in 1.0f64..4000.0) {
            let view = Viewport::new(
                ViewportConfig::default(),
                &LayoutConfig::default(),
                1_000_000,
                width,
                480.0,
            );
            let range = view.visible_range_for(view.clamp_offset(offset, width), width);
            prop_assert!(range.len() <= (width / 140.0).ceil() as usize + 3);
        }
    }
}
