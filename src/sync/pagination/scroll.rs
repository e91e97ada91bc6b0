//! Viewport geometry used by the pagers.

/// Scroll position captured before older content is prepended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollAnchor {
    /// Total content height at capture time.
    pub scroll_height: f64,
    /// Scroll offset at capture time.
    pub scroll_top: f64,
}

impl ScrollAnchor {
    /// Capture an anchor.
    #[must_use]
    pub const fn new(scroll_height: f64, scroll_top: f64) -> Self {
        Self {
            scroll_height,
            scroll_top,
        }
    }

    /// Scroll offset that keeps the previously visible content in place
    /// once the content height has grown to `new_scroll_height`.
    #[must_use]
    pub const fn compensate(&self, new_scroll_height: f64) -> f64 {
        new_scroll_height - self.scroll_height + self.scroll_top
    }
}

/// Current viewport measurements.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollMetrics {
    /// Total content height.
    pub scroll_height: f64,
    /// Visible height.
    pub client_height: f64,
    /// Scroll offset.
    pub scroll_top: f64,
}

impl ScrollMetrics {
    /// Content does not overflow the viewport, so no scroll event can fire.
    #[must_use]
    pub const fn is_underfilled(&self) -> bool {
        self.scroll_height <= self.client_height
    }

    /// Pixels left below the visible region.
    #[must_use]
    pub fn distance_to_bottom(&self) -> f64 {
        (self.scroll_height - self.client_height - self.scroll_top).max(0.0)
    }
}

/// Measures the rendered list after each load.
pub trait ViewportProbe: Send + Sync {
    /// Current metrics.
    fn metrics(&self) -> ScrollMetrics;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compensate_keeps_content_in_place() {
        let anchor = ScrollAnchor::new(1000.0, 200.0);
        assert!((anchor.compensate(1400.0) - 600.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_underfilled() {
        let metrics = ScrollMetrics {
            scroll_height: 300.0,
            client_height: 600.0,
            scroll_top: 0.0,
        };
        assert!(metrics.is_underfilled());
        assert!(metrics.distance_to_bottom().abs() < f64::EPSILON);

        let full = ScrollMetrics {
            scroll_height: 900.0,
            ..metrics
        };
        assert!(!full.is_underfilled());
        assert!((full.distance_to_bottom() - 300.0).abs() < f64::EPSILON);
    }
}
