//! Viewer canvas geometry: local-to-remote coordinate mapping and auto-fit.
//!
//! # Three coordinate spaces (for beginners)
//!
//! 1. **Local**: where the operator's pointer is on the viewer's window.
//! 2. **Rendered**: the canvas's internal pixel grid.  It mirrors the native
//!    size of the incoming frame (e.g. 1920×1080 for a downsampled 4K screen).
//!    The canvas is drawn on screen at `scale`, with its top-left corner at
//!    `origin` in local space.
//! 3. **Remote**: the agent's real display pixels (e.g. 3840×2160).
//!
//! A local point maps to remote space as
//!
//! ```text
//! remote = clamp(round((local - origin) / scale * remoteDim / renderedDim), 0, remoteDim - 1)
//! ```
//!
//! The clamp guarantees every command lands on the remote screen even when the
//! pointer sits on the canvas border or slightly outside it.

/// Smallest scale auto-fit will choose.
pub const MIN_SCALE: f64 = 0.1;

/// Where and how large the canvas is drawn, and what it represents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasGeometry {
    pub origin_x: f64,
    pub origin_y: f64,
    pub scale: f64,
    pub rendered_width: u32,
    pub rendered_height: u32,
    pub remote_width: u32,
    pub remote_height: u32,
}

impl CanvasGeometry {
    /// Geometry for a canvas drawn at `scale` from the top-left corner whose
    /// rendered size equals the remote size.
    pub fn native(width: u32, height: u32, scale: f64) -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            scale,
            rendered_width: width,
            rendered_height: height,
            remote_width: width,
            remote_height: height,
        }
    }

    /// On-screen width of the canvas in local units.
    pub fn display_width(&self) -> f64 {
        self.rendered_width as f64 * self.scale
    }

    /// On-screen height of the canvas in local units.
    pub fn display_height(&self) -> f64 {
        self.rendered_height as f64 * self.scale
    }

    /// Returns `true` if the local point lies inside the drawn canvas.
    pub fn contains(&self, local_x: f64, local_y: f64) -> bool {
        local_x >= self.origin_x
            && local_y >= self.origin_y
            && local_x < self.origin_x + self.display_width()
            && local_y < self.origin_y + self.display_height()
    }

    /// Maps a local pointer position into remote screen pixels.
    pub fn map_to_remote(&self, local_x: f64, local_y: f64) -> (i32, i32) {
        (
            map_axis(
                local_x,
                self.origin_x,
                self.scale,
                self.remote_width,
                self.rendered_width,
            ),
            map_axis(
                local_y,
                self.origin_y,
                self.scale,
                self.remote_height,
                self.rendered_height,
            ),
        )
    }
}

fn map_axis(local: f64, origin: f64, scale: f64, remote_dim: u32, rendered_dim: u32) -> i32 {
    if remote_dim == 0 || rendered_dim == 0 || scale.is_nan() || scale <= 0.0 || local.is_nan() {
        return 0;
    }
    let max = (remote_dim - 1) as f64;
    let mapped = ((local - origin) / scale * remote_dim as f64 / rendered_dim as f64).round();
    mapped.clamp(0.0, max) as i32
}

/// Scale that fits a `frame_w`×`frame_h` canvas inside the viewport.
///
/// `max(min(vw/fw, vh/fh), 0.1)`; a zero-sized frame yields `1.0`.
pub fn fit_scale(viewport_w: f64, viewport_h: f64, frame_w: u32, frame_h: u32) -> f64 {
    if frame_w == 0 || frame_h == 0 {
        return 1.0;
    }
    let s = f64::min(viewport_w / frame_w as f64, viewport_h / frame_h as f64);
    if s.is_nan() {
        return MIN_SCALE;
    }
    s.max(MIN_SCALE)
}

/// One-shot auto-fit guard for a viewer session.
///
/// The first frame of a session triggers one automatic fit.  After that the
/// scale only changes when the operator asks for a fit, and an explicit fit
/// turns automatic fitting off for the rest of the session.
#[derive(Debug, Clone, Default)]
pub struct AutoFit {
    fitted: bool,
    auto_disabled: bool,
}

impl AutoFit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called for every received frame.  Returns the scale to apply on the
    /// first call of a session and `None` afterwards.
    pub fn on_frame(
        &mut self,
        viewport_w: f64,
        viewport_h: f64,
        frame_w: u32,
        frame_h: u32,
    ) -> Option<f64> {
        if self.fitted || self.auto_disabled {
            return None;
        }
        self.fitted = true;
        Some(fit_scale(viewport_w, viewport_h, frame_w, frame_h))
    }

    /// Operator-invoked fit: always recomputes and disables automatic fits.
    pub fn fit_now(&mut self, viewport_w: f64, viewport_h: f64, frame_w: u32, frame_h: u32) -> f64 {
        self.fitted = true;
        self.auto_disabled = true;
        fit_scale(viewport_w, viewport_h, frame_w, frame_h)
    }

    /// Re-arms the guard for a new session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn has_fitted(&self) -> bool {
        self.fitted
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn downsampled_4k_at_half_scale() -> CanvasGeometry {
        CanvasGeometry {
            origin_x: 100.0,
            origin_y: 50.0,
            scale: 0.5,
            rendered_width: 1920,
            rendered_height: 1080,
            remote_width: 3840,
            remote_height: 2160,
        }
    }

    #[test]
    fn test_origin_maps_to_remote_zero() {
        let g = downsampled_4k_at_half_scale();
        assert_eq!(g.map_to_remote(100.0, 50.0), (0, 0));
    }

    #[test]
    fn test_mapping_applies_scale_and_resolution_ratio() {
        // Arrange: local (580, 320) is canvas pixel (960, 540) in rendered space
        let g = downsampled_4k_at_half_scale();

        // Act
        let mapped = g.map_to_remote(580.0, 320.0);

        // Assert: rendered 960×540 on a 1920×1080 canvas is the centre of a 4K screen
        assert_eq!(mapped, (1920, 1080));
    }

    #[test]
    fn test_far_edge_is_clamped_to_last_pixel() {
        let g = downsampled_4k_at_half_scale();
        let right = g.origin_x + g.display_width();
        let bottom = g.origin_y + g.display_height();
        assert_eq!(g.map_to_remote(right, bottom), (3839, 2159));
    }

    #[test]
    fn test_points_outside_canvas_are_clamped() {
        let g = downsampled_4k_at_half_scale();
        assert_eq!(g.map_to_remote(-500.0, -500.0), (0, 0));
        assert_eq!(g.map_to_remote(1e7, 1e7), (3839, 2159));
    }

    #[test]
    fn test_every_point_inside_canvas_maps_in_bounds() {
        // Arrange: a grid of pointer positions across several geometries
        let geometries = [
            downsampled_4k_at_half_scale(),
            CanvasGeometry::native(1366, 768, 0.73),
            CanvasGeometry::native(800, 600, 2.0),
            CanvasGeometry {
                origin_x: 3.5,
                origin_y: 7.25,
                scale: 0.1,
                rendered_width: 1918,
                rendered_height: 1078,
                remote_width: 2561,
                remote_height: 1441,
            },
        ];

        for g in geometries {
            let steps = 37;
            for i in 0..=steps {
                for j in 0..=steps {
                    let lx = g.origin_x + g.display_width() * i as f64 / steps as f64;
                    let ly = g.origin_y + g.display_height() * j as f64 / steps as f64;

                    // Act
                    let (rx, ry) = g.map_to_remote(lx, ly);

                    // Assert
                    assert!((0..g.remote_width as i32).contains(&rx), "x {rx} for {g:?}");
                    assert!((0..g.remote_height as i32).contains(&ry), "y {ry} for {g:?}");
                }
            }
        }
    }

    #[test]
    fn test_degenerate_geometry_maps_to_zero() {
        let mut g = CanvasGeometry::native(0, 0, 1.0);
        assert_eq!(g.map_to_remote(10.0, 10.0), (0, 0));
        g = CanvasGeometry::native(100, 100, 0.0);
        assert_eq!(g.map_to_remote(10.0, 10.0), (0, 0));
    }

    #[test]
    fn test_contains_excludes_far_edge() {
        let g = CanvasGeometry::native(100, 50, 1.0);
        assert!(g.contains(0.0, 0.0));
        assert!(g.contains(99.9, 49.9));
        assert!(!g.contains(100.0, 10.0));
        assert!(!g.contains(-0.1, 10.0));
    }

    #[test]
    fn test_fit_scale_picks_the_limiting_axis() {
        assert_eq!(fit_scale(960.0, 1080.0, 1920, 1080), 0.5);
        assert_eq!(fit_scale(1920.0, 540.0, 1920, 1080), 0.5);
    }

    #[test]
    fn test_fit_scale_has_a_floor() {
        assert_eq!(fit_scale(10.0, 10.0, 1920, 1080), MIN_SCALE);
    }

    #[test]
    fn test_fit_scale_zero_frame_is_identity() {
        assert_eq!(fit_scale(800.0, 600.0, 0, 0), 1.0);
    }

    #[test]
    fn test_auto_fit_fires_once_per_session() {
        // Arrange
        let mut fit = AutoFit::new();

        // Act
        let first = fit.on_frame(960.0, 540.0, 1920, 1080);
        let second = fit.on_frame(960.0, 540.0, 1920, 1080);
        let third = fit.on_frame(480.0, 270.0, 1920, 1080);

        // Assert
        assert_eq!(first, Some(0.5));
        assert_eq!(second, None);
        assert_eq!(third, None);
    }

    #[test]
    fn test_fit_now_recomputes_and_disables_auto() {
        // Arrange
        let mut fit = AutoFit::new();

        // Act
        let forced = fit.fit_now(480.0, 270.0, 1920, 1080);
        let auto = fit.on_frame(960.0, 540.0, 1920, 1080);

        // Assert
        assert_eq!(forced, 0.25);
        assert_eq!(auto, None);
        assert_eq!(fit.fit_now(960.0, 540.0, 1920, 1080), 0.5);
    }

    #[test]
    fn test_reset_rearms_auto_fit() {
        let mut fit = AutoFit::new();
        fit.on_frame(960.0, 540.0, 1920, 1080);
        fit.reset();
        assert!(!fit.has_fitted());
        assert!(fit.on_frame(960.0, 540.0, 1920, 1080).is_some());
    }
}
