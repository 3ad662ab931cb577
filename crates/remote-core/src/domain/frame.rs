//! Captured frames and the capture-target calculation.
//!
//! # Capture target
//!
//! Frames are independent compressed still images, so their byte size grows
//! with the pixel count.  Displays larger than a quality ceiling (1920×1080 by
//! default) are downsampled before compression.  The target:
//!
//! - keeps the display's aspect ratio,
//! - never exceeds the ceiling on either axis,
//! - never upscales a display that already fits,
//! - has even dimensions (JPEG chroma subsampling works on 2×2 blocks),
//!   except on an axis whose ceiling or scaled size is a single pixel, which
//!   stays at 1.

use crate::protocol::messages::DesktopFrame;

/// Default horizontal quality ceiling in pixels.
pub const MAX_CAPTURE_WIDTH: u32 = 1920;
/// Default vertical quality ceiling in pixels.
pub const MAX_CAPTURE_HEIGHT: u32 = 1080;

/// Pixel size that captured frames are scaled to before compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTarget {
    pub width: u32,
    pub height: u32,
}

impl CaptureTarget {
    /// Returns `true` if producing this target from a `w`×`h` display
    /// requires resampling.
    pub fn needs_resize(&self, w: u32, h: u32) -> bool {
        self.width != w || self.height != h
    }
}

/// Computes the capture target for a display of `display_w`×`display_h`.
///
/// Returns `None` for a zero-sized display or a zero-sized ceiling.
pub fn capture_target(
    display_w: u32,
    display_h: u32,
    max_w: u32,
    max_h: u32,
) -> Option<CaptureTarget> {
    if display_w == 0 || display_h == 0 || max_w == 0 || max_h == 0 {
        return None;
    }

    let (dw, dh, mw, mh) = (
        u64::from(display_w),
        u64::from(display_h),
        u64::from(max_w),
        u64::from(max_h),
    );

    // Integer arithmetic keeps the limiting axis exactly on the ceiling.
    let (w, h) = if dw <= mw && dh <= mh {
        (dw, dh)
    } else if mw * dh <= mh * dw {
        (mw, dh * mw / dw)
    } else {
        (dw * mh / dh, mh)
    };

    let (w, h) = (w as u32, h as u32);

    Some(CaptureTarget {
        width: floor_even(w),
        height: floor_even(h),
    })
}

/// Largest even value `<= v`; 0 and 1 become 1 so the result never exceeds
/// the display or the ceiling.
fn floor_even(v: u32) -> u32 {
    if v < 2 {
        1
    } else {
        v & !1
    }
}

/// One compressed screen image.
///
/// Owned by the capture pipeline until it is handed to the transport link,
/// then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Compressed image bytes.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Size of the display the frame was captured from.
    pub source_width: u32,
    pub source_height: u32,
    /// Capture time, Unix epoch milliseconds.
    pub captured_at_ms: u64,
}

impl Frame {
    /// Wraps the frame into a `desktop_frame` payload for `session_id`.
    pub fn into_message(self, session_id: &str) -> DesktopFrame {
        DesktopFrame {
            session_id: session_id.to_string(),
            frame: self.data,
            timestamp: self.captured_at_ms,
            width: Some(self.width),
            height: Some(self.height),
            screen_width: Some(self.source_width),
            screen_height: Some(self.source_height),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn target(w: u32, h: u32) -> CaptureTarget {
        capture_target(w, h, MAX_CAPTURE_WIDTH, MAX_CAPTURE_HEIGHT).unwrap()
    }

    #[test]
    fn test_1080p_display_is_not_downsampled() {
        let t = target(1920, 1080);
        assert_eq!(t, CaptureTarget { width: 1920, height: 1080 });
        assert!(!t.needs_resize(1920, 1080));
    }

    #[test]
    fn test_4k_display_is_halved() {
        let t = target(3840, 2160);
        assert_eq!(t, CaptureTarget { width: 1920, height: 1080 });
        assert!(t.needs_resize(3840, 2160));
    }

    #[test]
    fn test_ultrawide_display_is_limited_by_width() {
        // Arrange: 3440×1440 (21:9)
        // Act
        let t = target(3440, 1440);

        // Assert
        assert_eq!(t.width, 1920);
        assert!(t.height <= 1080);
        assert_eq!(t.height % 2, 0);
        let ratio_in = 3440.0 / 1440.0;
        let ratio_out = t.width as f64 / t.height as f64;
        assert!((ratio_in - ratio_out).abs() < 0.01);
    }

    #[test]
    fn test_portrait_display_is_limited_by_height() {
        let t = target(1440, 2560);
        assert_eq!(t.height, 1080);
        assert!(t.width <= 1920);
        assert_eq!(t.width % 2, 0);
    }

    #[test]
    fn test_small_odd_display_is_rounded_down_to_even() {
        let t = target(1365, 767);
        assert_eq!(t, CaptureTarget { width: 1364, height: 766 });
    }

    #[test]
    fn test_oversized_odd_result_is_even() {
        // 2561×1441 scales to 1919.x × 1080 which floors to an odd width
        let t = target(2561, 1441);
        assert_eq!(t.width % 2, 0);
        assert_eq!(t.height % 2, 0);
        assert!(t.width <= 1920 && t.height <= 1080);
    }

    #[test]
    fn test_one_pixel_ceiling_is_never_exceeded() {
        // Arrange / Act
        let t = capture_target(1920, 1080, 1, 1).unwrap();

        // Assert
        assert_eq!(t, CaptureTarget { width: 1, height: 1 });
    }

    #[test]
    fn test_one_pixel_display_is_not_upscaled() {
        assert_eq!(target(1, 1), CaptureTarget { width: 1, height: 1 });
        assert_eq!(target(3, 1), CaptureTarget { width: 2, height: 1 });
    }

    #[test]
    fn test_extreme_aspect_keeps_a_visible_row() {
        // 10000×1 scales to 1920×0.19; the short axis stays one pixel tall
        let t = target(10_000, 1);
        assert_eq!(t, CaptureTarget { width: 1920, height: 1 });
    }

    #[test]
    fn test_zero_sized_display_has_no_target() {
        assert!(capture_target(0, 1080, 1920, 1080).is_none());
        assert!(capture_target(1920, 0, 1920, 1080).is_none());
    }

    #[test]
    fn test_custom_ceiling_is_respected() {
        let t = capture_target(1920, 1080, 1280, 720).unwrap();
        assert_eq!(t, CaptureTarget { width: 1280, height: 720 });
    }

    #[test]
    fn test_frame_into_message_carries_session_and_source_size() {
        // Arrange
        let frame = Frame {
            data: vec![1, 2, 3],
            width: 1920,
            height: 1080,
            source_width: 3840,
            source_height: 2160,
            captured_at_ms: 99,
        };

        // Act
        let msg = frame.into_message("sess");

        // Assert
        assert_eq!(msg.session_id, "sess");
        assert_eq!(msg.frame, vec![1, 2, 3]);
        assert_eq!(msg.timestamp, 99);
        assert_eq!(msg.screen_width, Some(3840));
        assert_eq!(msg.height, Some(1080));
    }
}
