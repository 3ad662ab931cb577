//! JPEG frame encoder built on the `image` crate.
//!
//! Snapshots larger than the capture target are downsampled with a
//! triangle (bilinear) filter before compression.  Snapshots that already
//! match the target are compressed as-is.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, RgbImage};
use remote_core::CaptureTarget;

use crate::application::capture_pipeline::{CaptureError, FrameEncoder, RawImage};

/// Default JPEG quality, 1-100.
pub const DEFAULT_JPEG_QUALITY: u8 = 70;

#[derive(Debug, Clone, Copy)]
pub struct JpegFrameEncoder {
    quality: u8,
}

impl JpegFrameEncoder {
    /// `quality` is clamped to 1-100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&self, image: RawImage, target: CaptureTarget) -> Result<Vec<u8>, CaptureError> {
        let RawImage { width, height, rgb } = image;
        let snapshot = RgbImage::from_raw(width, height, rgb).ok_or_else(|| {
            CaptureError::Encode(format!("pixel buffer does not match {width}x{height}"))
        })?;

        let frame = if target.needs_resize(width, height) {
            imageops::resize(&snapshot, target.width, target.height, FilterType::Triangle)
        } else {
            snapshot
        };

        let mut out = Vec::with_capacity(frame.as_raw().len() / 8);
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode(frame.as_raw(), frame.width(), frame.height(), ColorType::Rgb8)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
        Ok(out)
    }
}
