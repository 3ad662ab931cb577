//! Synthetic screen grabber for tests.
//!
//! Reports a configurable display size and returns a black RGB snapshot of
//! that size on every grab.  The size can be changed while a capture runs,
//! and grabs can be made to fail.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::application::capture_pipeline::{CaptureError, RawImage, ScreenGrabber};

pub struct MockScreenGrabber {
    width: AtomicU32,
    height: AtomicU32,
    failing: AtomicBool,
    grabs: AtomicUsize,
}

impl MockScreenGrabber {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: AtomicU32::new(width),
            height: AtomicU32::new(height),
            failing: AtomicBool::new(false),
            grabs: AtomicUsize::new(0),
        }
    }

    /// A single 1920×1080 display.
    pub fn full_hd() -> Self {
        Self::new(1920, 1080)
    }

    /// A single 3840×2160 display.
    pub fn uhd_4k() -> Self {
        Self::new(3840, 2160)
    }

    pub fn set_display_size(&self, width: u32, height: u32) {
        self.width.store(width, Ordering::SeqCst);
        self.height.store(height, Ordering::SeqCst);
    }

    /// Makes every later call fail with [`CaptureError::NoDisplay`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful grabs so far.
    pub fn grab_count(&self) -> usize {
        self.grabs.load(Ordering::SeqCst)
    }

    fn size(&self) -> Result<(u32, u32), CaptureError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CaptureError::NoDisplay("mock display unavailable".into()));
        }
        Ok((
            self.width.load(Ordering::SeqCst),
            self.height.load(Ordering::SeqCst),
        ))
    }
}

impl ScreenGrabber for MockScreenGrabber {
    fn primary_display_size(&self) -> Result<(u32, u32), CaptureError> {
        self.size()
    }

    fn grab(&self) -> Result<RawImage, CaptureError> {
        let (width, height) = self.size()?;
        self.grabs.fetch_add(1, Ordering::SeqCst);
        Ok(RawImage {
            width,
            height,
            rgb: vec![0; width as usize * height as usize * 3],
        })
    }
}
