//! Platform-specific primary-display grabbers.
//!
//! Each platform implements [`ScreenGrabber`]; the native one is selected at
//! compile time and built by [`native_grabber`]:
//!
//! | Module    | OS      | API used                                  |
//! |-----------|---------|-------------------------------------------|
//! | `windows` | Windows | GDI `BitBlt` + `GetDIBits`                |
//! | `linux`   | Linux   | Xlib `XGetImage` on the root window (`x11` feature) |
//!
//! [`mock::MockScreenGrabber`] is always compiled so tests on any platform
//! can run the capture pipeline without a physical display.

use std::sync::Arc;

use crate::application::capture_pipeline::{CaptureError, ScreenGrabber};

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(all(target_os = "linux", feature = "x11"))]
pub mod linux;

/// Creates the screen grabber for this platform.
///
/// # Errors
///
/// [`CaptureError::NoDisplay`] when no display can be opened or this build
/// has no native backend.
#[cfg(target_os = "windows")]
pub fn native_grabber() -> Result<Arc<dyn ScreenGrabber>, CaptureError> {
    Ok(Arc::new(windows::GdiScreenGrabber::new()))
}

#[cfg(all(target_os = "linux", feature = "x11"))]
pub fn native_grabber() -> Result<Arc<dyn ScreenGrabber>, CaptureError> {
    Ok(Arc::new(linux::X11ScreenGrabber::new()?))
}

#[cfg(not(any(target_os = "windows", all(target_os = "linux", feature = "x11"))))]
pub fn native_grabber() -> Result<Arc<dyn ScreenGrabber>, CaptureError> {
    Err(CaptureError::NoDisplay(
        "no native screen grabber in this build (on Linux, enable the `x11` feature)".into(),
    ))
}
