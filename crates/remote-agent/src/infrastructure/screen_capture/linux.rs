//! Linux screen grabbing via Xlib `XGetImage` on the root window.
//!
//! The root window of the default screen covers the whole X screen, which is
//! treated as the primary display.  `XGetImage` returns a `ZPixmap` in the
//! server's native format; on every mainstream TrueColor server that is
//! 32 bits per pixel with the channel positions given by the image masks.
//! Other depths are rejected with [`CaptureError::Grab`].

#![cfg(all(target_os = "linux", feature = "x11"))]

use std::os::raw::c_ulong;
use std::ptr;
use std::slice;

use parking_lot::Mutex;
use x11::xlib::{self, Display};

use crate::application::capture_pipeline::{CaptureError, RawImage, ScreenGrabber};

struct DisplayHandle(*mut Display);

// SAFETY: Xlib is only entered while the owning mutex is held.
unsafe impl Send for DisplayHandle {}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        // SAFETY: pointer from XOpenDisplay, closed exactly once.
        unsafe { xlib::XCloseDisplay(self.0) };
    }
}

/// X11 implementation of [`ScreenGrabber`].
pub struct X11ScreenGrabber {
    display: Mutex<DisplayHandle>,
}

impl X11ScreenGrabber {
    /// Opens the display named by `DISPLAY`.
    ///
    /// # Errors
    ///
    /// [`CaptureError::NoDisplay`] if the X server cannot be reached.
    pub fn new() -> Result<Self, CaptureError> {
        // SAFETY: a null name selects the DISPLAY environment variable.
        let dpy = unsafe { xlib::XOpenDisplay(ptr::null()) };
        if dpy.is_null() {
            let name = std::env::var("DISPLAY").unwrap_or_else(|_| "<unset>".to_string());
            return Err(CaptureError::NoDisplay(format!(
                "XOpenDisplay failed; DISPLAY={name}"
            )));
        }
        Ok(Self {
            display: Mutex::new(DisplayHandle(dpy)),
        })
    }
}

impl ScreenGrabber for X11ScreenGrabber {
    fn primary_display_size(&self) -> Result<(u32, u32), CaptureError> {
        let handle = self.display.lock();
        // SAFETY: live connection held under the lock.
        let (w, h) = unsafe {
            let screen = xlib::XDefaultScreen(handle.0);
            (
                xlib::XDisplayWidth(handle.0, screen),
                xlib::XDisplayHeight(handle.0, screen),
            )
        };
        if w <= 0 || h <= 0 {
            return Err(CaptureError::NoDisplay("X11 reported an empty screen".into()));
        }
        Ok((w as u32, h as u32))
    }

    fn grab(&self) -> Result<RawImage, CaptureError> {
        let (width, height) = self.primary_display_size()?;
        let handle = self.display.lock();

        // SAFETY: live connection; the image is destroyed before returning.
        unsafe {
            let root = xlib::XDefaultRootWindow(handle.0);
            let image = xlib::XGetImage(
                handle.0,
                root,
                0,
                0,
                width,
                height,
                xlib::XAllPlanes(),
                xlib::ZPixmap,
            );
            if image.is_null() {
                return Err(CaptureError::Grab("XGetImage returned no image".into()));
            }

            let img = &*image;
            let result = if img.bits_per_pixel != 32 {
                Err(CaptureError::Grab(format!(
                    "unsupported X image depth: {} bpp",
                    img.bits_per_pixel
                )))
            } else {
                let stride = img.bytes_per_line as usize;
                let data = slice::from_raw_parts(img.data as *const u8, stride * height as usize);
                let masks = ChannelMasks {
                    red: img.red_mask,
                    green: img.green_mask,
                    blue: img.blue_mask,
                };
                Ok(RawImage {
                    width,
                    height,
                    rgb: xrgb32_to_rgb(data, width, height, stride, masks),
                })
            };

            xlib::XDestroyImage(image);
            result
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ChannelMasks {
    red: c_ulong,
    green: c_ulong,
    blue: c_ulong,
}

/// Converts little-endian 32-bit pixels to packed RGB using the channel masks.
fn xrgb32_to_rgb(data: &[u8], width: u32, height: u32, stride: usize, masks: ChannelMasks) -> Vec<u8> {
    let channel = |pixel: u32, mask: c_ulong| -> u8 {
        let mask = mask as u32;
        if mask == 0 {
            return 0;
        }
        ((pixel & mask) >> mask.trailing_zeros()) as u8
    };

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for row in data.chunks(stride).take(height as usize) {
        for px in row.chunks_exact(4).take(width as usize) {
            let pixel = u32::from_le_bytes([px[0], px[1], px[2], px[3]]);
            rgb.push(channel(pixel, masks.red));
            rgb.push(channel(pixel, masks.green));
            rgb.push(channel(pixel, masks.blue));
        }
    }
    rgb
}
