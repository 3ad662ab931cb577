//! Windows screen grabbing via GDI.
//!
//! The primary display is copied from the screen DC into a memory bitmap
//! with `BitBlt`, then read back as a top-down 32-bit DIB with `GetDIBits`
//! and repacked from BGRA to RGB.  Every GDI handle is released on all
//! paths through a small guard type.

#![cfg(target_os = "windows")]

use std::ffi::c_void;

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
    GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
    HBITMAP, HDC, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

use crate::application::capture_pipeline::{CaptureError, RawImage, ScreenGrabber};

/// GDI implementation of [`ScreenGrabber`].
#[derive(Debug, Default)]
pub struct GdiScreenGrabber;

impl GdiScreenGrabber {
    pub fn new() -> Self {
        Self
    }
}

struct ScreenDc(HDC);

impl Drop for ScreenDc {
    fn drop(&mut self) {
        // SAFETY: obtained from GetDC(desktop) and released once.
        unsafe { ReleaseDC(HWND::default(), self.0) };
    }
}

struct MemoryDc(HDC);

impl Drop for MemoryDc {
    fn drop(&mut self) {
        // SAFETY: created by CreateCompatibleDC and deleted once.
        let _ = unsafe { DeleteDC(self.0) };
    }
}

struct Bitmap(HBITMAP);

impl Drop for Bitmap {
    fn drop(&mut self) {
        // SAFETY: created by CreateCompatibleBitmap and deleted once, after
        // the memory DC no longer selects it.
        let _ = unsafe { DeleteObject(self.0) };
    }
}

impl ScreenGrabber for GdiScreenGrabber {
    fn primary_display_size(&self) -> Result<(u32, u32), CaptureError> {
        // SAFETY: GetSystemMetrics has no preconditions.
        let (w, h) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if w <= 0 || h <= 0 {
            return Err(CaptureError::NoDisplay("GetSystemMetrics returned 0".into()));
        }
        Ok((w as u32, h as u32))
    }

    fn grab(&self) -> Result<RawImage, CaptureError> {
        let (width, height) = self.primary_display_size()?;
        let (w, h) = (width as i32, height as i32);

        // SAFETY: each handle is checked, wrapped in a guard and released in
        // reverse order of creation.  The pixel buffer is sized for the DIB
        // described by `info`.
        unsafe {
            let screen = ScreenDc(GetDC(HWND::default()));
            if screen.0.is_invalid() {
                return Err(CaptureError::NoDisplay("GetDC failed".into()));
            }
            let memory = MemoryDc(CreateCompatibleDC(screen.0));
            if memory.0.is_invalid() {
                return Err(CaptureError::Grab("CreateCompatibleDC failed".into()));
            }
            let bitmap = Bitmap(CreateCompatibleBitmap(screen.0, w, h));
            if bitmap.0.is_invalid() {
                return Err(CaptureError::Grab("CreateCompatibleBitmap failed".into()));
            }

            let previous = SelectObject(memory.0, bitmap.0);
            let copied = BitBlt(memory.0, 0, 0, w, h, screen.0, 0, 0, SRCCOPY);
            SelectObject(memory.0, previous);
            copied.map_err(|e| CaptureError::Grab(format!("BitBlt failed: {e}")))?;

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: w,
                    // Negative height requests a top-down DIB.
                    biHeight: -h,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let mut bgra = vec![0u8; width as usize * height as usize * 4];
            let lines = GetDIBits(
                memory.0,
                bitmap.0,
                0,
                height,
                Some(bgra.as_mut_ptr() as *mut c_void),
                &mut info,
                DIB_RGB_COLORS,
            );
            if lines != h {
                return Err(CaptureError::Grab(format!(
                    "GetDIBits copied {lines} of {h} lines"
                )));
            }

            Ok(RawImage {
                width,
                height,
                rgb: bgra_to_rgb(&bgra),
            })
        }
    }
}

fn bgra_to_rgb(bgra: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(bgra.len() / 4 * 3);
    for px in bgra.chunks_exact(4) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_to_rgb_swaps_channels_and_drops_alpha() {
        assert_eq!(
            bgra_to_rgb(&[1, 2, 3, 255, 4, 5, 6, 255]),
            vec![3, 2, 1, 6, 5, 4]
        );
    }
}
