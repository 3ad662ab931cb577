//! Frame presentation seam.
//!
//! The session controller decides *what* to show and at which scale; a
//! [`FrameRenderer`] decides *how*.  A GUI would blit into a window; the
//! headless binary writes the latest frame to disk.

use remote_core::CanvasGeometry;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("frame output failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One frame ready to draw.
#[derive(Debug, Clone, Copy)]
pub struct FramePresentation<'a> {
    pub session_id: &'a str,
    /// Compressed image exactly as the agent sent it.
    pub image: &'a [u8],
    /// Where the canvas sits and how large it is drawn.
    pub canvas: &'a CanvasGeometry,
    /// 1 for the first frame of the session.
    pub sequence: u64,
}

pub trait FrameRenderer: Send {
    /// Draws one frame.  Failures are reported per frame; the session keeps
    /// going.
    fn present(&mut self, frame: &FramePresentation<'_>) -> Result<(), RenderError>;
}
