//! Headless renderer: keeps the most recent frame on disk.
//!
//! Each frame is written to a sibling temporary file and renamed over the
//! target, so a reader polling the file never sees a half-written image.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::application::render::{FramePresentation, FrameRenderer, RenderError};

pub struct FileFrameRenderer {
    path: PathBuf,
    staging: PathBuf,
}

impl FileFrameRenderer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut staging = path.clone().into_os_string();
        staging.push(".part");
        Self {
            path,
            staging: PathBuf::from(staging),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameRenderer for FileFrameRenderer {
    fn present(&mut self, frame: &FramePresentation<'_>) -> Result<(), RenderError> {
        fs::write(&self.staging, frame.image)?;
        fs::rename(&self.staging, &self.path)?;
        if frame.sequence == 1 {
            debug!(
                path = %self.path.display(),
                width = frame.canvas.rendered_width,
                height = frame.canvas.rendered_height,
                "writing frames"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_core::CanvasGeometry;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir().join(format!("remote-viewer-{}.jpg", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_latest_frame_replaces_previous() {
        // Arrange
        let path = scratch_path();
        let mut renderer = FileFrameRenderer::new(&path);
        let canvas = CanvasGeometry::native(4, 4, 1.0);

        // Act
        for (sequence, bytes) in [(1, vec![1u8, 2, 3]), (2, vec![9u8])] {
            let frame = FramePresentation {
                session_id: "s-1",
                image: &bytes,
                canvas: &canvas,
                sequence,
            };
            renderer.present(&frame).unwrap();
        }

        // Assert
        assert_eq!(fs::read(&path).unwrap(), vec![9u8]);
        assert!(!renderer.staging.exists());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_unwritable_directory_is_an_io_error() {
        let path = std::env::temp_dir()
            .join(format!("missing-{}", uuid::Uuid::new_v4()))
            .join("frame.jpg");
        let mut renderer = FileFrameRenderer::new(path);
        let canvas = CanvasGeometry::native(1, 1, 1.0);
        let frame = FramePresentation {
            session_id: "s-1",
            image: &[0],
            canvas: &canvas,
            sequence: 1,
        };
        assert!(matches!(renderer.present(&frame), Err(RenderError::Io(_))));
    }
}
