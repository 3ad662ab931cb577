//! Capture Pipeline: periodic screen snapshot and compression loop.
//!
//! ```text
//! interval tick ──▶ spawn_blocking(grab ─▶ resize ─▶ JPEG) ──▶ try_send(Frame)
//!      ▲                                                          │
//!      └──────────── next tick waits for this one to finish ◀─────┘
//! ```
//!
//! Exactly one capture is in flight at a time.  A slow iteration delays the
//! next tick (`MissedTickBehavior::Delay`) instead of queuing extra ones.
//! Frames leave through a bounded channel with `try_send`: when the consumer
//! is behind, the frame is dropped and the loop carries on.
//!
//! Errors from the grabber or the encoder skip that iteration only.

use std::sync::Arc;
use std::time::Duration;

use remote_core::protocol::unix_millis;
use remote_core::{CaptureTarget, Frame};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Error type for screen capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No primary display could be opened.
    #[error("no display available: {0}")]
    NoDisplay(String),

    /// The snapshot itself failed.
    #[error("screen grab failed: {0}")]
    Grab(String),

    /// Resizing or compression failed.
    #[error("frame encoding failed: {0}")]
    Encode(String),

    /// The blocking capture task panicked or was cancelled.
    #[error("capture worker failed: {0}")]
    Worker(String),
}

/// An uncompressed RGB snapshot, 3 bytes per pixel, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// Takes snapshots of the primary display.
pub trait ScreenGrabber: Send + Sync {
    /// Real pixel size of the primary display.
    fn primary_display_size(&self) -> Result<(u32, u32), CaptureError>;

    /// Grabs one full-resolution snapshot.
    fn grab(&self) -> Result<RawImage, CaptureError>;
}

/// Compresses a snapshot at `target` size.
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, image: RawImage, target: CaptureTarget) -> Result<Vec<u8>, CaptureError>;
}

struct RunningCapture {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the capture loop for one session at a time.
pub struct CapturePipeline {
    grabber: Arc<dyn ScreenGrabber>,
    encoder: Arc<dyn FrameEncoder>,
    running: Option<RunningCapture>,
}

impl CapturePipeline {
    pub fn new(grabber: Arc<dyn ScreenGrabber>, encoder: Arc<dyn FrameEncoder>) -> Self {
        Self {
            grabber,
            encoder,
            running: None,
        }
    }

    /// Real size of the primary display, queried fresh.
    pub fn display_size(&self) -> Result<(u32, u32), CaptureError> {
        self.grabber.primary_display_size()
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| !r.task.is_finished())
    }

    /// Starts the loop at `fps` frames per second, emitting into `frames`.
    ///
    /// Returns `false` and does nothing if a capture is already running.
    /// An `fps` of zero is treated as one.
    pub fn start_capture(
        &mut self,
        fps: u32,
        target: CaptureTarget,
        frames: mpsc::Sender<Frame>,
    ) -> bool {
        if self.is_running() {
            return false;
        }

        let period = Duration::from_millis(1000 / u64::from(fps.max(1)));
        let (cancel, cancelled) = watch::channel(false);
        let task = tokio::spawn(capture_loop(
            Arc::clone(&self.grabber),
            Arc::clone(&self.encoder),
            period,
            target,
            frames,
            cancelled,
        ));

        info!(
            fps,
            width = target.width,
            height = target.height,
            "capture started"
        );
        self.running = Some(RunningCapture { cancel, task });
        true
    }

    /// Cancels the loop and waits for it to exit.  Idempotent.
    ///
    /// No frame is emitted after this returns.
    pub async fn stop_capture(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.cancel.send(true);
        running.task.abort();
        match running.task.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!("capture task ended abnormally: {e}"),
        }
        info!("capture stopped");
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}

async fn capture_loop(
    grabber: Arc<dyn ScreenGrabber>,
    encoder: Arc<dyn FrameEncoder>,
    period: Duration,
    target: CaptureTarget,
    frames: mpsc::Sender<Frame>,
    mut cancelled: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancelled.changed() => break,
            _ = ticker.tick() => {}
        }

        let grabber = Arc::clone(&grabber);
        let encoder = Arc::clone(&encoder);
        let work = tokio::task::spawn_blocking(move || capture_once(&*grabber, &*encoder, target));

        let result = tokio::select! {
            _ = cancelled.changed() => break,
            joined = work => joined.map_err(|e| CaptureError::Worker(e.to_string())).and_then(|r| r),
        };

        match result {
            Ok(frame) => match frames.try_send(frame) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => trace!("frame consumer busy; dropping frame"),
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("frame consumer gone; capture loop exiting");
                    break;
                }
            },
            Err(e) => warn!("capture iteration skipped: {e}"),
        }
    }
}

fn capture_once(
    grabber: &dyn ScreenGrabber,
    encoder: &dyn FrameEncoder,
    target: CaptureTarget,
) -> Result<Frame, CaptureError> {
    let image = grabber.grab()?;
    let (source_width, source_height) = (image.width, image.height);
    let data = encoder.encode(image, target)?;
    Ok(Frame {
        data,
        width: target.width,
        height: target.height,
        source_width,
        source_height,
        captured_at_ms: unix_millis(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::screen_capture::mock::MockScreenGrabber;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Encoder that returns the target size as bytes, optionally failing.
    struct StubEncoder {
        calls: AtomicUsize,
        fail_every_other: bool,
    }

    impl StubEncoder {
        fn new(fail_every_other: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_every_other,
            }
        }
    }

    impl FrameEncoder for StubEncoder {
        fn encode(&self, _image: RawImage, target: CaptureTarget) -> Result<Vec<u8>, CaptureError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_every_other && n % 2 == 0 {
                return Err(CaptureError::Encode("stub".into()));
            }
            Ok(vec![target.width as u8, target.height as u8])
        }
    }

    fn pipeline(encoder: StubEncoder) -> CapturePipeline {
        CapturePipeline::new(
            Arc::new(MockScreenGrabber::new(64, 48)),
            Arc::new(encoder),
        )
    }

    fn target() -> CaptureTarget {
        CaptureTarget { width: 32, height: 24 }
    }

    #[tokio::test]
    async fn test_capture_emits_frames_tagged_with_target_and_source_size() {
        // Arrange
        let mut p = pipeline(StubEncoder::new(false));
        let (tx, mut rx) = mpsc::channel(8);

        // Act
        assert!(p.start_capture(50, target(), tx));
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("frame within 2 s")
            .expect("channel open");
        p.stop_capture().await;

        // Assert
        assert_eq!((frame.width, frame.height), (32, 24));
        assert_eq!((frame.source_width, frame.source_height), (64, 48));
        assert_eq!(frame.data, vec![32, 24]);
    }

    #[tokio::test]
    async fn test_second_start_while_running_is_refused() {
        let mut p = pipeline(StubEncoder::new(false));
        let (tx, _rx) = mpsc::channel(8);
        assert!(p.start_capture(10, target(), tx.clone()));
        assert!(!p.start_capture(10, target(), tx));
        p.stop_capture().await;
    }

    #[tokio::test]
    async fn test_stop_capture_is_idempotent_and_halts_frames() {
        // Arrange
        let mut p = pipeline(StubEncoder::new(false));
        let (tx, mut rx) = mpsc::channel(64);
        p.start_capture(100, target(), tx);
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Act
        p.stop_capture().await;
        p.stop_capture().await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Assert
        assert!(!p.is_running());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_encode_errors_skip_only_that_iteration() {
        // Arrange: every other encode fails
        let mut p = pipeline(StubEncoder::new(true));
        let (tx, mut rx) = mpsc::channel(8);

        // Act
        p.start_capture(100, target(), tx);
        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        p.stop_capture().await;

        // Assert
        assert!(matches!(first, Ok(Some(_))));
        assert!(matches!(second, Ok(Some(_))));
    }

    #[tokio::test]
    async fn test_full_channel_drops_frames_without_stalling_loop() {
        // Arrange: capacity 1 and nobody reading
        let grabber = Arc::new(MockScreenGrabber::new(64, 48));
        let mut p = CapturePipeline::new(
            Arc::clone(&grabber) as Arc<dyn ScreenGrabber>,
            Arc::new(StubEncoder::new(false)),
        );
        let (tx, mut rx) = mpsc::channel(1);

        // Act
        p.start_capture(100, target(), tx);
        tokio::time::sleep(Duration::from_millis(150)).await;
        p.stop_capture().await;

        // Assert: the loop kept grabbing although only one frame fit
        assert!(grabber.grab_count() >= 3);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_loop_exits_when_consumer_is_dropped() {
        let mut p = pipeline(StubEncoder::new(false));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        p.start_capture(100, target(), tx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!p.is_running());
    }
}
