//! Session Coordinator: owns the session lifecycle on the agent.
//!
//! ```text
//!            try_start_session            stop_session
//!   Idle ───────────────────────▶ Active ─────────────▶ Stopping ──▶ Idle
//!                                  │
//!        CapturePipeline ──Frame──▶ forwarder ──desktop_frame──▶ MessageSink
//! ```
//!
//! The coordinator owns the [`CapturePipeline`] and a [`MessageSink`] handle
//! to the transport link.  The pipeline only pushes frames into a channel;
//! a forwarder task tags each one with the session id and hands it to the
//! sink.  Neither collaborator holds a reference back to the coordinator.
//!
//! Start and stop run under one async mutex, so at most one session is ever
//! Active.  A second start while a session is Active returns
//! [`SessionError::AlreadyActive`] with no side effects.
//!
//! A viewer that vanishes without a stop notice would otherwise hold the
//! agent forever.  The dispatcher reports viewer traffic through
//! [`SessionCoordinator::record_activity`]; once the active session has been
//! silent for [`CaptureSettings::stale_after`], a start for a *different*
//! session id stops it and takes its place.
//!
//! A transient link drop does not end the session.  Frames produced while
//! the link is down are dropped by the link and delivery resumes after the
//! reconnect.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use remote_core::{
    capture_target, CaptureTarget, Frame, RelayMessage, Session, SessionConflictError,
    SessionSlot, SessionState,
};
use remote_link::{MessageSink, TransportError};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::capture_pipeline::{CaptureError, CapturePipeline, FrameEncoder, ScreenGrabber};

/// Frame-rate, resolution and takeover policy for sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub fps: u32,
    /// Quality ceiling; larger displays are downsampled to fit.
    pub max_width: u32,
    pub max_height: u32,
    /// Frames buffered between the capture loop and the forwarder.
    pub frame_queue: usize,
    /// Viewer silence after which the active session may be replaced.
    pub stale_after: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            fps: 15,
            max_width: remote_core::domain::frame::MAX_CAPTURE_WIDTH,
            max_height: remote_core::domain::frame::MAX_CAPTURE_HEIGHT,
            frame_queue: 2,
            stale_after: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    AlreadyActive(#[from] SessionConflictError),

    #[error("cannot start capture: {0}")]
    Capture(#[from] CaptureError),
}

/// What a started session captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub device_id: String,
    pub target: CaptureTarget,
    /// Real size of the primary display.
    pub display: (u32, u32),
}

/// Lifecycle notifications raised by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started(SessionInfo),
    Stopped { session_id: String },
}

struct CoordinatorInner {
    slot: SessionSlot,
    pipeline: CapturePipeline,
    forwarder: Option<JoinHandle<()>>,
}

pub struct SessionCoordinator {
    inner: Mutex<CoordinatorInner>,
    sink: Arc<dyn MessageSink>,
    settings: CaptureSettings,
    active: watch::Sender<Option<Session>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    last_activity: SyncMutex<Instant>,
}

impl SessionCoordinator {
    /// Builds an idle coordinator and the receiver for its lifecycle events.
    pub fn new(
        grabber: Arc<dyn ScreenGrabber>,
        encoder: Arc<dyn FrameEncoder>,
        sink: Arc<dyn MessageSink>,
        settings: CaptureSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (active, _) = watch::channel(None);
        let coordinator = Self {
            inner: Mutex::new(CoordinatorInner {
                slot: SessionSlot::new(),
                pipeline: CapturePipeline::new(grabber, encoder),
                forwarder: None,
            }),
            sink,
            settings,
            active,
            events,
            last_activity: SyncMutex::new(Instant::now()),
        };
        (coordinator, events_rx)
    }

    /// Watches the Active session; `None` while Idle or Stopping.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.active.subscribe()
    }

    pub fn active_session(&self) -> Option<Session> {
        self.active.borrow().clone()
    }

    /// Notes that the viewer is still there (input, signalling or a repeated
    /// registration).
    pub fn record_activity(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Starts a session and its capture.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyActive`] if a session is Active, unless it has
    ///   been silent for `stale_after` and has a different id, in which case
    ///   it is stopped and replaced.  Nothing changes on error.
    /// - [`SessionError::Capture`] if the display cannot be queried.  The
    ///   current state, Idle or Active, is kept.
    pub async fn try_start_session(
        &self,
        session_id: &str,
        device_id: &str,
    ) -> Result<SessionInfo, SessionError> {
        let mut inner = self.inner.lock().await;

        let stale_session_id = match inner.slot.current() {
            Some(current) => {
                let active_session_id = current.session_id.clone();
                let idle = self.last_activity.lock().elapsed();
                if active_session_id == session_id || idle < self.settings.stale_after {
                    return Err(SessionConflictError { active_session_id }.into());
                }
                Some((active_session_id, idle))
            }
            None => None,
        };

        let display = inner.pipeline.display_size()?;
        let target = capture_target(
            display.0,
            display.1,
            self.settings.max_width,
            self.settings.max_height,
        )
        .ok_or_else(|| {
            CaptureError::NoDisplay(format!("unusable display size {}x{}", display.0, display.1))
        })?;

        if let Some((stale_session_id, idle)) = stale_session_id {
            warn!(
                %stale_session_id,
                idle_secs = idle.as_secs(),
                session_id,
                "replacing silent session"
            );
            self.stop_locked(&mut inner, None).await;
        }

        let session = Session {
            session_id: session_id.to_string(),
            device_id: device_id.to_string(),
        };
        inner.slot.activate(session.clone())?;

        let (frames_tx, frames_rx) = mpsc::channel(self.settings.frame_queue.max(1));
        inner
            .pipeline
            .start_capture(self.settings.fps, target, frames_tx);
        inner.forwarder = Some(tokio::spawn(forward_frames(
            frames_rx,
            Arc::clone(&self.sink),
            session.session_id.clone(),
        )));

        self.active.send_replace(Some(session));
        self.record_activity();

        let info = SessionInfo {
            session_id: session_id.to_string(),
            device_id: device_id.to_string(),
            target,
            display,
        };
        let (display_width, display_height) = display;
        info!(
            session_id,
            display_width,
            display_height,
            target_width = target.width,
            target_height = target.height,
            "session started"
        );
        let _ = self.events.send(SessionEvent::Started(info.clone()));
        Ok(info)
    }

    /// Starts a session, returning `false` on any failure.
    pub async fn start_session(&self, session_id: &str, device_id: &str) -> bool {
        match self.try_start_session(session_id, device_id).await {
            Ok(_) => true,
            Err(e) => {
                warn!(session_id, "session not started: {e}");
                false
            }
        }
    }

    /// Stops the Active session.  Returns `false` if there was none.
    pub async fn stop_session(&self) -> bool {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner, None).await
    }

    /// Stops the Active session only if its id is `session_id`.
    pub async fn stop_session_matching(&self, session_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner, Some(session_id)).await
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.slot.state()
    }

    async fn stop_locked(&self, inner: &mut CoordinatorInner, only: Option<&str>) -> bool {
        if let (Some(wanted), Some(current)) = (only, inner.slot.current()) {
            if current.session_id != wanted {
                debug!(
                    requested = wanted,
                    active = %current.session_id,
                    "stop for a different session ignored"
                );
                return false;
            }
        }
        let Some(session) = inner.slot.begin_stop() else {
            return false;
        };

        // Injected input is refused from here on.
        self.active.send_replace(None);

        inner.pipeline.stop_capture().await;
        if let Some(forwarder) = inner.forwarder.take() {
            forwarder.abort();
            let _ = forwarder.await;
        }
        inner.slot.finish_stop();

        info!(session_id = %session.session_id, "session stopped");
        let _ = self.events.send(SessionEvent::Stopped {
            session_id: session.session_id,
        });
        true
    }
}

async fn forward_frames(
    mut frames: mpsc::Receiver<Frame>,
    sink: Arc<dyn MessageSink>,
    session_id: String,
) {
    while let Some(frame) = frames.recv().await {
        let msg = RelayMessage::DesktopFrame(frame.into_message(&session_id));
        match sink.send(&msg) {
            Ok(()) => {}
            Err(TransportError::NotConnected | TransportError::Saturated) => {
                trace!(session_id = %session_id, "frame dropped by link");
            }
            Err(e) => debug!(session_id = %session_id, "frame not sent: {e}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::capture_pipeline::RawImage;
    use crate::infrastructure::screen_capture::mock::MockScreenGrabber;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct StubEncoder;

    impl FrameEncoder for StubEncoder {
        fn encode(&self, _image: RawImage, _target: CaptureTarget) -> Result<Vec<u8>, CaptureError> {
            Ok(vec![0xFF, 0xD8, 0xFF])
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: StdMutex<Vec<RelayMessage>>,
    }

    impl RecordingSink {
        fn frames(&self) -> Vec<remote_core::protocol::messages::DesktopFrame> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|m| match m {
                    RelayMessage::DesktopFrame(f) => Some(f.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl MessageSink for RecordingSink {
        fn send(&self, msg: &RelayMessage) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(msg.clone());
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    mockall::mock! {
        Sink {}
        impl MessageSink for Sink {
            fn send(&self, msg: &RelayMessage) -> Result<(), TransportError>;
            fn is_connected(&self) -> bool;
        }
    }

    fn settings() -> CaptureSettings {
        CaptureSettings {
            fps: 50,
            ..CaptureSettings::default()
        }
    }

    fn coordinator(
        grabber: MockScreenGrabber,
    ) -> (
        SessionCoordinator,
        mpsc::UnboundedReceiver<SessionEvent>,
        Arc<RecordingSink>,
    ) {
        let sink = Arc::new(RecordingSink::default());
        let (c, events) = SessionCoordinator::new(
            Arc::new(grabber),
            Arc::new(StubEncoder),
            Arc::clone(&sink) as Arc<dyn MessageSink>,
            settings(),
        );
        (c, events, sink)
    }

    #[tokio::test]
    async fn test_start_session_on_1080p_display_uses_native_target() {
        // Arrange
        let (c, mut events, _sink) = coordinator(MockScreenGrabber::new(1920, 1080));

        // Act
        let info = c.try_start_session("s-1", "device-1").await.unwrap();

        // Assert
        assert_eq!(info.target, CaptureTarget { width: 1920, height: 1080 });
        assert_eq!(c.state().await, SessionState::Active);
        assert_eq!(events.recv().await, Some(SessionEvent::Started(info)));
        c.stop_session().await;
    }

    #[tokio::test]
    async fn test_second_start_while_active_is_refused_without_side_effects() {
        // Arrange
        let (c, mut events, _sink) = coordinator(MockScreenGrabber::new(64, 48));
        assert!(c.start_session("s-1", "device-1").await);
        events.recv().await;

        // Act
        let second = c.try_start_session("s-2", "device-1").await;

        // Assert
        match second {
            Err(SessionError::AlreadyActive(e)) => assert_eq!(e.active_session_id, "s-1"),
            other => panic!("expected AlreadyActive, got {other:?}"),
        }
        assert!(!c.start_session("s-2", "device-1").await);
        assert_eq!(c.active_session().unwrap().session_id, "s-1");
        assert!(events.try_recv().is_err());
        c.stop_session().await;
    }

    fn coordinator_stale_after(
        stale_after: Duration,
    ) -> (SessionCoordinator, mpsc::UnboundedReceiver<SessionEvent>) {
        SessionCoordinator::new(
            Arc::new(MockScreenGrabber::new(64, 48)),
            Arc::new(StubEncoder),
            Arc::new(RecordingSink::default()),
            CaptureSettings {
                stale_after,
                ..settings()
            },
        )
    }

    #[tokio::test]
    async fn test_silent_session_is_replaced_by_new_start() {
        // Arrange
        let (c, mut events) = coordinator_stale_after(Duration::from_millis(50));
        c.start_session("s-1", "device-1").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Act
        let info = c.try_start_session("s-2", "device-1").await.unwrap();

        // Assert
        assert_eq!(info.session_id, "s-2");
        assert_eq!(c.active_session().unwrap().session_id, "s-2");
        assert!(matches!(events.recv().await, Some(SessionEvent::Started(_))));
        assert_eq!(
            events.recv().await,
            Some(SessionEvent::Stopped { session_id: "s-1".into() })
        );
        assert_eq!(events.recv().await, Some(SessionEvent::Started(info)));
        c.stop_session().await;
    }

    #[tokio::test]
    async fn test_recent_activity_keeps_session_from_being_replaced() {
        // Arrange
        let (c, _events) = coordinator_stale_after(Duration::from_millis(300));
        c.start_session("s-1", "device-1").await;

        // Act: the viewer keeps talking for longer than the stale window
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            c.record_activity();
        }
        let second = c.try_start_session("s-2", "device-1").await;

        // Assert
        assert!(matches!(second, Err(SessionError::AlreadyActive(_))));
        assert_eq!(c.active_session().unwrap().session_id, "s-1");
        c.stop_session().await;
    }

    #[tokio::test]
    async fn test_same_session_id_is_never_replaced() {
        let (c, _events) = coordinator_stale_after(Duration::from_millis(10));
        c.start_session("s-1", "device-1").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            c.try_start_session("s-1", "device-1").await,
            Err(SessionError::AlreadyActive(_))
        ));
        c.stop_session().await;
    }

    #[tokio::test]
    async fn test_display_failure_leaves_coordinator_idle() {
        // Arrange
        let grabber = MockScreenGrabber::new(64, 48);
        grabber.set_failing(true);
        let (c, _events, _sink) = coordinator(grabber);

        // Act
        let result = c.try_start_session("s-1", "device-1").await;

        // Assert
        assert!(matches!(result, Err(SessionError::Capture(CaptureError::NoDisplay(_)))));
        assert_eq!(c.state().await, SessionState::Idle);
        assert!(c.active_session().is_none());
    }

    #[tokio::test]
    async fn test_frames_are_tagged_with_session_id_and_forwarded() {
        // Arrange
        let (c, _events, sink) = coordinator(MockScreenGrabber::new(64, 48));

        // Act
        c.start_session("s-9", "device-1").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        c.stop_session().await;

        // Assert
        let frames = sink.frames();
        assert!(!frames.is_empty());
        assert!(frames.iter().all(|f| f.session_id == "s-9"));
        assert_eq!(frames[0].width, Some(64));
        assert_eq!(frames[0].screen_width, Some(64));
    }

    #[tokio::test]
    async fn test_stop_session_halts_frames_and_emits_stopped() {
        // Arrange
        let (c, mut events, sink) = coordinator(MockScreenGrabber::new(64, 48));
        c.start_session("s-1", "device-1").await;
        events.recv().await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        // Act
        assert!(c.stop_session().await);
        let count = sink.frames().len();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Assert
        assert_eq!(sink.frames().len(), count);
        assert_eq!(
            events.recv().await,
            Some(SessionEvent::Stopped { session_id: "s-1".into() })
        );
        assert_eq!(c.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_a_no_op() {
        let (c, mut events, _sink) = coordinator(MockScreenGrabber::new(64, 48));
        assert!(!c.stop_session().await);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_matching_ignores_other_session_ids() {
        // Arrange
        let (c, _events, _sink) = coordinator(MockScreenGrabber::new(64, 48));
        c.start_session("s-1", "device-1").await;

        // Act
        let wrong = c.stop_session_matching("s-2").await;
        let right = c.stop_session_matching("s-1").await;

        // Assert
        assert!(!wrong);
        assert!(right);
    }

    #[tokio::test]
    async fn test_session_can_restart_after_stop() {
        let (c, _events, _sink) = coordinator(MockScreenGrabber::new(64, 48));
        assert!(c.start_session("s-1", "device-1").await);
        assert!(c.stop_session().await);
        assert!(c.start_session("s-2", "device-1").await);
        assert_eq!(c.active_session().unwrap().session_id, "s-2");
        c.stop_session().await;
    }

    #[tokio::test]
    async fn test_subscribers_see_session_start_and_stop() {
        let (c, _events, _sink) = coordinator(MockScreenGrabber::new(64, 48));
        let rx = c.subscribe();
        c.start_session("s-1", "device-1").await;
        assert_eq!(rx.borrow().as_ref().map(|s| s.session_id.clone()), Some("s-1".into()));
        c.stop_session().await;
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn test_link_refusing_frames_does_not_end_session() {
        // Arrange: a link that is down for every frame
        let mut sink = MockSink::new();
        sink.expect_send()
            .returning(|_| Err(TransportError::NotConnected));
        sink.expect_is_connected().return_const(false);
        let (c, _events) = SessionCoordinator::new(
            Arc::new(MockScreenGrabber::new(64, 48)),
            Arc::new(StubEncoder),
            Arc::new(sink),
            settings(),
        );

        // Act
        c.start_session("s-1", "device-1").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Assert
        assert_eq!(c.state().await, SessionState::Active);
        c.stop_session().await;
    }
}
