//! End-to-end agent tests: relay messages in, frames and injected input out.
//!
//! The platform adapters are replaced by the crate's own mocks and the relay
//! link by a recording sink, so these run headless on any OS.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use remote_agent::application::capture_pipeline::{CaptureError, FrameEncoder, RawImage};
use remote_agent::application::dispatch::AgentDispatcher;
use remote_agent::application::inject_input::InputInjector;
use remote_agent::application::session_coordinator::{
    CaptureSettings, SessionCoordinator, SessionError, SessionEvent,
};
use remote_agent::infrastructure::input_emulation::mock::{EmittedInput, MockInputEmulator};
use remote_agent::infrastructure::screen_capture::mock::MockScreenGrabber;
use remote_core::protocol::messages::{
    ActionParams, RegisterDesktopSession, RemoteAction, RemoteActionMessage, StopDesktopSession,
};
use remote_core::{CaptureTarget, RelayMessage, SessionState};
use remote_link::peer::NullPeerConnector;
use remote_link::{MessageSink, TransportError};
use tokio::sync::mpsc;

const DEVICE: &str = "agent-1";

// ── Test doubles ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<RelayMessage>>,
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

/// Skips JPEG work; returns a two-byte marker and remembers each target.
#[derive(Default)]
struct StubEncoder {
    targets: Mutex<Vec<CaptureTarget>>,
}

impl FrameEncoder for StubEncoder {
    fn encode(&self, _image: RawImage, target: CaptureTarget) -> Result<Vec<u8>, CaptureError> {
        self.targets.lock().unwrap().push(target);
        Ok(vec![0xFF, 0xD8])
    }
}

struct Harness {
    coordinator: Arc<SessionCoordinator>,
    dispatcher: AgentDispatcher,
    sink: Arc<RecordingSink>,
    emulator: Arc<MockInputEmulator>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

fn harness(grabber: MockScreenGrabber) -> Harness {
    harness_with(grabber, CaptureSettings::default().stale_after)
}

fn harness_with(grabber: MockScreenGrabber, stale_after: Duration) -> Harness {
    let sink = Arc::new(RecordingSink::default());
    let emulator = Arc::new(MockInputEmulator::new());
    let settings = CaptureSettings {
        fps: 20,
        stale_after,
        ..CaptureSettings::default()
    };
    let (coordinator, events) = SessionCoordinator::new(
        Arc::new(grabber),
        Arc::new(StubEncoder::default()),
        sink.clone(),
        settings,
    );
    let coordinator = Arc::new(coordinator);
    let injector = InputInjector::new(emulator.clone(), coordinator.subscribe());
    let (peer_tx, _peer_rx) = mpsc::channel(8);
    let dispatcher = AgentDispatcher::new(
        DEVICE,
        Arc::clone(&coordinator),
        injector,
        sink.clone(),
        Arc::new(NullPeerConnector),
        peer_tx,
    );
    Harness {
        coordinator,
        dispatcher,
        sink,
        emulator,
        events,
    }
}

fn register(session_id: &str) -> RelayMessage {
    RelayMessage::RegisterDesktopSession(RegisterDesktopSession {
        session_id: session_id.into(),
        device_id: DEVICE.into(),
    })
}

fn stop(session_id: &str) -> RelayMessage {
    RelayMessage::StopDesktopSession(StopDesktopSession {
        session_id: session_id.into(),
        device_id: DEVICE.into(),
    })
}

fn mouse_move(x: i32, y: i32) -> RelayMessage {
    RelayMessage::UemRemoteAction(RemoteActionMessage {
        device_id: DEVICE.into(),
        action: RemoteAction::RemoteMouseMove,
        params: ActionParams {
            x: Some(x),
            y: Some(y),
            ..ActionParams::default()
        },
        timestamp: 0,
    })
}

async fn wait_for_frame(sink: &RecordingSink) -> remote_core::protocol::messages::DesktopFrame {
    for _ in 0..200 {
        if let Some(frame) = sink.frames().into_iter().next() {
            return frame;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no desktop_frame within 2s");
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_hd_display_streams_at_native_size() {
    // Arrange
    let mut h = harness(MockScreenGrabber::full_hd());

    // Act
    h.dispatcher.handle_message(register("s-1")).await;
    let frame = wait_for_frame(&h.sink).await;

    // Assert
    assert_eq!(frame.session_id, "s-1");
    assert_eq!(frame.width, Some(1920));
    assert_eq!(frame.height, Some(1080));
    assert_eq!(frame.screen_width, Some(1920));
    assert_eq!(frame.frame, vec![0xFF, 0xD8]);

    h.dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_4k_display_is_downsampled_within_ceiling() {
    // Arrange
    let mut h = harness(MockScreenGrabber::uhd_4k());

    // Act
    h.dispatcher.handle_message(register("s-4k")).await;
    let frame = wait_for_frame(&h.sink).await;

    // Assert: fits 1920x1080, keeps 16:9, even dimensions
    let (w, h_px) = (frame.width.unwrap(), frame.height.unwrap());
    assert!(w <= 1920 && h_px <= 1080);
    assert_eq!(w % 2, 0);
    assert_eq!(h_px % 2, 0);
    let ratio = w as f64 / h_px as f64;
    assert!((ratio - 16.0 / 9.0).abs() < 0.01, "ratio {ratio}");
    assert_eq!(frame.screen_width, Some(3840));
    assert_eq!(frame.screen_height, Some(2160));

    h.dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_second_registration_is_rejected_while_active() {
    // Arrange
    let mut h = harness(MockScreenGrabber::full_hd());
    h.dispatcher.handle_message(register("first")).await;

    // Act
    h.dispatcher.handle_message(register("second")).await;
    let direct = h.coordinator.try_start_session("third", DEVICE).await;

    // Assert
    assert_eq!(h.coordinator.active_session().unwrap().session_id, "first");
    match direct {
        Err(SessionError::AlreadyActive(conflict)) => {
            assert_eq!(conflict.active_session_id, "first");
        }
        other => panic!("expected a conflict, got {other:?}"),
    }

    h.dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_input_is_injected_only_during_a_session() {
    // Arrange
    let mut h = harness(MockScreenGrabber::full_hd());

    // Act: before, during and after a session
    h.dispatcher.handle_message(mouse_move(1, 1)).await;
    h.dispatcher.handle_message(register("s-in")).await;
    h.dispatcher.handle_message(mouse_move(100, 200)).await;
    h.dispatcher.handle_message(stop("s-in")).await;
    h.dispatcher.handle_message(mouse_move(5, 5)).await;

    // Assert
    assert_eq!(h.emulator.events(), vec![EmittedInput::Move(100, 200)]);
    assert_eq!(h.coordinator.state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_stop_for_another_session_keeps_streaming() {
    // Arrange
    let mut h = harness(MockScreenGrabber::full_hd());
    h.dispatcher.handle_message(register("mine")).await;

    // Act
    h.dispatcher.handle_message(stop("not-mine")).await;

    // Assert
    assert!(h.coordinator.active_session().is_some());
    h.dispatcher.shutdown().await;
    assert!(h.coordinator.active_session().is_none());
}

#[tokio::test]
async fn test_no_frames_are_sent_after_stop() {
    // Arrange
    let mut h = harness(MockScreenGrabber::full_hd());
    h.dispatcher.handle_message(register("s-stop")).await;
    wait_for_frame(&h.sink).await;

    // Act
    h.dispatcher.handle_message(stop("s-stop")).await;
    let count_at_stop = h.sink.frames().len();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Assert
    assert_eq!(h.sink.frames().len(), count_at_stop);
}

#[tokio::test]
async fn test_lifecycle_events_are_reported_in_order() {
    // Arrange
    let mut h = harness(MockScreenGrabber::full_hd());

    // Act
    h.dispatcher.handle_message(register("s-ev")).await;
    h.dispatcher.handle_message(stop("s-ev")).await;

    // Assert
    match h.events.recv().await {
        Some(SessionEvent::Started(info)) => {
            assert_eq!(info.session_id, "s-ev");
            assert_eq!(info.display, (1920, 1080));
        }
        other => panic!("expected Started, got {other:?}"),
    }
    assert_eq!(
        h.events.recv().await,
        Some(SessionEvent::Stopped {
            session_id: "s-ev".into()
        })
    );
}

#[tokio::test]
async fn test_silent_viewer_session_is_taken_over() {
    // Arrange: the first viewer vanished without a stop notice
    let mut h = harness_with(MockScreenGrabber::full_hd(), Duration::from_millis(100));
    h.dispatcher.handle_message(register("first")).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Act
    h.dispatcher.handle_message(register("second")).await;

    // Assert
    assert_eq!(h.coordinator.active_session().unwrap().session_id, "second");
    assert!(matches!(h.events.recv().await, Some(SessionEvent::Started(info)) if info.session_id == "first"));
    assert_eq!(
        h.events.recv().await,
        Some(SessionEvent::Stopped {
            session_id: "first".into()
        })
    );
    assert!(matches!(h.events.recv().await, Some(SessionEvent::Started(info)) if info.session_id == "second"));

    h.dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_viewer_input_keeps_session_from_takeover() {
    // Arrange
    let mut h = harness_with(MockScreenGrabber::full_hd(), Duration::from_millis(300));
    h.dispatcher.handle_message(register("first")).await;

    // Act: input arrives more often than the stale window
    for i in 0..4 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.dispatcher.handle_message(mouse_move(i, i)).await;
    }
    h.dispatcher.handle_message(register("second")).await;

    // Assert
    assert_eq!(h.coordinator.active_session().unwrap().session_id, "first");
    assert_eq!(h.emulator.events().len(), 4);

    h.dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_stop_addressed_to_another_device_is_ignored() {
    // Arrange
    let mut h = harness(MockScreenGrabber::full_hd());
    h.dispatcher.handle_message(register("s-dev")).await;

    // Act
    h.dispatcher
        .handle_message(RelayMessage::StopDesktopSession(StopDesktopSession {
            session_id: "s-dev".into(),
            device_id: "agent-2".into(),
        }))
        .await;

    // Assert
    assert_eq!(h.coordinator.active_session().unwrap().session_id, "s-dev");
    h.dispatcher.shutdown().await;
}
