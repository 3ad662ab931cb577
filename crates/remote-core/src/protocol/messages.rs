//! JSON message types exchanged through the relay service.
//!
//! Every message is a JSON object carrying a `"type"` discriminant; the
//! remaining fields of the variant's struct are flattened into the same
//! object.  Field names use camelCase on the wire:
//!
//! ```json
//! {"type":"register_desktop_session","sessionId":"s-1","deviceId":"dev-7"}
//! {"type":"uem_remote_action","deviceId":"dev-7","action":"remote_mouse_wheel",
//!  "params":{"delta":-120},"timestamp":1700000000000}
//! ```
//!
//! # Message flow
//!
//! ```text
//! viewer ── register_desktop_session ──▶ relay ──▶ agent
//! viewer ◀── desktop_frame ───────────── relay ◀── agent
//! viewer ── uem_remote_action ─────────▶ relay ──▶ agent
//! viewer ◀─ webrtc_offer/answer/ice ──▶ relay ◀──▶ agent   (opaque payloads)
//! viewer ── stop_desktop_session ──────▶ relay ──▶ agent
//! ```
//!
//! Frame bytes are carried as a standard base64 string inside the JSON.

use serde::{Deserialize, Serialize};

/// Every `"type"` value this protocol understands.
pub const KNOWN_MESSAGE_TYPES: &[&str] = &[
    "register_desktop_session",
    "desktop_frame",
    "uem_remote_action",
    "webrtc_offer",
    "webrtc_answer",
    "webrtc_ice_candidate",
    "stop_desktop_session",
];

// ── Envelope ──────────────────────────────────────────────────────────────────

/// A message routed through the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Viewer → agent: begin frame delivery for a new session.
    RegisterDesktopSession(RegisterDesktopSession),
    /// Agent → viewer: one compressed still image.
    DesktopFrame(DesktopFrame),
    /// Viewer → agent: one input command.
    UemRemoteAction(RemoteActionMessage),
    /// Peer-channel negotiation: session description offer.
    WebrtcOffer(PeerSignal),
    /// Peer-channel negotiation: session description answer.
    WebrtcAnswer(PeerSignal),
    /// Peer-channel negotiation: one ICE candidate.
    WebrtcIceCandidate(PeerSignal),
    /// Viewer → agent: best-effort session teardown notice.
    StopDesktopSession(StopDesktopSession),
}

impl RelayMessage {
    /// Returns the wire `"type"` string of this message.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RegisterDesktopSession(_) => "register_desktop_session",
            Self::DesktopFrame(_) => "desktop_frame",
            Self::UemRemoteAction(_) => "uem_remote_action",
            Self::WebrtcOffer(_) => "webrtc_offer",
            Self::WebrtcAnswer(_) => "webrtc_answer",
            Self::WebrtcIceCandidate(_) => "webrtc_ice_candidate",
            Self::StopDesktopSession(_) => "stop_desktop_session",
        }
    }
}

// ── Session lifecycle ─────────────────────────────────────────────────────────

/// `register_desktop_session` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDesktopSession {
    pub session_id: String,
    pub device_id: String,
}

/// `stop_desktop_session` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDesktopSession {
    pub session_id: String,
    pub device_id: String,
}

// ── Frames ────────────────────────────────────────────────────────────────────

/// `desktop_frame` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopFrame {
    pub session_id: String,
    /// Compressed image bytes (base64 on the wire).
    #[serde(with = "base64_bytes")]
    pub frame: Vec<u8>,
    /// Capture time, Unix epoch milliseconds.
    pub timestamp: u64,
    /// Encoded image width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Encoded image height in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Real width of the captured display, before any downsampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_width: Option<u32>,
    /// Real height of the captured display, before any downsampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_height: Option<u32>,
}

// ── Remote actions ────────────────────────────────────────────────────────────

/// The `action` discriminant of a `uem_remote_action` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteAction {
    RemoteMouseMove,
    RemoteMouseDown,
    RemoteMouseUp,
    RemoteMouseWheel,
    RemoteKeyDown,
    RemoteKeyUp,
    RemoteText,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// The `params` object of a `uem_remote_action` message.
///
/// Which fields are present depends on the action:
///
/// | Action               | Fields                    |
/// |----------------------|---------------------------|
/// | `remote_mouse_move`  | `x`, `y`                  |
/// | `remote_mouse_down`  | `x`, `y`, `button`        |
/// | `remote_mouse_up`    | `x`, `y`, `button`        |
/// | `remote_mouse_wheel` | `delta`                   |
/// | `remote_key_down`    | `keyCode`, `modifiers`    |
/// | `remote_key_up`      | `keyCode`, `modifiers`    |
/// | `remote_text`        | `text`                    |
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<MouseButton>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Modifier bitmask, see [`crate::domain::input::ModifierFlags`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<u8>,
}

/// `uem_remote_action` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteActionMessage {
    pub device_id: String,
    pub action: RemoteAction,
    #[serde(default)]
    pub params: ActionParams,
    pub timestamp: u64,
}

// ── Peer negotiation ──────────────────────────────────────────────────────────

/// Payload shared by the three `webrtc_*` messages.
///
/// The relay never inspects `payload`; only the two endpoints interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSignal {
    pub session_id: String,
    pub payload: serde_json::Value,
    pub device_id: String,
}

// ── base64 helper ─────────────────────────────────────────────────────────────

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
