//! Text codec for [`RelayMessage`]s.
//!
//! The relay carries one JSON object per WebSocket text frame.  Decoding
//! distinguishes an unknown `"type"` (a message from a newer peer, or one not
//! meant for us) from a structurally malformed message so the receive loop can
//! log them differently.  Both are dropped by callers.

use thiserror::Error;

use super::messages::{RelayMessage, KNOWN_MESSAGE_TYPES};

/// Errors raised while encoding or decoding relay messages.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The text is not a JSON object.
    #[error("message is not a JSON object: {0}")]
    NotAnObject(String),

    /// The object has no string `"type"` field.
    #[error("message has no \"type\" field")]
    MissingType,

    /// The `"type"` value is not part of this protocol.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The type is known but the fields do not match its schema.
    #[error("malformed {message_type} message: {reason}")]
    Malformed {
        message_type: String,
        reason: String,
    },

    /// A `uem_remote_action` lacks a parameter its action requires.
    #[error("action {action} is missing parameter {param}")]
    MissingParam {
        action: &'static str,
        param: &'static str,
    },

    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// Encodes a message into its JSON text form.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails, which only
/// happens for non-finite floats inside an opaque peer payload.
pub fn encode_message(msg: &RelayMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decodes one JSON text frame into a [`RelayMessage`].
///
/// # Errors
///
/// - [`ProtocolError::NotAnObject`] if the text is not a JSON object.
/// - [`ProtocolError::MissingType`] if there is no string `"type"` field.
/// - [`ProtocolError::UnknownMessageType`] for a type outside this protocol.
/// - [`ProtocolError::Malformed`] if the fields do not match the schema.
pub fn decode_message(text: &str) -> Result<RelayMessage, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::NotAnObject(e.to_string()))?;

    let Some(object) = value.as_object() else {
        return Err(ProtocolError::NotAnObject("top-level value is not an object".into()));
    };

    let message_type = object
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ProtocolError::MissingType)?
        .to_string();

    if !KNOWN_MESSAGE_TYPES.contains(&message_type.as_str()) {
        return Err(ProtocolError::UnknownMessageType(message_type));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::Malformed {
        message_type,
        reason: e.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{RegisterDesktopSession, StopDesktopSession};

    #[test]
    fn test_encode_then_decode_register_message() {
        // Arrange
        let msg = RelayMessage::RegisterDesktopSession(RegisterDesktopSession {
            session_id: "abc".to_string(),
            device_id: "dev".to_string(),
        });

        // Act
        let text = encode_message(&msg).unwrap();
        let decoded = decode_message(&text).unwrap();

        // Assert
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_decode_unknown_type_is_reported_by_name() {
        let result = decode_message(r#"{"type":"device_inventory","items":[]}"#);
        assert_eq!(
            result,
            Err(ProtocolError::UnknownMessageType("device_inventory".to_string()))
        );
    }

    #[test]
    fn test_decode_missing_type_field() {
        let result = decode_message(r#"{"sessionId":"x"}"#);
        assert_eq!(result, Err(ProtocolError::MissingType));
    }

    #[test]
    fn test_decode_non_object_text() {
        assert!(matches!(
            decode_message("not json at all"),
            Err(ProtocolError::NotAnObject(_))
        ));
        assert!(matches!(
            decode_message("[1,2,3]"),
            Err(ProtocolError::NotAnObject(_))
        ));
    }

    #[test]
    fn test_decode_known_type_with_missing_fields_is_malformed() {
        // Arrange: stop message without deviceId
        let text = r#"{"type":"stop_desktop_session","sessionId":"x"}"#;

        // Act
        let result = decode_message(text);

        // Assert
        match result {
            Err(ProtocolError::Malformed { message_type, .. }) => {
                assert_eq!(message_type, "stop_desktop_session");
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_ignores_unknown_extra_fields() {
        let text = r#"{"type":"stop_desktop_session","sessionId":"x","deviceId":"d","reason":"closed"}"#;
        let decoded = decode_message(text).unwrap();
        assert_eq!(
            decoded,
            RelayMessage::StopDesktopSession(StopDesktopSession {
                session_id: "x".to_string(),
                device_id: "d".to_string(),
            })
        );
    }
}
