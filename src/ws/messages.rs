//! Inbound WebSocket message model.
//!
//! Frames are JSON objects with a mandatory `type` tag. The tag is checked
//! at the boundary and the frame is turned into a closed enum: one variant
//! per supported tag plus an `Unknown` variant that keeps the raw tag for
//! the error reply. Payload fields are optional; non-string scalars are
//! accepted and relayed in their JSON text form.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::GatewayError;

/// Message received on the classroom channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Self-declared identity announcement.
    UserInfo {
        /// Sender label for the join notice.
        #[serde(default, deserialize_with = "lenient_string")]
        user: Option<String>,
        /// Display name to attach.
        #[serde(default, deserialize_with = "lenient_string")]
        name: Option<String>,
        /// Role to attach.
        #[serde(default, deserialize_with = "lenient_string")]
        role: Option<String>,
    },
    /// Streamed audio fragment.
    AudioChunk {
        /// Sender label.
        #[serde(default, deserialize_with = "lenient_string")]
        user: Option<String>,
        /// Encoded audio payload.
        #[serde(default, deserialize_with = "lenient_string")]
        data: Option<String>,
        /// MIME type of the payload.
        #[serde(default, rename = "mimeType", deserialize_with = "lenient_string")]
        mime_type: Option<String>,
    },
    /// Complete audio file.
    AudioFile {
        /// Sender label.
        #[serde(default, deserialize_with = "lenient_string")]
        user: Option<String>,
        /// Encoded file payload.
        #[serde(default, deserialize_with = "lenient_string")]
        data: Option<String>,
        /// Original file name.
        #[serde(default, deserialize_with = "lenient_string")]
        filename: Option<String>,
        /// MIME type of the payload.
        #[serde(default, rename = "mimeType", deserialize_with = "lenient_string")]
        mime_type: Option<String>,
    },
    /// Playback control.
    AudioControl {
        /// Sender label.
        #[serde(default, deserialize_with = "lenient_string")]
        user: Option<String>,
        /// Control action.
        #[serde(default, deserialize_with = "lenient_string")]
        action: Option<String>,
        /// Accompanying text.
        #[serde(default, deserialize_with = "lenient_string")]
        message: Option<String>,
    },
    /// Hand raised.
    RaiseHand {
        /// Sender label.
        #[serde(default, deserialize_with = "lenient_string")]
        user: Option<String>,
    },
    /// Hand lowered.
    LowerHand {
        /// Sender label.
        #[serde(default, deserialize_with = "lenient_string")]
        user: Option<String>,
    },
    /// Question to the presenter.
    Question {
        /// Sender label.
        #[serde(default, deserialize_with = "lenient_string")]
        user: Option<String>,
        /// Question text.
        #[serde(default, deserialize_with = "lenient_string")]
        question: Option<String>,
    },
    /// Chat line.
    Chat {
        /// Sender label.
        #[serde(default, deserialize_with = "lenient_string")]
        user: Option<String>,
        /// Chat text.
        #[serde(default, deserialize_with = "lenient_string")]
        message: Option<String>,
        /// Client timestamp.
        #[serde(default, deserialize_with = "lenient_string")]
        timestamp: Option<String>,
    },
    /// Presenter announcement.
    Broadcast {
        /// Sender label.
        #[serde(default, deserialize_with = "lenient_string")]
        user: Option<String>,
        /// Announcement text.
        #[serde(default, deserialize_with = "lenient_string")]
        message: Option<String>,
    },
    /// System announcement.
    SystemAnnouncement {
        /// Sender label.
        #[serde(default, deserialize_with = "lenient_string")]
        user: Option<String>,
        /// Announcement text.
        #[serde(default, deserialize_with = "lenient_string")]
        message: Option<String>,
    },
    /// Any tag not listed above.
    #[serde(skip)]
    Unknown {
        /// Raw tag as received (empty if absent).
        tag: String,
    },
}

const CLASSROOM_TAGS: &[&str] = &[
    "user_info",
    "audio_chunk",
    "audio_file",
    "audio_control",
    "raise_hand",
    "lower_hand",
    "question",
    "chat",
    "broadcast",
    "system_announcement",
];

impl ClientMessage {
    /// Parses a classroom-channel text frame.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MalformedMessage`] if the frame is not a
    /// JSON object.
    pub fn parse(text: &str) -> Result<Self, GatewayError> {
        let (tag, value) = split_tag(text)?;
        if !CLASSROOM_TAGS.contains(&tag.as_str()) {
            return Ok(Self::Unknown { tag });
        }
        serde_json::from_value(value).map_err(|err| GatewayError::MalformedMessage(err.to_string()))
    }

    /// Returns the sender label carried by the message, if any.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        match self {
            Self::UserInfo { user, .. }
            | Self::AudioChunk { user, .. }
            | Self::AudioFile { user, .. }
            | Self::AudioControl { user, .. }
            | Self::RaiseHand { user }
            | Self::LowerHand { user }
            | Self::Question { user, .. }
            | Self::Chat { user, .. }
            | Self::Broadcast { user, .. }
            | Self::SystemAnnouncement { user, .. } => user.as_deref(),
            Self::Unknown { .. } => None,
        }
    }
}

/// Message received on the authenticated control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Chat line to relay to the session.
    Chat {
        /// Chat text.
        text: Option<String>,
    },
    /// Liveness probe answered with `pong`.
    Ping,
    /// Any other tag; ignored.
    Other {
        /// Raw tag as received.
        tag: String,
    },
}

impl ControlMessage {
    /// Parses a control-channel text frame.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MalformedMessage`] if the frame is not a
    /// JSON object.
    pub fn parse(text: &str) -> Result<Self, GatewayError> {
        let (tag, value) = split_tag(text)?;
        Ok(match tag.as_str() {
            "chat" => Self::Chat {
                text: value.get("text").and_then(scalar_text),
            },
            "ping" => Self::Ping,
            _ => Self::Other { tag },
        })
    }
}

/// Parses `text` as a JSON object and extracts its `type` tag.
fn split_tag(text: &str) -> Result<(String, Value), GatewayError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| GatewayError::MalformedMessage(err.to_string()))?;
    if !value.is_object() {
        return Err(GatewayError::MalformedMessage(
            "expected a JSON object".to_string(),
        ));
    }
    let tag = value.get("type").and_then(scalar_text).unwrap_or_default();
    Ok((tag, value))
}

/// Renders a JSON scalar as text; `null` and containers yield `None`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_text))
}
