//! Events the gateway sends to session participants.
//!
//! Every outbound frame is one [`ServerEvent`] serialized as a JSON object
//! whose `type` field names the event. Payload fields such as audio data
//! are opaque strings relayed exactly as received.

use serde::Serialize;

/// Outbound event delivered to one or more connections of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A participant announced itself with `user_info`.
    #[serde(rename = "participant_joined")]
    ParticipantJoined {
        /// Sender label.
        user: String,
        /// Human-readable notice.
        message: String,
    },

    /// A participant's connection terminated.
    #[serde(rename = "participant_left")]
    ParticipantLeft {
        /// Last-known display name of the departed participant.
        user: String,
        /// Human-readable notice.
        message: String,
    },

    /// A streamed audio fragment.
    #[serde(rename = "audio_chunk")]
    AudioChunk {
        /// Encoded audio payload (typically base64).
        data: Option<String>,
        /// MIME type of the payload.
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// Sender label.
        user: String,
    },

    /// A complete audio file.
    #[serde(rename = "audio_file")]
    AudioFile {
        /// Encoded file payload (typically base64).
        data: Option<String>,
        /// Original file name.
        filename: String,
        /// MIME type of the payload.
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// Sender label.
        user: String,
    },

    /// Playback control issued by the presenter.
    #[serde(rename = "audio_control")]
    AudioControl {
        /// Control action (`play`, `pause`, ...), relayed verbatim.
        action: Option<String>,
        /// Free-form accompanying text.
        message: String,
        /// Sender label.
        user: String,
    },

    /// A participant raised their hand.
    #[serde(rename = "hand_raised")]
    HandRaised {
        /// Sender label.
        user: String,
        /// Human-readable notice.
        message: String,
    },

    /// A participant lowered their hand.
    #[serde(rename = "hand_lowered")]
    HandLowered {
        /// Sender label.
        user: String,
        /// Human-readable notice.
        message: String,
    },

    /// A participant asked a question.
    #[serde(rename = "question")]
    Question {
        /// Sender label.
        user: String,
        /// Question text.
        question: String,
        /// Human-readable notice.
        message: String,
    },

    /// A chat line on the classroom channel.
    #[serde(rename = "chat")]
    Chat {
        /// Sender label.
        user: String,
        /// Chat text.
        message: String,
        /// Client-supplied timestamp, relayed verbatim.
        timestamp: String,
    },

    /// A chat line on the authenticated control channel.
    #[serde(rename = "chat")]
    ControlChat {
        /// Authenticated user id of the sender.
        from: i64,
        /// Chat text.
        text: Option<String>,
    },

    /// Presenter announcement to the session.
    #[serde(rename = "broadcast")]
    Broadcast {
        /// Sender label.
        user: String,
        /// Announcement text.
        message: String,
    },

    /// System announcement to the session.
    #[serde(rename = "system_announcement")]
    SystemAnnouncement {
        /// Sender label.
        user: String,
        /// Announcement text.
        message: String,
    },

    /// Error reported to a single connection.
    #[serde(rename = "error")]
    Error {
        /// Error description.
        message: String,
    },

    /// Reply to a control-channel `ping`.
    #[serde(rename = "pong")]
    Pong,

    /// The session was ended by its presenter.
    #[serde(rename = "session-ended")]
    SessionEnded,

    /// A participant was removed from the session.
    #[serde(rename = "participant-removed")]
    ParticipantRemoved {
        /// User id of the removed participant.
        user_id: i64,
    },

    /// A participant was muted or unmuted.
    #[serde(rename = "participant-muted")]
    ParticipantMuted {
        /// User id of the affected participant.
        user_id: i64,
        /// New mute state.
        muted: bool,
    },
}

impl ServerEvent {
    /// Returns the wire `type` tag of this event.
    #[must_use]
    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::ParticipantLeft { .. } => "participant_left",
            Self::AudioChunk { .. } => "audio_chunk",
            Self::AudioFile { .. } => "audio_file",
            Self::AudioControl { .. } => "audio_control",
            Self::HandRaised { .. } => "hand_raised",
            Self::HandLowered { .. } => "hand_lowered",
            Self::Question { .. } => "question",
            Self::Chat { .. } | Self::ControlChat { .. } => "chat",
            Self::Broadcast { .. } => "broadcast",
            Self::SystemAnnouncement { .. } => "system_announcement",
            Self::Error { .. } => "error",
            Self::Pong => "pong",
            Self::SessionEnded => "session-ended",
            Self::ParticipantRemoved { .. } => "participant-removed",
            Self::ParticipantMuted { .. } => "participant-muted",
        }
    }

    /// Builds the `participant_left` notice for `user`.
    #[must_use]
    pub fn participant_left(user: &str) -> Self {
        Self::ParticipantLeft {
            user: user.to_string(),
            message: format!("{user} left the session"),
        }
    }

    /// Builds an `error` event carrying `message`.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
