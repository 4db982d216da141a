//! Classroom-channel dispatcher.
//!
//! Each inbound [`ClientMessage`] maps to exactly one action: a broadcast
//! to the session (with or without the sender) or, for unknown tags, an
//! error reply to the sender alone.
//!
//! | tag                   | outbound event        | sender excluded |
//! |-----------------------|-----------------------|-----------------|
//! | `user_info`           | `participant_joined`  | yes             |
//! | `audio_chunk`         | `audio_chunk`         | yes             |
//! | `audio_file`          | `audio_file`          | yes             |
//! | `audio_control`       | `audio_control`       | yes             |
//! | `raise_hand`          | `hand_raised`         | no              |
//! | `lower_hand`          | `hand_lowered`        | no              |
//! | `question`            | `question`            | no              |
//! | `chat`                | `chat`                | no              |
//! | `broadcast`           | `broadcast`           | yes             |
//! | `system_announcement` | `system_announcement` | yes             |
//! | anything else         | `error` to sender     | n/a             |

use super::connection::ConnectionContext;
use super::messages::ClientMessage;
use crate::domain::identity::{DEFAULT_ROLE, UNKNOWN_NAME};
use crate::domain::{BroadcastEngine, Identity, ServerEvent};
use crate::error::GatewayError;

const DEFAULT_CHUNK_MIME: &str = "audio/webm";
const DEFAULT_FILE_MIME: &str = "audio/mp3";

/// What to do with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Broadcast to the session.
    Broadcast {
        /// Event to send.
        event: ServerEvent,
        /// Whether the sender is left out.
        exclude_sender: bool,
    },
    /// Reply to the sender only.
    Reply(ServerEvent),
}

/// Maps a message to its action. `user` is the resolved sender label.
#[must_use]
pub fn route(message: ClientMessage, user: String) -> Action {
    let (event, exclude_sender) = match message {
        ClientMessage::UserInfo { .. } => (
            ServerEvent::ParticipantJoined {
                message: format!("{user} joined the session"),
                user,
            },
            true,
        ),
        ClientMessage::AudioChunk {
            data, mime_type, ..
        } => (
            ServerEvent::AudioChunk {
                data,
                mime_type: mime_type.unwrap_or_else(|| DEFAULT_CHUNK_MIME.to_string()),
                user,
            },
            true,
        ),
        ClientMessage::AudioFile {
            data,
            filename,
            mime_type,
            ..
        } => (
            ServerEvent::AudioFile {
                data,
                filename: filename.unwrap_or_default(),
                mime_type: mime_type.unwrap_or_else(|| DEFAULT_FILE_MIME.to_string()),
                user,
            },
            true,
        ),
        ClientMessage::AudioControl {
            action, message, ..
        } => (
            ServerEvent::AudioControl {
                action,
                message: message.unwrap_or_default(),
                user,
            },
            true,
        ),
        ClientMessage::RaiseHand { .. } => (
            ServerEvent::HandRaised {
                message: format!("{user} raised their hand"),
                user,
            },
            false,
        ),
        ClientMessage::LowerHand { .. } => (
            ServerEvent::HandLowered {
                message: format!("{user} lowered their hand"),
                user,
            },
            false,
        ),
        ClientMessage::Question { question, .. } => (
            ServerEvent::Question {
                question: question.unwrap_or_default(),
                message: format!("{user} asked a question"),
                user,
            },
            false,
        ),
        ClientMessage::Chat {
            message, timestamp, ..
        } => (
            ServerEvent::Chat {
                user,
                message: message.unwrap_or_default(),
                timestamp: timestamp.unwrap_or_default(),
            },
            false,
        ),
        ClientMessage::Broadcast { message, .. } => (
            ServerEvent::Broadcast {
                user,
                message: message.unwrap_or_default(),
            },
            true,
        ),
        ClientMessage::SystemAnnouncement { message, .. } => (
            ServerEvent::SystemAnnouncement {
                user,
                message: message.unwrap_or_default(),
            },
            true,
        ),
        ClientMessage::Unknown { tag } => {
            return Action::Reply(ServerEvent::error(format!("Unknown message type: {tag}")));
        }
    };
    Action::Broadcast {
        event,
        exclude_sender,
    }
}

/// Handles one classroom-channel message for the connection in `ctx`.
///
/// The sender label is the message's own `user` field, falling back to the
/// connection's attached identity. A `user_info` message attaches
/// `{name, role}` before the join notice goes out.
///
/// # Errors
///
/// Returns [`GatewayError::ConnectionClosed`] if the connection has already
/// been removed from the registry or a reply to the sender could not be
/// delivered; the caller ends the connection.
pub async fn dispatch(
    engine: &BroadcastEngine,
    ctx: &mut ConnectionContext,
    message: ClientMessage,
) -> Result<(), GatewayError> {
    if ctx.is_evicted() {
        return Err(GatewayError::ConnectionClosed(ctx.connection_id));
    }

    if let ClientMessage::UserInfo { name, role, .. } = &message {
        let identity = Identity::new(
            name.as_deref().unwrap_or(UNKNOWN_NAME),
            role.as_deref().unwrap_or(DEFAULT_ROLE),
        );
        tracing::info!(
            session_id = %ctx.session_id,
            connection_id = %ctx.connection_id,
            name = %identity.name,
            role = %identity.role,
            "participant identified"
        );
        ctx.display_name.clone_from(&identity.name);
        engine
            .registry()
            .attach_identity(ctx.connection_id, identity)
            .await;
    }

    let user = match message.user() {
        Some(user) => user.to_string(),
        None => engine.registry().identity(ctx.connection_id).await.name,
    };

    match route(message, user) {
        Action::Broadcast {
            event,
            exclude_sender,
        } => {
            let exclude = exclude_sender.then_some(ctx.connection_id);
            engine.broadcast(ctx.session_id, &event, exclude).await;
            Ok(())
        }
        Action::Reply(event) => {
            tracing::debug!(
                session_id = %ctx.session_id,
                connection_id = %ctx.connection_id,
                "rejected message with unknown type"
            );
            engine.send_to(ctx.connection_id, &event).await
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::connection_registry::Frame;
    use crate::domain::{ConnectionHandle, ConnectionRegistry, SessionId};

    fn msg(text: &str) -> ClientMessage {
        let Ok(message) = ClientMessage::parse(text) else {
            panic!("invalid test message {text}");
        };
        message
    }

    fn exclusion(text: &str) -> bool {
        match route(msg(text), "u".to_string()) {
            Action::Broadcast { exclude_sender, .. } => exclude_sender,
            Action::Reply(_) => panic!("expected a broadcast for {text}"),
        }
    }

    fn broadcast_event(text: &str, user: &str) -> ServerEvent {
        let Action::Broadcast { event, .. } = route(msg(text), user.to_string()) else {
            panic!("expected a broadcast for {text}");
        };
        event
    }

    #[test]
    fn exclusion_policy_matches_table() {
        assert!(exclusion(r#"{"type":"user_info"}"#));
        assert!(exclusion(r#"{"type":"audio_chunk"}"#));
        assert!(exclusion(r#"{"type":"audio_file"}"#));
        assert!(exclusion(r#"{"type":"audio_control"}"#));
        assert!(!exclusion(r#"{"type":"raise_hand"}"#));
        assert!(!exclusion(r#"{"type":"lower_hand"}"#));
        assert!(!exclusion(r#"{"type":"question"}"#));
        assert!(!exclusion(r#"{"type":"chat"}"#));
        assert!(exclusion(r#"{"type":"broadcast"}"#));
        assert!(exclusion(r#"{"type":"system_announcement"}"#));
    }

    #[test]
    fn unknown_type_replies_with_error() {
        assert_eq!(
            route(msg(r#"{"type":"bogus"}"#), "u".to_string()),
            Action::Reply(ServerEvent::Error {
                message: "Unknown message type: bogus".to_string()
            })
        );
    }

    #[test]
    fn audio_defaults_are_filled_in() {
        let event = broadcast_event(r#"{"type":"audio_file","data":"Zm9v"}"#, "T");
        assert_eq!(
            event,
            ServerEvent::AudioFile {
                data: Some("Zm9v".to_string()),
                filename: String::new(),
                mime_type: "audio/mp3".to_string(),
                user: "T".to_string(),
            }
        );

        let event = broadcast_event(r#"{"type":"audio_chunk"}"#, "T");
        assert_eq!(
            event,
            ServerEvent::AudioChunk {
                data: None,
                mime_type: "audio/webm".to_string(),
                user: "T".to_string(),
            }
        );
    }

    #[test]
    fn notices_name_the_sender() {
        let event = broadcast_event(r#"{"type":"question","question":"why?"}"#, "Kim");
        assert_eq!(
            event,
            ServerEvent::Question {
                user: "Kim".to_string(),
                question: "why?".to_string(),
                message: "Kim asked a question".to_string(),
            }
        );
    }

    struct Harness {
        engine: BroadcastEngine,
        sender: ConnectionContext,
        sender_rx: mpsc::Receiver<Frame>,
        peer_rx: mpsc::Receiver<Frame>,
    }

    impl Harness {
        async fn send(&mut self, text: &str) -> Result<(), GatewayError> {
            dispatch(&self.engine, &mut self.sender, msg(text)).await
        }
    }

    async fn harness() -> Harness {
        let engine = BroadcastEngine::new(Arc::new(ConnectionRegistry::new()));
        let session_id = SessionId::new(7);
        let (a, sender_rx) = ConnectionHandle::channel(8);
        let (b, peer_rx) = ConnectionHandle::channel(8);
        let sender = ConnectionContext::new(session_id, &a);
        let (Ok(()), Ok(())) = (
            engine.registry().register(session_id, a).await,
            engine.registry().register(session_id, b).await,
        ) else {
            panic!("registration failed");
        };
        Harness {
            engine,
            sender,
            sender_rx,
            peer_rx,
        }
    }

    fn decode(frame: Option<Frame>) -> Value {
        let Some(Ok(value)) = frame.map(|f| serde_json::from_str::<Value>(&f)) else {
            panic!("expected a JSON frame");
        };
        value
    }

    #[tokio::test]
    async fn chat_reaches_everyone_including_sender() {
        let mut h = harness().await;
        let chat = r#"{"type":"chat","message":"hi","user":"Alice"}"#;
        let result = h.send(chat).await;
        assert!(result.is_ok());

        let peer = decode(h.peer_rx.recv().await);
        assert_eq!(peer.get("type"), Some(&json!("chat")));
        assert_eq!(peer.get("user"), Some(&json!("Alice")));
        assert_eq!(peer.get("message"), Some(&json!("hi")));
        assert_eq!(decode(h.sender_rx.recv().await), peer);
    }

    #[tokio::test]
    async fn unknown_type_only_reaches_sender() {
        let mut h = harness().await;
        let result = h.send(r#"{"type":"bogus"}"#).await;
        assert!(result.is_ok());

        assert_eq!(
            decode(h.sender_rx.recv().await),
            json!({"type": "error", "message": "Unknown message type: bogus"})
        );
        assert!(h.peer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn user_info_attaches_identity_and_labels_later_messages() {
        let mut h = harness().await;
        let user_info = r#"{"type":"user_info","name":"Ms. Lee","role":"teacher"}"#;
        let _ = h.send(user_info).await;

        let joined = decode(h.peer_rx.recv().await);
        let notice = json!("Ms. Lee joined the session");
        assert_eq!(joined.get("type"), Some(&json!("participant_joined")));
        assert_eq!(joined.get("message"), Some(&notice));
        assert!(h.sender_rx.try_recv().is_err());
        assert_eq!(h.sender.display_name, "Ms. Lee");

        let connection_id = h.sender.connection_id;
        let identity = h.engine.registry().identity(connection_id).await;
        assert_eq!(identity, Identity::new("Ms. Lee", "teacher"));

        let _ = h.send(r#"{"type":"raise_hand"}"#).await;
        let raised = decode(h.peer_rx.recv().await);
        assert_eq!(raised.get("user"), Some(&json!("Ms. Lee")));
    }

    #[tokio::test]
    async fn unidentified_sender_is_unknown() {
        let mut h = harness().await;
        let _ = h.send(r#"{"type":"lower_hand"}"#).await;
        let lowered = decode(h.peer_rx.recv().await);
        assert_eq!(lowered.get("user"), Some(&json!("Unknown")));
        assert_eq!(
            lowered.get("message"),
            Some(&json!("Unknown lowered their hand"))
        );
    }

    #[tokio::test]
    async fn audio_chunk_skips_sender() {
        let mut h = harness().await;
        let chunk = r#"{"type":"audio_chunk","data":"AAAA","mimeType":"audio/ogg","user":"T"}"#;
        let _ = h.send(chunk).await;

        assert_eq!(
            decode(h.peer_rx.recv().await),
            json!({
                "type": "audio_chunk",
                "data": "AAAA",
                "mimeType": "audio/ogg",
                "user": "T"
            })
        );
        assert!(h.sender_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pruned_sender_can_no_longer_broadcast() {
        let engine = BroadcastEngine::new(Arc::new(ConnectionRegistry::new()));
        let session_id = SessionId::new(9);
        let (slow, _slow_rx) = ConnectionHandle::channel(1);
        let (peer, mut peer_rx) = ConnectionHandle::channel(8);
        let mut sender = ConnectionContext::new(session_id, &slow);
        let (Ok(()), Ok(())) = (
            engine.registry().register(session_id, slow).await,
            engine.registry().register(session_id, peer).await,
        ) else {
            panic!("registration failed");
        };

        let notice = ServerEvent::Broadcast {
            user: "T".to_string(),
            message: "hello".to_string(),
        };
        engine.broadcast(session_id, &notice, None).await;
        let report = engine.broadcast(session_id, &notice, None).await;
        assert_eq!(report.pruned, 1);
        assert!(sender.is_evicted());

        let chat = msg(r#"{"type":"chat","message":"from pruned"}"#);
        let result = dispatch(&engine, &mut sender, chat).await;

        assert!(matches!(result, Err(GatewayError::ConnectionClosed(_))));
        assert!(peer_rx.recv().await.is_some());
        assert!(peer_rx.recv().await.is_some());
        assert!(peer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_error_reply_is_reported() {
        let mut h = harness().await;
        h.sender_rx.close();
        let result = h.send(r#"{"type":"bogus"}"#).await;
        assert!(matches!(result, Err(GatewayError::ConnectionClosed(_))));
        assert!(h.peer_rx.try_recv().is_err());
    }
}
