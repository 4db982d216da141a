//! Per-connection driver.
//!
//! Each accepted WebSocket runs in its own task. The socket is split: a
//! writer task drains the connection's outbox into the sink, while the
//! reader loop feeds inbound text frames to the dispatcher one at a time.
//! Whichever half stops first ends the connection, after which the
//! connection is unregistered and, on the classroom channel, the rest of
//! the session is told that the participant left. A connection removed from
//! the registry by someone else (a failed delivery, an administrator) stops
//! reading immediately.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::messages::{ClientMessage, ControlMessage};
use super::{control, dispatcher};
use crate::domain::identity::UNKNOWN_NAME;
use crate::domain::{
    BroadcastEngine, ConnectionHandle, ConnectionId, Frame, Identity, ServerEvent, SessionId,
};
use crate::error::GatewayError;

/// How long an evicted connection's writer may keep flushing queued frames.
const EVICTION_FLUSH: Duration = Duration::from_millis(250);

/// Per-connection tuning shared by both channels.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Outbox capacity in frames.
    pub outbox_capacity: usize,
    /// Idle timeout for inbound traffic, if any.
    pub idle_timeout: Option<Duration>,
}

/// Which protocol a connection speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Unauthenticated classroom channel with the full message table.
    Classroom,
    /// Authenticated control channel (`chat` and `ping`) for `user_id`.
    Control {
        /// Authenticated user id.
        user_id: i64,
    },
}

/// State the reader loop keeps about its own connection.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Session the connection is joined to.
    pub session_id: SessionId,
    /// The connection's own id.
    pub connection_id: ConnectionId,
    /// Last display name this connection announced.
    pub display_name: String,
    evicted: CancellationToken,
}

impl ConnectionContext {
    /// Creates the context for the connection behind `handle`.
    #[must_use]
    pub fn new(session_id: SessionId, handle: &ConnectionHandle) -> Self {
        Self {
            session_id,
            connection_id: handle.id(),
            display_name: UNKNOWN_NAME.to_string(),
            evicted: handle.eviction(),
        }
    }

    /// Returns `true` once the connection has been removed from the
    /// registry.
    #[must_use]
    pub fn is_evicted(&self) -> bool {
        self.evicted.is_cancelled()
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    /// Peer closed the socket or the stream ended.
    PeerClosed,
    /// Reading from the socket failed.
    TransportError,
    /// The peer sent a binary frame or text that is not a JSON object.
    ProtocolError,
    /// No inbound traffic within the idle timeout.
    IdleTimeout,
    /// The outbox or socket writer is gone.
    WriterClosed,
    /// The connection was removed from the registry.
    Evicted,
}

/// Registers the connection, runs it to completion and cleans up.
///
/// `identity` is attached right after registration; the control channel
/// passes the resolver-provided identity here.
pub async fn run_connection(
    socket: WebSocket,
    session_id: SessionId,
    channel: Channel,
    identity: Option<Identity>,
    engine: BroadcastEngine,
    settings: ConnectionSettings,
) {
    let (handle, outbox) = ConnectionHandle::channel(settings.outbox_capacity);
    let mut ctx = ConnectionContext::new(session_id, &handle);
    let eviction = handle.eviction();

    if let Err(err) = engine.registry().register(session_id, handle).await {
        tracing::error!(
            session_id = %session_id,
            error = %err,
            "failed to register connection"
        );
        return;
    }
    if let Some(identity) = identity {
        ctx.display_name.clone_from(&identity.name);
        engine
            .registry()
            .attach_identity(ctx.connection_id, identity)
            .await;
    }
    tracing::info!(
        session_id = %session_id,
        connection_id = %ctx.connection_id,
        channel = ?channel,
        "connection opened"
    );

    let (ws_tx, ws_rx) = socket.split();
    let mut writer = tokio::spawn(write_frames(ws_tx, outbox));

    let termination = tokio::select! {
        termination = read_frames(ws_rx, &engine, &mut ctx, channel, settings.idle_timeout) => {
            termination
        }
        _ = &mut writer => Termination::WriterClosed,
        () = eviction.cancelled() => Termination::Evicted,
    };

    let was_registered = engine
        .registry()
        .unregister(session_id, ctx.connection_id)
        .await;
    tracing::info!(
        session_id = %session_id,
        connection_id = %ctx.connection_id,
        reason = ?termination,
        pruned_earlier = !was_registered,
        "connection closed"
    );

    if channel == Channel::Classroom {
        let notice = ServerEvent::participant_left(&ctx.display_name);
        engine.broadcast(session_id, &notice, None).await;
    }

    if termination == Termination::Evicted {
        let flushed = tokio::time::timeout(EVICTION_FLUSH, &mut writer).await;
        if flushed.is_err() {
            writer.abort();
        }
    }
}

/// Reads inbound frames until the connection should end.
async fn read_frames(
    mut ws_rx: SplitStream<WebSocket>,
    engine: &BroadcastEngine,
    ctx: &mut ConnectionContext,
    channel: Channel,
    idle_timeout: Option<Duration>,
) -> Termination {
    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, ws_rx.next()).await {
                Ok(next) => next,
                Err(_) => return Termination::IdleTimeout,
            },
            None => ws_rx.next().await,
        };

        let outcome = match next {
            Some(Ok(Message::Text(text))) => handle_text(engine, ctx, channel, text.as_str()).await,
            Some(Ok(Message::Binary(_))) => {
                Err(GatewayError::MalformedMessage("binary frames are not supported".to_string()))
            }
            Some(Ok(Message::Close(_))) | None => return Termination::PeerClosed,
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Err(err)) => {
                tracing::debug!(
                    connection_id = %ctx.connection_id,
                    error = %err,
                    "ws read failed"
                );
                return Termination::TransportError;
            }
        };

        match outcome {
            Ok(()) => {}
            Err(err @ GatewayError::MalformedMessage(_)) => {
                tracing::debug!(
                    connection_id = %ctx.connection_id,
                    error = %err,
                    "malformed frame"
                );
                let _ = engine
                    .send_to(ctx.connection_id, &ServerEvent::error(err.to_string()))
                    .await;
                return Termination::ProtocolError;
            }
            Err(_) if ctx.is_evicted() => return Termination::Evicted,
            Err(_) => return Termination::WriterClosed,
        }
    }
}

/// Parses one text frame for `channel` and hands it to the matching handler.
async fn handle_text(
    engine: &BroadcastEngine,
    ctx: &mut ConnectionContext,
    channel: Channel,
    text: &str,
) -> Result<(), GatewayError> {
    match channel {
        Channel::Classroom => {
            let message = ClientMessage::parse(text)?;
            dispatcher::dispatch(engine, ctx, message).await
        }
        Channel::Control { user_id } => {
            let message = ControlMessage::parse(text)?;
            control::handle(engine, ctx, user_id, message).await
        }
    }
}

/// Drains the outbox into the socket, then closes it.
async fn write_frames(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::Receiver<Frame>,
) {
    while let Some(frame) = outbox.recv().await {
        if ws_tx.send(Message::text(frame.to_string())).await.is_err() {
            return;
        }
    }
    let _ = ws_tx.send(Message::Close(None)).await;
}
