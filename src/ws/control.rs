//! Authenticated control channel.
//!
//! Connections on this channel are admitted only after the identity
//! resolver accepted their token. They understand two messages: `chat`,
//! relayed to the whole session under the sender's user id, and `ping`,
//! answered with `pong` to the sender alone. Anything else is ignored.

use super::connection::ConnectionContext;
use super::messages::ControlMessage;
use crate::domain::{BroadcastEngine, ServerEvent};
use crate::error::GatewayError;

/// Handles one control-channel message.
///
/// # Errors
///
/// Returns [`GatewayError::ConnectionClosed`] if the connection was already
/// removed from the registry or the `pong` reply could not be delivered.
pub async fn handle(
    engine: &BroadcastEngine,
    ctx: &ConnectionContext,
    user_id: i64,
    message: ControlMessage,
) -> Result<(), GatewayError> {
    if ctx.is_evicted() {
        return Err(GatewayError::ConnectionClosed(ctx.connection_id));
    }
    match message {
        ControlMessage::Chat { text } => {
            let event = ServerEvent::ControlChat {
                from: user_id,
                text,
            };
            engine.broadcast(ctx.session_id, &event, None).await;
            Ok(())
        }
        ControlMessage::Ping => engine.send_to(ctx.connection_id, &ServerEvent::Pong).await,
        ControlMessage::Other { tag } => {
            tracing::debug!(
                session_id = %ctx.session_id,
                connection_id = %ctx.connection_id,
                tag = %tag,
                "ignoring control message"
            );
            Ok(())
        }
    }
}
