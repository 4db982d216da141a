//! Domain layer: session membership, identities, outbound events and
//! fan-out.
//!
//! This module contains the in-memory core of the gateway: typed session
//! and connection identifiers, the advisory identity attached to a
//! connection, the [`ServerEvent`] wire model, the [`ConnectionRegistry`]
//! and the [`BroadcastEngine`] built on top of it.

pub mod broadcast;
pub mod connection_id;
pub mod connection_registry;
pub mod identity;
pub mod session_event;
pub mod session_id;

pub use broadcast::{BroadcastEngine, BroadcastReport};
pub use connection_id::ConnectionId;
pub use connection_registry::{ConnectionHandle, ConnectionRegistry, Frame};
pub use identity::Identity;
pub use session_event::ServerEvent;
pub use session_id::SessionId;
