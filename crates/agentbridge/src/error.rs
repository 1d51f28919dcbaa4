//! Unified error type for the bridge.

use std::time::Duration;

use agentbridge_protocol::ProtocolError;
use agentbridge_transport::{ConnectionId, SocketRole, TransportError};

/// Top-level error that wraps the sub-crate errors.
///
/// The `#[from]` attribute on each wrapped variant auto-generates `From`
/// impls, so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A transport-level error (bind, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (marshal, parse, framing).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// No connection is registered under this identifier.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The connection exists but cannot do what was asked of it.
    #[error("connection {id} has role {actual}, expected {expected}")]
    WrongRole {
        id: ConnectionId,
        expected: SocketRole,
        actual: SocketRole,
    },

    /// The bridge has not been connected (or was disconnected).
    #[error("bridge is not connected")]
    NotConnected,

    /// `connect` was called on a bridge that is already connected.
    #[error("bridge is already connected")]
    AlreadyConnected,

    /// The listener loop did not exit within its stop bound and was
    /// aborted.
    #[error("listener did not stop within {0:?}")]
    StopTimedOut(Duration),

    /// The listener task ended abnormally (panicked).
    #[error("listener task failed: {0}")]
    ListenerFailed(String),
}
