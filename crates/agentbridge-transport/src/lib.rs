//! Transport abstraction layer for agentbridge.
//!
//! Provides the [`PublishSocket`] and [`ReplySocket`] traits that the bridge
//! talks to, the [`SocketOptions`] allow-list, and bind [`Endpoint`]s.
//!
//! Both socket traits move opaque byte messages; they know nothing about
//! topics or envelopes. Timeouts are enforced here, so a receive that waits
//! longer than its configured timeout comes back as `Ok(None)` instead of
//! blocking the caller.
//!
//! # Feature Flags
//!
//! - `zmq` (default): ZeroMQ PUB/REP sockets via the `zeromq` crate

mod endpoint;
mod error;
mod options;
#[cfg(feature = "zmq")]
mod zmq;

pub use endpoint::{validate_port, Endpoint, Protocol, PORT_MAX, PORT_MIN};
pub use error::TransportError;
pub use options::{
    SocketOption, SocketOptions, DEFAULT_HIGH_WATER_MARK, DEFAULT_TIMEOUT,
};
#[cfg(feature = "zmq")]
pub use zmq::{ZmqPublishSocket, ZmqReplySocket};

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What a socket is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketRole {
    /// Broadcasts frames to every subscriber.
    Publish,
    /// Answers each request with exactly one reply.
    Reply,
}

impl fmt::Display for SocketRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publish => f.write_str("publish"),
            Self::Reply => f.write_str("reply"),
        }
    }
}

/// A bound socket that broadcasts messages.
pub trait PublishSocket: Send + 'static {
    /// Sends one message to all current subscribers.
    ///
    /// Returns [`TransportError::SendTimedOut`] if the message could not be
    /// handed to the transport within the send timeout. The message is
    /// dropped in that case.
    fn send(
        &mut self,
        message: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the socket, waiting at most the linger period.
    fn close(self) -> impl Future<Output = ()> + Send;

    /// The port the socket is actually bound to.
    fn port(&self) -> u16;
}

/// A bound socket that receives requests and sends one reply to each.
pub trait ReplySocket: Send + 'static {
    /// Waits up to the receive timeout for the next request.
    ///
    /// Returns `Ok(None)` when the timeout expires with nothing received.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Sends the reply to the most recently received request.
    fn send(
        &mut self,
        reply: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the socket, waiting at most the linger period.
    fn close(self) -> impl Future<Output = ()> + Send;

    /// The port the socket is actually bound to.
    fn port(&self) -> u16;

    /// Upper bound on how long a single [`recv`](Self::recv) may wait.
    fn receive_timeout(&self) -> Duration;
}
