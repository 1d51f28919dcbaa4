//! Per-connection bookkeeping.

use agentbridge_protocol::SequenceCounter;
use agentbridge_transport::{ConnectionId, SocketRole};

/// Identity and sequence state of one bound socket.
///
/// Each context owns its own [`SequenceCounter`]; publishers and listeners
/// never share numbering. The socket itself is held next to the context by
/// the owning [`Publisher`](crate::Publisher) or
/// [`Listener`](crate::Listener), so the context can be inspected without
/// borrowing the socket.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    id: ConnectionId,
    role: SocketRole,
    port: u16,
    seq: SequenceCounter,
}

impl ConnectionContext {
    pub fn new(id: ConnectionId, role: SocketRole, port: u16) -> Self {
        Self {
            id,
            role,
            port,
            seq: SequenceCounter::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> SocketRole {
        self.role
    }

    /// The port the socket is actually bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Takes the next sequence number (the first is 1).
    pub fn next_seqno(&mut self) -> u64 {
        self.seq.next()
    }

    /// The last sequence number taken, 0 before the first message.
    pub fn last_seqno(&self) -> u64 {
        self.seq.last()
    }
}

/// Allocates [`ConnectionId`]s, starting at 1 and never reusing one.
#[derive(Debug, Default)]
pub struct ConnectionIds {
    last: u64,
}

impl ConnectionIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> ConnectionId {
        self.last += 1;
        ConnectionId::new(self.last)
    }
}
