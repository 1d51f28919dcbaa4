//! ZeroMQ transport implementation using the `zeromq` crate.
//!
//! PUB sockets carry published frames to SUB clients; REP sockets answer
//! REQ clients. Timeouts and linger from [`SocketOptions`] are enforced here
//! with `tokio::time::timeout`. The `zeromq` crate has no queue-depth or
//! conflate knob, so high-water-marks and conflate are kept on the socket
//! for inspection and reported at bind time.

use std::time::Duration;

use zeromq::{PubSocket, RepSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use crate::{
    DEFAULT_TIMEOUT, Endpoint, PublishSocket, ReplySocket, SocketOptions, SocketRole,
    TransportError,
};

/// Binds `socket` and returns the endpoint it actually listens on (the OS
/// picks the port when asked for port 0).
async fn bind_socket<S: Socket>(
    socket: &mut S,
    endpoint: &Endpoint,
) -> Result<Endpoint, TransportError> {
    let addr = endpoint.to_string();
    let bound = socket.bind(&addr).await.map_err(|e| {
        TransportError::BindFailed {
            endpoint: addr.clone(),
            reason: e.to_string(),
        }
    })?;
    let port = match bound {
        zeromq::Endpoint::Tcp(_, port) => port,
        _ => endpoint.port,
    };
    Ok(endpoint.with_port(port))
}

fn report_unenforced(role: SocketRole, endpoint: &Endpoint, options: &SocketOptions) {
    if options.conflate {
        tracing::warn!(
            %role, %endpoint,
            "ZMQ_CONFLATE requested but not supported by this transport"
        );
    }
    tracing::debug!(
        %role, %endpoint,
        rcvhwm = ?options.receive_high_water_mark,
        sndhwm = ?options.send_high_water_mark,
        "high-water-marks recorded, queue depth is managed by the transport"
    );
}

async fn close_socket<S: Socket>(
    socket: S,
    linger: Option<Duration>,
    endpoint: &Endpoint,
) {
    let closing = socket.close();
    let errors = match linger {
        Some(limit) => match tokio::time::timeout(limit, closing).await {
            Ok(errors) => errors,
            Err(_) => {
                tracing::debug!(%endpoint, "linger expired, pending messages discarded");
                Vec::new()
            }
        },
        None => closing.await,
    };
    for e in errors {
        tracing::warn!(%endpoint, error = %e, "error while closing socket");
    }
    tracing::debug!(%endpoint, "socket closed");
}

/// Concatenates all parts of a (normally single-part) message.
fn into_bytes(message: ZmqMessage) -> Vec<u8> {
    let mut out = Vec::new();
    for part in message.into_vec() {
        out.extend_from_slice(&part);
    }
    out
}

async fn send_bounded<S: SocketSend>(
    socket: &mut S,
    message: Vec<u8>,
    timeout: Duration,
) -> Result<(), TransportError> {
    match tokio::time::timeout(timeout, socket.send(ZmqMessage::from(message))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::SendFailed(e.to_string())),
        Err(_) => Err(TransportError::SendTimedOut(timeout)),
    }
}

// ---------------------------------------------------------------------------
// PUB
// ---------------------------------------------------------------------------

/// A ZeroMQ PUB socket.
pub struct ZmqPublishSocket {
    socket: PubSocket,
    endpoint: Endpoint,
    options: SocketOptions,
}

impl ZmqPublishSocket {
    /// Binds a new PUB socket to the given endpoint.
    pub async fn bind(
        endpoint: &Endpoint,
        options: SocketOptions,
    ) -> Result<Self, TransportError> {
        let mut socket = PubSocket::new();
        let endpoint = bind_socket(&mut socket, endpoint).await?;
        report_unenforced(SocketRole::Publish, &endpoint, &options);
        tracing::info!(%endpoint, "publisher socket bound");
        Ok(Self {
            socket,
            endpoint,
            options,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn options(&self) -> &SocketOptions {
        &self.options
    }
}

impl PublishSocket for ZmqPublishSocket {
    async fn send(&mut self, message: Vec<u8>) -> Result<(), TransportError> {
        send_bounded(&mut self.socket, message, self.options.send_timeout).await
    }

    async fn close(self) {
        let Self {
            socket,
            endpoint,
            options,
        } = self;
        close_socket(socket, options.linger, &endpoint).await;
    }

    fn port(&self) -> u16 {
        self.endpoint.port
    }
}

// ---------------------------------------------------------------------------
// REP
// ---------------------------------------------------------------------------

/// A ZeroMQ REP socket.
///
/// REP enforces strict alternation: every received request must be answered
/// with [`ReplySocket::send`] before the next one can be received.
pub struct ZmqReplySocket {
    socket: RepSocket,
    endpoint: Endpoint,
    options: SocketOptions,
}

impl ZmqReplySocket {
    /// Binds a new REP socket to the given endpoint.
    ///
    /// A zero receive timeout would turn the receive loop into a busy poll,
    /// so it is replaced with [`DEFAULT_TIMEOUT`].
    pub async fn bind(
        endpoint: &Endpoint,
        mut options: SocketOptions,
    ) -> Result<Self, TransportError> {
        if options.receive_timeout.is_zero() {
            tracing::warn!(
                %endpoint,
                default = ?DEFAULT_TIMEOUT,
                "receive timeout must be positive, using the default"
            );
            options.receive_timeout = DEFAULT_TIMEOUT;
        }
        let mut socket = RepSocket::new();
        let endpoint = bind_socket(&mut socket, endpoint).await?;
        report_unenforced(SocketRole::Reply, &endpoint, &options);
        tracing::info!(%endpoint, "reply socket bound");
        Ok(Self {
            socket,
            endpoint,
            options,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn options(&self) -> &SocketOptions {
        &self.options
    }
}

impl ReplySocket for ZmqReplySocket {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match tokio::time::timeout(self.options.receive_timeout, self.socket.recv())
            .await
        {
            Err(_) => Ok(None),
            Ok(Ok(message)) => Ok(Some(into_bytes(message))),
            Ok(Err(e)) => Err(TransportError::ReceiveFailed(e.to_string())),
        }
    }

    async fn send(&mut self, reply: Vec<u8>) -> Result<(), TransportError> {
        send_bounded(&mut self.socket, reply, self.options.send_timeout).await
    }

    async fn close(self) {
        let Self {
            socket,
            endpoint,
            options,
        } = self;
        close_socket(socket, options.linger, &endpoint).await;
    }

    fn port(&self) -> u16 {
        self.endpoint.port
    }

    fn receive_timeout(&self) -> Duration {
        self.options.receive_timeout
    }
}
