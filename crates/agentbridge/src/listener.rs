//! Inbound side: the request/reply loop.
//!
//! A [`Listener`] owns a REP socket and runs on its own Tokio task once
//! spawned. The loop is:
//!   1. Wait up to the receive timeout for a request
//!   2. Decode it (optionally stripping a `topic SPACE` prefix)
//!   3. Notify the host sink
//!   4. Reply SUCCESS or ERROR, stamped with the listener's seqno
//!
//! Every received request gets exactly one reply, including requests that
//! fail to parse. The stop flag is checked once per loop turn, so a stop
//! request is noticed within one receive timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentbridge_protocol::{
    parse_document, unframe, Codec, Envelope, Header, JsonCodec, ProtocolError,
    Reply, Value,
};
use agentbridge_transport::{
    ConnectionId, Endpoint, ReplySocket, SocketOptions, SocketRole,
    ZmqReplySocket,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::Verbosity;
use crate::context::ConnectionContext;
use crate::notify::{Notification, NotificationSink};
use crate::BridgeError;

/// Pause after a receive error so a broken socket does not spin the task.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Where the listener loop currently is.
///
/// ```text
/// Bound → Listening → (Receiving ⇄ Replying)* → Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    /// Socket bound, loop not started yet.
    Bound,
    /// Loop task started.
    Listening,
    /// Waiting for the next request.
    Receiving,
    /// Handling a request and sending its reply.
    Replying,
    /// Loop exited and socket closed.
    Stopped,
}

impl ListenerState {
    /// Whether the loop is still serving requests.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Listening | Self::Receiving | Self::Replying)
    }
}

/// Receives requests on a REP socket and answers each one.
pub struct Listener<
    S: ReplySocket = ZmqReplySocket,
    N: NotificationSink = mpsc::UnboundedSender<Notification>,
    C: Codec = JsonCodec,
> {
    context: ConnectionContext,
    socket: S,
    sink: N,
    codec: C,
    framed_requests: bool,
    verbosity: Verbosity,
}

impl<N: NotificationSink> Listener<ZmqReplySocket, N, JsonCodec> {
    /// Binds a ZeroMQ REP socket and wraps it.
    pub async fn bind(
        id: ConnectionId,
        endpoint: &Endpoint,
        options: SocketOptions,
        sink: N,
    ) -> Result<Self, BridgeError> {
        let socket = ZmqReplySocket::bind(endpoint, options).await?;
        Ok(Self::new(id, socket, sink, JsonCodec))
    }
}

impl<S: ReplySocket, N: NotificationSink, C: Codec> Listener<S, N, C> {
    pub fn new(id: ConnectionId, socket: S, sink: N, codec: C) -> Self {
        Self {
            context: ConnectionContext::new(id, SocketRole::Reply, socket.port()),
            socket,
            sink,
            codec,
            framed_requests: false,
            verbosity: Verbosity::default(),
        }
    }

    /// Expect `topic SPACE json` requests. The topic is passed on in the
    /// notification.
    pub fn with_framed_requests(mut self, framed: bool) -> Self {
        self.framed_requests = framed;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    /// Handles one raw request: notifies the sink and returns the encoded
    /// reply.
    ///
    /// Takes the next seqno whether or not the request decodes, so the
    /// requester can correlate every reply.
    pub fn handle_request(&mut self, raw: &[u8]) -> Vec<u8> {
        let id = self.context.id();
        let seqno = self.context.next_seqno();
        debug!(conn = %id, seqno, bytes = raw.len(), "request received");
        if self.verbosity.logs_contents() {
            trace!(conn = %id, seqno, contents = %String::from_utf8_lossy(raw), "request");
        }

        let (topic, decoded) = self.decode_request(raw);
        let (value, error) = match decoded {
            Ok(value) => (value, None),
            Err(e) => {
                warn!(conn = %id, seqno, error = %e, "request rejected");
                (Value::Nil, Some(e.to_string()))
            }
        };
        let reply = match &error {
            None => Reply::success(),
            Some(reason) => Reply::error(reason.clone()),
        };

        self.sink.notify(Notification {
            seqno,
            topic,
            value,
            error,
        });
        self.encode_reply(seqno, reply)
    }

    fn decode_request(&self, raw: &[u8]) -> (Option<String>, Result<Value, ProtocolError>) {
        if !self.framed_requests {
            return (None, parse_document(raw));
        }
        match unframe(raw) {
            Ok((topic, payload)) => (Some(topic.to_string()), parse_document(payload)),
            Err(e) => (None, Err(e)),
        }
    }

    fn encode_reply(&self, seqno: u64, reply: Reply) -> Vec<u8> {
        match self.codec.encode(&Envelope::new(Header::new(seqno), reply)) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(conn = %self.context.id(), seqno, error = %e, "reply encoding failed");
                fallback_reply(seqno)
            }
        }
    }

    /// Starts the receive loop on a new Tokio task.
    ///
    /// [`ListenerHandle::stop`] waits at most one receive timeout plus
    /// `stop_grace` for the loop to exit.
    pub fn spawn(self, stop_grace: Duration) -> ListenerHandle {
        let id = self.context.id();
        let port = self.context.port();
        let stop_timeout = self.socket.receive_timeout() + stop_grace;
        let stop = Arc::new(AtomicBool::new(false));
        let (state_tx, state_rx) = watch::channel(ListenerState::Bound);
        let task = tokio::spawn(self.run(Arc::clone(&stop), state_tx));
        ListenerHandle {
            id,
            port,
            stop,
            state: state_rx,
            task,
            stop_timeout,
        }
    }

    async fn run(mut self, stop: Arc<AtomicBool>, state: watch::Sender<ListenerState>) {
        let id = self.context.id();
        state.send_replace(ListenerState::Listening);
        info!(conn = %id, port = self.context.port(), "listener started");

        while !stop.load(Ordering::Acquire) {
            state.send_replace(ListenerState::Receiving);
            let raw = match self.socket.recv().await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!(conn = %id, error = %e, "receive failed");
                    tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                    continue;
                }
            };

            state.send_replace(ListenerState::Replying);
            let reply = self.handle_request(&raw);
            if let Err(e) = self.socket.send(reply).await {
                error!(conn = %id, error = %e, "failed to send reply");
            }
        }

        info!(conn = %id, handled = self.context.last_seqno(), "listener stopping");
        self.socket.close().await;
        state.send_replace(ListenerState::Stopped);
    }
}

/// Last-resort reply when the codec cannot encode a normal one.
fn fallback_reply(seqno: u64) -> Vec<u8> {
    format!(
        r#"{{"header":{{"seqno":{seqno}}},"data":{{"status":"ERROR","reason":"reply encoding failed"}}}}"#
    )
    .into_bytes()
}

/// Control handle for a spawned listener.
///
/// Dropping the handle requests a stop without waiting for it.
pub struct ListenerHandle {
    id: ConnectionId,
    port: u16,
    stop: Arc<AtomicBool>,
    state: watch::Receiver<ListenerState>,
    task: JoinHandle<()>,
    stop_timeout: Duration,
}

impl ListenerHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ListenerState> {
        self.state.clone()
    }

    /// How long [`stop`](Self::stop) waits before aborting the loop.
    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    /// Sets the stop flag without waiting.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stops the loop and waits for it to close its socket.
    ///
    /// # Errors
    /// [`BridgeError::StopTimedOut`] if the loop did not exit in time; the
    /// task is aborted in that case. [`BridgeError::ListenerFailed`] if the
    /// task panicked.
    pub async fn stop(mut self) -> Result<(), BridgeError> {
        self.request_stop();
        match tokio::time::timeout(self.stop_timeout, &mut self.task).await {
            Ok(Ok(())) => {
                debug!(conn = %self.id, "listener stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(conn = %self.id, error = %e, "listener task failed");
                Err(BridgeError::ListenerFailed(e.to_string()))
            }
            Err(_) => {
                self.task.abort();
                warn!(conn = %self.id, timeout = ?self.stop_timeout, "listener did not stop in time, aborted");
                Err(BridgeError::StopTimedOut(self.stop_timeout))
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.request_stop();
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .field("port", &self.port)
            .field("state", &self.state())
            .finish()
    }
}
