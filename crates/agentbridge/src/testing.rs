//! In-memory sockets for unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentbridge_transport::{PublishSocket, ReplySocket, TransportError};
use tokio::sync::mpsc;

/// Records every message instead of sending it.
pub(crate) struct MockPublishSocket {
    pub(crate) sent: Arc<Mutex<Vec<Vec<u8>>>>,
    pub(crate) fail: bool,
}

impl MockPublishSocket {
    pub(crate) fn new() -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let socket = Self {
            sent: Arc::clone(&sent),
            fail: false,
        };
        (socket, sent)
    }

    pub(crate) fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }
}

impl PublishSocket for MockPublishSocket {
    async fn send(&mut self, message: Vec<u8>) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::SendTimedOut(Duration::from_millis(1)));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn close(self) {}

    fn port(&self) -> u16 {
        10001
    }
}

/// Requests come from a channel; replies go to another.
pub(crate) struct MockReplySocket {
    requests: mpsc::UnboundedReceiver<Vec<u8>>,
    replies: mpsc::UnboundedSender<Vec<u8>>,
    timeout: Duration,
}

/// Test side of a [`MockReplySocket`].
pub(crate) struct MockPeer {
    pub(crate) requests: mpsc::UnboundedSender<Vec<u8>>,
    pub(crate) replies: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MockReplySocket {
    pub(crate) fn new(timeout: Duration) -> (Self, MockPeer) {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (rep_tx, rep_rx) = mpsc::unbounded_channel();
        let socket = Self {
            requests: req_rx,
            replies: rep_tx,
            timeout,
        };
        let peer = MockPeer {
            requests: req_tx,
            replies: rep_rx,
        };
        (socket, peer)
    }
}

impl MockPeer {
    /// Sends one request and waits for its reply.
    pub(crate) async fn request(&mut self, body: &[u8]) -> Vec<u8> {
        self.requests.send(body.to_vec()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), self.replies.recv())
            .await
            .expect("reply in time")
            .expect("socket alive")
    }
}

impl ReplySocket for MockReplySocket {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match tokio::time::timeout(self.timeout, self.requests.recv()).await {
            Ok(Some(request)) => Ok(Some(request)),
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Ok(None),
        }
    }

    async fn send(&mut self, reply: Vec<u8>) -> Result<(), TransportError> {
        self.replies.send(reply).map_err(|_| TransportError::Closed)
    }

    async fn close(self) {}

    fn port(&self) -> u16 {
        10002
    }

    fn receive_timeout(&self) -> Duration {
        self.timeout
    }
}
