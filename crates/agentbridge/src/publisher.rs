//! Outbound side: marshal, envelope, frame, send.

use agentbridge_protocol::{
    frame, marshal, validate_topic, Codec, Envelope, Header, JsonCodec, Value,
};
use agentbridge_transport::{
    ConnectionId, Endpoint, PublishSocket, SocketOptions, SocketRole,
    ZmqPublishSocket,
};
use tracing::{debug, error, trace, warn};

use crate::config::Verbosity;
use crate::context::ConnectionContext;
use crate::BridgeError;

/// Publishes host values to every subscriber of a PUB socket.
///
/// Each message on the wire is `topic SPACE {"header":{"seqno":N},"data":…}`.
/// Sequence numbers start at 1 and increase by one per publish attempt that
/// got as far as the wire, so a subscriber that sees a gap knows a message
/// was dropped.
pub struct Publisher<S: PublishSocket = ZmqPublishSocket, C: Codec = JsonCodec> {
    context: ConnectionContext,
    socket: S,
    codec: C,
    timestamps: bool,
    verbosity: Verbosity,
}

impl Publisher {
    /// Binds a ZeroMQ PUB socket and wraps it.
    pub async fn bind(
        id: ConnectionId,
        endpoint: &Endpoint,
        options: SocketOptions,
    ) -> Result<Self, BridgeError> {
        let socket = ZmqPublishSocket::bind(endpoint, options).await?;
        Ok(Self::new(id, socket, JsonCodec))
    }
}

impl<S: PublishSocket, C: Codec> Publisher<S, C> {
    pub fn new(id: ConnectionId, socket: S, codec: C) -> Self {
        Self {
            context: ConnectionContext::new(id, SocketRole::Publish, socket.port()),
            socket,
            codec,
            timestamps: false,
            verbosity: Verbosity::default(),
        }
    }

    /// Stamp each envelope header with the publish time.
    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    pub fn id(&self) -> ConnectionId {
        self.context.id()
    }

    pub fn port(&self) -> u16 {
        self.context.port()
    }

    /// Sequence number of the most recent publish, 0 before the first.
    pub fn last_seqno(&self) -> u64 {
        self.context.last_seqno()
    }

    /// Publishes `content` under `topic` and returns its sequence number.
    ///
    /// Never blocks longer than the socket's send timeout. Every failure is
    /// logged here and the message is dropped; nothing is retried.
    ///
    /// # Errors
    /// - [`ProtocolError::InvalidTopic`](agentbridge_protocol::ProtocolError::InvalidTopic)
    ///   or an unsupported value: nothing was sent and no sequence number
    ///   was used.
    /// - A transport error: the sequence number was used, so subscribers
    ///   will see a gap.
    pub async fn publish(
        &mut self,
        topic: &str,
        content: &Value,
    ) -> Result<u64, BridgeError> {
        let id = self.context.id();
        if let Err(e) = validate_topic(topic) {
            warn!(conn = %id, topic, error = %e, "publish rejected");
            return Err(e.into());
        }
        let data = match marshal(content) {
            Ok(data) => data,
            Err(e) => {
                warn!(conn = %id, topic, error = %e, "publish rejected");
                return Err(e.into());
            }
        };

        let seqno = self.context.next_seqno();
        let header = if self.timestamps {
            Header::stamped(seqno)
        } else {
            Header::new(seqno)
        };
        let payload = self.codec.encode(&Envelope::new(header, data))?;
        let message = frame(topic, &payload)?;

        if self.verbosity.logs_contents() {
            trace!(conn = %id, seqno, contents = %String::from_utf8_lossy(&message), "publishing");
        }

        match self.socket.send(message).await {
            Ok(()) => {
                debug!(conn = %id, seqno, topic, bytes = payload.len(), "published");
                Ok(seqno)
            }
            Err(e) => {
                error!(conn = %id, seqno, topic, error = %e, "publish failed, message dropped");
                Err(e.into())
            }
        }
    }

    /// Closes the underlying socket.
    pub async fn close(self) {
        debug!(conn = %self.context.id(), "closing publisher");
        self.socket.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPublishSocket;
    use agentbridge_protocol::{unframe, Dictionary, Document, ProtocolError};
    use serde_json::json;

    fn publisher() -> (
        Publisher<MockPublishSocket>,
        std::sync::Arc<std::sync::Mutex<Vec<Vec<u8>>>>,
    ) {
        let (socket, sent) = MockPublishSocket::new();
        (Publisher::new(ConnectionId::new(1), socket, JsonCodec), sent)
    }

    fn decode(message: &[u8]) -> (String, Document) {
        let (topic, payload) = unframe(message).unwrap();
        (topic.to_string(), serde_json::from_slice(payload).unwrap())
    }

    #[tokio::test]
    async fn test_publish_frames_and_numbers() {
        let (mut publisher, sent) = publisher();
        let mut content = Dictionary::new();
        content.insert("pos", Value::Array(vec![Value::from(1.5), Value::from(2.0)]));
        content.insert("alive", true);

        assert_eq!(publisher.publish("state", &content.into()).await.unwrap(), 1);
        assert_eq!(publisher.publish("state", &Value::from(3)).await.unwrap(), 2);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        let (topic, doc) = decode(&sent[0]);
        assert_eq!(topic, "state");
        assert_eq!(
            doc,
            json!({"header": {"seqno": 1}, "data": {"pos": [1.5, 2.0], "alive": true}})
        );
        let (_, doc) = decode(&sent[1]);
        assert_eq!(doc, json!({"header": {"seqno": 2}, "data": 3}));
    }

    #[tokio::test]
    async fn test_wire_bytes_are_exact() {
        let (mut publisher, sent) = publisher();
        let mut state = Dictionary::new();
        state.insert("hp", 100);
        state.insert("pos", Value::Array(vec![Value::from(1.5), Value::from(2.0)]));
        let state = Value::Dictionary(state);

        assert_eq!(publisher.publish("state", &state).await.unwrap(), 1);
        assert_eq!(publisher.publish("state", &state).await.unwrap(), 2);
        let sent = sent.lock().unwrap();
        assert_eq!(
            sent[0],
            br#"state {"header":{"seqno":1},"data":{"hp":100,"pos":[1.5,2.0]}}"#
        );
        assert!(sent[1].starts_with(br#"state {"header":{"seqno":2},"#));
    }

    #[tokio::test]
    async fn test_invalid_topic_uses_no_seqno() {
        let (mut publisher, sent) = publisher();
        let err = publisher.publish("", &Value::Nil).await.unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(ProtocolError::InvalidTopic(_))));
        let err = publisher.publish("two words", &Value::Nil).await.unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(ProtocolError::InvalidTopic(_))));
        assert_eq!(publisher.last_seqno(), 0);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_value_uses_no_seqno() {
        let (mut publisher, sent) = publisher();
        let err = publisher
            .publish("state", &Value::Other { kind: "Object".into() })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Protocol(ProtocolError::UnsupportedType { .. })
        ));
        assert_eq!(publisher.last_seqno(), 0);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_drops_and_consumes_seqno() {
        let mut publisher = Publisher::new(
            ConnectionId::new(1),
            MockPublishSocket::failing(),
            JsonCodec,
        );
        let err = publisher.publish("state", &Value::Nil).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
        assert_eq!(publisher.last_seqno(), 1);
    }

    #[tokio::test]
    async fn test_timestamps_add_header_time() {
        let (socket, sent) = MockPublishSocket::new();
        let mut publisher =
            Publisher::new(ConnectionId::new(1), socket, JsonCodec).with_timestamps(true);
        publisher.publish("state", &Value::Nil).await.unwrap();
        let (_, doc) = decode(&sent.lock().unwrap()[0]);
        assert!(doc["header"]["time"].as_u64().unwrap() > 0);
        assert_eq!(doc["header"]["seqno"], 1);
    }
}
