//! The [`Bridge`] controller: one publisher and one listener, as the host
//! sees them.
//!
//! ```text
//! host ─send(topic, value)→ Publisher ─PUB→ subscribers
//! requesters ─REQ→ Listener task ─notify→ host sink
//! ```

use agentbridge_protocol::Value;
use tracing::{error, info, warn};

use crate::config::BridgeConfig;
use crate::context::ConnectionIds;
use crate::listener::{Listener, ListenerHandle, ListenerState};
use crate::notify::NotificationSink;
use crate::publisher::Publisher;
use crate::BridgeError;

/// Sockets held while connected.
struct Connected {
    publisher: Publisher,
    listener: ListenerHandle,
}

/// Owns the publisher and listener on behalf of the host.
///
/// # Example
///
/// ```rust,no_run
/// use agentbridge::prelude::*;
///
/// # async fn run() -> Result<(), BridgeError> {
/// let (sink, mut requests) = tokio::sync::mpsc::unbounded_channel::<Notification>();
/// let mut bridge = Bridge::new(BridgeConfig::default());
/// bridge.connect(sink).await?;
///
/// bridge.send("state", &Value::from("ready")).await;
/// if let Some(request) = requests.recv().await {
///     println!("request {}: {:?}", request.seqno, request.value);
/// }
/// bridge.disconnect().await
/// # }
/// ```
pub struct Bridge {
    config: BridgeConfig,
    ids: ConnectionIds,
    connection: Option<Connected>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            ids: ConnectionIds::new(),
            connection: None,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Binds the publisher, then the listener, and starts the listener
    /// loop. Requests are delivered to `sink`.
    ///
    /// If either bind fails, whatever was already bound is closed and the
    /// bridge stays disconnected.
    ///
    /// # Errors
    /// [`BridgeError::AlreadyConnected`], or the bind error.
    pub async fn connect<N: NotificationSink>(&mut self, sink: N) -> Result<(), BridgeError> {
        if self.connection.is_some() {
            warn!("connect called while already connected");
            return Err(BridgeError::AlreadyConnected);
        }
        let settings = &self.config.settings;

        let publisher = match Publisher::bind(
            self.ids.allocate(),
            &self.config.publisher_endpoint(),
            settings.publisher_options.clone(),
        )
        .await
        {
            Ok(publisher) => publisher
                .with_timestamps(settings.timestamps)
                .with_verbosity(settings.verbosity),
            Err(e) => {
                error!(error = %e, "publisher bind failed");
                return Err(e);
            }
        };

        let listener = match Listener::bind(
            self.ids.allocate(),
            &self.config.listener_endpoint(),
            settings.listener_options.clone(),
            sink,
        )
        .await
        {
            Ok(listener) => listener
                .with_framed_requests(settings.framed_requests)
                .with_verbosity(settings.verbosity),
            Err(e) => {
                error!(error = %e, "listener bind failed, releasing publisher");
                publisher.close().await;
                return Err(e);
            }
        };

        let listener = listener.spawn(settings.stop_grace);
        info!(
            publisher_port = publisher.port(),
            listener_port = listener.port(),
            "bridge connected"
        );
        self.connection = Some(Connected {
            publisher,
            listener,
        });
        Ok(())
    }

    /// Publishes `value` under `topic`. Fire-and-forget: failures are
    /// logged and the message is dropped.
    pub async fn send(&mut self, topic: &str, value: &Value) {
        match self.connection.as_mut() {
            Some(connected) => {
                // Already logged by the publisher.
                let _ = connected.publisher.publish(topic, value).await;
            }
            None => warn!(topic, "send while not connected, message dropped"),
        }
    }

    /// Stops the listener loop and closes both sockets.
    ///
    /// The sockets are released even when the listener has to be aborted.
    ///
    /// # Errors
    /// [`BridgeError::NotConnected`], or the listener's stop error.
    pub async fn disconnect(&mut self) -> Result<(), BridgeError> {
        let Some(Connected {
            publisher,
            listener,
        }) = self.connection.take()
        else {
            return Err(BridgeError::NotConnected);
        };
        let stopped = listener.stop().await;
        publisher.close().await;
        info!("bridge disconnected");
        stopped
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The publisher's bound port while connected.
    pub fn publisher_port(&self) -> Option<u16> {
        self.connection.as_ref().map(|c| c.publisher.port())
    }

    /// The listener's bound port while connected.
    pub fn listener_port(&self) -> Option<u16> {
        self.connection.as_ref().map(|c| c.listener.port())
    }

    pub fn listener_state(&self) -> Option<ListenerState> {
        self.connection.as_ref().map(|c| c.listener.state())
    }

    /// Sequence number of the last publish, `None` while disconnected.
    pub fn last_published_seqno(&self) -> Option<u64> {
        self.connection.as_ref().map(|c| c.publisher.last_seqno())
    }
}
