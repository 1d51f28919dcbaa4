//! The connection registry: any number of publishers and listeners, each
//! behind a [`ConnectionId`].
//!
//! Where [`Bridge`](crate::Bridge) manages exactly one publisher/listener
//! pair, the registry lets a host open one connection per agent and address
//! each by id.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is owned by a single task and uses a plain
//! `HashMap`. Hosts that share it across tasks wrap it in a
//! `tokio::sync::Mutex`.

use std::collections::HashMap;

use agentbridge_protocol::Value;
use agentbridge_transport::{ConnectionId, SocketRole};
use tracing::{info, warn};

use crate::config::ConnectOptions;
use crate::context::ConnectionIds;
use crate::listener::{Listener, ListenerHandle};
use crate::notify::NotificationSink;
use crate::publisher::Publisher;
use crate::BridgeError;

/// The socket half of a registry entry.
pub enum ConnectionKind {
    Publisher(Publisher),
    Listener(ListenerHandle),
}

/// One live connection in the registry.
pub struct RegisteredConnection {
    agent: String,
    kind: ConnectionKind,
}

impl RegisteredConnection {
    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn kind(&self) -> &ConnectionKind {
        &self.kind
    }

    pub fn role(&self) -> SocketRole {
        match self.kind {
            ConnectionKind::Publisher(_) => SocketRole::Publish,
            ConnectionKind::Listener(_) => SocketRole::Reply,
        }
    }

    pub fn port(&self) -> u16 {
        match &self.kind {
            ConnectionKind::Publisher(publisher) => publisher.port(),
            ConnectionKind::Listener(listener) => listener.port(),
        }
    }

    /// Closes the publisher, or stops the listener and waits for it.
    pub async fn shutdown(self) -> Result<(), BridgeError> {
        match self.kind {
            ConnectionKind::Publisher(publisher) => {
                publisher.close().await;
                Ok(())
            }
            ConnectionKind::Listener(listener) => listener.stop().await,
        }
    }
}

/// Tracks every connection a host has opened.
///
/// Ids are allocated by the registry itself, start at 1, and are never
/// reused, so a stale id can only ever miss.
#[derive(Default)]
pub struct ConnectionRegistry {
    ids: ConnectionIds,
    connections: HashMap<ConnectionId, RegisteredConnection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a publisher per `options` and registers it.
    ///
    /// Nothing is registered if the bind fails.
    pub async fn register_publisher(
        &mut self,
        options: &ConnectOptions,
    ) -> Result<ConnectionId, BridgeError> {
        let id = self.ids.allocate();
        let settings = &options.settings;
        let publisher = Publisher::bind(
            id,
            &options.endpoint(),
            settings.publisher_options.clone(),
        )
        .await
        .inspect_err(|e| warn!(agent = %options.agent, error = %e, "publisher registration failed"))?
        .with_timestamps(settings.timestamps)
        .with_verbosity(settings.verbosity);

        info!(%id, agent = %options.agent, port = publisher.port(), "publisher registered");
        self.insert(id, &options.agent, ConnectionKind::Publisher(publisher));
        Ok(id)
    }

    /// Binds a listener per `options`, starts its loop, and registers it.
    ///
    /// Nothing is registered if the bind fails.
    pub async fn register_listener<N: NotificationSink>(
        &mut self,
        options: &ConnectOptions,
        sink: N,
    ) -> Result<ConnectionId, BridgeError> {
        let id = self.ids.allocate();
        let settings = &options.settings;
        let listener = Listener::bind(
            id,
            &options.endpoint(),
            settings.listener_options.clone(),
            sink,
        )
        .await
        .inspect_err(|e| warn!(agent = %options.agent, error = %e, "listener registration failed"))?
        .with_framed_requests(settings.framed_requests)
        .with_verbosity(settings.verbosity)
        .spawn(settings.stop_grace);

        info!(%id, agent = %options.agent, port = listener.port(), "listener registered");
        self.insert(id, &options.agent, ConnectionKind::Listener(listener));
        Ok(id)
    }

    fn insert(&mut self, id: ConnectionId, agent: &str, kind: ConnectionKind) {
        self.connections.insert(
            id,
            RegisteredConnection {
                agent: agent.to_string(),
                kind,
            },
        );
    }

    pub fn get(&self, id: ConnectionId) -> Option<&RegisteredConnection> {
        self.connections.get(&id)
    }

    /// Publishes on the publisher registered as `id`.
    ///
    /// # Errors
    /// [`BridgeError::UnknownConnection`], [`BridgeError::WrongRole`] for a
    /// listener id, or the publish error.
    pub async fn send(
        &mut self,
        id: ConnectionId,
        topic: &str,
        value: &Value,
    ) -> Result<u64, BridgeError> {
        let entry = self
            .connections
            .get_mut(&id)
            .ok_or(BridgeError::UnknownConnection(id))?;
        match &mut entry.kind {
            ConnectionKind::Publisher(publisher) => publisher.publish(topic, value).await,
            ConnectionKind::Listener(_) => Err(BridgeError::WrongRole {
                id,
                expected: SocketRole::Publish,
                actual: SocketRole::Reply,
            }),
        }
    }

    /// Unregisters `id` without closing it. The caller owns the connection
    /// afterwards.
    pub fn remove(&mut self, id: ConnectionId) -> Option<RegisteredConnection> {
        self.connections.remove(&id)
    }

    /// Unregisters `id` and shuts it down.
    pub async fn close(&mut self, id: ConnectionId) -> Result<(), BridgeError> {
        let entry = self.remove(id).ok_or(BridgeError::UnknownConnection(id))?;
        info!(%id, agent = %entry.agent, "closing connection");
        entry.shutdown().await
    }

    /// Shuts every connection down. Failures are logged, not returned.
    pub async fn close_all(&mut self) {
        for id in self.ids() {
            if let Err(e) = self.close(id).await {
                warn!(%id, error = %e, "connection did not close cleanly");
            }
        }
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.connections.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
