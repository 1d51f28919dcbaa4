//! # agentbridge
//!
//! Bidirectional messaging between a host application's dynamic values and
//! external agents (scripts, learners, controllers) over ZeroMQ.
//!
//! - Outbound, the host publishes `topic SPACE json` frames on a PUB socket.
//!   Every envelope carries a per-connection sequence number.
//! - Inbound, a listener task answers REQ clients on a REP socket. Each
//!   request is handed to a [`NotificationSink`] and acknowledged with a
//!   SUCCESS or ERROR reply.
//!
//! [`Bridge`] manages one publisher/listener pair; [`ConnectionRegistry`]
//! manages any number of connections by id.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agentbridge::prelude::*;
//!
//! # async fn run() -> Result<(), BridgeError> {
//! let config = BridgeConfig::from_json(r#"{"publisher_port": 10001, "verbosity": 3}"#);
//! init_tracing(config.settings.verbosity);
//!
//! let (sink, mut requests) = tokio::sync::mpsc::unbounded_channel::<Notification>();
//! let mut bridge = Bridge::new(config);
//! bridge.connect(sink).await?;
//! bridge.send("state", &Value::from(1)).await;
//! # let _ = requests.recv().await;
//! bridge.disconnect().await
//! # }
//! ```

mod bridge;
mod config;
mod context;
mod error;
mod listener;
mod notify;
mod publisher;
mod registry;
#[cfg(test)]
mod testing;

pub use bridge::Bridge;
pub use config::{
    BridgeConfig, ConnectOptions, ConnectionSettings, Verbosity, DEFAULT_AGENT,
    DEFAULT_CONNECTION_PORT, DEFAULT_HOST, DEFAULT_LISTENER_PORT,
    DEFAULT_PUBLISHER_PORT, DEFAULT_STOP_GRACE,
};
pub use context::{ConnectionContext, ConnectionIds};
pub use error::BridgeError;
pub use listener::{Listener, ListenerHandle, ListenerState};
pub use notify::{Notification, NotificationSink};
pub use publisher::Publisher;
pub use registry::{ConnectionKind, ConnectionRegistry, RegisteredConnection};

pub use agentbridge_protocol as protocol;
pub use agentbridge_transport as transport;

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber filtered by `verbosity`.
///
/// `RUST_LOG`, when set, takes precedence. Returns `false` if a subscriber
/// was already installed.
pub fn init_tracing(verbosity: Verbosity) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(verbosity.level_filter().into()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Convenient re-exports for hosts.
///
/// ```rust
/// use agentbridge::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        init_tracing, Bridge, BridgeConfig, BridgeError, ConnectOptions,
        ConnectionRegistry, ListenerState, Notification, NotificationSink,
        Verbosity,
    };
    pub use agentbridge_protocol::{Dictionary, Value};
    pub use agentbridge_transport::ConnectionId;
}
