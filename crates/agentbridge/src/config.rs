//! Bridge and connection configuration.
//!
//! Hosts hand the bridge a loosely-typed option mapping (a [`Value`]
//! dictionary, usually straight from a project setting or a JSON file).
//! Parsing never fails: every key that is missing keeps its default, and
//! every key that is present but unusable is reported with `warn!` and also
//! keeps its default.

use std::time::Duration;

use agentbridge_protocol::{parse_document, Dictionary, Value};
use agentbridge_transport::{
    validate_port, Endpoint, Protocol, SocketOptions,
};
use tracing::level_filters::LevelFilter;
use tracing::{debug, warn};

/// Port the controller's publisher binds to by default.
pub const DEFAULT_PUBLISHER_PORT: u16 = 10001;
/// Port the controller's listener binds to by default.
pub const DEFAULT_LISTENER_PORT: u16 = 10002;
/// Port a registry connection binds to by default.
pub const DEFAULT_CONNECTION_PORT: u16 = 9001;
/// Interface sockets bind to by default (all interfaces).
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Agent name a registry connection belongs to by default.
pub const DEFAULT_AGENT: &str = "default";
/// Extra time `stop()` allows on top of one receive timeout before it
/// gives up on the listener loop.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Verbosity
// ---------------------------------------------------------------------------

/// How much the bridge reports about itself.
///
/// Threaded through constructors rather than read from a global. The level
/// also selects the default `tracing` filter in
/// [`init_tracing`](crate::init_tracing). At [`Verbosity::Trace`] the
/// publisher and listener additionally log full message contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Verbosity {
    Silent = 0,
    Error = 1,
    #[default]
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl Verbosity {
    /// Maps the host's 0-4 verbosity scale. Out-of-range levels are `None`.
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Self::Silent),
            1 => Some(Self::Error),
            2 => Some(Self::Info),
            3 => Some(Self::Debug),
            4 => Some(Self::Trace),
            _ => None,
        }
    }

    /// The most verbose `tracing` level this setting lets through.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Silent => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }

    /// Whether message bodies should be written to the log.
    pub fn logs_contents(self) -> bool {
        self >= Self::Trace
    }
}

// ---------------------------------------------------------------------------
// ConnectionSettings
// ---------------------------------------------------------------------------

/// Settings shared by the controller and by registry connections.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub protocol: Protocol,
    /// Interface to bind on.
    pub host: String,
    /// Options for publishing sockets.
    pub publisher_options: SocketOptions,
    /// Options for listener (reply) sockets.
    pub listener_options: SocketOptions,
    pub verbosity: Verbosity,
    /// Add `header.time` (milliseconds since the Unix epoch) to published
    /// envelopes.
    pub timestamps: bool,
    /// Expect `topic SPACE json` requests instead of bare JSON.
    pub framed_requests: bool,
    /// See [`DEFAULT_STOP_GRACE`].
    pub stop_grace: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            protocol: Protocol::Tcp,
            host: DEFAULT_HOST.to_string(),
            publisher_options: SocketOptions::publisher(),
            listener_options: SocketOptions::listener(),
            verbosity: Verbosity::default(),
            timestamps: false,
            framed_requests: false,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

impl ConnectionSettings {
    /// Endpoint on the configured interface for `port`.
    pub fn endpoint(&self, port: u16) -> Endpoint {
        Endpoint {
            protocol: self.protocol,
            host: self.host.clone(),
            port,
        }
    }

    /// Reads the keys shared by every option mapping.
    fn read(&mut self, options: &Dictionary) {
        if let Some(level) = read_int(options, "verbosity") {
            match Verbosity::from_level(level) {
                Some(verbosity) => self.verbosity = verbosity,
                None => warn!(level, "verbosity must be 0-4, keeping default"),
            }
        }
        if let Some(protocol) = read_str(options, "protocol") {
            match protocol.parse() {
                Ok(protocol) => self.protocol = protocol,
                Err(e) => warn!(error = %e, "protocol rejected, keeping default"),
            }
        }
        if let Some(host) = read_str(options, "host") {
            if host.is_empty() {
                warn!("host is empty, keeping default");
            } else {
                self.host = host.to_string();
            }
        }
        if let Some(socket_options) = options.get_str("socket_options") {
            self.read_socket_options(socket_options);
        }
        if let Some(on) = read_bool(options, "timestamps") {
            self.timestamps = on;
        }
        if let Some(on) = read_bool(options, "framed_requests") {
            self.framed_requests = on;
        }
        if let Some(ms) = read_int(options, "stop_grace_ms") {
            match u64::try_from(ms) {
                Ok(ms) => self.stop_grace = Duration::from_millis(ms),
                Err(_) => warn!(ms, "stop_grace_ms must be >= 0, keeping default"),
            }
        }
    }

    /// Applies a `{ "ZMQ_*": int }` mapping to both socket roles.
    fn read_socket_options(&mut self, value: &Value) {
        let Value::Dictionary(entries) = value else {
            warn!(kind = %value.kind(), "socket_options must be a dictionary, ignoring");
            return;
        };
        for (name, raw) in entries.iter() {
            let Some(name) = name.as_str() else {
                warn!(kind = %name.kind(), "socket option names must be strings, skipping");
                continue;
            };
            let Some(raw) = as_integer(raw) else {
                warn!(option = name, kind = %raw.kind(), "socket option value must be an integer, skipping");
                continue;
            };
            match self.publisher_options.set_by_name(name, raw) {
                Ok(()) => debug!(option = name, value = raw, role = "publish", "custom socket option applied"),
                Err(e) => warn!(error = %e, role = "publish", "socket option rejected, keeping default"),
            }
            match self.listener_options.set_by_name(name, raw) {
                Ok(()) => debug!(option = name, value = raw, role = "reply", "custom socket option applied"),
                Err(e) => warn!(error = %e, role = "reply", "socket option rejected, keeping default"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BridgeConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Bridge`](crate::Bridge): one publisher port, one
/// listener port.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub publisher_port: u16,
    pub listener_port: u16,
    pub settings: ConnectionSettings,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            publisher_port: DEFAULT_PUBLISHER_PORT,
            listener_port: DEFAULT_LISTENER_PORT,
            settings: ConnectionSettings::default(),
        }
    }
}

impl BridgeConfig {
    /// Builds a config from the host's option mapping.
    ///
    /// Recognized keys: `publisher_port`, `listener_port`, `host`,
    /// `protocol`, `socket_options`, `verbosity`, `timestamps`,
    /// `framed_requests`, `stop_grace_ms`. `Nil` means "all defaults".
    pub fn from_options(options: &Value) -> Self {
        let mut config = Self::default();
        let Some(options) = options_dictionary(options) else {
            return config;
        };
        config.settings.read(options);
        if let Some(port) = read_port(options, "publisher_port") {
            config.publisher_port = port;
        }
        if let Some(port) = read_port(options, "listener_port") {
            config.listener_port = port;
        }
        if config.publisher_port == config.listener_port {
            warn!(
                port = config.publisher_port,
                "publisher and listener share a port, the second bind will fail"
            );
        }
        config
    }

    /// Builds a config from a JSON object. Text that does not parse gives
    /// the defaults.
    pub fn from_json(text: &str) -> Self {
        match parse_document(text.as_bytes()) {
            Ok(options) => Self::from_options(&options),
            Err(e) => {
                warn!(error = %e, "configuration is not valid JSON, using defaults");
                Self::default()
            }
        }
    }

    pub fn publisher_endpoint(&self) -> Endpoint {
        self.settings.endpoint(self.publisher_port)
    }

    pub fn listener_endpoint(&self) -> Endpoint {
        self.settings.endpoint(self.listener_port)
    }
}

// ---------------------------------------------------------------------------
// ConnectOptions
// ---------------------------------------------------------------------------

/// Options for one connection created through the
/// [`ConnectionRegistry`](crate::ConnectionRegistry).
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    /// Name of the agent the connection serves. Used in logs.
    pub agent: String,
    pub port: u16,
    pub settings: ConnectionSettings,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            agent: DEFAULT_AGENT.to_string(),
            port: DEFAULT_CONNECTION_PORT,
            settings: ConnectionSettings::default(),
        }
    }
}

impl ConnectOptions {
    /// Builds connect options from the host's option mapping.
    ///
    /// Recognized keys: `agent`, `port`, and the shared keys listed on
    /// [`BridgeConfig::from_options`].
    pub fn from_options(options: &Value) -> Self {
        let mut connect = Self::default();
        let Some(options) = options_dictionary(options) else {
            return connect;
        };
        connect.settings.read(options);
        if let Some(agent) = read_str(options, "agent") {
            connect.agent = agent.to_string();
        }
        if let Some(port) = read_port(options, "port") {
            connect.port = port;
        }
        connect
    }

    /// Builds connect options from a JSON object. Text that does not parse
    /// gives the defaults.
    pub fn from_json(text: &str) -> Self {
        match parse_document(text.as_bytes()) {
            Ok(options) => Self::from_options(&options),
            Err(e) => {
                warn!(error = %e, "connect options are not valid JSON, using defaults");
                Self::default()
            }
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.settings.endpoint(self.port)
    }
}

// ---------------------------------------------------------------------------
// Option readers
// ---------------------------------------------------------------------------

fn options_dictionary(options: &Value) -> Option<&Dictionary> {
    match options {
        Value::Dictionary(options) => Some(options),
        Value::Nil => None,
        other => {
            warn!(kind = %other.kind(), "options must be a dictionary, using defaults");
            None
        }
    }
}

/// Integers, and floats with no fractional part (JSON tools often write
/// `1000.0`).
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Some(*f as i64)
        }
        _ => None,
    }
}

fn read_int(options: &Dictionary, key: &str) -> Option<i64> {
    let value = options.get_str(key)?;
    let int = as_integer(value);
    if int.is_none() {
        warn!(key, kind = %value.kind(), "expected an integer, keeping default");
    }
    int
}

fn read_port(options: &Dictionary, key: &str) -> Option<u16> {
    let raw = read_int(options, key)?;
    match validate_port(raw) {
        Ok(port) => Some(port),
        Err(e) => {
            warn!(key, error = %e, "port rejected, keeping default");
            None
        }
    }
}

fn read_bool(options: &Dictionary, key: &str) -> Option<bool> {
    match options.get_str(key)? {
        Value::Bool(b) => Some(*b),
        Value::Int(0) => Some(false),
        Value::Int(1) => Some(true),
        other => {
            warn!(key, kind = %other.kind(), "expected a bool, keeping default");
            None
        }
    }
}

fn read_str<'a>(options: &'a Dictionary, key: &str) -> Option<&'a str> {
    let value = options.get_str(key)?;
    let text = value.as_str();
    if text.is_none() {
        warn!(key, kind = %value.kind(), "expected a string, keeping default");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(json: &str) -> Value {
        parse_document(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.publisher_port, 10001);
        assert_eq!(config.listener_port, 10002);
        assert_eq!(config.settings.host, "0.0.0.0");
        assert_eq!(config.settings.verbosity, Verbosity::Info);
        assert!(!config.settings.timestamps);
        assert!(!config.settings.framed_requests);
        assert_eq!(
            config.publisher_endpoint().to_string(),
            "tcp://0.0.0.0:10001"
        );
        assert_eq!(config.listener_endpoint().to_string(), "tcp://0.0.0.0:10002");
    }

    #[test]
    fn test_nil_options_give_defaults() {
        assert_eq!(BridgeConfig::from_options(&Value::Nil), BridgeConfig::default());
        assert_eq!(ConnectOptions::from_options(&Value::Nil), ConnectOptions::default());
    }

    #[test]
    fn test_non_dictionary_options_give_defaults() {
        let config = BridgeConfig::from_options(&Value::from(5));
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_reads_ports_and_flags() {
        let config = BridgeConfig::from_options(&options(
            r#"{"publisher_port": 11001, "listener_port": 11002,
                "verbosity": 4, "timestamps": true, "framed_requests": 1,
                "host": "127.0.0.1", "stop_grace_ms": 50}"#,
        ));
        assert_eq!(config.publisher_port, 11001);
        assert_eq!(config.listener_port, 11002);
        assert_eq!(config.settings.verbosity, Verbosity::Trace);
        assert!(config.settings.timestamps);
        assert!(config.settings.framed_requests);
        assert_eq!(config.settings.host, "127.0.0.1");
        assert_eq!(config.settings.stop_grace, Duration::from_millis(50));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = BridgeConfig::from_options(&options(
            r#"{"publisher_port": 80, "listener_port": "high",
                "verbosity": 9, "protocol": "udp", "host": "",
                "timestamps": "yes", "stop_grace_ms": -1}"#,
        ));
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_whole_float_port_accepted() {
        let config =
            BridgeConfig::from_options(&options(r#"{"publisher_port": 12000.0}"#));
        assert_eq!(config.publisher_port, 12000);
    }

    #[test]
    fn test_socket_options_apply_to_both_roles() {
        let config = BridgeConfig::from_options(&options(
            r#"{"socket_options": {"ZMQ_RCVTIMEO": 250, "ZMQ_SNDHWM": 50}}"#,
        ));
        let settings = &config.settings;
        assert_eq!(
            settings.listener_options.receive_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(
            settings.publisher_options.receive_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(settings.publisher_options.send_high_water_mark, Some(50));
        assert_eq!(settings.listener_options.send_high_water_mark, Some(50));
        // Untouched role defaults survive.
        assert_eq!(settings.listener_options.receive_high_water_mark, Some(10));
    }

    #[test]
    fn test_socket_options_rejects_unknown_and_invalid() {
        let config = BridgeConfig::from_options(&options(
            r#"{"socket_options": {"ZMQ_AFFINITY": 1, "ZMQ_RCVTIMEO": 0,
                                   "ZMQ_CONFLATE": "on", "ZMQ_LINGER": -1}}"#,
        ));
        let listener = &config.settings.listener_options;
        assert_eq!(listener.receive_timeout, Duration::from_millis(1000));
        assert!(!listener.conflate);
        assert_eq!(listener.linger, None);
        let publisher = &config.settings.publisher_options;
        assert_eq!(publisher.receive_timeout, Duration::from_millis(1000));
        assert!(!publisher.conflate);
        assert_eq!(publisher.linger, None);
    }

    #[test]
    fn test_connect_options() {
        let connect = ConnectOptions::from_options(&options(
            r#"{"agent": "scout", "port": 9100, "verbosity": 0}"#,
        ));
        assert_eq!(connect.agent, "scout");
        assert_eq!(connect.port, 9100);
        assert_eq!(connect.settings.verbosity, Verbosity::Silent);
        assert_eq!(connect.endpoint().to_string(), "tcp://0.0.0.0:9100");
    }

    #[test]
    fn test_from_json_bad_text_gives_defaults() {
        assert_eq!(BridgeConfig::from_json("{oops"), BridgeConfig::default());
        assert_eq!(ConnectOptions::from_json(""), ConnectOptions::default());
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(Verbosity::from_level(0), Some(Verbosity::Silent));
        assert_eq!(Verbosity::from_level(4), Some(Verbosity::Trace));
        assert_eq!(Verbosity::from_level(5), None);
        assert_eq!(Verbosity::from_level(-1), None);
        assert_eq!(Verbosity::Silent.level_filter(), LevelFilter::OFF);
        assert_eq!(Verbosity::Debug.level_filter(), LevelFilter::DEBUG);
        assert!(Verbosity::Trace.logs_contents());
        assert!(!Verbosity::Debug.logs_contents());
    }
}
