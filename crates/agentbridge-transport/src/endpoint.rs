//! Bind endpoints: protocol, interface, and port.

use std::fmt;
use std::str::FromStr;

use crate::TransportError;

/// Lowest port a connection may be configured with.
pub const PORT_MIN: u16 = 1024;
/// Highest port a connection may be configured with.
pub const PORT_MAX: u16 = 65535;

/// Transport protocol of an endpoint. Only TCP is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
        }
    }
}

impl FromStr for Protocol {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Self::Tcp),
            other => Err(TransportError::InvalidEndpoint(format!(
                "unsupported protocol {other:?}, only \"tcp\" is available"
            ))),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks a configured port against [`PORT_MIN`]..=[`PORT_MAX`].
///
/// Port 0 (let the OS choose) is not accepted here; it is only reachable by
/// building an [`Endpoint`] directly.
pub fn validate_port(port: i64) -> Result<u16, TransportError> {
    if (i64::from(PORT_MIN)..=i64::from(PORT_MAX)).contains(&port) {
        Ok(port as u16)
    } else {
        Err(TransportError::InvalidEndpoint(format!(
            "port {port} outside [{PORT_MIN}, {PORT_MAX}]"
        )))
    }
}

/// Where a socket binds, rendered as `tcp://host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// A TCP endpoint on the given interface and port.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            host: host.into(),
            port,
        }
    }

    /// The same endpoint with a different port (used after binding to
    /// port 0).
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        let ep = Endpoint::tcp("0.0.0.0", 10001);
        assert_eq!(ep.to_string(), "tcp://0.0.0.0:10001");
        assert_eq!(ep.with_port(10002).to_string(), "tcp://0.0.0.0:10002");
    }

    #[test]
    fn test_protocol_only_tcp() {
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert!("udp".parse::<Protocol>().is_err());
        assert!("TCP".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_validate_port_bounds_inclusive() {
        assert_eq!(validate_port(1024).unwrap(), 1024);
        assert_eq!(validate_port(65535).unwrap(), 65535);
        assert!(validate_port(1023).is_err());
        assert!(validate_port(65536).is_err());
        assert!(validate_port(-1).is_err());
    }
}
