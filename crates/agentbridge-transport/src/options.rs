//! Socket options and the allow-list of names a host may configure.
//!
//! Hosts pass options as a mapping of ZeroMQ option names to integers
//! (`{"ZMQ_RCVTIMEO": 500}`). Only the names in [`SocketOption::ALL`] are
//! recognized; everything else is rejected so a typo never silently does
//! nothing.

use std::fmt;
use std::time::Duration;

use crate::TransportError;

/// Default receive and send timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default queue depth for the side of the socket that matters (send for a
/// publisher, receive for a listener).
pub const DEFAULT_HIGH_WATER_MARK: u32 = 10;

/// A configurable socket option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketOption {
    ReceiveHighWaterMark,
    ReceiveTimeout,
    SendHighWaterMark,
    SendTimeout,
    Conflate,
    Linger,
}

impl SocketOption {
    /// Every recognized option.
    pub const ALL: [Self; 6] = [
        Self::ReceiveHighWaterMark,
        Self::ReceiveTimeout,
        Self::SendHighWaterMark,
        Self::SendTimeout,
        Self::Conflate,
        Self::Linger,
    ];

    /// The ZeroMQ name used in host configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReceiveHighWaterMark => "ZMQ_RCVHWM",
            Self::ReceiveTimeout => "ZMQ_RCVTIMEO",
            Self::SendHighWaterMark => "ZMQ_SNDHWM",
            Self::SendTimeout => "ZMQ_SNDTIMEO",
            Self::Conflate => "ZMQ_CONFLATE",
            Self::Linger => "ZMQ_LINGER",
        }
    }

    /// Looks up an option by its ZeroMQ name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|opt| opt.name() == name)
    }
}

impl fmt::Display for SocketOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options applied to one socket at bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOptions {
    /// Inbound queue depth. `None` leaves the transport default.
    pub receive_high_water_mark: Option<u32>,
    /// How long one receive call waits before reporting "nothing yet".
    /// Always bounded: the listener relies on it to notice stop requests.
    pub receive_timeout: Duration,
    /// Outbound queue depth. `None` leaves the transport default.
    pub send_high_water_mark: Option<u32>,
    /// How long one send call may block before the message is dropped.
    pub send_timeout: Duration,
    /// Keep only the most recent message in the queue.
    pub conflate: bool,
    /// How long close waits for pending messages. `None` waits until done.
    pub linger: Option<Duration>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            receive_high_water_mark: None,
            receive_timeout: DEFAULT_TIMEOUT,
            send_high_water_mark: None,
            send_timeout: DEFAULT_TIMEOUT,
            conflate: false,
            linger: Some(Duration::ZERO),
        }
    }
}

impl SocketOptions {
    /// Defaults for a publishing socket.
    pub fn publisher() -> Self {
        Self {
            send_high_water_mark: Some(DEFAULT_HIGH_WATER_MARK),
            ..Self::default()
        }
    }

    /// Defaults for a reply (listener) socket.
    pub fn listener() -> Self {
        Self {
            receive_high_water_mark: Some(DEFAULT_HIGH_WATER_MARK),
            ..Self::default()
        }
    }

    /// Sets one option from its raw integer value, using ZeroMQ units
    /// (milliseconds for timeouts and linger, 0/1 for conflate).
    ///
    /// # Errors
    /// [`TransportError::InvalidOption`] if the value is out of range for
    /// the option. The options are left unchanged in that case.
    pub fn set(
        &mut self,
        option: SocketOption,
        value: i64,
    ) -> Result<(), TransportError> {
        let invalid = |why: &str| {
            TransportError::InvalidOption(format!("{option}={value}: {why}"))
        };
        match option {
            SocketOption::ReceiveHighWaterMark => {
                self.receive_high_water_mark =
                    Some(u32::try_from(value).map_err(|_| invalid("must be >= 0"))?);
            }
            SocketOption::SendHighWaterMark => {
                self.send_high_water_mark =
                    Some(u32::try_from(value).map_err(|_| invalid("must be >= 0"))?);
            }
            SocketOption::ReceiveTimeout => {
                if value <= 0 {
                    return Err(invalid("receive timeout must be positive"));
                }
                self.receive_timeout = Duration::from_millis(value as u64);
            }
            SocketOption::SendTimeout => {
                if value < 0 {
                    return Err(invalid("send timeout must be bounded"));
                }
                self.send_timeout = Duration::from_millis(value as u64);
            }
            SocketOption::Conflate => {
                self.conflate = match value {
                    0 => false,
                    1 => true,
                    _ => return Err(invalid("must be 0 or 1")),
                };
            }
            SocketOption::Linger => {
                self.linger = match value {
                    -1 => None,
                    v if v >= 0 => Some(Duration::from_millis(v as u64)),
                    _ => return Err(invalid("must be -1 or >= 0")),
                };
            }
        }
        Ok(())
    }

    /// Sets an option by its ZeroMQ name.
    ///
    /// # Errors
    /// [`TransportError::InvalidOption`] for names outside the allow-list or
    /// out-of-range values.
    pub fn set_by_name(
        &mut self,
        name: &str,
        value: i64,
    ) -> Result<(), TransportError> {
        let option = SocketOption::from_name(name).ok_or_else(|| {
            TransportError::InvalidOption(format!("unrecognized option {name:?}"))
        })?;
        self.set(option, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for opt in SocketOption::ALL {
            assert_eq!(SocketOption::from_name(opt.name()), Some(opt));
        }
        assert_eq!(SocketOption::from_name("ZMQ_AFFINITY"), None);
        assert_eq!(SocketOption::from_name("zmq_rcvtimeo"), None);
    }

    #[test]
    fn test_role_defaults() {
        let publisher = SocketOptions::publisher();
        assert_eq!(publisher.send_high_water_mark, Some(10));
        assert_eq!(publisher.send_timeout, Duration::from_millis(1000));
        assert_eq!(publisher.linger, Some(Duration::ZERO));

        let listener = SocketOptions::listener();
        assert_eq!(listener.receive_high_water_mark, Some(10));
        assert_eq!(listener.receive_timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_set_by_name_applies_units() {
        let mut opts = SocketOptions::default();
        opts.set_by_name("ZMQ_RCVTIMEO", 250).unwrap();
        opts.set_by_name("ZMQ_SNDHWM", 1000).unwrap();
        opts.set_by_name("ZMQ_CONFLATE", 1).unwrap();
        opts.set_by_name("ZMQ_LINGER", -1).unwrap();
        assert_eq!(opts.receive_timeout, Duration::from_millis(250));
        assert_eq!(opts.send_high_water_mark, Some(1000));
        assert!(opts.conflate);
        assert_eq!(opts.linger, None);
    }

    #[test]
    fn test_receive_timeout_must_be_bounded() {
        let mut opts = SocketOptions::listener();
        assert!(opts.set(SocketOption::ReceiveTimeout, -1).is_err());
        assert!(opts.set(SocketOption::ReceiveTimeout, 0).is_err());
        assert_eq!(opts, SocketOptions::listener());
    }

    #[test]
    fn test_rejects_unknown_name_and_bad_values() {
        let mut opts = SocketOptions::default();
        assert!(matches!(
            opts.set_by_name("ZMQ_IDENTITY", 1),
            Err(TransportError::InvalidOption(_))
        ));
        assert!(opts.set_by_name("ZMQ_RCVHWM", -5).is_err());
        assert!(opts.set_by_name("ZMQ_CONFLATE", 2).is_err());
        assert!(opts.set_by_name("ZMQ_SNDTIMEO", -1).is_err());
        assert_eq!(opts, SocketOptions::default());
    }
}
