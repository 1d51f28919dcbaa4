use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The socket could not bind to the requested endpoint (port in use,
    /// bad interface). The connection is unusable; nothing retries it.
    #[error("bind to {endpoint} failed: {reason}")]
    BindFailed { endpoint: String, reason: String },

    /// Sending a message failed at the socket level.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Sending did not complete within the configured send timeout.
    #[error("send timed out after {0:?}")]
    SendTimedOut(Duration),

    /// Receiving a message failed at the socket level.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The endpoint string or its parts are not usable.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A socket option name is not on the allow-list, or its value is out
    /// of range.
    #[error("invalid socket option: {0}")]
    InvalidOption(String),

    /// The socket was already closed.
    #[error("socket closed")]
    Closed,
}
