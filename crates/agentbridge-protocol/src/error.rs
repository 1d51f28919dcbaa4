//! Error types for the protocol layer.
//!
//! Each crate in agentbridge defines its own error enum. A `ProtocolError`
//! always means the problem is in the data itself (marshaling, parsing,
//! framing), never in the network or in the bridge's bookkeeping.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an envelope or document to JSON text failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The inbound bytes are not a valid JSON document.
    ///
    /// The wrapped `serde_json::Error` carries the line and column of the
    /// problem, and its `Display` output is what gets sent back to a
    /// requester in an ERROR reply.
    #[error("parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// A value or document node has a kind outside the supported set.
    ///
    /// Raised by both directions of the value codec: marshaling a host value
    /// such as an object reference, or unmarshaling an integer that does
    /// not fit in an `i64`.
    #[error("unsupported type: {kind}")]
    UnsupportedType {
        /// Human-readable name of the offending kind.
        kind: String,
    },

    /// The topic cannot be framed (empty, or contains the separator).
    #[error("invalid topic {0:?}")]
    InvalidTopic(String),

    /// Raw bytes do not contain a `topic SPACE payload` layout.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The message parsed but violates the envelope rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// Shorthand for an [`UnsupportedType`](Self::UnsupportedType) error.
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedType { kind: kind.into() }
    }
}
