//! Codec trait and the JSON implementation used on the wire.
//!
//! A codec turns envelopes into bytes and back. The publisher and listener
//! only talk to the [`Codec`] trait, so the text format lives in one place.
//! [`JsonCodec`] is the only implementation: consumers are scripts in other
//! languages and JSON is what they parse.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec is stored inside the listener,
/// which runs on its own Tokio task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Parse` if the bytes are not a valid encoding
    /// of `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses compact JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use agentbridge_protocol::{Codec, Envelope, Header, JsonCodec, Reply};
///
/// let codec = JsonCodec;
/// let reply = Envelope::new(Header::new(1), Reply::success());
///
/// let bytes = codec.encode(&reply).unwrap();
/// assert_eq!(bytes, br#"{"header":{"seqno":1},"data":{"status":"SUCCESS"}}"#);
///
/// let decoded: Envelope<Reply> = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, reply);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Envelope, Header};
    use serde_json::json;

    #[test]
    fn test_encode_is_compact_json() {
        let env = Envelope::new(Header::new(1), json!({"pos": [1.5, 2.0]}));
        let bytes = JsonCodec.encode(&env).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"header":{"seqno":1},"data":{"pos":[1.5,2.0]}}"#
        );
    }

    #[test]
    fn test_decode_garbage_is_parse_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"{not valid json");
        assert!(matches!(result, Err(ProtocolError::Parse(_))));
    }

    #[test]
    fn test_encode_map_with_non_string_keys_fails() {
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], 1);
        assert!(matches!(
            JsonCodec.encode(&map),
            Err(ProtocolError::Encode(_))
        ));
    }
}
