//! Topic framing for published messages.
//!
//! A frame is the topic, one ASCII space, and the payload bytes. Nothing
//! else: no length prefix and no terminating NUL. Subscribers in other
//! ecosystems (Python's `recv_string`, for one) choke on a stray trailing
//! byte, so the frame length is always exactly
//! `topic.len() + 1 + payload.len()`.
//!
//! Subscribers filter by prefix match on the raw bytes, which is why the
//! topic comes first.

use crate::ProtocolError;

/// Separator between topic and payload.
pub const TOPIC_SEPARATOR: u8 = b' ';

/// Checks that a topic can be framed and later unframed unchanged.
///
/// # Errors
/// [`ProtocolError::InvalidTopic`] if the topic is empty or contains the
/// separator.
pub fn validate_topic(topic: &str) -> Result<(), ProtocolError> {
    if topic.is_empty() || topic.as_bytes().contains(&TOPIC_SEPARATOR) {
        return Err(ProtocolError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}

/// Builds a wire frame from a topic and payload.
///
/// # Errors
/// [`ProtocolError::InvalidTopic`], see [`validate_topic`].
pub fn frame(topic: &str, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    validate_topic(topic)?;
    let mut buf = Vec::with_capacity(topic.len() + 1 + payload.len());
    buf.extend_from_slice(topic.as_bytes());
    buf.push(TOPIC_SEPARATOR);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Splits a wire frame into topic and payload at the first space.
///
/// # Errors
/// [`ProtocolError::MalformedFrame`] if there is no separator, the topic is
/// empty, or the topic is not UTF-8.
pub fn unframe(raw: &[u8]) -> Result<(&str, &[u8]), ProtocolError> {
    let split = raw
        .iter()
        .position(|b| *b == TOPIC_SEPARATOR)
        .ok_or_else(|| {
            ProtocolError::MalformedFrame("missing topic separator".into())
        })?;
    if split == 0 {
        return Err(ProtocolError::MalformedFrame("empty topic".into()));
    }
    let topic = std::str::from_utf8(&raw[..split]).map_err(|e| {
        ProtocolError::MalformedFrame(format!("topic is not UTF-8: {e}"))
    })?;
    Ok((topic, &raw[split + 1..]))
}
