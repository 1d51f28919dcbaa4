//! Envelope and reply types for agentbridge's wire format.
//!
//! Every message that leaves the bridge is an [`Envelope`]: a small header
//! carrying the sequence number (and optionally a timestamp) wrapped around
//! the marshaled payload.
//!
//! ```text
//! {"header": {"seqno": 1, "time": 1700000000000}, "data": {...}}
//! ```
//!
//! Replies from the listener use the same envelope with a fixed
//! [`Reply`] body.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::Document;

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Per-message metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Sequence number, strictly increasing per connection, starting at 1.
    pub seqno: u64,

    /// Milliseconds since the Unix epoch at send time, when enabled.
    ///
    /// `skip_serializing_if` keeps the field out of the JSON entirely when
    /// it is `None`, so consumers that only know about `seqno` see exactly
    /// `{"seqno": N}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
}

impl Header {
    /// A header with only a sequence number.
    pub fn new(seqno: u64) -> Self {
        Self { seqno, time: None }
    }

    /// A header stamped with the current wall-clock time.
    pub fn stamped(seqno: u64) -> Self {
        Self {
            seqno,
            time: Some(now_millis()),
        }
    }
}

/// Milliseconds since the Unix epoch. A clock set before 1970 yields 0.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The header + data wrapper placed around every payload.
///
/// Generic over the data type so the same envelope carries a marshaled
/// [`Document`] on the publish path and a typed [`Reply`] on the reply path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Document> {
    pub header: Header,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(header: Header, data: T) -> Self {
        Self { header, data }
    }
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// Outcome of processing one inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// The `data` part of a listener reply.
///
/// Serializes as `{"status": "SUCCESS"}` or
/// `{"status": "ERROR", "reason": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Reply {
    pub fn success() -> Self {
        Self {
            status: ReplyStatus::Success,
            reason: None,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }
}

// ---------------------------------------------------------------------------
// SequenceCounter
// ---------------------------------------------------------------------------

/// Hands out sequence numbers for one connection.
///
/// Numbers are taken with pre-increment, so the first call to
/// [`next`](Self::next) returns 1. A counter is never reset; a reconnect
/// creates a new one.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    last: u64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the counter and returns the new sequence number.
    pub fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// The most recently issued number, or 0 if none was issued yet.
    pub fn last(&self) -> u64 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_without_time_omits_field() {
        let json = serde_json::to_string(&Header::new(3)).unwrap();
        assert_eq!(json, r#"{"seqno":3}"#);
    }

    #[test]
    fn test_stamped_header_has_time() {
        let header = Header::stamped(1);
        let time = header.time.expect("stamped header has a time");
        assert!(time > 1_600_000_000_000, "time should be ms since epoch");
    }

    #[test]
    fn test_envelope_serializes_header_then_data() {
        let env = Envelope::new(Header::new(1), json!({"hp": 100}));
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(json, r#"{"header":{"seqno":1},"data":{"hp":100}}"#);
    }

    #[test]
    fn test_success_reply_shape() {
        let env = Envelope::new(Header::new(4), Reply::success());
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            json!({"header": {"seqno": 4}, "data": {"status": "SUCCESS"}})
        );
    }

    #[test]
    fn test_error_reply_shape() {
        let env = Envelope::new(Header::new(5), Reply::error("bad input"));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            json!({
                "header": {"seqno": 5},
                "data": {"status": "ERROR", "reason": "bad input"}
            })
        );
    }

    #[test]
    fn test_reply_deserializes_from_peer_json() {
        let env: Envelope<Reply> = serde_json::from_str(
            r#"{"header":{"seqno":2},"data":{"status":"ERROR","reason":"x"}}"#,
        )
        .unwrap();
        assert_eq!(env.header.seqno, 2);
        assert!(!env.data.is_success());
        assert_eq!(env.data.reason.as_deref(), Some("x"));
    }

    #[test]
    fn test_sequence_counter_pre_increments_from_one() {
        let mut seq = SequenceCounter::new();
        assert_eq!(seq.last(), 0);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
        assert_eq!(seq.next(), 3);
        assert_eq!(seq.last(), 3);
    }
}
