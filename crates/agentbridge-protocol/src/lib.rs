//! Wire protocol for agentbridge.
//!
//! This crate defines what travels between the host and its external
//! clients, independent of any socket:
//!
//! - **Values** ([`Value`], [`Dictionary`]): the host's dynamic data model.
//! - **Marshaling** ([`marshal`], [`unmarshal`], [`parse_document`]):
//!   recursive conversion to and from the canonical JSON [`Document`].
//! - **Envelopes** ([`Envelope`], [`Header`], [`Reply`]): the header + data
//!   wrapper around every message, and the [`SequenceCounter`] that numbers
//!   them.
//! - **Framing** ([`frame`], [`unframe`]): `topic SPACE payload`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): envelopes to bytes.
//!
//! # Architecture
//!
//! ```text
//! Value ─marshal→ Document ─Envelope+Codec→ bytes ─frame→ wire
//! wire ─(unframe)→ bytes ─parse_document→ Value
//! ```

mod codec;
mod envelope;
mod error;
mod frame;
mod marshal;
mod value;

pub use codec::{Codec, JsonCodec};
pub use envelope::{
    now_millis, Envelope, Header, Reply, ReplyStatus, SequenceCounter,
};
pub use error::ProtocolError;
pub use frame::{frame, unframe, validate_topic, TOPIC_SEPARATOR};
pub use marshal::{key_to_string, marshal, parse_document, unmarshal, Document};
pub use value::{Dictionary, Value, ValueKind};
