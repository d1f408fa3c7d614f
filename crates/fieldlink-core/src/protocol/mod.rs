//! Protocol modules.
//!
//! - `envelope`: the routing envelope exchanged in both directions.
//! - `text`: UTF-8 JSON text-frame codec for envelopes.
//!
//! Decoding is panic-free: malformed input is reported as
//! `FieldLinkError::MalformedFrame` so the read path can drop the frame and
//! keep going.

pub mod envelope;
pub mod text;

pub use envelope::{EntityKey, Envelope, MessageId, MessageType, UserId};
