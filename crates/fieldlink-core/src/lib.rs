//! Routing envelope, entity keys and the error type for fieldlink.
//!
//! Shared by the realtime client and anything else that speaks the same
//! envelope format. Only serde and thiserror; no runtime.
//!
//! Decoding never panics: a bad server frame comes back as
//! `FieldLinkError::MalformedFrame`. `unwrap`, `expect` and `panic!` are
//! denied crate-wide.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

pub use error::{ErrorKind, FieldLinkError, Result};
pub use protocol::{EntityKey, Envelope, MessageId, MessageType, UserId};
