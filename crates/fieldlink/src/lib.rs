//! Top-level facade crate for fieldlink.
//!
//! Re-exports the wire contracts and the realtime client so applications can
//! depend on a single crate.

pub mod core {
    pub use fieldlink_core::*;
}

pub mod client {
    pub use fieldlink_client::*;
}

pub use fieldlink_client::{ClientConfig, ConnectionState, RealtimeClient};
pub use fieldlink_core::{EntityKey, Envelope, FieldLinkError, MessageId, MessageType, UserId};
