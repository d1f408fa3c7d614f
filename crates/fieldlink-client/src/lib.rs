//! fieldlink realtime client library entry.
//!
//! This crate wires the transport, connection state machine, subscription
//! registry and event dispatcher into one client. It is consumed by the
//! `fieldlink-tail` binary and by integration tests.

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod helpers;
pub mod stats;
pub mod subscriptions;
pub mod transport;

pub use client::RealtimeClient;
pub use config::ClientConfig;
pub use connection::{ConnectionState, LinkStatus};
pub use dispatch::{handler_fn, EventHandler, HandlerId};
