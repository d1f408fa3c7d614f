//! Transport layer.
//!
//! The connection manager never touches a socket type directly: a `Connector`
//! hands it a `Link` (frame sink + frame stream) per successful handshake.
//! `ws` is the tokio-tungstenite implementation, `memory` an in-process one
//! with a scriptable server end.

pub mod codec;
pub mod memory;
pub mod ws;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::Sink;

use fieldlink_core::error::{FieldLinkError, Result};

pub use memory::{MemoryConnector, MemoryServer, ServerConn};
pub use ws::WsConnector;

/// One transport frame, independent of the socket library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = FieldLinkError> + Send>>;
pub type FrameStream = BoxStream<'static, Result<Frame>>;

/// A live, handshaken transport connection.
///
/// Dropping both halves releases the underlying socket.
pub struct Link {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens transport connections.
///
/// Errors must be `TransportUnavailable` when retrying cannot help (bad URL,
/// missing TLS support) and `HandshakeFailed` otherwise.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Link>;
}
