//! WebSocket connector (tokio-tungstenite).

use async_trait::async_trait;
use futures_util::{future, SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use fieldlink_core::error::{FieldLinkError, Result};

use crate::transport::{Connector, Frame, Link};

/// Production connector: `ws://` or `wss://` via tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Link> {
        let parsed = Url::parse(url)
            .map_err(|e| FieldLinkError::TransportUnavailable(format!("invalid url {url}: {e}")))?;
        match parsed.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(FieldLinkError::TransportUnavailable(format!(
                    "unsupported scheme: {other}"
                )))
            }
        }

        let (socket, _response) = connect_async(url).await.map_err(classify)?;
        let (write, read) = socket.split();

        let sink = write
            .sink_map_err(|e| FieldLinkError::UnexpectedDisconnect(format!("write failed: {e}")))
            .with(|frame: Frame| future::ready(Ok::<_, FieldLinkError>(to_message(frame))));

        let stream = read.map(|r| {
            r.map(from_message)
                .map_err(|e| FieldLinkError::UnexpectedDisconnect(format!("read failed: {e}")))
        });

        Ok(Link {
            sink: Box::pin(sink),
            stream: stream.boxed(),
        })
    }
}

/// URL-level failures cannot be fixed by retrying.
fn classify(e: tungstenite::Error) -> FieldLinkError {
    match e {
        tungstenite::Error::Url(u) => FieldLinkError::TransportUnavailable(u.to_string()),
        other => FieldLinkError::HandshakeFailed(other.to_string()),
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(s) => Message::Text(s),
        Frame::Binary(b) => Message::Binary(b),
        Frame::Ping(b) => Message::Ping(b),
        Frame::Pong(b) => Message::Pong(b),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(msg: Message) -> Frame {
    match msg {
        Message::Text(s) => Frame::Text(s),
        Message::Binary(b) => Frame::Binary(b),
        Message::Ping(b) => Frame::Ping(b),
        Message::Pong(b) => Frame::Pong(b),
        Message::Close(_) => Frame::Close,
        // raw frames are never yielded on read
        Message::Frame(_) => Frame::Binary(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlink_core::ErrorKind;

    #[tokio::test]
    async fn rejects_non_socket_scheme() {
        let err = WsConnector::new().connect("http://localhost/api/ws").await.err();
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::TransportUnavailable));
    }

    #[tokio::test]
    async fn rejects_unparseable_url() {
        let err = WsConnector::new().connect("not a url").await.err();
        assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::TransportUnavailable));
    }
}
