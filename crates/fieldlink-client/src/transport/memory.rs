//! In-process connector with a scriptable server end.
//!
//! Lets the state machine run without sockets: the server side can refuse
//! handshakes, push frames, read what the client sent, and drop the link.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::{sink, stream, StreamExt};
use tokio::sync::mpsc;

use fieldlink_core::error::{FieldLinkError, Result};
use fieldlink_core::protocol::text::{decode_text, encode_text};
use fieldlink_core::Envelope;

use crate::transport::{Connector, Frame, Link};

#[derive(Default)]
struct Script {
    attempts: u32,
    refuse: u32,
    unavailable: bool,
    hang: bool,
}

/// Client half; hand it to `RealtimeClient::start`.
#[derive(Clone)]
pub struct MemoryConnector {
    script: Arc<Mutex<Script>>,
    accept_tx: mpsc::UnboundedSender<ServerConn>,
}

/// Server half; accepts connections made through the paired connector.
pub struct MemoryServer {
    script: Arc<Mutex<Script>>,
    accept_rx: mpsc::UnboundedReceiver<ServerConn>,
}

pub fn pair() -> (MemoryConnector, MemoryServer) {
    let script = Arc::new(Mutex::new(Script::default()));
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    (
        MemoryConnector {
            script: Arc::clone(&script),
            accept_tx,
        },
        MemoryServer { script, accept_rx },
    )
}

impl MemoryServer {
    /// Next accepted connection; `None` once every connector is gone.
    pub async fn accept(&mut self) -> Option<ServerConn> {
        self.accept_rx.recv().await
    }

    /// Fail the next `n` handshakes with `HandshakeFailed`.
    pub fn refuse_next(&self, n: u32) {
        self.with_script(|s| s.refuse = n);
    }

    /// Fail every handshake with `TransportUnavailable`.
    pub fn make_unavailable(&self) {
        self.with_script(|s| s.unavailable = true);
    }

    /// Never complete handshakes (exercises the connect timeout).
    pub fn hang_handshakes(&self, hang: bool) {
        self.with_script(|s| s.hang = hang);
    }

    /// Number of `connect` calls seen so far.
    pub fn connect_attempts(&self) -> u32 {
        self.with_script(|s| s.attempts)
    }

    fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut g = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut g)
    }
}

enum Outcome {
    Accept,
    Refuse,
    Unavailable,
    Hang,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _url: &str) -> Result<Link> {
        let outcome = {
            let mut s = self.script.lock().unwrap_or_else(PoisonError::into_inner);
            s.attempts += 1;
            if s.unavailable {
                Outcome::Unavailable
            } else if s.hang {
                Outcome::Hang
            } else if s.refuse > 0 {
                s.refuse -= 1;
                Outcome::Refuse
            } else {
                Outcome::Accept
            }
        };

        match outcome {
            Outcome::Accept => {}
            Outcome::Refuse => {
                return Err(FieldLinkError::HandshakeFailed("connection refused".into()))
            }
            Outcome::Unavailable => {
                return Err(FieldLinkError::TransportUnavailable(
                    "memory transport disabled".into(),
                ))
            }
            Outcome::Hang => std::future::pending::<()>().await,
        }

        let (to_server, from_client) = mpsc::unbounded_channel::<Frame>();
        let (to_client, from_server) = mpsc::unbounded_channel::<Frame>();

        self.accept_tx
            .send(ServerConn {
                tx: to_client,
                rx: from_client,
            })
            .map_err(|_| FieldLinkError::HandshakeFailed("server is gone".into()))?;

        let sink = sink::unfold(to_server, |tx: mpsc::UnboundedSender<Frame>, frame: Frame| async move {
            tx.send(frame)
                .map_err(|_| FieldLinkError::UnexpectedDisconnect("peer went away".into()))?;
            Ok::<_, FieldLinkError>(tx)
        });

        let stream = stream::unfold(from_server, |mut rx| async move {
            rx.recv().await.map(|frame| (Ok::<_, FieldLinkError>(frame), rx))
        });

        Ok(Link {
            sink: Box::pin(sink),
            stream: stream.boxed(),
        })
    }
}

/// Server view of one accepted connection. Dropping it drops the link.
pub struct ServerConn {
    tx: mpsc::UnboundedSender<Frame>,
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl ServerConn {
    pub fn send_text(&self, s: impl Into<String>) -> Result<()> {
        self.tx
            .send(Frame::Text(s.into()))
            .map_err(|_| FieldLinkError::UnexpectedDisconnect("client went away".into()))
    }

    pub fn send_envelope(&self, env: &Envelope) -> Result<()> {
        self.send_text(encode_text(env)?)
    }

    /// Send a close frame; the client treats it as a remote close.
    pub fn send_close(&self) -> Result<()> {
        self.tx
            .send(Frame::Close)
            .map_err(|_| FieldLinkError::UnexpectedDisconnect("client went away".into()))
    }

    /// Next frame from the client; `None` when the client side closed.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Next envelope from the client, skipping control frames.
    pub async fn recv_envelope(&mut self) -> Option<Envelope> {
        loop {
            match self.rx.recv().await? {
                Frame::Text(s) => return decode_text(&s).ok(),
                Frame::Close => return None,
                _ => continue,
            }
        }
    }

    /// Envelopes already delivered, without waiting.
    pub fn drain_envelopes(&mut self) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            if let Frame::Text(s) = frame {
                if let Ok(env) = decode_text(&s) {
                    out.push(env);
                }
            }
        }
        out
    }
}
