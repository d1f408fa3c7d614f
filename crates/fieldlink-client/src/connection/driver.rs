//! Connection state machine.
//!
//! One task owns the transport link and the published status. Consumers
//! reach it only through the command queue, so every transition, replay and
//! write happens in a single place and in a single order.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, sleep, timeout, Instant, Interval, MissedTickBehavior, Sleep};

use fieldlink_core::error::{ErrorKind, FieldLinkError, Result};
use fieldlink_core::protocol::text::encode_text;
use fieldlink_core::{Envelope, UserId};

use crate::connection::backoff::ReconnectPolicy;
use crate::connection::state::{ConnectionState, LinkStatus};
use crate::helpers;
use crate::stats::ClientStats;
use crate::subscriptions::SubscriptionRegistry;
use crate::transport::codec::{decode, Inbound};
use crate::transport::{Connector, Frame, FrameSink, Link};

pub(crate) enum Command {
    /// Write `batch` in order, only if still on connection `epoch`.
    Transmit { epoch: u64, batch: Vec<Envelope> },
    Reconnect,
    Close,
}

enum Step {
    Connect,
    Idle,
    Stop,
}

pub(crate) struct DriverSettings {
    pub url: String,
    pub user: UserId,
    pub connect_timeout: Duration,
    pub heartbeat: Option<Duration>,
    pub policy: ReconnectPolicy,
}

pub(crate) struct Driver {
    settings: DriverSettings,
    connector: Arc<dyn Connector>,
    registry: Arc<SubscriptionRegistry>,
    status: watch::Sender<LinkStatus>,
    cmd_rx: mpsc::Receiver<Command>,
    inbound: mpsc::UnboundedSender<Arc<Envelope>>,
    stats: Arc<ClientStats>,
    attempts: u32,
    epoch: u64,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
}

impl Driver {
    pub(crate) fn new(
        settings: DriverSettings,
        connector: Arc<dyn Connector>,
        registry: Arc<SubscriptionRegistry>,
        status: watch::Sender<LinkStatus>,
        cmd_rx: mpsc::Receiver<Command>,
        inbound: mpsc::UnboundedSender<Arc<Envelope>>,
        stats: Arc<ClientStats>,
    ) -> Self {
        Self {
            settings,
            connector,
            registry,
            status,
            cmd_rx,
            inbound,
            stats,
            attempts: 0,
            epoch: 0,
            reconnect_timer: None,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut step = Step::Connect;
        loop {
            step = match step {
                Step::Connect => self.connect_once().await,
                Step::Idle => self.idle().await,
                Step::Stop => break,
            };
        }
        self.reconnect_timer = None;
        self.registry.clear();
        self.publish(ConnectionState::Closed);
        tracing::info!(url = %self.settings.url, "connection manager stopped");
    }

    /// `Connecting` until the handshake resolves, then `Open` or `Closed`.
    async fn connect_once(&mut self) -> Step {
        self.reconnect_timer = None;
        self.publish(ConnectionState::Connecting);
        ClientStats::inc(&self.stats.connect_attempts);
        tracing::debug!(url = %self.settings.url, attempt = self.attempts, "connecting");

        let connector = Arc::clone(&self.connector);
        let url = self.settings.url.clone();
        let handshake = timeout(self.settings.connect_timeout, async move {
            connector.connect(&url).await
        });
        tokio::pin!(handshake);

        let result = loop {
            tokio::select! {
                r = &mut handshake => break r,
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return Step::Stop,
                    Some(Command::Close) => {
                        self.publish(ConnectionState::Closing);
                        self.publish(ConnectionState::Closed);
                        tracing::info!("connect attempt abandoned by close");
                        return Step::Idle;
                    }
                    Some(Command::Reconnect) => {
                        tracing::debug!("reconnect requested while connecting; ignored");
                    }
                    Some(Command::Transmit { batch, .. }) => self.drop_stale(batch.len()),
                }
            }
        };

        match result {
            Ok(Ok(link)) => self.run_open(link).await,
            Ok(Err(e)) if !e.kind().is_retryable() => {
                self.set_error(e.kind());
                self.publish(ConnectionState::Closed);
                tracing::error!(
                    code = e.kind().as_str(),
                    error = %e,
                    "connect cannot succeed; not retrying"
                );
                Step::Idle
            }
            Ok(Err(e)) => self.on_failure(e),
            Err(_elapsed) => self.on_failure(FieldLinkError::HandshakeFailed(format!(
                "no handshake within {}ms",
                self.settings.connect_timeout.as_millis()
            ))),
        }
    }

    /// `Closed`: wait for the reconnect timer or a consumer command.
    async fn idle(&mut self) -> Step {
        loop {
            tokio::select! {
                _ = wait_timer(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    return Step::Connect;
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return Step::Stop,
                    Some(Command::Reconnect) => {
                        tracing::info!("manual reconnect");
                        self.attempts = 0;
                        return Step::Connect;
                    }
                    Some(Command::Close) => {
                        if self.reconnect_timer.take().is_some() {
                            tracing::info!("pending reconnect cancelled by close");
                        }
                    }
                    Some(Command::Transmit { batch, .. }) => self.drop_stale(batch.len()),
                }
            }
        }
    }

    async fn run_open(&mut self, link: Link) -> Step {
        let Link {
            mut sink,
            mut stream,
        } = link;

        self.attempts = 0;
        self.epoch += 1;
        ClientStats::inc(&self.stats.connections_opened);
        // publish before taking the snapshot: a consumer that still saw
        // `Connecting` registered its intent before this point
        self.status.send_modify(|s| {
            s.state = ConnectionState::Open;
            s.epoch = self.epoch;
            s.last_error = None;
        });
        tracing::info!(url = %self.settings.url, epoch = self.epoch, "connection open");

        // a subscribe landing between the publish above and this snapshot
        // (multi-thread runtime) is replayed and also sent directly: the
        // server then sees that key twice
        let replay = self.registry.snapshot();
        tracing::debug!(count = replay.len(), "replaying subscriptions");
        let mut preamble = Vec::with_capacity(replay.len() + 1);
        preamble.push(helpers::authenticate(&self.settings.user));
        preamble.extend(replay.iter().map(helpers::subscribe));
        for env in preamble {
            if let Err(e) = write(&mut sink, &self.settings.user, &self.stats, env).await {
                return self.on_failure(e);
            }
        }

        let mut heartbeat = self.settings.heartbeat.map(|every| {
            let mut t = interval_at(Instant::now() + every, every);
            t.set_missed_tick_behavior(MissedTickBehavior::Delay);
            t
        });

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    None => {
                        let _ = sink.close().await;
                        return Step::Stop;
                    }
                    Some(Command::Close) => {
                        self.publish(ConnectionState::Closing);
                        let _ = sink.send(Frame::Close).await;
                        let _ = sink.close().await;
                        drop(sink);
                        drop(stream);
                        self.publish(ConnectionState::Closed);
                        tracing::info!("connection closed by consumer");
                        return Step::Idle;
                    }
                    Some(Command::Reconnect) => {
                        tracing::debug!("reconnect requested while open; ignored");
                    }
                    Some(Command::Transmit { epoch, batch }) => {
                        if epoch != self.epoch {
                            self.drop_stale(batch.len());
                            continue;
                        }
                        for env in batch {
                            if let Err(e) = write(&mut sink, &self.settings.user, &self.stats, env).await {
                                return self.on_failure(e);
                            }
                        }
                    }
                },

                frame = stream.next() => match frame {
                    None => {
                        return self.on_failure(FieldLinkError::UnexpectedDisconnect(
                            "stream ended".into(),
                        ));
                    }
                    Some(Err(e)) => return self.on_failure(e),
                    Some(Ok(frame)) => match decode(frame) {
                        Ok(Inbound::Envelope { env, bytes_len }) => {
                            ClientStats::inc(&self.stats.frames_in);
                            tracing::debug!(msg_type = %env.msg_type, bytes_len, "frame received");
                            if self.inbound.send(Arc::new(env)).is_err() {
                                tracing::warn!("dispatcher is gone; inbound envelope dropped");
                            }
                        }
                        Ok(Inbound::Control) => {}
                        Ok(Inbound::Close) => {
                            return self.on_failure(FieldLinkError::UnexpectedDisconnect(
                                "remote sent close".into(),
                            ));
                        }
                        Err(e) => {
                            ClientStats::inc(&self.stats.malformed_frames);
                            tracing::warn!(
                                code = e.kind().as_str(),
                                error = %e,
                                "dropping malformed frame"
                            );
                        }
                    },
                },

                _ = tick(&mut heartbeat) => {
                    if let Err(e) = write(&mut sink, &self.settings.user, &self.stats, helpers::heartbeat()).await {
                        return self.on_failure(e);
                    }
                }
            }
        }
    }

    /// `HandshakeFailed` / `UnexpectedDisconnect`: go `Closed` and arm the
    /// single reconnect timer unless the attempt ceiling is reached.
    fn on_failure(&mut self, err: FieldLinkError) -> Step {
        self.set_error(err.kind());
        self.publish(ConnectionState::Closed);

        if !self.settings.policy.allows(self.attempts) {
            tracing::warn!(
                attempts = self.attempts,
                error = %err,
                "reconnect ceiling reached; waiting for explicit reconnect"
            );
            return Step::Idle;
        }

        let delay = self.settings.policy.delay_for_attempt(self.attempts);
        self.attempts += 1;
        ClientStats::inc(&self.stats.reconnects_scheduled);
        tracing::info!(
            code = err.kind().as_str(),
            error = %err,
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        // replaces any earlier timer
        self.reconnect_timer = Some(Box::pin(sleep(delay)));
        Step::Idle
    }

    fn drop_stale(&self, n: usize) {
        ClientStats::inc(&self.stats.dropped_sends);
        tracing::debug!(count = n, "dropping envelopes queued for a previous connection");
    }

    fn publish(&self, state: ConnectionState) {
        let changed = self.status.send_if_modified(|s| {
            if s.state == state {
                return false;
            }
            s.state = state;
            true
        });
        if changed {
            tracing::info!(state = %state, "connection state");
        }
    }

    fn set_error(&self, kind: ErrorKind) {
        self.status.send_if_modified(|s| {
            s.last_error = Some(kind);
            false
        });
    }
}

/// Stamp, encode, write. Encoding failures skip the envelope but keep the
/// connection.
async fn write(
    sink: &mut FrameSink,
    user: &UserId,
    stats: &ClientStats,
    env: Envelope,
) -> Result<()> {
    let env = env.stamped(user, now_ms());
    let text = match encode_text(&env) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, msg_type = %env.msg_type, "envelope not encodable; skipped");
            return Ok(());
        }
    };
    sink.send(Frame::Text(text)).await?;
    ClientStats::inc(&stats.frames_out);
    tracing::debug!(msg_type = %env.msg_type, "frame sent");
    Ok(())
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(t) => t.as_mut().await,
        None => pending().await,
    }
}

async fn tick(t: &mut Option<Interval>) {
    match t {
        Some(i) => {
            i.tick().await;
        }
        None => pending().await,
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
