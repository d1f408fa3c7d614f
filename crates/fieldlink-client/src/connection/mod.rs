//! Connection manager.
//!
//! `ConnectionManager` is the cheap, cloneable handle; the `driver` task owns
//! the transport and runs the state machine. The task (and with it the
//! socket) is released when the last handle is dropped.

mod backoff;
mod driver;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use fieldlink_core::error::{FieldLinkError, Result};
use fieldlink_core::Envelope;

use crate::config::ClientConfig;
use crate::stats::ClientStats;
use crate::subscriptions::SubscriptionRegistry;
use crate::transport::Connector;

pub use backoff::ReconnectPolicy;
pub use state::{ConnectionState, LinkStatus};

use driver::{Command, Driver, DriverSettings};

#[derive(Clone)]
pub struct ConnectionManager {
    cmd_tx: mpsc::Sender<Command>,
    status: watch::Receiver<LinkStatus>,
    stats: Arc<ClientStats>,
}

impl ConnectionManager {
    /// Spawn the driver on the current tokio runtime. Starts in `Connecting`.
    pub(crate) fn spawn(
        cfg: &ClientConfig,
        connector: Arc<dyn Connector>,
        registry: Arc<SubscriptionRegistry>,
        inbound: mpsc::UnboundedSender<Arc<Envelope>>,
        stats: Arc<ClientStats>,
    ) -> Result<Self> {
        let rt = tokio::runtime::Handle::try_current().map_err(|e| {
            FieldLinkError::TransportUnavailable(format!("no tokio runtime: {e}"))
        })?;

        let (cmd_tx, cmd_rx) = mpsc::channel(cfg.queues.outbound);
        let (status_tx, status) = watch::channel(LinkStatus::initial());

        let settings = DriverSettings {
            url: cfg.endpoint.url(),
            user: cfg.session.user_id.clone(),
            connect_timeout: Duration::from_millis(cfg.endpoint.connect_timeout_ms),
            heartbeat: match cfg.heartbeat.interval_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            policy: ReconnectPolicy::from_config(&cfg.reconnect),
        };

        let driver = Driver::new(
            settings,
            connector,
            registry,
            status_tx,
            cmd_rx,
            inbound,
            Arc::clone(&stats),
        );
        rt.spawn(driver.run());

        Ok(Self {
            cmd_tx,
            status,
            stats,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn status(&self) -> LinkStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }

    /// Best-effort send of one envelope.
    pub fn send(&self, env: Envelope) -> Result<()> {
        self.transmit(vec![env])
    }

    /// Queue `batch` for the current connection, in order.
    ///
    /// Fails with `SendWhileNotOpen` unless the connection is `Open`; nothing
    /// is queued in that case.
    pub fn transmit(&self, batch: Vec<Envelope>) -> Result<()> {
        let status = *self.status.borrow();
        if !status.state.is_open() {
            ClientStats::inc(&self.stats.dropped_sends);
            return Err(FieldLinkError::SendWhileNotOpen {
                state: status.state.as_str(),
            });
        }

        self.cmd_tx
            .try_send(Command::Transmit {
                epoch: status.epoch,
                batch,
            })
            .map_err(|e| {
                ClientStats::inc(&self.stats.dropped_sends);
                match e {
                    mpsc::error::TrySendError::Full(_) => {
                        FieldLinkError::Internal("outbound queue full".into())
                    }
                    mpsc::error::TrySendError::Closed(_) => {
                        FieldLinkError::Internal("connection manager stopped".into())
                    }
                }
            })
    }

    /// Connect now, cancelling any pending reconnect timer and resetting the
    /// attempt counter. No-op while `Connecting` or `Open`.
    pub async fn reconnect(&self) -> Result<()> {
        self.command(Command::Reconnect).await
    }

    /// Explicit teardown: `Closing` then `Closed`, pending timer cancelled,
    /// no automatic reconnection afterwards.
    pub async fn close(&self) -> Result<()> {
        self.command(Command::Close).await
    }

    /// Wait until the published state equals `target`.
    pub async fn wait_for(&self, target: ConnectionState) -> Result<LinkStatus> {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(|s| s.state == target)
            .await
            .map_err(|_| FieldLinkError::Internal("connection manager stopped".into()))?;
        Ok(*status)
    }

    async fn command(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| FieldLinkError::Internal("connection manager stopped".into()))
    }
}
