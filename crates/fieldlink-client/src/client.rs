//! Consumer-facing realtime client.
//!
//! Wires the connection manager, subscription registry and dispatcher into
//! the small surface the UI layer needs. Clones share one connection; the
//! connection is torn down when the last clone is dropped.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};

use fieldlink_core::error::{ErrorKind, Result};
use fieldlink_core::{EntityKey, Envelope, MessageType, UserId};

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionState, LinkStatus};
use crate::dispatch::{Dispatcher, EventHandler, HandlerId};
use crate::helpers;
use crate::stats::{ClientStats, StatsSnapshot};
use crate::subscriptions::SubscriptionRegistry;
use crate::transport::{Connector, WsConnector};

#[derive(Clone)]
pub struct RealtimeClient {
    conn: ConnectionManager,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ClientStats>,
    user: UserId,
}

impl RealtimeClient {
    /// Connect over WebSocket (tokio-tungstenite).
    pub fn connect(cfg: ClientConfig) -> Result<Self> {
        Self::start(cfg, Arc::new(WsConnector::new()))
    }

    /// Start with any transport. Must be called inside a tokio runtime;
    /// otherwise fails with `TransportUnavailable`.
    pub fn start(cfg: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        cfg.validate()?;

        let stats = Arc::new(ClientStats::default());
        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&stats)));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let conn = ConnectionManager::spawn(
            &cfg,
            connector,
            Arc::clone(&registry),
            inbound_tx,
            Arc::clone(&stats),
        )?;
        tokio::spawn(Arc::clone(&dispatcher).run(inbound_rx));

        tracing::info!(url = %cfg.endpoint.url(), user = %cfg.session.user_id, "realtime client started");

        Ok(Self {
            conn,
            registry,
            dispatcher,
            stats,
            user: cfg.session.user_id,
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn status(&self) -> LinkStatus {
        self.conn.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<LinkStatus> {
        self.conn.watch_status()
    }

    pub async fn wait_for(&self, state: ConnectionState) -> Result<LinkStatus> {
        self.conn.wait_for(state).await
    }

    pub fn last_message(&self) -> Option<Arc<Envelope>> {
        self.dispatcher.last_message()
    }

    pub fn watch_last_message(&self) -> watch::Receiver<Option<Arc<Envelope>>> {
        self.dispatcher.watch_last_message()
    }

    /// Fire-and-forget send. While not `Open` this logs and returns
    /// `SendWhileNotOpen`; the envelope is not queued for later.
    pub fn send_message(&self, env: Envelope) -> Result<()> {
        let msg_type = env.msg_type.clone();
        self.conn.send(env).map_err(|e| {
            tracing::warn!(code = e.kind().as_str(), error = %e, %msg_type, "send dropped");
            e
        })
    }

    /// Record interest in `(entity, id)` and tell the server if connected.
    /// The intent is replayed after every reconnection until unsubscribed.
    pub fn subscribe_to_entity(&self, entity: impl Into<String>, id: i64) -> Result<()> {
        let key = EntityKey::new(entity, id);
        let added = self.registry.insert(key.clone());
        tracing::debug!(%key, added, "subscribe");

        match self.conn.transmit(vec![helpers::subscribe(&key)]) {
            Err(e) if e.kind() == ErrorKind::SendWhileNotOpen => {
                tracing::debug!(%key, state = %self.connection_state(), "not open; subscription will be replayed");
                Ok(())
            }
            other => other,
        }
    }

    /// Drop interest in `(entity, id)`. When connected, sends `unsubscribe`
    /// followed by a `presence`/`leave` notice.
    ///
    /// If the notice cannot be queued (outbound queue full, manager gone) the
    /// subscription is restored and the error returned, so local intent never
    /// disagrees with what the server was told.
    pub fn unsubscribe_from_entity(&self, entity: impl Into<String>, id: i64) -> Result<()> {
        let key = EntityKey::new(entity, id);
        let removed = self.registry.remove(&key);
        tracing::debug!(%key, removed, "unsubscribe");

        let batch = vec![helpers::unsubscribe(&key), helpers::presence_leave(&key)];
        match self.conn.transmit(batch) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::SendWhileNotOpen => {
                tracing::debug!(%key, "not open; subscription dropped locally");
                Ok(())
            }
            Err(e) => {
                if removed {
                    self.registry.insert(key.clone());
                }
                tracing::warn!(%key, code = e.kind().as_str(), error = %e, "unsubscribe not sent; subscription kept");
                Err(e)
            }
        }
    }

    /// Ask the server to relay `action`/`data` to other sessions on `(entity, id)`.
    pub fn broadcast(
        &self,
        entity: impl Into<String>,
        id: i64,
        action: &str,
        data: Option<Value>,
    ) -> Result<()> {
        let key = EntityKey::new(entity, id);
        self.send_message(helpers::broadcast(&key, action, data))
    }

    pub fn active_subscriptions(&self) -> Vec<EntityKey> {
        self.registry.snapshot()
    }

    pub fn on_entity(
        &self,
        entity: impl Into<String>,
        id: i64,
        handler: Arc<dyn EventHandler>,
    ) -> HandlerId {
        self.dispatcher.on_entity(EntityKey::new(entity, id), handler)
    }

    pub fn on_type(&self, msg_type: MessageType, handler: Arc<dyn EventHandler>) -> HandlerId {
        self.dispatcher.on_type(msg_type, handler)
    }

    pub fn remove_handler(&self, id: HandlerId) -> bool {
        self.dispatcher.remove(id)
    }

    pub async fn reconnect(&self) -> Result<()> {
        self.conn.reconnect().await
    }

    pub async fn close(&self) -> Result<()> {
        self.conn.close().await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
