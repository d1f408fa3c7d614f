use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};

use fieldlink_core::error::{FieldLinkError, Result};
use fieldlink_core::{EntityKey, Envelope, MessageType};

use crate::stats::ClientStats;

/// Consumer of inbound envelopes.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, env: Arc<Envelope>) -> Result<()>;
}

/// Closure adapter for `EventHandler`.
pub struct FnHandler<F>(F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(Arc<Envelope>) -> Result<()> + Send + Sync,
{
    async fn handle(&self, env: Arc<Envelope>) -> Result<()> {
        (self.0)(env)
    }
}

pub fn handler_fn<F>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Arc<Envelope>) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Registration token returned by `on_entity` / `on_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Slot = (HandlerId, Arc<dyn EventHandler>);

/// Fans inbound envelopes out to handlers, in arrival order.
///
/// Runs on its own task so a slow handler never stalls the socket read loop.
pub struct Dispatcher {
    by_key: DashMap<EntityKey, Vec<Slot>>,
    by_type: DashMap<MessageType, Vec<Slot>>,
    last: watch::Sender<Option<Arc<Envelope>>>,
    next_id: AtomicU64,
    stats: Arc<ClientStats>,
}

impl Dispatcher {
    pub fn new(stats: Arc<ClientStats>) -> Self {
        let (last, _) = watch::channel(None);
        Self {
            by_key: DashMap::new(),
            by_type: DashMap::new(),
            last,
            next_id: AtomicU64::new(1),
            stats,
        }
    }

    pub fn on_entity(&self, key: EntityKey, handler: Arc<dyn EventHandler>) -> HandlerId {
        let id = self.next_id();
        self.by_key.entry(key).or_default().push((id, handler));
        id
    }

    pub fn on_type(&self, msg_type: MessageType, handler: Arc<dyn EventHandler>) -> HandlerId {
        let id = self.next_id();
        self.by_type.entry(msg_type).or_default().push((id, handler));
        id
    }

    /// Returns `true` if the handler was registered.
    pub fn remove(&self, id: HandlerId) -> bool {
        let removed = remove_from(&self.by_key, id);
        removed || remove_from(&self.by_type, id)
    }

    pub fn last_message(&self) -> Option<Arc<Envelope>> {
        self.last.borrow().clone()
    }

    pub fn watch_last_message(&self) -> watch::Receiver<Option<Arc<Envelope>>> {
        self.last.subscribe()
    }

    /// Deliver one envelope: update the last-message slot, then run every
    /// matching handler in registration order (entity handlers first).
    pub async fn dispatch(&self, env: Arc<Envelope>) {
        self.last.send_replace(Some(Arc::clone(&env)));

        // clone handlers out so no map guard is held across an await
        let mut targets: Vec<Slot> = Vec::new();
        if let Some(key) = env.entity_key() {
            if let Some(slots) = self.by_key.get(&key) {
                targets.extend(slots.iter().cloned());
            }
        }
        if let Some(slots) = self.by_type.get(&env.msg_type) {
            targets.extend(slots.iter().cloned());
        }

        for (id, handler) in targets {
            let outcome = AssertUnwindSafe(handler.handle(Arc::clone(&env)))
                .catch_unwind()
                .await;
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => FieldLinkError::HandlerFailure(e.to_string()),
                Err(_) => FieldLinkError::HandlerFailure("handler panicked".into()),
            };
            ClientStats::inc(&self.stats.handler_failures);
            tracing::error!(
                handler = id.0,
                msg_type = %env.msg_type,
                code = failure.kind().as_str(),
                error = %failure,
                "event handler failed"
            );
        }
    }

    /// Drain the inbound queue until the connection manager goes away.
    pub(crate) async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Arc<Envelope>>) {
        while let Some(env) = rx.recv().await {
            self.dispatch(env).await;
        }
        tracing::debug!("dispatcher stopped");
    }

    fn next_id(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

fn remove_from<K>(map: &DashMap<K, Vec<Slot>>, id: HandlerId) -> bool
where
    K: std::hash::Hash + Eq,
{
    let mut removed = false;
    for mut entry in map.iter_mut() {
        let before = entry.value().len();
        entry.value_mut().retain(|(slot_id, _)| *slot_id != id);
        removed |= entry.value().len() != before;
    }
    map.retain(|_, slots| !slots.is_empty());
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<Arc<Envelope>>>>, Arc<dyn EventHandler>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let h = handler_fn(move |env| {
            sink.lock().unwrap().push(env);
            Ok(())
        });
        (seen, h)
    }

    fn event(entity: &str, id: i64, n: i64) -> Arc<Envelope> {
        Arc::new(
            Envelope::new(MessageType::Event)
                .with_entity(entity)
                .with_entity_id(id)
                .with_data(serde_json::json!({ "n": n })),
        )
    }

    #[tokio::test]
    async fn routes_by_key_and_type_in_order() {
        let d = Dispatcher::new(Arc::new(ClientStats::default()));
        let (by_key, h1) = recorder();
        let (by_type, h2) = recorder();
        d.on_entity(EntityKey::new("inspection", 42), h1);
        d.on_type(MessageType::Event, h2);

        d.dispatch(event("inspection", 42, 1)).await;
        d.dispatch(event("inspection", 42, 2)).await;
        d.dispatch(event("breach", 1, 3)).await;

        let keyed: Vec<_> = by_key.lock().unwrap().iter().map(|e| e.data.clone()).collect();
        assert_eq!(
            keyed,
            vec![Some(serde_json::json!({"n": 1})), Some(serde_json::json!({"n": 2}))]
        );
        assert_eq!(by_type.lock().unwrap().len(), 3);
        assert_eq!(d.last_message().unwrap().entity.as_deref(), Some("breach"));
    }

    #[tokio::test]
    async fn failing_and_panicking_handlers_are_isolated() {
        let stats = Arc::new(ClientStats::default());
        let d = Dispatcher::new(Arc::clone(&stats));
        let key = EntityKey::new("inspection", 42);

        d.on_entity(
            key.clone(),
            handler_fn(|_| Err(FieldLinkError::Internal("boom".into()))),
        );
        d.on_entity(key.clone(), handler_fn(|_| panic!("handler bug")));
        let (seen, h) = recorder();
        d.on_entity(key, h);

        d.dispatch(event("inspection", 42, 1)).await;

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(stats.snapshot().handler_failures, 2);
    }

    #[tokio::test]
    async fn removed_handler_is_not_called() {
        let d = Dispatcher::new(Arc::new(ClientStats::default()));
        let (seen, h) = recorder();
        let id = d.on_type(MessageType::Event, h);
        assert!(d.remove(id));
        assert!(!d.remove(id));
        d.dispatch(event("inspection", 1, 1)).await;
        assert!(seen.lock().unwrap().is_empty());
        assert!(d.last_message().is_some());
    }
}
