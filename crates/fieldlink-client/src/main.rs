//! fieldlink-tail
//!
//! Connects to the realtime endpoint from `fieldlink.yaml` (or the path given
//! as the first argument), subscribes to every `watch` entry and logs each
//! inbound envelope until Ctrl-C.

use tracing_subscriber::{fmt, EnvFilter};

use fieldlink_client::{config, handler_fn, ConnectionState, RealtimeClient};
use fieldlink_core::error::{FieldLinkError, Result};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "fieldlink.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let watch = cfg.watch.clone();

    let client = RealtimeClient::connect(cfg)?;

    client.on_type(
        fieldlink_core::MessageType::Event,
        handler_fn(|env| {
            tracing::info!(
                entity = env.entity.as_deref().unwrap_or("-"),
                entity_id = env.entity_id.unwrap_or_default(),
                action = env.action.as_deref().unwrap_or("-"),
                data = %env.data.clone().unwrap_or_default(),
                "event"
            );
            Ok(())
        }),
    );
    client.on_type(
        fieldlink_core::MessageType::Error,
        handler_fn(|env| {
            let message = match &env.message {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "-".to_string(),
            };
            tracing::warn!(%message, "server error");
            Ok(())
        }),
    );

    for w in &watch {
        client.subscribe_to_entity(w.entity.clone(), w.id)?;
    }

    let mut status = client.watch_status();
    let banner = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let s = *status.borrow();
            if s.state == ConnectionState::Closed {
                tracing::warn!(cause = s.last_error.map(|k| k.as_str()).unwrap_or("-"), "realtime offline");
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| FieldLinkError::Internal(format!("signal handler failed: {e}")))?;

    tracing::info!("shutting down");
    client.close().await?;
    client.wait_for(ConnectionState::Closed).await?;
    banner.abort();

    let stats = client.stats();
    tracing::info!(?stats, "bye");
    Ok(())
}
