//! Client config loader (strict parsing).

pub mod schema;

use std::fs;

use fieldlink_core::error::{FieldLinkError, Result};

pub use schema::{
    ClientConfig, EndpointSection, HeartbeatSection, QueueSection, ReconnectSection,
    SessionSection, WatchEntry,
};

pub fn load_from_file(path: &str) -> Result<ClientConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| FieldLinkError::BadConfig(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ClientConfig> {
    let cfg: ClientConfig = serde_yaml::from_str(s)
        .map_err(|e| FieldLinkError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
