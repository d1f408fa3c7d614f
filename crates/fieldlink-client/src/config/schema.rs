use serde::Deserialize;

use fieldlink_core::error::{FieldLinkError, Result};
use fieldlink_core::{EntityKey, UserId};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    pub endpoint: EndpointSection,

    pub session: SessionSection,

    #[serde(default)]
    pub reconnect: ReconnectSection,

    #[serde(default)]
    pub heartbeat: HeartbeatSection,

    #[serde(default)]
    pub queues: QueueSection,

    /// Entities the tail binary subscribes to at start.
    #[serde(default)]
    pub watch: Vec<WatchEntry>,
}

impl ClientConfig {
    /// Programmatic config with defaults for everything but host and user.
    pub fn new(host: impl Into<String>, user_id: impl Into<UserId>) -> Self {
        Self {
            version: 1,
            endpoint: EndpointSection {
                host: host.into(),
                path: default_path(),
                page_scheme: default_page_scheme(),
                connect_timeout_ms: default_connect_timeout_ms(),
            },
            session: SessionSection {
                user_id: user_id.into(),
            },
            reconnect: ReconnectSection::default(),
            heartbeat: HeartbeatSection::default(),
            queues: QueueSection::default(),
            watch: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(FieldLinkError::UnsupportedVersion);
        }

        self.endpoint.validate()?;
        self.session.validate()?;
        self.reconnect.validate()?;
        self.heartbeat.validate()?;
        self.queues.validate()?;

        for w in &self.watch {
            if w.entity.trim().is_empty() {
                return Err(FieldLinkError::BadConfig("watch.entity must not be empty".into()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSection {
    /// `host[:port]` of the realtime server.
    pub host: String,

    #[serde(default = "default_path")]
    pub path: String,

    /// Scheme the hosting page was served over; `https` selects `wss`.
    #[serde(default = "default_page_scheme")]
    pub page_scheme: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl EndpointSection {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(FieldLinkError::BadConfig("endpoint.host must not be empty".into()));
        }
        if !self.path.starts_with('/') {
            return Err(FieldLinkError::BadConfig("endpoint.path must start with '/'".into()));
        }
        if !(1000..=120000).contains(&self.connect_timeout_ms) {
            return Err(FieldLinkError::BadConfig(
                "endpoint.connect_timeout_ms must be between 1000 and 120000".into(),
            ));
        }
        Ok(())
    }

    /// Socket URL; the transport scheme mirrors the page scheme.
    pub fn url(&self) -> String {
        let scheme = if self.page_scheme.eq_ignore_ascii_case("https") {
            "wss"
        } else {
            "ws"
        };
        format!("{scheme}://{}{}", self.host, self.path)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    pub user_id: UserId,
}

impl SessionSection {
    pub fn validate(&self) -> Result<()> {
        if let UserId::Text(s) = &self.user_id {
            if s.trim().is_empty() {
                return Err(FieldLinkError::BadConfig("session.user_id must not be empty".into()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectSection {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// 1.0 means a fixed delay.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Absent means retry forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: None,
        }
    }
}

impl ReconnectSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=600000).contains(&self.base_delay_ms) {
            return Err(FieldLinkError::BadConfig(
                "reconnect.base_delay_ms must be between 100 and 600000".into(),
            ));
        }
        if !(1.0..=10.0).contains(&self.multiplier) {
            return Err(FieldLinkError::BadConfig(
                "reconnect.multiplier must be between 1.0 and 10.0".into(),
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(FieldLinkError::BadConfig(
                "reconnect.max_delay_ms must be >= base_delay_ms".into(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(FieldLinkError::BadConfig(
                "reconnect.max_attempts must be at least 1 (omit it to retry forever)".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatSection {
    /// 0 disables the heartbeat.
    #[serde(default)]
    pub interval_ms: u64,
}

impl HeartbeatSection {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms != 0 && !(5000..=120000).contains(&self.interval_ms) {
            return Err(FieldLinkError::BadConfig(
                "heartbeat.interval_ms must be 0 or between 5000 and 120000".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueSection {
    /// Capacity of the consumer -> connection command queue.
    #[serde(default = "default_outbound")]
    pub outbound: usize,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            outbound: default_outbound(),
        }
    }
}

impl QueueSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=65536).contains(&self.outbound) {
            return Err(FieldLinkError::BadConfig(
                "queues.outbound must be between 1 and 65536".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchEntry {
    pub entity: String,
    pub id: i64,
}

impl WatchEntry {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity.clone(), self.id)
    }
}

fn default_path() -> String {
    "/api/ws".into()
}
fn default_page_scheme() -> String {
    "http".into()
}
fn default_connect_timeout_ms() -> u64 {
    10000
}
fn default_base_delay_ms() -> u64 {
    5000
}
fn default_multiplier() -> f64 {
    1.0
}
fn default_max_delay_ms() -> u64 {
    60000
}
fn default_outbound() -> usize {
    256
}
