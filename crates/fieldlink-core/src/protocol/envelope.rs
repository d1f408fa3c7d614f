//! Routing envelope.
//!
//! The core reads only `type`, `entity`, `entityId`, and `action`; `data` is
//! opaque business payload and is carried through untouched.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope discriminator. Open set: unknown values survive as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    Authenticate,
    Subscribe,
    Unsubscribe,
    Presence,
    Broadcast,
    Event,
    Error,
    Heartbeat,
    Other(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Authenticate => "authenticate",
            MessageType::Subscribe => "subscribe",
            MessageType::Unsubscribe => "unsubscribe",
            MessageType::Presence => "presence",
            MessageType::Broadcast => "broadcast",
            MessageType::Event => "event",
            MessageType::Error => "error",
            MessageType::Heartbeat => "heartbeat",
            MessageType::Other(s) => s,
        }
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "authenticate" => MessageType::Authenticate,
            "subscribe" => MessageType::Subscribe,
            "unsubscribe" => MessageType::Unsubscribe,
            "presence" => MessageType::Presence,
            "broadcast" => MessageType::Broadcast,
            "event" => MessageType::Event,
            "error" => MessageType::Error,
            "heartbeat" => MessageType::Heartbeat,
            _ => MessageType::Other(s),
        }
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        MessageType::from(s.to_string())
    }
}

impl From<MessageType> for String {
    fn from(t: MessageType) -> Self {
        match t {
            MessageType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Originating principal. Servers emit either numeric or string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Numeric(n) => write!(f, "{n}"),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for UserId {
    fn from(n: i64) -> Self {
        UserId::Numeric(n)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId::Text(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        UserId::Text(s)
    }
}

/// Correlation id carried in `id`. Servers send row ids, counters or opaque
/// strings; all of them are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Numeric(n) => write!(f, "{n}"),
            MessageId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for MessageId {
    fn from(n: i64) -> Self {
        MessageId::Numeric(n)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId::Text(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        MessageId::Text(s)
    }
}

/// Subscription key: one `(entity type, entity id)` pair.
///
/// `Ord` gives the registry a stable replay order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity: String,
    pub id: i64,
}

impl EntityKey {
    pub fn new(entity: impl Into<String>, id: i64) -> Self {
        Self {
            entity: entity.into(),
            id,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.id)
    }
}

/// Wire envelope (text frame).
///
/// Built with consuming `with_*` methods; there are no in-place mutators.
/// Unknown fields from the server are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Message type (field name is `type` in JSON).
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
    /// Secondary discriminator (`join`, `leave`, `status_change`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Opaque payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Free-form; usually a human-readable string on `error` envelopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    /// Correlation/de-duplication id, chosen by the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
}

impl Envelope {
    pub fn new(msg_type: impl Into<MessageType>) -> Self {
        Self {
            msg_type: msg_type.into(),
            entity: None,
            entity_id: None,
            action: None,
            data: None,
            user_id: None,
            timestamp: None,
            message: None,
            id: None,
        }
    }

    /// Scope the envelope to one entity.
    pub fn with_key(mut self, key: &EntityKey) -> Self {
        self.entity = Some(key.entity.clone());
        self.entity_id = Some(key.id);
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_entity_id(mut self, id: i64) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Explicit originator; the client will not override it.
    pub fn with_user_id(mut self, user: impl Into<UserId>) -> Self {
        self.user_id = Some(user.into());
        self
    }

    pub fn with_timestamp(mut self, ms: i64) -> Self {
        self.timestamp = Some(ms);
        self
    }

    pub fn with_message(mut self, message: impl Into<Value>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Fill `userId` and `timestamp` where absent; present values win.
    pub fn stamped(mut self, user: &UserId, now_ms: i64) -> Self {
        if self.user_id.is_none() {
            self.user_id = Some(user.clone());
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(now_ms);
        }
        self
    }

    /// Routing key when both `entity` and `entityId` are present.
    pub fn entity_key(&self) -> Option<EntityKey> {
        match (&self.entity, self.entity_id) {
            (Some(entity), Some(id)) => Some(EntityKey::new(entity.clone(), id)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_type_survives_as_other() {
        let t = MessageType::from("job_status");
        assert_eq!(t, MessageType::Other("job_status".into()));
        assert_eq!(String::from(t), "job_status");
    }

    #[test]
    fn stamped_keeps_explicit_fields() {
        let env = Envelope::new(MessageType::Broadcast)
            .with_user_id(7_i64)
            .stamped(&UserId::from("local"), 1_700_000_000_000);
        assert_eq!(env.user_id, Some(UserId::Numeric(7)));
        assert_eq!(env.timestamp, Some(1_700_000_000_000));

        let env = Envelope::new(MessageType::Event)
            .with_timestamp(5)
            .stamped(&UserId::from("local"), 9);
        assert_eq!(env.user_id, Some(UserId::Text("local".into())));
        assert_eq!(env.timestamp, Some(5));
    }

    #[test]
    fn serializes_camel_case_and_skips_absent() {
        let env = Envelope::new(MessageType::Subscribe).with_key(&EntityKey::new("inspection", 42));
        let v = serde_json::to_value(&env).unwrap_or_default();
        assert_eq!(v, json!({"type": "subscribe", "entity": "inspection", "entityId": 42}));
    }

    #[test]
    fn id_and_message_accept_any_json_shape() {
        let env: Envelope = serde_json::from_value(json!({
            "type": "event",
            "id": 17,
            "message": {"code": 3}
        }))
        .unwrap_or_else(|_| Envelope::new(MessageType::Error));
        assert_eq!(env.msg_type, MessageType::Event);
        assert_eq!(env.id, Some(MessageId::Numeric(17)));
        assert_eq!(env.message, Some(json!({"code": 3})));

        let env = Envelope::new(MessageType::Error)
            .with_id("req-9")
            .with_message("not authenticated");
        assert_eq!(env.id.as_ref().map(ToString::to_string).as_deref(), Some("req-9"));
        assert_eq!(env.message, Some(json!("not authenticated")));
    }

    #[test]
    fn entity_key_requires_both_parts() {
        assert!(Envelope::new(MessageType::Event).with_entity("inspection").entity_key().is_none());
        assert_eq!(
            Envelope::new(MessageType::Event)
                .with_entity("inspection")
                .with_entity_id(3)
                .entity_key(),
            Some(EntityKey::new("inspection", 3))
        );
    }

    #[test]
    fn entity_keys_order_by_entity_then_id() {
        let mut keys = vec![
            EntityKey::new("team_schedule", 1),
            EntityKey::new("inspection", 9),
            EntityKey::new("inspection", 2),
        ];
        keys.sort();
        assert_eq!(keys[0], EntityKey::new("inspection", 2));
        assert_eq!(keys[2].to_string(), "team_schedule:1");
    }
}
