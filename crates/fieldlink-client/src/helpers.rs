//! Envelope builders for the well-known message shapes.
//!
//! Every outbound subscribe/unsubscribe/presence/broadcast goes through here
//! so the shapes cannot drift between call sites.

use serde_json::Value;

use fieldlink_core::{EntityKey, Envelope, MessageType, UserId};

pub const ACTION_LEAVE: &str = "leave";

pub fn authenticate(user: &UserId) -> Envelope {
    Envelope::new(MessageType::Authenticate).with_user_id(user.clone())
}

pub fn subscribe(key: &EntityKey) -> Envelope {
    Envelope::new(MessageType::Subscribe).with_key(key)
}

pub fn unsubscribe(key: &EntityKey) -> Envelope {
    Envelope::new(MessageType::Unsubscribe).with_key(key)
}

/// Departure notice, sent after `unsubscribe`.
pub fn presence_leave(key: &EntityKey) -> Envelope {
    presence(key, ACTION_LEAVE)
}

pub fn presence(key: &EntityKey, action: &str) -> Envelope {
    Envelope::new(MessageType::Presence)
        .with_key(key)
        .with_action(action)
}

/// Server-relayed fan-out to other sessions watching `key`.
pub fn broadcast(key: &EntityKey, action: &str, data: Option<Value>) -> Envelope {
    let env = Envelope::new(MessageType::Broadcast)
        .with_key(key)
        .with_action(action);
    match data {
        Some(d) => env.with_data(d),
        None => env,
    }
}

pub fn heartbeat() -> Envelope {
    Envelope::new(MessageType::Heartbeat)
}
