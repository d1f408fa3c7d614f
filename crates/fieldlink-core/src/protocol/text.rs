//! Text frame codec (UTF-8 JSON).

use crate::error::{FieldLinkError, Result};
use crate::protocol::envelope::Envelope;

/// Decode one inbound text frame.
///
/// Only JSON objects are accepted; serde would otherwise map a JSON array
/// onto the struct positionally.
pub fn decode_text(s: &str) -> Result<Envelope> {
    if !s.trim_start().starts_with('{') {
        return Err(FieldLinkError::MalformedFrame(
            "frame is not a json object".into(),
        ));
    }
    serde_json::from_str(s)
        .map_err(|e| FieldLinkError::MalformedFrame(format!("invalid envelope json: {e}")))
}

/// Encode one outbound envelope.
pub fn encode_text(env: &Envelope) -> Result<String> {
    serde_json::to_string(env)
        .map_err(|e| FieldLinkError::Internal(format!("json encode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::protocol::envelope::MessageType;

    #[test]
    fn rejects_non_json_and_non_objects() {
        for bad in ["hello", "", "[\"event\"]", "42", "{\"entity\":\"inspection\"}"] {
            let kind = decode_text(bad).err().map(|e| e.kind());
            assert_eq!(kind, Some(ErrorKind::MalformedFrame), "input: {bad:?}");
        }
    }

    #[test]
    fn tolerates_unknown_fields() {
        let env = decode_text(r#"{"type":"event","entity":"breach","entityId":5,"extra":true}"#);
        assert!(matches!(env, Ok(e) if e.msg_type == MessageType::Event && e.entity_id == Some(5)));
    }
}
