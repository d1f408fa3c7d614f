//! Envelope text-frame vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod vector_loader;

use fieldlink_core::protocol::text::{decode_text, encode_text};
use fieldlink_core::{EntityKey, Envelope, MessageType, UserId};

use vector_loader::load_vectors;

#[test]
fn envelope_vectors() {
    let vectors = load_vectors("envelope_vectors.json");
    assert!(!vectors.is_empty());

    for v in vectors {
        let decoded = decode_text(&v.frame);
        match (&v.expect, &v.expect_error) {
            (Some(expect), None) => {
                let env = decoded.unwrap_or_else(|e| panic!("{}: {e}", v.description));
                let back = serde_json::to_value(&env).unwrap();
                assert_eq!(&back, expect, "{}", v.description);
            }
            (None, Some(err)) => {
                let e = decoded.expect_err(&v.description);
                assert_eq!(e.kind().as_str(), err.code, "{}", v.description);
            }
            _ => panic!("{}: vector needs exactly one of expect/expect_error", v.description),
        }
    }
}

#[test]
fn outbound_subscribe_shape() {
    let env = Envelope::new(MessageType::Subscribe)
        .with_key(&EntityKey::new("inspection", 42))
        .stamped(&UserId::Numeric(7), 1_700_000_000_123);
    let s = encode_text(&env).unwrap();
    let v: serde_json::Value = serde_json::from_str(&s).unwrap();
    assert_eq!(
        v,
        serde_json::json!({
            "type": "subscribe",
            "entity": "inspection",
            "entityId": 42,
            "userId": 7,
            "timestamp": 1_700_000_000_123i64
        })
    );
    assert_eq!(decode_text(&s).unwrap(), env);
}
