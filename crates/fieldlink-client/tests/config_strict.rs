#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use fieldlink_client::config;
use fieldlink_core::{EntityKey, ErrorKind, UserId};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
endpoint:
  host: "field.example"
session:
  user_id: 7
reconnect:
  base_delay_msx: 100 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "BAD_CONFIG");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
endpoint:
  host: "field.example"
session:
  user_id: 7
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.session.user_id, UserId::Numeric(7));
    assert_eq!(cfg.endpoint.url(), "ws://field.example/api/ws");
    assert_eq!(cfg.reconnect.base_delay_ms, 5000);
    assert_eq!(cfg.reconnect.multiplier, 1.0);
    assert_eq!(cfg.reconnect.max_attempts, None);
    assert_eq!(cfg.heartbeat.interval_ms, 0);
    assert!(cfg.watch.is_empty());
}

#[test]
fn secure_page_selects_wss() {
    let ok = r#"
version: 1
endpoint:
  host: "field.example:8443"
  path: "/realtime"
  page_scheme: "https"
session:
  user_id: "inspector-3"
watch:
  - { entity: "inspection", id: 42 }
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.endpoint.url(), "wss://field.example:8443/realtime");
    assert_eq!(cfg.session.user_id, UserId::Text("inspector-3".into()));
    assert_eq!(cfg.watch[0].key(), EntityKey::new("inspection", 42));
}

#[test]
fn unsupported_version() {
    let bad = r#"
version: 2
endpoint:
  host: "field.example"
session:
  user_id: 7
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
}

#[test]
fn out_of_range_values_rejected() {
    let cases = [
        "reconnect:\n  max_attempts: 0\n",
        "reconnect:\n  base_delay_ms: 10\n",
        "reconnect:\n  base_delay_ms: 9000\n  max_delay_ms: 1000\n",
        "reconnect:\n  multiplier: 0.5\n",
        "heartbeat:\n  interval_ms: 10\n",
        "queues:\n  outbound: 0\n",
    ];
    for extra in cases {
        let doc = format!(
            "version: 1\nendpoint:\n  host: \"field.example\"\nsession:\n  user_id: 7\n{extra}"
        );
        let err = config::load_from_str(&doc).expect_err(extra);
        assert_eq!(err.kind(), ErrorKind::BadConfig, "{extra}");
    }
}

#[test]
fn missing_file_is_bad_config() {
    let err = config::load_from_file("/nonexistent/fieldlink.yaml").expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::BadConfig);
}
