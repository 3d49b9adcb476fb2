//! Integration tests: the fetch pipeline end to end.
//!
//! Drives the API handler with explicit timestamps so cooldown and expiry
//! behavior is deterministic.

use chrono::{DateTime, Duration, Utc};
use scriptgate::protocol::ops::names;
use scriptgate::{ApiHandler, ApiRequest, Sealer, ServiceConfig, StatusCode};

fn handler() -> ApiHandler {
    ApiHandler::new(&ServiceConfig::default(), Sealer::insecure_dev())
}

fn identity(principal: &str, role: &str, now: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "principal": principal,
        "role": role,
        "valid_until": now + Duration::hours(1),
    })
}

fn request(op: &str, payload: serde_json::Value) -> ApiRequest {
    ApiRequest {
        op: op.to_string(),
        request_id: "test".to_string(),
        payload,
    }
}

fn upload(h: &ApiHandler, now: DateTime<Utc>, key: &str, source: &str, tier: &str) -> String {
    let resp = h.dispatch_at(
        request(
            names::UPLOAD,
            serde_json::json!({
                "identity": identity("alice", "admin", now),
                "name": "s1",
                "key": key,
                "source": source,
                "tier": tier,
            }),
        ),
        now,
    );
    assert!(resp.ok, "upload failed: {:?}", resp.error);
    resp.payload.unwrap()["id"].as_str().unwrap().to_string()
}

fn fetch(h: &ApiHandler, now: DateTime<Utc>, key: &str) -> scriptgate::ApiResponse {
    h.dispatch_at(request(names::FETCH, serde_json::json!({ "key": key })), now)
}

// === Reference scenario ===

#[test]
fn test_upload_fetch_cooldown_cycle() {
    let h = handler();
    let now = Utc::now();

    // Upload: record created, tag non-empty, never fetched.
    let id = upload(&h, now, "k1", "print(1)", "light");
    let rec = h
        .registry()
        .get_by_id(&scriptgate::RecordId::from(id))
        .unwrap()
        .unwrap();
    assert!(!rec.integrity_tag.is_empty());
    assert_eq!(rec.usage.fetch_count, 0);

    // First fetch: served, body is the transformed payload.
    let resp = fetch(&h, now, "k1");
    assert!(resp.ok);
    assert_eq!(resp.payload.unwrap()["payload"], "print(1)");
    assert_eq!(
        h.registry().get_by_key("k1").unwrap().unwrap().usage.fetch_count,
        1
    );

    // Immediate second fetch: inside the cooldown.
    let resp = fetch(&h, now + Duration::seconds(5), "k1");
    assert!(!resp.ok);
    assert_eq!(resp.error.unwrap().code, StatusCode::TooManyRequests);

    // After the cooldown elapses: served again.
    let resp = fetch(&h, now + Duration::minutes(6), "k1");
    assert!(resp.ok);
    assert_eq!(
        h.registry().get_by_key("k1").unwrap().unwrap().usage.fetch_count,
        2
    );
}

// === Unauthorized lookups ===

#[test]
fn test_unknown_key_forbidden_and_audited_once() {
    let h = handler();
    let now = Utc::now();

    let resp = fetch(&h, now, "no-such-key");
    assert!(!resp.ok);
    assert_eq!(resp.error.unwrap().code, StatusCode::Forbidden);

    assert_eq!(h.auditor().len(), 1);
    let entries = h.auditor().export(
        &serde_json::from_value(identity("root", "admin", now)).unwrap(),
        &[],
    );
    assert_eq!(entries[0].attempted_key, "no-such-key");
}

// === Expiry ===

#[test]
fn test_expiry_boundary_is_gone() {
    let h = handler();
    let now = Utc::now();
    upload(&h, now, "k1", "print(1)", "none");

    // Default expiry is 30 days; the boundary instant itself is expired.
    let expiry = now + Duration::days(30);
    let resp = fetch(&h, expiry, "k1");
    assert!(!resp.ok);
    assert_eq!(resp.error.unwrap().code, StatusCode::Gone);

    // One second earlier the record is still alive.
    let resp = fetch(&h, expiry - Duration::seconds(1), "k1");
    assert!(resp.ok);
}

// === Integrity ===

#[test]
fn test_corruption_yields_generic_integrity_failure() {
    let h = handler();
    let now = Utc::now();
    let id = upload(&h, now, "k1", "print(1)", "none");
    let id = scriptgate::RecordId::from(id);

    // Flip stored payload bytes without touching the tag.
    h.registry()
        .update(&id, |r| r.payload.push_str("-- tampered"))
        .unwrap();

    let resp = fetch(&h, now, "k1");
    assert!(!resp.ok);
    let err = resp.error.unwrap();
    assert_eq!(err.code, StatusCode::IntegrityFailure);
    // No internal detail leaks to the client.
    assert_eq!(err.message, "integrity check failed");

    assert_eq!(
        h.registry().get_by_key("k1").unwrap().unwrap().usage.fetch_count,
        0
    );
}

// === Transform tiers over the wire ===

#[test]
fn test_fetch_body_reflects_tier() {
    let h = handler();
    let now = Utc::now();
    upload(&h, now, "light", "local x = 1 -- note\nprint( x )\n", "light");
    upload(&h, now, "heavy", "print(1)", "heavy");

    let resp = fetch(&h, now, "light");
    assert_eq!(resp.payload.unwrap()["payload"], "local x=1 print(x)");

    let resp = fetch(&h, now, "heavy");
    let body = resp.payload.unwrap()["payload"].as_str().unwrap().to_string();
    assert!(body.starts_with("-- "));
    assert!(body.contains("print(1)"));
}
