//! Stripe webhook verification and event application.
//!
//! The `Stripe-Signature` header carries `t=<unix>,v1=<hex hmac>` pairs.
//! The signed payload is `"{t}.{raw body}"`, keyed with the endpoint
//! secret. Verification uses the Mac's constant-time check and rejects
//! timestamps outside the tolerance window.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{info, warn};

use crate::db::{profiles, Db};
use crate::error::{AtelierError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed payload, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// The slice of a Stripe event we act on.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: EventObject,
}

#[derive(Debug, Deserialize)]
pub struct EventObject {
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Verify a `Stripe-Signature` header against the raw request body.
pub fn verify_signature(
    header: &str,
    payload: &str,
    secret: &str,
    now_unix: i64,
) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<String> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AtelierError::Invalid("malformed signature header".to_string()))?;
    if signatures.is_empty() {
        return Err(AtelierError::Invalid(
            "malformed signature header".to_string(),
        ));
    }

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(AtelierError::Invalid(
            "signature timestamp outside tolerance".to_string(),
        ));
    }

    let signed_payload = format!("{}.{}", timestamp, payload);
    for signature in &signatures {
        let expected = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(_) => continue,
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AtelierError::Internal(e.to_string()))?;
        mac.update(signed_payload.as_bytes());
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(AtelierError::Invalid("signature mismatch".to_string()))
}

/// Apply a verified event to the profile it concerns. Returns true when a
/// plan change happened, false for event types or customers we ignore.
pub fn apply_event(db: &Db, event: &StripeEvent) -> Result<bool> {
    let plan = match event.event_type.as_str() {
        "checkout.session.completed" => "pro",
        "customer.subscription.deleted" => "free",
        "customer.subscription.updated" => {
            match event.data.object.status.as_deref() {
                Some("active") | Some("trialing") => "pro",
                _ => "free",
            }
        }
        other => {
            info!(event_type = other, "ignoring stripe event");
            return Ok(false);
        }
    };

    db.with_conn(|conn| {
        let profile = match &event.data.object.customer {
            Some(customer_id) => profiles::get_profile_by_stripe_customer(conn, customer_id)?,
            None => None,
        };
        // Checkout sessions also carry our account id in metadata
        let profile = match profile {
            Some(p) => Some(p),
            None => event
                .data
                .object
                .metadata
                .as_ref()
                .and_then(|m| m.get("accountId"))
                .and_then(|v| v.as_str())
                .map(|id| profiles::get_profile(conn, id))
                .transpose()?
                .flatten(),
        };

        match profile {
            Some(profile) => {
                profiles::set_plan(conn, &profile.id, plan)?;
                info!(
                    account_id = %profile.id,
                    plan,
                    event_type = %event.event_type,
                    "applied stripe event"
                );
                Ok(true)
            }
            None => {
                warn!(event_type = %event.event_type, "stripe event for unknown customer");
                Ok(false)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn sign(payload: &str, timestamp: i64) -> String {
        let signed_payload = format!("{}.{}", timestamp, payload);
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_verifies() {
        let payload = r#"{"type":"checkout.session.completed"}"#;
        let header = sign(payload, 1_700_000_000);
        assert!(verify_signature(&header, payload, SECRET, 1_700_000_100).is_ok());
    }

    #[test]
    fn tampered_payload_rejected() {
        let payload = r#"{"type":"checkout.session.completed"}"#;
        let header = sign(payload, 1_700_000_000);
        assert!(verify_signature(&header, "something else", SECRET, 1_700_000_100).is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let payload = "{}";
        let header = sign(payload, 1_700_000_000);
        assert!(verify_signature(&header, payload, "whsec_other", 1_700_000_100).is_err());
    }

    #[test]
    fn stale_timestamp_rejected() {
        let payload = "{}";
        let header = sign(payload, 1_700_000_000);
        let late = 1_700_000_000 + SIGNATURE_TOLERANCE_SECS + 1;
        assert!(verify_signature(&header, payload, SECRET, late).is_err());
    }

    #[test]
    fn malformed_header_rejected() {
        assert!(verify_signature("nonsense", "{}", SECRET, 0).is_err());
        assert!(verify_signature("t=abc,v1=", "{}", SECRET, 0).is_err());
    }

    fn seeded_db() -> Db {
        let db = Db::open_in_memory().unwrap();
        db.with_conn(|conn| {
            crate::db::accounts::create_account(conn, "a1", "maker@example.com", "hash")?;
            crate::db::profiles::create_profile(conn, "a1", Some("maker"))?;
            crate::db::profiles::set_stripe_customer(conn, "a1", "cus_1")
        })
        .unwrap();
        db
    }

    fn event(event_type: &str, customer: Option<&str>, status: Option<&str>) -> StripeEvent {
        StripeEvent {
            event_type: event_type.to_string(),
            data: EventData {
                object: EventObject {
                    customer: customer.map(String::from),
                    status: status.map(String::from),
                    metadata: None,
                },
            },
        }
    }

    #[test]
    fn checkout_completed_flips_plan_to_pro() {
        let db = seeded_db();
        let applied =
            apply_event(&db, &event("checkout.session.completed", Some("cus_1"), None)).unwrap();
        assert!(applied);
        let profile = db
            .with_conn(|conn| profiles::get_profile(conn, "a1"))
            .unwrap()
            .unwrap();
        assert_eq!(profile.plan, "pro");
    }

    #[test]
    fn subscription_deleted_reverts_to_free() {
        let db = seeded_db();
        apply_event(&db, &event("checkout.session.completed", Some("cus_1"), None)).unwrap();
        apply_event(&db, &event("customer.subscription.deleted", Some("cus_1"), None)).unwrap();
        let profile = db
            .with_conn(|conn| profiles::get_profile(conn, "a1"))
            .unwrap()
            .unwrap();
        assert_eq!(profile.plan, "free");
    }

    #[test]
    fn subscription_updated_tracks_status() {
        let db = seeded_db();
        apply_event(
            &db,
            &event("customer.subscription.updated", Some("cus_1"), Some("active")),
        )
        .unwrap();
        let plan = db
            .with_conn(|conn| profiles::get_profile(conn, "a1"))
            .unwrap()
            .unwrap()
            .plan;
        assert_eq!(plan, "pro");

        apply_event(
            &db,
            &event("customer.subscription.updated", Some("cus_1"), Some("past_due")),
        )
        .unwrap();
        let plan = db
            .with_conn(|conn| profiles::get_profile(conn, "a1"))
            .unwrap()
            .unwrap()
            .plan;
        assert_eq!(plan, "free");
    }

    #[test]
    fn unknown_customer_is_ignored() {
        let db = seeded_db();
        let applied =
            apply_event(&db, &event("checkout.session.completed", Some("cus_nope"), None)).unwrap();
        assert!(!applied);
    }

    #[test]
    fn unrelated_event_is_ignored() {
        let db = seeded_db();
        let applied = apply_event(&db, &event("invoice.paid", Some("cus_1"), None)).unwrap();
        assert!(!applied);
    }
}
