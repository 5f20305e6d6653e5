//! Billing routes
//!
//! - POST /billing/checkout - start a subscription checkout
//! - POST /billing/portal   - open the customer portal
//! - POST /webhooks/stripe  - signature-verified event ingestion

use chrono::Utc;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::billing;
use crate::error::AtelierError;
use crate::routes::{
    authenticate, error_response, json_response, read_raw_body, BoxBody,
};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub url: String,
}

fn billing_unconfigured() -> Response<BoxBody> {
    error_response(&AtelierError::Billing("Billing is not configured".into()))
}

pub async fn handle_checkout(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let (stripe, price_id) = match (&state.stripe, &state.args.stripe_price_id_pro) {
        (Some(stripe), Some(price_id)) => (stripe, price_id),
        _ => return billing_unconfigured(),
    };

    match billing::start_checkout(&state.db, stripe, price_id, &state.args.base_url, &account_id)
        .await
    {
        Ok(url) => json_response(StatusCode::OK, &SessionResponse { url }),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_portal(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let stripe = match &state.stripe {
        Some(stripe) => stripe,
        None => return billing_unconfigured(),
    };

    match billing::open_portal(&state.db, stripe, &state.args.base_url, &account_id).await {
        Ok(url) => json_response(StatusCode::OK, &SessionResponse { url }),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_webhook(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let secret = match &state.args.stripe_webhook_secret {
        Some(secret) => secret.clone(),
        None => {
            warn!("stripe webhook received but no signing secret configured");
            return billing_unconfigured();
        }
    };

    let signature = match req
        .headers()
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
    {
        Some(s) => s,
        None => {
            return error_response(&AtelierError::Invalid(
                "Missing Stripe-Signature header".into(),
            ));
        }
    };

    let bytes = match read_raw_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };
    let payload = match std::str::from_utf8(&bytes) {
        Ok(p) => p,
        Err(_) => return error_response(&AtelierError::Invalid("Body is not UTF-8".into())),
    };

    if let Err(e) = billing::verify_signature(&signature, payload, &secret, Utc::now().timestamp())
    {
        warn!(error = %e, "stripe webhook signature rejected");
        return error_response(&e);
    }

    let event: billing::StripeEvent = match serde_json::from_str(payload) {
        Ok(e) => e,
        Err(e) => {
            return error_response(&AtelierError::Invalid(format!("Malformed event: {}", e)));
        }
    };

    match billing::apply_event(&state.db, &event) {
        Ok(applied) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "received": true, "applied": applied }),
        ),
        Err(e) => error_response(&e),
    }
}
