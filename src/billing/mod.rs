//! Pro-plan billing.
//!
//! Checkout and portal flows against the Stripe REST API, plus the
//! webhook that folds subscription lifecycle events back into the
//! profile's plan column.

pub mod client;
pub mod webhook;

use crate::db::{accounts, profiles, Db};
use crate::error::{AtelierError, Result};

pub use client::StripeClient;
pub use webhook::{apply_event, verify_signature, StripeEvent};

/// Where the upgrade flow lands after checkout.
const CHECKOUT_DESTINATION: &str = "/co-process";

/// Start a subscription checkout for an account. Creates and persists a
/// Stripe customer on first use; an account already on pro skips Stripe
/// entirely and gets the destination URL back.
pub async fn start_checkout(
    db: &Db,
    stripe: &StripeClient,
    price_id: &str,
    base_url: &str,
    account_id: &str,
) -> Result<String> {
    let (email, profile) = db.with_conn(|conn| {
        let account = accounts::get_account(conn, account_id)?
            .ok_or_else(|| AtelierError::NotFound("account".to_string()))?;
        let profile = profiles::get_profile(conn, account_id)?
            .ok_or_else(|| AtelierError::NotFound("profile".to_string()))?;
        Ok((account.identifier, profile))
    })?;

    if profile.plan == "pro" {
        return Ok(format!("{}{}", base_url, CHECKOUT_DESTINATION));
    }

    let customer_id = match profile.stripe_customer_id {
        Some(id) => id,
        None => {
            let customer = stripe.create_customer(&email, account_id).await?;
            db.with_conn(|conn| profiles::set_stripe_customer(conn, account_id, &customer.id))?;
            customer.id
        }
    };

    let success_url = format!("{}{}?success=true", base_url, CHECKOUT_DESTINATION);
    let cancel_url = format!("{}{}?canceled=true", base_url, CHECKOUT_DESTINATION);
    let session = stripe
        .create_checkout_session(&customer_id, price_id, account_id, &success_url, &cancel_url)
        .await?;

    session
        .url
        .ok_or_else(|| AtelierError::Billing("checkout session has no url".to_string()))
}

/// Open the customer portal for an account with an existing subscription.
pub async fn open_portal(
    db: &Db,
    stripe: &StripeClient,
    base_url: &str,
    account_id: &str,
) -> Result<String> {
    let profile = db.with_conn(|conn| profiles::get_profile(conn, account_id))?;
    let customer_id = profile
        .and_then(|p| p.stripe_customer_id)
        .ok_or_else(|| AtelierError::Billing("No subscription found".to_string()))?;

    let return_url = format!("{}/settings", base_url);
    let session = stripe.create_portal_session(&customer_id, &return_url).await?;

    session
        .url
        .ok_or_else(|| AtelierError::Billing("portal session has no url".to_string()))
}
