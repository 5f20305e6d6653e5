//! Minimal Stripe REST client.
//!
//! Talks to the three endpoints the upgrade flow needs (customers,
//! checkout sessions, billing portal sessions) with form-encoded bodies
//! and the secret key as a bearer token. Nothing else from the Stripe
//! surface is wrapped.

use reqwest::Client;
use serde::Deserialize;

use crate::error::{AtelierError, Result};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: String,
}

/// The slice of a Stripe object we read back.
#[derive(Debug, Deserialize)]
pub struct StripeObject {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: STRIPE_API_BASE.to_string(),
            secret_key: secret_key.into(),
        }
    }

    async fn post_form(&self, path: &str, form: &[(String, String)]) -> Result<StripeObject> {
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| AtelierError::Billing(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AtelierError::Billing(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AtelierError::Billing(e.to_string()))
    }

    /// Create a customer tagged with our account id.
    pub async fn create_customer(&self, email: &str, account_id: &str) -> Result<StripeObject> {
        let form = vec![
            ("email".to_string(), email.to_string()),
            ("metadata[accountId]".to_string(), account_id.to_string()),
        ];
        self.post_form("/customers", &form).await
    }

    /// Create a subscription checkout session for an existing customer.
    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        account_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<StripeObject> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("line_items[0][price]".to_string(), price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("mode".to_string(), "subscription".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
            ("metadata[accountId]".to_string(), account_id.to_string()),
        ];
        self.post_form("/checkout/sessions", &form).await
    }

    /// Create a billing portal session for an existing customer.
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<StripeObject> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        self.post_form("/billing_portal/sessions", &form).await
    }
}
