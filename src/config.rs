//! Configuration for atelier
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Atelier - API server for the IN-CREATION creative-process network
#[derive(Parser, Debug, Clone)]
#[command(name = "atelier")]
#[command(about = "API server for IN-CREATION")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Path to the SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "atelier.db")]
    pub database_path: PathBuf,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "86400")]
    pub jwt_expiry_seconds: u64,

    /// Enable development mode (generates an ephemeral JWT secret if unset)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Base URL of the OpenAI-compatible mentor backend
    #[arg(long, env = "MENTOR_BASE_URL")]
    pub mentor_base_url: Option<String>,

    /// Model name for mentor completions
    #[arg(long, env = "MENTOR_MODEL", default_value = "gpt-4o-mini")]
    pub mentor_model: String,

    /// API key for the mentor backend
    #[arg(long, env = "MENTOR_API_KEY")]
    pub mentor_api_key: Option<String>,

    /// Stripe secret key
    #[arg(long, env = "STRIPE_SECRET_KEY")]
    pub stripe_secret_key: Option<String>,

    /// Stripe webhook signing secret
    #[arg(long, env = "STRIPE_WEBHOOK_SECRET")]
    pub stripe_webhook_secret: Option<String>,

    /// Stripe price id for the pro subscription
    #[arg(long, env = "STRIPE_PRICE_ID_PRO")]
    pub stripe_price_id_pro: Option<String>,

    /// Public base URL of the frontend, used for checkout redirects
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:3000")]
    pub base_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate the configuration before startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.is_none() && !self.dev_mode {
            return Err("JWT_SECRET is required outside dev mode".into());
        }
        if let Some(secret) = &self.jwt_secret {
            if secret.len() < 32 {
                return Err("JWT_SECRET must be at least 32 bytes".into());
            }
        }
        if self.stripe_webhook_secret.is_some() && self.stripe_secret_key.is_none() {
            return Err("STRIPE_WEBHOOK_SECRET set without STRIPE_SECRET_KEY".into());
        }
        Ok(())
    }
}
