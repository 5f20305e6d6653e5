//! Atelier - API server for the IN-CREATION creative-process network

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier::{config::Args, db::Db, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("atelier={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Atelier - IN-CREATION API server");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Database: {}", args.database_path.display());
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!(
        "Mentor: {}",
        args.mentor_base_url.as_deref().unwrap_or("disabled")
    );
    info!(
        "Billing: {}",
        if args.stripe_secret_key.is_some() {
            "configured"
        } else {
            "disabled"
        }
    );
    info!("======================================");

    let db = match Db::open(&args.database_path) {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState::new(args, db)?);
    server::run(state).await?;

    Ok(())
}
