//! Atelier - API server for the IN-CREATION creative-process network
//!
//! A social network for documenting creative process rather than finished
//! output: works-in-progress, peer feedback, resonance, direct messages,
//! a deterministic daily discovery shuffle, an AI mentor, and pro-plan
//! co-processes.
//!
//! ## Services
//!
//! - **HTTP API**: hyper-based JSON API with JWT auth
//! - **Storage**: SQLite via rusqlite, single writer behind a mutex
//! - **Mentor**: OpenAI-compatible completion backend, cached per process
//! - **Billing**: Stripe checkout/portal plus a signed webhook

pub mod access;
pub mod auth;
pub mod billing;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod mentor;
pub mod routes;
pub mod server;

pub use config::Args;
pub use error::{AtelierError, Result};
pub use server::{run, AppState};
