//! Moderation routes
//!
//! - POST /moderation/block  - hide an author from the caller's feed
//! - POST /moderation/report - file a report against content or a profile

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::social;
use crate::routes::{authenticate, error_response, json_response, parse_json_body, BoxBody};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub blocked_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub target_id: String,
    pub target_type: String,
    pub reason: String,
}

pub async fn handle_block(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let body: BlockRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| social::block(conn, &account_id, &body.blocked_id))
    {
        Ok(()) => json_response(StatusCode::OK, &serde_json::json!({ "blocked": true })),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_report(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let body: ReportRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state.db.with_conn(|conn| {
        social::report(
            conn,
            &account_id,
            &body.target_id,
            &body.target_type,
            &body.reason,
        )
    }) {
        Ok(()) => {
            info!(
                reporter = %account_id,
                target_type = %body.target_type,
                "report filed"
            );
            json_response(StatusCode::CREATED, &serde_json::json!({ "reported": true }))
        }
        Err(e) => error_response(&e),
    }
}
