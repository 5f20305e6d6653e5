//! Co-process routes
//!
//! Small shared workspaces for pro accounts: one active per owner, up to
//! four members, entries with lightweight feedback.

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::{coprocess, profiles};
use crate::error::AtelierError;
use crate::routes::{authenticate, error_response, json_response, parse_json_body, BoxBody};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EntryRequest {
    pub content: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct EntryFeedbackRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CoProcessDetail {
    #[serde(flatten)]
    pub co_process: coprocess::CoProcessRow,
    pub members: Vec<coprocess::MemberRow>,
    pub entries: Vec<coprocess::EntryRow>,
}

fn require_pro(state: &Arc<AppState>, account_id: &str) -> Result<(), AtelierError> {
    let profile = state
        .db
        .with_conn(|conn| profiles::get_profile(conn, account_id))?
        .ok_or_else(|| AtelierError::NotFound("Profile not found".into()))?;
    if profile.plan != "pro" {
        return Err(AtelierError::Forbidden(
            "Co-processes require a pro plan".into(),
        ));
    }
    Ok(())
}

pub async fn handle_create(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = require_pro(&state, &account_id) {
        return error_response(&e);
    }
    let body: CreateRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state.db.with_conn(|conn| {
        coprocess::create(conn, &account_id, &body.title, body.description.as_deref())
    }) {
        Ok(row) => {
            info!(co_process_id = %row.id, owner_id = %account_id, "created co-process");
            json_response(StatusCode::CREATED, &row)
        }
        Err(e) => error_response(&e),
    }
}

pub async fn handle_get(
    req: Request<Incoming>,
    state: Arc<AppState>,
    co_process_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let result = state.db.with_conn(|conn| {
        let co_process = coprocess::get(conn, co_process_id)?
            .ok_or_else(|| AtelierError::NotFound("Co-process not found".into()))?;
        if !coprocess::is_member(conn, co_process_id, &account_id)? {
            return Err(AtelierError::Forbidden(
                "Not a member of this co-process".into(),
            ));
        }
        let members = coprocess::members(conn, co_process_id)?;
        let entries = coprocess::entries(conn, co_process_id)?;
        Ok(CoProcessDetail {
            co_process,
            members,
            entries,
        })
    });

    match result {
        Ok(detail) => json_response(StatusCode::OK, &detail),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_add_entry(
    req: Request<Incoming>,
    state: Arc<AppState>,
    co_process_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let body: EntryRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let result = state.db.with_conn(|conn| {
        let co_process = coprocess::get(conn, co_process_id)?
            .ok_or_else(|| AtelierError::NotFound("Co-process not found".into()))?;
        if co_process.status != "active" {
            return Err(AtelierError::Invalid("This co-process is closed".into()));
        }
        if !coprocess::is_member(conn, co_process_id, &account_id)? {
            return Err(AtelierError::Forbidden(
                "Not a member of this co-process".into(),
            ));
        }
        coprocess::add_entry(
            conn,
            co_process_id,
            &account_id,
            &body.content,
            body.media_url.as_deref(),
            body.media_type.as_deref(),
        )
    });

    match result {
        Ok(entry) => json_response(StatusCode::CREATED, &entry),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_invite(
    req: Request<Incoming>,
    state: Arc<AppState>,
    co_process_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let body: InviteRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let result = state.db.with_conn(|conn| {
        let co_process = coprocess::get(conn, co_process_id)?
            .ok_or_else(|| AtelierError::NotFound("Co-process not found".into()))?;
        if co_process.owner_id != account_id {
            return Err(AtelierError::Forbidden(
                "Only the owner can invite members".into(),
            ));
        }
        let invitee = profiles::get_profile_by_username(conn, body.username.trim())?
            .ok_or_else(|| AtelierError::NotFound("No profile with that username".into()))?;
        coprocess::add_member(conn, co_process_id, &invitee.id)?;
        coprocess::members(conn, co_process_id)
    });

    match result {
        Ok(members) => json_response(StatusCode::OK, &members),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_close(
    req: Request<Incoming>,
    state: Arc<AppState>,
    co_process_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| coprocess::close(conn, co_process_id, &account_id))
    {
        Ok(()) => json_response(StatusCode::OK, &serde_json::json!({ "status": "closed" })),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_entry_feedback(
    req: Request<Incoming>,
    state: Arc<AppState>,
    entry_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let body: EntryFeedbackRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let result = state.db.with_conn(|conn| {
        let co_process_id = coprocess::co_process_of_entry(conn, entry_id)?
            .ok_or_else(|| AtelierError::NotFound("Entry not found".into()))?;
        if !coprocess::is_member(conn, &co_process_id, &account_id)? {
            return Err(AtelierError::Forbidden(
                "Not a member of this co-process".into(),
            ));
        }
        coprocess::add_entry_feedback(
            conn,
            entry_id,
            &account_id,
            &body.kind,
            body.content.as_deref(),
        )
    });

    match result {
        Ok(row) => json_response(StatusCode::CREATED, &row),
        Err(e) => error_response(&e),
    }
}
