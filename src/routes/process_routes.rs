//! Process routes
//!
//! Drafting, autosave, publish, delete, plus the per-process
//! sub-resources: resonance toggle/status and peer feedback.

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::access;
use crate::db::{feedback, processes, profiles, resonances};
use crate::error::AtelierError;
use crate::routes::{
    authenticate, error_response, json_response, maybe_authenticate, parse_json_body, BoxBody,
};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct AutosaveRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub phase: Option<String>,
    pub visibility: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub reflection_question: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResonanceRequest {
    #[serde(default)]
    pub block_index: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedbackWithAuthor {
    #[serde(flatten)]
    pub feedback: feedback::FeedbackRow,
    pub author: Option<profiles::ProfileRow>,
}

/// POST /processes - observer-gated draft creation.
pub async fn handle_create(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match access::check_access(&state.db, &account_id) {
        Ok(status) if !status.can_post => {
            return error_response(&AtelierError::Forbidden(format!(
                "Observer mode: posting unlocks in {} days",
                status.days_left
            )));
        }
        Ok(_) => {}
        Err(e) => return error_response(&e),
    }

    match state.db.with_conn(|conn| processes::create_draft(conn, &account_id)) {
        Ok(draft) => json_response(StatusCode::CREATED, &draft),
        Err(e) => error_response(&e),
    }
}

/// GET /processes/{id} - owner always, others only published + public.
pub async fn handle_get(
    req: Request<Incoming>,
    state: Arc<AppState>,
    process_id: &str,
) -> Response<BoxBody> {
    let viewer_id = maybe_authenticate(&state, &req);

    let process = match state.db.with_conn(|conn| processes::get_process(conn, process_id)) {
        Ok(Some(p)) => p,
        Ok(None) => return error_response(&AtelierError::NotFound("Process not found".into())),
        Err(e) => return error_response(&e),
    };

    let is_owner = viewer_id.as_deref() == Some(process.owner_id.as_str());
    if !is_owner && !(process.status == "published" && process.visibility == "public") {
        return error_response(&AtelierError::NotFound("Process not found".into()));
    }

    json_response(StatusCode::OK, &process)
}

/// PATCH /processes/{id} - last-write-wins autosave, owner only.
pub async fn handle_autosave(
    req: Request<Incoming>,
    state: Arc<AppState>,
    process_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let body: AutosaveRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let update = processes::ProcessUpdate {
        title: body.title,
        description: body.description,
        phase: body.phase,
        visibility: body.visibility,
        media_url: body.media_url,
        media_type: body.media_type,
        reflection_question: body.reflection_question,
    };

    match state
        .db
        .with_conn(|conn| processes::autosave(conn, process_id, &account_id, &update))
    {
        Ok(process) => json_response(StatusCode::OK, &process),
        Err(e) => error_response(&e),
    }
}

/// POST /processes/{id}/publish - owner only, one-way transition.
///
/// An observer may still publish while they have zero published
/// processes; the documented first-post exception.
pub async fn handle_publish(
    req: Request<Incoming>,
    state: Arc<AppState>,
    process_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let access_status = match access::check_access(&state.db, &account_id) {
        Ok(s) => s,
        Err(e) => return error_response(&e),
    };
    if !access_status.can_post {
        let published = match state
            .db
            .with_conn(|conn| processes::count_published(conn, &account_id))
        {
            Ok(n) => n,
            Err(e) => return error_response(&e),
        };
        if !access::publish_allowed(&access_status, published) {
            return error_response(&AtelierError::Forbidden(format!(
                "Observer mode: publishing unlocks in {} days",
                access_status.days_left
            )));
        }
    }

    match state
        .db
        .with_conn(|conn| processes::publish(conn, process_id, &account_id))
    {
        Ok(process) => {
            info!(process_id, owner_id = %account_id, "published process");
            json_response(StatusCode::OK, &process)
        }
        Err(e) => error_response(&e),
    }
}

/// DELETE /processes/{id} - owner only.
pub async fn handle_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
    process_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| processes::delete_process(conn, process_id, &account_id))
    {
        Ok(()) => json_response(StatusCode::OK, &serde_json::json!({ "deleted": true })),
        Err(e) => error_response(&e),
    }
}

/// POST /processes/{id}/resonance - existence toggle.
pub async fn handle_resonance_toggle(
    req: Request<Incoming>,
    state: Arc<AppState>,
    process_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let body: ResonanceRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| resonances::toggle(conn, process_id, &account_id, body.block_index))
    {
        Ok(outcome) => json_response(StatusCode::OK, &outcome),
        Err(e) => error_response(&e),
    }
}

/// GET /processes/{id}/resonances - counts plus the caller's own flags.
pub async fn handle_resonance_status(
    req: Request<Incoming>,
    state: Arc<AppState>,
    process_id: &str,
) -> Response<BoxBody> {
    let viewer_id = maybe_authenticate(&state, &req);

    match state
        .db
        .with_conn(|conn| resonances::status(conn, process_id, viewer_id.as_deref()))
    {
        Ok(status) => json_response(StatusCode::OK, &status),
        Err(e) => error_response(&e),
    }
}

/// POST /processes/{id}/feedback
pub async fn handle_add_feedback(
    req: Request<Incoming>,
    state: Arc<AppState>,
    process_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let body: FeedbackRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    match state.db.with_conn(|conn| {
        feedback::add_feedback(
            conn,
            process_id,
            &account_id,
            &body.kind,
            &body.content,
            body.parent_id.as_deref(),
        )
    }) {
        Ok(row) => json_response(StatusCode::CREATED, &row),
        Err(e) => error_response(&e),
    }
}

/// GET /processes/{id}/feedback - oldest first, with author profiles.
pub async fn handle_list_feedback(
    _req: Request<Incoming>,
    state: Arc<AppState>,
    process_id: &str,
) -> Response<BoxBody> {
    let result = state.db.with_conn(|conn| {
        let rows = feedback::list_for_process(conn, process_id)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let author = profiles::get_profile(conn, &row.author_id)?;
            out.push(FeedbackWithAuthor {
                feedback: row,
                author,
            });
        }
        Ok(out)
    });

    match result {
        Ok(list) => json_response(StatusCode::OK, &list),
        Err(e) => error_response(&e),
    }
}
