//! Profile and follow routes
//!
//! - GET   /profiles/{id}
//! - PATCH /profile            - own row
//! - POST  /profile/state      - quick creative-state switch
//! - POST/DELETE/GET /profiles/{id}/follow
//! - GET   /profiles/search?q=

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{profiles, social};
use crate::error::AtelierError;
use crate::routes::{
    authenticate, error_response, json_response, maybe_authenticate, parse_json_body, query_param,
    BoxBody,
};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub disciplines: Option<Vec<String>>,
    pub current_state: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StateRequest {
    pub current_state: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub profile: profiles::ProfileRow,
    pub is_following: bool,
    pub is_self: bool,
}

pub async fn handle_get(
    req: Request<Incoming>,
    state: Arc<AppState>,
    profile_id: &str,
) -> Response<BoxBody> {
    let _ = maybe_authenticate(&state, &req);
    match state.db.with_conn(|conn| profiles::get_profile(conn, profile_id)) {
        Ok(Some(profile)) => json_response(StatusCode::OK, &profile),
        Ok(None) => error_response(&AtelierError::NotFound("Profile not found".into())),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_update(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let body: ProfileUpdateRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let update = profiles::ProfileUpdate {
        username: body.username,
        full_name: body.full_name,
        bio: body.bio,
        disciplines: body.disciplines,
        current_state: body.current_state,
        avatar_url: body.avatar_url,
    };

    match state
        .db
        .with_conn(|conn| profiles::update_profile(conn, &account_id, &update))
    {
        Ok(profile) => json_response(StatusCode::OK, &profile),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_set_state(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let body: StateRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let update = profiles::ProfileUpdate {
        current_state: Some(body.current_state),
        ..Default::default()
    };

    match state
        .db
        .with_conn(|conn| profiles::update_profile(conn, &account_id, &update))
    {
        Ok(profile) => json_response(StatusCode::OK, &profile),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_follow(
    req: Request<Incoming>,
    state: Arc<AppState>,
    profile_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| social::follow(conn, &account_id, profile_id))
    {
        Ok(()) => json_response(StatusCode::OK, &serde_json::json!({ "following": true })),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_unfollow(
    req: Request<Incoming>,
    state: Arc<AppState>,
    profile_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| social::unfollow(conn, &account_id, profile_id))
    {
        Ok(()) => json_response(StatusCode::OK, &serde_json::json!({ "following": false })),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_follow_status(
    req: Request<Incoming>,
    state: Arc<AppState>,
    profile_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| social::is_following(conn, &account_id, profile_id))
    {
        Ok(following) => json_response(StatusCode::OK, &serde_json::json!({ "following": following })),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_search(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let viewer_id = maybe_authenticate(&state, &req);
    let query = query_param(&req, "q").unwrap_or_default();
    let query = query.trim().to_string();

    if query.len() < 2 {
        return json_response(StatusCode::OK, &Vec::<SearchResult>::new());
    }

    let result = state.db.with_conn(|conn| {
        let rows = profiles::search_profiles(conn, &query)?;
        let mut out = Vec::with_capacity(rows.len());
        for profile in rows {
            let is_self = viewer_id.as_deref() == Some(profile.id.as_str());
            let is_following = match &viewer_id {
                Some(viewer) if !is_self => social::is_following(conn, viewer, &profile.id)?,
                _ => false,
            };
            out.push(SearchResult {
                profile,
                is_following,
                is_self,
            });
        }
        Ok(out)
    });

    match result {
        Ok(list) => json_response(StatusCode::OK, &list),
        Err(e) => error_response(&e),
    }
}
