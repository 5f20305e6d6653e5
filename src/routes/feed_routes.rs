//! Feed routes
//!
//! - GET /feed           - composed section sequence for the viewer
//! - GET /feed/discovery - the daily cross-state discovery batch

use chrono::Utc;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;

use crate::db::profiles;
use crate::feed::{self, day_key, FeedFilters};
use crate::routes::{
    error_response, json_response, maybe_authenticate, query_list, query_param, BoxBody,
};
use crate::server::AppState;

fn filters_from_query(req: &Request<Incoming>) -> FeedFilters {
    FeedFilters {
        disciplines: query_list(req, "disciplines"),
        phases: query_list(req, "phases"),
        needs_feedback: query_param(req, "needs_feedback").as_deref() == Some("true"),
        view: query_param(req, "view"),
    }
}

/// The viewer's creative state drives discovery; guests and profile-less
/// accounts read as Resting.
fn viewer_state(state: &Arc<AppState>, viewer_id: Option<&str>) -> String {
    viewer_id
        .and_then(|id| {
            state
                .db
                .with_conn(|conn| profiles::get_profile(conn, id))
                .ok()
                .flatten()
        })
        .map(|p| p.current_state)
        .unwrap_or_else(|| "Resting".to_string())
}

pub async fn handle_feed(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let viewer_id = maybe_authenticate(&state, &req);
    let filters = filters_from_query(&req);
    let current_state = viewer_state(&state, viewer_id.as_deref());
    let date_key = day_key(Utc::now());

    match feed::get_composed_feed(
        &state.db,
        viewer_id.as_deref(),
        &current_state,
        &filters,
        &date_key,
    ) {
        Ok(sections) => json_response(StatusCode::OK, &sections),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_discovery(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let viewer_id = maybe_authenticate(&state, &req);
    let current_state = viewer_state(&state, viewer_id.as_deref());
    let date_key = day_key(Utc::now());

    match feed::get_discovery(&state.db, viewer_id.as_deref(), &current_state, &date_key) {
        Ok(processes) => json_response(StatusCode::OK, &processes),
        Err(e) => error_response(&e),
    }
}
