//! Mentor route
//!
//! GET /processes/{id}/mentor?refresh= - cached or freshly generated
//! advice. The backend failing in any way produces a soft unavailable
//! response, never an error status.

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{mentor_notes, processes};
use crate::error::AtelierError;
use crate::mentor;
use crate::routes::{authenticate, error_response, json_response, query_param, BoxBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct MentorResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<mentor_notes::MentorNoteRow>,
}

pub async fn handle_mentor(
    req: Request<Incoming>,
    state: Arc<AppState>,
    process_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let refresh = query_param(&req, "refresh").as_deref() == Some("true");

    // Mentor advice is for the process owner
    let process = match state.db.with_conn(|conn| processes::get_process(conn, process_id)) {
        Ok(Some(p)) => p,
        Ok(None) => return error_response(&AtelierError::NotFound("Process not found".into())),
        Err(e) => return error_response(&e),
    };
    if process.owner_id != account_id {
        return error_response(&AtelierError::Forbidden(
            "Only the owner can consult the mentor".into(),
        ));
    }

    let backend = match &state.mentor {
        Some(backend) => backend,
        None => {
            return json_response(
                StatusCode::OK,
                &MentorResponse {
                    available: false,
                    note: None,
                },
            );
        }
    };

    match mentor::advice_for_process(&state.db, backend, process_id, refresh).await {
        Ok(Some(note)) => json_response(
            StatusCode::OK,
            &MentorResponse {
                available: true,
                note: Some(note),
            },
        ),
        Ok(None) => json_response(
            StatusCode::OK,
            &MentorResponse {
                available: false,
                note: None,
            },
        ),
        Err(e) => error_response(&e),
    }
}
