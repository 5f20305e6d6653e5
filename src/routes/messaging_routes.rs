//! Conversation and message routes
//!
//! - POST /conversations               - get-or-create (observer-gated)
//! - GET  /conversations               - the caller's conversation list
//! - GET  /conversations/{id}          - participants only, with messages
//! - POST /conversations/{id}/messages - append; blank content is a no-op

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::access;
use crate::db::{conversations, messages, profiles};
use crate::error::AtelierError;
use crate::routes::{
    authenticate, error_response, json_response, parse_json_body, BoxBody,
};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub participant_id: String,
    pub context_type: String,
    #[serde(default)]
    pub context_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: conversations::ConversationRow,
    pub participants: Vec<Option<profiles::ProfileRow>>,
    pub messages: Vec<messages::MessageRow>,
}

pub async fn handle_create(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match access::check_access(&state.db, &account_id) {
        Ok(status) if !status.can_message => {
            return error_response(&AtelierError::Forbidden(format!(
                "Observer mode: messaging unlocks in {} days",
                status.days_left
            )));
        }
        Ok(_) => {}
        Err(e) => return error_response(&e),
    }

    let body: CreateConversationRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let result = state.db.with_conn(|conn| {
        let id = conversations::get_or_create(
            conn,
            &account_id,
            &body.participant_id,
            &body.context_type,
            body.context_id.as_deref(),
        )?;
        conversations::get_conversation(conn, &id)?
            .ok_or_else(|| AtelierError::Internal("Conversation vanished".into()))
    });

    match result {
        Ok(conversation) => json_response(StatusCode::OK, &conversation),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_list(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    match state
        .db
        .with_conn(|conn| conversations::list_for_account(conn, &account_id))
    {
        Ok(list) => json_response(StatusCode::OK, &list),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_get(
    req: Request<Incoming>,
    state: Arc<AppState>,
    conversation_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let result = state.db.with_conn(|conn| {
        let conversation = conversations::get_conversation(conn, conversation_id)?
            .ok_or_else(|| AtelierError::NotFound("Conversation not found".into()))?;
        if !conversation.is_participant(&account_id) {
            return Err(AtelierError::Forbidden(
                "Not a participant in this conversation".into(),
            ));
        }
        let participants = vec![
            profiles::get_profile(conn, &conversation.participant_a)?,
            profiles::get_profile(conn, &conversation.participant_b)?,
        ];
        let messages = messages::list_for_conversation(conn, conversation_id)?;
        Ok(ConversationDetail {
            conversation,
            participants,
            messages,
        })
    });

    match result {
        Ok(detail) => json_response(StatusCode::OK, &detail),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_send(
    req: Request<Incoming>,
    state: Arc<AppState>,
    conversation_id: &str,
) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };
    let body: SendMessageRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    // Blank content is silently accepted without writing a row
    if body.content.trim().is_empty() {
        return json_response(StatusCode::OK, &serde_json::json!({ "sent": false }));
    }

    let result = state.db.with_conn(|conn| {
        let conversation = conversations::get_conversation(conn, conversation_id)?
            .ok_or_else(|| AtelierError::NotFound("Conversation not found".into()))?;
        if !conversation.is_participant(&account_id) {
            return Err(AtelierError::Forbidden(
                "Not a participant in this conversation".into(),
            ));
        }
        messages::append(conn, conversation_id, &account_id, body.content.trim())
    });

    match result {
        Ok(message) => json_response(StatusCode::CREATED, &message),
        Err(e) => error_response(&e),
    }
}
