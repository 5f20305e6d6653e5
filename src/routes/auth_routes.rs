//! Authentication routes
//!
//! - POST /auth/register - create account + profile, return a token
//! - POST /auth/login    - authenticate and get a JWT
//! - GET  /auth/me       - identity plus access status for the banner

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::access::{self, AccessStatus};
use crate::auth::{hash_password, verify_password};
use crate::db::{accounts, profiles};
use crate::error::AtelierError;
use crate::routes::{
    authenticate, error_response, json_response, parse_json_body, BoxBody, ErrorResponse,
};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub identifier: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub account_id: String,
    pub identifier: String,
    pub expires_at: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub account_id: String,
    pub identifier: String,
    pub profile: Option<profiles::ProfileRow>,
    pub access: AccessStatus,
}

const LOGIN_FAILED: &str = "Invalid credentials";

pub async fn handle_register(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: RegisterRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    if body.identifier.trim().is_empty() || body.password.is_empty() {
        return json_response(
            StatusCode::BAD_REQUEST,
            &ErrorResponse {
                error: "Missing required fields: identifier, password".into(),
            },
        );
    }

    let password_hash = match hash_password(&body.password) {
        Ok(h) => h,
        Err(e) => return error_response(&AtelierError::Auth(e.to_string())),
    };

    let account_id = uuid::Uuid::new_v4().to_string();
    let identifier = body.identifier.trim().to_string();
    let username = body.username.as_deref().map(str::trim).filter(|u| !u.is_empty());

    let created = state.db.with_conn(|conn| {
        accounts::create_account(conn, &account_id, &identifier, &password_hash)?;
        profiles::create_profile(conn, &account_id, username)
    });
    if let Err(e) = created {
        return error_response(&e);
    }

    let (token, expires_at) = match state.jwt.issue(&account_id) {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };

    info!(account_id = %account_id, "registered account");
    json_response(
        StatusCode::CREATED,
        &AuthResponse {
            token,
            account_id,
            identifier,
            expires_at,
        },
    )
}

pub async fn handle_login(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let body: LoginRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let account = match state
        .db
        .with_conn(|conn| accounts::get_account_by_identifier(conn, body.identifier.trim()))
    {
        Ok(Some(account)) => account,
        Ok(None) => {
            // Same message as a bad password, no user enumeration
            return json_response(
                StatusCode::UNAUTHORIZED,
                &ErrorResponse {
                    error: LOGIN_FAILED.into(),
                },
            );
        }
        Err(e) => return error_response(&e),
    };

    if !account.is_active {
        warn!(account_id = %account.id, "login attempt on inactive account");
        return json_response(
            StatusCode::UNAUTHORIZED,
            &ErrorResponse {
                error: LOGIN_FAILED.into(),
            },
        );
    }

    match verify_password(&body.password, &account.password_hash) {
        Ok(true) => {}
        _ => {
            return json_response(
                StatusCode::UNAUTHORIZED,
                &ErrorResponse {
                    error: LOGIN_FAILED.into(),
                },
            );
        }
    }

    let (token, expires_at) = match state.jwt.issue(&account.id) {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };

    json_response(
        StatusCode::OK,
        &AuthResponse {
            token,
            account_id: account.id,
            identifier: account.identifier,
            expires_at,
        },
    )
}

pub async fn handle_me(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let account_id = match authenticate(&state, &req) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let result = state.db.with_conn(|conn| {
        let account = accounts::get_account(conn, &account_id)?
            .ok_or_else(|| AtelierError::Unauthorized("Account no longer exists".into()))?;
        let profile = profiles::get_profile(conn, &account_id)?;
        Ok((account, profile))
    });
    let (account, profile) = match result {
        Ok(pair) => pair,
        Err(e) => return error_response(&e),
    };

    let access = match access::check_access(&state.db, &account_id) {
        Ok(a) => a,
        Err(e) => return error_response(&e),
    };

    json_response(
        StatusCode::OK,
        &MeResponse {
            account_id: account.id,
            identifier: account.identifier,
            profile,
            access,
        },
    )
}
