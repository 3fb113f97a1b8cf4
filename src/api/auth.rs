use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{TokenPair, TokenType};
use crate::error::{AppError, AppResult};
use crate::social::{users, SocialError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Serialize)]
pub struct AccessResponse {
    pub access: String,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/token", post(obtain))
        .route("/auth/token/refresh", post(refresh))
        .route("/auth/token/verify", post(verify))
}

/// Exchange username and password for an access/refresh pair.
async fn obtain(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> AppResult<Json<TokenPair>> {
    let user = {
        let conn = state.db.get()?;
        users::authenticate(&conn, &req.username, &req.password)?
    };
    let pair = state.jwt.issue_pair(&user.id, &user.username)?;
    tracing::info!(user_id = %user.id, "Issued token pair");
    Ok(Json(pair))
}

async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<AccessResponse>> {
    let claims = state.jwt.verify(&req.refresh, TokenType::Refresh)?;
    // The account may have been deactivated or deleted since the refresh token was issued.
    let user = {
        let conn = state.db.get()?;
        match users::get_by_id(&conn, &claims.sub) {
            Ok(user) if user.is_active => user,
            Ok(_) | Err(SocialError::NotFound(_)) => return Err(AppError::Unauthorized),
            Err(e) => return Err(e.into()),
        }
    };
    let access = state.jwt.issue(&user.id, &user.username, TokenType::Access)?;
    Ok(Json(AccessResponse { access }))
}

async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> AppResult<impl IntoResponse> {
    state.jwt.verify(&req.token, TokenType::Access)?;
    Ok((StatusCode::OK, Json(json!({}))))
}
