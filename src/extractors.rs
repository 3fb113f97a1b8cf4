use axum::extract::FromRequestParts;
use axum::http::{header, HeaderMap};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};

use crate::auth::{session, TokenType};
use crate::db::models::User;
use crate::error::AppError;
use crate::social::{users, Actor, SocialError};
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn actor(&self) -> Actor<'_> {
        Actor::of(&self.0)
    }
}

/// Extractor that requires authentication, via `Authorization: Bearer <access token>`
/// or the session cookie. Returns 401 if neither yields an active user.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(token) = extract_bearer_token(parts) {
            let claims = state.jwt.verify(token, TokenType::Access)?;
            let conn = state.db.get()?;
            return match users::get_by_id(&conn, &claims.sub) {
                Ok(user) if user.is_active => Ok(CurrentUser(user)),
                Ok(_) | Err(SocialError::NotFound(_)) => Err(AppError::Unauthorized),
                Err(e) => Err(e.into()),
            };
        }

        let token = extract_session_token(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        let conn = state.db.get()?;
        session::session_user(&conn, token)?
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Optional user extractor: `None` instead of 401 when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl MaybeUser {
    pub fn id(&self) -> Option<&str> {
        self.0.as_ref().map(CurrentUser::id)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized | AppError::Token(_)) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// Page variant of [`CurrentUser`]: anonymous visitors are sent to the login form.
pub struct WebUser(pub CurrentUser);

pub struct LoginRedirect(Option<AppError>);

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        match self.0 {
            Some(err) => err.into_response(),
            None => Redirect::to("/accounts/login").into_response(),
        }
    }
}

impl FromRequestParts<AppState> for WebUser {
    type Rejection = LoginRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(WebUser(user)),
            Err(AppError::Unauthorized | AppError::Token(_)) => Err(LoginRedirect(None)),
            Err(e) => Err(LoginRedirect(Some(e))),
        }
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn extract_session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name {
                Some(val)
            } else {
                None
            }
        })
}
