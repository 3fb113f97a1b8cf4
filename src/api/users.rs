use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::ToggleResponse;
use crate::auth::TokenPair;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::social::users::{self, NewUser, Profile, ProfileUpdate, UserSummary, DEFAULT_SUGGESTIONS};
use crate::social::{follows, Page, PageQuery, PageRequest, Toggle};
use crate::state::AppState;

/// Account as its owner (or staff) sees it.
#[derive(Debug, Serialize)]
pub struct AccountBody {
    pub id: String,
    pub username: String,
    pub email: String,
    pub name: String,
    pub bio: Option<String>,
    pub dob: Option<NaiveDate>,
    pub avatar: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: String,
}

impl From<&User> for AccountBody {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            bio: user.bio.clone(),
            dob: user.dob,
            avatar: user.avatar(),
            is_active: user.is_active,
            is_staff: user.is_staff,
            date_joined: user.created_at.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user: AccountBody,
    pub tokens: TokenPair,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub password_confirm: Option<String>,
}

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub dob: Option<NaiveDate>,
    pub avatar: Option<String>,
}

#[derive(Deserialize)]
pub struct PasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct EmailRequest {
    pub new_email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UsernameRequest {
    pub new_username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct PasswordConfirm {
    pub password: String,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list))
        .route("/users/register", post(register))
        .route("/users/me", get(me).patch(edit).delete(delete_account))
        .route("/users/me/change-password", post(change_password))
        .route("/users/me/change-email", post(change_email))
        .route("/users/me/change-username", post(change_username))
        .route("/users/me/deactivate", post(deactivate))
        .route("/users/search", get(search))
        .route("/users/suggested", get(suggested))
        .route("/users/{username}", get(profile))
        .route("/users/{username}/followers", get(followers))
        .route("/users/{username}/following", get(following))
        .route("/users/{username}/mutuals", get(mutuals))
        .route("/users/{username}/follow", post(follow))
}

async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<AccountBody>>> {
    let conn = state.db.get()?;
    let accounts = users::list_users(&conn, &user.0)?;
    Ok(Json(accounts.iter().map(AccountBody::from).collect()))
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    if req.password_confirm.as_deref().is_some_and(|c| c != req.password) {
        return Err(AppError::Validation {
            field: "password_confirm",
            message: "The two password fields didn't match.".into(),
        });
    }
    let user = {
        let conn = state.db.get()?;
        users::register(
            &conn,
            &NewUser {
                username: req.username,
                email: req.email,
                name: req.name,
                password: req.password,
            },
        )?
    };
    let tokens = state.jwt.issue_pair(&user.id, &user.username)?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: AccountBody::from(&user),
            tokens,
        }),
    ))
}

async fn me(user: CurrentUser) -> Json<AccountBody> {
    Json(AccountBody::from(&user.0))
}

async fn edit(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ProfileRequest>,
) -> AppResult<Json<AccountBody>> {
    let conn = state.db.get()?;
    let update = ProfileUpdate {
        name: req.name,
        bio: req.bio,
        dob: req.dob,
        avatar: req.avatar,
    };
    let updated = users::update_profile(&conn, user.id(), &update)?;
    Ok(Json(AccountBody::from(&updated)))
}

async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<PasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    users::change_password(&conn, user.id(), &req.current_password, &req.new_password)?;
    Ok(Json(serde_json::json!({ "detail": "Password updated successfully." })))
}

async fn change_email(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<EmailRequest>,
) -> AppResult<Json<AccountBody>> {
    let conn = state.db.get()?;
    let updated = users::change_email(&conn, user.id(), &req.new_email, &req.password)?;
    Ok(Json(AccountBody::from(&updated)))
}

async fn change_username(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UsernameRequest>,
) -> AppResult<Json<AccountBody>> {
    let conn = state.db.get()?;
    let updated = users::change_username(&conn, user.id(), &req.new_username, &req.password)?;
    Ok(Json(AccountBody::from(&updated)))
}

async fn deactivate(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<PasswordConfirm>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    users::deactivate(&conn, user.id(), &req.password)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<PasswordConfirm>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    users::delete_account(&conn, user.id(), &req.password)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn search(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let q = params.q.unwrap_or_default();
    if q.trim().is_empty() {
        return Ok(Json(Vec::new()));
    }
    let conn = state.db.get()?;
    Ok(Json(users::search(&conn, &q, viewer.id())?))
}

async fn suggested(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<UserSummary>>> {
    let conn = state.db.get()?;
    Ok(Json(users::suggested_users(&conn, user.id(), DEFAULT_SUGGESTIONS)?))
}

async fn profile(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(username): Path<String>,
) -> AppResult<Json<Profile>> {
    let conn = state.db.get()?;
    Ok(Json(users::get_profile(&conn, &username, viewer.id())?))
}

async fn followers(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<UserSummary>>> {
    let conn = state.db.get()?;
    let target = users::get_by_username(&conn, &username)?;
    let req = PageRequest::resolve(page, &state.config.pagination);
    Ok(Json(follows::followers(&conn, &target.id, viewer.id(), req)?))
}

async fn following(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<UserSummary>>> {
    let conn = state.db.get()?;
    let target = users::get_by_username(&conn, &username)?;
    let req = PageRequest::resolve(page, &state.config.pagination);
    Ok(Json(follows::following(&conn, &target.id, viewer.id(), req)?))
}

async fn mutuals(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(username): Path<String>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let conn = state.db.get()?;
    let target = users::get_by_username(&conn, &username)?;
    Ok(Json(follows::mutual_follows(&conn, &target.id, viewer.id())?))
}

async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<ToggleResponse> {
    let conn = state.db.get()?;
    let target = users::get_by_username(&conn, &username)?;
    let outcome = follows::toggle_follow(&conn, user.id(), &target.id)?;
    let detail = match outcome {
        Toggle::Added => format!("You are now following {}.", target.username),
        Toggle::Removed => format!("You have unfollowed {}.", target.username),
    };
    Ok(ToggleResponse::new(outcome, detail))
}
