use askama::Template;
use axum::extract::{OriginalUri, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::auth::session;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::{extract_session_token, MaybeUser, WebUser};
use crate::routes::home::Html;
use crate::routes::views::{safe_next, Nav};
use crate::social::users::{self, NewUser, ProfileUpdate};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub username: String,
    pub next: String,
    pub error: String,
}

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub nav: Nav,
    pub username: String,
    pub email: String,
    pub name: String,
    pub error: String,
    pub error_field: String,
}

#[derive(Template)]
#[template(path = "pages/account.html")]
pub struct AccountTemplate {
    pub nav: Nav,
    pub username: String,
    pub email: String,
    pub name: String,
    pub bio: String,
    pub dob: String,
    pub avatar: String,
    pub notice: String,
    pub error: String,
    pub error_field: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub bio: String,
    pub dob: String,
    pub avatar: String,
}

#[derive(Deserialize)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct EmailForm {
    pub new_email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UsernameForm {
    pub new_username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ConfirmForm {
    pub password: String,
}

#[derive(Deserialize)]
pub struct DoneQuery {
    pub done: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts/login", get(login_page).post(login))
        .route("/accounts/logout", post(logout))
        .route("/accounts/register", get(register_page).post(register))
        .route("/accounts/edit", get(account_page).post(edit_profile))
        .route("/accounts/password", post(change_password))
        .route("/accounts/email", post(change_email))
        .route("/accounts/username", post(change_username))
        .route("/accounts/deactivate", post(deactivate))
        .route("/accounts/delete", post(delete_account))
}

fn session_cookie(state: &AppState, token: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        state.config.auth.cookie_name,
        token,
        state.config.auth.session_hours * 3600
    )
}

fn clear_cookie(state: &AppState) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        state.config.auth.cookie_name
    )
}

/// Starts a session and redirects with the cookie set.
fn sign_in(state: &AppState, user: &User, next: &str) -> AppResult<Response> {
    let conn = state.db.get()?;
    let token = session::create_session(&conn, &user.id, state.config.auth.session_hours)?;
    tracing::info!(user_id = %user.id, username = %user.username, "Signed in");
    Ok((
        [(header::SET_COOKIE, session_cookie(state, &token))],
        Redirect::to(next),
    )
        .into_response())
}

async fn login_page(
    maybe_user: MaybeUser,
    uri: OriginalUri,
    Query(query): Query<NextQuery>,
) -> Response {
    let next = safe_next(query.next.as_deref(), "/");
    if maybe_user.0.is_some() {
        return Redirect::to(&next).into_response();
    }
    Html(LoginTemplate {
        nav: Nav::new(None, &uri.0),
        username: String::new(),
        next,
        error: String::new(),
    })
    .into_response()
}

async fn login(
    State(state): State<AppState>,
    uri: OriginalUri,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let next = safe_next(form.next.as_deref(), "/");
    let authenticated = {
        let conn = state.db.get()?;
        users::authenticate(&conn, &form.username, &form.password)
    };
    match authenticated.map_err(AppError::from) {
        Ok(user) => sign_in(&state, &user, &next),
        Err(AppError::Validation { message, .. }) => {
            tracing::info!(username = %form.username, "Failed login");
            Ok(Html(LoginTemplate {
                nav: Nav::new(None, &uri.0),
                username: form.username,
                next,
                error: message,
            })
            .into_response())
        }
        Err(other) => Err(other),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = extract_session_token(&headers, &state.config.auth.cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }
    Ok((
        [(header::SET_COOKIE, clear_cookie(&state))],
        Redirect::to("/"),
    )
        .into_response())
}

async fn register_page(maybe_user: MaybeUser, uri: OriginalUri) -> Response {
    if maybe_user.0.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(RegisterTemplate {
        nav: Nav::new(None, &uri.0),
        username: String::new(),
        email: String::new(),
        name: String::new(),
        error: String::new(),
        error_field: String::new(),
    })
    .into_response()
}

async fn register(
    State(state): State<AppState>,
    uri: OriginalUri,
    Form(form): Form<RegisterForm>,
) -> AppResult<Response> {
    let result = if form.password != form.password_confirm {
        Err(AppError::Validation {
            field: "password_confirm",
            message: "The two password fields didn't match.".into(),
        })
    } else {
        let conn = state.db.get()?;
        users::register(
            &conn,
            &NewUser {
                username: form.username.clone(),
                email: form.email.clone(),
                name: form.name.clone(),
                password: form.password.clone(),
            },
        )
        .map_err(AppError::from)
    };

    match result {
        Ok(user) => sign_in(&state, &user, "/"),
        Err(AppError::Validation { field, message }) => Ok(Html(RegisterTemplate {
            nav: Nav::new(None, &uri.0),
            username: form.username,
            email: form.email,
            name: form.name,
            error: message,
            error_field: field.to_string(),
        })
        .into_response()),
        Err(other) => Err(other),
    }
}

fn account_template(user: &User, uri: &OriginalUri, notice: &str, error: Option<(&'static str, String)>) -> AccountTemplate {
    let (error_field, error) = match error {
        Some((field, message)) => (field.to_string(), message),
        None => (String::new(), String::new()),
    };
    AccountTemplate {
        nav: Nav::new(Some(user), &uri.0),
        username: user.username.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        bio: user.bio.clone().unwrap_or_default(),
        dob: user.dob.map(|d| d.to_string()).unwrap_or_default(),
        avatar: user.image.clone().unwrap_or_default(),
        notice: notice.to_string(),
        error,
        error_field,
    }
}

fn notice_for(done: Option<&str>) -> &'static str {
    match done {
        Some("profile") => "Profile updated.",
        Some("password") => "Password changed.",
        Some("email") => "Email changed.",
        Some("username") => "Username changed.",
        _ => "",
    }
}

async fn account_page(
    WebUser(user): WebUser,
    uri: OriginalUri,
    Query(query): Query<DoneQuery>,
) -> Response {
    Html(account_template(&user.0, &uri, notice_for(query.done.as_deref()), None)).into_response()
}

/// Shared tail of every account form: success redirects with a notice,
/// validation errors re-render the page.
fn account_outcome<T>(
    state: &AppState,
    user_id: &str,
    uri: &OriginalUri,
    result: Result<T, AppError>,
    done: &str,
) -> AppResult<Response> {
    match result {
        Ok(_) => Ok(Redirect::to(&format!("/accounts/edit?done={done}")).into_response()),
        Err(AppError::Validation { field, message }) => {
            let conn = state.db.get()?;
            let user = users::get_by_id(&conn, user_id)?;
            Ok(Html(account_template(&user, uri, "", Some((field, message)))).into_response())
        }
        Err(other) => Err(other),
    }
}

async fn edit_profile(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let dob = match form.dob.trim() {
        "" => Ok(None),
        raw => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(Some).map_err(|_| AppError::Validation {
            field: "dob",
            message: "Enter a valid date.".into(),
        }),
    };
    let result = match dob {
        Ok(dob) => {
            let conn = state.db.get()?;
            let update = ProfileUpdate {
                name: Some(form.name),
                bio: Some(form.bio),
                dob,
                avatar: Some(form.avatar),
            };
            users::update_profile(&conn, user.id(), &update).map_err(AppError::from)
        }
        Err(e) => Err(e),
    };
    account_outcome(&state, user.id(), &uri, result, "profile")
}

async fn change_password(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Form(form): Form<PasswordForm>,
) -> AppResult<Response> {
    let result = {
        let conn = state.db.get()?;
        users::change_password(&conn, user.id(), &form.current_password, &form.new_password)
            .map_err(AppError::from)
    };
    account_outcome(&state, user.id(), &uri, result, "password")
}

async fn change_email(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Form(form): Form<EmailForm>,
) -> AppResult<Response> {
    let result = {
        let conn = state.db.get()?;
        users::change_email(&conn, user.id(), &form.new_email, &form.password).map_err(AppError::from)
    };
    account_outcome(&state, user.id(), &uri, result, "email")
}

async fn change_username(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Form(form): Form<UsernameForm>,
) -> AppResult<Response> {
    let result = {
        let conn = state.db.get()?;
        users::change_username(&conn, user.id(), &form.new_username, &form.password)
            .map_err(AppError::from)
    };
    account_outcome(&state, user.id(), &uri, result, "username")
}

async fn deactivate(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Form(form): Form<ConfirmForm>,
) -> AppResult<Response> {
    let result = {
        let conn = state.db.get()?;
        users::deactivate(&conn, user.id(), &form.password).map_err(AppError::from)
    };
    match result {
        Ok(()) => Ok((
            [(header::SET_COOKIE, clear_cookie(&state))],
            Redirect::to("/"),
        )
            .into_response()),
        Err(e) => account_outcome::<()>(&state, user.id(), &uri, Err(e), "deactivate"),
    }
}

async fn delete_account(
    State(state): State<AppState>,
    WebUser(user): WebUser,
    uri: OriginalUri,
    Form(form): Form<ConfirmForm>,
) -> AppResult<Response> {
    let result = {
        let conn = state.db.get()?;
        users::delete_account(&conn, user.id(), &form.password).map_err(AppError::from)
    };
    match result {
        Ok(()) => Ok((
            [(header::SET_COOKIE, clear_cookie(&state))],
            Redirect::to("/"),
        )
            .into_response()),
        Err(e) => account_outcome::<()>(&state, user.id(), &uri, Err(e), "delete"),
    }
}
