pub mod accounts;
pub mod assets;
pub mod home;
pub mod posts;
pub mod users;
pub mod views;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The whole application: HTML pages, static assets and the JSON API.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(home::router())
        .merge(posts::router())
        .merge(users::router())
        .merge(accounts::router())
        .route("/assets/{*path}", get(assets::serve))
        .nest("/api", crate::api::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
