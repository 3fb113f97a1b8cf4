//! Drives the full router (pages and JSON API) with `oneshot` requests.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use rusqlite::params;
use serde_json::{json, Value};
use tower::ServiceExt;

use qwitter::config::Config;
use qwitter::db;
use qwitter::routes;
use qwitter::state::AppState;

const PASSWORD: &str = "correct horse";

struct TestApp {
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let pool = db::memory_pool().expect("Failed to create test database");
        Self {
            state: AppState::new(pool, Config::default()),
        }
    }

    fn router(&self) -> Router {
        routes::app(self.state.clone())
    }

    /// Inserts an account directly, with a cheap hash, and returns `(id, access token)`.
    fn user(&self, username: &str) -> (String, String) {
        let id = uuid::Uuid::now_v7().to_string();
        let hash = bcrypt::hash(PASSWORD, 4).unwrap();
        let conn = self.state.db.get().unwrap();
        conn.execute(
            "INSERT INTO users (id, username, email, name, password_hash) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, username, format!("{username}@example.com"), username, hash],
        )
        .unwrap();
        let pair = self.state.jwt.issue_pair(&id, username).unwrap();
        (id, pair.access)
    }

    async fn send(&self, req: Request<Body>) -> Response {
        self.router().oneshot(req).await.unwrap()
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = self.send(req).await;
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

fn form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn location(res: &Response) -> &str {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_register_then_use_tokens() {
    let app = TestApp::new();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/users/register",
            None,
            Some(json!({
                "username": "Alice",
                "email": "ALICE@example.com",
                "name": "Alice",
                "password": PASSWORD,
                "password_confirm": PASSWORD,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "alice@example.com");
    let access = body["tokens"]["access"].as_str().unwrap().to_string();
    let refresh = body["tokens"]["refresh"].as_str().unwrap().to_string();

    let (status, me) = app.json(Method::GET, "/api/users/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
    assert!(me.get("password_hash").is_none());

    // A refresh token is not an access token.
    let (status, _) = app.json(Method::GET, "/api/users/me", Some(&refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .json(Method::POST, "/api/auth/token/refresh", None, Some(json!({ "refresh": refresh })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access"].is_string());

    let (status, _) = app
        .json(Method::POST, "/api/auth/token/verify", None, Some(json!({ "token": access })))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_token_obtain_checks_credentials() {
    let app = TestApp::new();
    app.user("bob");

    let (status, body) = app
        .json(
            Method::POST,
            "/api/auth/token",
            None,
            Some(json!({ "username": "BOB", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access"].is_string());
    assert!(body["refresh"].is_string());

    let (status, body) = app
        .json(
            Method::POST,
            "/api/auth/token",
            None,
            Some(json!({ "username": "bob", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "credentials");
}

#[tokio::test]
async fn test_protected_endpoints_require_authentication() {
    let app = TestApp::new();

    let (status, body) = app
        .json(Method::POST, "/api/posts", None, Some(json!({ "body": "hi" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].is_string());

    let (status, body) = app
        .json(Method::GET, "/api/users/me", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Given token not valid for any token type");

    // Public reads ignore a bad token instead of failing.
    let (status, _) = app
        .json(Method::GET, "/api/posts", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_post_lifecycle_and_toggles() {
    let app = TestApp::new();
    let (_, alice) = app.user("alice");
    let (_, bob) = app.user("bob");

    let (status, body) = app
        .json(Method::POST, "/api/posts", Some(&alice), Some(json!({ "body": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "body");

    let (status, post) = app
        .json(Method::POST, "/api/posts", Some(&alice), Some(json!({ "body": "hello" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["kind"], "original");
    let id = post["id"].as_str().unwrap().to_string();

    let like = format!("/api/posts/{id}/react");
    let (status, body) = app.json(Method::POST, &like, Some(&bob), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["detail"], "Post liked.");
    assert_eq!(body["success"], true);

    let (_, view) = app.json(Method::GET, &format!("/api/posts/{id}"), Some(&bob), None).await;
    assert_eq!(view["likes_count"], 1);
    assert_eq!(view["is_liked"], true);

    let (status, body) = app.json(Method::POST, &like, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Post unliked.");

    // Only the author edits.
    let (status, _) = app
        .json(Method::PATCH, &format!("/api/posts/{id}"), Some(&bob), Some(json!({ "body": "mine" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, edited) = app
        .json(Method::PATCH, &format!("/api/posts/{id}"), Some(&alice), Some(json!({ "body": "hello, world" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["body"], "hello, world");

    // Repost, then the repost cannot be commented on.
    let (status, body) = app
        .json(Method::POST, &format!("/api/posts/{id}/repost"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["detail"], "Post reposted successfully.");

    let (_, feed) = app.json(Method::GET, "/api/posts?author=bob", None, None).await;
    assert_eq!(feed["count"], 1);
    let repost_id = feed["results"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(feed["results"][0]["kind"], "repost");

    let (status, _) = app
        .json(
            Method::POST,
            &format!("/api/posts/{repost_id}/comments"),
            Some(&bob),
            Some(json!({ "body": "on my repost" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, quote) = app
        .json(Method::POST, &format!("/api/posts/{id}/quote"), Some(&bob), Some(json!({ "body": "nice" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(quote["kind"], "quote");
    assert_eq!(quote["parent_id"], id.as_str());

    let (status, _) = app
        .json(Method::POST, &format!("/api/posts/{id}/explode"), Some(&bob), None)
        .await;
    assert!(status.is_client_error());

    let (status, _) = app.json(Method::DELETE, &format!("/api/posts/{id}"), Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.json(Method::GET, &format!("/api/posts/{repost_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comments_and_follows() {
    let app = TestApp::new();
    let (_, alice) = app.user("alice");
    let (_, bob) = app.user("bob");

    let (_, post) = app
        .json(Method::POST, "/api/posts", Some(&alice), Some(json!({ "body": "thread" })))
        .await;
    let id = post["id"].as_str().unwrap().to_string();

    let (status, comment) = app
        .json(Method::POST, &format!("/api/posts/{id}/comments"), Some(&bob), Some(json!({ "body": "first" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment_id = comment["id"].as_str().unwrap().to_string();

    let (_, page) = app.json(Method::GET, &format!("/api/posts/{id}/comments"), None, None).await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["author_username"], "bob");

    let (status, _) = app
        .json(Method::DELETE, &format!("/api/comments/{comment_id}"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .json(Method::DELETE, &format!("/api/comments/{comment_id}"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.json(Method::POST, "/api/users/alice/follow", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, _) = app.json(Method::POST, "/api/users/alice/follow", Some(&bob), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, profile) = app.json(Method::GET, "/api/users/alice", Some(&bob), None).await;
    assert_eq!(profile["followers_count"], 1);
    assert_eq!(profile["is_following"], true);

    let (_, following) = app.json(Method::GET, "/api/posts/following", Some(&bob), None).await;
    assert_eq!(following["count"], 1);

    let (status, _) = app.json(Method::POST, "/api/users/alice/follow", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_web_login_sets_session_cookie() {
    let app = TestApp::new();
    app.user("carol");

    let res = app.send(get("/", None)).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.send(get("/following", None)).await;
    assert!(res.status().is_redirection());
    assert_eq!(location(&res), "/accounts/login");

    let res = app
        .send(form("/accounts/login", "username=carol&password=wrong+password", None))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(header::SET_COOKIE).is_none());

    let res = app
        .send(form(
            "/accounts/login",
            "username=carol&password=correct+horse&next=%2Fbookmarks",
            None,
        ))
        .await;
    assert!(res.status().is_redirection());
    assert_eq!(location(&res), "/bookmarks");
    let set_cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let res = app.send(get("/following", Some(&cookie))).await;
    assert_eq!(res.status(), StatusCode::OK);

    // Compose through the web form, then see it on the profile page.
    let res = app.send(form("/posts", "body=from+the+web", Some(&cookie))).await;
    assert!(res.status().is_redirection());
    let res = app.send(get("/users/carol", Some(&cookie))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let html = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&html).contains("from the web"));

    let res = app.send(form("/accounts/logout", "", Some(&cookie))).await;
    assert!(res.status().is_redirection());
    let res = app.send(get("/following", Some(&cookie))).await;
    assert!(res.status().is_redirection());
}

#[tokio::test]
async fn test_static_assets_are_served() {
    let app = TestApp::new();
    let res = app.send(get("/assets/css/app.css", None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.send(get("/assets/nope.css", None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_page_numbers_at_the_u32_limit_render_empty_pages() {
    let app = TestApp::new();
    let (_, token) = app.user("erin");

    for uri in [
        "/?page=4294967295",
        "/users/erin?page=4294967295",
        "/users/erin/followers?page=4294967295",
        "/search?q=erin&page=4294967295",
    ] {
        let res = app.send(get(uri, None)).await;
        assert_eq!(res.status(), StatusCode::OK, "{uri}");
    }

    let (status, page) = app
        .json(Method::GET, "/api/posts?page=4294967295", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["results"], json!([]));
    assert_eq!(page["has_next"], false);
}
