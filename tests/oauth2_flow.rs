mod common;

use std::collections::HashMap;
use std::sync::Arc;

use aurora::auth::cookies::{encode_value, OAUTH2_AUTH_REQUEST_COOKIE, REDIRECT_URI_COOKIE};
use aurora::auth::oauth2::complete_login;
use aurora::db::users::NewUser;
use aurora::error::AppError;
use aurora::storage::LocalImageStore;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

/// A stand-in identity provider on a local port: `/token` accepts one code,
/// `/userinfo` accepts the token it hands out, `/broken-token` always fails.
async fn spawn_provider() -> String {
    async fn token(Form(params): Form<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
        let valid = params.get("grant_type").map(String::as_str) == Some("authorization_code")
            && params.get("code").map(String::as_str) == Some("good-code")
            && params.get("client_id").map(String::as_str) == Some("aurora-web");
        if valid {
            (
                StatusCode::OK,
                Json(json!({ "access_token": "provider-token", "token_type": "Bearer" })),
            )
        } else {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" })))
        }
    }

    async fn userinfo(headers: HeaderMap) -> (StatusCode, Json<Value>) {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .is_some_and(|v| *v == "Bearer provider-token");
        if authorized {
            (
                StatusCode::OK,
                Json(json!({
                    "email": "ann@example.com",
                    "name": "Ann",
                    "picture": "https://cdn.example.com/ann.png"
                })),
            )
        } else {
            (StatusCode::UNAUTHORIZED, Json(json!({})))
        }
    }

    let router = Router::new()
        .route("/token", post(token))
        .route("/userinfo", get(userinfo))
        .route("/broken-token", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn app_with_provider(base: &str, token_path: &str) -> common::TestApp {
    let tmp = TempDir::new().unwrap();
    let mut config = common::config(&tmp);
    config.oauth2.client_id = "aurora-web".to_string();
    config.oauth2.token_endpoint = format!("{}{}", base, token_path);
    config.oauth2.userinfo_endpoint = format!("{}/userinfo", base);
    let store = Arc::new(LocalImageStore::new(
        config.images_path(),
        config.storage.public_url.clone(),
    ));
    common::app_with_store(tmp, config, store)
}

fn callback_request(query: &str, flow_state: &str, redirect_uri: Option<&str>) -> Request<Body> {
    let mut cookie = format!("{}={}", OAUTH2_AUTH_REQUEST_COOKIE, flow_state);
    if let Some(uri) = redirect_uri {
        cookie.push_str(&format!("; {}={}", REDIRECT_URI_COOKIE, encode_value(uri)));
    }
    Request::builder()
        .uri(format!("/oauth2/callback?{}", query))
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn callback_exchanges_code_and_issues_a_working_token() {
    let base = spawn_provider().await;
    let app = app_with_provider(&base, "/token");

    let response = app
        .router()
        .oneshot(callback_request(
            "code=good-code&state=s1",
            "s1",
            Some("http://example.com:8080/callback"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("http://example.com:8080/callback?token="));
    let token = url::Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/user/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = common::json_body(response).await;
    assert_eq!(me["email"], "ann@example.com");
    assert_eq!(me["name"], "Ann");
    assert_eq!(me["image"], "https://cdn.example.com/ann.png");
}

#[tokio::test]
async fn callback_with_mismatched_state_is_bad_request() {
    let app = common::app();

    let response = app
        .router()
        .oneshot(callback_request("code=good-code&state=forged", "s1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_with_provider_error_is_bad_request() {
    let app = common::app();

    let response = app
        .router()
        .oneshot(callback_request("error=access_denied&state=s1", "s1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failing_token_endpoint_is_bad_gateway() {
    let base = spawn_provider().await;
    let app = app_with_provider(&base, "/broken-token");

    let response = app
        .router()
        .oneshot(callback_request("code=good-code&state=s1", "s1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn rejected_code_is_bad_gateway_and_creates_no_user() {
    let base = spawn_provider().await;
    let app = app_with_provider(&base, "/token");

    let response = app
        .router()
        .oneshot(callback_request("code=stale-code&state=s1", "s1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let conn = app.state.db.get().unwrap();
    let users: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(users, 0);
}

fn profile(name: &str) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: "login@example.com".to_string(),
        image: "https://cdn.example.com/me.png".to_string(),
        bio: String::new(),
    }
}

fn with_redirect_cookie(uri: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("{}={}", REDIRECT_URI_COOKIE, encode_value(uri))).unwrap(),
    );
    headers
}

#[tokio::test]
async fn authorize_stores_redirect_cookie_and_goes_to_provider() {
    let app = common::app();

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/oauth2/authorize?redirect_uri=http%3A%2F%2Fexample.com%3A8080%2Fcallback")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://accounts.google.com/o/oauth2/v2/auth?response_type=code"));
    let state = url::Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();

    let cookies: Vec<&str> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("redirect_uri=http%3A%2F%2Fexample.com%3A8080%2Fcallback;")
            && c.contains("Max-Age=180")));
    assert!(cookies
        .iter()
        .any(|c| c.starts_with(&format!("oauth2_auth_request={};", state))));
}

#[test]
fn login_to_allowed_redirect_carries_a_working_token() {
    let app = common::app();
    let headers = with_redirect_cookie("http://example.com:8080/callback");

    let (user, redirect) = complete_login(&app.state, &headers, &profile("First"), false).unwrap();
    let redirect = redirect.unwrap();

    assert!(redirect
        .location
        .starts_with("http://example.com:8080/callback?token="));
    assert_eq!(app.state.tokens.verify(&redirect.token), Some(user.id));
    assert!(redirect
        .set_cookies
        .iter()
        .any(|c| c.starts_with("access_token=") && c.contains("Max-Age=3600")));
    assert!(redirect
        .set_cookies
        .iter()
        .any(|c| c.starts_with("redirect_uri=;") && c.contains("Max-Age=0")));
}

#[test]
fn login_to_unlisted_host_is_rejected() {
    let app = common::app();
    let headers = with_redirect_cookie("http://evil.com:8080");

    let result = complete_login(&app.state, &headers, &profile("First"), false);
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[test]
fn repeat_login_refreshes_the_same_user() {
    let app = common::app();
    let headers = HeaderMap::new();

    let (first, redirect) = complete_login(&app.state, &headers, &profile("First"), false).unwrap();
    assert!(redirect.unwrap().location.starts_with("/?token="));

    let (second, redirect) = complete_login(&app.state, &headers, &profile("Second"), true).unwrap();
    assert!(redirect.is_none());
    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Second");
}
