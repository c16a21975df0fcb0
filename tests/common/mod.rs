#![allow(dead_code)]

use std::sync::Arc;

use aurora::config::Config;
use aurora::db::{self, users};
use aurora::state::AppState;
use aurora::storage::{ImageStore, LocalImageStore};
use axum::body::{to_bytes, Body};
use axum::http::Response;
use tempfile::TempDir;

pub struct TestApp {
    pub tmp: TempDir,
    pub state: AppState,
}

pub fn config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.database.path = Some(tmp.path().join("test.db"));
    config.storage.path = Some(tmp.path().join("images"));
    config.auth.token_secret = "test-secret".to_string();
    config.oauth2.authorized_redirect_uris = vec!["http://example.com:8080".to_string()];
    config
}

pub fn app() -> TestApp {
    let tmp = TempDir::new().unwrap();
    let config = config(&tmp);
    let store = Arc::new(LocalImageStore::new(
        config.images_path(),
        config.storage.public_url.clone(),
    ));
    app_with_store(tmp, config, store)
}

pub fn app_with_store(tmp: TempDir, config: Config, store: Arc<dyn ImageStore>) -> TestApp {
    let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    TestApp {
        tmp,
        state: AppState::new(pool, config, store, reqwest::Client::new()),
    }
}

impl TestApp {
    /// Insert a user and return their id with a bearer header value.
    pub fn user(&self, email: &str) -> (i64, String) {
        let conn = self.state.db.get().unwrap();
        let user = users::create_user(
            &conn,
            &users::NewUser {
                name: email.split('@').next().unwrap().to_string(),
                email: email.to_string(),
                image: String::new(),
                bio: String::new(),
            },
        )
        .unwrap();
        let token = self.state.tokens.create_token(user.id);
        (user.id, format!("Bearer {}", token))
    }

    pub fn router(&self) -> axum::Router {
        aurora::routes::router(self.state.clone())
    }
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub const BOUNDARY: &str = "aurora-test-boundary";

/// Build a multipart body from text fields and `(field, filename, bytes)` files.
pub fn multipart(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (name, filename, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
