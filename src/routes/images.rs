use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::storage::object_path;

pub fn router() -> Router<AppState> {
    Router::new().route("/images/{namespace}/{file}", get(serve))
}

/// Serve an object written by the local image store.
async fn serve(
    State(state): State<AppState>,
    Path((namespace, file)): Path<(String, String)>,
) -> AppResult<Response> {
    let path = object_path(&state.config.images_path(), &namespace, &file)
        .ok_or(AppError::NotFound)?;

    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(e) => return Err(e.into()),
    };

    let mime = mime_guess::from_path(&file).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            // Object keys are never reused
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        data,
    )
        .into_response())
}
