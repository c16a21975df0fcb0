use axum::extract::{FromRequest, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};

use crate::db::models::Comment;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::posts::repository;
use crate::state::AppState;

const MAX_COMMENT_CHARS: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts/{id}/comments", get(list).post(create))
        .route("/posts/{id}/likes", post(toggle_like))
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub content: String,
}

/// Accepts the comment as JSON or as an urlencoded form.
pub struct CommentInput(pub CommentBody);

impl<S> FromRequest<S> for CommentInput
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let body = if is_json {
            let Json(body) = Json::<CommentBody>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            body
        } else {
            let Form(body) = Form::<CommentBody>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            body
        };
        Ok(CommentInput(body))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

fn validate_comment(raw: &str) -> AppResult<&str> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::BadRequest(format!(
            "Comment cannot be longer than {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(content)
}

async fn list(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Json<Vec<Comment>>> {
    let conn = state.db.get()?;
    repository::find_post(&conn, post_id)?.ok_or(AppError::NotFound)?;
    Ok(Json(repository::comments_by_post(&conn, post_id)?))
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    CommentInput(body): CommentInput,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let content = validate_comment(&body.content)?;

    let conn = state.db.get()?;
    repository::find_post(&conn, post_id)?.ok_or(AppError::NotFound)?;
    let comment_id = repository::insert_comment(&conn, post_id, user.id, content)?;

    let comment = repository::find_comment(&conn, comment_id)?
        .ok_or_else(|| AppError::Internal(format!("comment {} vanished", comment_id)))?;

    tracing::info!("User {} commented on post {}", user.id, post_id);
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Json<LikeResponse>> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    repository::find_post(&tx, post_id)?.ok_or(AppError::NotFound)?;
    let liked = repository::toggle_like(&tx, post_id, user.id)?;
    let like_count = repository::count_likes(&tx, post_id)?;
    tx.commit()?;

    Ok(Json(LikeResponse { liked, like_count }))
}
