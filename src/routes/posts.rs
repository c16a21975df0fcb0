use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::db::models::Mood;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, PostForm};
use crate::posts::domain::parse_moods;
use crate::posts::{NewPost, PageRequest, PostChanges, PostResponse};
use crate::state::AppState;

// Every `/posts/{..}` segment uses the same parameter name so the router
// can share the prefix between reads and writes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create))
        .route("/posts/all", get(list_all))
        .route("/posts/all/filter", get(list_by_mood))
        .route("/posts/one/{id}", get(get_one))
        .route("/posts/{id}", get(list_by_user).patch(update).delete(delete))
        .route("/posts/{id}/filter", get(list_by_user_and_mood))
}

type QueryPairs = Query<Vec<(String, String)>>;

/// `page` is zero-based; a missing value means the first page.
fn page_request(state: &AppState, params: &[(String, String)]) -> AppResult<PageRequest> {
    let page = match params.iter().find(|(k, _)| k == "page") {
        Some((_, value)) if !value.is_empty() => value
            .parse::<u32>()
            .map_err(|_| AppError::BadRequest(format!("Invalid page: {}", value)))?,
        _ => 0,
    };
    Ok(PageRequest::new(page, state.config.posts.page_size))
}

fn moods(params: &[(String, String)]) -> AppResult<Vec<Mood>> {
    let moods = parse_moods(
        params
            .iter()
            .filter(|(k, _)| k == "mood")
            .map(|(_, v)| v.as_str()),
    )
    .map_err(AppError::BadRequest)?;

    if moods.is_empty() {
        return Err(AppError::BadRequest("mood is required".into()));
    }
    Ok(moods)
}

async fn list_all(
    State(state): State<AppState>,
    Query(params): QueryPairs,
) -> AppResult<Json<Vec<PostResponse>>> {
    let page = page_request(&state, &params)?;
    Ok(Json(state.posts.list_all(page)?))
}

async fn list_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): QueryPairs,
) -> AppResult<Json<Vec<PostResponse>>> {
    let page = page_request(&state, &params)?;
    Ok(Json(state.posts.list_by_user(user_id, page)?))
}

async fn get_one(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Json<PostResponse>> {
    Ok(Json(state.posts.get_one(post_id)?))
}

async fn list_by_mood(
    State(state): State<AppState>,
    Query(params): QueryPairs,
) -> AppResult<Json<Vec<PostResponse>>> {
    let page = page_request(&state, &params)?;
    let moods = moods(&params)?;
    Ok(Json(state.posts.list_by_mood(page, &moods)?))
}

async fn list_by_user_and_mood(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): QueryPairs,
) -> AppResult<Json<Vec<PostResponse>>> {
    let page = page_request(&state, &params)?;
    let moods = moods(&params)?;
    Ok(Json(
        state.posts.list_by_user_and_mood(user_id, page, &moods)?,
    ))
}

async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    form: PostForm,
) -> AppResult<Json<PostResponse>> {
    let mood = form
        .mood
        .ok_or_else(|| AppError::BadRequest("mood is required".into()))?;

    let new_post = NewPost {
        mood,
        content: form.content.unwrap_or_default(),
        images: form.images.unwrap_or_default(),
    };
    Ok(Json(state.post_mutations.create(user.id, new_post)?))
}

async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    form: PostForm,
) -> AppResult<Json<PostResponse>> {
    let changes = PostChanges {
        mood: form.mood,
        content: form.content,
        images: form.images,
    };
    Ok(Json(state.post_mutations.update(user.id, post_id, changes)?))
}

async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<StatusCode> {
    state.post_mutations.delete(user.id, post_id)?;
    Ok(StatusCode::OK)
}
