use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::db::models::User;
use crate::db::users;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/user/me", get(me))
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<User>> {
    let conn = state.db.get()?;
    Ok(Json(users::require_user(&conn, user.id)?))
}
