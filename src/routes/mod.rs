pub mod comments;
pub mod images;
pub mod oauth2;
pub mod posts;
pub mod users;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full HTTP surface, ready to serve.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(posts::router())
        .merge(comments::router())
        .merge(users::router())
        .merge(oauth2::router())
        .merge(images::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
