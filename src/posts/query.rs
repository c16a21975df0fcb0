use crate::db::models::Mood;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::posts::aggregation::{aggregate, aggregate_all};
use crate::posts::domain::{filter_page_by_mood, PageRequest, PostResponse};
use crate::posts::repository;
use crate::state::DbPool;

/// Read side of posts: pages, single posts and mood filters.
#[derive(Clone)]
pub struct PostQueryService {
    db: DbPool,
}

impl PostQueryService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn list_all(&self, page: PageRequest) -> AppResult<Vec<PostResponse>> {
        let conn = self.db.get()?;
        let posts = repository::find_page(&conn, page)?;
        aggregate_all(&conn, &posts)
    }

    pub fn list_by_user(&self, user_id: i64, page: PageRequest) -> AppResult<Vec<PostResponse>> {
        let conn = self.db.get()?;
        users::require_user(&conn, user_id)?;
        let posts = repository::find_page_by_writer(&conn, user_id, page)?;
        aggregate_all(&conn, &posts)
    }

    pub fn get_one(&self, post_id: i64) -> AppResult<PostResponse> {
        let conn = self.db.get()?;
        let post = repository::find_post(&conn, post_id)?.ok_or(AppError::NotFound)?;
        let images = repository::image_urls(&conn, post.id)?;
        aggregate(&conn, &post, images)
    }

    /// Filters one page of all posts, not the whole table.
    pub fn list_by_mood(&self, page: PageRequest, moods: &[Mood]) -> AppResult<Vec<PostResponse>> {
        let conn = self.db.get()?;
        let fetched = repository::find_page(&conn, page)?;
        let posts = filter_page_by_mood(&fetched, moods, None);
        aggregate_all(&conn, &posts)
    }

    /// Same page-then-filter behavior as [`Self::list_by_mood`]: the page is
    /// cut from all posts before the writer is checked.
    pub fn list_by_user_and_mood(
        &self,
        user_id: i64,
        page: PageRequest,
        moods: &[Mood],
    ) -> AppResult<Vec<PostResponse>> {
        let conn = self.db.get()?;
        users::require_user(&conn, user_id)?;
        let fetched = repository::find_page(&conn, page)?;
        let posts = filter_page_by_mood(&fetched, moods, Some(user_id));
        aggregate_all(&conn, &posts)
    }
}
