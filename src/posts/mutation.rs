use std::sync::Arc;

use rusqlite::{Connection, TransactionBehavior};

use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::posts::aggregation::aggregate;
use crate::posts::domain::{can_mutate, NewPost, PostChanges, PostResponse};
use crate::posts::repository;
use crate::state::DbPool;
use crate::storage::{ImageStore, ImageUpload};

/// Write side of posts.
///
/// Every operation runs in one SQLite transaction. Image store calls happen
/// while that transaction is open but are not part of it: when a later step
/// fails the rows roll back, objects already uploaded or deleted stay that way.
#[derive(Clone)]
pub struct PostMutationService {
    db: DbPool,
    images: Arc<dyn ImageStore>,
    namespace: String,
}

impl PostMutationService {
    pub fn new(db: DbPool, images: Arc<dyn ImageStore>, namespace: impl Into<String>) -> Self {
        Self {
            db,
            images,
            namespace: namespace.into(),
        }
    }

    pub fn create(&self, user_id: i64, new_post: NewPost) -> AppResult<PostResponse> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let writer = users::require_user(&tx, user_id)?;
        let post_id = repository::insert_post(&tx, writer.id, new_post.mood, &new_post.content)?;
        let urls = self.store_images(&tx, post_id, &new_post.images)?;

        let post = repository::find_post(&tx, post_id)?.ok_or(AppError::NotFound)?;
        let response = aggregate(&tx, &post, urls)?;
        tx.commit()?;

        tracing::info!(
            "User {} created post {} with {} image(s)",
            user_id,
            post_id,
            response.images.len()
        );
        Ok(response)
    }

    pub fn update(&self, user_id: i64, post_id: i64, changes: PostChanges) -> AppResult<PostResponse> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let post = repository::find_post(&tx, post_id)?.ok_or(AppError::NotFound)?;
        if !can_mutate(user_id, &post) {
            tracing::warn!("User {} tried to update post {} they did not write", user_id, post_id);
            return Err(AppError::not_writer());
        }

        let mood = changes.mood.unwrap_or(post.mood);
        let content = changes.content.unwrap_or_else(|| post.content.clone());
        repository::update_post(&tx, post_id, mood, &content)?;

        let urls = match changes.images {
            Some(uploads) => self.replace_image_set(&tx, post_id, &uploads)?,
            None => repository::image_urls(&tx, post_id)?,
        };

        let post = repository::find_post(&tx, post_id)?.ok_or(AppError::NotFound)?;
        let response = aggregate(&tx, &post, urls)?;
        tx.commit()?;

        tracing::info!("User {} updated post {}", user_id, post_id);
        Ok(response)
    }

    pub fn delete(&self, user_id: i64, post_id: i64) -> AppResult<()> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let post = repository::find_post(&tx, post_id)?.ok_or(AppError::NotFound)?;
        if !can_mutate(user_id, &post) {
            tracing::warn!("User {} tried to delete post {} they did not write", user_id, post_id);
            return Err(AppError::not_writer());
        }

        let urls = repository::image_urls(&tx, post_id)?;
        repository::delete_post(&tx, post_id)?;
        tx.commit()?;

        // The post is gone either way; a stuck object is only worth a warning.
        for url in &urls {
            if let Err(e) = self.images.delete(url, &self.namespace) {
                tracing::warn!("Could not remove image {} of deleted post {}: {}", url, post_id, e);
            }
        }

        tracing::info!("User {} deleted post {}", user_id, post_id);
        Ok(())
    }

    /// Swap a post's whole image set: remove every current object and row,
    /// then upload and record the new files. No diffing against the old set.
    pub fn replace_image_set(
        &self,
        conn: &Connection,
        post_id: i64,
        uploads: &[ImageUpload],
    ) -> AppResult<Vec<String>> {
        for url in repository::image_urls(conn, post_id)? {
            self.images.delete(&url, &self.namespace)?;
        }
        repository::delete_images(conn, post_id)?;
        self.store_images(conn, post_id, uploads)
    }

    fn store_images(
        &self,
        conn: &Connection,
        post_id: i64,
        uploads: &[ImageUpload],
    ) -> AppResult<Vec<String>> {
        let mut urls = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let url = self.images.upload(upload, &self.namespace)?;
            repository::insert_image(conn, post_id, &url)?;
            urls.push(url);
        }
        Ok(urls)
    }
}
