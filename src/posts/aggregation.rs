use rusqlite::Connection;

use crate::db::models::Post;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::posts::domain::{PostResponse, PostWriter};
use crate::posts::repository;

/// Build the read model for one post. Pure read: nothing is written.
pub fn aggregate(conn: &Connection, post: &Post, images: Vec<String>) -> AppResult<PostResponse> {
    // writer_id is a foreign key, so a missing writer means a broken database
    let writer = users::find_user(conn, post.writer_id)?.ok_or_else(|| {
        AppError::Internal(format!("post {} has no writer row", post.id))
    })?;

    let comment_count = repository::comments_by_post(conn, post.id)?.len() as i64;
    let like_count = repository::count_likes(conn, post.id)?;

    Ok(PostResponse {
        id: post.id,
        writer: PostWriter {
            id: writer.id,
            name: writer.name,
            avatar: writer.image,
        },
        mood: post.mood,
        content: post.content.clone(),
        images,
        comment_count,
        like_count,
    })
}

/// Aggregate posts in the order given, looking up each one's images.
pub fn aggregate_all(conn: &Connection, posts: &[Post]) -> AppResult<Vec<PostResponse>> {
    posts
        .iter()
        .map(|post| {
            let images = repository::image_urls(conn, post.id)?;
            aggregate(conn, post, images)
        })
        .collect()
}
