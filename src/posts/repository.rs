// All post-related SQL. Functions take a plain `Connection` so callers can
// hand in a `Transaction` and group several calls into one write.
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Comment, Mood, Post};
use crate::error::AppResult;
use crate::posts::domain::PageRequest;

const POST_COLUMNS: &str = "id, writer_id, mood, content, created_at";

fn map_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        writer_id: row.get(1)?,
        mood: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn find_post(conn: &Connection, post_id: i64) -> AppResult<Option<Post>> {
    let post = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
            params![post_id],
            map_post,
        )
        .optional()?;
    Ok(post)
}

pub fn find_page(conn: &Connection, page: PageRequest) -> AppResult<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM posts ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        POST_COLUMNS
    ))?;
    let posts = stmt
        .query_map(params![page.limit(), page.offset()], map_post)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn find_page_by_writer(
    conn: &Connection,
    writer_id: i64,
    page: PageRequest,
) -> AppResult<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM posts WHERE writer_id = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3",
        POST_COLUMNS
    ))?;
    let posts = stmt
        .query_map(params![writer_id, page.limit(), page.offset()], map_post)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn insert_post(conn: &Connection, writer_id: i64, mood: Mood, content: &str) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO posts (writer_id, mood, content) VALUES (?1, ?2, ?3)",
        params![writer_id, mood, content],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_post(conn: &Connection, post_id: i64, mood: Mood, content: &str) -> AppResult<()> {
    conn.execute(
        "UPDATE posts SET mood = ?1, content = ?2 WHERE id = ?3",
        params![mood, content, post_id],
    )?;
    Ok(())
}

/// Images, comments and likes go with it through `ON DELETE CASCADE`.
pub fn delete_post(conn: &Connection, post_id: i64) -> AppResult<()> {
    conn.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;
    Ok(())
}

/// Image URLs in upload order.
pub fn image_urls(conn: &Connection, post_id: i64) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT url FROM images WHERE post_id = ?1 ORDER BY id ASC")?;
    let urls = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(urls)
}

pub fn insert_image(conn: &Connection, post_id: i64, url: &str) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO images (post_id, url) VALUES (?1, ?2)",
        params![post_id, url],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_images(conn: &Connection, post_id: i64) -> AppResult<usize> {
    let removed = conn.execute("DELETE FROM images WHERE post_id = ?1", params![post_id])?;
    Ok(removed)
}

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.author_id, u.name, c.content, c.created_at
     FROM comments c
     JOIN users u ON u.id = c.author_id";

fn map_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author_name: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Comments on a post, newest first.
pub fn comments_by_post(conn: &Connection, post_id: i64) -> AppResult<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE c.post_id = ?1 ORDER BY c.id DESC",
        COMMENT_SELECT
    ))?;
    let comments = stmt
        .query_map(params![post_id], map_comment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

pub fn find_comment(conn: &Connection, comment_id: i64) -> AppResult<Option<Comment>> {
    let comment = conn
        .query_row(
            &format!("{} WHERE c.id = ?1", COMMENT_SELECT),
            params![comment_id],
            map_comment,
        )
        .optional()?;
    Ok(comment)
}

pub fn insert_comment(
    conn: &Connection,
    post_id: i64,
    author_id: i64,
    content: &str,
) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO comments (post_id, author_id, content) VALUES (?1, ?2, ?3)",
        params![post_id, author_id, content],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn count_likes(conn: &Connection, post_id: i64) -> AppResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Flip the user's like on a post. Returns whether the post is now liked.
pub fn toggle_like(conn: &Connection, post_id: i64, user_id: i64) -> AppResult<bool> {
    let removed = conn.execute(
        "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
    )?;
    if removed > 0 {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO likes (post_id, user_id) VALUES (?1, ?2)",
        params![post_id, user_id],
    )?;
    Ok(true)
}
