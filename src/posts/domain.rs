use serde::{Deserialize, Serialize};

use crate::db::models::{Mood, Post};
use crate::storage::ImageUpload;

/// A zero-based page of posts, newest (highest id) first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.max(1),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub mood: Mood,
    pub content: String,
    pub images: Vec<ImageUpload>,
}

/// A partial update. `None` keeps the stored value; `images: Some(vec![])`
/// clears the image set.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub mood: Option<Mood>,
    pub content: Option<String>,
    pub images: Option<Vec<ImageUpload>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostWriter {
    pub id: i64,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: i64,
    pub writer: PostWriter,
    pub mood: Mood,
    pub content: String,
    pub images: Vec<String>,
    pub comment_count: i64,
    pub like_count: i64,
}

/// Only the writer may change or remove a post.
pub fn can_mutate(actor_id: i64, post: &Post) -> bool {
    post.writer_id == actor_id
}

/// Keep the posts of one fetched page whose mood is wanted (and, optionally,
/// whose writer matches), newest first.
///
/// Works on the page it is handed, not the whole table: a matching post that
/// fell outside the fetched page never shows up.
pub fn filter_page_by_mood(page: &[Post], moods: &[Mood], writer_id: Option<i64>) -> Vec<Post> {
    let mut matched: Vec<Post> = moods
        .iter()
        .flat_map(|mood| page.iter().filter(move |post| post.mood == *mood))
        .filter(|post| writer_id.map_or(true, |id| post.writer_id == id))
        .cloned()
        .collect();
    matched.sort_by(|a, b| b.id.cmp(&a.id));
    matched
}

/// Parse `mood` query values. Each value may itself be comma-separated;
/// repeats collapse so a post is never listed twice.
pub fn parse_moods<'a, I>(values: I) -> Result<Vec<Mood>, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut moods = Vec::new();
    for raw in values.into_iter().flat_map(|v| v.split(',')) {
        if raw.trim().is_empty() {
            continue;
        }
        let mood: Mood = raw.parse()?;
        if !moods.contains(&mood) {
            moods.push(mood);
        }
    }
    Ok(moods)
}
