//! Object storage for post images.
//!
//! Stores are addressed by URL: `upload` hands back the public URL of the
//! stored object and `delete` takes that same URL. Every object lives under a
//! namespace, a fixed prefix the application picks for its bucket.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;

/// An image received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }
}

/// Blocking object store. Calls run on the request's task; failures surface
/// as `io::Error` and are never retried.
pub trait ImageStore: Send + Sync {
    fn upload(&self, file: &ImageUpload, namespace: &str) -> io::Result<String>;

    fn delete(&self, url: &str, namespace: &str) -> io::Result<()>;
}

/// Filesystem-backed store: `<root>/<namespace>/<key>`, served at
/// `<public_url>/<namespace>/<key>`.
pub struct LocalImageStore {
    root: PathBuf,
    public_url: String,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn key_from_url<'a>(&self, url: &'a str, namespace: &str) -> io::Result<&'a str> {
        let prefix = format!("{}/{}/", self.public_url, namespace);
        url.strip_prefix(prefix.as_str())
            .filter(|key| is_safe_segment(key))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} is not an object in namespace {}", url, namespace),
                )
            })
    }
}

impl ImageStore for LocalImageStore {
    fn upload(&self, file: &ImageUpload, namespace: &str) -> io::Result<String> {
        if !is_safe_segment(namespace) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid namespace: {}", namespace),
            ));
        }

        let key = storage_key(&file.file_name);
        let dir = self.root.join(namespace);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(&key), &file.data)?;

        tracing::debug!("Stored {} ({} bytes)", key, file.data.len());
        Ok(format!("{}/{}/{}", self.public_url, namespace, key))
    }

    fn delete(&self, url: &str, namespace: &str) -> io::Result<()> {
        let key = self.key_from_url(url, namespace)?;
        match std::fs::remove_file(self.root.join(namespace).join(key)) {
            Ok(()) => Ok(()),
            // Already gone is as good as deleted
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Resolve a `<namespace>/<key>` pair under `root`, refusing anything that
/// could escape it.
pub fn object_path(root: &Path, namespace: &str, key: &str) -> Option<PathBuf> {
    if is_safe_segment(namespace) && is_safe_segment(key) {
        Some(root.join(namespace).join(key))
    } else {
        None
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\'])
}

/// Unique object key keeping the original extension when it looks sane.
pub fn storage_key(original_name: &str) -> String {
    let extension = original_name
        .rfind('.')
        .filter(|&pos| pos > 0 && pos < original_name.len() - 1)
        .map(|pos| &original_name[pos + 1..])
        .filter(|ext| ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());

    format!("{}.{}", uuid::Uuid::now_v7(), extension)
}
