//! On-disk store for captured and exported images.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::types::ImageRef;
use crate::Result;

/// Hands out unique, timestamp-derived file names under one directory and
/// turns them into resolvable [`ImageRef`]s.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    root: PathBuf,
    public_base_url: Option<String>,
    sequence: Arc<AtomicU64>,
}

impl ScreenshotStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a new PNG location, creating the directory if needed. The file
    /// itself is written by the caller.
    pub fn allocate(&self, prefix: &str) -> Result<ImageRef> {
        std::fs::create_dir_all(&self.root)?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let file_name = format!("{prefix}-{millis}-{seq}.png");
        let path = self.root.join(&file_name);

        let locator = match &self.public_base_url {
            Some(base) => format!("{base}/images/{file_name}"),
            None => path.to_string_lossy().into_owned(),
        };

        Ok(ImageRef { locator, path })
    }

    /// Write `bytes` to a freshly allocated location.
    pub async fn persist(&self, prefix: &str, bytes: &[u8]) -> Result<ImageRef> {
        let image = self.allocate(prefix)?;
        tokio::fs::write(&image.path, bytes).await?;
        Ok(image)
    }

    /// Remove a stored file. Missing files are ignored.
    pub fn discard(&self, image: &ImageRef) {
        match std::fs::remove_file(&image.path) {
            Ok(()) => debug!(path = %image.path.display(), "discarded capture"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                debug!(path = %image.path.display(), error = %err, "failed to discard capture")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn allocate_creates_directory_and_unique_names() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path().join("nested").join("images");
        let store = ScreenshotStore::new(&root, None);

        let first = store.allocate("screenshot").expect("allocate");
        let second = store.allocate("screenshot").expect("allocate");

        assert!(root.is_dir());
        assert_ne!(first.path, second.path);
        assert!(first
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("screenshot-") && n.ends_with(".png")));
        assert_eq!(first.locator, first.path.to_string_lossy());
    }

    #[test]
    fn locator_uses_public_base_url() {
        let dir = TempDir::new().expect("tempdir");
        let store = ScreenshotStore::new(dir.path(), Some("https://cdn.example.com/".into()));

        let image = store.allocate("design").expect("allocate");
        let file_name = image.path.file_name().unwrap().to_string_lossy().into_owned();

        assert_eq!(
            image.locator,
            format!("https://cdn.example.com/images/{file_name}")
        );
    }

    #[tokio::test]
    async fn persist_writes_bytes() {
        let dir = TempDir::new().expect("tempdir");
        let store = ScreenshotStore::new(dir.path(), None);

        let image = store.persist("design", b"png-bytes").await.expect("persist");

        assert_eq!(std::fs::read(&image.path).expect("read"), b"png-bytes");
    }

    #[tokio::test]
    async fn discard_removes_file_and_tolerates_repeats() {
        let dir = TempDir::new().expect("tempdir");
        let store = ScreenshotStore::new(dir.path(), None);
        let image = store.persist("screenshot", b"bytes").await.expect("persist");

        store.discard(&image);
        assert!(!image.path.exists());
        store.discard(&image);
    }
}
