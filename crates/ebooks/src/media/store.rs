use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Subdirectory for uploaded cover images.
pub const IMAGE_DIR: &str = "ebook_pics";
/// Subdirectory for uploaded audio files.
pub const AUDIO_DIR: &str = "ebook_audio";

/// Maximum stored cover dimensions. Larger images are shrunk proportionally
/// on save.
pub const MAX_IMAGE_WIDTH: u32 = 300;
pub const MAX_IMAGE_HEIGHT: u32 = 300;

/// Store trait for binary artifacts (cover images, audio files).
///
/// Paths are store-relative handles; the store owns no business rules.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write bytes under `dest` and return the stored path handle.
    async fn store(&self, bytes: &[u8], dest: &str) -> Result<String>;

    /// Filesystem location of a stored artifact, when the backend has one.
    fn resolve(&self, path: &str) -> Option<PathBuf>;

    /// Shrink the image at `path` in place so neither dimension exceeds the
    /// maximums. Aspect ratio is preserved; images already within bounds are
    /// left untouched and upscaling never happens. A missing file or decode
    /// error is logged and swallowed.
    async fn resize_image_if_oversized(&self, path: &str, max_width: u32, max_height: u32);

    /// Remove a stored artifact. A missing file is already satisfied.
    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> bool;
}

/// Generate a collision-resistant stored name that keeps the client filename
/// readable. Uses a reduced alphabet without ambiguous characters.
pub fn unique_artifact_name(filename: &str) -> String {
    const ALPHABET: &[char] = &[
        '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'k',
        'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    ];
    // Strip any client-supplied directory components
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    format!("{}-{}", nanoid::nanoid!(10, ALPHABET), base)
}

/// Filesystem-backed store rooted at the configured media directory.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn store(&self, bytes: &[u8], dest: &str) -> Result<String> {
        let abs = self.root.join(dest);
        if let Some(parent) = abs.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create media directory")?;
        }
        tokio::fs::write(&abs, bytes)
            .await
            .with_context(|| format!("Failed to write artifact '{}'", dest))?;
        Ok(dest.to_string())
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        Some(self.root.join(path))
    }

    async fn resize_image_if_oversized(&self, path: &str, max_width: u32, max_height: u32) {
        let abs = self.root.join(path);
        if !abs.exists() {
            tracing::warn!(path = %abs.display(), "Image file not found, skipping resize");
            return;
        }

        // Decoding is synchronous work, keep it off the async executor
        let result = tokio::task::spawn_blocking(move || -> Result<()> {
            let img = image::open(&abs).context("Failed to decode image")?;
            if img.width() > max_width || img.height() > max_height {
                let resized = img.thumbnail(max_width, max_height);
                resized.save(&abs).context("Failed to write resized image")?;
            }
            Ok(())
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(path, error = %e, "Error processing image"),
            Err(e) => tracing::warn!(path, error = %e, "Image resize task failed"),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let abs = self.root.join(path);
        match tokio::fs::remove_file(&abs).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete artifact '{}'", path)),
        }
    }

    async fn exists(&self, path: &str) -> bool {
        self.root.join(path).exists()
    }
}
