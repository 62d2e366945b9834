use super::MediaError;
use async_trait::async_trait;
use lofty::prelude::AudioFile;
use lofty::probe::Probe;
use std::path::Path;

/// Reads an audio artifact and reports its playback length.
#[async_trait]
pub trait DurationExtractor: Send + Sync {
    /// Total playback length in fractional seconds. Fails with
    /// [`MediaError::UnreadableAudio`] when the file is missing or malformed.
    async fn measure(&self, path: &Path) -> Result<f64, MediaError>;
}

/// Extractor backed by lofty's format probing.
pub struct LoftyExtractor;

#[async_trait]
impl DurationExtractor for LoftyExtractor {
    async fn measure(&self, path: &Path) -> Result<f64, MediaError> {
        let owned = path.to_path_buf();
        let unreadable = |source: anyhow::Error| MediaError::UnreadableAudio {
            path: path.to_path_buf(),
            source,
        };

        // Probing is synchronous file IO, keep it off the async executor
        let seconds = tokio::task::spawn_blocking(move || {
            let tagged = Probe::open(&owned)?.read()?;
            Ok::<_, lofty::error::LoftyError>(tagged.properties().duration().as_secs_f64())
        })
        .await
        .map_err(|e| unreadable(anyhow::anyhow!(e)))?
        .map_err(|e| unreadable(anyhow::anyhow!(e)))?;

        Ok(seconds)
    }
}
