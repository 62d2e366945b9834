pub mod duration;
pub mod store;
pub mod validate;

pub use duration::{DurationExtractor, LoftyExtractor};
pub use store::{ArtifactStore, LocalArtifactStore};
pub use validate::{validate_audio_filename, validate_extension, AUDIO_EXTENSIONS};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// Upload filename carries an extension outside the allow-list.
    #[error("Unsupported file type. Only {allowed} are allowed.")]
    UnsupportedExtension { allowed: String },

    /// Audio artifact is missing or could not be decoded.
    #[error("unreadable audio file '{}': {source}", path.display())]
    UnreadableAudio {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}
