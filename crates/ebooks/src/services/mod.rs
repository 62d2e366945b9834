pub mod ebook;
pub mod ebook_type;
pub mod profile;
pub mod types;

pub use ebook::EbookService;
pub use ebook_type::TypeService;
pub use profile::ProfileService;
pub use types::{
    DatabaseConfig, Ebook, EbookFilters, EbookType, MediaConfig, Profile, ProjectConfig,
    ServerConfig, Upload, DEFAULT_IMAGE,
};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Rejected request input; nothing was persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Referential-integrity violation, e.g. deleting a type still in use.
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}
