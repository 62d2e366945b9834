use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Image assigned to ebooks created without a cover upload.
/// Exempt from deletion when the owning record is removed.
pub const DEFAULT_IMAGE: &str = "default.png";

/// Core ebook record.
///
/// `duration` is derived from the attached audio artifact and never supplied
/// by clients; it stays `None` when no audio is attached or the file could
/// not be measured.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ebook {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Store-relative path of the cover image artifact.
    pub image: String,
    /// Store-relative path of the audio artifact, if any.
    pub audio: Option<String>,
    /// Measured playback length in fractional seconds.
    pub duration: Option<f64>,
    #[serde(rename = "type")]
    pub type_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lookup entity grouping ebooks. Many ebooks may reference one type.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EbookType {
    pub id: i64,
    /// Unique URL-safe token.
    pub slug: String,
    pub title: String,
}

/// User profile: admin flag and account balance. No derived fields.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub is_admin: bool,
    pub money: f64,
}

/// An uploaded binary artifact as received from the request layer.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Listing filters for ebook queries.
#[derive(Debug, Clone, Default)]
pub struct EbookFilters {
    /// Restrict to ebooks referencing this type.
    pub type_id: Option<i64>,
    /// Case-insensitive substring match over title and description.
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Server listen configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Configuration for the relational store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://ebooks.db".to_string(),
        }
    }
}

/// Configuration for the media artifact area
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Root directory for stored artifacts
    pub root: String,
    /// URL prefix under which artifacts are served
    pub base_url: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: "media".to_string(),
            base_url: "/media".to_string(),
        }
    }
}

/// Project configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub media: MediaConfig,
}
