use anyhow::Result;
use ebooks::db::sqlite::SqliteDatabase;
use ebooks::db::Database;
use ebooks::media::{ArtifactStore, LocalArtifactStore, LoftyExtractor};
use ebooks::services::{EbookService, ProfileService, ProjectConfig, TypeService};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ebook_service: Arc<EbookService>,
    pub type_service: Arc<TypeService>,
    pub profile_service: Arc<ProfileService>,
    pub config: ProjectConfig,
}

impl AppState {
    pub async fn from_env() -> Result<Self> {
        let config: ProjectConfig = Figment::new()
            .merge(Serialized::defaults(ProjectConfig::default()))
            .merge(Toml::file("ebooks.toml"))
            .merge(Env::prefixed("EBOOKS_").split("__"))
            .extract()?;

        let db = SqliteDatabase::new(&config.database.url).await?;
        db.init().await?;
        let db: Arc<dyn Database> = Arc::new(db);

        let store: Arc<dyn ArtifactStore> =
            Arc::new(LocalArtifactStore::new(config.media.root.as_str()));
        let durations = Arc::new(LoftyExtractor);

        let ebook_service = Arc::new(EbookService::new(db.clone(), store, durations));
        let type_service = Arc::new(TypeService::new(db.clone()));
        let profile_service = Arc::new(ProfileService::new(db));

        Ok(Self {
            ebook_service,
            type_service,
            profile_service,
            config,
        })
    }
}
