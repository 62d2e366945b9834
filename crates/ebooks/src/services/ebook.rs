use super::types::{Ebook, EbookFilters, Upload, DEFAULT_IMAGE};
use super::ServiceError;
use crate::db::Database;
use crate::media::store::{unique_artifact_name, AUDIO_DIR, IMAGE_DIR};
use crate::media::store::{MAX_IMAGE_HEIGHT, MAX_IMAGE_WIDTH};
use crate::media::{validate_audio_filename, ArtifactStore, DurationExtractor};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Service orchestrating the ebook record lifecycle.
///
/// Every save runs the same sequence: validate input, persist the base row,
/// normalize the cover image, then derive `duration` from the audio artifact
/// and persist again. Image and duration work is best-effort; only upfront
/// validation blocks a write.
pub struct EbookService {
    db: Arc<dyn Database>,
    store: Arc<dyn ArtifactStore>,
    durations: Arc<dyn DurationExtractor>,
}

impl EbookService {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<dyn ArtifactStore>,
        durations: Arc<dyn DurationExtractor>,
    ) -> Self {
        Self {
            db,
            store,
            durations,
        }
    }

    /// Create a new ebook record with optional cover and audio uploads.
    pub async fn create(
        &self,
        title: String,
        description: String,
        type_id: Option<i64>,
        image: Option<Upload>,
        audio: Option<Upload>,
    ) -> Result<Ebook, ServiceError> {
        if title.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Title must not be empty".to_string(),
            ));
        }
        if let Some(upload) = &audio {
            validate_audio_filename(&upload.filename)
                .map_err(|e| ServiceError::Validation(e.to_string()))?;
        }
        self.check_type_exists(type_id).await?;

        let image_path = match image {
            Some(upload) => self.store_upload(IMAGE_DIR, upload).await?,
            None => DEFAULT_IMAGE.to_string(),
        };
        let audio_path = match audio {
            Some(upload) => Some(self.store_upload(AUDIO_DIR, upload).await?),
            None => None,
        };

        let now = chrono::Utc::now();
        let mut ebook = Ebook {
            id: 0,
            title,
            description,
            image: image_path,
            audio: audio_path,
            duration: None,
            type_id,
            created_at: now,
            updated_at: now,
        };
        ebook.id = self
            .db
            .insert_ebook(&ebook)
            .await
            .context("Failed to insert ebook")?;

        self.post_process(&mut ebook).await?;
        Ok(ebook)
    }

    /// Get an ebook by ID
    pub async fn get(&self, id: i64) -> Result<Option<Ebook>> {
        self.db.get_ebook(id).await.context("Failed to get ebook")
    }

    /// List ebooks with filters
    pub async fn list(&self, filters: &EbookFilters) -> Result<Vec<Ebook>> {
        self.db
            .list_ebooks(filters)
            .await
            .context("Failed to list ebooks")
    }

    /// Count ebooks matching the filters
    pub async fn count(&self, filters: &EbookFilters) -> Result<u64> {
        self.db
            .count_ebooks(filters)
            .await
            .context("Failed to count ebooks")
    }

    /// Update an existing ebook. `None` fields are left unchanged;
    /// `Some(None)` for `type_id` detaches the type. A new audio upload
    /// replaces the reference and triggers a fresh duration measurement.
    pub async fn update(
        &self,
        id: i64,
        title: Option<String>,
        description: Option<String>,
        type_id: Option<Option<i64>>,
        image: Option<Upload>,
        audio: Option<Upload>,
    ) -> Result<Ebook, ServiceError> {
        if let Some(upload) = &audio {
            validate_audio_filename(&upload.filename)
                .map_err(|e| ServiceError::Validation(e.to_string()))?;
        }

        let mut ebook = self
            .db
            .get_ebook(id)
            .await
            .context("Failed to get ebook")?
            .ok_or_else(|| ServiceError::NotFound(format!("Ebook '{}' not found", id)))?;

        if let Some(new_title) = title {
            if new_title.trim().is_empty() {
                return Err(ServiceError::Validation(
                    "Title must not be empty".to_string(),
                ));
            }
            ebook.title = new_title;
        }
        if let Some(new_description) = description {
            ebook.description = new_description;
        }
        if let Some(new_type) = type_id {
            self.check_type_exists(new_type).await?;
            ebook.type_id = new_type;
        }
        if let Some(upload) = image {
            ebook.image = self.store_upload(IMAGE_DIR, upload).await?;
        }
        if let Some(upload) = audio {
            ebook.audio = Some(self.store_upload(AUDIO_DIR, upload).await?);
        }

        ebook.updated_at = chrono::Utc::now();
        self.db
            .update_ebook(&ebook)
            .await
            .context("Failed to update ebook")?;

        self.post_process(&mut ebook).await?;
        Ok(ebook)
    }

    /// Remove an ebook and its owned artifacts.
    ///
    /// Artifact deletion runs first and its failures are logged, never
    /// surfaced; the metadata row is always removed. The placeholder image is
    /// shared and never deleted.
    pub async fn remove(&self, id: i64) -> Result<bool, ServiceError> {
        let Some(ebook) = self
            .db
            .get_ebook(id)
            .await
            .context("Failed to get ebook")?
        else {
            return Ok(false);
        };

        if let Some(audio) = &ebook.audio {
            if let Err(e) = self.store.delete(audio).await {
                tracing::warn!(ebook_id = id, error = %e, "Failed to delete audio artifact");
            }
        }
        if ebook.image != DEFAULT_IMAGE {
            if let Err(e) = self.store.delete(&ebook.image).await {
                tracing::warn!(ebook_id = id, error = %e, "Failed to delete image artifact");
            }
        }

        let deleted = self
            .db
            .delete_ebook(id)
            .await
            .context("Failed to delete ebook")?;
        Ok(deleted)
    }

    async fn check_type_exists(&self, type_id: Option<i64>) -> Result<(), ServiceError> {
        let Some(type_id) = type_id else {
            return Ok(());
        };
        let exists = self
            .db
            .get_type(type_id)
            .await
            .context("Failed to get type")?
            .is_some();
        if exists {
            Ok(())
        } else {
            Err(ServiceError::Validation(format!(
                "Type '{}' does not exist",
                type_id
            )))
        }
    }

    async fn store_upload(&self, dir: &str, upload: Upload) -> Result<String, ServiceError> {
        let dest = format!("{}/{}", dir, unique_artifact_name(&upload.filename));
        let path = self
            .store
            .store(&upload.bytes, &dest)
            .await
            .context("Failed to store artifact")?;
        Ok(path)
    }

    /// Post-save steps: best-effort image normalization, then duration
    /// derivation with a second persist when measurement succeeds. Duration
    /// is recomputed on every save while audio is attached.
    async fn post_process(&self, ebook: &mut Ebook) -> Result<(), ServiceError> {
        if self.store.resolve(&ebook.image).is_some() {
            self.store
                .resize_image_if_oversized(&ebook.image, MAX_IMAGE_WIDTH, MAX_IMAGE_HEIGHT)
                .await;
        }

        if let Some(audio) = ebook.audio.clone() {
            let Some(path) = self.store.resolve(&audio) else {
                tracing::warn!(ebook_id = ebook.id, audio, "Audio file path is invalid");
                return Ok(());
            };
            match self.durations.measure(&path).await {
                Ok(seconds) => {
                    ebook.duration = Some(seconds);
                    ebook.updated_at = chrono::Utc::now();
                    self.db
                        .update_ebook(ebook)
                        .await
                        .context("Failed to persist duration")?;
                }
                Err(e) => {
                    tracing::warn!(ebook_id = ebook.id, error = %e, "Error calculating duration");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedDuration, MemoryArtifactStore, TestDatabase, UnreadableDuration};
    use crate::services::EbookType;

    fn upload(filename: &str) -> Upload {
        Upload {
            filename: filename.to_string(),
            bytes: b"bytes".to_vec(),
        }
    }

    fn service(
        db: Arc<TestDatabase>,
        store: Arc<MemoryArtifactStore>,
        durations: Arc<dyn DurationExtractor>,
    ) -> EbookService {
        EbookService::new(db, store, durations)
    }

    fn fixture() -> (Arc<TestDatabase>, Arc<MemoryArtifactStore>) {
        (
            Arc::new(TestDatabase::new()),
            Arc::new(MemoryArtifactStore::new()),
        )
    }

    #[tokio::test]
    async fn create_with_audio_sets_duration() {
        let (db, store) = fixture();
        let svc = service(db, store.clone(), Arc::new(FixedDuration(3.5)));

        let ebook = svc
            .create(
                "A".to_string(),
                String::new(),
                None,
                None,
                Some(upload("valid.mp3")),
            )
            .await
            .unwrap();

        assert_eq!(ebook.duration, Some(3.5));
        let audio = ebook.audio.unwrap();
        assert!(audio.starts_with("ebook_audio/"));
        assert!(store.exists(&audio).await);
    }

    #[tokio::test]
    async fn create_persists_duration_not_only_returns_it() {
        let (db, store) = fixture();
        let svc = service(db.clone(), store, Arc::new(FixedDuration(7.25)));

        let ebook = svc
            .create(
                "A".to_string(),
                String::new(),
                None,
                None,
                Some(upload("valid.mp3")),
            )
            .await
            .unwrap();

        let stored = db.get_ebook(ebook.id).await.unwrap().unwrap();
        assert_eq!(stored.duration, Some(7.25));
    }

    #[tokio::test]
    async fn create_with_unreadable_audio_still_succeeds() {
        let (db, store) = fixture();
        let svc = service(db.clone(), store, Arc::new(UnreadableDuration));

        let ebook = svc
            .create(
                "B".to_string(),
                String::new(),
                None,
                None,
                Some(upload("corrupt.mp3")),
            )
            .await
            .unwrap();

        assert!(ebook.duration.is_none());
        // Record is persisted and visible despite the failed measurement
        assert!(db.get_ebook(ebook.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_without_audio_has_no_duration() {
        let (db, store) = fixture();
        let svc = service(db, store, Arc::new(FixedDuration(3.5)));

        let ebook = svc
            .create("A".to_string(), String::new(), None, None, None)
            .await
            .unwrap();

        assert!(ebook.audio.is_none());
        assert!(ebook.duration.is_none());
    }

    #[tokio::test]
    async fn create_rejects_invalid_audio_extension_before_persist() {
        let (db, store) = fixture();
        let svc = service(db.clone(), store.clone(), Arc::new(FixedDuration(3.5)));

        let result = svc
            .create(
                "C".to_string(),
                String::new(),
                None,
                None,
                Some(upload("file.txt")),
            )
            .await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
        let listed = db.list_ebooks(&EbookFilters::default()).await.unwrap();
        assert!(listed.is_empty(), "no record may be created");
        assert!(store.is_empty(), "no artifact may be stored");
    }

    #[tokio::test]
    async fn create_rejects_empty_title() {
        let (db, store) = fixture();
        let svc = service(db, store, Arc::new(FixedDuration(3.5)));

        let result = svc
            .create("   ".to_string(), String::new(), None, None, None)
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn create_rejects_unknown_type() {
        let (db, store) = fixture();
        let svc = service(db, store, Arc::new(FixedDuration(3.5)));

        let result = svc
            .create("A".to_string(), String::new(), Some(99), None, None)
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn create_without_image_uses_placeholder() {
        let (db, store) = fixture();
        let svc = service(db, store, Arc::new(FixedDuration(3.5)));

        let ebook = svc
            .create("A".to_string(), String::new(), None, None, None)
            .await
            .unwrap();
        assert_eq!(ebook.image, DEFAULT_IMAGE);
    }

    #[tokio::test]
    async fn update_recomputes_duration_even_when_audio_unchanged() {
        let (db, store) = fixture();
        let svc = service(db.clone(), store.clone(), Arc::new(FixedDuration(3.5)));
        let ebook = svc
            .create(
                "A".to_string(),
                String::new(),
                None,
                None,
                Some(upload("valid.mp3")),
            )
            .await
            .unwrap();

        // Same record through a service whose extractor now reports a
        // different length: a title-only update re-measures.
        let svc = service(db, store, Arc::new(FixedDuration(9.0)));
        let updated = svc
            .update(ebook.id, Some("A2".to_string()), None, None, None, None)
            .await
            .unwrap();

        assert_eq!(updated.title, "A2");
        assert_eq!(updated.duration, Some(9.0));
    }

    #[tokio::test]
    async fn update_failed_measurement_keeps_prior_duration() {
        let (db, store) = fixture();
        let svc = service(db.clone(), store.clone(), Arc::new(FixedDuration(3.5)));
        let ebook = svc
            .create(
                "A".to_string(),
                String::new(),
                None,
                None,
                Some(upload("valid.mp3")),
            )
            .await
            .unwrap();

        let svc = service(db, store, Arc::new(UnreadableDuration));
        let updated = svc
            .update(ebook.id, Some("A2".to_string()), None, None, None, None)
            .await
            .unwrap();

        assert_eq!(updated.duration, Some(3.5));
    }

    #[tokio::test]
    async fn update_nonexistent_returns_not_found() {
        let (db, store) = fixture();
        let svc = service(db, store, Arc::new(FixedDuration(3.5)));

        let result = svc
            .update(42, Some("A".to_string()), None, None, None, None)
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_rejects_invalid_audio_extension() {
        let (db, store) = fixture();
        let svc = service(db, store, Arc::new(FixedDuration(3.5)));
        let ebook = svc
            .create("A".to_string(), String::new(), None, None, None)
            .await
            .unwrap();

        let result = svc
            .update(ebook.id, None, None, None, None, Some(upload("file.txt")))
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn update_can_detach_the_type() {
        let (db, store) = fixture();
        let type_id = db
            .insert_type(&EbookType {
                id: 0,
                slug: "novel".to_string(),
                title: "Novel".to_string(),
            })
            .await
            .unwrap();
        let svc = service(db.clone(), store, Arc::new(FixedDuration(3.5)));
        let ebook = svc
            .create("A".to_string(), String::new(), Some(type_id), None, None)
            .await
            .unwrap();

        let updated = svc
            .update(ebook.id, None, None, Some(None), None, None)
            .await
            .unwrap();
        assert!(updated.type_id.is_none());
        let stored = db.get_ebook(ebook.id).await.unwrap().unwrap();
        assert!(stored.type_id.is_none());
    }

    #[tokio::test]
    async fn update_leaves_type_unchanged_when_not_supplied() {
        let (db, store) = fixture();
        let type_id = db
            .insert_type(&EbookType {
                id: 0,
                slug: "novel".to_string(),
                title: "Novel".to_string(),
            })
            .await
            .unwrap();
        let svc = service(db, store, Arc::new(FixedDuration(3.5)));
        let ebook = svc
            .create("A".to_string(), String::new(), Some(type_id), None, None)
            .await
            .unwrap();

        let updated = svc
            .update(ebook.id, Some("A2".to_string()), None, None, None, None)
            .await
            .unwrap();
        assert_eq!(updated.type_id, Some(type_id));
    }

    #[tokio::test]
    async fn remove_deletes_artifacts_then_row() {
        let (db, store) = fixture();
        let svc = service(db.clone(), store.clone(), Arc::new(FixedDuration(3.5)));
        let ebook = svc
            .create(
                "A".to_string(),
                String::new(),
                None,
                Some(upload("cover.png")),
                Some(upload("valid.mp3")),
            )
            .await
            .unwrap();

        let image = ebook.image.clone();
        let audio = ebook.audio.clone().unwrap();

        assert!(svc.remove(ebook.id).await.unwrap());
        assert!(!store.exists(&image).await);
        assert!(!store.exists(&audio).await);
        assert!(db.get_ebook(ebook.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_spares_the_placeholder_image() {
        let (db, store) = fixture();
        store.store(b"png", DEFAULT_IMAGE).await.unwrap();
        let svc = service(db, store.clone(), Arc::new(FixedDuration(3.5)));

        let ebook = svc
            .create("A".to_string(), String::new(), None, None, None)
            .await
            .unwrap();
        assert!(svc.remove(ebook.id).await.unwrap());
        assert!(store.exists(DEFAULT_IMAGE).await);
    }

    #[tokio::test]
    async fn remove_with_already_missing_files_still_deletes_row() {
        let (db, store) = fixture();
        let svc = service(db.clone(), store.clone(), Arc::new(FixedDuration(3.5)));
        let ebook = svc
            .create(
                "A".to_string(),
                String::new(),
                None,
                None,
                Some(upload("valid.mp3")),
            )
            .await
            .unwrap();

        // Simulate a file lost outside the service
        store.delete(ebook.audio.as_ref().unwrap()).await.unwrap();

        assert!(svc.remove(ebook.id).await.unwrap());
        assert!(db.get_ebook(ebook.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_missing_returns_false() {
        let (db, store) = fixture();
        let svc = service(db, store, Arc::new(FixedDuration(3.5)));
        assert!(!svc.remove(42).await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_by_type() {
        let (db, store) = fixture();
        let type_id = db
            .insert_type(&EbookType {
                id: 0,
                slug: "novel".to_string(),
                title: "Novel".to_string(),
            })
            .await
            .unwrap();

        let svc = service(db, store, Arc::new(FixedDuration(3.5)));
        svc.create("A".to_string(), String::new(), Some(type_id), None, None)
            .await
            .unwrap();
        svc.create("B".to_string(), String::new(), None, None, None)
            .await
            .unwrap();

        let filters = EbookFilters {
            type_id: Some(type_id),
            ..Default::default()
        };
        let listed = svc.list(&filters).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "A");
        assert_eq!(svc.count(&filters).await.unwrap(), 1);
    }
}
