//! Test utilities for the ebooks crate
//!
//! This module provides reusable test doubles for unit and integration
//! testing: an in-memory `Database`, an in-memory `ArtifactStore`, and
//! canned `DurationExtractor` implementations.

use crate::db::Database;
use crate::media::{ArtifactStore, DurationExtractor, MediaError};
use crate::services::{Ebook, EbookFilters, EbookType, Profile};
use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// In-memory database implementation for testing.
///
/// Thread-safe via Mutex, suitable for unit tests.
pub struct TestDatabase {
    ebooks: Mutex<HashMap<i64, Ebook>>,
    types: Mutex<HashMap<i64, EbookType>>,
    profiles: Mutex<HashMap<i64, Profile>>,
    next_id: AtomicI64,
}

impl TestDatabase {
    pub fn new() -> Self {
        Self {
            ebooks: Mutex::new(HashMap::new()),
            types: Mutex::new(HashMap::new()),
            profiles: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filters(ebook: &Ebook, filters: &EbookFilters) -> bool {
    if filters.type_id.is_some() && ebook.type_id != filters.type_id {
        return false;
    }
    if let Some(search) = &filters.search {
        let needle = search.to_lowercase();
        let haystack = format!(
            "{} {}",
            ebook.title.to_lowercase(),
            ebook.description.to_lowercase()
        );
        if !haystack.contains(&needle) {
            return false;
        }
    }
    true
}

#[async_trait::async_trait]
impl Database for TestDatabase {
    async fn insert_ebook(&self, ebook: &Ebook) -> Result<i64> {
        let id = self.next_id();
        let mut stored = ebook.clone();
        stored.id = id;
        self.ebooks.lock().unwrap().insert(id, stored);
        Ok(id)
    }

    async fn get_ebook(&self, id: i64) -> Result<Option<Ebook>> {
        Ok(self.ebooks.lock().unwrap().get(&id).cloned())
    }

    async fn update_ebook(&self, ebook: &Ebook) -> Result<()> {
        self.ebooks.lock().unwrap().insert(ebook.id, ebook.clone());
        Ok(())
    }

    async fn delete_ebook(&self, id: i64) -> Result<bool> {
        Ok(self.ebooks.lock().unwrap().remove(&id).is_some())
    }

    async fn list_ebooks(&self, filters: &EbookFilters) -> Result<Vec<Ebook>> {
        let mut all: Vec<_> = self
            .ebooks
            .lock()
            .unwrap()
            .values()
            .filter(|e| matches_filters(e, filters))
            .cloned()
            .collect();
        all.sort_by_key(|e| e.id);
        Ok(all
            .into_iter()
            .skip(filters.offset)
            .take(filters.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn count_ebooks(&self, filters: &EbookFilters) -> Result<u64> {
        Ok(self
            .ebooks
            .lock()
            .unwrap()
            .values()
            .filter(|e| matches_filters(e, filters))
            .count() as u64)
    }

    async fn insert_type(&self, ebook_type: &EbookType) -> Result<i64> {
        let id = self.next_id();
        let mut stored = ebook_type.clone();
        stored.id = id;
        self.types.lock().unwrap().insert(id, stored);
        Ok(id)
    }

    async fn get_type(&self, id: i64) -> Result<Option<EbookType>> {
        Ok(self.types.lock().unwrap().get(&id).cloned())
    }

    async fn get_type_by_slug(&self, slug: &str) -> Result<Option<EbookType>> {
        Ok(self
            .types
            .lock()
            .unwrap()
            .values()
            .find(|t| t.slug == slug)
            .cloned())
    }

    async fn list_types(&self) -> Result<Vec<EbookType>> {
        let mut all: Vec<_> = self.types.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(all)
    }

    async fn update_type(&self, ebook_type: &EbookType) -> Result<()> {
        self.types
            .lock()
            .unwrap()
            .insert(ebook_type.id, ebook_type.clone());
        Ok(())
    }

    async fn delete_type(&self, id: i64) -> Result<bool> {
        Ok(self.types.lock().unwrap().remove(&id).is_some())
    }

    async fn count_ebooks_of_type(&self, type_id: i64) -> Result<u64> {
        Ok(self
            .ebooks
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.type_id == Some(type_id))
            .count() as u64)
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<i64> {
        let id = self.next_id();
        let mut stored = profile.clone();
        stored.id = id;
        self.profiles.lock().unwrap().insert(id, stored);
        Ok(id)
    }

    async fn get_profile(&self, id: i64) -> Result<Option<Profile>> {
        Ok(self.profiles.lock().unwrap().get(&id).cloned())
    }

    async fn update_profile(&self, profile: &Profile) -> Result<()> {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.id, profile.clone());
        Ok(())
    }
}

/// In-memory artifact store for testing. Resize is a no-op.
pub struct MemoryArtifactStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().unwrap().is_empty()
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn store(&self, bytes: &[u8], dest: &str) -> Result<String> {
        self.files
            .lock()
            .unwrap()
            .insert(dest.to_string(), bytes.to_vec());
        Ok(dest.to_string())
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        Some(PathBuf::from(path))
    }

    async fn resize_image_if_oversized(&self, _path: &str, _max_width: u32, _max_height: u32) {}

    async fn delete(&self, path: &str) -> Result<()> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }
}

/// Extractor reporting a fixed playback length for any path.
pub struct FixedDuration(pub f64);

#[async_trait::async_trait]
impl DurationExtractor for FixedDuration {
    async fn measure(&self, _path: &Path) -> Result<f64, MediaError> {
        Ok(self.0)
    }
}

/// Extractor failing every measurement, as a missing/corrupt file would.
pub struct UnreadableDuration;

#[async_trait::async_trait]
impl DurationExtractor for UnreadableDuration {
    async fn measure(&self, path: &Path) -> Result<f64, MediaError> {
        Err(MediaError::UnreadableAudio {
            path: path.to_path_buf(),
            source: anyhow::anyhow!("unreadable test audio"),
        })
    }
}
