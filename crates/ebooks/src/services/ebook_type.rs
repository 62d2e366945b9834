use super::types::EbookType;
use super::ServiceError;
use crate::db::Database;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Service for the type lookup entity (slug + title).
///
/// Types are shared reference targets: deleting one that any ebook still
/// references is rejected.
pub struct TypeService {
    db: Arc<dyn Database>,
}

impl TypeService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Add a new type. The slug is normalized to a URL-safe token.
    pub async fn add(&self, slug: &str, title: String) -> Result<EbookType, ServiceError> {
        let slug = slug::slugify(slug);
        if slug.is_empty() {
            return Err(ServiceError::Validation(
                "Slug must not be empty".to_string(),
            ));
        }
        if title.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Title must not be empty".to_string(),
            ));
        }
        if self
            .db
            .get_type_by_slug(&slug)
            .await
            .context("Failed to get type by slug")?
            .is_some()
        {
            return Err(ServiceError::Validation(format!(
                "Type slug '{}' already exists",
                slug
            )));
        }

        let mut ebook_type = EbookType { id: 0, slug, title };
        ebook_type.id = self
            .db
            .insert_type(&ebook_type)
            .await
            .context("Failed to insert type")?;
        Ok(ebook_type)
    }

    /// Get a type by ID
    pub async fn get(&self, id: i64) -> Result<Option<EbookType>> {
        self.db.get_type(id).await.context("Failed to get type")
    }

    /// List all types, ordered by title
    pub async fn list(&self) -> Result<Vec<EbookType>> {
        self.db.list_types().await.context("Failed to list types")
    }

    /// Update a type's slug and/or title
    pub async fn update(
        &self,
        id: i64,
        slug: Option<String>,
        title: Option<String>,
    ) -> Result<EbookType, ServiceError> {
        let mut ebook_type = self
            .db
            .get_type(id)
            .await
            .context("Failed to get type")?
            .ok_or_else(|| ServiceError::NotFound(format!("Type '{}' not found", id)))?;

        if let Some(new_slug) = slug {
            let new_slug = slug::slugify(&new_slug);
            if new_slug.is_empty() {
                return Err(ServiceError::Validation(
                    "Slug must not be empty".to_string(),
                ));
            }
            let taken = self
                .db
                .get_type_by_slug(&new_slug)
                .await
                .context("Failed to get type by slug")?
                .is_some_and(|existing| existing.id != id);
            if taken {
                return Err(ServiceError::Validation(format!(
                    "Type slug '{}' already exists",
                    new_slug
                )));
            }
            ebook_type.slug = new_slug;
        }
        if let Some(new_title) = title {
            if new_title.trim().is_empty() {
                return Err(ServiceError::Validation(
                    "Title must not be empty".to_string(),
                ));
            }
            ebook_type.title = new_title;
        }

        self.db
            .update_type(&ebook_type)
            .await
            .context("Failed to update type")?;
        Ok(ebook_type)
    }

    /// Remove a type. Rejected while any ebook references it.
    pub async fn remove(&self, id: i64) -> Result<bool, ServiceError> {
        let referenced = self
            .db
            .count_ebooks_of_type(id)
            .await
            .context("Failed to count references")?;
        if referenced > 0 {
            return Err(ServiceError::Integrity(format!(
                "Type '{}' is referenced by {} ebook(s) and cannot be deleted",
                id, referenced
            )));
        }

        let deleted = self
            .db
            .delete_type(id)
            .await
            .context("Failed to delete type")?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{Ebook, DEFAULT_IMAGE};
    use crate::testing::TestDatabase;
    use chrono::Utc;

    fn service() -> (Arc<TestDatabase>, TypeService) {
        let db = Arc::new(TestDatabase::new());
        let svc = TypeService::new(db.clone());
        (db, svc)
    }

    async fn attach_ebook(db: &TestDatabase, type_id: i64) {
        let now = Utc::now();
        db.insert_ebook(&Ebook {
            id: 0,
            title: "A".to_string(),
            description: String::new(),
            image: DEFAULT_IMAGE.to_string(),
            audio: None,
            duration: None,
            type_id: Some(type_id),
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn add_normalizes_slug() {
        let (_db, svc) = service();
        let t = svc.add("Science Fiction", "Sci-Fi".to_string()).await.unwrap();
        assert_eq!(t.slug, "science-fiction");
        assert!(t.id > 0);
    }

    #[tokio::test]
    async fn add_rejects_duplicate_slug() {
        let (_db, svc) = service();
        svc.add("novel", "Novel".to_string()).await.unwrap();
        let result = svc.add("Novel", "Another".to_string()).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn add_rejects_empty_title() {
        let (_db, svc) = service();
        let result = svc.add("novel", "  ".to_string()).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn remove_referenced_type_is_rejected() {
        let (db, svc) = service();
        let t = svc.add("novel", "Novel".to_string()).await.unwrap();
        attach_ebook(&db, t.id).await;

        let result = svc.remove(t.id).await;
        assert!(matches!(result, Err(ServiceError::Integrity(_))));
        // Type is still there
        assert!(svc.get(t.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn remove_unreferenced_type_succeeds() {
        let (_db, svc) = service();
        let t = svc.add("novel", "Novel".to_string()).await.unwrap();

        assert!(svc.remove(t.id).await.unwrap());
        assert!(svc.get(t.id).await.unwrap().is_none());
        assert!(!svc.remove(t.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_changes_slug_and_title() {
        let (_db, svc) = service();
        let t = svc.add("novel", "Novel".to_string()).await.unwrap();

        let updated = svc
            .update(t.id, Some("Long Reads".to_string()), Some("Long".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.slug, "long-reads");
        assert_eq!(updated.title, "Long");
    }

    #[tokio::test]
    async fn update_keeping_own_slug_is_allowed() {
        let (_db, svc) = service();
        let t = svc.add("novel", "Novel".to_string()).await.unwrap();

        let updated = svc
            .update(t.id, Some("novel".to_string()), None)
            .await
            .unwrap();
        assert_eq!(updated.slug, "novel");
    }

    #[tokio::test]
    async fn update_nonexistent_returns_not_found() {
        let (_db, svc) = service();
        let result = svc.update(42, None, Some("X".to_string())).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_orders_by_title() {
        let (_db, svc) = service();
        svc.add("zine", "Zine".to_string()).await.unwrap();
        svc.add("audiobook", "Audiobook".to_string()).await.unwrap();

        let listed = svc.list().await.unwrap();
        assert_eq!(listed[0].title, "Audiobook");
        assert_eq!(listed[1].title, "Zine");
    }
}
