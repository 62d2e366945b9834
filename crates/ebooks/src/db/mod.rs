pub mod sqlite;

use crate::services::{Ebook, EbookFilters, EbookType, Profile};
use anyhow::Result;

/// Database trait for ebook, type, and profile rows.
///
/// Inserts ignore the incoming `id` and return the assigned one.
#[async_trait::async_trait]
pub trait Database: Send + Sync {
    async fn insert_ebook(&self, ebook: &Ebook) -> Result<i64>;

    async fn get_ebook(&self, id: i64) -> Result<Option<Ebook>>;

    async fn update_ebook(&self, ebook: &Ebook) -> Result<()>;

    async fn delete_ebook(&self, id: i64) -> Result<bool>;

    /// List ebooks matching the filters, ordered by id.
    async fn list_ebooks(&self, filters: &EbookFilters) -> Result<Vec<Ebook>>;

    /// Count ebooks matching the filters, ignoring limit/offset.
    async fn count_ebooks(&self, filters: &EbookFilters) -> Result<u64>;

    async fn insert_type(&self, ebook_type: &EbookType) -> Result<i64>;

    async fn get_type(&self, id: i64) -> Result<Option<EbookType>>;

    async fn get_type_by_slug(&self, slug: &str) -> Result<Option<EbookType>>;

    /// List all types ordered by title.
    async fn list_types(&self) -> Result<Vec<EbookType>>;

    async fn update_type(&self, ebook_type: &EbookType) -> Result<()>;

    async fn delete_type(&self, id: i64) -> Result<bool>;

    /// Number of ebooks referencing the given type.
    async fn count_ebooks_of_type(&self, type_id: i64) -> Result<u64>;

    async fn insert_profile(&self, profile: &Profile) -> Result<i64>;

    async fn get_profile(&self, id: i64) -> Result<Option<Profile>>;

    async fn update_profile(&self, profile: &Profile) -> Result<()>;
}
