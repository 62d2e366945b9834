use super::Database;
use crate::services::{Ebook, EbookFilters, EbookType, Profile};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ebooks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    image TEXT NOT NULL,
    audio TEXT,
    duration REAL,
    type_id INTEGER REFERENCES types(id) ON DELETE RESTRICT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL DEFAULT '',
    is_admin INTEGER NOT NULL DEFAULT 0,
    money REAL NOT NULL DEFAULT 0
);
";

/// SQLite implementation over an sqlx connection pool.
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Connect to the database at the given sqlx URL, creating the file if
    /// needed.
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL '{}'", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database exists per connection, so the pool must not
        // open a second one.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Create the schema if it does not exist yet.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context("Failed to create database schema")?;
        Ok(())
    }

    fn push_ebook_filters(qb: &mut QueryBuilder<'_, Sqlite>, filters: &EbookFilters) {
        if let Some(type_id) = filters.type_id {
            qb.push(" AND type_id = ").push_bind(type_id);
        }
        if let Some(search) = &filters.search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR description LIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

#[async_trait::async_trait]
impl Database for SqliteDatabase {
    async fn insert_ebook(&self, ebook: &Ebook) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO ebooks (title, description, image, audio, duration, type_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&ebook.title)
        .bind(&ebook.description)
        .bind(&ebook.image)
        .bind(&ebook.audio)
        .bind(ebook.duration)
        .bind(ebook.type_id)
        .bind(ebook.created_at)
        .bind(ebook.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert ebook")?;

        Ok(result.last_insert_rowid())
    }

    async fn get_ebook(&self, id: i64) -> Result<Option<Ebook>> {
        sqlx::query_as::<_, Ebook>("SELECT * FROM ebooks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get ebook")
    }

    async fn update_ebook(&self, ebook: &Ebook) -> Result<()> {
        sqlx::query(
            "UPDATE ebooks SET title = ?, description = ?, image = ?, audio = ?, duration = ?, type_id = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&ebook.title)
        .bind(&ebook.description)
        .bind(&ebook.image)
        .bind(&ebook.audio)
        .bind(ebook.duration)
        .bind(ebook.type_id)
        .bind(ebook.updated_at)
        .bind(ebook.id)
        .execute(&self.pool)
        .await
        .context("Failed to update ebook")?;
        Ok(())
    }

    async fn delete_ebook(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ebooks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete ebook")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_ebooks(&self, filters: &EbookFilters) -> Result<Vec<Ebook>> {
        let mut qb = QueryBuilder::new("SELECT * FROM ebooks WHERE 1 = 1");
        Self::push_ebook_filters(&mut qb, filters);
        qb.push(" ORDER BY id");
        if let Some(limit) = filters.limit {
            qb.push(" LIMIT ")
                .push_bind(limit as i64)
                .push(" OFFSET ")
                .push_bind(filters.offset as i64);
        }

        qb.build_query_as::<Ebook>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list ebooks")
    }

    async fn count_ebooks(&self, filters: &EbookFilters) -> Result<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM ebooks WHERE 1 = 1");
        Self::push_ebook_filters(&mut qb, filters);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count ebooks")?;
        Ok(count as u64)
    }

    async fn insert_type(&self, ebook_type: &EbookType) -> Result<i64> {
        let result = sqlx::query("INSERT INTO types (slug, title) VALUES (?, ?)")
            .bind(&ebook_type.slug)
            .bind(&ebook_type.title)
            .execute(&self.pool)
            .await
            .context("Failed to insert type")?;
        Ok(result.last_insert_rowid())
    }

    async fn get_type(&self, id: i64) -> Result<Option<EbookType>> {
        sqlx::query_as::<_, EbookType>("SELECT * FROM types WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get type")
    }

    async fn get_type_by_slug(&self, slug: &str) -> Result<Option<EbookType>> {
        sqlx::query_as::<_, EbookType>("SELECT * FROM types WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get type by slug")
    }

    async fn list_types(&self) -> Result<Vec<EbookType>> {
        sqlx::query_as::<_, EbookType>("SELECT * FROM types ORDER BY title")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list types")
    }

    async fn update_type(&self, ebook_type: &EbookType) -> Result<()> {
        sqlx::query("UPDATE types SET slug = ?, title = ? WHERE id = ?")
            .bind(&ebook_type.slug)
            .bind(&ebook_type.title)
            .bind(ebook_type.id)
            .execute(&self.pool)
            .await
            .context("Failed to update type")?;
        Ok(())
    }

    async fn delete_type(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM types WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete type")?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_ebooks_of_type(&self, type_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ebooks WHERE type_id = ?")
            .bind(type_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count ebooks of type")?;
        Ok(count as u64)
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<i64> {
        let result = sqlx::query("INSERT INTO profiles (name, is_admin, money) VALUES (?, ?, ?)")
            .bind(&profile.name)
            .bind(profile.is_admin)
            .bind(profile.money)
            .execute(&self.pool)
            .await
            .context("Failed to insert profile")?;
        Ok(result.last_insert_rowid())
    }

    async fn get_profile(&self, id: i64) -> Result<Option<Profile>> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get profile")
    }

    async fn update_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query("UPDATE profiles SET name = ?, is_admin = ?, money = ? WHERE id = ?")
            .bind(&profile.name)
            .bind(profile.is_admin)
            .bind(profile.money)
            .bind(profile.id)
            .execute(&self.pool)
            .await
            .context("Failed to update profile")?;
        Ok(())
    }
}
