use super::types::Profile;
use super::ServiceError;
use crate::db::Database;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Service for user profiles: admin flag and balance. Plain field CRUD.
pub struct ProfileService {
    db: Arc<dyn Database>,
}

impl ProfileService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn create(&self, name: String) -> Result<Profile> {
        let mut profile = Profile {
            id: 0,
            name,
            is_admin: false,
            money: 0.0,
        };
        profile.id = self
            .db
            .insert_profile(&profile)
            .await
            .context("Failed to insert profile")?;
        Ok(profile)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Profile>> {
        self.db
            .get_profile(id)
            .await
            .context("Failed to get profile")
    }

    /// Set the account balance to the given amount.
    pub async fn update_money(&self, id: i64, money: f64) -> Result<Profile, ServiceError> {
        let mut profile = self
            .db
            .get_profile(id)
            .await
            .context("Failed to get profile")?
            .ok_or_else(|| ServiceError::NotFound(format!("Profile '{}' not found", id)))?;

        profile.money = money;
        self.db
            .update_profile(&profile)
            .await
            .context("Failed to update profile")?;
        Ok(profile)
    }

    pub async fn admin_status(&self, id: i64) -> Result<bool, ServiceError> {
        let profile = self
            .db
            .get_profile(id)
            .await
            .context("Failed to get profile")?
            .ok_or_else(|| ServiceError::NotFound(format!("Profile '{}' not found", id)))?;
        Ok(profile.is_admin)
    }
}
