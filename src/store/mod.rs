//! Durable bookmark cache, partitioned by wallet.

use std::fmt;

use alloy_primitives::Address;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel};
use tracing::{debug, warn};

use crate::entities::bookmark_cache;
use crate::entities::prelude::BookmarkCache;
use crate::models::bookmark::BookmarkedProfile;

pub const CACHE_KEY_PREFIX: &str = "web3_identity_bookmarks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Shown before any wallet connects, and after disconnect.
    Default,
    Wallet(Address),
}

impl CacheKey {
    pub fn storage_key(&self) -> String {
        match self {
            Self::Default => CACHE_KEY_PREFIX.to_string(),
            Self::Wallet(address) => format!("{CACHE_KEY_PREFIX}:{address:#x}"),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Persistence for the last known bookmark list of each partition.
///
/// Neither call fails: an unreadable entry is an empty list and a failed
/// write is logged and dropped.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, key: &CacheKey) -> Vec<BookmarkedProfile>;

    async fn save(&self, key: &CacheKey, bookmarks: &[BookmarkedProfile]);
}

#[derive(Clone)]
pub struct DatabaseCacheStore {
    database: DatabaseConnection,
}

impl DatabaseCacheStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    async fn upsert(&self, key: &str, payload: String) -> Result<(), sea_orm::DbErr> {
        let now = Utc::now().fixed_offset();
        match BookmarkCache::find_by_id(key.to_string())
            .one(&self.database)
            .await?
        {
            Some(model) => {
                let mut row = model.into_active_model();
                row.payload = Set(payload);
                row.updated_at = Set(now);
                row.update(&self.database).await?;
            }
            None => {
                bookmark_cache::ActiveModel {
                    cache_key: Set(key.to_string()),
                    payload: Set(payload),
                    updated_at: Set(now),
                }
                .insert(&self.database)
                .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for DatabaseCacheStore {
    async fn load(&self, key: &CacheKey) -> Vec<BookmarkedProfile> {
        let row = match BookmarkCache::find_by_id(key.storage_key())
            .one(&self.database)
            .await
        {
            Ok(Some(row)) => row,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to read bookmark cache");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<BookmarkedProfile>>(&row.payload) {
            Ok(bookmarks) => {
                debug!(key = %key, count = bookmarks.len(), "Loaded cached bookmarks");
                bookmarks
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Discarding unreadable bookmark cache entry");
                Vec::new()
            }
        }
    }

    async fn save(&self, key: &CacheKey, bookmarks: &[BookmarkedProfile]) {
        let payload = match serde_json::to_string(bookmarks) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to encode bookmark cache");
                return;
            }
        };
        if let Err(err) = self.upsert(&key.storage_key(), payload).await {
            warn!(key = %key, error = %err, "Failed to write bookmark cache");
        }
    }
}
