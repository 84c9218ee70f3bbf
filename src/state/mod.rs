use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use sea_orm::DatabaseConnection;

use crate::config::CacheConfig;
use crate::identity::IdentitySearch;
use crate::models::identity::GroupedIdentity;
use crate::models::reputation::ReputationSummary;
use crate::reputation::ReputationClient;
use crate::sync::BookmarkSync;
use crate::wallet::WalletSession;

#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub sync: Arc<BookmarkSync>,
    pub session: Arc<WalletSession>,
    pub identity: IdentitySearch,
    pub reputation: Arc<ReputationClient>,
    pub cache: Arc<ApiCache>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        database: DatabaseConnection,
        sync: Arc<BookmarkSync>,
        session: Arc<WalletSession>,
        identity: IdentitySearch,
        reputation: Arc<ReputationClient>,
        cache: Arc<ApiCache>,
    ) -> Self {
        Self {
            database,
            sync,
            session,
            identity,
            reputation,
            cache,
            start_time: Instant::now(),
        }
    }
}

pub struct ApiCache {
    pub identity_search: Cache<String, Arc<GroupedIdentity>>,
    pub reputation: Cache<String, Arc<ReputationSummary>>,
}

impl ApiCache {
    pub fn new(config: &CacheConfig) -> Self {
        let identity_search = Cache::builder()
            .max_capacity(config.identity_max_capacity)
            .time_to_live(Duration::from_secs(config.identity_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.identity_ttl_seconds / 2 + 1))
            .build();

        let reputation = Cache::builder()
            .max_capacity(config.reputation_max_capacity)
            .time_to_live(Duration::from_secs(config.reputation_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.reputation_ttl_seconds / 2 + 1))
            .build();

        Self {
            identity_search,
            reputation,
        }
    }
}
