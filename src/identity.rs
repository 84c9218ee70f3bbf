//! Cross-platform identity lookup against the Memory Protocol REST API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use moka::future::Cache;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::IdentityApiConfig;
use crate::models::identity::{GroupedIdentity, IdentityProfile};

pub const MAX_QUERY_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("Identity not found")]
    NotFound,
    #[error("Invalid API token")]
    Unauthorized,
    #[error("Rate limit exceeded. Please try again later")]
    RateLimited,
    #[error("No identity found across any platform")]
    NoMatches,
    #[error("Failed to fetch identity: {0}")]
    Request(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Wallet,
    FarcasterFid,
    FarcasterUsername,
    Twitter,
    Zora,
}

impl LookupKind {
    fn path(self) -> &'static [&'static str] {
        match self {
            Self::Wallet => &["wallet"],
            Self::FarcasterFid => &["farcaster", "fid"],
            Self::FarcasterUsername => &["farcaster", "username"],
            Self::Twitter => &["twitter"],
            Self::Zora => &["zora"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub kind: LookupKind,
    pub value: String,
}

/// Lookups for a free-form query: the wallet endpoint for `0x` input, the fid
/// endpoint for all-digit input, and the username endpoints always.
pub fn plan_search(query: &str) -> Vec<Lookup> {
    let mut plan = Vec::with_capacity(5);
    if query.starts_with("0x") {
        plan.push(Lookup {
            kind: LookupKind::Wallet,
            value: query.to_string(),
        });
    }
    if !query.is_empty() && query.bytes().all(|byte| byte.is_ascii_digit()) {
        plan.push(Lookup {
            kind: LookupKind::FarcasterFid,
            value: query.to_string(),
        });
    }

    let username = query.replacen('@', "", 1);
    for kind in [
        LookupKind::FarcasterUsername,
        LookupKind::Twitter,
        LookupKind::Zora,
    ] {
        plan.push(Lookup {
            kind,
            value: username.clone(),
        });
    }
    plan
}

/// First profile is primary; each known platform slot holds the last profile
/// seen for it.
pub fn group_profiles(profiles: Vec<IdentityProfile>) -> GroupedIdentity {
    let mut grouped = GroupedIdentity {
        primary: profiles.first().cloned(),
        ..GroupedIdentity::default()
    };

    for profile in &profiles {
        let slot = match profile.platform.to_ascii_lowercase().as_str() {
            "farcaster" => &mut grouped.farcaster,
            "ens" => &mut grouped.ens,
            "github" => &mut grouped.github,
            "twitter" => &mut grouped.twitter,
            "zora" => &mut grouped.zora,
            "lens" => &mut grouped.lens,
            "telegram" => &mut grouped.telegram,
            "ethereum" => &mut grouped.ethereum,
            "solana" => &mut grouped.solana,
            "basenames" => &mut grouped.basenames,
            "email" => &mut grouped.email,
            "website" => &mut grouped.website,
            _ => continue,
        };
        *slot = Some(profile.clone());
    }

    grouped.all_profiles = profiles;
    grouped
}

#[derive(Clone)]
pub struct IdentityApiClient {
    http: Client,
    base_url: Url,
    api_token: String,
}

impl IdentityApiClient {
    pub fn new(config: &IdentityApiConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid identity API URL {}", config.base_url))?;
        anyhow::ensure!(
            !base_url.cannot_be_a_base(),
            "Identity API URL {} cannot be used as a base",
            config.base_url
        );
        if config.api_token.is_empty() {
            warn!("Identity API token is empty; lookups will likely be rejected");
        }
        let http = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build identity API client")?;
        Ok(Self {
            http,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    pub async fn fetch(&self, lookup: &Lookup) -> Result<Vec<IdentityProfile>, LookupError> {
        let url = self.url_for(lookup)?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(LookupError::NotFound),
            StatusCode::UNAUTHORIZED => Err(LookupError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(LookupError::RateLimited),
            status => Err(LookupError::Request(format!("unexpected status {status}"))),
        }
    }

    fn url_for(&self, lookup: &Lookup) -> Result<Url, LookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| LookupError::Request("identity API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(lookup.kind.path())
            .push(&lookup.value);
        Ok(url)
    }
}

/// Fans a query out to every planned lookup and groups what comes back.
#[derive(Clone)]
pub struct IdentitySearch {
    client: IdentityApiClient,
    cache: Cache<String, Arc<GroupedIdentity>>,
}

impl IdentitySearch {
    pub fn new(client: IdentityApiClient, cache: Cache<String, Arc<GroupedIdentity>>) -> Self {
        Self { client, cache }
    }

    pub async fn search(&self, query: &str) -> Result<Arc<GroupedIdentity>, LookupError> {
        let query = query.trim();
        if query.is_empty() || query.chars().count() > MAX_QUERY_LEN {
            return Err(LookupError::Request(format!(
                "Query must be between 1 and {MAX_QUERY_LEN} characters"
            )));
        }

        let key = query.to_ascii_lowercase();
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let plan = plan_search(query);
        let results = join_all(plan.iter().map(|lookup| self.client.fetch(lookup))).await;

        let mut profiles = Vec::new();
        for (lookup, result) in plan.iter().zip(results) {
            match result {
                Ok(found) => profiles.extend(found),
                Err(LookupError::NotFound) => {}
                Err(err) => {
                    debug!(kind = ?lookup.kind, error = %err, "Identity lookup failed");
                }
            }
        }
        if profiles.is_empty() {
            return Err(LookupError::NoMatches);
        }

        let grouped = Arc::new(group_profiles(profiles));
        self.cache.insert(key, Arc::clone(&grouped)).await;
        Ok(grouped)
    }
}
