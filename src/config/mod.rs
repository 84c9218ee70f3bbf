use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{Context, Result, ensure};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::chain::reader::RetryPolicy;
use crate::chain::writer::ConfirmationPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    pub identity_api: IdentityApiConfig,
    pub reputation: ReputationConfig,
    pub cache: CacheConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path = std::env::var("IDENTITY_FINDER_CONFIG")
            .unwrap_or_else(|_| "config/finder.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("IDENTITY_FINDER_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/finder.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("FINDER")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.database.url.is_empty(),
            "Database URL must be specified"
        );
        ensure!(
            self.server.port > 0,
            "Server port must be greater than zero"
        );
        self.chain.ensure_bounds()?;
        self.reputation.ensure_bounds()?;
        self.identity_api.ensure_bounds()?;
        self.cache.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Bookmark contract deployment and RPC behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Tried in this exact order on every request.
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
    pub bookmark_contract: String,
    pub request_timeout_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub receipt_poll_interval_ms: Option<u64>,
    pub receipt_timeout_ms: Option<u64>,
}

impl ChainConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(3_000);
        assert!(millis >= 100, "RPC timeout must be at least 100ms");
        assert!(millis <= 60_000, "RPC timeout cannot exceed 60 seconds");
        Duration::from_millis(millis)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts.unwrap_or(3),
            Duration::from_millis(self.retry_base_delay_ms.unwrap_or(1_000)),
        )
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval: Duration::from_millis(self.receipt_poll_interval_ms.unwrap_or(2_000)),
            timeout: Duration::from_millis(self.receipt_timeout_ms.unwrap_or(120_000)),
        }
    }

    pub fn contract_address(&self) -> Result<Address> {
        parse_contract(&self.bookmark_contract, "bookmark contract")
    }

    fn ensure_bounds(&self) -> Result<()> {
        ensure_endpoints(&self.rpc_urls, "chain")?;
        ensure!(self.chain_id > 0, "Chain id must be non-zero");
        let timeout = self.request_timeout_ms.unwrap_or(3_000);
        ensure!(
            (100..=60_000).contains(&timeout),
            "RPC timeout must be between 100ms and 60 seconds"
        );
        let attempts = self.max_attempts.unwrap_or(3);
        ensure!(
            (1..=10).contains(&attempts),
            "Retry attempts must be between 1 and 10"
        );
        ensure!(
            self.retry_base_delay_ms.unwrap_or(1_000) <= 30_000,
            "Retry base delay cannot exceed 30 seconds"
        );
        ensure!(
            self.receipt_poll_interval_ms.unwrap_or(2_000) >= 100,
            "Receipt poll interval must be at least 100ms"
        );
        self.contract_address()?;
        Ok(())
    }
}

/// EIP-1193 provider reachable over JSON-RPC that signs on the user's behalf.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    pub provider_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

impl WalletConfig {
    pub fn request_timeout(&self) -> Duration {
        // Signature prompts wait on a human.
        Duration::from_millis(self.request_timeout_ms.unwrap_or(60_000).clamp(100, 300_000))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_token: String,
    pub request_timeout_ms: Option<u64>,
}

impl IdentityApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.unwrap_or(10_000))
    }

    fn ensure_bounds(&self) -> Result<()> {
        ensure!(
            self.base_url.starts_with("http://") || self.base_url.starts_with("https://"),
            "Identity API base URL must be http(s)"
        );
        ensure!(
            self.request_timeout_ms.unwrap_or(10_000) <= 60_000,
            "Identity API timeout cannot exceed 60 seconds"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReputationConfig {
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
    pub contract: String,
    pub request_timeout_ms: Option<u64>,
}

impl ReputationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.unwrap_or(5_000))
    }

    pub fn contract_address(&self) -> Result<Address> {
        parse_contract(&self.contract, "reputation contract")
    }

    fn ensure_bounds(&self) -> Result<()> {
        ensure_endpoints(&self.rpc_urls, "reputation")?;
        ensure!(self.chain_id > 0, "Reputation chain id must be non-zero");
        ensure!(
            (100..=60_000).contains(&self.request_timeout_ms.unwrap_or(5_000)),
            "Reputation RPC timeout must be between 100ms and 60 seconds"
        );
        self.contract_address()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub identity_max_capacity: u64,
    pub identity_ttl_seconds: u64,
    pub reputation_max_capacity: u64,
    pub reputation_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        ensure!(
            self.identity_max_capacity >= 10,
            "Identity cache capacity must be at least 10"
        );
        ensure!(
            self.identity_ttl_seconds <= 86_400,
            "Identity cache TTL cannot exceed one day"
        );
        ensure!(
            self.reputation_ttl_seconds <= 86_400,
            "Reputation cache TTL cannot exceed one day"
        );
        Ok(())
    }
}

fn ensure_endpoints(urls: &[String], label: &str) -> Result<()> {
    ensure!(!urls.is_empty(), "At least one {label} RPC URL is required");
    ensure!(urls.len() <= 16, "Too many {label} RPC URLs configured");
    for url in urls {
        ensure!(
            url.starts_with("http://") || url.starts_with("https://"),
            "{label} RPC URL {url} must be http(s)"
        );
    }
    Ok(())
}

fn parse_contract(value: &str, label: &str) -> Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .with_context(|| format!("Invalid {label} address {value}"))
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
