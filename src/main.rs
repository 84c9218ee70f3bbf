mod chain;
mod config;
mod entities;
mod errors;
mod http;
mod identity;
mod models;
mod reputation;
mod rpc;
mod state;
mod store;
mod sync;
#[cfg(test)]
mod testing;
mod wallet;

use std::sync::Arc;
use std::time::Duration;

use crate::chain::reader::ChainReader;
use crate::chain::writer::ChainWriter;
use crate::config::ApiConfig;
use crate::identity::{IdentityApiClient, IdentitySearch};
use crate::reputation::ReputationClient;
use crate::rpc::FallbackTransport;
use crate::state::{ApiCache, AppState};
use crate::store::DatabaseCacheStore;
use crate::sync::BookmarkSync;
use crate::wallet::WalletSession;
use anyhow::{Context, Result};
use axum::Router;
use migration::MigratorTrait;
use sea_orm::ConnectOptions;
use sea_orm::Database;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = ApiConfig::load().context("Failed to load configuration")?;
    let database = connect_database(&config).await?;
    run_migrations(&database).await?;

    let transport =
        FallbackTransport::from_urls(&config.chain.rpc_urls, config.chain.request_timeout())
            .context("Failed to initialize bookmark chain RPC clients")?;
    let reader = Arc::new(ChainReader::new(
        transport,
        config.chain.contract_address()?,
        config.chain.retry_policy(),
    ));
    let writer = Arc::new(ChainWriter::new(
        Arc::clone(&reader),
        config.chain.chain_id,
        config.chain.confirmation_policy(),
    ));

    let session = Arc::new(
        WalletSession::new(&config.wallet).context("Failed to initialize wallet provider")?,
    );
    let cache_store = Arc::new(DatabaseCacheStore::new(database.clone()));
    let sync = Arc::new(BookmarkSync::new(
        reader,
        writer,
        session.clone(),
        cache_store,
    ));
    sync.restore().await;

    let cache = Arc::new(ApiCache::new(&config.cache));
    let identity = IdentitySearch::new(
        IdentityApiClient::new(&config.identity_api)?,
        cache.identity_search.clone(),
    );

    let reputation_transport = FallbackTransport::from_urls(
        &config.reputation.rpc_urls,
        config.reputation.request_timeout(),
    )
    .context("Failed to initialize reputation RPC clients")?;
    let reputation = Arc::new(ReputationClient::new(
        reputation_transport,
        config.reputation.contract_address()?,
        config.reputation.chain_id,
        config.chain.confirmation_policy(),
    ));

    let app_state = AppState::new(
        database.clone(),
        Arc::clone(&sync),
        Arc::clone(&session),
        identity,
        reputation,
        Arc::clone(&cache),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let follower_handle = tokio::spawn(Arc::clone(&sync).follow_session(session.subscribe(), shutdown_rx));

    let listener = TcpListener::bind(config.server.address())
        .await
        .context("Failed to bind HTTP listener")?;
    let local_addr = listener
        .local_addr()
        .context("Failed to obtain listener address")?;
    info!("Identity finder listening on {local_addr}");

    let router: Router = http::router(app_state);
    let server = axum::serve(listener, router.into_make_service());
    server
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()))
        .await
        .context("HTTP server exited with error")?;

    shutdown_tx.send(true).ok();
    if let Err(join_err) = follower_handle.await {
        error!("Wallet session task join error: {join_err}");
    }

    Ok(())
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .compact()
        .init();
}

async fn connect_database(config: &ApiConfig) -> Result<sea_orm::DatabaseConnection> {
    let mut options = ConnectOptions::new(config.database.url.clone());
    options
        .max_connections(config.database.max_connections)
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug)
        .acquire_timeout(Duration::from_secs(10));

    Database::connect(options)
        .await
        .with_context(|| format!("Failed to open bookmark cache at {}", config.database.url))
}

async fn run_migrations(database: &sea_orm::DatabaseConnection) -> Result<()> {
    migration::Migrator::up(database, None)
        .await
        .context("Database migrations failed")
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    shutdown_tx.send(true).ok();
    info!("Shutdown signal dispatched");
}
