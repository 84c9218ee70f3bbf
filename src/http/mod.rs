use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::errors::{ErrorKind, SyncError};
use crate::identity::LookupError;
use crate::state::AppState;

mod bookmarks;
mod identity;
mod reputation;
mod wallet;

pub fn router(state: AppState) -> Router {
    // Browser UI talks to this service directly
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .nest("/wallet", wallet::router().with_state(state.clone()))
        .nest("/bookmarks", bookmarks::router().with_state(state.clone()))
        .nest("/identity", identity::router().with_state(state.clone()))
        .nest("/reputation", reputation::router().with_state(state.clone()))
        .layer(cors)
        .with_state(state)
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let response = HealthResponse {
        status: "live",
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    state
        .database
        .ping()
        .await
        .map_err(|err| HttpError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string()))?;

    let response = ReadyResponse {
        status: "ready",
        sync_phase: state.sync.phase_label(),
        chain_endpoints: state.sync.chain_transport().endpoint_count(),
        rpc_timeout_ms: u64::try_from(state.sync.chain_transport().timeout().as_millis())
            .unwrap_or(u64::MAX),
        wallet_provider: state.session.has_provider(),
        cache_entries: CacheSummary {
            identity_search: state.cache.identity_search.entry_count(),
            reputation: state.cache.reputation.entry_count(),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    sync_phase: &'static str,
    chain_endpoints: usize,
    rpc_timeout_ms: u64,
    wallet_provider: bool,
    cache_entries: CacheSummary,
}

#[derive(Debug, Serialize)]
struct CacheSummary {
    identity_search: u64,
    reputation: u64,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
    kind: Option<&'static str>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        Self {
            status,
            message,
            kind: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into())
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NetworkTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::NetworkUnreachable => StatusCode::BAD_GATEWAY,
        ErrorKind::ContractError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::TransactionRejected => StatusCode::FORBIDDEN,
        ErrorKind::WalletNotConnected => StatusCode::UNAUTHORIZED,
        ErrorKind::WrongNetwork | ErrorKind::AlreadyBookmarked => StatusCode::CONFLICT,
        ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<SyncError> for HttpError {
    fn from(err: SyncError) -> Self {
        Self {
            status: status_for(err.kind()),
            message: err.user_message(),
            kind: Some(err.kind().code()),
        }
    }
}

impl From<LookupError> for HttpError {
    fn from(err: LookupError) -> Self {
        let status = match err {
            LookupError::NotFound | LookupError::NoMatches => StatusCode::NOT_FOUND,
            LookupError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            LookupError::Unauthorized | LookupError::Request(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        info!(status = %self.status, kind = ?self.kind, "HTTP error: {}", self.message);
        let body = Json(ErrorBody {
            error: self.message,
            kind: self.kind,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}
