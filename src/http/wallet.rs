use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::errors::parse_wallet_address;
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_wallet))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
}

#[derive(Debug, Deserialize)]
struct ConnectRequest {
    address: String,
}

#[derive(Debug, Serialize)]
struct WalletView {
    address: Option<String>,
    initialized: bool,
    provider_configured: bool,
}

fn view(state: &AppState) -> WalletView {
    WalletView {
        address: state.session.account().map(|address| format!("{address:#x}")),
        initialized: state.sync.is_initialized(),
        provider_configured: state.session.has_provider(),
    }
}

async fn get_wallet(State(state): State<AppState>) -> Json<WalletView> {
    Json(view(&state))
}

/// Connects the session and waits for the bookmark sync to come up, so the
/// response already reflects the wallet's bookmarks.
async fn connect(
    State(state): State<AppState>,
    Json(payload): Json<ConnectRequest>,
) -> Result<Json<WalletView>, HttpError> {
    let address = parse_wallet_address(&payload.address)?;
    state.session.connect(address);
    state.sync.initialize_with_wallet(address).await?;
    Ok(Json(view(&state)))
}

async fn disconnect(State(state): State<AppState>) -> Json<WalletView> {
    state.session.disconnect();
    state.sync.cleanup().await;
    Json(view(&state))
}
