use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::errors::parse_wallet_address;
use crate::models::bookmark::{BookmarkedProfile, ProfileInput, SyncStateView};
use crate::models::reputation::TransactionView;
use crate::rpc::TransactionReceipt;
use crate::state::AppState;
use crate::sync::ToggleOutcome;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_state).post(add_bookmark).delete(clear_all))
        .route("/refresh", post(refresh))
        .route("/{platform}", get(get_bookmark).delete(remove_bookmark))
        .route("/{platform}/toggle", post(toggle_bookmark))
        .route("/address/{address}", get(bookmarks_for_address))
        .route("/address/{address}/count", get(count_for_address))
}

#[derive(Debug, Deserialize)]
struct AddBookmarkRequest {
    platform: String,
    #[serde(default)]
    profile: ProfileInput,
}

#[derive(Debug, Serialize)]
struct BookmarkLookup {
    bookmarked: bool,
    bookmark: Option<BookmarkedProfile>,
}

#[derive(Debug, Serialize)]
struct CountResponse {
    address: String,
    count: u64,
}

#[derive(Debug, Serialize)]
struct MutationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'static str>,
    transaction: TransactionView,
    state: SyncStateView,
}

fn state_view(state: &AppState) -> SyncStateView {
    SyncStateView::new(&state.sync.snapshot(), state.sync.is_initialized())
}

fn mutation(
    state: &AppState,
    action: Option<&'static str>,
    receipt: &TransactionReceipt,
) -> Json<MutationResponse> {
    Json(MutationResponse {
        action,
        transaction: TransactionView::from(receipt),
        state: state_view(state),
    })
}

async fn get_state(State(state): State<AppState>) -> Json<SyncStateView> {
    Json(state_view(&state))
}

/// Answers from local state; may lag the chain until the next refresh.
async fn get_bookmark(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> Json<BookmarkLookup> {
    Json(BookmarkLookup {
        bookmarked: state.sync.is_bookmarked_local(&platform),
        bookmark: state.sync.get_bookmark(&platform),
    })
}

async fn refresh(State(state): State<AppState>) -> Json<SyncStateView> {
    state.sync.refresh_bookmarks().await;
    Json(state_view(&state))
}

async fn add_bookmark(
    State(state): State<AppState>,
    Json(payload): Json<AddBookmarkRequest>,
) -> Result<Json<MutationResponse>, HttpError> {
    let receipt = state
        .sync
        .add_bookmark(&payload.platform, &payload.profile)
        .await?;
    Ok(mutation(&state, Some("added"), &receipt))
}

async fn remove_bookmark(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> Result<Json<MutationResponse>, HttpError> {
    let receipt = state.sync.remove_bookmark(&platform).await?;
    Ok(mutation(&state, Some("removed"), &receipt))
}

async fn toggle_bookmark(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Json(profile): Json<ProfileInput>,
) -> Result<Json<MutationResponse>, HttpError> {
    let response = match state.sync.toggle_bookmark(&platform, &profile).await? {
        ToggleOutcome::Added(receipt) => mutation(&state, Some("added"), &receipt),
        ToggleOutcome::Removed(receipt) => mutation(&state, Some("removed"), &receipt),
    };
    Ok(response)
}

async fn clear_all(State(state): State<AppState>) -> Result<Json<MutationResponse>, HttpError> {
    let receipt = state.sync.clear_all_bookmarks().await?;
    Ok(mutation(&state, None, &receipt))
}

async fn bookmarks_for_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<BookmarkedProfile>>, HttpError> {
    let address = parse_wallet_address(&address)?;
    Ok(Json(state.sync.bookmarks_for(address).await?))
}

async fn count_for_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<CountResponse>, HttpError> {
    let address = parse_wallet_address(&address)?;
    let count = state.sync.count_for(address).await?;
    Ok(Json(CountResponse {
        address: format!("{address:#x}"),
        count,
    }))
}
