use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::errors::{SyncError, parse_wallet_address};
use crate::models::reputation::{ReputationSummary, ReviewNote, ReviewRequest, TransactionView};
use crate::state::AppState;
use crate::wallet::WalletProvider;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{address}", get(get_summary))
        .route("/{address}/notes", get(get_notes).post(add_note))
        .route("/{address}/reviewed/{reviewer}", get(has_reviewed))
}

async fn get_summary(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ReputationSummary>, HttpError> {
    let target = parse_wallet_address(&address)?;
    let key = format!("{target:#x}");
    if let Some(cached) = state.cache.reputation.get(&key).await {
        return Ok(Json((*cached).clone()));
    }

    let summary = state.reputation.summary(target).await?;
    state
        .cache
        .reputation
        .insert(key, Arc::new(summary.clone()))
        .await;
    Ok(Json(summary))
}

async fn get_notes(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<ReviewNote>>, HttpError> {
    let target = parse_wallet_address(&address)?;
    Ok(Json(state.reputation.all_notes(target).await?))
}

async fn add_note(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<TransactionView>, HttpError> {
    let target = parse_wallet_address(&address)?;
    let signer = state
        .session
        .account()
        .and_then(|account| state.session.signer(account))
        .ok_or_else(SyncError::wallet_not_connected)?;

    let receipt = state
        .reputation
        .add_note(signer.as_ref(), target, &payload.message, payload.score)
        .await?;
    state.cache.reputation.invalidate(&format!("{target:#x}")).await;
    Ok(Json(TransactionView::from(&receipt)))
}

#[derive(Debug, Serialize)]
struct ReviewedResponse {
    reviewed: bool,
}

async fn has_reviewed(
    State(state): State<AppState>,
    Path((address, reviewer)): Path<(String, String)>,
) -> Result<Json<ReviewedResponse>, HttpError> {
    let target = parse_wallet_address(&address)?;
    let reviewer = parse_wallet_address(&reviewer)?;
    let reviewed = state.reputation.has_reviewed(target, reviewer).await?;
    Ok(Json(ReviewedResponse { reviewed }))
}
