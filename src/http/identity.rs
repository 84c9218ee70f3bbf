use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::identity::MAX_QUERY_LEN;
use crate::models::identity::GroupedIdentity;
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new().route("/search", get(search))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search(
    Query(params): Query<SearchParams>,
    State(state): State<AppState>,
) -> Result<Json<GroupedIdentity>, HttpError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(HttpError::bad_request("Query parameter 'q' must not be empty"));
    }
    if query.len() > MAX_QUERY_LEN {
        return Err(HttpError::bad_request(format!(
            "Query exceeds {MAX_QUERY_LEN} characters"
        )));
    }
    let grouped = state.identity.search(query).await?;
    Ok(Json((*grouped).clone()))
}
