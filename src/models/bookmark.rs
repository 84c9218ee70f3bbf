use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::errors::SyncError;

/// One saved reference to an external identity profile.
///
/// `platform` is the natural key: a wallet holds at most one bookmark per
/// platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkedProfile {
    pub platform: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub url: String,
    pub bookmarked_at: i64,
}

/// Profile metadata supplied by the caller when bookmarking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl ProfileInput {
    pub fn display_username(&self) -> &str {
        [self.username.as_deref(), self.handle.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .unwrap_or("Unknown")
    }

    pub fn avatar_or_empty(&self) -> &str {
        self.avatar.as_deref().unwrap_or_default()
    }

    pub fn url_or_empty(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }
}

/// Snapshot of the bookmark sync controller, as observed by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub current_address: Option<Address>,
    pub bookmarks: Vec<BookmarkedProfile>,
    pub loading: bool,
    pub last_error: Option<SyncError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStateView {
    pub address: Option<String>,
    pub bookmarks: Vec<BookmarkedProfile>,
    pub count: usize,
    pub loading: bool,
    pub initialized: bool,
    pub error: Option<ErrorView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorView {
    pub kind: &'static str,
    pub message: String,
}

impl From<&SyncError> for ErrorView {
    fn from(err: &SyncError) -> Self {
        Self {
            kind: err.kind().code(),
            message: err.user_message(),
        }
    }
}

impl SyncStateView {
    pub fn new(state: &SyncState, initialized: bool) -> Self {
        Self {
            address: state.current_address.map(|address| format!("{address:#x}")),
            bookmarks: state.bookmarks.clone(),
            count: state.bookmarks.len(),
            loading: state.loading,
            initialized,
            error: state.last_error.as_ref().map(ErrorView::from),
        }
    }
}
