//! Bookmark contract ABI and the wire-to-domain decode boundary.

pub mod reader;
pub mod writer;

use alloy_sol_types::sol;

use crate::models::bookmark::BookmarkedProfile;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct Bookmark {
        string platform;
        string username;
        string avatar;
        string profileUrl;
        uint256 timestamp;
        bool exists;
    }

    interface IBookmarkRegistry {
        function addBookmark(string _platform, string _username, string _avatar, string _profileUrl) external;
        function removeBookmark(string _platform) external;
        function clearAllBookmarks() external;
        function getAllBookmarks(address _user) external view returns (Bookmark[] memory);
        function isBookmarked(address _user, string _platform) external view returns (bool);
        function getBookmarkCount(address _user) external view returns (uint256);
    }

    interface IReputationRegistry {
        function addNote(address _target, string _message, uint8 _score) external;
        function getAverageScore(address _target) external view returns (uint256);
        function reviewCount(address target) external view returns (uint256);
        function notes(address target, uint256 index) external view returns (address reviewer, string message, uint8 score, uint256 timestamp);
        function hasReviewed(address target, address reviewer) external view returns (bool);
    }
}

/// On-chain bookmark record. Logically removed entries stay on-chain with
/// `exists == false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractBookmark {
    pub platform: String,
    pub username: String,
    pub avatar: String,
    pub profile_url: String,
    /// Unix seconds.
    pub timestamp: u64,
    pub exists: bool,
}

impl From<Bookmark> for ContractBookmark {
    fn from(record: Bookmark) -> Self {
        Self {
            platform: record.platform,
            username: record.username,
            avatar: record.avatar,
            profile_url: record.profileUrl,
            timestamp: record.timestamp.saturating_to::<u64>(),
            exists: record.exists,
        }
    }
}

impl ContractBookmark {
    pub fn into_profile(self) -> Option<BookmarkedProfile> {
        if !self.exists {
            return None;
        }
        let seconds = i64::try_from(self.timestamp).unwrap_or(i64::MAX);
        Some(BookmarkedProfile {
            platform: self.platform,
            username: self.username,
            avatar: (!self.avatar.is_empty()).then_some(self.avatar),
            url: self.profile_url,
            bookmarked_at: seconds.saturating_mul(1000),
        })
    }
}

/// Keep live records, in contract order.
pub fn live_profiles(records: Vec<ContractBookmark>) -> Vec<BookmarkedProfile> {
    records
        .into_iter()
        .filter_map(ContractBookmark::into_profile)
        .collect()
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;

    fn record(platform: &str, exists: bool) -> Bookmark {
        Bookmark {
            platform: platform.to_string(),
            username: "alice".to_string(),
            avatar: String::new(),
            profileUrl: format!("https://{platform}.example/alice"),
            timestamp: U256::from(1_000u64),
            exists,
        }
    }

    #[test]
    fn decode_scales_timestamp_and_drops_empty_avatar() {
        let profile = ContractBookmark::from(record("farcaster", true))
            .into_profile()
            .expect("live record");
        assert_eq!(profile.bookmarked_at, 1_000_000);
        assert_eq!(profile.avatar, None);
        assert_eq!(profile.url, "https://farcaster.example/alice");
    }

    #[test]
    fn removed_records_are_filtered() {
        let records = vec![
            ContractBookmark::from(record("farcaster", true)),
            ContractBookmark::from(record("twitter", false)),
            ContractBookmark::from(record("zora", true)),
        ];
        let platforms: Vec<_> = live_profiles(records)
            .into_iter()
            .map(|profile| profile.platform)
            .collect();
        assert_eq!(platforms, vec!["farcaster", "zora"]);
    }

    #[test]
    fn oversized_timestamp_saturates() {
        let mut raw = record("lens", true);
        raw.timestamp = U256::MAX;
        let profile = ContractBookmark::from(raw).into_profile().expect("live");
        assert_eq!(profile.bookmarked_at, i64::MAX);
    }
}
