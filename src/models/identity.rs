use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialInfo {
    pub verified: Option<bool>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSource {
    pub id: String,
    pub platform: String,
    pub verified: bool,
}

/// Profile record returned by the identity lookup API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub id: String,
    pub platform: String,
    pub url: String,
    pub avatar: Option<String>,
    pub social: Option<SocialInfo>,
    pub username: Option<String>,
    #[serde(default)]
    pub sources: Vec<ProfileSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedIdentity {
    pub primary: Option<IdentityProfile>,
    pub farcaster: Option<IdentityProfile>,
    pub ens: Option<IdentityProfile>,
    pub github: Option<IdentityProfile>,
    pub twitter: Option<IdentityProfile>,
    pub zora: Option<IdentityProfile>,
    pub lens: Option<IdentityProfile>,
    pub telegram: Option<IdentityProfile>,
    pub ethereum: Option<IdentityProfile>,
    pub solana: Option<IdentityProfile>,
    pub basenames: Option<IdentityProfile>,
    pub email: Option<IdentityProfile>,
    pub website: Option<IdentityProfile>,
    pub all_profiles: Vec<IdentityProfile>,
}
