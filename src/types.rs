use serde::{Deserialize, Serialize};

/// Raw query of `app.bsky.feed.getFeedSkeleton`. Everything is optional here so
/// that missing or malformed values are reported by the handler, not the extractor.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FeedSkeletonParams {
    pub feed: Option<String>,
    pub limit: Option<String>,
    pub cursor: Option<String>,
}

impl FeedSkeletonParams {
    /// Keeps the first value of each known key; unknown keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "feed" => &mut params.feed,
                "limit" => &mut params.limit,
                "cursor" => &mut params.cursor,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        params
    }
}

#[derive(Debug, Serialize)]
pub struct FeedSkeletonResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub feed: Vec<SkeletonFeedPost>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonFeedPost {
    pub post: String,
}

#[derive(Debug, Serialize)]
pub struct DescribeFeedGeneratorResponse {
    pub did: String,
    pub feeds: Vec<FeedDescription>,
}

/// One feed URI a feed is prepared to answer for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescription {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    pub service: Vec<ServiceEndpoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceEndpoint {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

// Service auth JWT claims; `exp` is read by jwt-compact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub iss: String, // issuer (requester DID)
    pub aud: String, // audience (feed generator service DID)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
