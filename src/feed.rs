use async_trait::async_trait;

use crate::{
    error::FeedError,
    types::{FeedDescription, SkeletonFeedPost},
};

/// One page of a feed skeleton. `cursor` is `None` once the feed is exhausted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FeedPage {
    pub posts: Vec<SkeletonFeedPost>,
    pub cursor: Option<String>,
}

/// A source of feed skeletons served by the router.
///
/// Implementations are shared across every in-flight request, so `get_page`
/// must be safe to call concurrently. Cursors are opaque outside the feed
/// that issued them.
#[async_trait]
pub trait Feed: Send + Sync {
    /// Returns at most `limit` posts for `feed_name` (the alias the request resolved
    /// through). `requester_did` is empty for anonymous requests and `cursor` is
    /// empty for the first page. A `limit` of zero or less yields an empty page.
    async fn get_page(
        &self,
        feed_name: &str,
        requester_did: &str,
        limit: i64,
        cursor: &str,
    ) -> Result<FeedPage, FeedError>;

    /// Lists the feed URIs this feed answers for.
    async fn describe(&self) -> Result<Vec<FeedDescription>, FeedError>;
}
