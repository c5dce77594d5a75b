use async_trait::async_trait;

use crate::{
    error::FeedError,
    feed::{Feed, FeedPage},
    router::feed_uri,
    types::{FeedDescription, SkeletonFeedPost},
};

/// A feed over a fixed, pre-ordered list of post URIs.
///
/// The cursor is the decimal offset of the next post to emit.
pub struct StaticFeed {
    feed_actor_did: String,
    aliases: Vec<String>,
    post_uris: Vec<String>,
}

impl StaticFeed {
    /// Builds the feed and returns it together with the aliases it should be
    /// registered under, `feed_name` first.
    pub fn new(
        feed_actor_did: &str,
        feed_name: &str,
        extra_aliases: &[&str],
        post_uris: Vec<String>,
    ) -> (Self, Vec<String>) {
        let mut aliases = vec![feed_name.to_string()];
        for alias in extra_aliases {
            if !aliases.iter().any(|a| a == alias) {
                aliases.push(alias.to_string());
            }
        }

        let feed = Self {
            feed_actor_did: feed_actor_did.to_string(),
            aliases: aliases.clone(),
            post_uris,
        };
        (feed, aliases)
    }

    fn parse_cursor(cursor: &str) -> Result<usize, FeedError> {
        if cursor.is_empty() {
            return Ok(0);
        }
        cursor
            .parse::<usize>()
            .map_err(|e| FeedError::InvalidCursor(format!("cursor is not an integer: {}", e)))
    }
}

#[async_trait]
impl Feed for StaticFeed {
    async fn get_page(
        &self,
        _feed_name: &str,
        _requester_did: &str,
        limit: i64,
        cursor: &str,
    ) -> Result<FeedPage, FeedError> {
        let offset = Self::parse_cursor(cursor)?;
        let limit = usize::try_from(limit).unwrap_or(0);

        let posts: Vec<SkeletonFeedPost> = self
            .post_uris
            .iter()
            .skip(offset)
            .take(limit)
            .map(|uri| SkeletonFeedPost { post: uri.clone() })
            .collect();

        let next = offset.saturating_add(posts.len());
        let cursor = (next < self.post_uris.len()).then(|| next.to_string());

        Ok(FeedPage { posts, cursor })
    }

    async fn describe(&self) -> Result<Vec<FeedDescription>, FeedError> {
        Ok(self
            .aliases
            .iter()
            .map(|alias| FeedDescription {
                uri: feed_uri(&self.feed_actor_did, alias),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("at://did:example:bob/app.bsky.feed.post/p{}", i))
            .collect()
    }

    fn feed(n: usize) -> StaticFeed {
        StaticFeed::new("did:example:alice", "static", &[], posts(n)).0
    }

    #[tokio::test]
    async fn test_first_pages_follow_offsets() {
        let feed = feed(3);

        let page = feed.get_page("static", "", 2, "").await.unwrap();
        assert_eq!(page.posts.len(), 2);
        assert_eq!(page.posts[0].post, posts(3)[0]);
        assert_eq!(page.posts[1].post, posts(3)[1]);
        assert_eq!(page.cursor.as_deref(), Some("2"));

        let page = feed.get_page("static", "", 2, "2").await.unwrap();
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].post, posts(3)[2]);
        assert_eq!(page.cursor, None);
    }

    #[tokio::test]
    async fn test_full_traversal_yields_backing_list() {
        for (n, limit) in [(0usize, 3i64), (1, 1), (7, 3), (9, 3), (10, 250)] {
            let feed = feed(n);
            let mut cursor = String::new();
            let mut seen = Vec::new();
            let mut calls = 0;

            loop {
                let page = feed.get_page("static", "did:example:carol", limit, &cursor).await.unwrap();
                calls += 1;
                seen.extend(page.posts.into_iter().map(|p| p.post));
                match page.cursor {
                    Some(next) => {
                        assert!(next.parse::<usize>().unwrap() > cursor.parse::<usize>().unwrap_or(0));
                        cursor = next;
                    }
                    None => break,
                }
            }

            assert_eq!(seen, posts(n));
            let expected_calls = n.div_ceil(limit as usize).max(1);
            assert_eq!(calls, expected_calls, "n={} limit={}", n, limit);
        }
    }

    #[tokio::test]
    async fn test_final_cursor_is_empty_page() {
        let feed = feed(4);
        let page = feed.get_page("static", "", 10, "4").await.unwrap();
        assert!(page.posts.is_empty());
        assert_eq!(page.cursor, None);

        let page = feed.get_page("static", "", 10, "40").await.unwrap();
        assert!(page.posts.is_empty());
        assert_eq!(page.cursor, None);
    }

    #[tokio::test]
    async fn test_repeated_cursor_is_idempotent() {
        let feed = feed(5);
        let first = feed.get_page("static", "", 2, "1").await.unwrap();
        let second = feed.get_page("static", "", 2, "1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_cursor_is_rejected() {
        let feed = feed(5);
        for cursor in ["abc", "-1", "1.5", " 2"] {
            let err = feed.get_page("static", "", 2, cursor).await.unwrap_err();
            assert!(matches!(err, FeedError::InvalidCursor(_)), "cursor {:?}", cursor);
        }
    }

    #[tokio::test]
    async fn test_non_positive_limit_returns_empty_page() {
        let feed = feed(3);
        for limit in [0, -5] {
            let page = feed.get_page("static", "", limit, "").await.unwrap();
            assert!(page.posts.is_empty());
        }
    }

    #[tokio::test]
    async fn test_describe_lists_every_alias() {
        let (feed, aliases) = StaticFeed::new(
            "did:example:alice",
            "static",
            &["static-alt", "static"],
            posts(1),
        );
        assert_eq!(aliases, vec!["static".to_string(), "static-alt".to_string()]);

        let descriptions = feed.describe().await.unwrap();
        assert_eq!(
            descriptions,
            vec![
                FeedDescription {
                    uri: "at://did:example:alice/app.bsky.feed.generator/static".to_string()
                },
                FeedDescription {
                    uri: "at://did:example:alice/app.bsky.feed.generator/static-alt".to_string()
                },
            ]
        );
    }
}
