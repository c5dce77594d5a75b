use anyhow::{anyhow, Result};
use atrium_api::types::string::Did;
use std::{collections::HashMap, sync::Arc};
use tracing::{info, warn};

use crate::{
    error::RouterError,
    feed::Feed,
    types::{DidDocument, FeedDescription, ServiceEndpoint},
};

const FEED_GENERATOR_COLLECTION: &str = "app.bsky.feed.generator";

/// `at://<did>/app.bsky.feed.generator/`
pub fn feed_uri_prefix(did: &str) -> String {
    format!("at://{}/{}/", did, FEED_GENERATOR_COLLECTION)
}

pub fn feed_uri(did: &str, feed_name: &str) -> String {
    format!("{}{}", feed_uri_prefix(did), feed_name)
}

fn parse_did(kind: &str, did: &str) -> Result<Did> {
    Did::new(did.to_string())
        .map_err(|e| anyhow!("error parsing {}: {:?} is not a DID: {}", kind, did, e))
}

/// Maps feed URIs to the feeds that serve them.
///
/// Feeds are registered once at startup; after that the router is only read,
/// so it is shared between handlers behind an `Arc` without locking.
pub struct FeedRouter {
    feed_actor_did: String,
    service_did: String,
    did_document: DidDocument,
    acceptable_uri_prefixes: Vec<String>,
    feed_map: HashMap<String, Arc<dyn Feed>>,
    feeds: Vec<Arc<dyn Feed>>,
}

impl FeedRouter {
    pub fn new(
        feed_actor_did: &str,
        service_did: &str,
        acceptable_dids: &[String],
        service_endpoint: &str,
    ) -> Result<Self> {
        let feed_actor_did = parse_did("feed actor DID", feed_actor_did)?;
        let service_did = parse_did("service DID", service_did)?;

        let acceptable_uri_prefixes = acceptable_dids
            .iter()
            .map(|did| parse_did("acceptable DID", did).map(|did| feed_uri_prefix(did.as_str())))
            .collect::<Result<Vec<_>>>()?;

        let did_document = DidDocument {
            context: vec!["https://www.w3.org/ns/did/v1".to_string()],
            id: service_did.as_str().to_string(),
            service: vec![ServiceEndpoint {
                id: "#bsky_fg".to_string(),
                service_type: "BskyFeedGenerator".to_string(),
                service_endpoint: service_endpoint.to_string(),
            }],
        };

        Ok(Self {
            feed_actor_did: feed_actor_did.as_str().to_string(),
            service_did: service_did.as_str().to_string(),
            did_document,
            acceptable_uri_prefixes,
            feed_map: HashMap::new(),
            feeds: Vec::new(),
        })
    }

    /// Registers `feed` under each alias that is still free. The first feed
    /// registered under an alias keeps it.
    pub fn register_feed(&mut self, aliases: &[String], feed: Arc<dyn Feed>) {
        for alias in aliases {
            if self.feed_map.contains_key(alias) {
                warn!("Feed alias {} is already registered, keeping the earlier feed", alias);
                continue;
            }
            self.feed_map.insert(alias.clone(), Arc::clone(&feed));
        }

        info!("Registered feed with aliases {:?}", aliases);
        self.feeds.push(feed);
    }

    /// Resolves a feed URI to the alias it names and the feed bound to it.
    pub fn resolve_feed(&self, feed_uri: &str) -> Result<(String, Arc<dyn Feed>), RouterError> {
        let prefix = self
            .acceptable_uri_prefixes
            .iter()
            .filter(|prefix| feed_uri.starts_with(prefix.as_str()))
            .max_by_key(|prefix| prefix.len())
            .ok_or_else(|| {
                RouterError::UnsupportedActor(
                    "this feed generator does not serve feeds for the given DID".to_string(),
                )
            })?;

        let feed_name = &feed_uri[prefix.len()..];
        if feed_name.is_empty() {
            return Err(RouterError::BadRequest("feed name is required".to_string()));
        }

        let feed = self
            .feed_map
            .get(feed_name)
            .ok_or_else(|| RouterError::NotFound("feed not found".to_string()))?;

        Ok((feed_name.to_string(), Arc::clone(feed)))
    }

    /// Concatenates every feed's descriptions in registration order. Fails as a
    /// whole if any feed fails to describe itself.
    pub async fn describe_all(&self) -> Result<Vec<FeedDescription>, RouterError> {
        let mut descriptions = Vec::new();
        for feed in &self.feeds {
            let feed_descriptions = feed.describe().await.map_err(RouterError::Describe)?;
            descriptions.extend(feed_descriptions);
        }
        Ok(descriptions)
    }

    pub fn did_document(&self) -> &DidDocument {
        &self.did_document
    }

    pub fn feed_actor_did(&self) -> &str {
        &self.feed_actor_did
    }

    pub fn service_did(&self) -> &str {
        &self.service_did
    }
}
