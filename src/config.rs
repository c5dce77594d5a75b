use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::time::Duration;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "feedrouter")]
#[command(about = "A Bluesky feed generator that routes feed URIs to registered feeds")]
pub struct Args {
    /// DID of the repo the feeds are published under
    #[arg(long, env = "FEED_ACTOR_DID")]
    pub feed_actor_did: String,

    /// URL the feed generator is reachable at
    #[arg(long, env = "SERVICE_ENDPOINT")]
    pub service_endpoint: String,

    /// Defaults to did:web:<host of the service endpoint>
    #[arg(long, env = "SERVICE_DID")]
    pub service_did: Option<String>,

    /// Extra DIDs whose feed URIs are served, comma separated
    #[arg(long, env = "ACCEPTABLE_DIDS", value_delimiter = ',')]
    pub acceptable_dids: Vec<String>,

    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub request_timeout_secs: u64,

    /// Reject getFeedSkeleton calls without a service auth token
    #[arg(long, env = "REQUIRE_AUTH", default_value_t = false)]
    pub require_auth: bool,

    #[arg(long, env = "AUTH_CACHE_CAPACITY", default_value = "10000")]
    pub auth_cache_capacity: u64,

    #[arg(long, env = "AUTH_CACHE_TTL_SECS", default_value = "3600")]
    pub auth_cache_ttl_secs: u64,
}

impl Args {
    pub fn service_did(&self) -> Result<String> {
        if let Some(did) = self.service_did.as_deref().filter(|d| !d.trim().is_empty()) {
            return Ok(did.trim().to_string());
        }

        let url = Url::parse(&self.service_endpoint)
            .with_context(|| format!("error parsing service endpoint {}", self.service_endpoint))?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("service endpoint {} has no host", self.service_endpoint))?;
        Ok(format!("did:web:{}", host))
    }

    /// Feed actor, service and any extra DIDs, deduplicated in that order.
    pub fn acceptable_dids(&self) -> Result<Vec<String>> {
        let mut dids: Vec<String> = Vec::new();
        let candidates = [self.feed_actor_did.clone(), self.service_did()?]
            .into_iter()
            .chain(self.acceptable_dids.iter().cloned());

        for did in candidates {
            let did = did.trim().to_string();
            if !did.is_empty() && !dids.contains(&did) {
                dids.push(did);
            }
        }
        Ok(dids)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn auth_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.auth_cache_ttl_secs)
    }
}
