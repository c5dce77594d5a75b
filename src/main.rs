use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod error;
mod feed;
mod handlers;
mod router;
mod static_feed;
mod types;

use crate::{
    auth::Authenticator, config::Args, handlers::build_app, router::FeedRouter,
    static_feed::StaticFeed,
};

// The conversation that started the static demo feed.
const STATIC_FEED_POST: &str =
    "at://did:plc:q6gjnaw2blty4crticxkmujt/app.bsky.feed.post/3jx7msc4ive26";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let service_did = args.service_did()?;
    let acceptable_dids = args.acceptable_dids()?;
    info!("Service DID: {}", service_did);
    info!("Accepting feed URIs for {:?}", acceptable_dids);

    let mut feed_router = FeedRouter::new(
        &args.feed_actor_did,
        &service_did,
        &acceptable_dids,
        &args.service_endpoint,
    )?;

    let (static_feed, static_aliases) = StaticFeed::new(
        &args.feed_actor_did,
        "static",
        &[],
        vec![STATIC_FEED_POST.to_string()],
    );
    feed_router.register_feed(&static_aliases, Arc::new(static_feed));

    let auth = Arc::new(Authenticator::new(
        feed_router.service_did(),
        args.require_auth,
        args.auth_cache_capacity,
        args.auth_cache_ttl(),
    ));

    let app = build_app(Arc::new(feed_router), auth, args.request_timeout());

    let listener = TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    info!("Feed generator listening on port {}", args.port);

    axum::serve(listener, app).await?;
    Ok(())
}
