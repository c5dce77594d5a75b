use axum::{
    extract::{Query, State},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use std::{any::Any, num::IntErrorKind, sync::Arc, time::Duration};
use tokio::time::timeout;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::{
    auth::{authenticate, Authenticator, RequesterDid},
    error::ApiError,
    router::FeedRouter,
    types::{DescribeFeedGeneratorResponse, DidDocument, FeedSkeletonParams, FeedSkeletonResponse},
};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 250;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<FeedRouter>,
    /// Deadline for a single `get_page` or `describe_all` call.
    pub request_timeout: Duration,
}

pub fn build_app(router: Arc<FeedRouter>, auth: Arc<Authenticator>, request_timeout: Duration) -> Router {
    let app_state = AppState {
        router,
        request_timeout,
    };

    Router::new()
        .route("/", get(root))
        .route("/.well-known/did.json", get(did_document))
        .route(
            "/xrpc/app.bsky.feed.describeFeedGenerator",
            get(describe_feed_generator),
        )
        .route(
            "/xrpc/app.bsky.feed.getFeedSkeleton",
            get(get_feed_skeleton).route_layer(middleware::from_fn_with_state(auth, authenticate)),
        )
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);
    ApiError::Internal("internal error while serving the request".to_string()).into_response()
}

/// Missing, unparsable or non-positive limits fall back to the default; larger
/// ones, including integers too large for `i64`, are clamped to the maximum.
pub fn parse_limit(raw: Option<&str>) -> i64 {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => DEFAULT_LIMIT,
        Some(s) => match s.parse::<i64>() {
            Ok(limit) if limit <= 0 => DEFAULT_LIMIT,
            Ok(limit) if limit > MAX_LIMIT => {
                debug!("Limit {} clamped to {}", limit, MAX_LIMIT);
                MAX_LIMIT
            }
            Ok(limit) => limit,
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => {
                debug!("Limit {:?} clamped to {}", s, MAX_LIMIT);
                MAX_LIMIT
            }
            Err(_) => {
                debug!("Unparsable limit {:?}, using default", s);
                DEFAULT_LIMIT
            }
        },
    }
}

async fn root() -> &'static str {
    "Bluesky Feed Router"
}

async fn did_document(State(state): State<AppState>) -> Json<DidDocument> {
    Json(state.router.did_document().clone())
}

async fn describe_feed_generator(
    State(state): State<AppState>,
) -> Result<Json<DescribeFeedGeneratorResponse>, ApiError> {
    let feeds = timeout(state.request_timeout, state.router.describe_all())
        .await
        .map_err(|_| ApiError::Internal("failed to describe feeds: deadline exceeded".to_string()))??;
    debug!("Describing {} feeds", feeds.len());

    Ok(Json(DescribeFeedGeneratorResponse {
        did: state.router.feed_actor_did().to_string(),
        feeds,
    }))
}

async fn get_feed_skeleton(
    State(state): State<AppState>,
    requester: Option<Extension<RequesterDid>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<FeedSkeletonResponse>, ApiError> {
    let params = FeedSkeletonParams::from_pairs(pairs);
    let feed_uri = params
        .feed
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::BadRequest("feed query parameter is required".to_string()))?;

    let (feed_name, feed) = state.router.resolve_feed(&feed_uri).map_err(|e| {
        warn!("Could not resolve feed {}: {}", feed_uri, e);
        ApiError::from(e)
    })?;

    let limit = parse_limit(params.limit.as_deref());
    let cursor = params.cursor.unwrap_or_default();
    let requester_did = requester
        .and_then(|Extension(RequesterDid(did))| did)
        .unwrap_or_default();

    info!(
        "Generating feed {} for requester: {:?}, limit: {}, cursor: {:?}",
        feed_name, requester_did, limit, cursor
    );

    let page = timeout(
        state.request_timeout,
        feed.get_page(&feed_name, &requester_did, limit, &cursor),
    )
    .await
    .map_err(|_| {
        ApiError::Internal("failed to get feed items: deadline exceeded".to_string())
    })??;

    debug!("Feed {} returned {} items", feed_name, page.posts.len());
    info!("Served {} posts from feed {}", page.posts.len(), feed_name);

    Ok(Json(FeedSkeletonResponse {
        cursor: page.cursor,
        feed: page.posts,
    }))
}
