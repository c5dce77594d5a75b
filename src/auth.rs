use atrium_api::types::string::Did;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use jwt_compact::{Claims, UntrustedToken};
use moka::future::Cache;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::{error::ApiError, types::JwtClaims};

/// Requester identity attached to a request by [`authenticate`]; `None` for
/// anonymous calls.
#[derive(Debug, Clone, Default)]
pub struct RequesterDid(pub Option<String>);

/// Checks service auth tokens addressed to this feed generator.
///
/// Only the claims are checked (issuer, audience, expiry); the token signature
/// is not verified here. Accepted tokens are cached until the earlier of their
/// expiry and the cache TTL.
pub struct Authenticator {
    service_did: String,
    require_auth: bool,
    accepted: Cache<String, (String, DateTime<Utc>)>,
}

impl Authenticator {
    pub fn new(service_did: &str, require_auth: bool, cache_capacity: u64, cache_ttl: Duration) -> Self {
        let accepted = Cache::builder()
            .max_capacity(cache_capacity)
            .time_to_live(cache_ttl)
            .build();

        Self {
            service_did: service_did.to_string(),
            require_auth,
            accepted,
        }
    }

    pub async fn requester_did(&self, headers: &HeaderMap) -> Result<Option<String>, ApiError> {
        let auth_header = match headers.get("authorization") {
            Some(h) => h,
            None if self.require_auth => {
                warn!("Missing Authorization header on authenticated route");
                return Err(ApiError::Unauthorized(
                    "this feed generator requires authentication".to_string(),
                ));
            }
            None => return Ok(None),
        };

        let auth_str = auth_header.to_str().map_err(|_| {
            ApiError::Unauthorized("invalid authorization header format".to_string())
        })?;
        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("invalid authorization header format".to_string()))?
            .trim();

        if let Some((did, expires_at)) = self.accepted.get(token).await {
            if expires_at > Utc::now() {
                debug!("Accepted cached token for {}", did);
                return Ok(Some(did));
            }
            self.accepted.invalidate(token).await;
        }

        let (did, expires_at) = self.validate_token(token, Utc::now()).map_err(|e| {
            warn!("JWT validation failed: {}", e);
            e
        })?;
        info!("Authenticated request from DID: {}", did);
        self.accepted
            .insert(token.to_string(), (did.clone(), expires_at))
            .await;
        Ok(Some(did))
    }

    /// Returns the issuer DID and expiry of a token addressed to this service.
    pub fn validate_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), ApiError> {
        let untrusted = UntrustedToken::new(token)
            .map_err(|e| ApiError::Unauthorized(format!("malformed JWT: {}", e)))?;
        let claims: Claims<JwtClaims> = untrusted
            .deserialize_claims_unchecked()
            .map_err(|e| ApiError::Unauthorized(format!("invalid JWT claims: {}", e)))?;

        if claims.custom.aud != self.service_did {
            return Err(ApiError::Unauthorized(format!(
                "JWT audience {} does not match {}",
                claims.custom.aud, self.service_did
            )));
        }

        let expires_at = claims
            .expiration
            .ok_or_else(|| ApiError::Unauthorized("JWT has no expiration".to_string()))?;
        if expires_at <= now {
            return Err(ApiError::Unauthorized("JWT has expired".to_string()));
        }

        if Did::new(claims.custom.iss.clone()).is_err() {
            return Err(ApiError::Unauthorized(format!(
                "JWT issuer {} is not a DID",
                claims.custom.iss
            )));
        }

        Ok((claims.custom.iss, expires_at))
    }
}

/// Middleware resolving the requester identity before the feed skeleton handler runs.
pub async fn authenticate(
    State(auth): State<Arc<Authenticator>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let requester = auth.requester_did(request.headers()).await?;
    request.extensions_mut().insert(RequesterDid(requester));
    Ok(next.run(request).await)
}
