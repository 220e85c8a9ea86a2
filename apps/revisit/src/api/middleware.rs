//! # Middleware Module
//!
//! Rate limiting for the Revisit HTTP API.
//!
//! ## Configuration
//!
//! - `REVISIT_RATE_LIMIT`: Requests per second across all clients
//!   (default: 100, 0 to disable)

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Environment variable holding the request budget.
pub const RATE_LIMIT_ENV_VAR: &str = "REVISIT_RATE_LIMIT";

/// Default rate limit: 100 requests per second.
const DEFAULT_RPS: u32 = 100;

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Global rate limiter type alias.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a global limiter allowing `requests_per_second`.
///
/// A zero budget falls back to the default rather than blocking everything;
/// callers disable limiting by not installing the middleware.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second)
        .or(NonZeroU32::new(DEFAULT_RPS))
        .unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Read `REVISIT_RATE_LIMIT`, falling back to 100 when unset or unparsable.
pub fn get_rate_limit_from_env() -> u32 {
    match std::env::var(RATE_LIMIT_ENV_VAR) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(
                "{}={:?} is not a number, using {}",
                RATE_LIMIT_ENV_VAR,
                raw,
                DEFAULT_RPS
            );
            DEFAULT_RPS
        }),
        Err(_) => DEFAULT_RPS,
    }
}

/// Rejects requests over budget with 429 and the usual error envelope.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if limiter.check().is_err() {
        tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "success": false,
                "error": "Too Many Requests",
            })),
        )
            .into_response();
    }
    next.run(request).await
}

// =============================================================================
// TESTS
// =============================================================================
