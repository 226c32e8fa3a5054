//! Per-IP rate limits using governor and `tower_governor`.
//!
//! - `checkout_rate_limiter`: one attempt every 6s, burst 5 (~10/min)
//! - `tracking_rate_limiter`: one lookup every 2s, burst 10 (~30/min), so
//!   order numbers cannot be enumerated
//! - `api_rate_limiter`: one request per second, burst 50, for cart and the rest

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Headers carrying the client address, most trusted first.
///
/// Cloudflare sets `cf-connecting-ip`; Fly.io sets `fly-client-ip`.
const CLIENT_IP_HEADERS: &[&str] = &[
    "cf-connecting-ip",
    "x-forwarded-for",
    "x-real-ip",
    "fly-client-ip",
];

/// Keys requests by the client IP reported by the edge proxy.
#[derive(Clone, Copy)]
pub struct CloudflareIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for CloudflareIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        CLIENT_IP_HEADERS
            .iter()
            .find_map(|name| {
                let value = req.headers().get(*name)?.to_str().ok()?;
                // Proxies append; the first entry is the client.
                value.split(',').next()?.trim().parse().ok()
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

pub type RateLimiterLayer =
    GovernorLayer<CloudflareIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Token bucket: one token every `replenish_secs`, holding at most `burst`.
#[derive(Debug, Clone, Copy)]
struct Limit {
    replenish_secs: u64,
    burst: u32,
}

const CHECKOUT_LIMIT: Limit = Limit {
    replenish_secs: 6,
    burst: 5,
};

const TRACKING_LIMIT: Limit = Limit {
    replenish_secs: 2,
    burst: 10,
};

const API_LIMIT: Limit = Limit {
    replenish_secs: 1,
    burst: 50,
};

/// # Panics
///
/// Only if `limit` has a zero field; the constants above do not.
fn layer(limit: Limit) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(CloudflareIpKeyExtractor)
        .per_second(limit.replenish_secs)
        .burst_size(limit.burst)
        .finish()
        .expect("rate limits are non-zero");
    GovernorLayer::new(Arc::new(config))
}

#[must_use]
pub fn checkout_rate_limiter() -> RateLimiterLayer {
    layer(CHECKOUT_LIMIT)
}

#[must_use]
pub fn tracking_rate_limiter() -> RateLimiterLayer {
    layer(TRACKING_LIMIT)
}

#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    layer(API_LIMIT)
}
