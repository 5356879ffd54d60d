//! Per-client request throttling.
//!
//! Each (client IP, tier) pair owns a bucket refilled continuously at
//! `limit / window` requests per second and reset outright once a full window
//! has elapsed. Credential endpoints get their own, tighter tier so password
//! guessing does not eat into the general budget and vice versa.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::ApiError;
use crate::config::RateLimitConfig;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// Everything except the credential endpoints
    Api,
    /// Sign-up, sign-in and token refresh
    Auth,
}

#[derive(Debug, Clone)]
struct Bucket {
    remaining: u32,
    window_start: Instant,
    last_seen: Instant,
}

/// Outcome of an admitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window resets
    pub reset_after: u64,
}

#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<(IpAddr, RateLimitTier), Bucket>,
    config: RateLimitConfig,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            window: Duration::from_secs(config.window_seconds.max(1)),
            config,
        }
    }

    pub fn limit_for(&self, tier: RateLimitTier) -> u32 {
        match tier {
            RateLimitTier::Api => self.config.api_requests_per_window,
            RateLimitTier::Auth => self.config.auth_requests_per_window,
        }
    }

    /// Consume one request from the client's bucket.
    /// Returns `Err(retry_after_seconds)` when the bucket is empty.
    pub fn admit(&self, ip: IpAddr, tier: RateLimitTier) -> Result<Admission, u64> {
        self.admit_at(ip, tier, Instant::now())
    }

    fn admit_at(&self, ip: IpAddr, tier: RateLimitTier, now: Instant) -> Result<Admission, u64> {
        let limit = self.limit_for(tier);
        if !self.config.enabled {
            return Ok(Admission {
                limit,
                remaining: limit,
                reset_after: 0,
            });
        }

        let mut bucket = self.buckets.entry((ip, tier)).or_insert_with(|| Bucket {
            remaining: limit,
            window_start: now,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(bucket.window_start);
        if elapsed >= self.window {
            bucket.remaining = limit;
            bucket.window_start = now;
        } else {
            let idle = now.saturating_duration_since(bucket.last_seen).as_secs_f64();
            let refill = (idle * limit as f64 / self.window.as_secs_f64()) as u32;
            bucket.remaining = bucket.remaining.saturating_add(refill).min(limit);
        }
        bucket.last_seen = now;

        let reset_after = self
            .window
            .saturating_sub(now.saturating_duration_since(bucket.window_start))
            .as_secs();

        if bucket.remaining == 0 {
            return Err(reset_after.max(1));
        }

        bucket.remaining -= 1;
        Ok(Admission {
            limit,
            remaining: bucket.remaining,
            reset_after,
        })
    }

    /// Drop buckets idle for more than two windows
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let expiry = self.window * 2;
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) < expiry);
    }

    pub fn entry_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Best-effort client address: proxy headers first, then the socket peer.
fn client_ip(request: &Request<Body>) -> IpAddr {
    let headers = request.headers();

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok());
    if let Some(ip) = real_ip {
        return ip;
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn set_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_after: u64) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(reset_after));
}

async fn throttle(
    state: Arc<AppState>,
    request: Request<Body>,
    next: Next,
    tier: RateLimitTier,
) -> Response {
    let ip = client_ip(&request);

    match state.rate_limiter.admit(ip, tier) {
        Ok(admission) => {
            let mut response = next.run(request).await;
            set_limit_headers(
                response.headers_mut(),
                admission.limit,
                admission.remaining,
                admission.reset_after,
            );
            response
        }
        Err(retry_after) => {
            tracing::warn!(client = %ip, tier = ?tier, retry_after, "Rate limit exceeded");
            let mut response = ApiError::rate_limited(format!(
                "Rate limit exceeded. Try again in {} seconds.",
                retry_after
            ))
            .into_response();
            let headers = response.headers_mut();
            headers.insert("retry-after", HeaderValue::from(retry_after));
            set_limit_headers(headers, state.rate_limiter.limit_for(tier), 0, retry_after);
            response
        }
    }
}

/// Rate limiting middleware for general endpoints
pub async fn rate_limit_api(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    throttle(state, request, next, RateLimitTier::Api).await
}

/// Rate limiting middleware for credential endpoints
pub async fn rate_limit_auth(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    throttle(state, request, next, RateLimitTier::Auth).await
}

/// Spawn a background task to periodically clean up idle buckets
pub fn spawn_cleanup_task(rate_limiter: Arc<RateLimiter>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            rate_limiter.cleanup_expired();
            tracing::debug!(
                entries = rate_limiter.entry_count(),
                "Rate limiter cleanup complete"
            );
        }
    });
}
