//! Rate limiting middleware using a sliding window algorithm.
//!
//! Requests are tracked per (client IP, tier); tokens replenish gradually
//! over the window so bursts right at the window edge cannot double up.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::AppState;

/// Rate limit tier for different endpoint types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// General API endpoints
    Api,
    /// Credential endpoints (register/login)
    Auth,
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    tokens: u32,
    window_start: Instant,
    last_request: Instant,
}

impl RateLimitEntry {
    fn new(max_tokens: u32) -> Self {
        let now = Instant::now();
        Self {
            tokens: max_tokens,
            window_start: now,
            last_request: now,
        }
    }
}

/// Thread-safe rate limiter keyed by (IP, tier)
#[derive(Debug)]
pub struct RateLimiter {
    entries: DashMap<(IpAddr, RateLimitTier), RateLimitEntry>,
    config: RateLimitConfig,
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            window_duration: Duration::from_secs(config.window_seconds),
            config,
        }
    }

    /// Check if a request should be allowed and consume a token if so.
    /// Returns Ok(remaining_tokens) if allowed, Err(retry_after_seconds) if rate limited.
    pub fn check_rate_limit(&self, ip: IpAddr, tier: RateLimitTier) -> Result<u32, u64> {
        if !self.config.enabled {
            return Ok(u32::MAX);
        }

        let max_tokens = self.max_tokens(tier);
        let now = Instant::now();

        let mut entry = self
            .entries
            .entry((ip, tier))
            .or_insert_with(|| RateLimitEntry::new(max_tokens));

        let elapsed = now.duration_since(entry.window_start);
        if elapsed >= self.window_duration {
            entry.tokens = max_tokens;
            entry.window_start = now;
        } else {
            // Sliding window: replenish tokens proportionally to idle time
            let since_last = now.duration_since(entry.last_request);
            let replenish_rate = max_tokens as f64 / self.window_duration.as_secs_f64();
            let replenished = (since_last.as_secs_f64() * replenish_rate) as u32;
            entry.tokens = (entry.tokens + replenished).min(max_tokens);
        }

        entry.last_request = now;

        if entry.tokens > 0 {
            entry.tokens -= 1;
            Ok(entry.tokens)
        } else {
            let retry_after = self
                .window_duration
                .saturating_sub(elapsed)
                .as_secs()
                .max(1);
            Err(retry_after)
        }
    }

    fn max_tokens(&self, tier: RateLimitTier) -> u32 {
        match tier {
            RateLimitTier::Api => self.config.api_requests_per_window,
            RateLimitTier::Auth => self.config.auth_requests_per_window,
        }
    }

    /// Drop entries whose window passed long ago. Called from the engine sweep.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let expiry = self.window_duration * 2;

        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) < expiry);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Extract client IP from proxy headers, falling back to localhost
fn extract_client_ip(request: &Request<Body>) -> IpAddr {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(ip_str) = value.split(',').next() {
                if let Ok(ip) = ip_str.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if let Ok(ip) = value.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }

    "127.0.0.1".parse().unwrap()
}

/// Rate limiting middleware for general API endpoints
pub async fn rate_limit_api(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    rate_limit_with_tier(state, request, next, RateLimitTier::Api).await
}

/// Rate limiting middleware for auth endpoints
pub async fn rate_limit_auth(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    rate_limit_with_tier(state, request, next, RateLimitTier::Auth).await
}

async fn rate_limit_with_tier(
    state: Arc<AppState>,
    request: Request<Body>,
    next: Next,
    tier: RateLimitTier,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&request);

    match state.rate_limiter.check_rate_limit(ip, tier) {
        Ok(_) => Ok(next.run(request).await),
        Err(retry_after) => {
            let body = super::error::ApiError::rate_limited(format!(
                "Rate limit exceeded. Try again in {} seconds.",
                retry_after
            ));
            let mut response = body.into_response();
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
            Err(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            window_seconds: 60,
            api_requests_per_window: 10,
            auth_requests_per_window: 5,
        }
    }

    #[test]
    fn test_allows_requests_under_limit() {
        let limiter = RateLimiter::new(test_config());
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        for i in 0..10 {
            let result = limiter.check_rate_limit(ip, RateLimitTier::Api);
            assert!(result.is_ok(), "Request {} should be allowed", i);
        }
    }

    #[test]
    fn test_blocks_after_limit() {
        let limiter = RateLimiter::new(test_config());
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        for _ in 0..10 {
            let _ = limiter.check_rate_limit(ip, RateLimitTier::Api);
        }

        assert!(limiter.check_rate_limit(ip, RateLimitTier::Api).is_err());
    }

    #[test]
    fn test_different_ips_have_separate_limits() {
        let limiter = RateLimiter::new(test_config());
        let ip1: IpAddr = "192.168.1.1".parse().unwrap();
        let ip2: IpAddr = "192.168.1.2".parse().unwrap();

        for _ in 0..10 {
            let _ = limiter.check_rate_limit(ip1, RateLimitTier::Api);
        }

        assert!(limiter.check_rate_limit(ip2, RateLimitTier::Api).is_ok());
    }

    #[test]
    fn test_auth_tier_is_stricter() {
        let limiter = RateLimiter::new(test_config());
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        for _ in 0..5 {
            let _ = limiter.check_rate_limit(ip, RateLimitTier::Auth);
        }

        assert!(limiter.check_rate_limit(ip, RateLimitTier::Auth).is_err());
        assert!(limiter.check_rate_limit(ip, RateLimitTier::Api).is_ok());
    }

    #[test]
    fn test_disabled_rate_limiting() {
        let mut config = test_config();
        config.enabled = false;
        let limiter = RateLimiter::new(config);
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        for _ in 0..100 {
            assert!(limiter.check_rate_limit(ip, RateLimitTier::Api).is_ok());
        }
    }

    #[test]
    fn test_cleanup_keeps_recent_entries() {
        let limiter = RateLimiter::new(test_config());
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        let _ = limiter.check_rate_limit(ip, RateLimitTier::Api);
        assert_eq!(limiter.entry_count(), 1);

        limiter.cleanup_expired();
        assert_eq!(limiter.entry_count(), 1);
    }
}
