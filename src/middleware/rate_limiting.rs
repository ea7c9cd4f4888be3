use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Serialize)]
pub struct RateLimitError {
    pub error: String,
    pub message: String,
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        (StatusCode::TOO_MANY_REQUESTS, Json(self)).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
    /// Read the client address from proxy headers; only safe behind a proxy that sets them
    pub trust_proxy_headers: bool,
}

impl RateLimitConfig {
    /// Limits for OTP, login, password reset and the assistant
    pub fn sensitive(trust_proxy_headers: bool) -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
            trust_proxy_headers,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
            trust_proxy_headers: false,
        }
    }
}

/// Sliding-window limiter keyed by client address.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    requests: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn check_rate_limit(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        let window = self.config.window;

        let entry = requests.entry(key.to_string()).or_default();
        entry.retain(|&time| now.duration_since(time) < window);

        if entry.len() >= self.config.max_requests {
            let retry_after = entry
                .first()
                .map(|&oldest| window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(window);
            return Err(RateLimitError {
                error: "RATE_LIMIT_EXCEEDED".to_string(),
                message: "Too many requests, please try again later".to_string(),
                retry_after: retry_after.as_secs().max(1),
            });
        }

        entry.push(now);
        Ok(())
    }

    /// Drop clients with no request inside the window
    pub fn cleanup_old_entries(&self) {
        let now = Instant::now();
        let window = self.config.window;
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);

        requests.retain(|_, times| times.iter().any(|&time| now.duration_since(time) < window));
    }

    pub fn trusts_proxy_headers(&self) -> bool {
        self.config.trust_proxy_headers
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Extract client identifier for rate limiting.
///
/// Without a trusted proxy the peer address is the only key. Behind one, the
/// right-most `x-forwarded-for` hop is the address the proxy itself appended.
fn client_key(headers: &HeaderMap, remote_addr: Option<SocketAddr>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(last) = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.rsplit(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            return last.to_string();
        }

        if let Some(real_ip) = headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            return real_ip.to_string();
        }
    }

    remote_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), remote_addr, rate_limiter.trusts_proxy_headers());

    if let Err(rejection) = rate_limiter.check_rate_limit(&key) {
        tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        return Err(rejection);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn limiter(max_requests: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            ..RateLimitConfig::default()
        })
    }

    #[test]
    fn test_rate_limiter() {
        let limiter = limiter(3);

        assert!(limiter.check_rate_limit("client1").is_ok());
        assert!(limiter.check_rate_limit("client1").is_ok());
        assert!(limiter.check_rate_limit("client1").is_ok());

        let rejection = limiter.check_rate_limit("client1").unwrap_err();
        assert_eq!(rejection.error, "RATE_LIMIT_EXCEEDED");
        assert!(rejection.retry_after >= 1 && rejection.retry_after <= 60);

        assert!(limiter.check_rate_limit("client2").is_ok());
    }

    #[test]
    fn window_slides() {
        let limiter = limiter(2);
        let start = Instant::now();

        assert!(limiter.check_at("client", start).is_ok());
        assert!(limiter.check_at("client", start + Duration::from_secs(30)).is_ok());
        assert!(limiter.check_at("client", start + Duration::from_secs(45)).is_err());
        assert!(limiter.check_at("client", start + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn proxy_headers_are_ignored_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));
        let peer: SocketAddr = "192.0.2.10:4000".parse().unwrap();

        assert_eq!(client_key(&headers, Some(peer), false), "192.0.2.10");
        assert_eq!(client_key(&headers, None, false), "unknown");
    }

    #[test]
    fn trusted_proxy_hop_is_the_last_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 203.0.113.7"),
        );
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();

        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.7");

        let mut real_ip = HeaderMap::new();
        real_ip.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));
        assert_eq!(client_key(&real_ip, Some(peer), true), "198.51.100.1");
        assert_eq!(client_key(&HeaderMap::new(), Some(peer), true), "10.0.0.1");
    }

    #[test]
    fn cleanup_keeps_recent_clients() {
        let limiter = limiter(5);
        limiter.check_rate_limit("recent").unwrap();

        limiter.cleanup_old_entries();
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
