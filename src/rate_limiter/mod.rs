/*!
 * # Rate Limiting Module
 *
 * Fixed-window admission control keyed by client IP. Only paths under `/api`
 * are counted. Counters live in a [`DashMap`] by default; when Redis is
 * configured it is used as the shared store, with the in-memory map as the
 * fallback whenever Redis is unreachable.
 *
 * ```ignore
 * let layer = RateLimitLayer::new(RateLimitConfig::default(), RateLimitBackend::InMemory);
 * let app = Router::new().route("/api/cart", get(handler)).layer(layer);
 * ```
 */
use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// Path prefix the limiter applies to
pub const LIMITED_PREFIX: &str = "/api";

fn num_to_header_value<T: ToString>(n: T) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

impl WindowEntry {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Counts one request, opening a fresh window if the current one has elapsed.
    fn hit(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.window_start) >= window {
            self.count = 0;
            self.window_start = now;
        }
        self.count = self.count.saturating_add(1);
    }

    fn time_until_reset(&self, now: Instant, window: Duration) -> Duration {
        window.saturating_sub(now.duration_since(self.window_start))
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_duration: Duration,
    pub enable_headers: bool,
    /// Key clients by `x-forwarded-for` / `x-real-ip`. Only enable behind a proxy that sets them.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window_duration: Duration::from_secs(15 * 60),
            enable_headers: true,
            trust_proxy_headers: false,
        }
    }
}

impl From<&AppConfig> for RateLimitConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            requests_per_window: cfg.rate_limit_requests_per_window,
            window_duration: Duration::from_secs(cfg.rate_limit_window_seconds),
            enable_headers: cfg.rate_limit_enable_headers,
            trust_proxy_headers: cfg.rate_limit_trust_proxy_headers,
        }
    }
}

#[derive(Clone, Default)]
pub enum RateLimitBackend {
    #[default]
    InMemory,
    Redis {
        client: Arc<redis::Client>,
        namespace: String,
    },
}

impl RateLimitBackend {
    /// Picks Redis when enabled and the URL parses, otherwise in-memory.
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        if !cfg.rate_limit_use_redis {
            return Self::InMemory;
        }
        match redis::Client::open(cfg.redis_url.as_str()) {
            Ok(client) => Self::Redis {
                client: Arc::new(client),
                namespace: cfg.rate_limit_namespace.clone(),
            },
            Err(err) => {
                warn!(error = %err, "invalid redis url, rate limiting in memory");
                Self::InMemory
            }
        }
    }
}

#[derive(Clone)]
enum WindowStore {
    InMemory {
        entries: Arc<DashMap<String, WindowEntry>>,
    },
    Redis {
        client: Arc<redis::Client>,
        namespace: String,
        fallback: Arc<DashMap<String, WindowEntry>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: Duration,
}

#[derive(Clone)]
pub struct RateLimiter {
    store: WindowStore,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, backend: RateLimitBackend) -> Self {
        let store = match backend {
            RateLimitBackend::InMemory => WindowStore::InMemory {
                entries: Arc::new(DashMap::new()),
            },
            RateLimitBackend::Redis { client, namespace } => WindowStore::Redis {
                client,
                namespace,
                fallback: Arc::new(DashMap::new()),
            },
        };
        Self { store, config }
    }

    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, RateLimitBackend::InMemory)
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Counts a request against `key` and reports whether it is admitted.
    pub async fn check(&self, key: &str) -> RateLimitResult {
        match &self.store {
            WindowStore::InMemory { entries } => self.check_in_memory(entries, key),
            WindowStore::Redis {
                client,
                namespace,
                fallback,
            } => match client.get_async_connection().await {
                Ok(mut conn) => match self.check_with_redis(&mut conn, namespace, key).await {
                    Ok(result) => result,
                    Err(err) => {
                        warn!(error = %err, "redis rate limit error, using fallback");
                        self.check_in_memory(fallback, key)
                    }
                },
                Err(err) => {
                    warn!(error = %err, "redis unavailable for rate limiting, using fallback");
                    self.check_in_memory(fallback, key)
                }
            },
        }
    }

    fn check_in_memory(&self, entries: &DashMap<String, WindowEntry>, key: &str) -> RateLimitResult {
        let now = Instant::now();
        let mut entry = entries
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry::new(now));
        entry.hit(now, self.config.window_duration);

        let limit = self.config.requests_per_window;
        RateLimitResult {
            allowed: entry.count <= limit,
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_time: entry.time_until_reset(now, self.config.window_duration),
        }
    }

    async fn check_with_redis<C>(
        &self,
        conn: &mut C,
        namespace: &str,
        key: &str,
    ) -> Result<RateLimitResult, redis::RedisError>
    where
        C: redis::aio::ConnectionLike + Send,
    {
        let redis_key = format!("{}:{}", namespace, key);
        let window_secs = self.config.window_duration.as_secs().max(1);

        let count: i64 = conn.incr(&redis_key, 1).await?;
        let mut ttl: i64 = conn.ttl(&redis_key).await.unwrap_or(-1);
        if count == 1 || ttl < 0 {
            let _: Result<(), _> = conn.expire(&redis_key, window_secs as usize).await;
            ttl = window_secs as i64;
        }

        let limit = self.config.requests_per_window;
        let count = u32::try_from(count.max(0)).unwrap_or(u32::MAX);
        Ok(RateLimitResult {
            allowed: count <= limit,
            limit,
            remaining: limit.saturating_sub(count),
            reset_time: Duration::from_secs(ttl.max(0) as u64),
        })
    }

    /// Drops in-memory windows that have fully elapsed.
    pub fn cleanup_expired(&self) {
        let window = self.config.window_duration;
        let now = Instant::now();
        let entries = match &self.store {
            WindowStore::InMemory { entries } => entries,
            WindowStore::Redis { fallback, .. } => fallback,
        };
        entries.retain(|_, entry| now.duration_since(entry.window_start) < window);
    }
}

/// Client key from the socket address, or from forwarding headers when the
/// deployment trusts its proxy.
pub fn extract_ip_key(request: &Request, trust_proxy_headers: bool) -> String {
    if !trust_proxy_headers {
        return socket_key(request);
    }

    if let Some(ip) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return format!("ip:{}", ip);
    }

    if let Some(ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return format!("ip:{}", ip);
    }

    socket_key(request)
}

fn socket_key(request: &Request) -> String {
    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| format!("ip:{}", info.0.ip()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

fn apply_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert("X-RateLimit-Limit", num_to_header_value(result.limit));
    headers.insert("X-RateLimit-Remaining", num_to_header_value(result.remaining));
    headers.insert(
        "X-RateLimit-Reset",
        num_to_header_value(result.reset_time.as_secs()),
    );
}

#[derive(Clone)]
pub struct RateLimitLayer {
    rate_limiter: RateLimiter,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig, backend: RateLimitBackend) -> Self {
        Self {
            rate_limiter: RateLimiter::new(config, backend),
        }
    }

    pub fn limiter(&self) -> RateLimiter {
        self.rate_limiter.clone()
    }
}

impl<S> tower::Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            rate_limiter: self.rate_limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    rate_limiter: RateLimiter,
}

impl<S> tower::Service<Request> for RateLimitService<S>
where
    S: tower::Service<Request, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let rate_limiter = self.rate_limiter.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !request.uri().path().starts_with(LIMITED_PREFIX) {
                return inner.call(request).await;
            }

            let key = extract_ip_key(&request, rate_limiter.config().trust_proxy_headers);
            let result = rate_limiter.check(&key).await;
            let enable_headers = rate_limiter.config().enable_headers;

            if !result.allowed {
                warn!(key = %key, "rate limit exceeded");
                let mut response = ServiceError::RateLimitExceeded.into_response();
                if enable_headers {
                    apply_headers(response.headers_mut(), &result);
                }
                return Ok(response);
            }

            debug!(key = %key, remaining = result.remaining, "request admitted");
            let mut response = inner.call(request).await?;
            if enable_headers {
                apply_headers(response.headers_mut(), &result);
            }
            Ok(response)
        })
    }
}

/// Periodically sweeps expired in-memory windows.
pub async fn start_cleanup_task(rate_limiter: RateLimiter, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        rate_limiter.cleanup_expired();
        debug!("rate limiter cleanup completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::in_memory(RateLimitConfig {
            requests_per_window: limit,
            window_duration: Duration::from_secs(60),
            enable_headers: true,
            trust_proxy_headers: false,
        })
    }

    #[tokio::test]
    async fn admits_up_to_the_limit() {
        let limiter = limiter(2);
        assert!(limiter.check("ip:1.1.1.1").await.allowed);
        let second = limiter.check("ip:1.1.1.1").await;
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);
        assert!(!limiter.check("ip:1.1.1.1").await.allowed);
    }

    #[tokio::test]
    async fn keys_are_counted_separately() {
        let limiter = limiter(1);
        assert!(limiter.check("ip:a").await.allowed);
        assert!(limiter.check("ip:b").await.allowed);
        assert!(!limiter.check("ip:a").await.allowed);
    }

    #[test]
    fn window_resets_after_elapsing() {
        let start = Instant::now();
        let window = Duration::from_secs(10);
        let mut entry = WindowEntry::new(start);
        entry.hit(start, window);
        entry.hit(start, window);
        assert_eq!(entry.count, 2);
        entry.hit(start + Duration::from_secs(11), window);
        assert_eq!(entry.count, 1);
    }

    #[tokio::test]
    async fn only_api_paths_are_limited() {
        let layer = RateLimitLayer::new(
            RateLimitConfig {
                requests_per_window: 1,
                window_duration: Duration::from_secs(60),
                enable_headers: true,
                trust_proxy_headers: true,
            },
            RateLimitBackend::InMemory,
        );
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/api/ping", get(|| async { "pong" }))
            .layer(layer);

        let req = |uri: &str| {
            Request::builder()
                .uri(uri)
                .header("x-forwarded-for", "10.0.0.9")
                .body(Body::empty())
                .unwrap()
        };

        for _ in 0..3 {
            let res = app.clone().oneshot(req("/")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        let first = app.clone().oneshot(req("/api/ping")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["X-RateLimit-Remaining"], "0");

        let second = app.clone().oneshot(req("/api/ping")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn forwarded_headers_count_only_behind_a_trusted_proxy() {
        let peer: std::net::SocketAddr = "192.0.2.7:40000".parse().unwrap();
        let req = |forwarded: &str| {
            let mut request = Request::builder()
                .uri("/api/ping")
                .header("x-forwarded-for", forwarded)
                .body(Body::empty())
                .unwrap();
            request
                .extensions_mut()
                .insert(axum::extract::ConnectInfo(peer));
            request
        };

        assert_eq!(extract_ip_key(&req("10.0.0.1"), false), "ip:192.0.2.7");
        assert_eq!(extract_ip_key(&req("10.0.0.2"), false), "ip:192.0.2.7");
        assert_eq!(extract_ip_key(&req("10.0.0.1, 172.16.0.1"), true), "ip:10.0.0.1");
    }
}
