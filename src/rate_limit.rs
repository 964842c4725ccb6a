use crate::config::RateLimitConfig;
use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Buckets idle (and full) for this long are dropped by housekeeping
const IDLE_BUCKET_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket per client key
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Take one token for `key`; false when the bucket is empty
    pub async fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now()).await
    }

    async fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut lock = self.buckets.lock().await;
        let bucket = lock.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.config.capacity,
            last_refill: now,
        });
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + elapsed * self.config.refill_per_sec).min(self.config.capacity);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets that would be full again and have been idle a while
    pub async fn prune(&self) -> usize {
        self.prune_at(Instant::now()).await
    }

    async fn prune_at(&self, now: Instant) -> usize {
        let capacity = self.config.capacity;
        let refill = self.config.refill_per_sec;
        let mut lock = self.buckets.lock().await;
        let before = lock.len();
        lock.retain(|_, bucket| {
            let idle = now.saturating_duration_since(bucket.last_refill);
            let refilled = bucket.tokens + idle.as_secs_f64() * refill >= capacity;
            !(refilled && idle >= IDLE_BUCKET_TTL)
        });
        before - lock.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

/// Identify the caller: first forwarded hop, then real-ip, then the socket
pub fn client_key(req: &Request) -> String {
    let headers = req.headers();
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return real_ip.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// axum middleware rejecting clients that ran out of tokens
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(&req);
    if !limiter.allow(&key).await {
        warn!("Rate limit exceeded for {}", key);
        return AppError::RateLimited.into_response();
    }
    debug!("Rate limit ok for {}", key);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn limiter(capacity: f64, refill: f64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            capacity,
            refill_per_sec: refill,
        })
    }

    #[tokio::test]
    async fn test_bucket_exhausts_then_refills() {
        let rl = limiter(3.0, 1.0);
        let t0 = Instant::now();

        assert!(rl.allow_at("a", t0).await);
        assert!(rl.allow_at("a", t0).await);
        assert!(rl.allow_at("a", t0).await);
        assert!(!rl.allow_at("a", t0).await);

        // one second refills one token
        let t1 = t0 + Duration::from_secs(1);
        assert!(rl.allow_at("a", t1).await);
        assert!(!rl.allow_at("a", t1).await);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let rl = limiter(1.0, 0.1);
        let t0 = Instant::now();
        assert!(rl.allow_at("a", t0).await);
        assert!(!rl.allow_at("a", t0).await);
        assert!(rl.allow_at("b", t0).await);
    }

    #[tokio::test]
    async fn test_refill_never_exceeds_capacity() {
        let rl = limiter(2.0, 10.0);
        let t0 = Instant::now();
        assert!(rl.allow_at("a", t0).await);
        let later = t0 + Duration::from_secs(3600);
        assert!(rl.allow_at("a", later).await);
        assert!(rl.allow_at("a", later).await);
        assert!(!rl.allow_at("a", later).await);
    }

    #[tokio::test]
    async fn test_prune_drops_only_idle_full_buckets() {
        let rl = limiter(5.0, 1.0);
        let t0 = Instant::now();
        rl.allow_at("idle", t0).await;
        rl.allow_at("busy", t0 + IDLE_BUCKET_TTL).await;

        let removed = rl.prune_at(t0 + IDLE_BUCKET_TTL + Duration::from_secs(1)).await;
        assert_eq!(removed, 1);
        assert_eq!(rl.tracked_clients().await, 1);
    }

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("x-real-ip", "198.51.100.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&req), "203.0.113.9");

        let req = Request::builder()
            .header("x-real-ip", "198.51.100.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&req), "198.51.100.1");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&req), "anonymous");
    }
}
