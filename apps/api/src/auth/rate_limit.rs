//! Fixed-window request limiting keyed by caller (user id or client IP).
//!
//! The in-process limiter holds at most `max_keys` windows; when full it drops
//! expired windows first and then the window that resets soonest. With
//! `REDIS_URL` set the counters live in Redis instead and expire on their own.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_secs: u64,
}

impl RateDecision {
    pub fn into_result(self) -> Result<(), AppError> {
        if self.allowed {
            Ok(())
        } else {
            Err(AppError::RateLimited {
                retry_after_secs: self.retry_after_secs,
            })
        }
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str) -> RateDecision;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: Instant,
}

pub struct MemoryRateLimiter {
    max_requests: u32,
    window: Duration,
    max_keys: usize,
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryRateLimiter {
    pub fn new(max_requests: u32, window: Duration, max_keys: usize) -> Self {
        Self {
            max_requests,
            window,
            max_keys: max_keys.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

fn evict(windows: &mut HashMap<String, Window>, max_keys: usize, now: Instant) {
    windows.retain(|_, w| w.resets_at > now);
    while windows.len() >= max_keys {
        let oldest = windows
            .iter()
            .min_by_key(|(_, w)| w.resets_at)
            .map(|(k, _)| k.clone());
        match oldest {
            Some(key) => {
                windows.remove(&key);
            }
            None => break,
        }
    }
}

fn seconds_until(resets_at: Instant, now: Instant) -> u64 {
    let millis = resets_at.saturating_duration_since(now).as_millis() as u64;
    millis.div_ceil(1000).max(1)
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if !windows.contains_key(key) && windows.len() >= self.max_keys {
            evict(&mut windows, self.max_keys, now);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            resets_at: now + self.window,
        });
        if now >= window.resets_at {
            window.count = 0;
            window.resets_at = now + self.window;
        }

        if window.count >= self.max_requests {
            return RateDecision {
                allowed: false,
                remaining: 0,
                retry_after_secs: seconds_until(window.resets_at, now),
            };
        }
        window.count += 1;
        RateDecision {
            allowed: true,
            remaining: self.max_requests - window.count,
            retry_after_secs: 0,
        }
    }
}

/// Redis-backed counters shared between processes (`SET NX EX` + `INCR` in one
/// `MULTI`).
/// Fails open if Redis is unreachable.
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    max_requests: u32,
    window_secs: u64,
}

impl RedisRateLimiter {
    pub async fn connect(url: &str, max_requests: u32, window_secs: u64) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            max_requests,
            window_secs: window_secs.max(1),
        })
    }

    async fn hit(&self, key: &str) -> redis::RedisResult<(u32, i64)> {
        let mut conn = self.conn.clone();
        let key = format!("ratelimit:{key}");
        // The window's TTL is set in the same transaction that creates the key.
        let (count, ttl): (u32, i64) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&key)
            .arg(0)
            .arg("NX")
            .arg("EX")
            .arg(self.window_secs)
            .ignore()
            .cmd("INCR")
            .arg(&key)
            .cmd("TTL")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        Ok((count, ttl))
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str) -> RateDecision {
        match self.hit(key).await {
            Ok((count, ttl)) if count > self.max_requests => RateDecision {
                allowed: false,
                remaining: 0,
                retry_after_secs: if ttl > 0 { ttl as u64 } else { self.window_secs },
            },
            Ok((count, _)) => RateDecision {
                allowed: true,
                remaining: self.max_requests.saturating_sub(count),
                retry_after_secs: 0,
            },
            Err(e) => {
                warn!("Rate limiter unavailable, allowing request: {e}");
                RateDecision {
                    allowed: true,
                    remaining: self.max_requests,
                    retry_after_secs: 0,
                }
            }
        }
    }
}

/// The socket peer address, or the first hop of `x-forwarded-for` when the
/// deployment sits behind a trusted proxy.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|ip| ip.trim().to_string())
                .filter(|ip| !ip.is_empty())
        })
        .flatten();
    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Per-IP limiter for endpoints that do not require a signed-in caller.
pub async fn limit_by_ip(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(
        request.headers(),
        peer.map(|ConnectInfo(addr)| addr),
        state.config.trust_proxy,
    );
    state
        .rate_limiter
        .check(&format!("ip:{ip}"))
        .await
        .into_result()?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_window_blocks_then_resets() {
        let limiter = MemoryRateLimiter::new(2, Duration::from_secs(60), 100);
        assert!(limiter.check("u1").await.allowed);
        assert_eq!(limiter.check("u1").await.remaining, 0);

        let blocked = limiter.check("u1").await;
        assert!(!blocked.allowed);
        assert_eq!(blocked.retry_after_secs, 60);

        // Other callers have their own window.
        assert!(limiter.check("u2").await.allowed);

        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(limiter.check("u1").await.retry_after_secs, 15);

        tokio::time::advance(Duration::from_secs(16)).await;
        assert!(limiter.check("u1").await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_count_stays_bounded() {
        let limiter = MemoryRateLimiter::new(5, Duration::from_secs(60), 3);
        for i in 0..10 {
            limiter.check(&format!("ip:{i}")).await;
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(limiter.tracked_keys().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_windows_are_evicted_before_live_ones() {
        let limiter = MemoryRateLimiter::new(5, Duration::from_secs(10), 2);
        limiter.check("old").await;
        tokio::time::advance(Duration::from_secs(11)).await;
        limiter.check("live").await;
        limiter.check("new").await;

        let windows = limiter.windows.lock().await;
        assert!(windows.contains_key("live"));
        assert!(windows.contains_key("new"));
        assert!(!windows.contains_key("old"));
    }

    #[test]
    fn test_client_ip_ignores_forwarded_header_by_default() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer), false), "10.0.0.9");

        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, Some(peer), false), "10.0.0.9");
        assert_eq!(client_ip(&headers, None, false), "unknown");
    }

    #[test]
    fn test_client_ip_uses_forwarded_header_behind_proxy() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, Some(peer), true), "203.0.113.7");
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), true), "10.0.0.9");
        assert_eq!(client_ip(&HeaderMap::new(), None, true), "unknown");
    }

    #[tokio::test]
    async fn test_rotating_forwarded_header_does_not_reset_limit() {
        use axum::{body::Body, http::StatusCode, routing::get, Router};
        use tower::ServiceExt;

        let mut state = crate::state::test_state();
        state.rate_limiter = std::sync::Arc::new(MemoryRateLimiter::new(
            1,
            Duration::from_secs(60),
            100,
        ));
        let app = Router::new()
            .route("/limited", get(|| async { "ok" }))
            .route_layer(axum::middleware::from_fn_with_state(state.clone(), limit_by_ip))
            .with_state(state);

        let request = |forwarded: &str| {
            axum::http::Request::builder()
                .uri("/limited")
                .header("x-forwarded-for", forwarded)
                .body(Body::empty())
                .unwrap()
        };
        let first = app.clone().oneshot(request("198.51.100.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.oneshot(request("198.51.100.2")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_blocked_decision_maps_to_rate_limited() {
        let decision = RateDecision {
            allowed: false,
            remaining: 0,
            retry_after_secs: 7,
        };
        assert!(matches!(
            decision.into_result(),
            Err(AppError::RateLimited { retry_after_secs: 7 })
        ));
    }
}
