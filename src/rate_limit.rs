//! # Per-Client Rate Limiting
//!
//! Fixed windows keyed by client address, in two classifications:
//!
//! * general: every request;
//! * login: requests to `/api/<role>/login`, counted in addition to the general window.
//!
//! Counters live behind [`WindowStore`] so a shared cache can replace the in-process
//! [`MemoryWindowStore`] without touching the middleware.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::time::Instant;

use crate::{config::RateLimitSettings, error::AppError, telemetry};

pub const GENERAL_MESSAGE: &str = "Too many requests from this IP, please try again later.";
pub const LOGIN_MESSAGE: &str = "Too many login attempts from this IP, please try again later.";

static RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
static RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
static RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
static RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// The state of a window right after it was incremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    pub count: u64,
    pub resets_in: Duration,
}

/// WindowStore
///
/// Keyed fixed-window counters. `increment` must be atomic per key: concurrent hits on
/// the same key observe distinct counts.
#[async_trait]
pub trait WindowStore: Send + Sync {
    async fn increment(&self, key: &str, window: Duration) -> WindowHit;
}

#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    window_start: Instant,
    count: u64,
}

/// In-process [`WindowStore`]. Each key's record is updated under its shard lock.
#[derive(Debug, Default)]
pub struct MemoryWindowStore {
    windows: DashMap<String, WindowRecord>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops records whose window has elapsed.
    pub fn purge_expired(&self, window: Duration) {
        let now = Instant::now();
        self.windows
            .retain(|_, record| now.duration_since(record.window_start) < window);
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn increment(&self, key: &str, window: Duration) -> WindowHit {
        let now = Instant::now();
        let mut record = self
            .windows
            .entry(key.to_string())
            .or_insert(WindowRecord {
                window_start: now,
                count: 0,
            });

        if now.duration_since(record.window_start) >= window {
            record.window_start = now;
            record.count = 0;
        }
        record.count += 1;

        WindowHit {
            count: record.count,
            resets_in: window.saturating_sub(now.duration_since(record.window_start)),
        }
    }
}

/// Ceiling and window length of one classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub limit: u64,
    pub window: Duration,
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub policy: RatePolicy,
    pub remaining: u64,
    pub reset_secs: u64,
}

/// RateLimiter
///
/// One classification: counts a hit for the client, then allows it iff the count is
/// within the limit.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    policy: RatePolicy,
    scope: &'static str,
    message: &'static str,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn WindowStore>,
        policy: RatePolicy,
        scope: &'static str,
        message: &'static str,
    ) -> Self {
        Self {
            store,
            policy,
            scope,
            message,
        }
    }

    pub async fn hit(&self, client: &str) -> Decision {
        let key = format!("{}:{}", self.scope, client);
        let hit = self.store.increment(&key, self.policy.window).await;

        Decision {
            allowed: hit.count <= self.policy.limit,
            policy: self.policy,
            remaining: self.policy.limit.saturating_sub(hit.count),
            reset_secs: hit.resets_in.as_millis().div_ceil(1000) as u64,
        }
    }

    fn reject(&self, decision: &Decision) -> Response {
        tracing::warn!(scope = self.scope, "rate limit exceeded");
        let mut response = AppError::RateLimited(self.message.to_string()).into_response();
        apply_headers(&mut response, decision);
        if let Ok(value) = HeaderValue::from_str(&decision.reset_secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

/// RateLimits
///
/// Both classifications, sharing one store. Cloned into the middleware state.
#[derive(Clone)]
pub struct RateLimits {
    pub general: RateLimiter,
    pub login: RateLimiter,
}

impl RateLimits {
    pub fn new(store: Arc<dyn WindowStore>, settings: &RateLimitSettings) -> Self {
        Self {
            general: RateLimiter::new(
                store.clone(),
                RatePolicy {
                    limit: settings.general_max,
                    window: settings.window,
                },
                "general",
                GENERAL_MESSAGE,
            ),
            login: RateLimiter::new(
                store,
                RatePolicy {
                    limit: settings.login_max,
                    window: settings.window,
                },
                "login",
                LOGIN_MESSAGE,
            ),
        }
    }

    /// Both classifications backed by a fresh [`MemoryWindowStore`].
    pub fn in_memory(settings: &RateLimitSettings) -> Self {
        Self::new(Arc::new(MemoryWindowStore::new()), settings)
    }
}

/// Matches `/api/<role>/login`, with or without a trailing slash.
pub fn is_login_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix("/api/") else {
        return false;
    };
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    matches!(rest.split_once('/'), Some((role, "login")) if !role.is_empty() && !role.contains('/'))
}

fn apply_headers(response: &mut Response, decision: &Decision) {
    let headers = response.headers_mut();
    let policy = format!("{};w={}", decision.policy.limit, decision.policy.window.as_secs());

    for (name, value) in [
        (&RATELIMIT_POLICY, policy),
        (&RATELIMIT_LIMIT, decision.policy.limit.to_string()),
        (&RATELIMIT_REMAINING, decision.remaining.to_string()),
        (&RATELIMIT_RESET, decision.reset_secs.to_string()),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name.clone(), value);
        }
    }
}

/// enforce_rate_limits
///
/// Counts the request against the general window and, for login paths, the login window.
/// Rejected requests never reach the inner stages. Allowed responses carry the headers
/// of the tightest window that applied.
pub async fn enforce_rate_limits(
    State(limits): State<RateLimits>,
    request: Request,
    next: Next,
) -> Response {
    let client = telemetry::client_address(request.extensions());

    let general = limits.general.hit(&client).await;
    if !general.allowed {
        return limits.general.reject(&general);
    }

    let mut reported = general;
    if is_login_path(request.uri().path()) {
        let login = limits.login.hit(&client).await;
        if !login.allowed {
            return limits.login.reject(&login);
        }
        reported = login;
    }

    let mut response = next.run(request).await;
    apply_headers(&mut response, &reported);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn counts_grow_within_a_window() {
        let store = MemoryWindowStore::new();
        assert_eq!(store.increment("k", WINDOW).await.count, 1);
        assert_eq!(store.increment("k", WINDOW).await.count, 2);
        assert_eq!(store.increment("other", WINDOW).await.count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_it_elapses() {
        let store = MemoryWindowStore::new();
        store.increment("k", WINDOW).await;
        store.increment("k", WINDOW).await;

        tokio::time::advance(Duration::from_secs(30)).await;
        let hit = store.increment("k", WINDOW).await;
        assert_eq!(hit.count, 3);
        assert_eq!(hit.resets_in, Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(30)).await;
        let hit = store.increment("k", WINDOW).await;
        assert_eq!(hit.count, 1);
        assert_eq!(hit.resets_in, WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_rejects_once_count_exceeds_limit() {
        let limiter = RateLimiter::new(
            Arc::new(MemoryWindowStore::new()),
            RatePolicy {
                limit: 2,
                window: WINDOW,
            },
            "test",
            GENERAL_MESSAGE,
        );

        let first = limiter.hit("1.2.3.4").await;
        let second = limiter.hit("1.2.3.4").await;
        let third = limiter.hit("1.2.3.4").await;

        assert!(first.allowed && second.allowed);
        assert_eq!(second.remaining, 0);
        assert!(!third.allowed);
        assert!(limiter.hit("5.6.7.8").await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_elapsed_windows() {
        let store = MemoryWindowStore::new();
        store.increment("old", WINDOW).await;
        tokio::time::advance(Duration::from_secs(45)).await;
        store.increment("new", WINDOW).await;
        tokio::time::advance(Duration::from_secs(20)).await;

        store.purge_expired(WINDOW);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn login_paths_are_recognised() {
        assert!(is_login_path("/api/admin/login"));
        assert!(is_login_path("/api/student/login"));
        assert!(is_login_path("/api/faculty/login/"));
        assert!(!is_login_path("/api/admin/getallstudent"));
        assert!(!is_login_path("/api/login"));
        assert!(!is_login_path("/api/admin/x/login"));
        assert!(!is_login_path("/health"));
    }
}
