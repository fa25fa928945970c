//! Fixed-window rate limiting per client and route.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::config::ThrottleConfig;
use crate::observability::metrics;
use crate::security::error::{AdmissionError, RequestContext};
use crate::security::identity::ClientIdentity;
use crate::security::store::{CounterStore, Hit, ThrottleKey};
use crate::security::AdmissionState;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Request budget for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u64,
    pub ttl: Duration,
}

/// What to do with requests to one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePolicy {
    Skip,
    Apply(Quota),
}

/// Live throttling settings, derived from [`ThrottleConfig`].
#[derive(Debug, Clone)]
pub struct ThrottleSettings {
    pub enabled: bool,
    pub global: Quota,
    pub trust_forwarded_for: bool,
    pub store_timeout: Duration,
    routes: HashMap<String, RoutePolicy>,
}

impl ThrottleSettings {
    pub fn from_config(config: &ThrottleConfig) -> Self {
        let global = Quota {
            limit: config.limit,
            ttl: Duration::from_millis(config.ttl_ms),
        };
        let routes = config
            .routes
            .iter()
            .map(|route| {
                let policy = if route.skip {
                    RoutePolicy::Skip
                } else {
                    RoutePolicy::Apply(Quota {
                        limit: route.limit.unwrap_or(global.limit),
                        ttl: route.ttl_ms.map(Duration::from_millis).unwrap_or(global.ttl),
                    })
                };
                (route.path.clone(), policy)
            })
            .collect();

        Self {
            enabled: config.enabled,
            global,
            trust_forwarded_for: config.trust_forwarded_for,
            store_timeout: Duration::from_millis(config.store_timeout_ms),
            routes,
        }
    }

    /// Skip beats a route override, which beats the global quota.
    pub fn policy_for(&self, route: Option<&str>) -> RoutePolicy {
        if !self.enabled {
            return RoutePolicy::Skip;
        }
        route
            .and_then(|r| self.routes.get(r).copied())
            .unwrap_or(RoutePolicy::Apply(self.global))
    }
}

/// Quota state reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    /// Whole seconds until the window resets, in `[1, ceil(ttl)]`.
    pub reset_after_secs: u64,
}

impl RateLimitInfo {
    pub fn from_hit(hit: Hit, quota: Quota) -> Self {
        let max_secs = ceil_secs(quota.ttl).max(1);
        Self {
            limit: quota.limit,
            remaining: quota.limit.saturating_sub(hit.count),
            reset_after_secs: ceil_secs(hit.resets_in).clamp(1, max_secs),
        }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_after_secs));
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    millis.div_ceil(1000)
}

/// Outcome of a throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Route is not throttled.
    Skipped,
    Admitted(RateLimitInfo),
    Rejected(RateLimitInfo),
    /// Store failed or timed out; the request is let through.
    StoreUnavailable,
}

/// Rate limiter over a pluggable counter store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Count one request from `identity` against `route` and decide.
    pub async fn check(
        &self,
        settings: &ThrottleSettings,
        identity: &ClientIdentity,
        route: Option<&str>,
    ) -> ThrottleDecision {
        let quota = match settings.policy_for(route) {
            RoutePolicy::Skip => return ThrottleDecision::Skipped,
            RoutePolicy::Apply(quota) => quota,
        };

        let key = ThrottleKey::new(identity.clone(), route);
        let hit = match tokio::time::timeout(settings.store_timeout, self.store.hit(&key, quota.ttl)).await {
            Ok(Ok(hit)) => hit,
            Ok(Err(e)) => {
                tracing::warn!(client = %identity, error = %e, "Counter store failed, admitting request");
                metrics::record_store_error();
                return ThrottleDecision::StoreUnavailable;
            }
            Err(_) => {
                tracing::warn!(
                    client = %identity,
                    timeout_ms = settings.store_timeout.as_millis() as u64,
                    "Counter store timed out, admitting request"
                );
                metrics::record_store_error();
                return ThrottleDecision::StoreUnavailable;
            }
        };

        let info = RateLimitInfo::from_hit(hit, quota);
        if hit.count > quota.limit {
            ThrottleDecision::Rejected(info)
        } else {
            ThrottleDecision::Admitted(info)
        }
    }
}

/// Middleware enforcing the per-client request rate.
pub async fn rate_limit_middleware(
    State(admission): State<AdmissionState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let settings = admission.settings();
    let identity = ClientIdentity::resolve(&request, settings.throttle.trust_forwarded_for);
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned());

    let decision = admission
        .limiter()
        .check(&settings.throttle, &identity, route.as_deref())
        .await;

    match decision {
        ThrottleDecision::Skipped | ThrottleDecision::StoreUnavailable => next.run(request).await,
        ThrottleDecision::Admitted(info) => {
            let mut response = next.run(request).await;
            info.apply(response.headers_mut());
            response
        }
        ThrottleDecision::Rejected(info) => {
            tracing::warn!(
                client = %identity,
                route = route.as_deref().unwrap_or("*"),
                limit = info.limit,
                retry_after = info.reset_after_secs,
                "Rate limit exceeded"
            );
            metrics::record_rejected("rate_limit");
            let context = RequestContext::from_request(&request);
            AdmissionError::TooManyRequests { info }.into_response_at(&context)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteThrottleConfig;
    use crate::security::store::{MemoryStore, StoreError};
    use async_trait::async_trait;

    fn settings(limit: u64, ttl_ms: u64) -> ThrottleSettings {
        ThrottleSettings::from_config(&ThrottleConfig {
            limit,
            ttl_ms,
            ..ThrottleConfig::default()
        })
    }

    fn client(ip: &str) -> ClientIdentity {
        ClientIdentity::from_ip(ip.parse().unwrap())
    }

    #[tokio::test]
    async fn admits_exactly_limit_requests() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));
        let settings = settings(3, 60_000);
        let me = client("10.0.0.1");

        for expected_remaining in [2, 1, 0] {
            match limiter.check(&settings, &me, Some("/api/ping")).await {
                ThrottleDecision::Admitted(info) => assert_eq!(info.remaining, expected_remaining),
                other => panic!("expected admission, got {other:?}"),
            }
        }

        match limiter.check(&settings, &me, Some("/api/ping")).await {
            ThrottleDecision::Rejected(info) => {
                assert_eq!(info.remaining, 0);
                assert!(info.reset_after_secs > 0 && info.reset_after_secs <= 60);
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        // Someone else still has a full budget.
        assert!(matches!(
            limiter.check(&settings, &client("10.0.0.2"), Some("/api/ping")).await,
            ThrottleDecision::Admitted(RateLimitInfo { remaining: 2, .. })
        ));
    }

    #[tokio::test]
    async fn window_reset_readmits() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));
        let settings = settings(1, 100);
        let me = client("10.0.0.1");

        assert!(matches!(limiter.check(&settings, &me, None).await, ThrottleDecision::Admitted(_)));
        assert!(matches!(limiter.check(&settings, &me, None).await, ThrottleDecision::Rejected(_)));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(matches!(limiter.check(&settings, &me, None).await, ThrottleDecision::Admitted(_)));
    }

    #[test]
    fn retry_after_is_bounded() {
        let quota = Quota { limit: 1, ttl: Duration::from_millis(60_000) };

        let fresh = RateLimitInfo::from_hit(Hit { count: 2, resets_in: Duration::from_millis(60_000) }, quota);
        assert_eq!(fresh.reset_after_secs, 60);

        let partial = RateLimitInfo::from_hit(Hit { count: 2, resets_in: Duration::from_millis(1_001) }, quota);
        assert_eq!(partial.reset_after_secs, 2);

        let elapsed = RateLimitInfo::from_hit(Hit { count: 2, resets_in: Duration::ZERO }, quota);
        assert_eq!(elapsed.reset_after_secs, 1);

        let sub_second = Quota { limit: 1, ttl: Duration::from_millis(250) };
        let short = RateLimitInfo::from_hit(Hit { count: 2, resets_in: Duration::from_millis(250) }, sub_second);
        assert_eq!(short.reset_after_secs, 1);
    }

    #[test]
    fn skip_beats_override_beats_global() {
        let config = ThrottleConfig {
            limit: 10,
            ttl_ms: 60_000,
            routes: vec![
                RouteThrottleConfig {
                    path: "/health".into(),
                    skip: true,
                    limit: Some(1),
                    ttl_ms: None,
                },
                RouteThrottleConfig {
                    path: "/api/echo".into(),
                    skip: false,
                    limit: Some(2),
                    ttl_ms: None,
                },
            ],
            ..ThrottleConfig::default()
        };
        let settings = ThrottleSettings::from_config(&config);

        assert_eq!(settings.policy_for(Some("/health")), RoutePolicy::Skip);
        assert_eq!(
            settings.policy_for(Some("/api/echo")),
            RoutePolicy::Apply(Quota { limit: 2, ttl: Duration::from_secs(60) })
        );
        assert_eq!(
            settings.policy_for(Some("/api/ping")),
            RoutePolicy::Apply(Quota { limit: 10, ttl: Duration::from_secs(60) })
        );
        assert_eq!(settings.policy_for(None), RoutePolicy::Apply(settings.global));
    }

    #[test]
    fn disabled_skips_everything() {
        let settings = ThrottleSettings::from_config(&ThrottleConfig {
            enabled: false,
            ..ThrottleConfig::default()
        });
        assert_eq!(settings.policy_for(Some("/api/ping")), RoutePolicy::Skip);
    }

    #[test]
    fn headers_are_numeric() {
        let mut headers = HeaderMap::new();
        RateLimitInfo { limit: 5, remaining: 4, reset_after_secs: 60 }.apply(&mut headers);
        assert_eq!(headers[X_RATELIMIT_LIMIT], "5");
        assert_eq!(headers[X_RATELIMIT_REMAINING], "4");
        assert_eq!(headers[X_RATELIMIT_RESET], "60");
    }

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn hit(&self, _: &ThrottleKey, _: Duration) -> Result<Hit, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn sweep(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
        async fn tracked_keys(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    struct SlowStore;

    #[async_trait]
    impl CounterStore for SlowStore {
        async fn hit(&self, _: &ThrottleKey, _: Duration) -> Result<Hit, StoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Hit { count: u64::MAX, resets_in: Duration::ZERO })
        }
        async fn sweep(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
        async fn tracked_keys(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn store_failure_fails_open() {
        let settings = settings(1, 60_000);
        let me = client("10.0.0.1");

        let broken = RateLimiter::new(Arc::new(BrokenStore));
        assert_eq!(broken.check(&settings, &me, None).await, ThrottleDecision::StoreUnavailable);

        let slow = RateLimiter::new(Arc::new(SlowStore));
        assert_eq!(slow.check(&settings, &me, None).await, ThrottleDecision::StoreUnavailable);
    }
}
