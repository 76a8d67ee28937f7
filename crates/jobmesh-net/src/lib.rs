//! Per-source rate limiting, bounded retry and HTTP fetch utilities.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

pub const CRATE_NAME: &str = "jobmesh-net";

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_DAY: i64 = 86_400;

/// Per-source request budget across two fixed windows.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub requests_per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 10,
            requests_per_day: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct WindowCounters {
    minute_stamp: i64,
    minute_count: u32,
    day_stamp: i64,
    day_count: u32,
}

impl WindowCounters {
    /// Reset a window's consumed count when its fixed boundary rolls over.
    fn roll(&mut self, now: DateTime<Utc>) {
        let minute_stamp = now.timestamp().div_euclid(SECONDS_PER_MINUTE);
        let day_stamp = now.timestamp().div_euclid(SECONDS_PER_DAY);
        if minute_stamp != self.minute_stamp {
            self.minute_stamp = minute_stamp;
            self.minute_count = 0;
        }
        if day_stamp != self.day_stamp {
            self.day_stamp = day_stamp;
            self.day_count = 0;
        }
    }

    fn permitted(&self, config: &RateLimitConfig) -> bool {
        self.minute_count < config.requests_per_minute && self.day_count < config.requests_per_day
    }

    fn consume(&mut self) {
        self.minute_count = self.minute_count.saturating_add(1);
        self.day_count = self.day_count.saturating_add(1);
    }
}

/// Shared mutable request counters for one source, optionally scoped by an
/// actor id for multi-tenant fairness.
///
/// Checks and increments are synchronous and in-memory; a denied check is a
/// fail-fast rejection and is never retried. `try_acquire` performs the
/// check-then-increment sequence under one lock so concurrent callers cannot
/// over-admit past the budget.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<HashMap<String, WindowCounters>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Whether a new call is currently permitted. Does not consume budget.
    pub fn check_limit(&self, actor: Option<&str>) -> bool {
        self.check_limit_at(actor, Utc::now())
    }

    pub fn check_limit_at(&self, actor: Option<&str>, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let counters = state.entry(bucket_key(actor)).or_default();
        counters.roll(now);
        counters.permitted(&self.config)
    }

    /// Record that a call was made, advancing both window counters.
    pub fn increment_counter(&self, actor: Option<&str>) {
        self.increment_counter_at(actor, Utc::now());
    }

    pub fn increment_counter_at(&self, actor: Option<&str>, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let counters = state.entry(bucket_key(actor)).or_default();
        counters.roll(now);
        counters.consume();
    }

    /// Atomic check-then-increment. Returns false without consuming budget
    /// when the call is not permitted.
    pub fn try_acquire(&self, actor: Option<&str>) -> bool {
        self.try_acquire_at(actor, Utc::now())
    }

    pub fn try_acquire_at(&self, actor: Option<&str>, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let counters = state.entry(bucket_key(actor)).or_default();
        counters.roll(now);
        if !counters.permitted(&self.config) {
            return false;
        }
        counters.consume();
        true
    }
}

fn bucket_key(actor: Option<&str>) -> String {
    actor.unwrap_or_default().to_string()
}

/// Bounded exponential backoff for a single fallible async operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay slept after the failure at `attempt_index` (0-based).
    /// Exponential and capped, so the curve is monotonically non-decreasing.
    pub fn delay_for_attempt(&self, attempt_index: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt_index).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }

    /// Run `op` up to `max_attempts` times, sleeping the backoff delay
    /// between attempts. The last failure propagates unchanged.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(err);
                    }
                    let delay = self.delay_for_attempt(attempt - 1);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

/// Thin reqwest wrapper with a fixed per-request timeout. A timed-out call
/// surfaces as a `Request` error and is subject to the caller's retry cap.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        self.get_json_with_params(url, &[]).await
    }

    pub async fn get_json_with_params<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let resp = self.client.get(url).query(params).send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }
        Ok(resp.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, s).single().unwrap()
    }

    #[test]
    fn minute_budget_denies_third_call() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_minute: 2,
            requests_per_day: 1000,
        });
        let now = at(12, 0, 0);
        let mut observed = Vec::new();
        for _ in 0..3 {
            let permitted = limiter.check_limit_at(None, now);
            observed.push(permitted);
            if permitted {
                limiter.increment_counter_at(None, now);
            }
        }
        assert_eq!(observed, vec![true, true, false]);
    }

    #[test]
    fn minute_window_resets_at_boundary_rollover() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_minute: 1,
            requests_per_day: 1000,
        });
        assert!(limiter.try_acquire_at(None, at(12, 0, 30)));
        assert!(!limiter.try_acquire_at(None, at(12, 0, 59)));
        assert!(limiter.try_acquire_at(None, at(12, 1, 0)));
    }

    #[test]
    fn day_budget_holds_across_minutes() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_minute: 10,
            requests_per_day: 2,
        });
        assert!(limiter.try_acquire_at(None, at(12, 0, 0)));
        assert!(limiter.try_acquire_at(None, at(12, 5, 0)));
        assert!(!limiter.try_acquire_at(None, at(13, 0, 0)));
    }

    #[test]
    fn actors_have_independent_buckets() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_minute: 1,
            requests_per_day: 1000,
        });
        let now = at(12, 0, 0);
        assert!(limiter.try_acquire_at(Some("user-a"), now));
        assert!(!limiter.try_acquire_at(Some("user-a"), now));
        assert!(limiter.try_acquire_at(Some("user-b"), now));
    }

    #[test]
    fn denied_check_does_not_consume_budget() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_minute: 1,
            requests_per_day: 1,
        });
        let now = at(12, 0, 0);
        assert!(limiter.try_acquire_at(None, now));
        assert!(!limiter.try_acquire_at(None, now));
        // A failed acquire in the old minute must not have eaten the day
        // budget; the next minute is still denied by the day window.
        assert!(!limiter.try_acquire_at(None, at(12, 1, 0)));
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn retry_returns_success_after_transient_failures() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_propagates_final_error_after_attempt_cap() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("boom {n}")) }
            })
            .await;
        assert_eq!(result, Err("boom 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
