//! The single operation the dispatcher (C9) calls into: `complete`/
//! `complete_with_retry`. Composes the provider adapter, cache, circuit
//! breaker and config view behind one façade, per spec.md §4.7.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::cache::Cache;
use crate::config::ConfigHandle;
use crate::health::HealthState;
use crate::provider::{ChatMessage, ProviderClient, Timeouts};

/// Owns the provider connection's reliability state: health/circuit breaker
/// and response cache. One instance per daemon process.
pub struct LlmFacade {
    provider: Arc<dyn ProviderClient>,
    config: Arc<ConfigHandle>,
    health: Mutex<HealthState>,
    cache: Mutex<Cache>,
}

impl LlmFacade {
    pub fn new(provider: Arc<dyn ProviderClient>, config: Arc<ConfigHandle>) -> Self {
        Self {
            provider,
            config,
            health: Mutex::new(HealthState::new()),
            cache: Mutex::new(Cache::new()),
        }
    }

    pub fn config(&self) -> Arc<crate::config::ConfigView> {
        self.config.load()
    }

    pub fn reload_config(&self, new: crate::config::ConfigView) {
        self.config.store(new);
    }

    /// True when the last 10 recorded latencies average above the
    /// high-latency threshold; proactive requests short-circuit on this.
    pub fn is_high_latency(&self) -> bool {
        self.health.lock().unwrap().is_high_latency()
    }

    /// Seed a latency sample directly, bypassing an actual provider call.
    /// Only for driving the high-latency short-circuit in tests that live
    /// outside this crate and can't reach `HealthState` directly.
    #[cfg(feature = "test-support")]
    pub fn seed_latency_sample_for_test(&self, latency_ms: f64) {
        self.health.lock().unwrap().record_success(latency_ms);
    }

    /// One `complete` call: cache lookup, breaker gate, provider call,
    /// health/cache bookkeeping. Never returns an `Err` — every failure mode
    /// collapses to an empty string, per spec.md §4.7 steps 5/6.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        timeout: Timeouts,
        cache_key: Option<&[&str]>,
    ) -> String {
        if let Some(key) = cache_key {
            if let Some(hit) = self.cache.lock().unwrap().get(key) {
                return hit;
            }
        }

        if !self.health.lock().unwrap().should_allow_request() {
            tracing::debug!("circuit open — skipping provider call");
            return String::new();
        }

        let config = self.config.load();
        let started = Instant::now();
        let result = self.provider.call(messages, model, timeout, &config).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(text) => {
                self.health.lock().unwrap().record_success(elapsed_ms);
                if let Some(key) = cache_key {
                    if !text.is_empty() {
                        self.cache.lock().unwrap().set(key, text.clone());
                    }
                }
                text
            }
            Err(err) => {
                self.health.lock().unwrap().record_failure();
                tracing::debug!(error = %err, "provider call failed");
                String::new()
            }
        }
    }

    /// Re-invokes `complete` up to `retries` additional times with a fixed
    /// delay between attempts, returning the first non-empty result. The
    /// cache is never consulted by this path (only `nl`/`history_search` use
    /// it, and neither is cached — see spec.md §4.4).
    pub async fn complete_with_retry(
        &self,
        messages: &[ChatMessage],
        model: &str,
        timeout: Timeouts,
        retries: u32,
        delay: Duration,
    ) -> String {
        let mut attempt = 0;
        loop {
            let result = self.complete(messages, model, timeout, None).await;
            if !result.is_empty() || attempt >= retries {
                return result;
            }
            attempt += 1;
            tracing::debug!(attempt, "retrying provider call after empty result");
            tokio::time::sleep(delay).await;
        }
    }
}
