use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::types::ProviderId;

/// Most recent remote latencies kept for the average and percentiles
pub const LATENCY_WINDOW: usize = 1024;

/// Global metrics collector for the application.
///
/// Tracks synthesis requests, remote provider calls, fallbacks and local
/// compositing. Thread-safe and can be shared across the application.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Orchestrator
    synthesis_requests: AtomicUsize,
    synthesis_succeeded: AtomicUsize,
    validation_failures: AtomicUsize,
    fallbacks: AtomicUsize,

    // Remote providers
    remote_calls_total: AtomicUsize,
    remote_calls_success: AtomicUsize,
    remote_calls_failed: AtomicUsize,
    remote_latency_ms: RwLock<VecDeque<u64>>,

    // Local compositing
    local_merges: AtomicUsize,
    degraded_merges: AtomicUsize,

    // Per-provider request counters
    provider_counters: DashMap<ProviderId, AtomicUsize>,

    circuit_breaker_trips: AtomicUsize,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                synthesis_requests: AtomicUsize::new(0),
                synthesis_succeeded: AtomicUsize::new(0),
                validation_failures: AtomicUsize::new(0),
                fallbacks: AtomicUsize::new(0),
                remote_calls_total: AtomicUsize::new(0),
                remote_calls_success: AtomicUsize::new(0),
                remote_calls_failed: AtomicUsize::new(0),
                remote_latency_ms: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
                local_merges: AtomicUsize::new(0),
                degraded_merges: AtomicUsize::new(0),
                provider_counters: DashMap::new(),
                circuit_breaker_trips: AtomicUsize::new(0),
                start_time: Instant::now(),
            }),
        }
    }

    // Orchestrator
    pub fn record_synthesis_request(&self, provider: ProviderId) {
        self.inner.synthesis_requests.fetch_add(1, Ordering::Relaxed);
        self.inner
            .provider_counters
            .entry(provider)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_synthesis_succeeded(&self) {
        self.inner.synthesis_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation_failure(&self) {
        self.inner.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.inner.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    // Remote providers
    pub fn record_remote_call(&self, success: bool, duration: Duration) {
        self.inner.remote_calls_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.remote_calls_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.remote_calls_failed.fetch_add(1, Ordering::Relaxed);
        }

        let mut latency = self.inner.remote_latency_ms.write();
        if latency.len() == LATENCY_WINDOW {
            latency.pop_front();
        }
        latency.push_back(duration.as_millis() as u64);
    }

    // Local compositing
    pub fn record_local_merge(&self, degraded: bool) {
        self.inner.local_merges.fetch_add(1, Ordering::Relaxed);
        if degraded {
            self.inner.degraded_merges.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_circuit_breaker_trip(&self) {
        self.inner.circuit_breaker_trips.fetch_add(1, Ordering::Relaxed);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency: Vec<u64> = self.inner.remote_latency_ms.read().iter().copied().collect();
        let remote_latency_avg_ms = avg(&latency);
        let remote_latency_p50_ms = percentile(&latency, 0.5);
        let remote_latency_p95_ms = percentile(&latency, 0.95);

        let requests_by_provider = self
            .inner
            .provider_counters
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            synthesis_requests: self.inner.synthesis_requests.load(Ordering::Relaxed),
            synthesis_succeeded: self.inner.synthesis_succeeded.load(Ordering::Relaxed),
            validation_failures: self.inner.validation_failures.load(Ordering::Relaxed),
            fallbacks: self.inner.fallbacks.load(Ordering::Relaxed),
            remote_calls_total: self.inner.remote_calls_total.load(Ordering::Relaxed),
            remote_calls_success: self.inner.remote_calls_success.load(Ordering::Relaxed),
            remote_calls_failed: self.inner.remote_calls_failed.load(Ordering::Relaxed),
            remote_latency_avg_ms,
            remote_latency_p50_ms,
            remote_latency_p95_ms,
            local_merges: self.inner.local_merges.load(Ordering::Relaxed),
            degraded_merges: self.inner.degraded_merges.load(Ordering::Relaxed),
            circuit_breaker_trips: self.inner.circuit_breaker_trips.load(Ordering::Relaxed),
            requests_by_provider,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!(
            r#"# HELP synthesis_requests_total Total number of synthesis requests
# TYPE synthesis_requests_total counter
synthesis_requests_total {{}} {}

# HELP synthesis_succeeded_total Requests that ended with a result
# TYPE synthesis_succeeded_total counter
synthesis_succeeded_total {{}} {}

# HELP validation_failures_total Requests rejected before any provider call
# TYPE validation_failures_total counter
validation_failures_total {{}} {}

# HELP fallbacks_total Remote failures recovered by local compositing
# TYPE fallbacks_total counter
fallbacks_total {{}} {}

# HELP remote_calls_total Total number of remote provider calls
# TYPE remote_calls_total counter
remote_calls_total {{}} {}

# HELP remote_calls_failed Number of failed remote provider calls
# TYPE remote_calls_failed counter
remote_calls_failed {{}} {}

# HELP remote_latency_avg_ms Average remote provider latency in milliseconds
# TYPE remote_latency_avg_ms gauge
remote_latency_avg_ms {{}} {}

# HELP local_merges_total Local compositing runs
# TYPE local_merges_total counter
local_merges_total {{}} {}

# HELP degraded_merges_total Local runs that returned one input unchanged
# TYPE degraded_merges_total counter
degraded_merges_total {{}} {}

# HELP circuit_breaker_trips_total Total circuit breaker trips
# TYPE circuit_breaker_trips_total counter
circuit_breaker_trips_total {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}

# HELP provider_requests_total Synthesis requests per selected provider
# TYPE provider_requests_total counter
"#,
            snapshot.synthesis_requests,
            snapshot.synthesis_succeeded,
            snapshot.validation_failures,
            snapshot.fallbacks,
            snapshot.remote_calls_total,
            snapshot.remote_calls_failed,
            snapshot.remote_latency_avg_ms,
            snapshot.local_merges,
            snapshot.degraded_merges,
            snapshot.circuit_breaker_trips,
            snapshot.uptime_seconds,
        );
        for (provider, count) in &snapshot.requests_by_provider {
            out.push_str(&format!(
                "provider_requests_total {{provider=\"{}\"}} {}\n",
                provider, count
            ));
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub synthesis_requests: usize,
    pub synthesis_succeeded: usize,
    pub validation_failures: usize,
    pub fallbacks: usize,
    pub remote_calls_total: usize,
    pub remote_calls_success: usize,
    pub remote_calls_failed: usize,
    pub remote_latency_avg_ms: u64,
    pub remote_latency_p50_ms: u64,
    pub remote_latency_p95_ms: u64,
    pub local_merges: usize,
    pub degraded_merges: usize,
    pub circuit_breaker_trips: usize,
    pub requests_by_provider: BTreeMap<String, usize>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}
