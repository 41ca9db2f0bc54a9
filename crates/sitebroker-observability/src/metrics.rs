//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for request dispatch:
//! - Request counts (total and failed, by tenant, service and method)
//! - Retry counts
//! - Latency histogram per tenant and service
//! - Per-tenant limiter occupancy (in-flight and queued)

use prometheus::{CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector for the request dispatcher
#[derive(Clone)]
pub struct DispatchMetrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Logical calls dispatched
    pub requests_total: CounterVec,
    /// Logical calls that ended in failure
    pub requests_failed: CounterVec,
    /// Retry attempts scheduled
    pub retries_total: CounterVec,
    /// End-to-end call duration, including queueing and backoff
    pub request_duration_seconds: HistogramVec,
    /// Calls currently holding a limiter slot
    pub inflight: GaugeVec,
    /// Calls currently waiting for a limiter slot
    pub queued: GaugeVec,
}

impl DispatchMetrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("sitebroker_requests_total", "Total number of dispatched calls"),
            &["tenant", "service", "method"],
        )?;

        let requests_failed = CounterVec::new(
            Opts::new(
                "sitebroker_requests_failed_total",
                "Total number of calls that failed after all attempts",
            ),
            &["tenant", "service", "method", "kind"],
        )?;

        let retries_total = CounterVec::new(
            Opts::new("sitebroker_retries_total", "Total number of retries scheduled"),
            &["tenant", "service", "method"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "sitebroker_request_duration_seconds",
                "Call duration in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["tenant", "service"],
        )?;

        let inflight = GaugeVec::new(
            Opts::new("sitebroker_inflight", "Calls holding a concurrency slot"),
            &["tenant"],
        )?;

        let queued = GaugeVec::new(
            Opts::new("sitebroker_queued", "Calls waiting for a concurrency slot"),
            &["tenant"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(requests_failed.clone()))?;
        registry.register(Box::new(retries_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(inflight.clone()))?;
        registry.register(Box::new(queued.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            requests_failed,
            retries_total,
            request_duration_seconds,
            inflight,
            queued,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a call that returned successfully
    pub fn record_success(&self, tenant: &str, service: &str, method: &str, duration_secs: f64) {
        self.requests_total
            .with_label_values(&[tenant, service, method])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[tenant, service])
            .observe(duration_secs);
    }

    /// Record a call that surfaced an error to its caller
    pub fn record_failure(
        &self,
        tenant: &str,
        service: &str,
        method: &str,
        kind: &str,
        duration_secs: f64,
    ) {
        self.requests_total
            .with_label_values(&[tenant, service, method])
            .inc();
        self.requests_failed
            .with_label_values(&[tenant, service, method, kind])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[tenant, service])
            .observe(duration_secs);
    }

    pub fn record_retry(&self, tenant: &str, service: &str, method: &str) {
        self.retries_total
            .with_label_values(&[tenant, service, method])
            .inc();
    }

    /// Publish the limiter occupancy for one tenant
    pub fn set_limiter_state(&self, tenant: &str, running: usize, waiting: usize) {
        self.inflight.with_label_values(&[tenant]).set(running as f64);
        self.queued.with_label_values(&[tenant]).set(waiting as f64);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn gather_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
