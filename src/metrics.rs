//! Prometheus metrics for purge requests and jobs

use crate::response::PurgeResponse;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramOpts, HistogramVec, Opts,
    Registry,
};
use std::sync::Arc;

const DURATION_BUCKETS: [f64; 11] = [0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Metrics for purge operations
#[derive(Clone)]
pub struct PurgeMetrics {
    /// Purge operations started, by purge type
    pub purge_requests_total: Arc<CounterVec>,

    /// API call outcomes by purge type and result (success/error/exception)
    pub purge_results_total: Arc<CounterVec>,

    /// Values sent to the purge API, by purge type
    pub purge_items_total: Arc<CounterVec>,

    /// Duration of purge operations across all their chunks
    pub purge_duration_seconds: Arc<HistogramVec>,

    /// Finished jobs by implementation and final status
    pub purge_jobs_total: Arc<CounterVec>,
}

impl PurgeMetrics {
    /// Create metrics registered with the default registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let purge_requests_total = register_counter_vec!(
            "edge_purge_requests_total",
            "Total number of purge operations",
            &["purge_type"]
        )?;

        let purge_results_total = register_counter_vec!(
            "edge_purge_results_total",
            "Total number of purge API calls by outcome",
            &["purge_type", "result"]
        )?;

        let purge_items_total = register_counter_vec!(
            "edge_purge_items_total",
            "Total number of values sent for purging",
            &["purge_type"]
        )?;

        let purge_duration_seconds = register_histogram_vec!(
            "edge_purge_duration_seconds",
            "Duration of purge operations in seconds",
            &["purge_type"],
            DURATION_BUCKETS.to_vec()
        )?;

        let purge_jobs_total = register_counter_vec!(
            "edge_purge_jobs_total",
            "Total number of finished purge jobs",
            &["implementation", "status"]
        )?;

        Ok(Self {
            purge_requests_total: Arc::new(purge_requests_total),
            purge_results_total: Arc::new(purge_results_total),
            purge_items_total: Arc::new(purge_items_total),
            purge_duration_seconds: Arc::new(purge_duration_seconds),
            purge_jobs_total: Arc::new(purge_jobs_total),
        })
    }

    /// Create metrics with custom registry
    pub fn with_registry(registry: &Registry) -> Result<Self, prometheus::Error> {
        let purge_requests_total = CounterVec::new(
            Opts::new("edge_purge_requests_total", "Total number of purge operations"),
            &["purge_type"],
        )?;
        registry.register(Box::new(purge_requests_total.clone()))?;

        let purge_results_total = CounterVec::new(
            Opts::new(
                "edge_purge_results_total",
                "Total number of purge API calls by outcome",
            ),
            &["purge_type", "result"],
        )?;
        registry.register(Box::new(purge_results_total.clone()))?;

        let purge_items_total = CounterVec::new(
            Opts::new(
                "edge_purge_items_total",
                "Total number of values sent for purging",
            ),
            &["purge_type"],
        )?;
        registry.register(Box::new(purge_items_total.clone()))?;

        let purge_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "edge_purge_duration_seconds",
                "Duration of purge operations in seconds",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["purge_type"],
        )?;
        registry.register(Box::new(purge_duration_seconds.clone()))?;

        let purge_jobs_total = CounterVec::new(
            Opts::new("edge_purge_jobs_total", "Total number of finished purge jobs"),
            &["implementation", "status"],
        )?;
        registry.register(Box::new(purge_jobs_total.clone()))?;

        Ok(Self {
            purge_requests_total: Arc::new(purge_requests_total),
            purge_results_total: Arc::new(purge_results_total),
            purge_items_total: Arc::new(purge_items_total),
            purge_duration_seconds: Arc::new(purge_duration_seconds),
            purge_jobs_total: Arc::new(purge_jobs_total),
        })
    }

    /// Record a purge operation
    pub fn record_request(&self, purge_type: &str, items: usize) {
        self.purge_requests_total
            .with_label_values(&[purge_type])
            .inc();
        self.purge_items_total
            .with_label_values(&[purge_type])
            .inc_by(items as f64);
    }

    /// Record the outcome of every call in a response
    pub fn record_response(&self, purge_type: &str, response: &PurgeResponse) {
        for result in response.results() {
            let outcome = if result.exception.is_some() {
                "exception"
            } else if result.success {
                "success"
            } else {
                "error"
            };
            self.purge_results_total
                .with_label_values(&[purge_type, outcome])
                .inc();
        }
    }

    /// Record purge duration
    pub fn record_duration(&self, purge_type: &str, duration_secs: f64) {
        self.purge_duration_seconds
            .with_label_values(&[purge_type])
            .observe(duration_secs);
    }

    /// Record a finished job
    pub fn record_job(&self, implementation: &str, status: &str) {
        self.purge_jobs_total
            .with_label_values(&[implementation, status])
            .inc();
    }
}
