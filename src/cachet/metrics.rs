//! prometheus meters for the cachet client

use prometheus::{
    exponential_buckets, histogram_opts, opts, register_histogram_vec_with_registry,
    register_int_counter_vec_with_registry, HistogramTimer, HistogramVec, IntCounterVec, Registry,
};

#[derive(Debug, Clone)]
pub(super) struct ClientMetrics {
    /// total number of requests per api operation
    http_requests: IntCounterVec,
    /// requests that failed on the transport level or returned a non 2xx status
    http_requests_failed: IntCounterVec,
    http_request_duration: HistogramVec,
}

impl ClientMetrics {
    pub(super) fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let http_requests = register_int_counter_vec_with_registry!(
            opts!("http_requests_total", "total number of http requests to cachet")
                .namespace("cachet_relay")
                .subsystem("cachet"),
            &["operation"],
            registry
        )?;

        let http_requests_failed = register_int_counter_vec_with_registry!(
            opts!("http_requests_failed", "number of failed http requests to cachet")
                .namespace("cachet_relay")
                .subsystem("cachet"),
            &["operation", "status_code"],
            registry
        )?;

        let http_request_duration = register_histogram_vec_with_registry!(
            histogram_opts!(
                "http_request_duration_seconds",
                "total time of a http request to cachet in seconds",
                exponential_buckets(0.01, 2., 12)?
            )
            .namespace("cachet_relay")
            .subsystem("cachet"),
            &["operation"],
            registry
        )?;

        Ok(Self {
            http_requests,
            http_requests_failed,
            http_request_duration,
        })
    }

    /// counts the request and starts its duration timer, the duration is
    /// observed when the timer is dropped
    pub(super) fn record_request(&self, operation: &str) -> HistogramTimer {
        self.http_requests.with_label_values(&[operation]).inc();
        self.http_request_duration
            .with_label_values(&[operation])
            .start_timer()
    }

    /// `status_code` is empty for transport errors
    pub(super) fn record_failure(&self, operation: &str, status_code: &str) {
        self.http_requests_failed
            .with_label_values(&[operation, status_code])
            .inc();
    }
}
