//! HTTP request metrics.
//!
//! Counters and latency histograms recorded through the `metrics` facade;
//! the binary installs a Prometheus recorder whose handle renders the
//! `/metrics` exposition.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Initialize metric descriptions (call once at startup).
pub fn init_metrics() {
    describe_gauge!("nebulafs_up", "1 if the server is up");
    describe_counter!("nebulafs_http_requests_total", "Total HTTP requests processed");
    describe_histogram!(
        "nebulafs_http_request_duration_seconds",
        "HTTP request latency in seconds"
    );
    gauge!("nebulafs_up").set(1.0);
}

/// Record a completed request.
pub fn record_request(status_code: u16, duration: Duration) {
    counter!("nebulafs_http_requests_total", "status" => status_class(status_code)).increment(1);
    histogram!("nebulafs_http_request_duration_seconds", "status" => status_class(status_code))
        .record(duration.as_secs_f64());
}

/// Convert a status code to its class label.
fn status_class(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_class() {
        assert_eq!(status_class(200), "2xx");
        assert_eq!(status_class(206), "2xx");
        assert_eq!(status_class(404), "4xx");
        assert_eq!(status_class(500), "5xx");
        assert_eq!(status_class(100), "other");
    }
}
