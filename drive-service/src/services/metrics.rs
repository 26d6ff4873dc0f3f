use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub drive_items_total: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Process-wide registry, created on first use.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let drive_items_total = IntCounterVec::new(
            Opts::new(
                "drive_items_total",
                "Drive items handled by fetch, by outcome",
            ),
            &["outcome"],
        )
        .expect("metric can be created");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("collector can be registered");
        registry
            .register(Box::new(drive_items_total.clone()))
            .expect("collector can be registered");

        Metrics {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            drive_items_total,
        }
    })
}

/// Count one traversal outcome: `downloaded`, `exported` or `skipped`.
pub fn record_item(outcome: &str) {
    metrics()
        .drive_items_total
        .with_label_values(&[outcome])
        .inc();
}

pub fn record_request(method: &str, path: &str, status: &str, seconds: f64) {
    let m = metrics();
    let labels = [method, path, status];
    m.http_requests_total.with_label_values(&labels).inc();
    m.http_request_duration_seconds
        .with_label_values(&labels)
        .observe(seconds);
}

pub fn get_metrics() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = metrics().registry.gather();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_items_show_up_in_exposition() {
        record_item("exported");
        record_request("POST", "/fetch", "200", 0.25);

        let text = get_metrics().unwrap();
        assert!(text.contains("drive_items_total{outcome=\"exported\"}"));
        assert!(text.contains("http_requests_total"));
        assert!(text.contains("http_request_duration_seconds_bucket"));
    }
}
