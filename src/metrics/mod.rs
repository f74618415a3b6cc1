/// Prometheus metrics for the severity service.
///
/// HTTP traffic is recorded by the [`track_metrics`] middleware; predictions
/// are recorded by the prediction service. Everything is exported in text
/// format through [`gather_metrics`].

mod middleware;

pub use middleware::track_metrics;

use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::atomic::{AtomicBool, Ordering};

const NAMESPACE: &str = "crime_severity";

static INITIALIZED: AtomicBool = AtomicBool::new(false);

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Total number of HTTP requests received
    ///
    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// HTTP request duration in seconds
    ///
    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    /// Number of in-flight HTTP requests
    pub static ref HTTP_CONNECTIONS_ACTIVE: Gauge = Gauge::with_opts(
        Opts::new("http_connections_active", "Number of in-flight HTTP requests")
            .namespace(NAMESPACE)
    ).expect("Failed to create HTTP_CONNECTIONS_ACTIVE metric");

    /// Predictions served
    ///
    /// Labels: severity, model
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of severity predictions")
            .namespace(NAMESPACE),
        &["severity", "model"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Time spent encoding and scoring one report
    pub static ref PREDICTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Prediction latency in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5]),
        &["model"]
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    /// Rejected reports and failed predictions
    ///
    /// Labels: error_code
    pub static ref PREDICTION_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("prediction_errors_total", "Total number of failed predictions")
            .namespace(NAMESPACE),
        &["error_code"]
    ).expect("Failed to create PREDICTION_ERRORS_TOTAL metric");

    /// Test accuracy of the loaded model
    ///
    /// Labels: model
    pub static ref MODEL_TEST_ACCURACY: GaugeVec = GaugeVec::new(
        Opts::new("model_test_accuracy", "Held-out accuracy of the loaded model")
            .namespace(NAMESPACE),
        &["model"]
    ).expect("Failed to create MODEL_TEST_ACCURACY metric");

    /// Application build info
    ///
    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Application build information")
            .namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_CONNECTIONS_ACTIVE.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(PREDICTIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTION_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTION_ERRORS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MODEL_TEST_ACCURACY.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(BUILD_INFO.clone()))?;
    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Record one served prediction
pub fn record_prediction(severity: &str, model: &str, duration_secs: f64) {
    PREDICTIONS_TOTAL
        .with_label_values(&[severity, model])
        .inc();
    PREDICTION_DURATION_SECONDS
        .with_label_values(&[model])
        .observe(duration_secs);
}

pub fn record_prediction_error(error_code: &str) {
    PREDICTION_ERRORS_TOTAL
        .with_label_values(&[error_code])
        .inc();
}

/// Generate Prometheus text format metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_record_prediction() {
        init_metrics().unwrap();
        record_prediction("HIGH", "Random Forest", 0.002);

        let value = PREDICTIONS_TOTAL
            .with_label_values(&["HIGH", "Random Forest"])
            .get();
        assert!(value >= 1.0);

        let output = gather_metrics();
        assert!(output.contains("crime_severity_predictions_total"));
        assert!(output.contains("crime_severity_build_info"));
    }
}
