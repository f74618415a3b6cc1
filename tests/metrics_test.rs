//! Prometheus exposition through the `/metrics` endpoint

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use crime_severity::metrics;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_metrics_endpoint_reports_traffic_and_predictions() {
    metrics::init_metrics().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let app = common::trained_router(dir.path());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/predict")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "crime_type": "Fraud",
                        "location": "Commercial Zone",
                        "description": "Fake invoices were sent to several shops"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let output = String::from_utf8(bytes.to_vec()).unwrap();
    let families = common::parse_prometheus_output(&output);

    let requests = &families["crime_severity_http_requests_total"];
    assert!(requests
        .iter()
        .any(|l| l.contains("path=\"/predict\"") && l.contains("status_code=\"200\"")));
    // The exporter does not count its own scrapes
    assert!(!requests.iter().any(|l| l.contains("path=\"/metrics\"")));

    let predictions: f64 = families["crime_severity_predictions_total"]
        .iter()
        .filter(|l| !l.starts_with('#'))
        .filter_map(|l| common::extract_metric_value(l))
        .sum();
    assert!(predictions >= 1.0);

    assert!(families.contains_key("crime_severity_prediction_duration_seconds"));
    assert!(families.contains_key("crime_severity_model_test_accuracy"));
}
