use super::{HTTP_CONNECTIONS_ACTIVE, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Scrapes of the exporter itself are not counted
const EXCLUDED_PATHS: [&str; 1] = ["/metrics"];

/// Axum middleware recording request count and latency per route.
///
/// Routes are labelled by their matched pattern so path parameters do not
/// blow up label cardinality.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    if EXCLUDED_PATHS.contains(&path.as_str()) {
        return next.run(req).await;
    }

    HTTP_CONNECTIONS_ACTIVE.inc();
    let start = Instant::now();
    let response = next.run(req).await;
    HTTP_CONNECTIONS_ACTIVE.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_metrics_middleware() {
        let app = Router::new()
            .route("/probe", get(|| async { "ok" }))
            .route_layer(middleware::from_fn(track_metrics));

        let response = app
            .oneshot(Request::builder().uri("/probe").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let value = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/probe", "200"])
            .get();
        assert!(value >= 1.0);
    }
}
