use crime_severity::{
    api::{build_router, AppState},
    config::Config,
    ml::PredictionService,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "crime_severity={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });

    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    init_tracing(&config);

    tracing::info!(
        service = %config.observability.service_name,
        "Starting Crime Severity Service v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = crime_severity::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Load the trained model bundle
    let service = match PredictionService::from_dir(&config.artifacts.dir) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!("{}", e);
            anyhow::bail!(
                "could not load model artifacts from {}: {}",
                config.artifacts.dir.display(),
                e
            );
        }
    };

    let app = build_router(
        AppState::new(service),
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Predict:      POST http://{}/predict", http_addr);
    tracing::info!("   Metrics:      http://{}/metrics", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}
