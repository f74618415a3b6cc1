use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Where the fitted model bundle lives
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Offline training pipeline configuration
    #[serde(default)]
    pub training: TrainingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: CRIME_SEV__)
            .add_source(
                config::Environment::with_prefix("CRIME_SEV")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Directory holding model.bin and model_meta.json
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of synthetic samples to generate
    #[serde(default = "default_n_samples")]
    pub n_samples: usize,

    /// Seed shared by data synthesis, splitting and the candidates
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Share of samples held out for the final evaluation
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Number of cross-validation folds
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_samples: default_n_samples(),
            seed: default_seed(),
            test_size: default_test_size(),
            cv_folds: default_cv_folds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("./artifacts")
}

fn default_n_samples() -> usize {
    5000
}

fn default_seed() -> u64 {
    42
}

fn default_test_size() -> f64 {
    0.2
}

fn default_cv_folds() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "crime-severity".to_string()
}

fn default_true() -> bool {
    true
}
