//! Shared helpers for integration tests

#![allow(dead_code)]

use crime_severity::api::{build_router, AppState};
use crime_severity::config::TrainingConfig;
use crime_severity::ml::{CandidateParams, ModelType, PredictionService, TrainingPipeline, TrainingReport};
use axum::Router;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Small, quick training configuration
pub fn small_training_config() -> TrainingConfig {
    TrainingConfig {
        n_samples: 800,
        seed: 42,
        test_size: 0.2,
        cv_folds: 3,
    }
}

/// Cheaper ensembles so the full candidate set trains in a few seconds
pub fn small_candidate_params() -> CandidateParams {
    CandidateParams {
        rf_trees: 20,
        rf_max_depth: 8,
        gb_stages: 15,
        gb_max_depth: 3,
        lr_max_iterations: 200,
        ..Default::default()
    }
}

/// Train into `dir` with the given candidates
pub fn train_into(dir: &Path, candidates: Vec<ModelType>) -> TrainingReport {
    TrainingPipeline::new(small_training_config(), dir)
        .with_candidate_params(small_candidate_params())
        .with_candidates(candidates)
        .run()
        .expect("training should succeed")
}

/// Router backed by a freshly trained logistic regression model
pub fn trained_router(dir: &Path) -> Router {
    train_into(dir, vec![ModelType::LogisticRegression]);
    let service = PredictionService::from_dir(dir).expect("artifacts should load");
    build_router(AppState::new(Arc::new(service)), Duration::from_secs(30))
}

/// Metric lines grouped by metric family name
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 {
                current_metric = parts[2].to_string();
                metrics
                    .entry(current_metric.clone())
                    .or_insert_with(Vec::new)
                    .push(line.to_string());
            }
        } else if !line.starts_with('#') && !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}

/// Value of a sample line such as `metric{a="1"} 42.5`
pub fn extract_metric_value(line: &str) -> Option<f64> {
    line.split_whitespace().last()?.parse::<f64>().ok()
}
