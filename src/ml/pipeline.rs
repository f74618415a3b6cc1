use crate::config::TrainingConfig;
use crate::error::Result;
use crate::ml::artifacts::{ArtifactBundle, Artifacts, ModelMeta};
use crate::ml::classifier::{CandidateParams, Classifier, SeverityModel};
use crate::ml::features::{
    rows_to_matrix, FeatureEncoder, LabelEncoder, StandardScaler, FEATURE_COLUMNS,
};
use crate::ml::models::{CvResult, ModelMetrics, ModelType};
use crate::ml::selection::{stratified_split, train_and_select, StratifiedKFold};
use crate::ml::synthetic::{generate_dataset, label_distribution};
use crate::models::SeverityLabel;
use chrono::Utc;
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Summary of a completed training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_type: ModelType,
    pub test_accuracy: f64,
    pub cv_results: Vec<CvResult>,
    pub test_metrics: ModelMetrics,
    pub label_distribution: BTreeMap<SeverityLabel, usize>,
    pub n_training_samples: usize,
    pub n_test_samples: usize,
    pub artifacts_dir: PathBuf,
    pub duration_secs: f64,
}

/// Offline training: synthesize data, select a model and persist it
pub struct TrainingPipeline {
    config: TrainingConfig,
    artifacts_dir: PathBuf,
    candidate_params: CandidateParams,
    candidates: Vec<ModelType>,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig, artifacts_dir: impl Into<PathBuf>) -> Self {
        let candidate_params = CandidateParams {
            seed: config.seed,
            ..Default::default()
        };
        Self {
            config,
            artifacts_dir: artifacts_dir.into(),
            candidate_params,
            candidates: ModelType::CANDIDATES.to_vec(),
        }
    }

    /// Override candidate hyperparameters
    pub fn with_candidate_params(mut self, params: CandidateParams) -> Self {
        self.candidate_params = params;
        self
    }

    /// Restrict the candidate families, in the given order
    pub fn with_candidates(mut self, candidates: Vec<ModelType>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Run all stages and write the artifacts
    pub fn run(&self) -> Result<TrainingReport> {
        let started = Instant::now();

        info!(
            n_samples = self.config.n_samples,
            seed = self.config.seed,
            "Generating synthetic crime dataset"
        );
        let records = generate_dataset(self.config.n_samples, self.config.seed);
        let distribution = label_distribution(&records);
        info!(
            rows = records.len(),
            columns = FEATURE_COLUMNS.len(),
            distribution = ?distribution,
            "Dataset generated"
        );

        // Encoders
        let encoder = FeatureEncoder {
            crime_encoder: LabelEncoder::fit(records.iter().map(|r| r.crime_type.to_string())),
            location_encoder: LabelEncoder::fit(records.iter().map(|r| r.location.to_string())),
        };
        let label_encoder = LabelEncoder::fit(SeverityLabel::names());

        // Feature matrix and labels
        let rows = records
            .iter()
            .map(|r| encoder.encode(r.crime_type, r.location, &r.flags))
            .collect::<Result<Vec<_>>>()?;
        let x = rows_to_matrix(&rows)?;
        let y = records
            .iter()
            .map(|r| label_encoder.transform(&r.severity_label.to_string()))
            .collect::<Result<Vec<_>>>()?;

        let (train_idx, test_idx) =
            stratified_split(&y, self.config.test_size, self.config.seed)?;
        let x_train_raw = x.select(Axis(0), &train_idx);
        let x_test_raw = x.select(Axis(0), &test_idx);
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
        let y_test: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();
        info!(
            train = y_train.len(),
            test = y_test.len(),
            "Stratified train/test split"
        );

        let (scaler, x_train) = StandardScaler::fit_transform(&x_train_raw)?;
        let x_test = scaler.transform(&x_test_raw)?;

        let n_classes = label_encoder.n_classes();
        let candidates = self
            .candidates
            .iter()
            .map(|&t| SeverityModel::candidate(t, n_classes, &self.candidate_params))
            .collect();
        let kfold = StratifiedKFold::new(self.config.cv_folds, self.config.seed);
        let selection = train_and_select(candidates, &x_train, &y_train, &kfold)?;

        let predictions = selection.model.predict(&x_test)?;
        let test_metrics = ModelMetrics::calculate(&y_test, &predictions, label_encoder.classes());
        let model_type = selection.model.model_type();
        info!(
            model = %model_type,
            test_accuracy = test_metrics.accuracy,
            "Test accuracy: {:.4}",
            test_metrics.accuracy
        );
        info!("Classification report:\n{}", test_metrics.report());

        let artifacts = Artifacts {
            bundle: ArtifactBundle {
                model: selection.model,
                scaler,
                crime_encoder: encoder.crime_encoder,
                location_encoder: encoder.location_encoder,
                label_encoder,
            },
            meta: ModelMeta {
                name: model_type.to_string(),
                model_type,
                test_accuracy: test_metrics.accuracy,
                feature_cols: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
                cv_results: selection.cv_results.clone(),
                trained_at: Utc::now(),
                n_training_samples: y_train.len(),
            },
        };
        artifacts.save(&self.artifacts_dir)?;

        let duration_secs = started.elapsed().as_secs_f64();
        info!(duration_secs, "Training pipeline complete");

        Ok(TrainingReport {
            model_type,
            test_accuracy: test_metrics.accuracy,
            cv_results: selection.cv_results,
            test_metrics,
            label_distribution: distribution,
            n_training_samples: y_train.len(),
            n_test_samples: y_test.len(),
            artifacts_dir: self.artifacts_dir.clone(),
            duration_secs,
        })
    }
}
