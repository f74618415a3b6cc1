use crate::error::{AppError, Result};
use crate::metrics;
use crate::ml::artifacts::{ArtifactBundle, Artifacts, ModelMeta};
use crate::ml::classifier::Classifier;
use crate::ml::features::{FeatureEncoder, N_FEATURES};
use crate::ml::models::CvResult;
use crate::models::{
    CrimeReport, CrimeType, DescriptionFlags, HistoricalContext, Location, LocationContext,
    SeverityAssessment, SeverityLabel, SlaWindow,
};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info};
use validator::Validate;

/// Model description returned by `/model-info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub test_accuracy: f64,
    pub features: Vec<String>,
    pub severity_labels: Vec<String>,
    pub supported_crime_types: Vec<String>,
    pub supported_locations: Vec<String>,
    pub cv_results: Vec<CvResult>,
    pub trained_at: DateTime<Utc>,
    pub n_training_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrimeTypeInfo {
    pub name: String,
    pub base_severity: u8,
    pub trend: String,
    pub historical_freq: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationInfo {
    pub name: String,
    pub risk_index: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model: String,
    pub accuracy: f64,
    pub version: String,
    pub uptime_seconds: u64,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Serves severity predictions from a loaded artifact bundle
pub struct PredictionService {
    bundle: ArtifactBundle,
    meta: ModelMeta,
    encoder: FeatureEncoder,
}

impl PredictionService {
    pub fn new(artifacts: Artifacts) -> Self {
        let encoder = FeatureEncoder {
            crime_encoder: artifacts.bundle.crime_encoder.clone(),
            location_encoder: artifacts.bundle.location_encoder.clone(),
        };

        metrics::MODEL_TEST_ACCURACY
            .with_label_values(&[&artifacts.meta.name])
            .set(artifacts.meta.test_accuracy);

        Self {
            bundle: artifacts.bundle,
            meta: artifacts.meta,
            encoder,
        }
    }

    /// Load `model.bin` and `model_meta.json` from `dir`
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let artifacts = Artifacts::load(dir)?;
        info!(
            model = %artifacts.meta.name,
            test_accuracy = artifacts.meta.test_accuracy,
            "Prediction service ready"
        );
        Ok(Self::new(artifacts))
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    /// Assess one report, recording latency and outcome metrics
    pub fn predict(&self, report: &CrimeReport) -> Result<SeverityAssessment> {
        let start = Instant::now();
        match self.assess(report) {
            Ok(assessment) => {
                metrics::record_prediction(
                    &assessment.severity_label.to_string(),
                    &self.meta.name,
                    start.elapsed().as_secs_f64(),
                );
                info!(
                    case_id = %assessment.case_id,
                    severity = %assessment.severity_label,
                    confidence = assessment.confidence,
                    "Report assessed"
                );
                Ok(assessment)
            }
            Err(e) => {
                metrics::record_prediction_error(e.error_code());
                Err(e)
            }
        }
    }

    fn assess(&self, report: &CrimeReport) -> Result<SeverityAssessment> {
        let crime_type = CrimeType::from_str(&report.crime_type).map_err(|_| {
            AppError::Validation(format!(
                "Unknown crime_type '{}'. Valid options: {}",
                report.crime_type,
                CrimeType::names().join(", ")
            ))
        })?;
        let location = Location::from_str(&report.location).map_err(|_| {
            AppError::Validation(format!(
                "Unknown location '{}'. Valid options: {}",
                report.location,
                Location::names().join(", ")
            ))
        })?;
        report.validate()?;

        let flags = DescriptionFlags::extract(&report.description);
        let row = self.encoder.encode(crime_type, location, &flags)?;
        let x = Array2::from_shape_vec((1, N_FEATURES), row.to_vec())?;
        let x = self.bundle.scaler.transform(&x)?;

        let proba = self.bundle.model.predict_proba(&x)?;
        let probabilities = proba.row(0);
        let (best_idx, best_p) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            });

        let label_name = self.bundle.label_encoder.inverse_transform(best_idx)?;
        let severity_label = SeverityLabel::from_str(label_name).map_err(|_| {
            AppError::Prediction(format!("Model produced unknown label '{}'", label_name))
        })?;

        let confidence = round_to(best_p, 4);
        let label_probabilities: BTreeMap<String, f64> = self
            .bundle
            .label_encoder
            .classes()
            .iter()
            .zip(probabilities.iter())
            .map(|(name, &p)| (name.clone(), round_to(p, 4)))
            .collect();
        let severity_score_estimate =
            round_to(severity_label.score_center() + (confidence - 0.5) * 15.0, 1);

        debug!(
            crime_type = %crime_type,
            location = %location,
            ?flags,
            "Encoded report"
        );

        let now = Local::now();
        let profile = crime_type.profile();

        Ok(SeverityAssessment {
            case_id: format!("CR-{}", now.format("%Y%m%d%H%M%S")),
            reported_at: now.to_rfc3339_opts(SecondsFormat::Secs, false),
            reporter_name: report.reporter_name.clone(),
            incident_datetime: report.incident_datetime.clone(),
            crime_type: crime_type.to_string(),
            location: location.to_string(),
            description: report.description.clone(),
            severity_label,
            severity_score_estimate,
            confidence,
            label_probabilities,
            description_flags: flags,
            historical_context: HistoricalContext {
                historical_frequency: profile.historical_freq,
                base_crime_severity: profile.base_severity,
                trend: profile.trend.to_string(),
            },
            location_context: LocationContext {
                location: location.to_string(),
                risk_index: location.risk_index(),
            },
            model_used: self.meta.name.clone(),
            recommendation: severity_label.recommendation().to_string(),
            sla: SlaWindow::starting_at(severity_label, now),
        })
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_name: self.meta.name.clone(),
            test_accuracy: round_to(self.meta.test_accuracy, 4),
            features: self.meta.feature_cols.clone(),
            severity_labels: self.bundle.label_encoder.classes().to_vec(),
            supported_crime_types: CrimeType::names(),
            supported_locations: Location::names(),
            cv_results: self.meta.cv_results.clone(),
            trained_at: self.meta.trained_at,
            n_training_samples: self.meta.n_training_samples,
        }
    }

    pub fn crime_types(&self) -> Vec<CrimeTypeInfo> {
        CrimeType::ALL
            .iter()
            .map(|crime| {
                let profile = crime.profile();
                CrimeTypeInfo {
                    name: crime.to_string(),
                    base_severity: profile.base_severity,
                    trend: profile.trend.to_string(),
                    historical_freq: profile.historical_freq,
                }
            })
            .collect()
    }

    pub fn locations(&self) -> Vec<LocationInfo> {
        Location::ALL
            .iter()
            .map(|location| LocationInfo {
                name: location.to_string(),
                risk_index: location.risk_index(),
            })
            .collect()
    }

    pub fn health(&self, uptime_seconds: u64) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            model: self.meta.name.clone(),
            accuracy: round_to(self.meta.test_accuracy, 4),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds,
        }
    }
}
