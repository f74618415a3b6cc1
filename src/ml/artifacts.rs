use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, SeverityModel};
use crate::ml::features::{LabelEncoder, StandardScaler};
use crate::ml::models::{CvResult, ModelType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MODEL_FILE: &str = "model.bin";
pub const META_FILE: &str = "model_meta.json";

/// Everything needed to turn a report into a prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub model: SeverityModel,
    pub scaler: StandardScaler,
    pub crime_encoder: LabelEncoder,
    pub location_encoder: LabelEncoder,
    pub label_encoder: LabelEncoder,
}

/// Human-readable description of the saved model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMeta {
    pub name: String,
    pub model_type: ModelType,
    pub test_accuracy: f64,
    pub feature_cols: Vec<String>,
    pub cv_results: Vec<CvResult>,
    pub trained_at: DateTime<Utc>,
    pub n_training_samples: usize,
}

/// Saved bundle plus its metadata
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub bundle: ArtifactBundle,
    pub meta: ModelMeta,
}

impl Artifacts {
    pub fn model_path(dir: &Path) -> PathBuf {
        dir.join(MODEL_FILE)
    }

    pub fn meta_path(dir: &Path) -> PathBuf {
        dir.join(META_FILE)
    }

    /// Write both files, creating `dir` if needed
    pub fn save(&self, dir: &Path) -> Result<()> {
        if !self.bundle.model.is_trained() {
            return Err(AppError::Artifact(
                "Refusing to save an untrained model".to_string(),
            ));
        }

        fs::create_dir_all(dir)?;

        let bytes = bincode::serialize(&self.bundle)?;
        fs::write(Self::model_path(dir), bytes)?;

        let meta = serde_json::to_string_pretty(&self.meta)?;
        fs::write(Self::meta_path(dir), meta)?;

        info!(
            dir = %dir.display(),
            model = %self.meta.name,
            "Artifacts saved"
        );
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let model_path = Self::model_path(dir);
        let meta_path = Self::meta_path(dir);

        for path in [&model_path, &meta_path] {
            if !path.exists() {
                return Err(AppError::Artifact(format!(
                    "Artifacts not found at {}. Run training first (crime-severity-cli train).",
                    path.display()
                )));
            }
        }

        let bundle: ArtifactBundle = bincode::deserialize(&fs::read(&model_path)?)?;
        let meta: ModelMeta = serde_json::from_str(&fs::read_to_string(&meta_path)?)?;

        if !bundle.model.is_trained() {
            return Err(AppError::Artifact(format!(
                "{} contains an untrained model",
                model_path.display()
            )));
        }

        info!(
            dir = %dir.display(),
            model = %meta.name,
            test_accuracy = meta.test_accuracy,
            "Artifacts loaded"
        );
        Ok(Self { bundle, meta })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::LogisticRegressionClassifier;
    use crate::ml::features::FEATURE_COLUMNS;
    use ndarray::array;

    fn tiny_artifacts() -> Artifacts {
        let x = array![[0.0, 0.0], [0.1, 0.2], [3.0, 3.0], [3.1, 2.9]];
        let y = [0, 0, 1, 1];
        let (scaler, scaled) = StandardScaler::fit_transform(&x).unwrap();
        let mut model = LogisticRegressionClassifier::new(2, 100);
        model.fit(&scaled, &y).unwrap();

        Artifacts {
            bundle: ArtifactBundle {
                model: SeverityModel::LogisticRegression(model),
                scaler,
                crime_encoder: LabelEncoder::fit(["Theft", "Fraud"]),
                location_encoder: LabelEncoder::fit(["Commercial Zone"]),
                label_encoder: LabelEncoder::fit(["LOW", "HIGH"]),
            },
            meta: ModelMeta {
                name: ModelType::LogisticRegression.to_string(),
                model_type: ModelType::LogisticRegression,
                test_accuracy: 1.0,
                feature_cols: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
                cv_results: vec![CvResult::from_scores(
                    ModelType::LogisticRegression,
                    vec![1.0, 1.0],
                )],
                trained_at: Utc::now(),
                n_training_samples: 4,
            },
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested");
        let artifacts = tiny_artifacts();
        artifacts.save(&target).unwrap();

        assert!(target.join(MODEL_FILE).exists());
        assert!(target.join(META_FILE).exists());

        let loaded = Artifacts::load(&target).unwrap();
        assert_eq!(loaded.meta.name, "Logistic Regression");
        assert_eq!(loaded.bundle.label_encoder.classes(), &["HIGH", "LOW"]);

        let x = array![[0.0, 0.1], [3.0, 3.0]];
        let scaled = loaded.bundle.scaler.transform(&x).unwrap();
        assert_eq!(
            loaded.bundle.model.predict(&scaled).unwrap(),
            artifacts.bundle.model.predict(&scaled).unwrap()
        );
    }

    #[test]
    fn test_load_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let err = Artifacts::load(dir.path()).unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));
        assert!(err.to_string().contains("Run training first"));
    }
}
