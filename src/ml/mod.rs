/// Machine learning for crime severity prediction
///
/// Training happens offline: a synthetic dataset is generated, four candidate
/// classifiers are cross-validated and the best one is saved together with
/// the fitted encoders and scaler. Serving loads that bundle and scores
/// individual reports.

pub mod artifacts;
pub mod classifier;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod selection;
pub mod service;
pub mod synthetic;
mod tree;

pub use artifacts::{ArtifactBundle, Artifacts, ModelMeta};
pub use classifier::{
    CandidateParams, Classifier, GradientBoostingClassifier, LogisticRegressionClassifier,
    RandomForestClassifier, SeverityModel, SvmClassifier,
};
pub use features::{FeatureEncoder, LabelEncoder, StandardScaler, FEATURE_COLUMNS, N_FEATURES};
pub use models::{ClassMetrics, CvResult, ModelMetrics, ModelType};
pub use pipeline::{TrainingPipeline, TrainingReport};
pub use selection::{cross_val_score, stratified_split, train_and_select, StratifiedKFold};
pub use service::{CrimeTypeInfo, HealthStatus, LocationInfo, ModelInfo, PredictionService};
pub use synthetic::{generate_dataset, label_distribution, CrimeRecord};
