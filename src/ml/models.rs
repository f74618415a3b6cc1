use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// Candidate model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
pub enum ModelType {
    #[strum(serialize = "Random Forest")]
    RandomForest,
    #[strum(serialize = "Gradient Boosting")]
    GradientBoosting,
    #[strum(serialize = "Logistic Regression")]
    LogisticRegression,
    #[strum(serialize = "SVM")]
    Svm,
}

impl ModelType {
    /// Candidates in the order they are cross-validated
    pub const CANDIDATES: [ModelType; 4] = [
        ModelType::RandomForest,
        ModelType::GradientBoosting,
        ModelType::LogisticRegression,
        ModelType::Svm,
    ];
}

/// Per-class classification metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Model evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy (0.0 - 1.0)
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1
    pub f1_score: f64,

    /// Rows are true classes, columns predicted classes
    pub confusion_matrix: Vec<Vec<usize>>,

    /// Per-class metrics keyed by class name
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            confusion_matrix: Vec::new(),
            per_class_metrics: BTreeMap::new(),
        }
    }

    /// Compute metrics from true and predicted class indices
    pub fn calculate(y_true: &[usize], y_pred: &[usize], class_names: &[String]) -> Self {
        let n_samples = y_true.len();
        let n_classes = class_names.len();
        if n_samples == 0 || n_classes == 0 {
            return Self::new();
        }

        let mut confusion = vec![vec![0usize; n_classes]; n_classes];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t < n_classes && p < n_classes {
                confusion[t][p] += 1;
            }
        }

        let correct: usize = (0..n_classes).map(|c| confusion[c][c]).sum();
        let accuracy = correct as f64 / n_samples as f64;

        let mut per_class = BTreeMap::new();
        for (class_idx, name) in class_names.iter().enumerate() {
            let tp = confusion[class_idx][class_idx];
            let fp: usize = (0..n_classes)
                .filter(|&t| t != class_idx)
                .map(|t| confusion[t][class_idx])
                .sum();
            let support: usize = confusion[class_idx].iter().sum();
            let fn_count = support - tp;

            let precision = if tp + fp > 0 {
                tp as f64 / (tp + fp) as f64
            } else {
                0.0
            };

            let recall = if tp + fn_count > 0 {
                tp as f64 / (tp + fn_count) as f64
            } else {
                0.0
            };

            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            per_class.insert(
                name.clone(),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score: f1,
                    support,
                },
            );
        }

        let macro_avg = |f: fn(&ClassMetrics) -> f64| {
            per_class.values().map(f).sum::<f64>() / n_classes as f64
        };

        Self {
            accuracy,
            precision: macro_avg(|m| m.precision),
            recall: macro_avg(|m| m.recall),
            f1_score: macro_avg(|m| m.f1_score),
            confusion_matrix: confusion,
            per_class_metrics: per_class,
        }
    }

    /// Text report in the usual precision/recall/f1/support layout
    pub fn report(&self) -> String {
        let mut out = format!(
            "{:>12} {:>9} {:>9} {:>9} {:>9}\n",
            "", "precision", "recall", "f1-score", "support"
        );
        let mut total_support = 0;
        for (name, m) in &self.per_class_metrics {
            total_support += m.support;
            out.push_str(&format!(
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
                name, m.precision, m.recall, m.f1_score, m.support
            ));
        }
        out.push_str(&format!(
            "\n{:>12} {:>9} {:>9} {:>9.2} {:>9}\n",
            "accuracy", "", "", self.accuracy, total_support
        ));
        out.push_str(&format!(
            "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
            "macro avg", self.precision, self.recall, self.f1_score, total_support
        ));
        out
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Cross-validation outcome for one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvResult {
    pub model_type: ModelType,
    pub fold_scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CvResult {
    pub fn from_scores(model_type: ModelType, fold_scores: Vec<f64>) -> Self {
        let n = fold_scores.len().max(1) as f64;
        let mean = fold_scores.iter().sum::<f64>() / n;
        let variance = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            model_type,
            fold_scores,
            mean,
            std: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn names() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    #[test]
    fn test_metrics_calculation() {
        let y_true = vec![0, 0, 1, 1];
        let y_pred = vec![0, 1, 1, 1];
        let metrics = ModelMetrics::calculate(&y_true, &y_pred, &names());

        assert_eq!(metrics.accuracy, 0.75);
        assert_eq!(metrics.confusion_matrix, vec![vec![1, 1], vec![0, 2]]);

        let a = &metrics.per_class_metrics["A"];
        assert_eq!(a.precision, 1.0);
        assert_eq!(a.recall, 0.5);
        assert_eq!(a.support, 2);

        let b = &metrics.per_class_metrics["B"];
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(b.recall, 1.0);

        assert!(metrics.report().contains("macro avg"));
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = ModelMetrics::calculate(&[], &[], &names());
        assert_eq!(metrics.accuracy, 0.0);
        assert!(metrics.per_class_metrics.is_empty());
    }

    #[test]
    fn test_cv_result_stats() {
        let cv = CvResult::from_scores(ModelType::Svm, vec![0.8, 0.9, 1.0]);
        assert!((cv.mean - 0.9).abs() < 1e-12);
        assert!((cv.std - (0.02f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_model_type_names() {
        assert_eq!(ModelType::RandomForest.to_string(), "Random Forest");
        assert_eq!(ModelType::from_str("SVM").unwrap(), ModelType::Svm);
        assert_eq!(ModelType::CANDIDATES.len(), 4);
    }
}
