use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, SeverityModel};
use crate::ml::models::CvResult;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Train/test row indices
pub type Split = (Vec<usize>, Vec<usize>);

fn indices_by_class(y: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &class) in y.iter().enumerate() {
        by_class.entry(class).or_default().push(i);
    }
    by_class
}

/// Shuffled split that keeps each class's share in both halves.
///
/// Each class contributes `round(count * test_size)` rows to the test side.
pub fn stratified_split(y: &[usize], test_size: f64, seed: u64) -> Result<Split> {
    if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
        return Err(AppError::Validation(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for (_, mut rows) in indices_by_class(y) {
        rows.shuffle(&mut rng);
        let n_test = ((rows.len() as f64) * test_size).round() as usize;
        let n_test = n_test.min(rows.len().saturating_sub(1));
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    if test.is_empty() {
        return Err(AppError::Validation(
            "Not enough samples for a test split".to_string(),
        ));
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Stratified k-fold splitter
#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    /// Fold assignments. Rows of each class are shuffled and dealt
    /// round-robin, so every fold keeps the class proportions.
    pub fn split(&self, y: &[usize]) -> Result<Vec<Split>> {
        if self.n_splits < 2 {
            return Err(AppError::Validation(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }
        if y.len() < self.n_splits {
            return Err(AppError::Validation(format!(
                "Cannot split {} samples into {} folds",
                y.len(),
                self.n_splits
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut fold_of = vec![0usize; y.len()];
        let mut next_fold = 0;
        for (_, mut rows) in indices_by_class(y) {
            rows.shuffle(&mut rng);
            for row in rows {
                fold_of[row] = next_fold;
                next_fold = (next_fold + 1) % self.n_splits;
            }
        }

        Ok((0..self.n_splits)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| fold_of[i] == fold);
                (train, test)
            })
            .collect())
    }
}

impl Default for StratifiedKFold {
    fn default() -> Self {
        Self::new(5, 42)
    }
}

/// Accuracy of a fresh copy of `model` on each fold
pub fn cross_val_score<M>(
    model: &M,
    x: &Array2<f64>,
    y: &[usize],
    folds: &[Split],
) -> Result<Vec<f64>>
where
    M: Classifier + Clone,
{
    folds
        .iter()
        .map(|(train, test)| {
            let mut fold_model = model.clone();
            let x_train = x.select(Axis(0), train);
            let y_train: Vec<usize> = train.iter().map(|&i| y[i]).collect();
            fold_model.fit(&x_train, &y_train)?;

            let x_test = x.select(Axis(0), test);
            let y_test: Vec<usize> = test.iter().map(|&i| y[i]).collect();
            fold_model.score(&x_test, &y_test)
        })
        .collect()
}

/// Winner of model selection
#[derive(Debug, Clone)]
pub struct Selection {
    /// Best candidate refitted on all of `x`
    pub model: SeverityModel,
    pub cv_results: Vec<CvResult>,
}

impl Selection {
    pub fn best_cv(&self) -> Option<&CvResult> {
        let model_type = self.model.model_type();
        self.cv_results.iter().find(|r| r.model_type == model_type)
    }
}

/// Cross-validate every candidate and refit the best one.
///
/// Ties keep the earlier candidate.
pub fn train_and_select(
    candidates: Vec<SeverityModel>,
    x: &Array2<f64>,
    y: &[usize],
    kfold: &StratifiedKFold,
) -> Result<Selection> {
    if candidates.is_empty() {
        return Err(AppError::Training("No candidate models".to_string()));
    }

    let folds = kfold.split(y)?;
    info!(
        candidates = candidates.len(),
        folds = folds.len(),
        samples = y.len(),
        "Cross-validating candidate models"
    );

    let cv_results: Vec<CvResult> = candidates
        .par_iter()
        .map(|candidate| -> Result<CvResult> {
            let model_type = candidate.model_type();
            debug!(model = %model_type, "Starting cross-validation");
            let scores = cross_val_score(candidate, x, y, &folds)?;
            let result = CvResult::from_scores(model_type, scores);
            info!(
                model = %model_type,
                cv_mean = result.mean,
                cv_std = result.std,
                "CV accuracy: {:.4} +/- {:.4}",
                result.mean,
                result.std
            );
            Ok(result)
        })
        .collect::<Result<_>>()?;

    let mut best_idx = 0;
    for (idx, result) in cv_results.iter().enumerate().skip(1) {
        if result.mean > cv_results[best_idx].mean {
            best_idx = idx;
        }
    }

    let mut model = candidates
        .into_iter()
        .nth(best_idx)
        .ok_or_else(|| AppError::Internal("Best candidate index out of range".to_string()))?;
    info!(
        model = %model.model_type(),
        cv_mean = cv_results[best_idx].mean,
        "Best model selected, refitting on the full training split"
    );
    model.fit(x, y)?;

    Ok(Selection { model, cv_results })
}
