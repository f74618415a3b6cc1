use crate::error::{AppError, Result};
use crate::ml::models::ModelType;
use crate::ml::tree::{DecisionTree, Target, TreeParams};
use linfa::prelude::*;
use linfa::Dataset;
use linfa_logistic::MultiLogisticRegression;
use linfa_svm::Svm;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Trait for classifiers
pub trait Classifier: Send + Sync {
    /// Fit on a feature matrix and class indices in `0..n_classes`
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()>;

    /// Class probabilities, one row per sample and one column per class
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predict class indices
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().into_iter().map(argmax).collect())
    }

    /// Accuracy on labelled data
    fn score(&self, x: &Array2<f64>, y: &[usize]) -> Result<f64> {
        if y.is_empty() {
            return Ok(0.0);
        }
        let predictions = self.predict(x)?;
        let correct = predictions.iter().zip(y).filter(|(p, t)| p == t).count();
        Ok(correct as f64 / y.len() as f64)
    }

    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

fn argmax(row: ArrayView1<'_, f64>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
        .0
}

fn softmax_in_place(mut row: ndarray::ArrayViewMut1<'_, f64>) {
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return;
    }
    row.mapv_inplace(|v| (v - max).exp());
    let sum = row.sum();
    if sum > 0.0 {
        row.mapv_inplace(|v| v / sum);
    }
}

fn check_training_data(x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
    if x.nrows() == 0 {
        return Err(AppError::Training("Cannot fit with 0 samples".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(AppError::Training(format!(
            "Feature rows ({}) and labels ({}) differ",
            x.nrows(),
            y.len()
        )));
    }
    if let Some(bad) = y.iter().find(|&&c| c >= n_classes) {
        return Err(AppError::Training(format!(
            "Label {} outside 0..{}",
            bad, n_classes
        )));
    }
    Ok(())
}

fn not_trained() -> AppError {
    AppError::Prediction("Model not trained".to_string())
}

/// Bagged ensemble of Gini trees with per-split feature subsampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    n_estimators: usize,
    max_depth: usize,
    seed: u64,
    n_classes: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForestClassifier {
    pub fn new(n_classes: usize, n_estimators: usize, max_depth: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            max_depth,
            seed,
            n_classes,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_training_data(x, y, self.n_classes)?;

        let n_samples = x.nrows();
        let max_features = (x.ncols() as f64).sqrt().floor().max(1.0) as usize;
        let params = TreeParams {
            max_depth: self.max_depth,
            max_features: Some(max_features),
            ..Default::default()
        };
        let n_classes = self.n_classes;

        let mut seeder = StdRng::seed_from_u64(self.seed);
        let tree_seeds: Vec<u64> = (0..self.n_estimators).map(|_| seeder.gen()).collect();

        self.trees = tree_seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let bootstrap: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                DecisionTree::fit(
                    x,
                    Target::Classes { y, n_classes },
                    bootstrap,
                    params,
                    &mut rng,
                )
            })
            .collect();

        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(not_trained());
        }

        let mut proba: Array2<f64> = Array2::zeros((x.nrows(), self.n_classes));
        for (row, mut out) in x.rows().into_iter().zip(proba.rows_mut()) {
            for tree in &self.trees {
                for (o, p) in out.iter_mut().zip(tree.predict_row(row)) {
                    *o += p;
                }
            }
        }
        proba /= self.trees.len() as f64;

        Ok(proba)
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }

    fn is_trained(&self) -> bool {
        !self.trees.is_empty()
    }
}

/// Multinomial-deviance gradient boosting with one regression tree per class per stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    n_estimators: usize,
    max_depth: usize,
    learning_rate: f64,
    seed: u64,
    n_classes: usize,
    init_scores: Vec<f64>,
    /// `stages[m][k]` is the tree for class `k` at stage `m`
    stages: Vec<Vec<DecisionTree>>,
}

impl GradientBoostingClassifier {
    pub fn new(
        n_classes: usize,
        n_estimators: usize,
        max_depth: usize,
        learning_rate: f64,
        seed: u64,
    ) -> Self {
        Self {
            n_estimators,
            max_depth,
            learning_rate,
            seed,
            n_classes,
            init_scores: Vec::new(),
            stages: Vec::new(),
        }
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut scores: Array2<f64> = Array2::zeros((x.nrows(), self.n_classes));
        for (row, mut out) in x.rows().into_iter().zip(scores.rows_mut()) {
            for (k, init) in self.init_scores.iter().enumerate() {
                out[k] = *init;
            }
            for stage in &self.stages {
                for (k, tree) in stage.iter().enumerate() {
                    out[k] += self.learning_rate * tree.predict_row(row)[0];
                }
            }
        }
        scores
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_training_data(x, y, self.n_classes)?;

        let n_samples = x.nrows();
        let k_classes = self.n_classes;
        let params = TreeParams {
            max_depth: self.max_depth,
            ..Default::default()
        };

        // Start from the log class priors
        let mut counts = vec![0.0; k_classes];
        for &c in y {
            counts[c] += 1.0;
        }
        self.init_scores = counts
            .iter()
            .map(|&c| (c / n_samples as f64).max(1e-12).ln())
            .collect();

        let mut raw: Array2<f64> = Array2::zeros((n_samples, k_classes));
        for mut row in raw.rows_mut() {
            for (k, init) in self.init_scores.iter().enumerate() {
                row[k] = *init;
            }
        }

        let shrink = (k_classes as f64 - 1.0) / k_classes as f64;
        let seed = self.seed;
        self.stages = Vec::with_capacity(self.n_estimators);

        for stage_idx in 0..self.n_estimators {
            let mut proba = raw.clone();
            for row in proba.rows_mut() {
                softmax_in_place(row);
            }

            let stage: Vec<(DecisionTree, Vec<f64>)> = (0..k_classes)
                .into_par_iter()
                .map(|k| {
                    let residuals: Vec<f64> = (0..n_samples)
                        .map(|i| f64::from(u8::from(y[i] == k)) - proba[[i, k]])
                        .collect();

                    let mut rng =
                        StdRng::seed_from_u64(seed ^ ((stage_idx * k_classes + k) as u64));
                    let mut tree = DecisionTree::fit(
                        x,
                        Target::Values(&residuals),
                        (0..n_samples).collect(),
                        params,
                        &mut rng,
                    );

                    // Newton step per leaf
                    let leaves: Vec<usize> =
                        x.rows().into_iter().map(|r| tree.apply(r)).collect();
                    let n_nodes = tree.n_nodes();
                    let mut numerator = vec![0.0; n_nodes];
                    let mut denominator = vec![0.0; n_nodes];
                    for (i, &leaf) in leaves.iter().enumerate() {
                        let r = residuals[i];
                        numerator[leaf] += r;
                        denominator[leaf] += r.abs() * (1.0 - r.abs());
                    }
                    let gammas: Vec<f64> = (0..n_nodes)
                        .map(|leaf| {
                            if denominator[leaf].abs() < 1e-150 {
                                0.0
                            } else {
                                shrink * numerator[leaf] / denominator[leaf]
                            }
                        })
                        .collect();
                    for (leaf, gamma) in gammas.iter().enumerate() {
                        tree.set_leaf_value(leaf, vec![*gamma]);
                    }

                    let updates = leaves.iter().map(|&leaf| gammas[leaf]).collect();
                    (tree, updates)
                })
                .collect();

            let mut trees = Vec::with_capacity(k_classes);
            for (k, (tree, updates)) in stage.into_iter().enumerate() {
                for (i, gamma) in updates.iter().enumerate() {
                    raw[[i, k]] += self.learning_rate * gamma;
                }
                trees.push(tree);
            }
            self.stages.push(trees);
        }

        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.stages.is_empty() {
            return Err(not_trained());
        }

        let mut proba = self.raw_scores(x);
        for row in proba.rows_mut() {
            softmax_in_place(row);
        }
        Ok(proba)
    }

    fn model_type(&self) -> ModelType {
        ModelType::GradientBoosting
    }

    fn is_trained(&self) -> bool {
        !self.stages.is_empty()
    }
}

/// Multinomial logistic regression fitted with linfa-logistic.
///
/// Only the fitted weights are kept so the model can be serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegressionClassifier {
    max_iterations: u64,
    n_classes: usize,
    /// (n_features, n_fitted_classes)
    weights: Option<Array2<f64>>,
    intercept: Option<Array1<f64>>,
    /// Class index for each fitted column
    fitted_classes: Vec<usize>,
}

impl LogisticRegressionClassifier {
    pub fn new(n_classes: usize, max_iterations: u64) -> Self {
        Self {
            max_iterations,
            n_classes,
            weights: None,
            intercept: None,
            fitted_classes: Vec::new(),
        }
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_training_data(x, y, self.n_classes)?;

        let dataset = Dataset::new(x.clone(), Array1::from_vec(y.to_vec()));
        let model = MultiLogisticRegression::default()
            .max_iterations(self.max_iterations)
            .fit(&dataset)
            .map_err(|e| {
                AppError::Training(format!("Failed to train logistic regression: {}", e))
            })?;

        // linfa orders the fitted columns by sorted class value
        let mut classes = y.to_vec();
        classes.sort_unstable();
        classes.dedup();

        let params = model.params();
        let weights = if params.nrows() == x.ncols() {
            params.to_owned()
        } else {
            params.t().to_owned()
        };

        self.weights = Some(weights);
        self.intercept = Some(model.intercept().to_owned());
        self.fitted_classes = classes;

        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (Some(weights), Some(intercept)) = (&self.weights, &self.intercept) else {
            return Err(not_trained());
        };

        let mut logits = x.dot(weights) + intercept;
        for row in logits.rows_mut() {
            softmax_in_place(row);
        }

        let mut proba: Array2<f64> = Array2::zeros((x.nrows(), self.n_classes));
        for (col, &class) in self.fitted_classes.iter().enumerate() {
            proba.column_mut(class).assign(&logits.column(col));
        }
        Ok(proba)
    }

    fn model_type(&self) -> ModelType {
        ModelType::LogisticRegression
    }

    fn is_trained(&self) -> bool {
        self.weights.is_some()
    }
}

/// One RBF machine of the one-vs-rest SVM
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RbfMachine {
    class: usize,
    alpha: Vec<f64>,
    support_vectors: Array2<f64>,
    rho: f64,
}

impl RbfMachine {
    /// f(x) = sum(alpha_i * exp(-||x - x_i||^2 / eps)) - rho
    fn decision_function(&self, x: ArrayView1<'_, f64>, eps: f64) -> f64 {
        let mut sum = 0.0;
        for (alpha_i, sv) in self.alpha.iter().zip(self.support_vectors.rows()) {
            let sq_dist: f64 = x.iter().zip(sv.iter()).map(|(a, b)| (a - b).powi(2)).sum();
            sum += alpha_i * (-sq_dist / eps).exp();
        }
        sum - self.rho
    }
}

/// One-vs-rest RBF support vector classifier fitted with linfa-svm.
///
/// Probabilities are a softmax over the per-class decision values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmClassifier {
    n_classes: usize,
    /// Gaussian kernel width; `None` uses the number of features
    kernel_eps: Option<f64>,
    fitted_eps: f64,
    machines: Vec<RbfMachine>,
}

impl SvmClassifier {
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            kernel_eps: None,
            fitted_eps: 1.0,
            machines: Vec::new(),
        }
    }

    pub fn with_kernel_eps(mut self, eps: f64) -> Self {
        self.kernel_eps = Some(eps);
        self
    }

    fn decision_values(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut values = Array2::from_elem((x.nrows(), self.n_classes), f64::NEG_INFINITY);
        for (row, mut out) in x.rows().into_iter().zip(values.rows_mut()) {
            for machine in &self.machines {
                out[machine.class] = machine.decision_function(row, self.fitted_eps);
            }
        }
        values
    }
}

impl Classifier for SvmClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_training_data(x, y, self.n_classes)?;

        let eps = self.kernel_eps.unwrap_or(x.ncols() as f64);
        let mut machines = Vec::with_capacity(self.n_classes);

        for class in 0..self.n_classes {
            if !y.contains(&class) {
                continue;
            }

            let binary: Array1<bool> = y.iter().map(|&c| c == class).collect();
            let dataset = Dataset::new(x.clone(), binary);
            let svm = Svm::<_, bool>::params()
                .gaussian_kernel(eps)
                .fit(&dataset)
                .map_err(|e| {
                    AppError::Training(format!("SVM training failed for class {}: {}", class, e))
                })?;

            // Keep only rows with a non-zero dual coefficient
            let kept: Vec<usize> = svm
                .alpha
                .iter()
                .enumerate()
                .filter(|(_, a)| a.abs() > 1e-12)
                .map(|(i, _)| i)
                .collect();

            machines.push(RbfMachine {
                class,
                alpha: kept.iter().map(|&i| svm.alpha[i]).collect(),
                support_vectors: x.select(Axis(0), &kept),
                rho: svm.rho,
            });
        }

        self.fitted_eps = eps;
        self.machines = machines;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.machines.is_empty() {
            return Err(not_trained());
        }

        let mut proba = self.decision_values(x);
        for row in proba.rows_mut() {
            softmax_in_place(row);
        }
        Ok(proba)
    }

    fn model_type(&self) -> ModelType {
        ModelType::Svm
    }

    fn is_trained(&self) -> bool {
        !self.machines.is_empty()
    }
}

/// Hyperparameters for the four candidates
#[derive(Debug, Clone, Copy)]
pub struct CandidateParams {
    pub seed: u64,
    pub rf_trees: usize,
    pub rf_max_depth: usize,
    pub gb_stages: usize,
    pub gb_max_depth: usize,
    pub gb_learning_rate: f64,
    pub lr_max_iterations: u64,
}

impl Default for CandidateParams {
    fn default() -> Self {
        Self {
            seed: 42,
            rf_trees: 200,
            rf_max_depth: 12,
            gb_stages: 150,
            gb_max_depth: 5,
            gb_learning_rate: 0.1,
            lr_max_iterations: 1000,
        }
    }
}

/// Whichever candidate was selected, in a form the artifact bundle can persist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SeverityModel {
    RandomForest(RandomForestClassifier),
    GradientBoosting(GradientBoostingClassifier),
    LogisticRegression(LogisticRegressionClassifier),
    Svm(SvmClassifier),
}

impl SeverityModel {
    /// Unfitted candidate of the given family
    pub fn candidate(model_type: ModelType, n_classes: usize, params: &CandidateParams) -> Self {
        match model_type {
            ModelType::RandomForest => SeverityModel::RandomForest(RandomForestClassifier::new(
                n_classes,
                params.rf_trees,
                params.rf_max_depth,
                params.seed,
            )),
            ModelType::GradientBoosting => {
                SeverityModel::GradientBoosting(GradientBoostingClassifier::new(
                    n_classes,
                    params.gb_stages,
                    params.gb_max_depth,
                    params.gb_learning_rate,
                    params.seed,
                ))
            }
            ModelType::LogisticRegression => SeverityModel::LogisticRegression(
                LogisticRegressionClassifier::new(n_classes, params.lr_max_iterations),
            ),
            ModelType::Svm => SeverityModel::Svm(SvmClassifier::new(n_classes)),
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            SeverityModel::RandomForest(m) => m,
            SeverityModel::GradientBoosting(m) => m,
            SeverityModel::LogisticRegression(m) => m,
            SeverityModel::Svm(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            SeverityModel::RandomForest(m) => m,
            SeverityModel::GradientBoosting(m) => m,
            SeverityModel::LogisticRegression(m) => m,
            SeverityModel::Svm(m) => m,
        }
    }
}

impl Classifier for SeverityModel {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(x)
    }

    fn model_type(&self) -> ModelType {
        self.inner().model_type()
    }

    fn is_trained(&self) -> bool {
        self.inner().is_trained()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three well separated blobs in two dimensions
    fn blobs(per_class: usize) -> (Array2<f64>, Vec<usize>) {
        let centers = [(-3.0, -3.0), (0.0, 3.0), (3.0, -3.0)];
        let mut rng = StdRng::seed_from_u64(1);
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for (class, (cx, cy)) in centers.iter().enumerate() {
            for _ in 0..per_class {
                data.push(cx + rng.gen_range(-0.5..0.5));
                data.push(cy + rng.gen_range(-0.5..0.5));
                labels.push(class);
            }
        }
        (
            Array2::from_shape_vec((labels.len(), 2), data).unwrap(),
            labels,
        )
    }

    fn assert_probabilities(proba: &Array2<f64>, n_classes: usize) {
        assert_eq!(proba.ncols(), n_classes);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_random_forest_classifier() {
        let (x, y) = blobs(20);
        let mut model = RandomForestClassifier::new(3, 25, 6, 42);
        assert!(!model.is_trained());
        assert!(model.predict(&x).is_err());

        model.fit(&x, &y).unwrap();
        assert!(model.is_trained());
        assert_eq!(model.n_trees(), 25);
        assert!(model.score(&x, &y).unwrap() > 0.95);
        assert_probabilities(&model.predict_proba(&x).unwrap(), 3);
    }

    #[test]
    fn test_random_forest_is_deterministic() {
        let (x, y) = blobs(10);
        let mut a = RandomForestClassifier::new(3, 10, 4, 7);
        let mut b = RandomForestClassifier::new(3, 10, 4, 7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_gradient_boosting_classifier() {
        let (x, y) = blobs(20);
        let mut model = GradientBoostingClassifier::new(3, 20, 3, 0.1, 42);
        model.fit(&x, &y).unwrap();

        assert!(model.is_trained());
        assert!(model.score(&x, &y).unwrap() > 0.95);
        assert_probabilities(&model.predict_proba(&x).unwrap(), 3);
    }

    #[test]
    fn test_logistic_regression_classifier() {
        let (x, y) = blobs(20);
        let mut model = LogisticRegressionClassifier::new(3, 200);
        model.fit(&x, &y).unwrap();

        assert!(model.is_trained());
        assert!(model.score(&x, &y).unwrap() > 0.9);
        assert_probabilities(&model.predict_proba(&x).unwrap(), 3);
    }

    #[test]
    fn test_svm_classifier() {
        let (x, y) = blobs(15);
        let mut model = SvmClassifier::new(3).with_kernel_eps(2.0);
        model.fit(&x, &y).unwrap();

        assert!(model.is_trained());
        assert!(model.score(&x, &y).unwrap() > 0.9);
        assert_probabilities(&model.predict_proba(&x).unwrap(), 3);
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let (x, y) = blobs(5);
        let mut model = RandomForestClassifier::new(3, 5, 3, 42);
        assert!(model.fit(&x, &y[..3]).is_err());

        let mut bad = y.clone();
        bad[0] = 9;
        assert!(model.fit(&x, &bad).is_err());
    }

    #[test]
    fn test_severity_model_dispatch() {
        let (x, y) = blobs(10);
        let params = CandidateParams {
            rf_trees: 10,
            gb_stages: 10,
            ..Default::default()
        };

        for model_type in ModelType::CANDIDATES {
            let mut model = SeverityModel::candidate(model_type, 3, &params);
            assert_eq!(model.model_type(), model_type);
            assert!(!model.is_trained());
            model.fit(&x, &y).unwrap();
            assert!(model.is_trained());
            assert_eq!(model.predict(&x).unwrap().len(), x.nrows());
        }
    }
}
