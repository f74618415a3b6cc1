//! CART decision trees used as base learners by the ensemble classifiers.
//!
//! Trees are stored as a flat node arena so they serialize with serde and can
//! be persisted inside the artifact bundle.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Tree growth limits
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means all of them
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// What a tree is being fitted to
#[derive(Clone, Copy)]
pub enum Target<'a> {
    /// Class indices; leaves hold class proportions
    Classes { y: &'a [usize], n_classes: usize },
    /// Real values; leaves hold the mean
    Values(&'a [f64]),
}

impl Target<'_> {
    fn leaf_value(&self, idx: &[usize]) -> Vec<f64> {
        match self {
            Target::Classes { y, n_classes } => {
                let mut dist = vec![0.0; *n_classes];
                for &i in idx {
                    dist[y[i]] += 1.0;
                }
                let n = idx.len().max(1) as f64;
                dist.iter_mut().for_each(|d| *d /= n);
                dist
            }
            Target::Values(v) => {
                let sum: f64 = idx.iter().map(|&i| v[i]).sum();
                vec![sum / idx.len().max(1) as f64]
            }
        }
    }

    fn is_pure(&self, idx: &[usize]) -> bool {
        match self {
            Target::Classes { y, .. } => idx.iter().all(|&i| y[i] == y[idx[0]]),
            Target::Values(v) => idx.iter().all(|&i| (v[i] - v[idx[0]]).abs() < 1e-12),
        }
    }
}

/// A fitted binary decision tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct Builder<'a> {
    x: &'a Array2<f64>,
    target: Target<'a>,
    params: TreeParams,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    /// Grow a tree on the rows of `x` listed in `indices`.
    ///
    /// `indices` may contain repeats (bootstrap samples).
    pub fn fit(
        x: &Array2<f64>,
        target: Target<'_>,
        indices: Vec<usize>,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut builder = Builder {
            x,
            target,
            params,
            nodes: Vec::new(),
        };
        let mut indices = indices;
        builder.grow(&mut indices, 0, rng);
        Self {
            nodes: builder.nodes,
        }
    }

    /// Index of the leaf a sample lands in
    pub fn apply(&self, row: ArrayView1<'_, f64>) -> usize {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Leaf value for a sample
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        match &self.nodes[self.apply(row)] {
            Node::Leaf { value } => value,
            Node::Split { .. } => unreachable!("apply always stops at a leaf"),
        }
    }

    /// Overwrite the value stored in a leaf
    pub fn set_leaf_value(&mut self, leaf: usize, new_value: Vec<f64>) {
        if let Some(Node::Leaf { value }) = self.nodes.get_mut(leaf) {
            *value = new_value;
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

impl Builder<'_> {
    fn grow(&mut self, idx: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.target.leaf_value(idx),
        });

        if depth >= self.params.max_depth
            || idx.len() < self.params.min_samples_split
            || idx.len() < 2 * self.params.min_samples_leaf
            || self.target.is_pure(idx)
        {
            return node_id;
        }

        let Some(split) = self.best_split(idx, rng) else {
            return node_id;
        };

        // Partition in place: left part holds rows with value <= threshold
        let mut boundary = 0;
        for i in 0..idx.len() {
            if self.x[[idx[i], split.feature]] <= split.threshold {
                idx.swap(i, boundary);
                boundary += 1;
            }
        }
        if boundary == 0 || boundary == idx.len() {
            return node_id;
        }

        let (left_idx, right_idx) = idx.split_at_mut(boundary);
        let left = self.grow(left_idx, depth + 1, rng);
        let right = self.grow(right_idx, depth + 1, rng);

        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    fn candidate_features(&self, rng: &mut StdRng) -> Vec<usize> {
        let n_features = self.x.ncols();
        match self.params.max_features {
            Some(k) if k < n_features => {
                rand::seq::index::sample(rng, n_features, k.max(1)).into_vec()
            }
            _ => (0..n_features).collect(),
        }
    }

    fn best_split(&self, idx: &[usize], rng: &mut StdRng) -> Option<BestSplit> {
        let mut best: Option<BestSplit> = None;
        let mut order: Vec<usize> = idx.to_vec();

        for feature in self.candidate_features(rng) {
            order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let found = match self.target {
                Target::Classes { y, n_classes } => self.sweep_gini(&order, feature, y, n_classes),
                Target::Values(v) => self.sweep_variance(&order, feature, v),
            };

            if let Some((threshold, impurity)) = found {
                if best.as_ref().map_or(true, |b| impurity < b.impurity - 1e-12) {
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }

        best
    }

    /// Lowest weighted Gini over thresholds of one sorted feature
    fn sweep_gini(
        &self,
        order: &[usize],
        feature: usize,
        y: &[usize],
        n_classes: usize,
    ) -> Option<(f64, f64)> {
        let n = order.len();
        let mut total = vec![0.0; n_classes];
        for &i in order {
            total[y[i]] += 1.0;
        }
        let mut left = vec![0.0; n_classes];
        let min_leaf = self.params.min_samples_leaf;
        let mut best: Option<(f64, f64)> = None;

        for pos in 0..n - 1 {
            left[y[order[pos]]] += 1.0;
            let n_left = pos + 1;
            let n_right = n - n_left;

            let here = self.x[[order[pos], feature]];
            let next = self.x[[order[pos + 1], feature]];
            if next - here <= 1e-12 || n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let nl = n_left as f64;
            let nr = n_right as f64;
            let g_left = gini(left.iter().copied(), nl);
            let g_right = gini(total.iter().zip(left.iter()).map(|(t, l)| t - l), nr);
            let impurity = (nl * g_left + nr * g_right) / n as f64;

            if best.map_or(true, |(_, b)| impurity < b) {
                best = Some(((here + next) / 2.0, impurity));
            }
        }

        best
    }

    /// Lowest summed squared error over thresholds of one sorted feature
    fn sweep_variance(&self, order: &[usize], feature: usize, v: &[f64]) -> Option<(f64, f64)> {
        let n = order.len();
        let total_sum: f64 = order.iter().map(|&i| v[i]).sum();
        let total_sq: f64 = order.iter().map(|&i| v[i] * v[i]).sum();
        let min_leaf = self.params.min_samples_leaf;

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        let mut best: Option<(f64, f64)> = None;

        for pos in 0..n - 1 {
            let value = v[order[pos]];
            left_sum += value;
            left_sq += value * value;
            let n_left = pos + 1;
            let n_right = n - n_left;

            let here = self.x[[order[pos], feature]];
            let next = self.x[[order[pos + 1], feature]];
            if next - here <= 1e-12 || n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left as f64)
                + (right_sq - right_sum * right_sum / n_right as f64);

            if best.map_or(true, |(_, b)| sse < b) {
                best = Some(((here + next) / 2.0, sse));
            }
        }

        best
    }
}

fn gini(counts: impl Iterator<Item = f64>, size: f64) -> f64 {
    1.0 - counts.map(|c| (c / size).powi(2)).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_classification_tree_separates_classes() {
        let x = array![[0.0, 1.0], [1.0, 1.0], [2.0, 0.0], [3.0, 0.0]];
        let y = vec![0, 0, 1, 1];
        let mut rng = StdRng::seed_from_u64(7);

        let tree = DecisionTree::fit(
            &x,
            Target::Classes {
                y: &y,
                n_classes: 2,
            },
            (0..4).collect(),
            TreeParams::default(),
            &mut rng,
        );

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict_row(x.row(0)), &[1.0, 0.0]);
        assert_eq!(tree.predict_row(x.row(3)), &[0.0, 1.0]);
    }

    #[test]
    fn test_max_depth_zero_is_a_stump_leaf() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = vec![0, 1, 1];
        let mut rng = StdRng::seed_from_u64(7);
        let params = TreeParams {
            max_depth: 0,
            ..Default::default()
        };

        let tree = DecisionTree::fit(
            &x,
            Target::Classes {
                y: &y,
                n_classes: 2,
            },
            (0..3).collect(),
            params,
            &mut rng,
        );

        assert_eq!(tree.n_nodes(), 1);
        let dist = tree.predict_row(x.row(0));
        assert!((dist[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_regression_tree_and_leaf_override() {
        let x = array![[0.0], [1.0], [10.0], [11.0]];
        let v = vec![1.0, 1.0, 5.0, 5.0];
        let mut rng = StdRng::seed_from_u64(7);

        let mut tree = DecisionTree::fit(
            &x,
            Target::Values(&v),
            (0..4).collect(),
            TreeParams::default(),
            &mut rng,
        );

        assert_eq!(tree.predict_row(x.row(1)), &[1.0]);
        assert_eq!(tree.predict_row(x.row(2)), &[5.0]);

        let leaf = tree.apply(x.row(3));
        tree.set_leaf_value(leaf, vec![-2.0]);
        assert_eq!(tree.predict_row(x.row(2)), &[-2.0]);
    }

    #[test]
    fn test_constant_feature_yields_leaf() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = vec![0, 1, 0];
        let mut rng = StdRng::seed_from_u64(7);

        let tree = DecisionTree::fit(
            &x,
            Target::Classes {
                y: &y,
                n_classes: 2,
            },
            (0..3).collect(),
            TreeParams::default(),
            &mut rng,
        );

        assert_eq!(tree.n_nodes(), 1);
    }
}
