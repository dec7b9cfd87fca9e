// Random forest classifier
// Ensemble of depth-limited CART trees with gini splits, bootstrap row
// sampling and per-node feature subsampling. Every tree's RNG is seeded
// from the master seed plus the tree index, so a fit is bit-reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::signal::FEATURE_COUNT;

/// A single tree node, stored flat in the tree's node arena
#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    /// Terminal node holding a class probability distribution
    Leaf { distribution: Vec<f64> },

    /// Binary split: `feature <= threshold` goes left, otherwise right
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn fit(
        rows: &[[f64; FEATURE_COUNT]],
        labels: &[usize],
        n_classes: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = DecisionTree { nodes: Vec::new() };
        let indices: Vec<usize> = (0..rows.len()).collect();
        tree.build(rows, labels, n_classes, &indices, max_depth, rng);
        tree
    }

    /// Recursively grow a subtree over `indices`; returns the node index
    fn build(
        &mut self,
        rows: &[[f64; FEATURE_COUNT]],
        labels: &[usize],
        n_classes: usize,
        indices: &[usize],
        depth_left: usize,
        rng: &mut StdRng,
    ) -> usize {
        let counts = class_counts(labels, indices, n_classes);

        let pure = counts.iter().filter(|c| **c > 0).count() <= 1;
        if depth_left == 0 || indices.len() < 2 || pure {
            return self.push_leaf(&counts);
        }

        let Some((feature, threshold)) = best_split(rows, labels, n_classes, indices, rng)
        else {
            return self.push_leaf(&counts);
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|i| rows[**i][feature] <= threshold);

        if left_idx.is_empty() || right_idx.is_empty() {
            return self.push_leaf(&counts);
        }

        // Reserve the split slot before the children so the node index
        // is stable while the subtrees grow
        let split_at = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });

        let left = self.build(rows, labels, n_classes, &left_idx, depth_left - 1, rng);
        let right = self.build(rows, labels, n_classes, &right_idx, depth_left - 1, rng);

        self.nodes[split_at] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        split_at
    }

    fn push_leaf(&mut self, counts: &[usize]) -> usize {
        let total: usize = counts.iter().sum();
        let distribution = if total == 0 {
            vec![0.0; counts.len()]
        } else {
            counts.iter().map(|c| *c as f64 / total as f64).collect()
        };
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn predict_proba(&self, features: &[f64; FEATURE_COUNT]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

fn class_counts(labels: &[usize], indices: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for i in indices {
        counts[labels[*i]] += 1;
    }
    counts
}

fn gini(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|c| {
            let p = *c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

/// Find the best gini split over a random sqrt-sized feature subset.
/// Returns None when no candidate split reduces impurity.
fn best_split(
    rows: &[[f64; FEATURE_COUNT]],
    labels: &[usize],
    n_classes: usize,
    indices: &[usize],
    rng: &mut StdRng,
) -> Option<(usize, f64)> {
    let parent_impurity = gini(&class_counts(labels, indices, n_classes));
    let total = indices.len() as f64;

    let mut features: Vec<usize> = (0..FEATURE_COUNT).collect();
    features.shuffle(rng);
    let k = (FEATURE_COUNT as f64).sqrt().ceil() as usize;

    let mut best: Option<(usize, f64)> = None;
    let mut best_gain = 1e-12;

    for &feature in features.iter().take(k) {
        let mut values: Vec<f64> = indices.iter().map(|i| rows[*i][feature]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;

            let mut left = vec![0usize; n_classes];
            let mut right = vec![0usize; n_classes];
            for i in indices {
                if rows[*i][feature] <= threshold {
                    left[labels[*i]] += 1;
                } else {
                    right[labels[*i]] += 1;
                }
            }

            let n_left: usize = left.iter().sum();
            let n_right: usize = right.iter().sum();
            if n_left == 0 || n_right == 0 {
                continue;
            }

            let weighted = (n_left as f64 / total) * gini(&left)
                + (n_right as f64 / total) * gini(&right);
            let gain = parent_impurity - weighted;

            if gain > best_gain {
                best_gain = gain;
                best = Some((feature, threshold));
            }
        }
    }

    best
}

/// Trained forest: the opaque model state behind [`super::TrainedModel`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl RandomForest {
    /// Fit a forest on the given rows. `labels` are class indices in
    /// `0..n_classes`. Deterministic for a fixed `seed`.
    pub fn fit(
        rows: &[[f64; FEATURE_COUNT]],
        labels: &[usize],
        n_classes: usize,
        n_trees: usize,
        max_depth: usize,
        seed: u64,
    ) -> Self {
        let mut trees = Vec::with_capacity(n_trees);

        for t in 0..n_trees {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));

            // Bootstrap sample with replacement
            let sampled: Vec<usize> = (0..rows.len())
                .map(|_| rng.gen_range(0..rows.len()))
                .collect();
            let boot_rows: Vec<[f64; FEATURE_COUNT]> =
                sampled.iter().map(|i| rows[*i]).collect();
            let boot_labels: Vec<usize> = sampled.iter().map(|i| labels[*i]).collect();

            trees.push(DecisionTree::fit(
                &boot_rows,
                &boot_labels,
                n_classes,
                max_depth,
                &mut rng,
            ));
        }

        RandomForest { trees, n_classes }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Per-class probability estimates, averaged over all trees
    pub fn predict_proba(&self, features: &[f64; FEATURE_COUNT]) -> Vec<f64> {
        let mut summed = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in summed.iter_mut().zip(tree.predict_proba(features)) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        for p in &mut summed {
            *p /= n;
        }
        summed
    }

    /// Predicted class index: argmax of the probability estimates.
    /// Ties resolve to the lowest class index, deterministically.
    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> usize {
        let proba = self.predict_proba(features);
        let mut best = 0;
        for (i, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = i;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well-separated clusters on the attention axis
    fn toy_data() -> (Vec<[f64; FEATURE_COUNT]>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let mut low = [0.0; FEATURE_COUNT];
            low[0] = 10.0 + (i % 5) as f64;
            rows.push(low);
            labels.push(0);

            let mut high = [0.0; FEATURE_COUNT];
            high[0] = 80.0 + (i % 5) as f64;
            rows.push(high);
            labels.push(1);
        }
        (rows, labels)
    }

    #[test]
    fn test_separable_data_classified() {
        let (rows, labels) = toy_data();
        let forest = RandomForest::fit(&rows, &labels, 2, 20, 5, 42);

        let mut query = [0.0; FEATURE_COUNT];
        query[0] = 12.0;
        assert_eq!(forest.predict(&query), 0);

        query[0] = 83.0;
        assert_eq!(forest.predict(&query), 1);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (rows, labels) = toy_data();
        let forest = RandomForest::fit(&rows, &labels, 2, 10, 5, 42);

        let mut query = [0.0; FEATURE_COUNT];
        query[0] = 45.0;
        let proba = forest.predict_proba(&query);

        assert_eq!(proba.len(), 2);
        let sum: f64 = proba.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "probabilities sum to {}", sum);
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let (rows, labels) = toy_data();
        let a = RandomForest::fit(&rows, &labels, 2, 15, 6, 7);
        let b = RandomForest::fit(&rows, &labels, 2, 15, 6, 7);

        let mut query = [0.0; FEATURE_COUNT];
        for attention in [5.0, 45.0, 95.0] {
            query[0] = attention;
            assert_eq!(a.predict_proba(&query), b.predict_proba(&query));
        }
    }

    #[test]
    fn test_different_seeds_may_differ() {
        let (rows, labels) = toy_data();
        let a = RandomForest::fit(&rows, &labels, 2, 15, 6, 1);
        let b = RandomForest::fit(&rows, &labels, 2, 15, 6, 2);

        // Both must still get the easy cases right
        let mut query = [0.0; FEATURE_COUNT];
        query[0] = 11.0;
        assert_eq!(a.predict(&query), 0);
        assert_eq!(b.predict(&query), 0);
    }

    #[test]
    fn test_single_class_data() {
        // Degenerate input: the forest still fits and returns certainty
        let rows: Vec<[f64; FEATURE_COUNT]> = (0..10)
            .map(|i| {
                let mut r = [0.0; FEATURE_COUNT];
                r[0] = i as f64;
                r
            })
            .collect();
        let labels = vec![0usize; 10];

        let forest = RandomForest::fit(&rows, &labels, 1, 5, 3, 42);
        let proba = forest.predict_proba(&rows[0]);
        assert_eq!(proba, vec![1.0]);
    }

    #[test]
    fn test_serde_round_trip() {
        let (rows, labels) = toy_data();
        let forest = RandomForest::fit(&rows, &labels, 2, 5, 4, 42);

        let json = serde_json::to_string(&forest).unwrap();
        let restored: RandomForest = serde_json::from_str(&json).unwrap();

        let mut query = [0.0; FEATURE_COUNT];
        query[0] = 85.0;
        assert_eq!(forest.predict_proba(&query), restored.predict_proba(&query));
    }
}
