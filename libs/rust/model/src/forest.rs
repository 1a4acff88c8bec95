//! CART decision trees (gini impurity) and a bagged random forest over them.

use crate::features::N_FEATURES;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means sqrt of the feature count.
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
}

impl ForestParams {
    fn features_per_split(&self) -> usize {
        let n = self.max_features.unwrap_or_else(|| (N_FEATURES as f64).sqrt().floor() as usize);
        n.clamp(1, N_FEATURES)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Split { feature: usize, threshold: f64, left: usize, right: usize },
    Leaf { distribution: Vec<f64> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct Grower<'a> {
    x: &'a [[f64; N_FEATURES]],
    y: &'a [usize],
    n_classes: usize,
    params: &'a ForestParams,
}

fn class_counts(y: &[usize], idx: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; n_classes];
    for &i in idx {
        counts[y[i]] += 1;
    }
    counts
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let t = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / t).powi(2)).sum::<f64>()
}

impl Grower<'_> {
    fn leaf(&self, counts: &[usize], total: usize) -> Node {
        let distribution = counts.iter().map(|&c| c as f64 / total.max(1) as f64).collect();
        Node::Leaf { distribution }
    }

    /// Best `(weighted impurity, feature, threshold, left size)` among the sampled features.
    fn best_split(&self, idx: &mut [usize], features: &[usize]) -> Option<(f64, usize, f64, usize)> {
        let n = idx.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<(f64, usize, f64, usize)> = None;
        for &f in features {
            idx.sort_by(|&a, &b| self.x[a][f].total_cmp(&self.x[b][f]));
            let total = class_counts(self.y, idx, self.n_classes);
            let mut left = vec![0usize; self.n_classes];
            for pos in 1..n {
                left[self.y[idx[pos - 1]]] += 1;
                let lo = self.x[idx[pos - 1]][f];
                let hi = self.x[idx[pos]][f];
                if lo >= hi || pos < min_leaf || n - pos < min_leaf {
                    continue;
                }
                let right: Vec<usize> = total.iter().zip(&left).map(|(t, l)| t - l).collect();
                let impurity = (pos as f64 * gini(&left, pos) + (n - pos) as f64 * gini(&right, n - pos)) / n as f64;
                if best.map_or(true, |(b, ..)| impurity < b) {
                    best = Some((impurity, f, (lo + hi) / 2.0, pos));
                }
            }
        }
        best
    }

    fn grow(&self, nodes: &mut Vec<Node>, idx: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let total = idx.len();
        let counts = class_counts(self.y, idx, self.n_classes);
        let impurity = gini(&counts, total);
        let id = nodes.len();
        nodes.push(self.leaf(&counts, total));
        if depth >= self.params.max_depth || total < self.params.min_samples_split.max(2) || impurity == 0.0 {
            return id;
        }

        let mut features: Vec<usize> = (0..N_FEATURES).collect();
        features.shuffle(rng);
        features.truncate(self.params.features_per_split());

        let Some((split_impurity, feature, threshold, _)) = self.best_split(idx, &features) else {
            return id;
        };
        if split_impurity >= impurity {
            return id;
        }
        idx.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
        let pos = idx.partition_point(|&i| self.x[i][feature] <= threshold);
        let (left_idx, right_idx) = idx.split_at_mut(pos);
        let left = self.grow(nodes, left_idx, depth + 1, rng);
        let right = self.grow(nodes, right_idx, depth + 1, rng);
        nodes[id] = Node::Split { feature, threshold, left, right };
        id
    }
}

impl DecisionTree {
    fn fit(grower: &Grower<'_>, mut idx: Vec<usize>, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        grower.grow(&mut nodes, &mut idx, 0, rng);
        Self { nodes }
    }

    pub fn predict_proba(&self, x: &[f64; N_FEATURES]) -> &[f64] {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Split { feature, threshold, left, right } => {
                    at = if x[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { distribution } => return distribution,
            }
        }
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }

    /// Structural check for trees read from disk. Children must come after
    /// their parent, which also rules out cycles.
    pub fn check(&self, n_classes: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".into());
        }
        for (at, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split { feature, threshold, left, right } => {
                    if *feature >= N_FEATURES {
                        return Err(format!("node {at} splits on feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {at} has threshold {threshold}"));
                    }
                    for child in [*left, *right] {
                        if child <= at || child >= self.nodes.len() {
                            return Err(format!("node {at} points at node {child}"));
                        }
                    }
                }
                Node::Leaf { distribution } if distribution.len() != n_classes => {
                    return Err(format!("leaf {at} has {} classes, expected {n_classes}", distribution.len()));
                }
                Node::Leaf { .. } => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_classes: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(params: &ForestParams, x: &[[f64; N_FEATURES]], y: &[usize], n_classes: usize) -> Self {
        let grower = Grower { x, y, n_classes, params };
        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = x.len();
        let trees = (0..params.n_estimators.max(1))
            .map(|_| {
                let idx: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::fit(&grower, idx, &mut rng)
            })
            .collect();
        Self { params: params.clone(), n_classes, trees }
    }

    /// Mean of the per-tree leaf class distributions.
    pub fn predict_proba(&self, x: &[f64; N_FEATURES]) -> Vec<f64> {
        let mut acc = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (a, p) in acc.iter_mut().zip(tree.predict_proba(x)) {
                *a += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        acc.iter_mut().for_each(|a| *a /= n);
        acc
    }

    pub fn check(&self, n_classes: usize) -> Result<(), String> {
        if self.n_classes != n_classes {
            return Err(format!("forest has {} classes, expected {n_classes}", self.n_classes));
        }
        if self.trees.is_empty() {
            return Err("forest has no trees".into());
        }
        self.trees.iter().enumerate().try_for_each(|(i, t)| t.check(n_classes).map_err(|e| format!("tree {i}: {e}")))
    }

    pub fn n_classes(&self) -> usize { self.n_classes }
    pub fn trees(&self) -> &[DecisionTree] { &self.trees }
    pub fn params(&self) -> &ForestParams { &self.params }
}
