//! Random forest regression: bagged CART trees with squared-error splits.
//!
//! Trees are stored as flat node arrays (root = 0). Every node keeps the mean
//! target and the number of training samples that reached it, which is what
//! [`crate::shap`] needs to attribute predictions.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub type NodeId = u32;

/// Minimum node variance below which a node is never split.
const IMPURITY_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForestError {
    #[error("dataset has no rows")]
    EmptyDataset,
    #[error("feature matrix has {values} values, expected {rows} rows x {features} features")]
    ShapeMismatch {
        values: usize,
        rows: usize,
        features: usize,
    },
    #[error("invalid forest parameters: {0}")]
    InvalidParams(&'static str),
    #[error("tree {tree} is malformed: {source}")]
    InvalidTree {
        tree: usize,
        source: TreeValidationError,
    },
}

// ============================================================================
// Dataset
// ============================================================================

/// Row-major feature matrix with one regression target per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    n_features: usize,
    features: Vec<f64>,
    targets: Vec<f64>,
}

impl Dataset {
    pub fn new(n_features: usize, features: Vec<f64>, targets: Vec<f64>) -> Result<Self, ForestError> {
        if features.len() != targets.len() * n_features {
            return Err(ForestError::ShapeMismatch {
                values: features.len(),
                rows: targets.len(),
                features: n_features,
            });
        }
        Ok(Self {
            n_features,
            features,
            targets,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.targets.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn row(&self, index: usize) -> &[f64] {
        let start = index * self.n_features;
        &self.features[start..start + self.n_features]
    }

    #[inline]
    pub fn value(&self, index: usize, feature: usize) -> f64 {
        self.features[index * self.n_features + feature]
    }

    #[inline]
    pub fn target(&self, index: usize) -> f64 {
        self.targets[index]
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Copies the given rows (in order) into a new dataset.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        let mut features = Vec::with_capacity(indices.len() * self.n_features);
        let mut targets = Vec::with_capacity(indices.len());
        for &index in indices {
            features.extend_from_slice(self.row(index));
            targets.push(self.targets[index]);
        }
        Dataset {
            n_features: self.n_features,
            features,
            targets,
        }
    }
}

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means all of them.
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    /// Fixed seed for reproducible training.
    pub seed: Option<u64>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 20,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: None,
        }
    }
}

impl ForestParams {
    fn check(&self) -> Result<(), ForestError> {
        if self.n_estimators == 0 {
            return Err(ForestError::InvalidParams("n_estimators must be positive"));
        }
        if self.min_samples_split < 2 {
            return Err(ForestError::InvalidParams("min_samples_split must be at least 2"));
        }
        if self.min_samples_leaf == 0 {
            return Err(ForestError::InvalidParams("min_samples_leaf must be positive"));
        }
        if self.max_features == Some(0) {
            return Err(ForestError::InvalidParams("max_features must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// RegressionTree
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub feature: usize,
    pub threshold: f64,
    pub left: NodeId,
    pub right: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Mean training target of the samples reaching this node.
    pub value: f64,
    /// Number of training samples reaching this node.
    pub cover: f64,
    pub split: Option<Split>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.split.is_none()
    }
}

/// Structural validation errors for [`RegressionTree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,
    #[error("node {node} points to child {child}, but the tree has {n_nodes} nodes")]
    ChildOutOfBounds {
        node: NodeId,
        child: NodeId,
        n_nodes: usize,
    },
    #[error("node {node} references itself")]
    SelfLoop { node: NodeId },
    #[error("node {node} is reachable by more than one path")]
    DuplicateVisit { node: NodeId },
    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },
    #[error("node {node} splits on feature {feature}, but the model has {n_features}")]
    FeatureOutOfRange {
        node: NodeId,
        feature: usize,
        n_features: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    #[cfg(test)]
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut id: NodeId = 0;
        loop {
            let node = self.node(id);
            match node.split {
                Some(split) => id = split.next(row),
                None => return node.value,
            }
        }
    }

    /// Depth of the deepest leaf (a lone root has depth 0).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0 as NodeId, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Some(split) = self.node(id).split {
                stack.push((split.left, depth + 1));
                stack.push((split.right, depth + 1));
            }
        }
        max_depth
    }

    pub fn validate(&self, n_features: usize) -> Result<(), TreeValidationError> {
        let n_nodes = self.nodes.len();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        let mut visited = vec![false; n_nodes];
        let mut stack: Vec<NodeId> = vec![0];
        while let Some(id) = stack.pop() {
            if visited[id as usize] {
                return Err(TreeValidationError::DuplicateVisit { node: id });
            }
            visited[id as usize] = true;

            let Some(split) = self.nodes[id as usize].split else {
                continue;
            };
            if split.feature >= n_features {
                return Err(TreeValidationError::FeatureOutOfRange {
                    node: id,
                    feature: split.feature,
                    n_features,
                });
            }
            for child in [split.left, split.right] {
                if child == id {
                    return Err(TreeValidationError::SelfLoop { node: id });
                }
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds {
                        node: id,
                        child,
                        n_nodes,
                    });
                }
                stack.push(child);
            }
        }

        if let Some(node) = visited.iter().position(|seen| !seen) {
            return Err(TreeValidationError::UnreachableNode {
                node: node as NodeId,
            });
        }
        Ok(())
    }
}

impl Split {
    /// Child a row descends into: `x <= threshold` goes left.
    #[inline]
    pub fn next(&self, row: &[f64]) -> NodeId {
        if row[self.feature] <= self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

// ============================================================================
// Tree growth
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    threshold: f64,
    /// `sum_l^2 / n_l + sum_r^2 / n_r`; larger means lower squared error.
    proxy: f64,
}

struct TreeGrower<'a> {
    data: &'a Dataset,
    params: &'a ForestParams,
    rng: StdRng,
    nodes: Vec<Node>,
    scratch: Vec<(f64, f64)>,
}

impl<'a> TreeGrower<'a> {
    fn new(data: &'a Dataset, params: &'a ForestParams, rng: StdRng) -> Self {
        Self {
            data,
            params,
            rng,
            nodes: Vec::with_capacity(64),
            scratch: Vec::new(),
        }
    }

    fn fit(mut self, sample: &mut [usize]) -> RegressionTree {
        self.grow(sample, 0);
        RegressionTree { nodes: self.nodes }
    }

    fn grow(&mut self, indices: &mut [usize], depth: usize) -> NodeId {
        let id = self.nodes.len() as NodeId;
        let n = indices.len() as f64;
        let (sum, sum_sq) = indices.iter().fold((0.0, 0.0), |(s, sq), &i| {
            let y = self.data.target(i);
            (s + y, sq + y * y)
        });
        let mean = sum / n;
        self.nodes.push(Node {
            value: mean,
            cover: n,
            split: None,
        });

        let impurity = sum_sq / n - mean * mean;
        if depth >= self.params.max_depth
            || indices.len() < self.params.min_samples_split
            || indices.len() < 2 * self.params.min_samples_leaf
            || impurity <= IMPURITY_EPSILON
        {
            return id;
        }

        let Some(best) = self.best_split(indices, sum) else {
            return id;
        };

        let mut mid = 0;
        for k in 0..indices.len() {
            if self.data.value(indices[k], best.feature) <= best.threshold {
                indices.swap(mid, k);
                mid += 1;
            }
        }

        let (left_rows, right_rows) = indices.split_at_mut(mid);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[id as usize].split = Some(Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        });
        id
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n_features = self.data.n_features();
        match self.params.max_features {
            Some(k) if k < n_features => {
                let mut features = rand::seq::index::sample(&mut self.rng, n_features, k).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..n_features).collect(),
        }
    }

    fn best_split(&mut self, indices: &[usize], total: f64) -> Option<Candidate> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;
        let mut order = std::mem::take(&mut self.scratch);
        let mut best: Option<Candidate> = None;

        for feature in self.candidate_features() {
            order.clear();
            order.extend(
                indices
                    .iter()
                    .map(|&i| (self.data.value(i, feature), self.data.target(i))),
            );
            order.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
            if order[0].0 == order[n - 1].0 {
                continue;
            }

            let mut left_sum = 0.0;
            for k in 0..n - 1 {
                left_sum += order[k].1;
                let n_left = k + 1;
                let n_right = n - n_left;
                if order[k].0 == order[k + 1].0 || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let proxy =
                    left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
                if best.map_or(true, |b| proxy > b.proxy) {
                    best = Some(Candidate {
                        feature,
                        threshold: midpoint(order[k].0, order[k + 1].0),
                        proxy,
                    });
                }
            }
        }

        self.scratch = order;
        best
    }
}

/// Threshold between two distinct sorted values; never equal to the upper one.
fn midpoint(low: f64, high: f64) -> f64 {
    let mid = low + (high - low) / 2.0;
    if mid >= high {
        low
    } else {
        mid
    }
}

// ============================================================================
// RandomForest
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    params: ForestParams,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(data: &Dataset, params: &ForestParams) -> Result<Self, ForestError> {
        params.check()?;
        let n_rows = data.n_rows();
        if n_rows == 0 {
            return Err(ForestError::EmptyDataset);
        }

        let started = Instant::now();
        let base_seed = params.seed.unwrap_or_else(rand::random);
        info!(
            trees = params.n_estimators,
            max_depth = params.max_depth,
            rows = n_rows,
            "fitting random forest"
        );

        let trees: Vec<RegressionTree> = (0..params.n_estimators)
            .into_par_iter()
            .map(|tree_index| {
                let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(tree_index as u64));
                let mut sample: Vec<usize> = if params.bootstrap {
                    (0..n_rows).map(|_| rng.random_range(0..n_rows)).collect()
                } else {
                    (0..n_rows).collect()
                };
                let tree = TreeGrower::new(data, params, rng).fit(&mut sample);
                debug!(tree_index, nodes = tree.nodes.len(), "tree fitted");
                tree
            })
            .collect();

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "random forest fitted"
        );
        Ok(Self {
            n_features: data.n_features(),
            params: params.clone(),
            trees,
        })
    }

    /// Builds a forest from hand-made trees.
    #[cfg(test)]
    pub fn from_trees(n_features: usize, params: ForestParams, trees: Vec<RegressionTree>) -> Self {
        Self {
            n_features,
            params,
            trees,
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Mean of the tree outputs.
    pub fn predict(&self, row: &[f64]) -> f64 {
        debug_assert_eq!(row.len(), self.n_features);
        let total: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        total / self.trees.len() as f64
    }

    pub fn predict_dataset(&self, data: &Dataset) -> Vec<f64> {
        (0..data.n_rows())
            .into_par_iter()
            .map(|i| self.predict(data.row(i)))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::InvalidParams("forest has no trees"));
        }
        for (tree, t) in self.trees.iter().enumerate() {
            t.validate(self.n_features)
                .map_err(|source| ForestError::InvalidTree { tree, source })?;
        }
        Ok(())
    }
}
