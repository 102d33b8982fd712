//! Path-dependent TreeSHAP for [`RandomForest`] models.
//!
//! Attributions are exact Shapley values of the tree ensemble where missing
//! features are integrated out using node covers. For every row:
//!
//! ```text
//! baseline + sum(values) == forest.predict(row)
//! ```

use serde::Serialize;

use crate::forest::{NodeId, RandomForest, RegressionTree};

/// Signed per-feature attribution of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapValues {
    /// Expected model output over the training distribution.
    pub baseline: f64,
    pub values: Vec<f64>,
}

impl ShapValues {
    #[cfg(test)]
    pub fn total(&self) -> f64 {
        self.baseline + self.values.iter().sum::<f64>()
    }

    /// Multiplies baseline and values by a constant (e.g. a unit change).
    pub fn scaled(&self, factor: f64) -> ShapValues {
        ShapValues {
            baseline: self.baseline * factor,
            values: self.values.iter().map(|v| v * factor).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

pub struct TreeExplainer<'a> {
    forest: &'a RandomForest,
    baseline: f64,
}

impl<'a> TreeExplainer<'a> {
    pub fn new(forest: &'a RandomForest) -> Self {
        let trees = forest.trees();
        let baseline =
            trees.iter().map(expected_value).sum::<f64>() / trees.len().max(1) as f64;
        Self { forest, baseline }
    }

    #[cfg(test)]
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn explain(&self, row: &[f64]) -> ShapValues {
        let n_features = self.forest.n_features();
        let mut values = vec![0.0; n_features];
        for tree in self.forest.trees() {
            let mut path = Vec::with_capacity(32);
            recurse(tree, row, &mut values, 0, &mut path, 1.0, 1.0, None);
        }

        let n_trees = self.forest.trees().len().max(1) as f64;
        for value in &mut values {
            *value /= n_trees;
        }
        ShapValues {
            baseline: self.baseline,
            values,
        }
    }
}

/// Cover-weighted mean of the leaf values.
fn expected_value(tree: &RegressionTree) -> f64 {
    let root_cover = tree.node(0).cover;
    tree.nodes()
        .iter()
        .filter(|node| node.is_leaf())
        .map(|node| node.value * node.cover / root_cover)
        .sum()
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &RegressionTree,
    row: &[f64],
    phi: &mut [f64],
    node_id: NodeId,
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let parent_len = path.len();
    extend(path, zero_fraction, one_fraction, feature);
    let node = tree.node(node_id);

    match node.split {
        None => {
            let depth = path.len() - 1;
            for i in 1..=depth {
                let element = path[i];
                if let Some(f) = element.feature {
                    let weight = unwound_sum(path, i);
                    phi[f] += weight * (element.one_fraction - element.zero_fraction) * node.value;
                }
            }
        }
        Some(split) => {
            let hot = split.next(row);
            let cold = if hot == split.left { split.right } else { split.left };
            let hot_fraction = tree.node(hot).cover / node.cover;
            let cold_fraction = tree.node(cold).cover / node.cover;

            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            if let Some(k) = path.iter().position(|e| e.feature == Some(split.feature)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind(path, k);
            }

            let snapshot = path.clone();
            recurse(
                tree,
                row,
                phi,
                hot,
                path,
                hot_fraction * incoming_zero,
                incoming_one,
                Some(split.feature),
            );
            *path = snapshot;
            recurse(
                tree,
                row,
                phi,
                cold,
                path,
                cold_fraction * incoming_zero,
                0.0,
                Some(split.feature),
            );
        }
    }

    path.truncate(parent_len);
}

fn extend(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / denom;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / denom;
    }
}

fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for i in (0..depth).rev() {
        if one != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one_portion * denom / ((i + 1) as f64 * one);
            next_one_portion = tmp - path[i].weight * zero * (depth - i) as f64 / denom;
        } else {
            path[i].weight = path[i].weight * denom / (zero * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.truncate(depth);
}

fn unwound_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut total = 0.0;

    if one != 0.0 {
        let mut next_one_portion = path[depth].weight;
        for i in (0..depth).rev() {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one);
            total += tmp;
            next_one_portion = path[i].weight - tmp * zero * (depth - i) as f64 / denom;
        }
    } else {
        for i in (0..depth).rev() {
            total += path[i].weight / (zero * (depth - i) as f64 / denom);
        }
    }
    total
}
