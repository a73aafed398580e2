//! Gradient-boosted tree ensemble loaded from an XGBoost JSON model.
//!
//! Supports `gbtree` boosters with numerical splits and a logistic objective.
//! Besides probabilities it produces exact TreeSHAP contributions, so the
//! explanation path does not need a second artifact.
//!
//! Missing values follow each split's default direction. For sparse input,
//! absent columns are missing; for dense input only NaN is.

use crate::error::ClassifierError;
use crate::models::classifier::Classifier;
use crate::sparse::SparseRow;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ModelFile {
    learner: LearnerJson,
}

#[derive(Debug, Deserialize)]
struct LearnerJson {
    #[serde(default)]
    attributes: HashMap<String, Value>,
    gradient_booster: GradientBoosterJson,
    learner_model_param: HashMap<String, Value>,
    objective: ObjectiveJson,
}

#[derive(Debug, Deserialize)]
struct GradientBoosterJson {
    name: String,
    #[serde(default)]
    model: Option<GbTreeModelJson>,
}

#[derive(Debug, Deserialize)]
struct GbTreeModelJson {
    #[serde(default)]
    gbtree_model_param: HashMap<String, Value>,
    trees: Vec<TreeJson>,
    #[serde(default)]
    tree_info: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct ObjectiveJson {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TreeJson {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    sum_hessian: Vec<f64>,
    #[serde(default)]
    split_type: Vec<i64>,
}

/// Older exports write booleans, newer ones 0/1.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Int(i) => *i != 0,
        }
    }
}

/// Learner params are written as strings ("5E-1", "[5E-1]", "100").
fn param_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim_matches(|c| c == '[' || c == ']').to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_param<T: std::str::FromStr>(params: &HashMap<String, Value>, key: &str) -> Option<T> {
    params.get(key).and_then(param_str).and_then(|s| s.parse().ok())
}

/// Output transformation of the objective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Objective {
    /// base_score is a probability; margin -> sigmoid
    Logistic,
    /// base_score is already a margin
    LogitRaw,
}

#[derive(Debug, Clone)]
struct Node {
    left: usize,
    right: usize,
    feature: usize,
    threshold: f32,
    default_left: bool,
    is_leaf: bool,
    /// Leaf value (only meaningful for leaves)
    value: f64,
    cover: f64,
}

impl Node {
    fn next(&self, fvalue: f32) -> usize {
        if fvalue.is_nan() {
            if self.default_left {
                self.left
            } else {
                self.right
            }
        } else if fvalue < self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
    /// Cover-weighted mean of the leaf values
    expected_value: f64,
}

impl Tree {
    fn from_json(tree: TreeJson, num_features: usize) -> Result<Self> {
        let n = tree.left_children.len();
        if n == 0 {
            bail!("tree has no nodes");
        }
        if tree.right_children.len() != n
            || tree.split_indices.len() != n
            || tree.split_conditions.len() != n
            || tree.default_left.len() != n
            || tree.sum_hessian.len() != n
        {
            bail!("tree node arrays have inconsistent lengths");
        }
        if tree.split_type.iter().any(|&t| t != 0) {
            bail!("categorical splits are not supported");
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (tree.left_children[i], tree.right_children[i]);
            let is_leaf = left == -1;
            if is_leaf {
                nodes.push(Node {
                    left: 0,
                    right: 0,
                    feature: 0,
                    threshold: 0.0,
                    default_left: false,
                    is_leaf,
                    value: tree.split_conditions[i] as f64,
                    cover: tree.sum_hessian[i],
                });
                continue;
            }

            // Children are allocated after their parent; this also rules out cycles
            let in_range = |c: i64| c > i as i64 && (c as usize) < n;
            if !in_range(left) || !in_range(right) || left == right {
                bail!("node {} has invalid children ({}, {})", i, left, right);
            }
            let feature = tree.split_indices[i];
            if feature < 0 || feature as usize >= num_features {
                bail!("node {} splits on feature {} of {}", i, feature, num_features);
            }
            if tree.sum_hessian[i] <= 0.0 {
                bail!("node {} has non-positive cover", i);
            }
            nodes.push(Node {
                left: left as usize,
                right: right as usize,
                feature: feature as usize,
                threshold: tree.split_conditions[i],
                default_left: tree.default_left[i].is_set(),
                is_leaf,
                value: 0.0,
                cover: tree.sum_hessian[i],
            });
        }

        // Children have larger ids, so a reverse sweep sees them first
        let mut means = vec![0.0f64; n];
        for i in (0..n).rev() {
            let node = &nodes[i];
            means[i] = if node.is_leaf {
                node.value
            } else {
                let (l, r) = (&nodes[node.left], &nodes[node.right]);
                (means[node.left] * l.cover + means[node.right] * r.cover) / node.cover
            };
        }

        Ok(Self {
            nodes,
            expected_value: means[0],
        })
    }

    fn leaf_value(&self, x: &[f32]) -> f64 {
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            if node.is_leaf {
                return node.value;
            }
            idx = node.next(x[node.feature]);
        }
    }

    /// Add this tree's SHAP values for `x` into `phi`.
    fn shap(&self, x: &[f32], phi: &mut [f64]) {
        self.shap_recurse(x, phi, 0, Vec::new(), 1.0, 1.0, None);
    }

    #[allow(clippy::too_many_arguments)]
    fn shap_recurse(
        &self,
        x: &[f32],
        phi: &mut [f64],
        node_idx: usize,
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        extend_path(&mut path, zero_fraction, one_fraction, feature);
        let node = &self.nodes[node_idx];

        if node.is_leaf {
            for i in 1..path.len() {
                let w = unwound_path_sum(&path, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    phi[f] += w * (el.one_fraction - el.zero_fraction) * node.value;
                }
            }
            return;
        }

        let hot = node.next(x[node.feature]);
        let cold = if hot == node.left {
            node.right
        } else {
            node.left
        };
        let hot_zero_fraction = self.nodes[hot].cover / node.cover;
        let cold_zero_fraction = self.nodes[cold].cover / node.cover;

        // A feature seen higher up the path is merged, not counted twice
        let mut incoming_zero = 1.0;
        let mut incoming_one = 1.0;
        if let Some(pos) = path.iter().position(|el| el.feature == Some(node.feature)) {
            incoming_zero = path[pos].zero_fraction;
            incoming_one = path[pos].one_fraction;
            unwind_path(&mut path, pos);
        }

        self.shap_recurse(
            x,
            phi,
            hot,
            path.clone(),
            hot_zero_fraction * incoming_zero,
            incoming_one,
            Some(node.feature),
        );
        self.shap_recurse(
            x,
            phi,
            cold,
            path,
            cold_zero_fraction * incoming_zero,
            0.0,
            Some(node.feature),
        );
    }
}

fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let d1 = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / d1;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / d1;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, path_index: usize) {
    let depth = path.len() - 1;
    let d1 = (depth + 1) as f64;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * d1 / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / d1;
        } else {
            path[i].pweight = path[i].pweight * d1 / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in path_index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

fn unwound_path_sum(path: &[PathElement], path_index: usize) -> f64 {
    let depth = path.len() - 1;
    let d1 = (depth + 1) as f64;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * d1 / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * ((depth - i) as f64 / d1);
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((depth - i) as f64 / d1);
        }
    }
    total
}

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Fitted gradient-boosted tree classifier
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    name: String,
    trees: Vec<Tree>,
    num_features: usize,
    base_margin: f64,
}

impl TreeEnsemble {
    /// Load an XGBoost JSON model file.
    pub fn load<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model from {:?}", path))?;
        Self::from_json(&raw, name).with_context(|| format!("Invalid model artifact {:?}", path))
    }

    /// Parse an XGBoost JSON model.
    pub fn from_json(raw: &str, name: &str) -> Result<Self> {
        let file: ModelFile = serde_json::from_str(raw)?;
        let learner = file.learner;

        let objective = match learner.objective.name.as_str() {
            "binary:logistic" | "reg:logistic" => Objective::Logistic,
            "binary:logitraw" => Objective::LogitRaw,
            other => bail!("unsupported objective '{}'", other),
        };

        if learner.gradient_booster.name != "gbtree" {
            bail!(
                "unsupported booster '{}', expected gbtree",
                learner.gradient_booster.name
            );
        }
        let model = learner
            .gradient_booster
            .model
            .context("gbtree booster has no model section")?;

        let num_features: usize = parse_param(&learner.learner_model_param, "num_feature")
            .context("learner_model_param.num_feature missing or invalid")?;
        let num_class: usize = parse_param(&learner.learner_model_param, "num_class").unwrap_or(0);
        if num_class > 1 || model.tree_info.iter().any(|&g| g != 0) {
            bail!("multi-class models are not supported");
        }

        let base_score: f64 = parse_param(&learner.learner_model_param, "base_score").unwrap_or(0.5);
        let base_margin = match objective {
            Objective::Logistic => {
                if !(base_score > 0.0 && base_score < 1.0) {
                    bail!("base_score {} must lie in (0, 1)", base_score);
                }
                (base_score / (1.0 - base_score)).ln()
            }
            Objective::LogitRaw => base_score,
        };

        // Early-stopped models only use trees up to the best iteration
        let num_parallel_tree: usize =
            parse_param(&model.gbtree_model_param, "num_parallel_tree").unwrap_or(1);
        let tree_limit = parse_param::<usize>(&learner.attributes, "best_iteration")
            .map(|best| (best + 1) * num_parallel_tree.max(1))
            .unwrap_or(usize::MAX);

        let trees = model
            .trees
            .into_iter()
            .take(tree_limit)
            .enumerate()
            .map(|(i, t)| Tree::from_json(t, num_features).with_context(|| format!("tree {}", i)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            trees,
            num_features,
            base_margin,
        })
    }

    /// Number of trees used for prediction
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Raw (pre-sigmoid) output for a sparse row
    pub fn predict_margin(&self, row: &SparseRow) -> Result<f64, ClassifierError> {
        self.check_width(row.width())?;
        Ok(self.margin(&row.to_dense_with_missing()))
    }

    fn margin(&self, x: &[f32]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.leaf_value(x)).sum::<f64>()
    }

    fn check_width(&self, width: usize) -> Result<(), ClassifierError> {
        if width != self.num_features {
            return Err(ClassifierError::WidthMismatch {
                expected: self.num_features,
                actual: width,
            });
        }
        Ok(())
    }
}

impl Classifier for TreeEnsemble {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_features(&self) -> Option<usize> {
        Some(self.num_features)
    }

    fn predict_proba_sparse(&self, row: &SparseRow) -> Result<f64, ClassifierError> {
        let margin = self.predict_margin(row)?;
        Ok(sigmoid(margin))
    }

    fn predict_proba_dense(&self, row: &[f32]) -> Result<f64, ClassifierError> {
        self.check_width(row.len())?;
        Ok(sigmoid(self.margin(row)))
    }

    fn contributions(&self, row: &SparseRow) -> Result<Vec<f64>, ClassifierError> {
        self.check_width(row.width())?;
        let x = row.to_dense_with_missing();

        let mut phi = vec![0.0f64; self.num_features + 1];
        for tree in &self.trees {
            tree.shap(&x, &mut phi);
            phi[self.num_features] += tree.expected_value;
        }
        phi[self.num_features] += self.base_margin;
        Ok(phi)
    }
}
