//! CART decision tree over the feature vector, Gini impurity summed across
//! outputs.

use super::{
    Classifier, FitError, Learner, OutputShape, Outputs, Predictions, Targets, majority,
    to_predictions,
};
use crate::extractor::{FEATURE_DIM, FeatureVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features tried per split; `None` tries all of them.
    pub max_features: Option<usize>,
}

impl TreeParams {
    pub(crate) fn validate(&self) -> Result<(), FitError> {
        if self.min_samples_split < 2 {
            return Err(FitError::InvalidParameter(
                "min_samples_split must be at least 2".into(),
            ));
        }
        if let Some(m) = self.max_features {
            if m == 0 || m > FEATURE_DIM {
                return Err(FitError::InvalidParameter(format!(
                    "max_features must be in 1..={FEATURE_DIM}, got {m}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    pub params: TreeParams,
}

impl Learner for DecisionTree {
    fn fit(
        &self,
        features: &[FeatureVector],
        targets: Targets<'_>,
    ) -> Result<Box<dyn Classifier>, FitError> {
        let outputs = Outputs::new(features, targets)?;
        self.params.validate()?;
        let rows: Vec<usize> = (0..outputs.rows()).collect();
        let tree = Tree::grow(features, &outputs, rows, self.params, None);
        Ok(Box::new(TreeModel {
            shape: outputs.shape(),
            tree,
        }))
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Vec<usize>),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree stored as a node arena.
#[derive(Debug, Clone)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
    root: usize,
}

impl Tree {
    /// Grow a tree on `rows` (indices into `features`, repeats allowed).
    pub(crate) fn grow(
        features: &[FeatureVector],
        outputs: &Outputs,
        mut rows: Vec<usize>,
        params: TreeParams,
        rng: Option<&mut StdRng>,
    ) -> Self {
        let mut builder = Builder {
            features,
            outputs,
            params,
            rng,
            nodes: Vec::new(),
        };
        let root = builder.node(&mut rows, 0);
        Tree {
            nodes: builder.nodes,
            root,
        }
    }

    /// Per-output predicted values for one row.
    pub(crate) fn leaf(&self, query: &FeatureVector) -> &[usize] {
        let mut idx = self.root;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(values) => return values,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if query.values()[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, self.root)
    }
}

struct Builder<'a, 'r> {
    features: &'a [FeatureVector],
    outputs: &'a Outputs,
    params: TreeParams,
    rng: Option<&'r mut StdRng>,
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl Builder<'_, '_> {
    fn node(&mut self, rows: &mut [usize], depth: usize) -> usize {
        let mut counts = self.outputs.empty_counts();
        for &r in rows.iter() {
            self.outputs.add(&mut counts, r);
        }
        let impurity = gini(&counts, rows.len());

        let stop = impurity == 0.0
            || rows.len() < self.params.min_samples_split
            || self.params.max_depth.is_some_and(|d| depth >= d);

        let split = if stop { None } else { self.best_split(rows, &counts) };

        match split {
            Some(s) if s.impurity < impurity => {
                let value = |r: usize| self.features[r].values()[s.feature];
                rows.sort_by(|&a, &b| value(a).total_cmp(&value(b)));
                let mid = rows.partition_point(|&r| value(r) <= s.threshold);
                let (left_rows, right_rows) = rows.split_at_mut(mid);
                let left = self.node(left_rows, depth + 1);
                let right = self.node(right_rows, depth + 1);
                self.push(Node::Split {
                    feature: s.feature,
                    threshold: s.threshold,
                    left,
                    right,
                })
            }
            _ => self.push(Node::Leaf(counts.iter().map(|c| majority(c)).collect())),
        }
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Feature visiting order and how many to inspect before settling for
    /// the best split found so far.
    fn feature_order(&mut self) -> (Vec<usize>, usize) {
        let mut order: Vec<usize> = (0..FEATURE_DIM).collect();
        match (self.params.max_features, self.rng.as_deref_mut()) {
            (Some(m), Some(rng)) => {
                order.shuffle(rng);
                (order, m)
            }
            _ => (order, FEATURE_DIM),
        }
    }

    /// Lowest weighted-impurity threshold over the sampled features; the
    /// first one found wins ties. Keeps looking past the sample while no
    /// valid split exists.
    fn best_split(&mut self, rows: &[usize], counts: &[Vec<usize>]) -> Option<SplitCandidate> {
        let n = rows.len();
        let mut best: Option<SplitCandidate> = None;
        let mut sorted = rows.to_vec();

        let (order, inspect) = self.feature_order();
        for (j, feature) in order.into_iter().enumerate() {
            if j >= inspect && best.is_some() {
                break;
            }
            let value = |r: usize| self.features[r].values()[feature];
            sorted.sort_by(|&a, &b| value(a).total_cmp(&value(b)));

            let mut left = self.outputs.empty_counts();
            let mut right = counts.to_vec();

            for i in 0..n - 1 {
                let r = sorted[i];
                for (o, &v) in self.outputs.row(r).iter().enumerate() {
                    left[o][v] += 1;
                    right[o][v] -= 1;
                }

                let (here, next) = (value(r), value(sorted[i + 1]));
                if here == next {
                    continue;
                }

                let n_left = i + 1;
                let n_right = n - n_left;
                let impurity = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;

                if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                    // Adjacent floats can round the midpoint up to `next`
                    let midpoint = here + (next - here) / 2.0;
                    best = Some(SplitCandidate {
                        feature,
                        threshold: if midpoint < next { midpoint } else { here },
                        impurity,
                    });
                }
            }
        }
        best
    }
}

/// Gini impurity summed over outputs.
fn gini(counts: &[Vec<usize>], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    counts
        .iter()
        .map(|output| 1.0 - output.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>())
        .sum()
}

struct TreeModel {
    shape: OutputShape,
    tree: Tree,
}

impl Classifier for TreeModel {
    fn predict(&self, features: &[FeatureVector]) -> Predictions {
        let rows = features.iter().map(|f| self.tree.leaf(f).to_vec()).collect();
        to_predictions(self.shape, rows)
    }
}
