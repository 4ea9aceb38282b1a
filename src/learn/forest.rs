use super::tree::{Tree, TreeParams};
use super::{
    Classifier, FitError, Learner, OutputShape, Outputs, Predictions, Targets, majority,
    to_predictions,
};
use crate::extractor::FeatureVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Bagged decision trees with per-split feature subsampling.
///
/// Tree `t` draws its bootstrap sample and feature subsets from a
/// `StdRng` seeded with `seed + t`, so a fit is reproducible.
#[derive(Debug, Clone)]
pub struct RandomForest {
    pub trees: usize,
    pub params: TreeParams,
    pub seed: u64,
}

/// Square root of the feature count, rounded down, at least 1.
const DEFAULT_MAX_FEATURES: usize = 2;

impl Learner for RandomForest {
    fn fit(
        &self,
        features: &[FeatureVector],
        targets: Targets<'_>,
    ) -> Result<Box<dyn Classifier>, FitError> {
        let outputs = Outputs::new(features, targets)?;
        if self.trees == 0 {
            return Err(FitError::InvalidParameter("trees must be at least 1".into()));
        }
        let params = TreeParams {
            max_features: Some(self.params.max_features.unwrap_or(DEFAULT_MAX_FEATURES)),
            ..self.params
        };
        params.validate()?;

        let n = outputs.rows();
        let trees = (0..self.trees)
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                Tree::grow(features, &outputs, sample, params, Some(&mut rng))
            })
            .collect();

        Ok(Box::new(ForestModel {
            shape: outputs.shape(),
            cardinality: outputs.cardinality().to_vec(),
            trees,
        }))
    }
}

struct ForestModel {
    shape: OutputShape,
    cardinality: Vec<usize>,
    trees: Vec<Tree>,
}

impl ForestModel {
    fn vote(&self, query: &FeatureVector) -> Vec<usize> {
        let mut counts: Vec<Vec<usize>> = self.cardinality.iter().map(|&c| vec![0; c]).collect();
        for tree in &self.trees {
            for (o, &v) in tree.leaf(query).iter().enumerate() {
                counts[o][v] += 1;
            }
        }
        counts.iter().map(|c| majority(c)).collect()
    }
}

impl Classifier for ForestModel {
    fn predict(&self, features: &[FeatureVector]) -> Predictions {
        let rows = features.iter().map(|f| self.vote(f)).collect();
        to_predictions(self.shape, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testdata::{clusters, one_hot};
    use super::*;

    fn forest(seed: u64) -> RandomForest {
        RandomForest {
            trees: 15,
            params: TreeParams {
                max_depth: None,
                min_samples_split: 2,
                max_features: None,
            },
            seed,
        }
    }

    #[test]
    fn test_separable_clusters() {
        let (features, labels) = clusters(3, 20);
        let model = forest(1)
            .fit(&features, Targets::Scalar { labels: &labels, classes: 3 })
            .unwrap();
        let queries = vec![
            FeatureVector::new([0.005, 0.495, 0.0, 0.125]),
            FeatureVector::new([2.005, 0.495, 0.0, 0.125]),
        ];
        assert_eq!(model.predict(&queries), Predictions::Scalar(vec![0, 2]));
    }

    #[test]
    fn test_same_seed_same_model() {
        let (features, labels) = clusters(3, 8);
        let targets = one_hot(&labels, 3);
        let probe: Vec<FeatureVector> = (0..30)
            .map(|i| FeatureVector::new([i as f64 * 0.1, 0.5, 0.0, 0.125]))
            .collect();
        let a = forest(9).fit(&features, Targets::Dense(&targets)).unwrap();
        let b = forest(9).fit(&features, Targets::Dense(&targets)).unwrap();
        assert_eq!(a.predict(&probe), b.predict(&probe));
    }

    #[test]
    fn test_zero_trees_rejected() {
        let (features, labels) = clusters(2, 3);
        let mut f = forest(0);
        f.trees = 0;
        assert!(matches!(
            f.fit(&features, Targets::Scalar { labels: &labels, classes: 2 }),
            Err(FitError::InvalidParameter(_))
        ));
    }
}
