use super::{Classifier, FitError, Learner, Outputs, Predictions, Targets, majority, to_predictions};
use crate::extractor::FeatureVector;

/// k-nearest-neighbours by Euclidean distance, majority vote per output.
#[derive(Debug, Clone)]
pub struct KNearest {
    pub k: usize,
}

struct KNearestModel {
    k: usize,
    features: Vec<FeatureVector>,
    outputs: Outputs,
}

impl Learner for KNearest {
    fn min_training_rows(&self) -> usize {
        self.k.max(1)
    }

    fn fit(
        &self,
        features: &[FeatureVector],
        targets: Targets<'_>,
    ) -> Result<Box<dyn Classifier>, FitError> {
        let outputs = Outputs::new(features, targets)?;
        if self.k == 0 {
            return Err(FitError::InvalidParameter("k must be at least 1".into()));
        }
        if self.k > features.len() {
            return Err(FitError::InvalidParameter(format!(
                "k = {} exceeds {} training rows",
                self.k,
                features.len()
            )));
        }
        Ok(Box::new(KNearestModel {
            k: self.k,
            features: features.to_vec(),
            outputs,
        }))
    }
}

impl KNearestModel {
    fn predict_one(&self, query: &FeatureVector) -> Vec<usize> {
        let mut distances: Vec<(f64, usize)> = self
            .features
            .iter()
            .enumerate()
            .map(|(i, f)| (query.distance_sq(f), i))
            .collect();

        // Equidistant neighbours resolve by training order
        let k = self.k - 1;
        distances.select_nth_unstable_by(k, |a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut counts = self.outputs.empty_counts();
        for &(_, i) in &distances[..self.k] {
            self.outputs.add(&mut counts, i);
        }
        counts.iter().map(|c| majority(c)).collect()
    }
}

impl Classifier for KNearestModel {
    fn predict(&self, features: &[FeatureVector]) -> Predictions {
        let rows = features.iter().map(|f| self.predict_one(f)).collect();
        to_predictions(self.outputs.shape(), rows)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testdata::{clusters, one_hot};
    use super::*;

    #[test]
    fn test_scalar_clusters() {
        let (features, labels) = clusters(3, 10);
        let model = KNearest { k: 3 }
            .fit(&features, Targets::Scalar { labels: &labels, classes: 3 })
            .unwrap();
        let queries = vec![
            FeatureVector::new([0.01, 0.5, 0.0, 0.125]),
            FeatureVector::new([2.02, 0.5, 0.0, 0.125]),
        ];
        assert_eq!(model.predict(&queries), Predictions::Scalar(vec![0, 2]));
    }

    #[test]
    fn test_dense_clusters() {
        let (features, labels) = clusters(3, 10);
        let targets = one_hot(&labels, 3);
        let model = KNearest { k: 5 }.fit(&features, Targets::Dense(&targets)).unwrap();
        let queries = vec![FeatureVector::new([1.0, 0.5, 0.0, 0.125])];
        assert_eq!(model.predict(&queries), Predictions::Dense(vec![vec![0.0, 1.0, 0.0]]));
    }

    #[test]
    fn test_invalid_k() {
        let (features, labels) = clusters(2, 2);
        let targets = Targets::Scalar { labels: &labels, classes: 2 };
        assert!(matches!(
            KNearest { k: 0 }.fit(&features, targets),
            Err(FitError::InvalidParameter(_))
        ));
        assert!(matches!(
            KNearest { k: 5 }.fit(&features, targets),
            Err(FitError::InvalidParameter(_))
        ));
    }
}
