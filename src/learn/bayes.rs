use super::{Classifier, FitError, Learner, OutputShape, Predictions, Targets};
use crate::extractor::{FEATURE_DIM, FeatureVector};

/// Fraction of the largest feature variance added to every variance.
const VAR_SMOOTHING: f64 = 1e-9;
/// Floor for the smoothing term when every feature is constant.
const MIN_EPSILON: f64 = 1e-12;

/// Gaussian naive Bayes. Only scalar targets are supported.
#[derive(Debug, Clone, Copy)]
pub struct GaussianNb;

struct ClassStats {
    class: usize,
    log_prior: f64,
    mean: [f64; FEATURE_DIM],
    var: [f64; FEATURE_DIM],
}

struct GaussianNbModel {
    classes: Vec<ClassStats>,
}

impl Learner for GaussianNb {
    fn fit(
        &self,
        features: &[FeatureVector],
        targets: Targets<'_>,
    ) -> Result<Box<dyn Classifier>, FitError> {
        let (labels, classes) = match targets {
            Targets::Scalar { labels, classes } => (labels, classes),
            Targets::Dense(_) => {
                return Err(FitError::UnsupportedShape {
                    learner: "gaussian naive bayes",
                    shape: OutputShape::Dense,
                });
            }
        };
        // Shape checks shared with the other learners
        super::Outputs::new(features, targets)?;

        let epsilon = (VAR_SMOOTHING * max_variance(features)).max(MIN_EPSILON);
        let n = features.len() as f64;

        let mut stats = Vec::new();
        for class in 0..classes {
            let members: Vec<&FeatureVector> = features
                .iter()
                .zip(labels)
                .filter(|&(_, &l)| l == class)
                .map(|(f, _)| f)
                .collect();
            if members.is_empty() {
                continue;
            }

            let (mean, var) = mean_var(&members);
            stats.push(ClassStats {
                class,
                log_prior: (members.len() as f64 / n).ln(),
                mean,
                var: var.map(|v| v + epsilon),
            });
        }

        Ok(Box::new(GaussianNbModel { classes: stats }))
    }
}

fn mean_var(rows: &[&FeatureVector]) -> ([f64; FEATURE_DIM], [f64; FEATURE_DIM]) {
    let n = rows.len() as f64;
    let mut mean = [0.0; FEATURE_DIM];
    let mut var = [0.0; FEATURE_DIM];
    for row in rows {
        for (m, v) in mean.iter_mut().zip(row.values()) {
            *m += v / n;
        }
    }
    for row in rows {
        for d in 0..FEATURE_DIM {
            let diff = row.values()[d] - mean[d];
            var[d] += diff * diff / n;
        }
    }
    (mean, var)
}

fn max_variance(features: &[FeatureVector]) -> f64 {
    let rows: Vec<&FeatureVector> = features.iter().collect();
    let (_, var) = mean_var(&rows);
    var.into_iter().fold(0.0, f64::max)
}

impl GaussianNbModel {
    fn predict_one(&self, query: &FeatureVector) -> usize {
        let mut best = (usize::MAX, f64::NEG_INFINITY);
        for stats in &self.classes {
            let log_likelihood: f64 = (0..FEATURE_DIM)
                .map(|d| {
                    let diff = query.values()[d] - stats.mean[d];
                    -0.5 * (2.0 * std::f64::consts::PI * stats.var[d]).ln()
                        - diff * diff / (2.0 * stats.var[d])
                })
                .sum();
            let score = stats.log_prior + log_likelihood;
            if best.0 == usize::MAX || score > best.1 {
                best = (stats.class, score);
            }
        }
        best.0
    }
}

impl Classifier for GaussianNbModel {
    fn predict(&self, features: &[FeatureVector]) -> Predictions {
        Predictions::Scalar(features.iter().map(|f| self.predict_one(f)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testdata::{clusters, one_hot};
    use super::*;

    #[test]
    fn test_separates_clusters() {
        let (features, labels) = clusters(3, 10);
        let model = GaussianNb
            .fit(&features, Targets::Scalar { labels: &labels, classes: 3 })
            .unwrap();
        assert_eq!(model.predict(&features), Predictions::Scalar(labels));
    }

    #[test]
    fn test_unseen_class_never_predicted() {
        let (features, _) = clusters(2, 4);
        let labels = vec![0, 0, 0, 0, 2, 2, 2, 2];
        let model = GaussianNb
            .fit(&features, Targets::Scalar { labels: &labels, classes: 3 })
            .unwrap();
        let Predictions::Scalar(predicted) = model.predict(&features) else {
            panic!("scalar model returned dense output");
        };
        assert!(predicted.iter().all(|&p| p != 1));
    }

    #[test]
    fn test_constant_features() {
        let features = vec![FeatureVector::new([0.5; 4]); 4];
        let model = GaussianNb
            .fit(&features, Targets::Scalar { labels: &[1, 1, 0, 1], classes: 2 })
            .unwrap();
        assert_eq!(model.predict(&features[..1]), Predictions::Scalar(vec![1]));
    }

    #[test]
    fn test_dense_unsupported() {
        let (features, labels) = clusters(2, 2);
        let targets = one_hot(&labels, 2);
        assert!(matches!(
            GaussianNb.fit(&features, Targets::Dense(&targets)),
            Err(FitError::UnsupportedShape { .. })
        ));
    }
}
