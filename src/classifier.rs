use log::info;
use ndarray::ArrayView1;
use rand::Rng;
use smallvec::SmallVec;

use crate::dataset::{features, labels};
use crate::*;

/// Layer widths of the network: `[k, hidden..., 2]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology(SmallVec<[usize; 6]>);

impl Topology {
    pub fn new(k: usize, hidden: &[usize]) -> Self {
        let mut layers = SmallVec::with_capacity(hidden.len() + 2);
        layers.push(k);
        layers.extend_from_slice(hidden);
        layers.push(OUTPUT_CLASSES);
        Self(layers)
    }

    pub fn layers(&self) -> &[usize] {
        &self.0
    }

    pub fn inputs(&self) -> usize {
        self.0[0]
    }
}

/// Classifier output for one feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: Label,
    /// Raw output unit responses, positive class first.
    pub scores: [f32; OUTPUT_CLASSES],
}

/// A trained predictor.
pub trait Model {
    fn predict(&self, features: &[f32]) -> Prediction;
}

impl Model for Mlp {
    fn predict(&self, features: &[f32]) -> Prediction {
        let out = self.forward(ArrayView1::from(features));
        let scores = [out[0], out[1]];
        let label = Label::from_index(if scores[1] > scores[0] { 1 } else { 0 });
        Prediction { label, scores }
    }
}

/// Builds, trains and evaluates the network on a dataset split.
#[derive(Debug, Clone)]
pub struct Classifier {
    pub topology: Topology,
    pub activation: Activation,
    pub params: TrainParams,
}

impl Classifier {
    pub fn new(topology: Topology, activation: Activation, params: TrainParams) -> Self {
        Self {
            topology,
            activation,
            params,
        }
    }

    /// Train a fresh network on the train partition of `split`.
    pub fn train<R: Rng + ?Sized>(&self, split: &Split<'_>, rng: &mut R) -> BowResult<Mlp> {
        if self.topology.layers().contains(&0) {
            return Err(BowErr::InvalidTopology(self.topology.layers().to_vec()));
        }
        let k = self.topology.inputs();
        let x = features(split.train, k);
        let y = labels(split.train);
        info!(
            "Training network {:?} on {} examples",
            self.topology.layers(),
            split.train.len()
        );
        let mut net = Mlp::new(self.topology.layers(), self.activation, rng);
        net.train(x.view(), y.view(), &self.params, rng)?;
        Ok(net)
    }

    /// Percentage of misclassified examples in one partition of `split`.
    pub fn evaluate<M: Model>(&self, model: &M, split: &Split<'_>, partition: Partition) -> f32 {
        error_rate(model, split.partition(partition))
    }

    pub fn predict<M: Model>(&self, model: &M, features: &[f32]) -> Prediction {
        model.predict(features)
    }

    /// Predictions over the train partition.
    ///
    /// These examples were seen during training, so this is a diagnostic and says
    /// nothing about generalization; see [`holdout_predictions`](Self::holdout_predictions).
    pub fn diagnostic_predictions<M: Model>(
        &self,
        model: &M,
        split: &Split<'_>,
    ) -> Vec<(Label, Prediction)> {
        predictions(model, split.train)
    }

    /// Predictions over the held-out test partition.
    pub fn holdout_predictions<M: Model>(
        &self,
        model: &M,
        split: &Split<'_>,
    ) -> Vec<(Label, Prediction)> {
        predictions(model, split.test)
    }
}

fn predictions<M: Model>(model: &M, examples: &[Example]) -> Vec<(Label, Prediction)> {
    examples
        .iter()
        .map(|e| (e.label, model.predict(&e.features)))
        .collect()
}

/// Misclassified share of `examples`, in percent. Zero for no examples.
pub fn error_rate<M: Model>(model: &M, examples: &[Example]) -> f32 {
    if examples.is_empty() {
        return 0.;
    }
    let wrong = examples
        .iter()
        .filter(|e| model.predict(&e.features).label != e.label)
        .count();
    100. * wrong as f32 / examples.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    /// Positive iff the first feature dominates.
    struct FirstWins;

    impl Model for FirstWins {
        fn predict(&self, features: &[f32]) -> Prediction {
            let label = if features[0] >= features[1] {
                Label::Positive
            } else {
                Label::Negative
            };
            Prediction {
                label,
                scores: label.code(),
            }
        }
    }

    fn separable(n: usize) -> Dataset {
        let examples = (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Example::new(Label::Positive, vec![1., 0., 0.2])
                } else {
                    Example::new(Label::Negative, vec![0., 1., 0.2])
                }
            })
            .collect();
        Dataset::assemble(examples).unwrap()
    }

    #[test]
    fn topology_wraps_hidden_layers() {
        let t = Topology::new(50, &[200, 200]);
        assert_eq!(t.layers(), &[50, 200, 200, 2]);
        assert_eq!(t.inputs(), 50);
        assert_eq!(Topology::new(8, &[]).layers(), &[8, 2]);
    }

    #[test]
    fn error_rate_counts_mistakes() {
        let examples = vec![
            Example::new(Label::Positive, vec![1., 0.]),
            Example::new(Label::Positive, vec![0., 1.]),
            Example::new(Label::Negative, vec![0., 1.]),
            Example::new(Label::Negative, vec![1., 0.]),
        ];
        assert_eq!(error_rate(&FirstWins, &examples), 50.);
        assert_eq!(error_rate(&FirstWins, &examples[..1]), 0.);
        assert_eq!(error_rate(&FirstWins, &[]), 0.);
    }

    #[test]
    fn diagnostic_predictions_cover_train_partition_only() {
        let ds = separable(10);
        let split = ds.split(0.8).unwrap();
        let clf = Classifier::new(Topology::new(3, &[]), Activation::Identity, TrainParams::default());
        assert_eq!(clf.diagnostic_predictions(&FirstWins, &split).len(), 8);
        assert_eq!(clf.holdout_predictions(&FirstWins, &split).len(), 2);
    }

    #[test]
    fn zero_width_layer_is_rejected() {
        let ds = separable(10);
        let split = ds.split(0.8).unwrap();
        let clf = Classifier::new(Topology::new(3, &[0]), Activation::Gaussian, TrainParams::default());
        match clf.train(&split, &mut StdRng::seed_from_u64(0)) {
            Err(BowErr::InvalidTopology(layers)) => assert_eq!(layers, vec![3, 0, 2]),
            other => panic!("expected InvalidTopology, got {:?}", other.map(|m| m.layer_sizes())),
        }
    }

    #[test]
    fn trains_on_separable_histograms() {
        let ds = separable(40);
        let split = ds.split(0.8).unwrap();
        let clf = Classifier::new(
            Topology::new(3, &[4]),
            Activation::SigmoidSym,
            TrainParams {
                learning_rate: 0.2,
                momentum: 0.5,
                max_epochs: 300,
                epsilon: 0.,
            },
        );
        let mut rng = StdRng::seed_from_u64(17);
        let net = clf.train(&split, &mut rng).unwrap();

        assert_eq!(net.layer_sizes(), vec![3, 4, 2]);
        assert_eq!(clf.evaluate(&net, &split, Partition::Train), 0.);
        assert_eq!(clf.evaluate(&net, &split, Partition::Test), 0.);
        assert_eq!(clf.predict(&net, &[1., 0., 0.2]).label, Label::Positive);
        assert_eq!(clf.predict(&net, &[0., 1., 0.2]).label, Label::Negative);
    }
}
