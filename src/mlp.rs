use clap::ValueEnum;
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{seq::SliceRandom, Rng};

use crate::*;

/// Neuron activation, following the OpenCV `ANN_MLP` formulas with `alpha = beta = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Activation {
    /// `exp(-x^2)`
    #[default]
    Gaussian,
    /// `(1 - exp(-x)) / (1 + exp(-x))`
    SigmoidSym,
    Identity,
}

impl Activation {
    #[inline]
    fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Gaussian => (-x * x).exp(),
            Activation::SigmoidSym => (x / 2.).tanh(),
            Activation::Identity => x,
        }
    }

    /// Derivative with respect to the pre-activation `x`.
    #[inline]
    fn derivative(self, x: f32) -> f32 {
        match self {
            Activation::Gaussian => -2. * x * (-x * x).exp(),
            Activation::SigmoidSym => {
                let t = (x / 2.).tanh();
                0.5 * (1. - t * t)
            }
            Activation::Identity => 1.,
        }
    }
}

/// Backpropagation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainParams {
    pub learning_rate: f32,
    pub momentum: f32,
    pub max_epochs: usize,
    /// Training stops once the epoch loss changes by less than this.
    pub epsilon: f32,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            momentum: 0.1,
            max_epochs: 1000,
            epsilon: 1e-5,
        }
    }
}

#[derive(Debug, Clone)]
struct Layer {
    /// `inputs × outputs`
    weights: Array2<f32>,
    bias: Array1<f32>,
}

/// Fully connected feed-forward network.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Layer>,
    activation: Activation,
    epochs: usize,
    loss: f32,
    converged: bool,
}

impl Mlp {
    /// Randomly initialized network with the given layer widths, input layer first.
    pub fn new<R: Rng + ?Sized>(sizes: &[usize], activation: Activation, rng: &mut R) -> Self {
        assert!(sizes.len() >= 2, "a network needs at least an input and an output layer");
        let layers = sizes
            .windows(2)
            .map(|w| {
                let limit = 1. / (w[0] as f32).sqrt();
                Layer {
                    weights: Array2::from_shape_fn((w[0], w[1]), |_| rng.gen_range(-limit..limit)),
                    bias: Array1::from_shape_fn(w[1], |_| rng.gen_range(-limit..limit)),
                }
            })
            .collect();
        Self {
            layers,
            activation,
            epochs: 0,
            loss: f32::NAN,
            converged: false,
        }
    }

    /// Online backpropagation with momentum over the rows of `inputs`/`targets`.
    ///
    /// Samples are visited in a fresh random order every epoch. Fails with
    /// [`BowErr::ConvergenceFailure`] when the loss stops being finite. Running out of
    /// epochs before the loss settles is not an error, but leaves
    /// [`converged`](Self::converged) unset.
    pub fn train<R: Rng + ?Sized>(
        &mut self,
        inputs: ArrayView2<f32>,
        targets: ArrayView2<f32>,
        params: &TrainParams,
        rng: &mut R,
    ) -> BowResult<()> {
        if inputs.nrows() != targets.nrows() {
            return Err(BowErr::DimensionMismatch {
                expected: inputs.nrows(),
                found: targets.nrows(),
            });
        }
        if inputs.ncols() != self.inputs() {
            return Err(BowErr::DimensionMismatch {
                expected: self.inputs(),
                found: inputs.ncols(),
            });
        }
        if targets.ncols() != self.outputs() {
            return Err(BowErr::DimensionMismatch {
                expected: self.outputs(),
                found: targets.ncols(),
            });
        }
        if inputs.nrows() == 0 {
            return Err(BowErr::EmptyDataset);
        }

        let mut velocity: Vec<(Array2<f32>, Array1<f32>)> = self
            .layers
            .iter()
            .map(|l| (Array2::zeros(l.weights.raw_dim()), Array1::zeros(l.bias.len())))
            .collect();
        let mut order: Vec<usize> = (0..inputs.nrows()).collect();
        let mut previous = f32::INFINITY;
        let mut change = f32::INFINITY;
        self.converged = false;

        for epoch in 1..=params.max_epochs {
            order.shuffle(rng);
            let mut loss = 0.;
            for &i in &order {
                loss += self.step(inputs.row(i), targets.row(i), params, &mut velocity);
            }
            loss /= inputs.nrows() as f32;
            self.epochs = epoch;
            self.loss = loss;

            if !loss.is_finite() {
                return Err(BowErr::ConvergenceFailure {
                    stage: "training",
                    iterations: epoch,
                    metric: loss,
                });
            }
            if epoch % 100 == 0 {
                debug!("Epoch {} - mean squared error {:.6}", epoch, loss);
            }
            change = (previous - loss).abs();
            if change < params.epsilon {
                self.converged = true;
                break;
            }
            previous = loss;
        }
        if self.converged {
            info!(
                "Network trained for {} epochs, final mean squared error {:.6}",
                self.epochs, self.loss
            );
        } else {
            warn!(
                "Training stopped at the epoch limit ({}) with mean squared error {:.6}, last change {:.6}",
                self.epochs,
                self.loss,
                change
            );
        }
        Ok(())
    }

    /// One forward/backward pass for a single sample. Returns its squared error.
    fn step(
        &mut self,
        x: ArrayView1<f32>,
        target: ArrayView1<f32>,
        params: &TrainParams,
        velocity: &mut [(Array2<f32>, Array1<f32>)],
    ) -> f32 {
        let act = self.activation;
        let (zs, outs) = self.forward_trace(x);
        let last = self.layers.len() - 1;

        let err = &outs[last + 1] - &target;
        let loss = err.mapv(|e| e * e).sum();
        let mut delta = &err * &zs[last].mapv(|z| act.derivative(z));

        for l in (0..self.layers.len()).rev() {
            let grad_w = outs[l]
                .view()
                .insert_axis(Axis(1))
                .dot(&delta.view().insert_axis(Axis(0)));
            // Propagate through the weights before they are updated
            let next = if l > 0 {
                Some(self.layers[l].weights.dot(&delta) * zs[l - 1].mapv(|z| act.derivative(z)))
            } else {
                None
            };

            let (vw, vb) = &mut velocity[l];
            vw.mapv_inplace(|v| v * params.momentum);
            vw.scaled_add(-params.learning_rate, &grad_w);
            vb.mapv_inplace(|v| v * params.momentum);
            vb.scaled_add(-params.learning_rate, &delta);
            self.layers[l].weights += &*vw;
            self.layers[l].bias += &*vb;

            match next {
                Some(d) => delta = d,
                None => break,
            }
        }
        loss
    }

    /// Pre-activations of every layer and the outputs of every layer, input included.
    fn forward_trace(&self, x: ArrayView1<f32>) -> (Vec<Array1<f32>>, Vec<Array1<f32>>) {
        let mut zs = Vec::with_capacity(self.layers.len());
        let mut outs = Vec::with_capacity(self.layers.len() + 1);
        outs.push(x.to_owned());
        for (l, layer) in self.layers.iter().enumerate() {
            let z = outs[l].dot(&layer.weights) + &layer.bias;
            outs.push(z.mapv(|v| self.activation.apply(v)));
            zs.push(z);
        }
        (zs, outs)
    }

    /// Output layer response for one input vector.
    pub fn forward(&self, x: ArrayView1<f32>) -> Array1<f32> {
        self.layers.iter().fold(x.to_owned(), |a, layer| {
            (a.dot(&layer.weights) + &layer.bias).mapv(|v| self.activation.apply(v))
        })
    }

    pub fn inputs(&self) -> usize {
        self.layers[0].weights.nrows()
    }

    pub fn outputs(&self) -> usize {
        self.layers[self.layers.len() - 1].weights.ncols()
    }

    /// Layer widths, input layer first.
    pub fn layer_sizes(&self) -> Vec<usize> {
        std::iter::once(self.inputs())
            .chain(self.layers.iter().map(|l| l.weights.ncols()))
            .collect()
    }

    /// Epochs run by the last call to [`train`](Self::train).
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Mean squared error of the last training epoch.
    pub fn loss(&self) -> f32 {
        self.loss
    }

    /// Whether the last call to [`train`](Self::train) stopped because the loss settled,
    /// rather than at the epoch limit.
    pub fn converged(&self) -> bool {
        self.converged
    }
}
