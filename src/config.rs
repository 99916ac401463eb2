use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::corpus::DEFAULT_MARKER;
use crate::*;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormKind {
    /// Min-max scaling into [0, 1]
    Minmax,
    /// Entries sum to 1
    L1,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "bowclass", version)]
/// Train a binary image classifier on bag-of-visual-words histograms
pub struct Opts {
    /// Directory of training images. Images whose file name contains the marker are negative
    pub training_dir: PathBuf,
    /// Vocabulary size, also the width of the network input layer
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub vocab_size: u32,
    /// File name substring marking negative examples
    #[arg(long, default_value = DEFAULT_MARKER)]
    pub marker: String,
    /// Share of examples used for training, the rest is held out
    #[arg(long, default_value_t = 0.8)]
    pub split_ratio: f64,
    /// Hidden layer widths
    #[arg(long, value_delimiter = ',', default_value = "200,200", value_parser = layer_width)]
    pub hidden: Vec<usize>,
    /// Network activation function
    #[arg(long, value_enum, default_value_t = Activation::Gaussian)]
    pub activation: Activation,
    /// Histogram normalization
    #[arg(long, value_enum, default_value_t = NormKind::Minmax)]
    pub normalization: NormKind,
    /// Maximum k-means iterations
    #[arg(long, default_value_t = 10)]
    pub kmeans_iterations: usize,
    /// k-means stops once no centroid moves further than this
    #[arg(long, default_value_t = 0.01)]
    pub kmeans_epsilon: f32,
    /// Independent k-means runs, the one with the lowest distortion is kept
    #[arg(long, default_value_t = 1)]
    pub kmeans_attempts: usize,
    /// Maximum training epochs
    #[arg(long, default_value_t = 1000)]
    pub epochs: usize,
    #[arg(long, default_value_t = 0.1)]
    pub learning_rate: f32,
    #[arg(long, default_value_t = 0.1)]
    pub momentum: f32,
    /// Training stops once the epoch loss changes by less than this
    #[arg(long, default_value_t = 1e-5)]
    pub train_epsilon: f32,
    /// Seed for clustering, shuffling and weight initialization
    #[arg(long)]
    pub seed: Option<u64>,
    /// Descriptor rows reserved up front
    #[arg(long, default_value_t = 1 << 20)]
    pub capacity: usize,
    /// Fail instead of growing when the reserved rows run out
    #[arg(long)]
    pub fixed_capacity: bool,
    /// Maximum ORB keypoints per image
    #[arg(long, default_value_t = 500)]
    pub max_features: i32,
    /// Save the vocabulary to this file after clustering
    #[arg(long, value_name = "FILE")]
    pub save_vocab: Option<PathBuf>,
    /// Exit after the evaluation instead of asking for images to classify
    #[arg(long)]
    pub no_interactive: bool,
}

fn layer_width(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("a layer needs at least one unit".to_owned()),
        Ok(w) => Ok(w),
        Err(e) => Err(e.to_string()),
    }
}

impl Opts {
    pub fn k(&self) -> usize {
        self.vocab_size as usize
    }

    pub fn growth(&self) -> Growth {
        if self.fixed_capacity {
            Growth::Fixed
        } else {
            Growth::Double
        }
    }

    pub fn normalization(&self) -> Normalization {
        match self.normalization {
            NormKind::Minmax => Normalization::MinMax { bound: NORM_BOUND },
            NormKind::L1 => Normalization::L1 { bound: NORM_BOUND },
        }
    }

    pub fn kmeans(&self) -> KMeans {
        KMeans {
            criteria: TermCriteria {
                max_iterations: self.kmeans_iterations,
                epsilon: self.kmeans_epsilon,
            },
            attempts: self.kmeans_attempts,
            seed: self.seed,
        }
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(
            Topology::new(self.k(), &self.hidden),
            self.activation,
            TrainParams {
                learning_rate: self.learning_rate,
                momentum: self.momentum,
                max_epochs: self.epochs,
                epsilon: self.train_epsilon,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_reference_run() {
        let opts = Opts::try_parse_from(["bowclass", "data/train", "50"]).unwrap();
        assert_eq!(opts.k(), 50);
        assert_eq!(opts.split_ratio, 0.8);
        assert_eq!(opts.marker, "cat");
        assert_eq!(opts.growth(), Growth::Double);
        assert_eq!(opts.normalization(), Normalization::MinMax { bound: 1. });
        assert_eq!(opts.classifier().topology.layers(), &[50, 200, 200, 2]);
        assert_eq!(opts.classifier().activation, Activation::Gaussian);

        let km = opts.kmeans();
        assert_eq!(km.criteria.max_iterations, 10);
        assert_eq!(km.criteria.epsilon, 0.01);
        assert_eq!(km.attempts, 1);
    }

    #[test]
    fn overrides() {
        let opts = Opts::try_parse_from([
            "bowclass",
            "imgs",
            "8",
            "--hidden",
            "16",
            "--activation",
            "sigmoid-sym",
            "--normalization",
            "l1",
            "--fixed-capacity",
            "--seed",
            "3",
        ])
        .unwrap();
        assert_eq!(opts.classifier().topology.layers(), &[8, 16, 2]);
        assert_eq!(opts.classifier().activation, Activation::SigmoidSym);
        assert_eq!(opts.normalization(), Normalization::L1 { bound: 1. });
        assert_eq!(opts.growth(), Growth::Fixed);
        assert_eq!(opts.kmeans().seed, Some(3));
    }

    #[test]
    fn zero_width_hidden_layer_rejected() {
        assert!(Opts::try_parse_from(["bowclass", "imgs", "8", "--hidden", "0"]).is_err());
        assert!(Opts::try_parse_from(["bowclass", "imgs", "8", "--hidden", "16,0"]).is_err());
        assert!(Opts::try_parse_from(["bowclass", "imgs", "8", "--hidden", "x"]).is_err());
    }

    #[test]
    fn both_positionals_required() {
        assert!(Opts::try_parse_from(["bowclass", "data/train"]).is_err());
        assert!(Opts::try_parse_from(["bowclass", "data/train", "0"]).is_err());
    }
}
