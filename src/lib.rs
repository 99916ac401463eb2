use std::path::PathBuf;
use thiserror::Error;

/// Contiguous, capacity-bounded storage for the descriptors of a whole corpus.
pub mod pool;
pub use pool::{DescriptorPool, Growth, PooledDescriptors};

/// Lloyd k-means with k-means++ seeding, used to quantize descriptor space.
pub mod kmeans;
pub use kmeans::{Clusterer, Clustering, KMeans, TermCriteria};

/// Visual vocabulary built by clustering the descriptor pool,
/// which provides the word assignment the histograms are built from.
pub mod vocab;
pub use vocab::Vocabulary;

/// Histogram encoding of word assignments.
pub mod bow;
pub use bow::{BoW, HistogramEncoder, Normalization, NORM_BOUND};

/// Labeled examples, shuffling and train/test partitioning.
pub mod dataset;
pub use dataset::{Dataset, Example, Partition, Split};

/// Feed-forward network used as the classifier backend.
pub mod mlp;
pub use mlp::{Activation, Mlp, TrainParams};

/// Thin harness around the network: topology, training, error rates.
pub mod classifier;
pub use classifier::{Classifier, Model, Prediction, Topology};

/// Descriptor extraction seam.
pub mod extract;
pub use extract::DescriptorExtractor;

/// Utilities for extracting keypoint descriptors using opencv.
pub mod opencv_utils;
#[cfg(feature = "opencv")]
pub use opencv_utils::*;

/// Corpus scanning, labeling and ingestion into the descriptor pool.
pub mod corpus;
pub use corpus::{ImageRecord, IngestReport};

/// Command line options.
pub mod config;

/// End-to-end training run and single image classification.
pub mod pipeline;

pub mod utils;

/// Number of output units of the classifier; one per binary class.
pub const OUTPUT_CLASSES: usize = 2;

/// Binary label of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    /// One-hot response code. Positive is `[1, 0]`, negative is `[0, 1]`.
    pub fn code(self) -> [f32; OUTPUT_CLASSES] {
        match self {
            Label::Positive => [1., 0.],
            Label::Negative => [0., 1.],
        }
    }

    /// Inverse of [`Label::code`] for the index of the winning output unit.
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Label::Positive,
            _ => Label::Negative,
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, Label::Positive)
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Positive => f.pad("positive"),
            Label::Negative => f.pad("negative"),
        }
    }
}

pub type BowResult<T> = std::result::Result<T, BowErr>;

#[derive(Error, Debug)]
pub enum BowErr {
    #[error("Io Error")]
    Io(#[from] std::io::Error),
    #[error("Could not read image {0:?}")]
    ImageRead(PathBuf),
    #[error("Descriptor pool capacity exceeded: capacity {capacity} rows, {requested} rows requested")]
    CapacityExceeded { capacity: usize, requested: usize },
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Insufficient data: {descriptors} descriptors cannot form {k} clusters")]
    InsufficientData { descriptors: usize, k: usize },
    #[error("{stage} did not converge after {iterations} iterations (last metric {metric})")]
    ConvergenceFailure {
        stage: &'static str,
        iterations: usize,
        metric: f32,
    },
    #[error("Assignment has {assignment} entries for {descriptors} descriptors")]
    AssignmentMismatch { assignment: usize, descriptors: usize },
    #[error("Range {start}..{end} is outside of an assignment of length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },
    #[error("Word {word} is outside of a vocabulary of size {k}")]
    WordOutOfRange { word: usize, k: usize },
    #[error("Network layers {0:?} must all be at least one unit wide")]
    InvalidTopology(Vec<usize>),
    #[error("Dataset has no examples")]
    EmptyDataset,
    #[error("Split ratio {0} must be in (0, 1)")]
    InvalidSplitRatio(f64),
    #[cfg(feature = "bincode")]
    #[error("Vocabulary Serialization Error")]
    Bincode(#[from] bincode::Error),
    #[cfg(feature = "opencv")]
    #[error("Opencv Error")]
    OpenCvInternal(#[from] opencv::Error),
    #[cfg(feature = "opencv")]
    #[error("Opencv Descriptor decode error")]
    OpenCvDecode,
}
