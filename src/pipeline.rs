use std::path::{Path, PathBuf};

use log::{info, warn};
use rand::{rngs::StdRng, SeedableRng};

use crate::config::Opts;
use crate::corpus::{ingest, scan_dir};
use crate::utils::ScopedTimer;
use crate::*;

/// Everything a finished training run produced.
#[derive(Debug)]
pub struct Outcome {
    pub records: Vec<ImageRecord>,
    pub report: IngestReport,
    pub vocabulary: Vocabulary,
    pub encoder: HistogramEncoder,
    pub dataset: Dataset,
    pub split_ratio: f64,
    pub classifier: Classifier,
    pub model: Mlp,
    /// False when training stopped at the epoch limit.
    pub converged: bool,
    /// Error percentage on the held-out partition.
    pub test_error: f32,
    /// Error percentage on the training partition.
    pub train_error: f32,
}

impl Outcome {
    pub fn split(&self) -> BowResult<Split<'_>> {
        self.dataset.split(self.split_ratio)
    }
}

/// Train and evaluate a classifier on the images of `opts.training_dir`.
pub fn run<E>(opts: &Opts, extractor: &E) -> BowResult<Outcome>
where
    E: DescriptorExtractor + Sync,
{
    let paths = scan_dir(&opts.training_dir)?;
    run_on(&paths, opts, extractor)
}

/// Same as [`run`] on an explicit list of images.
pub fn run_on<E>(paths: &[PathBuf], opts: &Opts, extractor: &E) -> BowResult<Outcome>
where
    E: DescriptorExtractor + Sync,
{
    let k = opts.k();
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (records, report, pooled) = {
        let _t = ScopedTimer::new("Retrieved descriptors for all images");
        let mut pool = DescriptorPool::reserve(opts.capacity, extractor.dim(), opts.growth());
        let (records, report) = ingest(paths, extractor, &opts.marker, &mut pool)?;
        let pooled = pool.finalize();
        info!("Descriptor set now has {} rows", pooled.rows());
        (records, report, pooled)
    };

    let vocabulary = {
        let _t = ScopedTimer::new("Clustered descriptors into the visual vocabulary");
        Vocabulary::build(&pooled, k, &opts.kmeans())?
    };
    drop(pooled);
    info!("{:?}", vocabulary);

    save_vocabulary(opts, &vocabulary)?;

    let encoder = HistogramEncoder::new(k, opts.normalization());
    let mut dataset = {
        let examples = records
            .iter()
            .map(|r| {
                let features = encoder.encode(vocabulary.assignment(), r.range.clone())?;
                Ok(Example::new(r.label, features))
            })
            .collect::<BowResult<Vec<_>>>()?;
        Dataset::assemble(examples)?
    };
    dataset.shuffle(&mut rng);
    info!("Assembled {} examples of {} features", dataset.len(), dataset.k());

    let classifier = opts.classifier();
    let split = dataset.split(opts.split_ratio)?;
    if split.train.is_empty() {
        return Err(BowErr::EmptyDataset);
    }
    if split.test.is_empty() {
        warn!("No examples left for the test partition, its error is meaningless");
    }
    let model = {
        let _t = ScopedTimer::new("Trained neural network");
        classifier.train(&split, &mut rng)?
    };
    let test_error = classifier.evaluate(&model, &split, Partition::Test);
    let train_error = classifier.evaluate(&model, &split, Partition::Train);

    Ok(Outcome {
        records,
        report,
        vocabulary,
        encoder,
        dataset,
        split_ratio: opts.split_ratio,
        classifier,
        converged: model.converged(),
        model,
        test_error,
        train_error,
    })
}

#[cfg(feature = "bincode")]
fn save_vocabulary(opts: &Opts, vocabulary: &Vocabulary) -> BowResult<()> {
    if let Some(path) = &opts.save_vocab {
        vocabulary.save(path)?;
        info!("Saved vocabulary to {}", path.display());
    }
    Ok(())
}

#[cfg(not(feature = "bincode"))]
fn save_vocabulary(opts: &Opts, _vocabulary: &Vocabulary) -> BowResult<()> {
    if opts.save_vocab.is_some() {
        warn!("Built without the bincode feature, not saving the vocabulary");
    }
    Ok(())
}

/// Classify a single image with a trained run.
///
/// An image without descriptors still gets a prediction, from the all-zero histogram.
pub fn classify_image<E: DescriptorExtractor>(
    outcome: &Outcome,
    extractor: &E,
    path: &Path,
) -> BowResult<Prediction> {
    let descriptors = extractor.extract(path)?;
    let words = outcome.vocabulary.quantize(&descriptors)?;
    if words.is_empty() {
        warn!("{} has no descriptors", path.display());
    }
    let features = outcome.encoder.encode_words(&words)?;
    Ok(outcome.classifier.predict(&outcome.model, &features))
}
