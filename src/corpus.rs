use std::ops::Range;
use std::path::{Path, PathBuf};

use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{info, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::utils::pb_style;
use crate::*;

/// Default marker token: images whose file name contains it are negative examples.
pub const DEFAULT_MARKER: &str = "cat";

/// One successfully loaded training image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub label: Label,
    /// Rows of the descriptor pool holding this image's descriptors.
    pub range: Range<usize>,
}

/// What happened to the images of a corpus during ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Images that made it into the pool, degenerate ones included.
    pub loaded: usize,
    /// Images that could not be read, or whose descriptors did not fit the pool's
    /// dimension, and were skipped.
    pub unreadable: usize,
    /// Loaded images without a single descriptor.
    pub degenerate: usize,
    pub positive: usize,
    pub negative: usize,
    /// Total descriptors appended to the pool.
    pub descriptors: usize,
}

/// Files directly inside `dir`, sorted by file name.
pub fn scan_dir<P: AsRef<Path>>(dir: P) -> BowResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// An image is positive iff its file name does not contain `marker`.
pub fn label_for(path: &Path, marker: &str) -> Label {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    if name.contains(marker) {
        Label::Negative
    } else {
        Label::Positive
    }
}

/// Extract the descriptors of every image in `paths` and append them to `pool`.
///
/// Extraction runs in parallel batches; appends happen in input order, so the ranges
/// of consecutive records are adjacent. Unreadable images are skipped and counted,
/// images without descriptors are kept with an empty range.
pub fn ingest<E>(
    paths: &[PathBuf],
    extractor: &E,
    marker: &str,
    pool: &mut DescriptorPool,
) -> BowResult<(Vec<ImageRecord>, IngestReport)>
where
    E: DescriptorExtractor + Sync,
{
    info!("Extracting descriptors from {} images", paths.len());
    let mut records = Vec::with_capacity(paths.len());
    let mut report = IngestReport::default();

    let batch = rayon::current_num_threads() * 10;
    let pb = ProgressBar::new(paths.len() as u64).with_style(pb_style());
    for chunk in paths.chunks(batch.max(1)) {
        let extracted: Vec<_> = chunk
            .par_iter()
            .progress_with(pb.clone())
            .map(|path| extractor.extract(path))
            .collect();

        for (path, result) in chunk.iter().zip(extracted) {
            let descriptors = match result {
                Ok(d) => d,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.unreadable += 1;
                    continue;
                }
            };
            let range = match pool.append(&descriptors) {
                Ok(range) => range,
                Err(e @ BowErr::DimensionMismatch { .. }) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.unreadable += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if range.is_empty() {
                warn!("{} has no descriptors, its histogram will be empty", path.display());
                report.degenerate += 1;
            }

            let label = label_for(path, marker);
            match label {
                Label::Positive => report.positive += 1,
                Label::Negative => report.negative += 1,
            }
            report.loaded += 1;
            report.descriptors += range.len();
            records.push(ImageRecord {
                path: path.clone(),
                label,
                range,
            });
        }
    }
    pb.finish_and_clear();

    info!(
        "Loaded {} images ({} positive, {} negative), {} descriptors; skipped {} unreadable, {} without descriptors",
        report.loaded,
        report.positive,
        report.negative,
        report.descriptors,
        report.unreadable,
        report.degenerate
    );
    Ok((records, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use rstest::rstest;

    /// One descriptor per character of the file stem; files named `bad*` fail and
    /// files named `odd*` return a partial row.
    struct StemLength;

    impl DescriptorExtractor for StemLength {
        fn dim(&self) -> usize {
            2
        }

        fn extract(&self, path: &Path) -> BowResult<Vec<f32>> {
            let stem = path.file_stem().unwrap().to_string_lossy().to_string();
            if stem.starts_with("bad") {
                return Err(BowErr::ImageRead(path.to_path_buf()));
            }
            if stem.starts_with("odd") {
                return Ok(vec![1.; 3]);
            }
            let n = if stem.starts_with("empty") { 0 } else { stem.len() };
            Ok(vec![n as f32; n * 2])
        }
    }

    #[rstest]
    #[case("dog_01.jpg", Label::Positive)]
    #[case("cat_01.jpg", Label::Negative)]
    #[case("bobcat.png", Label::Negative)]
    #[case("smoke.jpg", Label::Positive)]
    fn labels_by_file_name(#[case] name: &str, #[case] expected: Label) {
        assert_eq!(label_for(Path::new(name), DEFAULT_MARKER), expected);
    }

    #[test]
    fn marker_in_directory_does_not_count() {
        assert_eq!(
            label_for(Path::new("/data/cats/dog.jpg"), DEFAULT_MARKER),
            Label::Positive
        );
    }

    #[test]
    fn scan_lists_files_sorted() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("b.jpg").touch().unwrap();
        dir.child("a.jpg").touch().unwrap();
        dir.child("nested").create_dir_all().unwrap();
        dir.child("nested/c.jpg").touch().unwrap();

        let names: Vec<String> = scan_dir(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn ingest_skips_and_counts() {
        let paths: Vec<PathBuf> = ["abc.jpg", "bad.jpg", "cat.jpg", "empty.jpg", "wxyz.jpg"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let mut pool = DescriptorPool::reserve(4, 2, Growth::Double);
        let (records, report) = ingest(&paths, &StemLength, DEFAULT_MARKER, &mut pool).unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(
            records.iter().map(|r| r.range.clone()).collect::<Vec<_>>(),
            vec![0..3, 3..6, 6..6, 6..10]
        );
        assert_eq!(
            report,
            IngestReport {
                loaded: 4,
                unreadable: 1,
                degenerate: 1,
                positive: 3,
                negative: 1,
                descriptors: 10,
            }
        );
        let total: usize = records.iter().map(|r| r.range.len()).sum();
        assert_eq!(pool.finalize().rows(), total);
    }

    #[test]
    fn partial_rows_skip_only_that_image() {
        let paths: Vec<PathBuf> = ["abc.jpg", "odd.jpg", "wxyz.jpg"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let mut pool = DescriptorPool::reserve(4, 2, Growth::Double);
        let (records, report) = ingest(&paths, &StemLength, DEFAULT_MARKER, &mut pool).unwrap();

        assert_eq!(
            records.iter().map(|r| r.range.clone()).collect::<Vec<_>>(),
            vec![0..3, 3..7]
        );
        assert_eq!(report.loaded, 2);
        assert_eq!(report.unreadable, 1);
        assert_eq!(pool.finalize().rows(), 7);
    }

    #[test]
    fn fixed_pool_overflow_aborts_ingestion() {
        let paths = vec![PathBuf::from("abcdef.jpg")];
        let mut pool = DescriptorPool::reserve(4, 2, Growth::Fixed);
        assert!(matches!(
            ingest(&paths, &StemLength, DEFAULT_MARKER, &mut pool),
            Err(BowErr::CapacityExceeded { .. })
        ));
    }
}
