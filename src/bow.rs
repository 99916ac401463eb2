use std::ops::Range;

use crate::*;

/// Bag-of-Words representation of an image.
///
/// Index: word id in the vocabulary.
///
/// Value: normalized frequency of that word among the image's descriptors.
pub type BoW = Vec<f32>;

/// Upper bound of normalized histogram values, shared by every image.
pub const NORM_BOUND: f32 = 1.;

/// How raw word counts are scaled into the classifier's input range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    /// Min-max scaling into `[0, bound]`. A constant histogram maps to all zeros.
    MinMax { bound: f32 },
    /// Scale so the entries sum to `bound`.
    L1 { bound: f32 },
}

impl Default for Normalization {
    fn default() -> Self {
        Normalization::MinMax { bound: NORM_BOUND }
    }
}

impl Normalization {
    pub fn bound(&self) -> f32 {
        match *self {
            Normalization::MinMax { bound } | Normalization::L1 { bound } => bound,
        }
    }

    fn apply(&self, counts: &mut [f32]) {
        match *self {
            Normalization::MinMax { bound } => {
                let (min, max) = counts
                    .iter()
                    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &c| {
                        (lo.min(c), hi.max(c))
                    });
                let span = max - min;
                if span > 0. {
                    let scale = bound / span;
                    counts.iter_mut().for_each(|c| *c = (*c - min) * scale);
                } else {
                    counts.iter_mut().for_each(|c| *c = 0.);
                }
            }
            Normalization::L1 { bound } => {
                let sum: f32 = counts.iter().sum();
                if sum > 0. {
                    let scale = bound / sum;
                    counts.iter_mut().for_each(|c| *c *= scale);
                }
            }
        }
    }
}

/// Turns word assignments into fixed-length, normalized histograms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramEncoder {
    k: usize,
    normalization: Normalization,
}

impl HistogramEncoder {
    pub fn new(k: usize, normalization: Normalization) -> Self {
        Self { k, normalization }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Histogram of the words assigned to pool rows `range`.
    pub fn encode(&self, assignment: &[usize], range: Range<usize>) -> BowResult<BoW> {
        match assignment.get(range.clone()) {
            Some(words) => self.encode_words(words),
            None => Err(BowErr::InvalidRange {
                start: range.start,
                end: range.end,
                len: assignment.len(),
            }),
        }
    }

    /// Histogram of an arbitrary word sequence. An empty sequence gives all zeros.
    pub fn encode_words(&self, words: &[usize]) -> BowResult<BoW> {
        let mut bow = self.count(words)?;
        self.normalization.apply(&mut bow);
        Ok(bow)
    }

    /// Raw, unnormalized word counts.
    pub fn count(&self, words: &[usize]) -> BowResult<BoW> {
        let mut counts: BoW = vec![0.; self.k];
        for &w in words {
            match counts.get_mut(w) {
                Some(c) => *c += 1.,
                None => return Err(BowErr::WordOutOfRange { word: w, k: self.k }),
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ASSIGNMENT: [usize; 10] = [0, 1, 2, 3, 0, 1, 2, 3, 0, 1];

    #[rstest]
    #[case(0..3, vec![1., 1., 1., 0.])]
    #[case(3..7, vec![1., 1., 1., 1.])]
    #[case(4..10, vec![2., 2., 1., 1.])]
    #[case(7..10, vec![1., 1., 0., 1.])]
    #[case(5..5, vec![0., 0., 0., 0.])]
    fn counts_words_in_range(#[case] range: std::ops::Range<usize>, #[case] expected: Vec<f32>) {
        let encoder = HistogramEncoder::new(4, Normalization::default());
        assert_eq!(encoder.count(&ASSIGNMENT[range]).unwrap(), expected);
    }

    #[test]
    fn minmax_scales_into_bound() {
        let encoder = HistogramEncoder::new(4, Normalization::MinMax { bound: 1. });
        let bow = encoder.encode(&ASSIGNMENT, 4..10).unwrap();
        assert_eq!(bow, vec![1., 1., 0., 0.]);

        let encoder = HistogramEncoder::new(4, Normalization::MinMax { bound: 10. });
        let bow = encoder.encode_words(&[0, 0, 0, 0, 1, 1, 2]).unwrap();
        assert_eq!(bow.len(), 4);
        assert_eq!(bow[0], 10.);
        assert_eq!(bow[3], 0.);
        assert!(bow.iter().all(|&v| (0. ..=10.).contains(&v)));
    }

    #[test]
    fn l1_sums_to_bound() {
        let encoder = HistogramEncoder::new(4, Normalization::L1 { bound: 1. });
        let bow = encoder.encode(&ASSIGNMENT, 0..10).unwrap();
        let sum: f32 = bow.iter().sum();
        assert!((sum - 1.).abs() < 1e-6);
        assert!((bow[0] - 0.3).abs() < 1e-6);
    }

    #[rstest]
    #[case(Normalization::MinMax { bound: NORM_BOUND })]
    #[case(Normalization::L1 { bound: NORM_BOUND })]
    fn empty_image_is_all_zero(#[case] normalization: Normalization) {
        let encoder = HistogramEncoder::new(6, normalization);
        assert_eq!(encoder.encode(&ASSIGNMENT, 2..2).unwrap(), vec![0.; 6]);
    }

    #[test]
    fn uniform_histogram_collapses_under_minmax() {
        let encoder = HistogramEncoder::new(4, Normalization::default());
        assert_eq!(encoder.encode(&ASSIGNMENT, 0..8).unwrap(), vec![0.; 4]);
    }

    #[test]
    fn range_past_assignment() {
        let encoder = HistogramEncoder::new(4, Normalization::default());
        assert!(matches!(
            encoder.encode(&ASSIGNMENT, 8..12),
            Err(BowErr::InvalidRange {
                start: 8,
                end: 12,
                len: 10
            })
        ));
    }

    #[test]
    fn word_outside_vocabulary() {
        let encoder = HistogramEncoder::new(2, Normalization::default());
        assert!(matches!(
            encoder.encode_words(&[0, 1, 2]),
            Err(BowErr::WordOutOfRange { word: 2, k: 2 })
        ));
    }
}
