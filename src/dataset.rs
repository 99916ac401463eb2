use ndarray::Array2;
use rand::{seq::SliceRandom, Rng};

use crate::*;

/// One labeled feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub label: Label,
    pub features: BoW,
}

impl Example {
    pub fn new(label: Label, features: BoW) -> Self {
        Self { label, features }
    }
}

/// Ordered collection of examples, all of the same feature length.
///
/// Examples are stored as whole `(features, label)` pairs, so any reordering keeps
/// every label attached to its own histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    examples: Vec<Example>,
    k: usize,
}

/// Which side of a [`Split`] to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Train,
    Test,
}

/// Train/test view over a dataset. `train` is the first `floor(ratio * n)` examples.
#[derive(Debug, Clone, Copy)]
pub struct Split<'a> {
    pub train: &'a [Example],
    pub test: &'a [Example],
}

impl<'a> Split<'a> {
    pub fn partition(&self, partition: Partition) -> &'a [Example] {
        match partition {
            Partition::Train => self.train,
            Partition::Test => self.test,
        }
    }
}

impl Dataset {
    pub fn assemble(examples: Vec<Example>) -> BowResult<Self> {
        let k = match examples.first() {
            Some(e) => e.features.len(),
            None => return Err(BowErr::EmptyDataset),
        };
        if let Some(e) = examples.iter().find(|e| e.features.len() != k) {
            return Err(BowErr::DimensionMismatch {
                expected: k,
                found: e.features.len(),
            });
        }
        Ok(Self { examples, k })
    }

    /// Fisher-Yates shuffle of whole examples.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.examples.shuffle(rng);
    }

    /// Partition into train and test without reordering.
    pub fn split(&self, ratio: f64) -> BowResult<Split<'_>> {
        if !(ratio > 0. && ratio < 1.) {
            return Err(BowErr::InvalidSplitRatio(ratio));
        }
        let n_train = (ratio * self.len() as f64).floor() as usize;
        let (train, test) = self.examples.split_at(n_train);
        Ok(Split { train, test })
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Feature length, i.e. the vocabulary size.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Features as an `n × k` matrix.
    pub fn features(&self) -> Array2<f32> {
        features(&self.examples, self.k)
    }

    /// One-hot label codes as an `n × 2` matrix, row-aligned with [`features`](Self::features).
    pub fn labels(&self) -> Array2<f32> {
        labels(&self.examples)
    }
}

/// Stack the histograms of `examples` into an `n × k` matrix.
pub fn features(examples: &[Example], k: usize) -> Array2<f32> {
    let mut m = Array2::zeros((examples.len(), k));
    for (mut row, e) in m.rows_mut().into_iter().zip(examples) {
        row.iter_mut().zip(&e.features).for_each(|(r, &f)| *r = f);
    }
    m
}

/// Stack the label codes of `examples` into an `n × 2` matrix.
pub fn labels(examples: &[Example]) -> Array2<f32> {
    let mut m = Array2::zeros((examples.len(), OUTPUT_CLASSES));
    for (mut row, e) in m.rows_mut().into_iter().zip(examples) {
        row.iter_mut().zip(e.label.code()).for_each(|(r, c)| *r = c);
    }
    m
}
