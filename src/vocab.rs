use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::kmeans::nearest;
use crate::*;

#[derive(Serialize, Deserialize, PartialEq, Clone)]
/// Visual vocabulary built from the descriptor pool of a training corpus. Can be:
/// 1. Built by clustering a finalized [`PooledDescriptors`].
/// 2. Saved to a file & loaded from a file (requires bincode feature, enabled by default).
/// 3. Used to map a new set of descriptors to words (e.g. for a single query image).
///
/// Besides the `k` centroids the vocabulary keeps the word assignment of every pooled
/// descriptor, which is what the per-image histograms are built from.
pub struct Vocabulary {
    centroids: Vec<f32>,
    assignment: Vec<usize>,
    k: usize,
    dim: usize,
    distortion: f32,
    iterations: usize,
}

/// Vocabulary API
impl Vocabulary {
    /// Build a vocabulary of `k` words with the default k-means clusterer.
    pub fn build(pool: &PooledDescriptors, k: usize, kmeans: &KMeans) -> BowResult<Self> {
        Self::build_with(pool, k, kmeans)
    }

    /// Build a vocabulary of `k` words with any clustering backend.
    pub fn build_with<C: Clusterer>(
        pool: &PooledDescriptors,
        k: usize,
        clusterer: &C,
    ) -> BowResult<Self> {
        if k == 0 || pool.rows() < k {
            return Err(BowErr::InsufficientData {
                descriptors: pool.rows(),
                k,
            });
        }
        info!(
            "Clustering {} descriptors of dimension {} into {} words",
            pool.rows(),
            pool.dim(),
            k
        );
        let clustering = clusterer.cluster(pool.as_slice(), pool.dim(), k)?;

        // The histograms index into the assignment by pool row
        if clustering.assignment.len() != pool.rows() {
            return Err(BowErr::AssignmentMismatch {
                assignment: clustering.assignment.len(),
                descriptors: pool.rows(),
            });
        }
        if let Some(&word) = clustering.assignment.iter().find(|&&w| w >= k) {
            return Err(BowErr::WordOutOfRange { word, k });
        }
        if clustering.centroids.len() != k * pool.dim() {
            return Err(BowErr::DimensionMismatch {
                expected: k * pool.dim(),
                found: clustering.centroids.len(),
            });
        }

        Ok(Self {
            centroids: clustering.centroids,
            assignment: clustering.assignment,
            k,
            dim: pool.dim(),
            distortion: clustering.distortion,
            iterations: clustering.iterations,
        })
    }

    /// Map every row of `descriptors` to its nearest word.
    pub fn quantize(&self, descriptors: &[f32]) -> BowResult<Vec<usize>> {
        if descriptors.len() % self.dim != 0 {
            return Err(BowErr::DimensionMismatch {
                expected: self.dim,
                found: descriptors.len(),
            });
        }
        Ok(descriptors
            .chunks(self.dim)
            .map(|d| nearest(d, &self.centroids, self.dim).0)
            .collect())
    }

    /// Word of every pooled descriptor, indexed by pool row.
    pub fn assignment(&self) -> &[usize] {
        &self.assignment
    }

    /// Centroid of word `word`.
    pub fn word(&self, word: usize) -> &[f32] {
        &self.centroids[word * self.dim..(word + 1) * self.dim]
    }

    /// Number of words.
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn distortion(&self) -> f32 {
        self.distortion
    }

    /// Load a vocabulary from a file
    #[cfg(feature = "bincode")]
    pub fn load<P: AsRef<std::path::Path>>(file: P) -> BowResult<Self> {
        let mut file = std::fs::File::open(file)?;
        let mut buffer: Vec<u8> = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut buffer)?;
        Ok(bincode::deserialize(&buffer)?)
    }

    /// Save vocabulary to a file
    #[cfg(feature = "bincode")]
    pub fn save<P: AsRef<std::path::Path>>(&self, file: P) -> BowResult<()> {
        let serialized = bincode::serialize(&self)?;
        let mut file = std::fs::File::create(file)?;
        std::io::Write::write_all(&mut file, &serialized)?;
        Ok(())
    }

    fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &w in &self.assignment {
            sizes[w] += 1;
        }
        sizes
    }
}

impl fmt::Debug for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes = self.cluster_sizes();
        let sum = sizes.iter().sum::<usize>();
        f.debug_struct("Vocabulary")
            .field("Words", &self.k)
            .field("Descriptor Dimension", &self.dim)
            .field("Total Training Features", &sum)
            .field("Min Word Cluster Size", &sizes.iter().min().copied().unwrap_or(0))
            .field("Max Word Cluster Size", &sizes.iter().max().copied().unwrap_or(0))
            .field("Mean Word Cluster Size", &(sum / self.k.max(1)))
            .field("Distortion", &self.distortion)
            .field("Iterations", &self.iterations)
            .finish()
    }
}
