use log::{debug, warn};
use rand::{distributions::WeightedIndex, prelude::*, rngs::StdRng};

use crate::*;

/// Stop clustering after `max_iterations` rounds or once no centroid moved
/// further than `epsilon`, whichever comes first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermCriteria {
    pub max_iterations: usize,
    pub epsilon: f32,
}

impl Default for TermCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            epsilon: 0.01,
        }
    }
}

/// Result of clustering `n` rows into `k` groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// `k * dim` centroid coordinates, row-major.
    pub centroids: Vec<f32>,
    /// Nearest centroid of every input row.
    pub assignment: Vec<usize>,
    /// Sum of squared distances between rows and their centroids.
    pub distortion: f32,
    pub iterations: usize,
    /// Largest centroid movement of the last iteration.
    pub shift: f32,
}

/// Something that can partition descriptor rows into `k` clusters.
pub trait Clusterer {
    fn cluster(&self, data: &[f32], dim: usize, k: usize) -> BowResult<Clustering>;
}

/// Lloyd's k-means, seeded with k-means++.
///
/// Runs `attempts` independent seedings and keeps the lowest distortion result.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub criteria: TermCriteria,
    pub attempts: usize,
    pub seed: Option<u64>,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            criteria: TermCriteria::default(),
            attempts: 1,
            seed: None,
        }
    }
}

impl Clusterer for KMeans {
    fn cluster(&self, data: &[f32], dim: usize, k: usize) -> BowResult<Clustering> {
        if data.len() % dim != 0 {
            return Err(BowErr::DimensionMismatch {
                expected: dim,
                found: data.len(),
            });
        }
        let n = data.len() / dim;
        if k == 0 || n < k {
            return Err(BowErr::InsufficientData { descriptors: n, k });
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut best: Option<Clustering> = None;
        for attempt in 0..self.attempts.max(1) {
            let result = self.lloyd(data, dim, k, &mut rng);
            debug!(
                "KMeans attempt {} finished after {} iterations, distortion {}",
                attempt, result.iterations, result.distortion
            );
            // NaN never compares smaller, so a finite result always wins
            if best.as_ref().map_or(true, |b| {
                result.distortion < b.distortion || b.distortion.is_nan()
            }) {
                best = Some(result);
            }
        }

        match best {
            Some(best) if best.distortion.is_finite() => Ok(best),
            Some(best) => Err(BowErr::ConvergenceFailure {
                stage: "clustering",
                iterations: best.iterations,
                metric: best.distortion,
            }),
            None => Err(BowErr::InsufficientData { descriptors: n, k }),
        }
    }
}

impl KMeans {
    fn lloyd(&self, data: &[f32], dim: usize, k: usize, rng: &mut StdRng) -> Clustering {
        let n = data.len() / dim;
        let mut centroids = Self::init_plus_plus(data, dim, k, rng);
        let mut assignment = vec![0; n];
        let mut distances = vec![0.; n];
        let mut iterations = 0;
        let mut shift = f32::INFINITY;

        loop {
            assign(data, dim, &centroids, &mut assignment, &mut distances);
            if iterations >= self.criteria.max_iterations || shift <= self.criteria.epsilon {
                break;
            }

            // update centroids
            let mut sums = vec![0.; k * dim];
            let mut counts = vec![0usize; k];
            for (i, &c) in assignment.iter().enumerate() {
                counts[c] += 1;
                for (s, x) in sums[c * dim..(c + 1) * dim].iter_mut().zip(row(data, dim, i)) {
                    *s += x;
                }
            }
            for c in 0..k {
                if counts[c] == 0 {
                    // Re-seed an empty cluster with the row farthest from its centroid
                    let far = farthest(&distances);
                    sums[c * dim..(c + 1) * dim].copy_from_slice(row(data, dim, far));
                    distances[far] = 0.;
                    counts[c] = 1;
                }
                let inv = 1. / counts[c] as f32;
                sums[c * dim..(c + 1) * dim].iter_mut().for_each(|s| *s *= inv);
            }

            shift = centroids
                .chunks(dim)
                .zip(sums.chunks(dim))
                .map(|(a, b)| sq_dist(a, b).sqrt())
                .fold(0., f32::max);
            centroids = sums;
            iterations += 1;
            debug!("KMeans iteration {} - centroid shift {:.4}", iterations, shift);
        }

        if shift > self.criteria.epsilon {
            warn!(
                "KMeans stopped at the iteration limit ({}) with centroid shift {:.4}",
                iterations, shift
            );
        }

        Clustering {
            distortion: distances.iter().sum(),
            centroids,
            assignment,
            iterations,
            shift,
        }
    }

    /// k-means++ seeding: every next centroid is drawn with probability
    /// proportional to its squared distance from the closest centroid so far.
    fn init_plus_plus(data: &[f32], dim: usize, k: usize, rng: &mut StdRng) -> Vec<f32> {
        let n = data.len() / dim;
        let mut centroids = Vec::with_capacity(k * dim);
        centroids.extend_from_slice(row(data, dim, rng.gen_range(0..n)));

        let mut closest: Vec<f32> = (0..n)
            .map(|i| sq_dist(row(data, dim, i), &centroids[..dim]))
            .collect();

        for _ in 1..k {
            // All weights zero means every row sits on a centroid already
            let next = match WeightedIndex::new(&closest) {
                Ok(dist) => dist.sample(rng),
                Err(_) => rng.gen_range(0..n),
            };
            let start = centroids.len();
            centroids.extend_from_slice(row(data, dim, next));
            for (i, d) in closest.iter_mut().enumerate() {
                *d = d.min(sq_dist(row(data, dim, i), &centroids[start..]));
            }
        }
        centroids
    }
}

/// Assign every row to its nearest centroid, recording the squared distance.
fn assign(
    data: &[f32],
    dim: usize,
    centroids: &[f32],
    assignment: &mut [usize],
    distances: &mut [f32],
) {
    for (i, x) in data.chunks(dim).enumerate() {
        let (best, d) = nearest(x, centroids, dim);
        assignment[i] = best;
        distances[i] = d;
    }
}

/// Index of the centroid closest to `x`, and the squared distance to it.
pub(crate) fn nearest(x: &[f32], centroids: &[f32], dim: usize) -> (usize, f32) {
    centroids
        .chunks(dim)
        .enumerate()
        .map(|(j, c)| (j, sq_dist(x, c)))
        .fold((0, f32::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

#[inline]
fn row(data: &[f32], dim: usize, i: usize) -> &[f32] {
    &data[i * dim..(i + 1) * dim]
}

#[inline]
fn sq_dist(x: &[f32], y: &[f32]) -> f32 {
    x.iter().zip(y).fold(0., |a, (b, c)| a + (b - c) * (b - c))
}

fn farthest(distances: &[f32]) -> usize {
    distances
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &d)| if d > best.1 { (i, d) } else { best })
        .0
}
