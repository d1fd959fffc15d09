//! Seeded k-means clustering (Lloyd's algorithm, k-means++ init).
//!
//! RULE: Nothing in the crate may call any platform RNG. The only
//! randomness is centroid initialisation, and it flows through a
//! Pcg64Mcg seeded from the configured cluster seed, so the same
//! input always yields the same assignment.

use crate::error::{InsightError, InsightResult};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct KMeans {
    k:        usize,
    max_iter: usize,
    tol:      f64,
    seed:     u64,
}

#[derive(Debug)]
pub struct KMeansFit {
    pub labels:    Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            max_iter: 300,
            tol: 1e-4,
            seed,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Cluster `points` into k groups. Fails with InsufficientData
    /// when there are fewer points than clusters.
    pub fn fit(&self, points: &[Vec<f64>]) -> InsightResult<KMeansFit> {
        let n = points.len();
        if n < self.k {
            return Err(InsightError::InsufficientData {
                required: self.k,
                actual:   n,
            });
        }

        let mut rng = Pcg64Mcg::seed_from_u64(self.seed);
        let mut centroids = self.init_centroids(points, &mut rng);
        let mut labels = vec![0usize; n];

        for iter in 0..self.max_iter {
            // Assignment step.
            for (i, point) in points.iter().enumerate() {
                labels[i] = nearest_centroid(point, &centroids);
            }

            // Update step: mean of assigned points.
            // An emptied cluster keeps its previous centroid.
            let dims = centroids[0].len();
            let mut sums = vec![vec![0.0; dims]; self.k];
            let mut counts = vec![0usize; self.k];
            for (point, &label) in points.iter().zip(&labels) {
                counts[label] += 1;
                for (s, v) in sums[label].iter_mut().zip(point) {
                    *s += v;
                }
            }

            let mut max_shift_sq = 0.0f64;
            for c in 0..self.k {
                if counts[c] == 0 {
                    continue;
                }
                let new_centroid: Vec<f64> =
                    sums[c].iter().map(|s| s / counts[c] as f64).collect();
                max_shift_sq = max_shift_sq.max(dist_sq(&new_centroid, &centroids[c]));
                centroids[c] = new_centroid;
            }

            if max_shift_sq < self.tol * self.tol {
                log::debug!("k-means converged after {} iterations", iter + 1);
                break;
            }
        }

        // Final assignment against the settled centroids.
        for (i, point) in points.iter().enumerate() {
            labels[i] = nearest_centroid(point, &centroids);
        }

        Ok(KMeansFit { labels, centroids })
    }

    /// k-means++: first centroid uniform, each next one sampled with
    /// probability proportional to squared distance from the nearest
    /// centroid chosen so far.
    fn init_centroids(&self, points: &[Vec<f64>], rng: &mut Pcg64Mcg) -> Vec<Vec<f64>> {
        let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(self.k);
        centroids.push(points[rng.gen_range(0..points.len())].clone());

        while centroids.len() < self.k {
            let weights: Vec<f64> = points
                .iter()
                .map(|p| {
                    centroids
                        .iter()
                        .map(|c| dist_sq(p, c))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            let total: f64 = weights.iter().sum();

            let next = if total > 0.0 {
                let mut target = rng.gen_range(0.0..total);
                let mut chosen = points.len() - 1;
                for (i, w) in weights.iter().enumerate() {
                    if target < *w {
                        chosen = i;
                        break;
                    }
                    target -= w;
                }
                chosen
            } else {
                // All remaining points coincide with a centroid.
                rng.gen_range(0..points.len())
            };
            centroids.push(points[next].clone());
        }

        centroids
    }
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0usize;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = dist_sq(point, centroid);
        if d < best_dist {
            best_dist = d;
            best = c;
        }
    }
    best
}

fn dist_sq(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 2.0, 0.0],
            vec![1.5, 1.8, 0.2],
            vec![1.0, 0.6, 0.1],
            vec![8.0, 8.0, 9.0],
            vec![9.0, 11.0, 8.5],
            vec![8.5, 9.0, 9.5],
        ]
    }

    #[test]
    fn separates_well_spaced_blobs() {
        let fit = KMeans::new(2, 42).fit(&two_blobs()).unwrap();
        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_eq!(fit.labels[0], fit.labels[2]);
        assert_eq!(fit.labels[3], fit.labels[4]);
        assert_eq!(fit.labels[3], fit.labels[5]);
        assert_ne!(fit.labels[0], fit.labels[3]);
    }

    #[test]
    fn same_seed_same_assignment() {
        let points = two_blobs();
        let a = KMeans::new(2, 7).fit(&points).unwrap();
        let b = KMeans::new(2, 7).fit(&points).unwrap();
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn fewer_points_than_clusters_is_an_error() {
        let points = vec![vec![1.0, 1.0, 1.0]];
        let err = KMeans::new(3, 42).fit(&points).unwrap_err();
        assert!(matches!(
            err,
            crate::error::InsightError::InsufficientData { required: 3, actual: 1 }
        ));
    }
}
