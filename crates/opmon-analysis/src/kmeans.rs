//! Seeded spherical k-means (cosine geometry) with k-means++ initialization.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MAX_ITERATIONS: usize = 100;

/// Assignment of every point to a centroid.
#[derive(Debug, Clone)]
pub(crate) struct Clustering {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
    /// Cosine distance of each point to its own centroid.
    pub distances: Vec<f32>,
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = dot(v, v).sqrt();
    if norm <= f32::EPSILON {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    (1.0 - dot(a, b)).max(0.0)
}

fn nearest(point: &[f32], centroids: &[Vec<f32>]) -> (usize, f32) {
    let mut best = (0, f32::MAX);
    for (c, centroid) in centroids.iter().enumerate() {
        let d = cosine_distance(point, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

/// k-means++ seeding: each next centroid is drawn with probability
/// proportional to squared distance from the nearest chosen one.
fn plusplus_init(points: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let n = points.len();
    let mut centroids = vec![points[rng.random_range(0..n)].clone()];

    while centroids.len() < k {
        let weights: Vec<f32> = points
            .iter()
            .map(|p| {
                let (_, d) = nearest(p, &centroids);
                d * d
            })
            .collect();
        let total: f32 = weights.iter().sum();
        if total <= f32::EPSILON {
            // Every remaining point coincides with a chosen centroid.
            break;
        }

        let threshold = rng.random::<f32>() * total;
        let mut cumulative = 0.0;
        let mut chosen = n - 1;
        for (i, w) in weights.iter().enumerate() {
            cumulative += w;
            if cumulative >= threshold && *w > 0.0 {
                chosen = i;
                break;
            }
        }
        centroids.push(points[chosen].clone());
    }

    centroids
}

fn recompute_centroids(
    points: &[Vec<f32>],
    labels: &[usize],
    previous: &[Vec<f32>],
) -> Vec<Vec<f32>> {
    let dim = previous.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0_f32; dim]; previous.len()];
    let mut counts = vec![0_usize; previous.len()];
    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (s, x) in sums[label].iter_mut().zip(point) {
            *s += x;
        }
    }
    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, count), prev)| {
            if count == 0 {
                prev.clone()
            } else {
                normalized(&sum)
            }
        })
        .collect()
}

/// Cluster `points` into at most `k` groups.
///
/// The same input, `k` and `seed` always produce the same assignment. Fewer
/// than `k` clusters are returned when there are fewer distinct points.
pub(crate) fn kmeans(points: &[Vec<f32>], k: usize, seed: u64) -> Clustering {
    if points.is_empty() || k == 0 {
        return Clustering {
            labels: Vec::new(),
            centroids: Vec::new(),
            distances: Vec::new(),
        };
    }

    let points: Vec<Vec<f32>> = points.iter().map(|p| normalized(p)).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = plusplus_init(&points, k.min(points.len()), &mut rng);
    let mut labels = vec![usize::MAX; points.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let (best, _) = nearest(point, &centroids);
            if labels[i] != best {
                labels[i] = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }
        centroids = recompute_centroids(&points, &labels, &centroids);
    }

    let distances = points
        .iter()
        .zip(&labels)
        .map(|(p, &l)| cosine_distance(p, &centroids[l]))
        .collect();

    Clustering {
        labels,
        centroids,
        distances,
    }
}
