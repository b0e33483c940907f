//! Isolation forest anomaly scoring.
//!
//! Rows that are isolated by few random axis-aligned splits get high anomaly
//! scores. Scoring and thresholding match the usual convention: the score
//! is `2^(-E[h(x)] / c(psi))` and rows whose negated score falls below the
//! `contamination` percentile are flagged.

use crate::core::stats;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const MAX_SAMPLES: usize = 256;

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Average path length of an unsuccessful search in a binary search tree of `n` items
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn build(data: &[Vec<f64>], rows: Vec<usize>, depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    if depth >= max_depth || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }

    let width = data[rows[0]].len();
    let candidates: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|f| {
            let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                (lo.min(data[r][f]), hi.max(data[r][f]))
            });
            (min < max).then_some((f, min, max))
        })
        .collect();

    if candidates.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let (feature, min, max) = candidates[rng.random_range(0..candidates.len())];
    let threshold = rng.random_range(min..max);
    let (left, right): (Vec<usize>, Vec<usize>) =
        rows.into_iter().partition(|&r| data[r][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build(data, left, depth + 1, max_depth, rng)),
        right: Box::new(build(data, right, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] < *threshold {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Anomaly score in (0, 1] for every row; higher is more anomalous.
pub fn anomaly_scores(data: &[Vec<f64>], n_estimators: usize, seed: u64) -> Vec<f64> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let sample_size = n.min(MAX_SAMPLES);
    let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;

    let trees: Vec<Node> = (0..n_estimators.max(1))
        .map(|_| {
            let sample = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
            build(data, sample, 0, max_depth, &mut rng)
        })
        .collect();

    let normalizer = average_path_length(sample_size).max(f64::MIN_POSITIVE);
    data.iter()
        .map(|row| {
            let mean_depth =
                trees.iter().map(|t| path_length(t, row, 0)).sum::<f64>() / trees.len() as f64;
            2f64.powf(-mean_depth / normalizer)
        })
        .collect()
}

/// Flag the `contamination` share of rows with the highest anomaly scores.
pub fn fit_predict(data: &[Vec<f64>], n_estimators: usize, contamination: f64, seed: u64) -> Vec<bool> {
    let negated: Vec<f64> = anomaly_scores(data, n_estimators, seed)
        .into_iter()
        .map(|s| -s)
        .collect();

    let Some(offset) = stats::percentile(&negated, contamination * 100.0) else {
        return vec![false; data.len()];
    };
    negated.iter().map(|s| *s < offset).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outlier() -> Vec<Vec<f64>> {
        let mut data: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![(i % 7) as f64 * 0.1, (i % 5) as f64 * 0.1])
            .collect();
        data.push(vec![25.0, -30.0]);
        data
    }

    #[test]
    fn test_isolated_point_scores_highest() {
        let data = cluster_with_outlier();
        let scores = anomaly_scores(&data, 100, 42);
        let (max_idx, _) = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(max_idx, 50);
    }

    #[test]
    fn test_fit_predict_flags_isolated_point() {
        let data = cluster_with_outlier();
        let flags = fit_predict(&data, 100, 0.02, 42);
        assert!(flags[50]);
        assert!(flags.iter().filter(|f| **f).count() <= 2);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let data = cluster_with_outlier();
        assert_eq!(anomaly_scores(&data, 20, 7), anomaly_scores(&data, 20, 7));
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > 9.0);
    }
}
