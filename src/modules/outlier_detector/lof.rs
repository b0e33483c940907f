//! Local outlier factor.

use crate::core::stats;

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

/// Local outlier factor of every row (about 1.0 for inliers, larger for outliers).
pub fn outlier_factors(data: &[Vec<f64>], n_neighbors: usize) -> Vec<f64> {
    let n = data.len();
    if n < 2 {
        return vec![1.0; n];
    }
    let k = n_neighbors.clamp(1, n - 1);

    // k nearest neighbours of each row as (distance, index), nearest first
    let neighbors: Vec<Vec<(f64, usize)>> = (0..n)
        .map(|i| {
            let mut dists: Vec<(f64, usize)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (euclidean(&data[i], &data[j]), j))
                .collect();
            dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            dists.truncate(k);
            dists
        })
        .collect();

    let k_distance: Vec<f64> = neighbors
        .iter()
        .map(|nbrs| nbrs.last().map(|(d, _)| *d).unwrap_or(0.0))
        .collect();

    let lrd: Vec<f64> = neighbors
        .iter()
        .map(|nbrs| {
            let reach: f64 = nbrs.iter().map(|(d, j)| d.max(k_distance[*j])).sum();
            1.0 / (reach / nbrs.len() as f64 + 1e-10)
        })
        .collect();

    neighbors
        .iter()
        .enumerate()
        .map(|(i, nbrs)| {
            let neighbor_lrd: f64 = nbrs.iter().map(|(_, j)| lrd[*j]).sum::<f64>() / nbrs.len() as f64;
            neighbor_lrd / lrd[i]
        })
        .collect()
}

/// Flag the `contamination` share of rows with the largest outlier factor.
pub fn fit_predict(data: &[Vec<f64>], n_neighbors: usize, contamination: f64) -> Vec<bool> {
    let negated: Vec<f64> = outlier_factors(data, n_neighbors)
        .into_iter()
        .map(|f| -f)
        .collect();

    let Some(offset) = stats::percentile(&negated, contamination * 100.0) else {
        return vec![false; data.len()];
    };
    negated.iter().map(|f| *f < offset).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_grid_factors_near_one() {
        let data: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let factors = outlier_factors(&data, 2);
        for f in &factors[2..8] {
            assert!((f - 1.0).abs() < 0.2, "factor {}", f);
        }
    }

    #[test]
    fn test_distant_point_flagged() {
        let mut data: Vec<Vec<f64>> = (0..20).map(|i| vec![(i % 4) as f64, (i / 4) as f64]).collect();
        data.push(vec![40.0, 40.0]);

        let factors = outlier_factors(&data, 5);
        assert!(factors[20] > 5.0);

        let flags = fit_predict(&data, 5, 0.05);
        assert!(flags[20]);
    }

    #[test]
    fn test_single_row_is_never_flagged() {
        assert_eq!(fit_predict(&[vec![1.0]], 20, 0.1), vec![false]);
    }
}
