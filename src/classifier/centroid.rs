use serde::{Deserialize, Serialize};

use crate::classifier::vectorizer::SparseRow;

/// Nearest-centroid classifier. Produces hard labels only.
///
/// Each class centroid is the mean of its rows, L2-normalized. A row is
/// assigned the class whose centroid has the highest cosine similarity; ties
/// go to class 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearestCentroid {
    centroids: [Vec<f64>; 2],
}

impl NearestCentroid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, rows: &[SparseRow], targets: &[usize], n_features: usize) {
        let mut sums = [vec![0.0; n_features], vec![0.0; n_features]];
        let mut counts = [0usize; 2];

        for (row, &target) in rows.iter().zip(targets) {
            let class = target.min(1);
            for &(idx, value) in row {
                sums[class][idx] += value;
            }
            counts[class] += 1;
        }

        for (sum, count) in sums.iter_mut().zip(counts) {
            if count > 0 {
                for v in sum.iter_mut() {
                    *v /= count as f64;
                }
            }
            normalize(sum);
        }
        self.centroids = sums;
    }

    pub fn predict(&self, rows: &[SparseRow]) -> Vec<usize> {
        rows.iter()
            .map(|row| {
                let genuine = similarity(&self.centroids[0], row);
                let false_positive = similarity(&self.centroids[1], row);
                usize::from(false_positive > genuine)
            })
            .collect()
    }
}

/// Cosine similarity against a normalized centroid; rows are already normalized.
fn similarity(centroid: &[f64], row: &SparseRow) -> f64 {
    row.iter()
        .filter_map(|&(idx, value)| centroid.get(idx).map(|c| c * value))
        .sum()
}

fn normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
