use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use sieve_core::config::ClusterConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("cannot split {points} points into {k} clusters")]
    InvalidClusterCount { k: usize, points: usize },
    #[error("k-means fit failed: {0}")]
    Fit(String),
}

/// Label per input row plus one centroid row per label.
#[derive(Debug, Clone)]
pub struct Partition {
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
}

/// Splits a dense point set into `k` groups.
pub trait Partitioner: Send + Sync {
    fn partition(&self, points: &Array2<f64>, k: usize) -> Result<Partition, PartitionError>;
}

/// Seeded k-means (k-means++ init, best of `n_runs`).
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansPartitioner {
    pub seed: u64,
    pub max_iterations: u64,
    pub n_runs: usize,
    pub tolerance: f64,
}

impl Default for KMeansPartitioner {
    fn default() -> Self { Self::from_config(&ClusterConfig::default()) }
}

impl KMeansPartitioner {
    pub fn from_config(cfg: &ClusterConfig) -> Self {
        Self { seed: cfg.seed, max_iterations: cfg.max_iterations, n_runs: cfg.n_runs.max(1), tolerance: 1e-4 }
    }
}

impl Partitioner for KMeansPartitioner {
    fn partition(&self, points: &Array2<f64>, k: usize) -> Result<Partition, PartitionError> {
        let n = points.nrows();
        if k == 0 || k > n { return Err(PartitionError::InvalidClusterCount { k, points: n }); }

        let rng = Xoshiro256Plus::seed_from_u64(self.seed);
        let dataset = DatasetBase::from(points.clone());
        let model = KMeans::params_with_rng(k, rng)
            .n_runs(self.n_runs)
            .max_n_iterations(self.max_iterations)
            .tolerance(self.tolerance)
            .fit(&dataset)
            .map_err(|e| PartitionError::Fit(e.to_string()))?;

        let labels: Array1<usize> = model.predict(points);
        Ok(Partition { labels: labels.to_vec(), centroids: model.centroids().clone() })
    }
}
