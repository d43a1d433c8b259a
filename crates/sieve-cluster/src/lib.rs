//! sieve-cluster
//!
//! Unsupervised topic clustering: TF-IDF document vectors partitioned with
//! seeded k-means (linfa), with centroid-weighted topic keywords and cached
//! cluster peers for recommendations.

pub mod clusterer;
pub mod partition;

pub use clusterer::Clusterer;
pub use partition::{KMeansPartitioner, Partition, PartitionError, Partitioner};
