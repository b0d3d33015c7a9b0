//! Partitioning strategies for message routing

use crate::types::PartitionKey;

/// Partitioning strategy
pub trait PartitioningStrategy: Send + Sync {
    /// Compute partition number for given key
    fn partition(&self, key: &PartitionKey) -> u32;

    /// Total number of partitions
    fn num_partitions(&self) -> u32;
}

/// Hash-based partitioning (default)
#[derive(Debug, Clone)]
pub struct HashPartitioning {
    num_partitions: u32,
}

impl HashPartitioning {
    /// Create new hash-based partitioning; a zero count is raised to one
    pub fn new(num_partitions: u32) -> Self {
        Self {
            num_partitions: num_partitions.max(1),
        }
    }
}

impl Default for HashPartitioning {
    fn default() -> Self {
        Self::new(32)
    }
}

impl PartitioningStrategy for HashPartitioning {
    fn partition(&self, key: &PartitionKey) -> u32 {
        key.partition_number(self.num_partitions)
    }

    fn num_partitions(&self) -> u32 {
        self.num_partitions
    }
}
