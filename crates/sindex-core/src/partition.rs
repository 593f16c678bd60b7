//! Index row partitioning.
//!
//! A partitioner maps an index-value tuple to the physical partition(s) of
//! an index row, keeping any single row bounded in width. Callers must scan
//! the union of the returned partitions.

use crate::{key::ordered, value::Value};
use std::fmt;
use xxhash_rust::xxh3::xxh3_64;

/// Physical partition label, appended to the index row key.
pub type PartitionValue = Vec<u8>;

///
/// Partitioner
///
/// Immutable and shared read-only across concurrent queries.
///

pub trait Partitioner: fmt::Debug + Send + Sync {
    /// Partitions that can hold entries for this exact value tuple.
    fn partition_value(&self, tuple: &[Value]) -> Vec<PartitionValue>;

    /// Partitions that must be scanned to cover `[start, end]`.
    fn partition_range(&self, start: &[Value], end: &[Value]) -> Vec<PartitionValue>;
}

///
/// SinglePartitioner
///
/// Degenerate default: every tuple maps to one fixed partition.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct SinglePartitioner;

impl SinglePartitioner {
    const PARTITION: &'static [u8] = b"0";
}

impl Partitioner for SinglePartitioner {
    fn partition_value(&self, _tuple: &[Value]) -> Vec<PartitionValue> {
        vec![Self::PARTITION.to_vec()]
    }

    fn partition_range(&self, _start: &[Value], _end: &[Value]) -> Vec<PartitionValue> {
        vec![Self::PARTITION.to_vec()]
    }
}

///
/// HashBucketPartitioner
///
/// Buckets by the xxh3 hash of the leading component's ordered encoding.
/// A range whose leading components differ cannot be pinned to one bucket,
/// so it fans out to all of them.
///

#[derive(Clone, Copy, Debug)]
pub struct HashBucketPartitioner {
    buckets: u32,
}

impl HashBucketPartitioner {
    #[must_use]
    pub const fn new(buckets: u32) -> Self {
        let buckets = if buckets == 0 { 1 } else { buckets };
        Self { buckets }
    }

    #[must_use]
    pub const fn buckets(&self) -> u32 {
        self.buckets
    }

    fn bucket_for(&self, leading: &Value) -> Option<PartitionValue> {
        let mut encoded = Vec::new();
        ordered::encode_component(leading, &mut encoded).ok()?;

        let bucket = xxh3_64(&encoded) % u64::from(self.buckets);
        Some(bucket.to_string().into_bytes())
    }

    fn all_buckets(&self) -> Vec<PartitionValue> {
        (0..u64::from(self.buckets))
            .map(|b| b.to_string().into_bytes())
            .collect()
    }
}

impl Partitioner for HashBucketPartitioner {
    fn partition_value(&self, tuple: &[Value]) -> Vec<PartitionValue> {
        match tuple.first().and_then(|v| self.bucket_for(v)) {
            Some(bucket) => vec![bucket],
            None => self.all_buckets(),
        }
    }

    fn partition_range(&self, start: &[Value], end: &[Value]) -> Vec<PartitionValue> {
        // A pinned bucket is only sound when both bounds share the leading
        // component; otherwise every bucket may hold matching entries.
        match (start.first(), end.first()) {
            (Some(a), Some(b)) if a == b => self.partition_value(start),
            _ => self.all_buckets(),
        }
    }
}

///
/// TESTS
///
