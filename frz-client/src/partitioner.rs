//! Partition assignment.
//!
//! The hash scheme is pluggable: callers that must land on the same
//! partitions as another client inject their own [`Partitioner`]. The
//! default uses Kafka-seeded murmur2, matching the Java client's
//! `Utils.toPositive(Utils.murmur2(key)) % numPartitions` routing.

use murmur2::{murmur2, KAFKA_SEED};
use rand::Rng;

use crate::record::Record;

pub trait Partitioner: Send {
    /// Maps a record onto `0..partition_count`. `partition_count` is always
    /// positive.
    fn partition_for(&self, partition_count: i32, record: &Record) -> i32;
}

/// Kafka-compatible default: explicit partition wins, then the partition
/// key, then the message key; keyless records spread uniformly at random.
#[derive(Debug, Clone, Copy, Default)]
pub struct Murmur2Partitioner;

impl Partitioner for Murmur2Partitioner {
    fn partition_for(&self, partition_count: i32, record: &Record) -> i32 {
        debug_assert!(partition_count > 0, "partition_count must be positive");

        if let Some(partition) = record.partition {
            return partition;
        }

        let key = record.partition_key.as_ref().or(record.key.as_ref());
        match key {
            Some(key) => {
                let hash = murmur2(key, KAFKA_SEED);
                // Mask the sign bit, then modulo, like the Java client.
                ((hash & 0x7fff_ffff) as i32) % partition_count
            }
            None => rand::thread_rng().gen_range(0..partition_count),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn explicit_partition_passes_through() {
        let record = Record::new("t", "v").with_key("ignored").with_partition(7);
        assert_eq!(Murmur2Partitioner.partition_for(3, &record), 7);
    }

    #[test]
    fn partition_key_outranks_message_key() {
        let by_partition_key = Record::new("t", "v")
            .with_key("key-a")
            .with_partition_key("route");
        let by_same_route = Record::new("t", "v")
            .with_key("key-b")
            .with_partition_key("route");
        let p1 = Murmur2Partitioner.partition_for(16, &by_partition_key);
        let p2 = Murmur2Partitioner.partition_for(16, &by_same_route);
        assert_eq!(p1, p2);
    }

    #[test]
    fn keyed_routing_is_deterministic_and_in_range() {
        for i in 0..100 {
            let record = Record::new("t", "v").with_key(format!("key-{i}"));
            let p1 = Murmur2Partitioner.partition_for(12, &record);
            let p2 = Murmur2Partitioner.partition_for(12, &record);
            assert_eq!(p1, p2);
            assert!((0..12).contains(&p1));
        }
    }

    #[test]
    fn keyless_records_stay_in_range_and_spread() {
        let record = Record::new("t", "v");
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let p = Murmur2Partitioner.partition_for(10, &record);
            assert!((0..10).contains(&p));
            seen.insert(p);
        }
        assert!(seen.len() > 1, "random assignment should hit multiple partitions");
    }

    #[test]
    fn single_partition_topic_takes_everything() {
        assert_eq!(
            Murmur2Partitioner.partition_for(1, &Record::new("t", "v").with_key("k")),
            0
        );
        assert_eq!(Murmur2Partitioner.partition_for(1, &Record::new("t", "v")), 0);
    }
}
