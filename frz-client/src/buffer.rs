//! In-memory buffer of partition-assigned records awaiting delivery.

use std::collections::HashMap;

use crate::record::Record;

/// Two-level mapping `topic → partition → ordered records`.
///
/// Per `(topic, partition)` the insertion order is preserved end-to-end;
/// this is the producer's only correctness-critical ordering property.
/// `size` and `byte_size` track the exact totals across every list.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    topics: HashMap<String, HashMap<i32, Vec<Record>>>,
    size: usize,
    byte_size: usize,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, record: Record, partition: i32) {
        self.size += 1;
        self.byte_size += record.byte_size();
        self.topics
            .entry(record.topic.clone())
            .or_default()
            .entry(partition)
            .or_default()
            .push(record);
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Snapshot of every `(topic, partition)` pair holding records, in a
    /// deterministic order.
    pub fn partitions(&self) -> Vec<(String, i32)> {
        let mut keys: Vec<(String, i32)> = self
            .topics
            .iter()
            .flat_map(|(topic, partitions)| {
                partitions
                    .iter()
                    .filter(|(_, records)| !records.is_empty())
                    .map(move |(partition, _)| (topic.clone(), *partition))
            })
            .collect();
        keys.sort();
        keys
    }

    pub fn records_for(&self, topic: &str, partition: i32) -> Option<&[Record]> {
        self.topics
            .get(topic)
            .and_then(|partitions| partitions.get(&partition))
            .map(Vec::as_slice)
    }

    /// Drops one partition's records after a successful acknowledgement.
    pub fn clear_partition(&mut self, topic: &str, partition: i32) {
        let Some(partitions) = self.topics.get_mut(topic) else {
            return;
        };
        if let Some(records) = partitions.remove(&partition) {
            self.size -= records.len();
            self.byte_size -= records.iter().map(Record::byte_size).sum::<usize>();
        }
        if partitions.is_empty() {
            self.topics.remove(topic);
        }
    }

    pub fn clear(&mut self) {
        self.topics.clear();
        self.size = 0;
        self.byte_size = 0;
    }

    /// Clones out every buffered record, per-partition order intact, in the
    /// same deterministic partition order as [`Self::partitions`].
    pub fn records(&self) -> Vec<Record> {
        let mut out = Vec::with_capacity(self.size);
        for (topic, partition) in self.partitions() {
            if let Some(records) = self.records_for(&topic, partition) {
                out.extend_from_slice(records);
            }
        }
        out
    }
}
