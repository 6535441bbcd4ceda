//! The user-visible unit of data.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// A record headed for a topic. Immutable once constructed; cloning is cheap
/// because the payloads are [`Bytes`].
///
/// The `partition_key` never goes on the wire. It only steers partition
/// assignment when no explicit partition is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub value: Option<Bytes>,
    pub key: Option<Bytes>,
    pub partition: Option<i32>,
    pub partition_key: Option<Bytes>,
    pub create_time: Option<SystemTime>,
}

impl Record {
    /// A record with a value, stamped with the current wall-clock time.
    pub fn new(topic: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            value: Some(value.into()),
            key: None,
            partition: None,
            partition_key: None,
            create_time: Some(SystemTime::now()),
        }
    }

    /// A record with no value (a deletion marker for compacted topics).
    pub fn tombstone(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            value: None,
            key: None,
            partition: None,
            partition_key: None,
            create_time: Some(SystemTime::now()),
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<Bytes>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    pub fn with_create_time(mut self, create_time: Option<SystemTime>) -> Self {
        self.create_time = create_time;
        self
    }

    /// Key plus value length; the figure the producer's byte accounting uses.
    pub fn byte_size(&self) -> usize {
        self.key.as_ref().map_or(0, Bytes::len) + self.value.as_ref().map_or(0, Bytes::len)
    }

    pub(crate) fn timestamp_ms(&self) -> Option<i64> {
        self.create_time
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
    }
}
