//! Batching producer facade.
//!
//! Records enter a pending queue on [`Producer::produce`] and move into the
//! partition-assigned buffer during [`Producer::deliver_messages`], which
//! runs the bounded-retry delivery loop: refresh metadata, assign
//! partitions, fan the buffer out to the partition leaders, prune what the
//! brokers acknowledged, back off, repeat. Whatever survives the retry
//! budget comes back to the caller inside
//! [`ClientError::DeliveryFailed`] as re-enqueueable records.
//!
//! # Example
//!
//! ```rust,no_run
//! use frz_client::{Cluster, ClusterConfig, Producer, ProducerConfig, Record};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cluster = Cluster::new(ClusterConfig::new(["kafka://localhost:9092"]))?;
//!     let mut producer = Producer::new(cluster, ProducerConfig::default());
//!
//!     producer.produce(Record::new("greetings", "hello").with_key("user-1"))?;
//!     producer.deliver_messages().await?;
//!
//!     producer.shutdown();
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;

use frz_protocol::{Compressor, KafkaCode};
use tracing::{debug, warn};

use crate::buffer::MessageBuffer;
use crate::cluster::Cluster;
use crate::config::{ProducerConfig, RequiredAcks};
use crate::error::{ClientError, Result};
use crate::metrics::{MetricsSnapshot, ProducerMetrics};
use crate::partitioner::{Murmur2Partitioner, Partitioner};
use crate::pending::PendingQueue;
use crate::produce::ProduceOperation;
use crate::record::Record;

pub struct Producer {
    cluster: Cluster,
    config: ProducerConfig,
    compressor: Compressor,
    partitioner: Box<dyn Partitioner>,
    pending: PendingQueue,
    buffer: MessageBuffer,
    metrics: ProducerMetrics,
}

impl Producer {
    pub fn new(cluster: Cluster, config: ProducerConfig) -> Self {
        let compressor = Compressor::new(config.compression_codec, config.compression_threshold);
        Self {
            cluster,
            config,
            compressor,
            partitioner: Box::new(Murmur2Partitioner),
            pending: PendingQueue::new(),
            buffer: MessageBuffer::new(),
            metrics: ProducerMetrics::default(),
        }
    }

    /// Swaps in a caller-supplied partition assignment scheme, e.g. to stay
    /// compatible with records written by another client.
    pub fn with_partitioner(mut self, partitioner: Box<dyn Partitioner>) -> Self {
        self.partitioner = partitioner;
        self
    }

    /// Enqueues a record for the next delivery.
    ///
    /// Fails with [`ClientError::BufferOverflow`] when admitting the record
    /// would reach either buffer limit; the record is not enqueued, but its
    /// topic still joins the metadata target set so the next refresh learns
    /// about it.
    pub fn produce(&mut self, record: Record) -> Result<()> {
        self.cluster.add_target_topics([record.topic.as_str()]);

        if self.buffer_size() + 1 >= self.config.max_buffer_size
            || self.buffer_byte_size() + record.byte_size() >= self.config.max_buffer_byte_size
        {
            ProducerMetrics::incr(&self.metrics.buffer_overflows, 1);
            warn!(
                topic = %record.topic,
                size = self.buffer_size(),
                byte_size = self.buffer_byte_size(),
                "buffer limits reached, rejecting record"
            );
            return Err(ClientError::BufferOverflow {
                size: self.buffer_size(),
                byte_size: self.buffer_byte_size(),
            });
        }

        ProducerMetrics::incr(&self.metrics.records_produced, 1);
        self.pending.push(record);
        Ok(())
    }

    /// Records held across the pending queue and the message buffer.
    pub fn buffer_size(&self) -> usize {
        self.pending.size() + self.buffer.size()
    }

    /// Bytes held across the pending queue and the message buffer.
    pub fn buffer_byte_size(&self) -> usize {
        self.pending.byte_size() + self.buffer.byte_size()
    }

    /// Drops everything without delivering it.
    pub fn clear_buffer(&mut self) {
        self.pending.clear();
        self.buffer.clear();
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Delivers every buffered record, retrying up to the configured budget.
    ///
    /// A no-op when nothing is buffered. Fails only with
    /// [`ClientError::DeliveryFailed`], whose payload is exactly the set of
    /// records still unaccounted for, in re-enqueueable form.
    pub async fn deliver_messages(&mut self) -> Result<()> {
        if self.buffer_size() == 0 {
            return Ok(());
        }
        let outcome = self.deliver_with_retries().await;
        if outcome.is_err() {
            ProducerMetrics::incr(&self.metrics.delivery_errors, 1);
        }
        outcome
    }

    /// Closes every broker connection and discards the topology snapshot.
    pub fn shutdown(&mut self) {
        self.cluster.disconnect();
    }

    async fn deliver_with_retries(&mut self) -> Result<()> {
        let goal = self.buffer_size() as u64;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            ProducerMetrics::incr(&self.metrics.delivery_attempts, 1);
            debug!(attempt, buffered = self.buffer_size(), "delivery attempt");

            if let Err(e) = self.cluster.refresh_metadata_if_necessary().await {
                return Err(self.delivery_failed(format!("metadata refresh failed: {e}")));
            }

            self.assign_partitions().await;

            let mut operation = ProduceOperation {
                cluster: &mut self.cluster,
                buffer: &mut self.buffer,
                compressor: &self.compressor,
                required_acks: self.config.required_acks.as_i16(),
                ack_timeout_ms: self.config.ack_timeout.as_millis() as i32,
            };
            operation.execute().await;

            if self.config.required_acks == RequiredAcks::None {
                // Nothing acknowledges a fire-and-forget write; everything
                // transmitted counts as delivered.
                self.buffer.clear();
            }
            if self.buffer_size() == 0 {
                break;
            }
            if attempt <= self.config.max_retries {
                debug!(
                    attempt,
                    remaining = self.buffer_size(),
                    backoff = ?self.config.retry_backoff,
                    "records remain, backing off before retry"
                );
                tokio::time::sleep(self.config.retry_backoff).await;
                continue;
            }
            break;
        }

        if !self.pending.is_empty() {
            self.cluster.mark_as_stale();
            return Err(self.delivery_failed("failed to assign partitions"));
        }
        if !self.buffer.is_empty() {
            return Err(self.delivery_failed("failed to send"));
        }

        ProducerMetrics::incr(&self.metrics.records_delivered, goal);
        Ok(())
    }

    /// Drains the pending queue into the buffer, resolving a partition for
    /// each record.
    ///
    /// Once a topic fails assignment in this pass, every later record of
    /// that topic is deferred too, since a mid-pass recovery would
    /// reorder the topic's records across retries. The deferred records
    /// become the new pending queue contents.
    async fn assign_partitions(&mut self) {
        let mut failed: Vec<Record> = Vec::new();
        let mut failed_topics: HashSet<String> = HashSet::new();

        for record in self.pending.drain() {
            if failed_topics.contains(&record.topic) {
                failed.push(record);
                continue;
            }

            let assigned = match record.partition {
                Some(partition) => Ok(partition),
                None => match self.cluster.partitions_for(&record.topic).await {
                    Ok(partitions) if partitions.is_empty() => {
                        Err(ClientError::Kafka(KafkaCode::UnknownTopicOrPartition))
                    }
                    Ok(partitions) => {
                        Ok(self
                            .partitioner
                            .partition_for(partitions.len() as i32, &record))
                    }
                    Err(e) => Err(e),
                },
            };

            match assigned {
                Ok(partition) => self.buffer.write(record, partition),
                Err(e) => {
                    warn!(
                        topic = %record.topic,
                        error = %e,
                        "failed to assign partition, deferring topic for this pass"
                    );
                    failed_topics.insert(record.topic.clone());
                    failed.push(record);
                }
            }
        }

        if !failed.is_empty() {
            self.cluster.mark_as_stale();
        }
        self.pending.replace(failed);
    }

    fn delivery_failed(&self, cause: impl Into<String>) -> ClientError {
        let mut undelivered = self.pending.records();
        undelivered.extend(self.buffer.records());
        ClientError::DeliveryFailed {
            cause: cause.into(),
            undelivered,
        }
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("buffer_size", &self.buffer_size())
            .field("buffer_byte_size", &self.buffer_byte_size())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;

    fn producer(config: ProducerConfig) -> Producer {
        let cluster = Cluster::new(ClusterConfig::new(["kafka://unused:9092"])).unwrap();
        Producer::new(cluster, config)
    }

    #[test]
    fn produce_enqueues_and_tracks_sizes() {
        let mut producer = producer(ProducerConfig::default());
        producer.produce(Record::new("events", "hello")).unwrap();
        producer
            .produce(Record::new("events", "worldly").with_key("k"))
            .unwrap();

        assert_eq!(producer.buffer_size(), 2);
        assert_eq!(producer.buffer_byte_size(), 5 + 7 + 1);
        assert_eq!(producer.metrics().records_produced, 2);
    }

    #[test]
    fn record_count_overflow_is_a_precheck() {
        let mut producer = producer(ProducerConfig::new().with_max_buffer_size(3));
        producer.produce(Record::new("t", "a")).unwrap();
        producer.produce(Record::new("t", "b")).unwrap();

        // Admitting a third record would reach the limit of 3.
        let err = producer.produce(Record::new("t", "c")).unwrap_err();
        assert!(matches!(err, ClientError::BufferOverflow { size: 2, .. }));
        assert_eq!(producer.buffer_size(), 2);
        assert_eq!(producer.metrics().buffer_overflows, 1);
    }

    #[test]
    fn byte_size_overflow_is_a_precheck() {
        let mut producer = producer(ProducerConfig::new().with_max_buffer_byte_size(10));
        producer.produce(Record::new("t", "12345")).unwrap();

        let err = producer.produce(Record::new("t", "67890")).unwrap_err();
        assert!(matches!(err, ClientError::BufferOverflow { .. }));
        assert_eq!(producer.buffer_byte_size(), 5);
    }

    #[test]
    fn clear_buffer_drops_everything() {
        let mut producer = producer(ProducerConfig::default());
        producer.produce(Record::new("t", "a")).unwrap();
        producer.produce(Record::new("t", "b")).unwrap();
        producer.clear_buffer();
        assert_eq!(producer.buffer_size(), 0);
        assert_eq!(producer.buffer_byte_size(), 0);
    }

    #[tokio::test]
    async fn deliver_messages_is_a_noop_when_empty() {
        let mut producer = producer(ProducerConfig::default());
        // No brokers exist at the seed address; an empty buffer must not
        // touch the network at all.
        producer.deliver_messages().await.unwrap();
    }
}
