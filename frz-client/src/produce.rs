//! One attempt at delivering the current buffer.

use std::collections::BTreeMap;

use frz_protocol::{
    Compressor, KafkaCode, Message, MessageSet, PartitionProduceData, ProduceRequest,
    ProduceResponse, TopicProduceData, CURRENT_MAGIC,
};
use tracing::{debug, error, warn};

use crate::buffer::MessageBuffer;
use crate::cluster::Cluster;
use crate::error::Result;
use crate::record::Record;

/// Groups the buffer by partition leader, fans a produce request out to
/// each, and prunes whatever the brokers acknowledged.
///
/// Partial failure is the normal case here: an unresolvable leader or a
/// per-partition error code leaves those records buffered and flags the
/// cluster stale, but never fails the attempt as a whole. The caller
/// decides when to stop retrying.
pub(crate) struct ProduceOperation<'a> {
    pub cluster: &'a mut Cluster,
    pub buffer: &'a mut MessageBuffer,
    pub compressor: &'a Compressor,
    pub required_acks: i16,
    pub ack_timeout_ms: i32,
}

impl ProduceOperation<'_> {
    pub(crate) async fn execute(&mut self) {
        let mut by_leader: BTreeMap<i32, Vec<(String, i32)>> = BTreeMap::new();
        for (topic, partition) in self.buffer.partitions() {
            match self.cluster.leader_id(&topic, partition).await {
                Ok(node_id) => {
                    by_leader.entry(node_id).or_default().push((topic, partition));
                }
                Err(e) => {
                    warn!(
                        topic = %topic,
                        partition,
                        error = %e,
                        "cannot resolve partition leader, keeping records for retry"
                    );
                    self.cluster.mark_as_stale();
                }
            }
        }

        for (node_id, assignments) in by_leader {
            if let Err(e) = self.send_to_broker(node_id, &assignments).await {
                warn!(
                    node_id,
                    error = %e,
                    "produce request failed, keeping records for retry"
                );
                self.cluster.evict_broker(node_id);
                self.cluster.mark_as_stale();
            }
        }
    }

    async fn send_to_broker(&mut self, node_id: i32, assignments: &[(String, i32)]) -> Result<()> {
        let mut topics: BTreeMap<String, Vec<PartitionProduceData>> = BTreeMap::new();
        for (topic, partition) in assignments {
            let Some(records) = self.buffer.records_for(topic, *partition) else {
                continue;
            };
            if records.is_empty() {
                continue;
            }
            let message_set = self.compressor.wrap(message_set_for(records), None)?;
            topics
                .entry(topic.clone())
                .or_default()
                .push(PartitionProduceData {
                    partition: *partition,
                    message_set,
                });
        }
        if topics.is_empty() {
            return Ok(());
        }

        let request = ProduceRequest {
            required_acks: self.required_acks,
            timeout_ms: self.ack_timeout_ms,
            topics: topics
                .into_iter()
                .map(|(topic, partitions)| TopicProduceData { topic, partitions })
                .collect(),
        };

        if self.required_acks == 0 {
            let connection = self.cluster.broker(node_id).await?;
            connection.produce_no_ack(request).await?;
            debug!(node_id, "produce request sent, no acknowledgement expected");
            for (topic, partition) in assignments {
                self.buffer.clear_partition(topic, *partition);
            }
            return Ok(());
        }

        let connection = self.cluster.broker(node_id).await?;
        let response = connection.produce(request).await?;
        self.handle_response(&response);
        Ok(())
    }

    fn handle_response(&mut self, response: &ProduceResponse) {
        for topic in &response.topics {
            for partition in &topic.partitions {
                match partition.error {
                    KafkaCode::None => {
                        debug!(
                            topic = %topic.topic,
                            partition = partition.partition,
                            base_offset = partition.base_offset,
                            "partition acknowledged"
                        );
                        self.buffer.clear_partition(&topic.topic, partition.partition);
                    }
                    code if code.is_retriable() => {
                        warn!(
                            topic = %topic.topic,
                            partition = partition.partition,
                            error = %code,
                            "retriable partition error, keeping records"
                        );
                        self.cluster.mark_as_stale();
                    }
                    code => {
                        error!(
                            topic = %topic.topic,
                            partition = partition.partition,
                            error = %code,
                            "fatal partition error, records will surface as undelivered"
                        );
                    }
                }
            }
        }
    }
}

/// Builds the wire set for one partition's records, in buffer order.
fn message_set_for(records: &[Record]) -> MessageSet {
    MessageSet::new(
        records
            .iter()
            .enumerate()
            .map(|(i, record)| Message {
                offset: i as i64,
                magic: CURRENT_MAGIC,
                attributes: 0,
                timestamp_ms: record.timestamp_ms(),
                key: record.key.clone(),
                value: record.value.clone(),
            })
            .collect(),
    )
}
