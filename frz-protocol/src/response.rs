//! Response envelope and the response bodies the client decodes.
//!
//! A response arrives as `i32 size | i32 correlation_id | body`. Exactly one
//! decoder is registered per api key; [`decode_response`] is the dispatch
//! table. Encoders exist alongside the decoders so test fixtures can stand
//! in for a broker.

use crate::codec::{Decoder, Encoder};
use crate::codes::KafkaCode;
use crate::error::{Result, WireError};
use crate::{API_KEY_METADATA, API_KEY_PRODUCE};

/// Produce response (api key 0, version 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceResponse {
    pub topics: Vec<TopicProduceResponse>,
    pub throttle_time_ms: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicProduceResponse {
    pub topic: String,
    pub partitions: Vec<PartitionProduceResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionProduceResponse {
    pub partition: i32,
    pub error: KafkaCode,
    pub base_offset: i64,
    pub log_append_time_ms: i64,
}

impl ProduceResponse {
    pub fn decode(d: &mut Decoder<'_>) -> Result<Self> {
        let topic_count = d.read_array_len()?;
        let mut topics = Vec::with_capacity(topic_count);
        for _ in 0..topic_count {
            let topic = d.read_required_string()?;
            let partition_count = d.read_array_len()?;
            let mut partitions = Vec::with_capacity(partition_count);
            for _ in 0..partition_count {
                partitions.push(PartitionProduceResponse {
                    partition: d.read_i32()?,
                    error: KafkaCode::from_i16(d.read_i16()?),
                    base_offset: d.read_i64()?,
                    log_append_time_ms: d.read_i64()?,
                });
            }
            topics.push(TopicProduceResponse { topic, partitions });
        }
        let throttle_time_ms = d.read_i32()?;
        Ok(Self {
            topics,
            throttle_time_ms,
        })
    }

    pub fn encode(&self) -> bytes::Bytes {
        let mut e = Encoder::new();
        e.write_array_len(self.topics.len());
        for topic in &self.topics {
            e.write_string(Some(&topic.topic));
            e.write_array_len(topic.partitions.len());
            for partition in &topic.partitions {
                e.write_i32(partition.partition);
                e.write_i16(partition.error.as_i16());
                e.write_i64(partition.base_offset);
                e.write_i64(partition.log_append_time_ms);
            }
        }
        e.write_i32(self.throttle_time_ms);
        e.finish()
    }
}

/// Topic metadata response (api key 3, version 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResponse {
    pub brokers: Vec<BrokerMetadata>,
    pub controller_id: i32,
    pub topics: Vec<TopicMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMetadata {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
    pub rack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    pub error: KafkaCode,
    pub topic: String,
    pub is_internal: bool,
    pub partitions: Vec<PartitionMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub error: KafkaCode,
    pub partition: i32,
    pub leader: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
}

impl MetadataResponse {
    pub fn decode(d: &mut Decoder<'_>) -> Result<Self> {
        let broker_count = d.read_array_len()?;
        let mut brokers = Vec::with_capacity(broker_count);
        for _ in 0..broker_count {
            brokers.push(BrokerMetadata {
                node_id: d.read_i32()?,
                host: d.read_required_string()?,
                port: d.read_i32()?,
                rack: d.read_string()?,
            });
        }
        let controller_id = d.read_i32()?;
        let topic_count = d.read_array_len()?;
        let mut topics = Vec::with_capacity(topic_count);
        for _ in 0..topic_count {
            let error = KafkaCode::from_i16(d.read_i16()?);
            let topic = d.read_required_string()?;
            let is_internal = d.read_bool()?;
            let partition_count = d.read_array_len()?;
            let mut partitions = Vec::with_capacity(partition_count);
            for _ in 0..partition_count {
                let error = KafkaCode::from_i16(d.read_i16()?);
                let partition = d.read_i32()?;
                let leader = d.read_i32()?;
                let replica_count = d.read_array_len()?;
                let mut replicas = Vec::with_capacity(replica_count);
                for _ in 0..replica_count {
                    replicas.push(d.read_i32()?);
                }
                let isr_count = d.read_array_len()?;
                let mut isr = Vec::with_capacity(isr_count);
                for _ in 0..isr_count {
                    isr.push(d.read_i32()?);
                }
                partitions.push(PartitionMetadata {
                    error,
                    partition,
                    leader,
                    replicas,
                    isr,
                });
            }
            topics.push(TopicMetadata {
                error,
                topic,
                is_internal,
                partitions,
            });
        }
        Ok(Self {
            brokers,
            controller_id,
            topics,
        })
    }

    pub fn encode(&self) -> bytes::Bytes {
        let mut e = Encoder::new();
        e.write_array_len(self.brokers.len());
        for broker in &self.brokers {
            e.write_i32(broker.node_id);
            e.write_string(Some(&broker.host));
            e.write_i32(broker.port);
            e.write_string(broker.rack.as_deref());
        }
        e.write_i32(self.controller_id);
        e.write_array_len(self.topics.len());
        for topic in &self.topics {
            e.write_i16(topic.error.as_i16());
            e.write_string(Some(&topic.topic));
            e.write_bool(topic.is_internal);
            e.write_array_len(topic.partitions.len());
            for partition in &topic.partitions {
                e.write_i16(partition.error.as_i16());
                e.write_i32(partition.partition);
                e.write_i32(partition.leader);
                e.write_array_len(partition.replicas.len());
                for replica in &partition.replicas {
                    e.write_i32(*replica);
                }
                e.write_array_len(partition.isr.len());
                for node in &partition.isr {
                    e.write_i32(*node);
                }
            }
        }
        e.finish()
    }
}

/// Tagged union of the response bodies this client understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Produce(ProduceResponse),
    Metadata(MetadataResponse),
}

/// Dispatches the response body decoder registered for `api_key`.
pub fn decode_response(api_key: i16, body: &[u8]) -> Result<ResponseBody> {
    let mut d = Decoder::new(body);
    match api_key {
        API_KEY_PRODUCE => Ok(ResponseBody::Produce(ProduceResponse::decode(&mut d)?)),
        API_KEY_METADATA => Ok(ResponseBody::Metadata(MetadataResponse::decode(&mut d)?)),
        other => Err(WireError::UnknownApiKey(other)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_metadata() -> MetadataResponse {
        MetadataResponse {
            brokers: vec![
                BrokerMetadata {
                    node_id: 1,
                    host: "kafka1".into(),
                    port: 9092,
                    rack: None,
                },
                BrokerMetadata {
                    node_id: 2,
                    host: "kafka2".into(),
                    port: 9092,
                    rack: Some("rack-b".into()),
                },
            ],
            controller_id: 1,
            topics: vec![TopicMetadata {
                error: KafkaCode::None,
                topic: "events".into(),
                is_internal: false,
                partitions: vec![
                    PartitionMetadata {
                        error: KafkaCode::None,
                        partition: 0,
                        leader: 1,
                        replicas: vec![1, 2],
                        isr: vec![1, 2],
                    },
                    PartitionMetadata {
                        error: KafkaCode::LeaderNotAvailable,
                        partition: 1,
                        leader: -1,
                        replicas: vec![2],
                        isr: vec![],
                    },
                ],
            }],
        }
    }

    #[test]
    fn metadata_roundtrip() {
        let response = sample_metadata();
        let encoded = response.encode();
        let decoded = MetadataResponse::decode(&mut Decoder::new(&encoded)).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn produce_roundtrip() {
        let response = ProduceResponse {
            topics: vec![TopicProduceResponse {
                topic: "events".into(),
                partitions: vec![
                    PartitionProduceResponse {
                        partition: 0,
                        error: KafkaCode::None,
                        base_offset: 42,
                        log_append_time_ms: -1,
                    },
                    PartitionProduceResponse {
                        partition: 1,
                        error: KafkaCode::NotLeaderForPartition,
                        base_offset: -1,
                        log_append_time_ms: -1,
                    },
                ],
            }],
            throttle_time_ms: 0,
        };
        let encoded = response.encode();
        let decoded = ProduceResponse::decode(&mut Decoder::new(&encoded)).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn dispatch_selects_decoder_by_api_key() {
        let encoded = sample_metadata().encode();
        match decode_response(API_KEY_METADATA, &encoded).unwrap() {
            ResponseBody::Metadata(m) => assert_eq!(m.controller_id, 1),
            other => panic!("expected metadata, got {other:?}"),
        }
    }

    #[test]
    fn dispatch_rejects_unregistered_api_key() {
        assert!(matches!(
            decode_response(99, &[]).unwrap_err(),
            WireError::UnknownApiKey(99)
        ));
    }

    #[test]
    fn truncated_response_body_fails() {
        let encoded = sample_metadata().encode();
        let err =
            MetadataResponse::decode(&mut Decoder::new(&encoded[..encoded.len() - 3])).unwrap_err();
        assert!(matches!(err, WireError::Truncated { .. }));
    }
}
