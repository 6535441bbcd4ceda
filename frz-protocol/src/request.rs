//! Request envelope and the request bodies the client issues.
//!
//! Envelope layout:
//!
//! ```text
//! i32 size | i16 api_key | i16 api_version | i32 correlation_id
//!          | nullable_string client_id | body
//! ```
//!
//! The size field covers everything after itself.

use bytes::Bytes;

use crate::codec::{Decoder, Encoder};
use crate::error::Result;
use crate::message_set::MessageSet;
use crate::{API_KEY_METADATA, API_KEY_PRODUCE};

pub const PRODUCE_API_VERSION: i16 = 2;
pub const METADATA_API_VERSION: i16 = 1;

/// Frames a request body for the wire.
pub fn frame_request(
    api_key: i16,
    api_version: i16,
    correlation_id: i32,
    client_id: Option<&str>,
    body: &[u8],
) -> Bytes {
    let client_id_len = client_id.map_or(0, str::len);
    let size = 2 + 2 + 4 + 2 + client_id_len + body.len();
    let mut e = Encoder::with_capacity(4 + size);
    e.write_i32(size as i32);
    e.write_i16(api_key);
    e.write_i16(api_version);
    e.write_i32(correlation_id);
    e.write_string(client_id);
    e.write_raw(body);
    e.finish()
}

/// The envelope fields preceding a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
}

impl RequestHeader {
    pub fn decode(d: &mut Decoder<'_>) -> Result<Self> {
        Ok(Self {
            api_key: d.read_i16()?,
            api_version: d.read_i16()?,
            correlation_id: d.read_i32()?,
            client_id: d.read_string()?,
        })
    }
}

/// Produce request (api key 0, version 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequest {
    pub required_acks: i16,
    pub timeout_ms: i32,
    pub topics: Vec<TopicProduceData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicProduceData {
    pub topic: String,
    pub partitions: Vec<PartitionProduceData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionProduceData {
    pub partition: i32,
    pub message_set: MessageSet,
}

impl ProduceRequest {
    pub fn encode(&self) -> Bytes {
        let mut e = Encoder::new();
        e.write_i16(self.required_acks);
        e.write_i32(self.timeout_ms);
        e.write_array_len(self.topics.len());
        for topic in &self.topics {
            e.write_string(Some(&topic.topic));
            e.write_array_len(topic.partitions.len());
            for partition in &topic.partitions {
                e.write_i32(partition.partition);
                e.write_bytes(Some(&partition.message_set.encode()));
            }
        }
        e.finish()
    }

    pub fn decode(d: &mut Decoder<'_>) -> Result<Self> {
        let required_acks = d.read_i16()?;
        let timeout_ms = d.read_i32()?;
        let topic_count = d.read_array_len()?;
        let mut topics = Vec::with_capacity(topic_count);
        for _ in 0..topic_count {
            let topic = d.read_required_string()?;
            let partition_count = d.read_array_len()?;
            let mut partitions = Vec::with_capacity(partition_count);
            for _ in 0..partition_count {
                let partition = d.read_i32()?;
                let message_set = match d.read_bytes()? {
                    Some(region) => MessageSet::decode(&region)?,
                    None => MessageSet::default(),
                };
                partitions.push(PartitionProduceData {
                    partition,
                    message_set,
                });
            }
            topics.push(TopicProduceData { topic, partitions });
        }
        Ok(Self {
            required_acks,
            timeout_ms,
            topics,
        })
    }
}

/// Topic metadata request (api key 3, version 1). An empty topic list asks
/// for no topics; brokers still return the broker list and controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    pub topics: Vec<String>,
}

impl MetadataRequest {
    pub fn encode(&self) -> Bytes {
        let mut e = Encoder::new();
        e.write_array_len(self.topics.len());
        for topic in &self.topics {
            e.write_string(Some(topic));
        }
        e.finish()
    }

    pub fn decode(d: &mut Decoder<'_>) -> Result<Self> {
        let count = d.read_array_len()?;
        let mut topics = Vec::with_capacity(count);
        for _ in 0..count {
            topics.push(d.read_required_string()?);
        }
        Ok(Self { topics })
    }
}

/// Tagged union of the request bodies this client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Produce(ProduceRequest),
    Metadata(MetadataRequest),
}

impl RequestBody {
    pub fn api_key(&self) -> i16 {
        match self {
            Self::Produce(_) => API_KEY_PRODUCE,
            Self::Metadata(_) => API_KEY_METADATA,
        }
    }

    pub fn api_version(&self) -> i16 {
        match self {
            Self::Produce(_) => PRODUCE_API_VERSION,
            Self::Metadata(_) => METADATA_API_VERSION,
        }
    }

    pub fn encode(&self) -> Bytes {
        match self {
            Self::Produce(req) => req.encode(),
            Self::Metadata(req) => req.encode(),
        }
    }
}
