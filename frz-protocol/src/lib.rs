//! Binary wire protocol for the log service.
//!
//! Pure encode/decode with no I/O: primitive codecs, the framed
//! request/response envelope, produce and topic-metadata message types, the
//! message-set container with its compression wrapper and relative-offset
//! rules, and the broker error-code table.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
mod codes;
pub mod compression;
mod error;
pub mod message_set;
pub mod request;
pub mod response;

pub use codec::{Decoder, Encoder};
pub use codes::KafkaCode;
pub use compression::{CompressionCodec, Compressor};
pub use error::{Result, WireError};
pub use message_set::{Message, MessageSet, CURRENT_MAGIC, MESSAGE_OVERHEAD};
pub use request::{
    frame_request, MetadataRequest, PartitionProduceData, ProduceRequest, RequestBody,
    RequestHeader, TopicProduceData, METADATA_API_VERSION, PRODUCE_API_VERSION,
};
pub use response::{
    decode_response, BrokerMetadata, MetadataResponse, PartitionMetadata,
    PartitionProduceResponse, ProduceResponse, ResponseBody, TopicMetadata, TopicProduceResponse,
};

// Api keys of the log service protocol. The client core issues Produce and
// Metadata; the rest are exercised by collaborators sharing this codec.
pub const API_KEY_PRODUCE: i16 = 0;
pub const API_KEY_FETCH: i16 = 1;
pub const API_KEY_LIST_OFFSETS: i16 = 2;
pub const API_KEY_METADATA: i16 = 3;
pub const API_KEY_OFFSET_COMMIT: i16 = 8;
pub const API_KEY_OFFSET_FETCH: i16 = 9;
pub const API_KEY_GROUP_COORDINATOR: i16 = 10;
pub const API_KEY_JOIN_GROUP: i16 = 11;
pub const API_KEY_HEARTBEAT: i16 = 12;
pub const API_KEY_LEAVE_GROUP: i16 = 13;
pub const API_KEY_SYNC_GROUP: i16 = 14;
pub const API_KEY_SASL_HANDSHAKE: i16 = 17;
pub const API_KEY_API_VERSIONS: i16 = 18;
pub const API_KEY_CREATE_TOPICS: i16 = 19;
pub const API_KEY_DELETE_TOPICS: i16 = 20;
pub const API_KEY_DESCRIBE_CONFIGS: i16 = 32;
pub const API_KEY_CREATE_PARTITIONS: i16 = 37;
