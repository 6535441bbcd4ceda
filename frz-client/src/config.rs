//! Client and producer configuration.

use std::fmt;
use std::time::Duration;

use frz_protocol::CompressionCodec;

use crate::error::ClientError;

/// Port assumed when a seed URI names none.
pub const DEFAULT_PORT: u16 = 9092;

/// A parsed seed broker URI of the form `kafka://host[:port]` or
/// `kafka+ssl://host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerUri {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl BrokerUri {
    pub fn parse(uri: &str) -> Result<Self, ClientError> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| ClientError::InvalidUri(format!("missing protocol in `{uri}`")))?;
        let secure = match scheme {
            "kafka" => false,
            "kafka+ssl" => true,
            other => {
                return Err(ClientError::InvalidUri(format!(
                    "invalid protocol `{other}` in `{uri}`"
                )))
            }
        };
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| ClientError::InvalidUri(format!("invalid port in `{uri}`")))?;
                (host, port)
            }
            None => (rest, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(ClientError::InvalidUri(format!("missing host in `{uri}`")));
        }
        Ok(Self {
            host: host.to_string(),
            port,
            secure,
        })
    }
}

impl fmt::Display for BrokerUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "kafka+ssl" } else { "kafka" };
        write!(f, "{scheme}://{}:{}", self.host, self.port)
    }
}

/// Connection-level configuration shared by every broker session the
/// cluster opens.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Seed broker URIs used to bootstrap metadata discovery.
    pub seed_brokers: Vec<String>,
    /// Identifier sent in every request header.
    pub client_id: String,
    /// Timeout for establishing a TCP session.
    pub connect_timeout: Duration,
    /// Timeout for individual socket reads and writes.
    pub socket_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            seed_brokers: Vec::new(),
            client_id: "franz".to_string(),
            connect_timeout: Duration::from_secs(10),
            socket_timeout: Duration::from_secs(30),
        }
    }
}

impl ClusterConfig {
    pub fn new<I, S>(seed_brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seed_brokers: seed_brokers.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }
}

/// How many replicas must acknowledge a write before the broker responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequiredAcks {
    /// Fire and forget; the broker sends no response body.
    None,
    /// The partition leader alone.
    Leader,
    /// Every in-sync replica.
    #[default]
    All,
}

impl RequiredAcks {
    pub fn as_i16(self) -> i16 {
        match self {
            Self::None => 0,
            Self::Leader => 1,
            Self::All => -1,
        }
    }
}

/// Producer tuning knobs.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub required_acks: RequiredAcks,
    /// How long the broker may wait for replica acknowledgement. Sent in the
    /// produce request; a hint to the broker, not a client-side deadline.
    pub ack_timeout: Duration,
    /// Full delivery attempts beyond the first.
    pub max_retries: u32,
    /// Pause between delivery attempts.
    pub retry_backoff: Duration,
    /// Record-count admission limit across pending queue and buffer.
    pub max_buffer_size: usize,
    /// Byte admission limit across pending queue and buffer.
    pub max_buffer_byte_size: usize,
    pub compression_codec: CompressionCodec,
    /// Minimum records in a partition's set before compression kicks in.
    pub compression_threshold: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            required_acks: RequiredAcks::All,
            ack_timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_backoff: Duration::from_secs(1),
            max_buffer_size: 1000,
            max_buffer_byte_size: 10_000_000,
            compression_codec: CompressionCodec::None,
            compression_threshold: 1,
        }
    }
}

impl ProducerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_required_acks(mut self, acks: RequiredAcks) -> Self {
        self.required_acks = acks;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_max_buffer_size(mut self, records: usize) -> Self {
        self.max_buffer_size = records;
        self
    }

    pub fn with_max_buffer_byte_size(mut self, bytes: usize) -> Self {
        self.max_buffer_byte_size = bytes;
        self
    }

    pub fn with_compression(mut self, codec: CompressionCodec, threshold: usize) -> Self {
        self.compression_codec = codec;
        self.compression_threshold = threshold;
        self
    }
}
