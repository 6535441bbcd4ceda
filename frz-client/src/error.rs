use std::fmt;

use frz_protocol::{KafkaCode, WireError};

use crate::record::Record;

/// Errors surfaced by client operations.
#[derive(Debug)]
pub enum ClientError {
    /// Failed to establish a TCP session to a broker, including the case
    /// where every seed broker refused the connection.
    ConnectionFailed(std::io::Error),
    /// The broker closed the connection mid-exchange.
    ConnectionClosed,
    /// I/O error during communication.
    Io(std::io::Error),
    /// A socket operation exceeded the configured timeout.
    Timeout,
    /// Frame or codec failure; the session is no longer trustworthy.
    Wire(WireError),
    /// The broker answered with a different correlation id than the request
    /// carried. The connection is poisoned and must be reopened.
    CorrelationMismatch { expected: i32, actual: i32 },
    /// A broker-reported protocol error code.
    Kafka(KafkaCode),
    /// A seed broker URI that does not parse.
    InvalidUri(String),
    /// Admitting the record would exceed the producer's buffer limits; the
    /// record was not enqueued.
    BufferOverflow { size: usize, byte_size: usize },
    /// Terminal delivery outcome carrying every record that was not written.
    DeliveryFailed {
        cause: String,
        undelivered: Vec<Record>,
    },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed(e) => write!(f, "connection failed: {e}"),
            Self::ConnectionClosed => write!(f, "connection closed by broker"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Timeout => write!(f, "socket operation timed out"),
            Self::Wire(e) => write!(f, "protocol error: {e}"),
            Self::CorrelationMismatch { expected, actual } => {
                write!(
                    f,
                    "correlation id mismatch: expected {expected}, got {actual}"
                )
            }
            Self::Kafka(code) => write!(f, "broker error: {code}"),
            Self::InvalidUri(msg) => write!(f, "{msg}"),
            Self::BufferOverflow { size, byte_size } => {
                write!(f, "buffer overflow: {size} records ({byte_size} bytes) buffered")
            }
            Self::DeliveryFailed { cause, undelivered } => {
                write!(f, "{cause}: {} undelivered records", undelivered.len())
            }
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConnectionFailed(e) | Self::Io(e) => Some(e),
            Self::Wire(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<WireError> for ClientError {
    fn from(err: WireError) -> Self {
        Self::Wire(err)
    }
}

impl ClientError {
    /// Whether a later attempt can succeed without caller intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::ConnectionClosed | Self::Io(_) => true,
            Self::Timeout => true,
            Self::Kafka(code) => code.is_retriable(),
            // Wire corruption, correlation mismatches, bad URIs and buffer
            // overflows require the caller to act.
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ClientError::ConnectionClosed.is_retryable());
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::Kafka(KafkaCode::LeaderNotAvailable).is_retryable());
        assert!(!ClientError::Kafka(KafkaCode::InvalidTopic).is_retryable());
        assert!(!ClientError::CorrelationMismatch {
            expected: 1,
            actual: 2
        }
        .is_retryable());
        assert!(!ClientError::InvalidUri("bad".into()).is_retryable());
    }

    #[test]
    fn invalid_uri_displays_message_verbatim() {
        let err = ClientError::InvalidUri("invalid protocol `http` in `http://kafka`".into());
        assert_eq!(
            err.to_string(),
            "invalid protocol `http` in `http://kafka`"
        );
    }
}
