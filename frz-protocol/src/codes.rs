//! Protocol error codes returned per topic and per partition by brokers.

use std::fmt;

/// The subset of broker error codes the client acts on. Codes outside this
/// table decode as [`KafkaCode::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KafkaCode {
    None,
    UnknownTopicOrPartition,
    LeaderNotAvailable,
    NotLeaderForPartition,
    RequestTimedOut,
    ReplicaNotAvailable,
    MessageSizeTooLarge,
    InvalidTopic,
    RecordListTooLarge,
    NotEnoughReplicas,
    NotEnoughReplicasAfterAppend,
    Unknown(i16),
}

impl KafkaCode {
    pub fn from_i16(code: i16) -> Self {
        match code {
            0 => Self::None,
            3 => Self::UnknownTopicOrPartition,
            5 => Self::LeaderNotAvailable,
            6 => Self::NotLeaderForPartition,
            7 => Self::RequestTimedOut,
            9 => Self::ReplicaNotAvailable,
            10 => Self::MessageSizeTooLarge,
            17 => Self::InvalidTopic,
            18 => Self::RecordListTooLarge,
            19 => Self::NotEnoughReplicas,
            20 => Self::NotEnoughReplicasAfterAppend,
            other => Self::Unknown(other),
        }
    }

    pub fn as_i16(self) -> i16 {
        match self {
            Self::None => 0,
            Self::UnknownTopicOrPartition => 3,
            Self::LeaderNotAvailable => 5,
            Self::NotLeaderForPartition => 6,
            Self::RequestTimedOut => 7,
            Self::ReplicaNotAvailable => 9,
            Self::MessageSizeTooLarge => 10,
            Self::InvalidTopic => 17,
            Self::RecordListTooLarge => 18,
            Self::NotEnoughReplicas => 19,
            Self::NotEnoughReplicasAfterAppend => 20,
            Self::Unknown(code) => code,
        }
    }

    /// Whether a later attempt against a (possibly different) broker can
    /// succeed without caller intervention.
    pub fn is_retriable(self) -> bool {
        matches!(
            self,
            Self::UnknownTopicOrPartition
                | Self::LeaderNotAvailable
                | Self::NotLeaderForPartition
                | Self::RequestTimedOut
                | Self::ReplicaNotAvailable
                | Self::NotEnoughReplicas
                | Self::NotEnoughReplicasAfterAppend
        )
    }

    pub fn is_error(self) -> bool {
        self != Self::None
    }
}

impl fmt::Display for KafkaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "no error"),
            Self::UnknownTopicOrPartition => write!(f, "unknown topic or partition"),
            Self::LeaderNotAvailable => write!(f, "leader not available"),
            Self::NotLeaderForPartition => write!(f, "not leader for partition"),
            Self::RequestTimedOut => write!(f, "request timed out"),
            Self::ReplicaNotAvailable => write!(f, "replica not available"),
            Self::MessageSizeTooLarge => write!(f, "message size too large"),
            Self::InvalidTopic => write!(f, "invalid topic"),
            Self::RecordListTooLarge => write!(f, "record list too large"),
            Self::NotEnoughReplicas => write!(f, "not enough replicas"),
            Self::NotEnoughReplicasAfterAppend => {
                write!(f, "not enough replicas after append")
            }
            Self::Unknown(code) => write!(f, "unknown error code {code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_roundtrip() {
        for code in [0, 3, 5, 6, 7, 9, 10, 17, 18, 19, 20] {
            assert_eq!(KafkaCode::from_i16(code).as_i16(), code);
        }
    }

    #[test]
    fn unmapped_code_becomes_unknown() {
        assert_eq!(KafkaCode::from_i16(87), KafkaCode::Unknown(87));
        assert_eq!(KafkaCode::Unknown(87).as_i16(), 87);
    }

    #[test]
    fn retriable_classification_matches_table() {
        assert!(KafkaCode::LeaderNotAvailable.is_retriable());
        assert!(KafkaCode::NotLeaderForPartition.is_retriable());
        assert!(KafkaCode::ReplicaNotAvailable.is_retriable());
        assert!(KafkaCode::RequestTimedOut.is_retriable());
        assert!(KafkaCode::NotEnoughReplicas.is_retriable());
        assert!(!KafkaCode::MessageSizeTooLarge.is_retriable());
        assert!(!KafkaCode::InvalidTopic.is_retriable());
        assert!(!KafkaCode::RecordListTooLarge.is_retriable());
        assert!(!KafkaCode::Unknown(87).is_retriable());
    }
}
