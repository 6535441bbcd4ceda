use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("input truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("corrupt frame: {0}")]
    Corrupt(String),

    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("no complete message fits in a {region} byte region")]
    MessageTooLargeToRead { region: usize },

    #[error("unknown compression codec id: {0}")]
    UnknownCodec(i8),

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("no decoder registered for api key {0}")]
    UnknownApiKey(i16),
}

pub type Result<T> = std::result::Result<T, WireError>;
