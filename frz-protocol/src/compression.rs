//! Message-set compression.
//!
//! A compressed message set travels as a single wrapper message whose value
//! is the codec-compressed wire encoding of the inner set. The codec id
//! rides in the low three bits of the wrapper's attribute byte.

use std::io::{Read, Write};

use crate::error::{Result, WireError};
use crate::message_set::{Message, MessageSet, CURRENT_MAGIC};

/// Codec ids as they appear in the attribute byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionCodec {
    None,
    Gzip,
    Snappy,
}

impl Default for CompressionCodec {
    fn default() -> Self {
        Self::None
    }
}

impl CompressionCodec {
    pub fn id(self) -> i8 {
        match self {
            Self::None => 0,
            Self::Gzip => 1,
            Self::Snappy => 2,
        }
    }

    pub fn from_id(id: i8) -> Result<Self> {
        match id {
            0 => Ok(Self::None),
            1 => Ok(Self::Gzip),
            2 => Ok(Self::Snappy),
            other => Err(WireError::UnknownCodec(other)),
        }
    }

    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder
                    .write_all(data)
                    .and_then(|()| encoder.finish())
                    .map_err(|e| WireError::Compression(format!("gzip: {e}")))
            }
            Self::Snappy => snap::raw::Encoder::new()
                .compress_vec(data)
                .map_err(|e| WireError::Compression(format!("snappy: {e}"))),
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Gzip => {
                let mut decoder = flate2::read::GzDecoder::new(data);
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| WireError::Compression(format!("gzip: {e}")))?;
                Ok(out)
            }
            Self::Snappy => snap::raw::Decoder::new()
                .decompress_vec(data)
                .map_err(|e| WireError::Compression(format!("snappy: {e}"))),
        }
    }
}

/// Wraps message sets in a compressed envelope once they reach a size
/// threshold. Below the threshold compression costs more than it saves, so
/// the set passes through untouched.
#[derive(Debug, Clone)]
pub struct Compressor {
    codec: CompressionCodec,
    threshold: usize,
}

impl Compressor {
    pub fn new(codec: CompressionCodec, threshold: usize) -> Self {
        Self { codec, threshold }
    }

    pub fn codec(&self) -> CompressionCodec {
        self.codec
    }

    /// Returns either the original set unchanged, or a one-message set whose
    /// value is the compressed encoding of the original.
    ///
    /// The wrapper carries `wrapper_offset` when given; otherwise it takes
    /// the last inner message's offset, which decodes back to the identical
    /// set (the inner offsets read as absolute).
    pub fn wrap(&self, set: MessageSet, wrapper_offset: Option<i64>) -> Result<MessageSet> {
        if self.codec == CompressionCodec::None || set.len() < self.threshold {
            return Ok(set);
        }

        let offset = wrapper_offset
            .or_else(|| set.messages.last().map(|m| m.offset))
            .unwrap_or(-1);
        let encoded = set.encode();
        let compressed = self.codec.compress(&encoded)?;
        let wrapper = Message {
            offset,
            magic: CURRENT_MAGIC,
            attributes: self.codec.id(),
            timestamp_ms: None,
            key: None,
            value: Some(compressed.into()),
        };
        Ok(MessageSet::new(vec![wrapper]))
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(CompressionCodec::None, 1)
    }
}
