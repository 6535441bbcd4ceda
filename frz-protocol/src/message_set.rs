//! Message-set (record batch) codec.
//!
//! # Wire layout
//!
//! A message set is a raw concatenation of messages, each laid out as:
//!
//! ```text
//! +-----------+----------------+---------+--------+--------------+
//! | offset    | message_size   | crc     | magic  | attributes   |
//! | 8 bytes   | 4 bytes        | 4 bytes | 1 byte | 1 byte       |
//! +-----------+----------------+---------+--------+--------------+
//! | timestamp (8 bytes, magic >= 1 only)                         |
//! +--------------------------------------------------------------+
//! | key (nullable bytes) | value (nullable bytes)                |
//! +--------------------------------------------------------------+
//! ```
//!
//! `message_size` counts everything after itself; the CRC (IEEE) covers
//! everything after the crc field. Brokers deliver the tail of a partition
//! read verbatim, so the final message of a fetched region is routinely cut
//! short; decoding drops a partial trailing message silently and fails only
//! when not a single complete message fits.

use bytes::Bytes;

use crate::codec::{Decoder, Encoder};
use crate::compression::CompressionCodec;
use crate::error::{Result, WireError};

/// Message format written by this client. Magic 0 (no timestamp) is still
/// decoded for brokers replaying old segments.
pub const CURRENT_MAGIC: i8 = 1;

/// Bytes occupied by the offset and message_size fields.
pub const MESSAGE_OVERHEAD: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub offset: i64,
    pub magic: i8,
    pub attributes: i8,
    pub timestamp_ms: Option<i64>,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

impl Message {
    pub fn new(key: Option<Bytes>, value: Option<Bytes>, timestamp_ms: Option<i64>) -> Self {
        Self {
            offset: 0,
            magic: CURRENT_MAGIC,
            attributes: 0,
            timestamp_ms,
            key,
            value,
        }
    }

    /// Codec id carried in the low three bits of the attribute byte.
    pub fn compression_id(&self) -> i8 {
        self.attributes & 0x07
    }

    fn encode_into(&self, out: &mut Encoder) {
        let mut body = Encoder::with_capacity(
            2 + self.key.as_ref().map_or(4, |k| 4 + k.len())
                + self.value.as_ref().map_or(4, |v| 4 + v.len())
                + 8,
        );
        body.write_i8(self.magic);
        body.write_i8(self.attributes);
        if self.magic >= 1 {
            body.write_i64(self.timestamp_ms.unwrap_or(-1));
        }
        body.write_bytes(self.key.as_deref());
        body.write_bytes(self.value.as_deref());
        let body = body.finish();

        out.write_i64(self.offset);
        out.write_i32((4 + body.len()) as i32);
        out.write_u32(crc32(&body));
        out.write_raw(&body);
    }

    /// Decodes the region after the message_size field.
    fn decode_body(offset: i64, body: &[u8]) -> Result<Self> {
        let mut d = Decoder::new(body);
        let expected = d.read_u32()?;
        let actual = crc32(&body[4..]);
        if expected != actual {
            return Err(WireError::CrcMismatch { expected, actual });
        }
        let magic = d.read_i8()?;
        if !(0..=1).contains(&magic) {
            return Err(WireError::Corrupt(format!("unsupported message magic {magic}")));
        }
        let attributes = d.read_i8()?;
        let timestamp_ms = if magic >= 1 {
            match d.read_i64()? {
                -1 => None,
                t => Some(t),
            }
        } else {
            None
        };
        let key = d.read_bytes()?;
        let value = d.read_bytes()?;
        Ok(Self {
            offset,
            magic,
            attributes,
            timestamp_ms,
            key,
            value,
        })
    }
}

/// An ordered sequence of messages sharing a topic/partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSet {
    pub messages: Vec<Message>,
}

impl MessageSet {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Raw wire encoding, with no outer length prefix.
    pub fn encode(&self) -> Bytes {
        let mut e = Encoder::new();
        for message in &self.messages {
            message.encode_into(&mut e);
        }
        e.finish()
    }

    /// Decodes messages until the region is exhausted.
    ///
    /// A partial trailing message is dropped without error; if the region
    /// holds no complete message at all, fails with
    /// [`WireError::MessageTooLargeToRead`] so the caller can raise its
    /// fetch size. Wrapper messages are decompressed and their inner
    /// messages spliced in with offsets made absolute.
    pub fn decode(region: &[u8]) -> Result<Self> {
        let mut messages = Vec::new();
        let mut d = Decoder::new(region);
        let mut truncated_tail = false;

        while d.remaining() > 0 {
            if d.remaining() < MESSAGE_OVERHEAD {
                truncated_tail = true;
                break;
            }
            let offset = d.read_i64()?;
            let size = d.read_i32()?;
            if size < 0 {
                return Err(WireError::Corrupt(format!("negative message size {size}")));
            }
            if size as usize > d.remaining() {
                truncated_tail = true;
                break;
            }
            let body = d.read_raw(size as usize)?;
            let message = Message::decode_body(offset, body)?;

            if message.compression_id() == 0 {
                messages.push(message);
            } else {
                let codec = CompressionCodec::from_id(message.compression_id())?;
                let value = message.value.as_ref().ok_or_else(|| {
                    WireError::Corrupt("compressed wrapper message has no value".into())
                })?;
                let inner_bytes = codec.decompress(value)?;
                let inner = Self::decode(&inner_bytes)?;
                messages.extend(correct_offsets(inner.messages, message.offset));
            }
        }

        if messages.is_empty() && truncated_tail {
            return Err(WireError::MessageTooLargeToRead {
                region: region.len(),
            });
        }
        Ok(Self { messages })
    }
}

/// Rewrites inner-message offsets relative to the wrapper offset.
///
/// Modern brokers store inner offsets relative to the wrapper: the last
/// inner offset lands on the wrapper offset and earlier ones are shifted
/// back by the same delta, which preserves gaps introduced by log
/// compaction. Legacy (v0.9) wrappers carry absolute inner offsets: their
/// last inner offset already equals the wrapper offset, so they pass
/// through verbatim.
fn correct_offsets(mut inner: Vec<Message>, wrapper_offset: i64) -> Vec<Message> {
    let last_inner = match inner.last() {
        Some(message) => message.offset,
        None => return inner,
    };
    if last_inner == wrapper_offset {
        return inner;
    }
    for message in &mut inner {
        message.offset = wrapper_offset - (last_inner - message.offset);
    }
    inner
}

pub(crate) fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compression::{CompressionCodec, Compressor};

    fn message(offset: i64, value: &str) -> Message {
        Message {
            offset,
            magic: CURRENT_MAGIC,
            attributes: 0,
            timestamp_ms: Some(1_500_000_000_000),
            key: None,
            value: Some(Bytes::copy_from_slice(value.as_bytes())),
        }
    }

    /// Builds a wrapper by hand, the way a broker would return it from a
    /// fetch: inner set compressed, wrapper carrying the given offset.
    fn wrapped(inner: MessageSet, codec: CompressionCodec, wrapper_offset: i64) -> MessageSet {
        let compressed = codec.compress(&inner.encode()).unwrap();
        MessageSet::new(vec![Message {
            offset: wrapper_offset,
            magic: CURRENT_MAGIC,
            attributes: codec.id(),
            timestamp_ms: None,
            key: None,
            value: Some(compressed.into()),
        }])
    }

    #[test]
    fn roundtrip_plain() {
        let set = MessageSet::new(vec![
            message(0, "first"),
            Message {
                offset: 1,
                magic: CURRENT_MAGIC,
                attributes: 0,
                timestamp_ms: None,
                key: Some(Bytes::from_static(b"key")),
                value: None,
            },
            message(2, "third"),
        ]);
        let decoded = MessageSet::decode(&set.encode()).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn roundtrip_empty() {
        let set = MessageSet::default();
        assert_eq!(MessageSet::decode(&set.encode()).unwrap(), set);
    }

    #[test]
    fn decodes_magic_zero() {
        let set = MessageSet::new(vec![Message {
            offset: 7,
            magic: 0,
            attributes: 0,
            timestamp_ms: None,
            key: None,
            value: Some(Bytes::from_static(b"legacy")),
        }]);
        let decoded = MessageSet::decode(&set.encode()).unwrap();
        assert_eq!(decoded.messages[0].magic, 0);
        assert_eq!(decoded.messages[0].timestamp_ms, None);
        assert_eq!(
            decoded.messages[0].value,
            Some(Bytes::from_static(b"legacy"))
        );
    }

    #[test]
    fn roundtrip_compressed() {
        let set = MessageSet::new(vec![
            message(0, "one of several highly similar messages"),
            message(1, "one of several highly similar messages"),
            message(2, "one of several highly similar messages"),
        ]);
        let wrapped = Compressor::new(CompressionCodec::Gzip, 1)
            .wrap(set.clone(), None)
            .unwrap();
        assert_eq!(wrapped.len(), 1);
        let decoded = MessageSet::decode(&wrapped.encode()).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn truncated_final_message_is_dropped() {
        let set = MessageSet::new(vec![message(0, "hello"), message(1, "good-day")]);
        let encoded = set.encode();
        let truncated = &encoded[..encoded.len() - 1];

        let decoded = MessageSet::decode(truncated).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(
            decoded.messages[0].value,
            Some(Bytes::from_static(b"hello"))
        );
    }

    #[test]
    fn truncated_only_message_is_too_large_to_read() {
        let set = MessageSet::new(vec![message(0, "hello")]);
        let encoded = set.encode();
        let truncated = &encoded[..encoded.len() - 1];

        let err = MessageSet::decode(truncated).unwrap_err();
        assert!(matches!(err, WireError::MessageTooLargeToRead { .. }));
    }

    #[test]
    fn truncated_mid_header_is_tolerated_after_a_complete_message() {
        let set = MessageSet::new(vec![message(0, "hello"), message(1, "good-day")]);
        let encoded = set.encode();
        // Cut inside the second message's 12-byte header.
        let first_len = MessageSet::new(vec![message(0, "hello")]).encode().len();
        let decoded = MessageSet::decode(&encoded[..first_len + 5]).unwrap();
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn relative_offsets_dense() {
        let inner = MessageSet::new(vec![message(0, "a"), message(1, "b"), message(2, "c")]);
        let set = wrapped(inner, CompressionCodec::Snappy, 1000);

        let decoded = MessageSet::decode(&set.encode()).unwrap();
        let offsets: Vec<i64> = decoded.messages.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![998, 999, 1000]);
    }

    #[test]
    fn relative_offsets_sparse_after_compaction() {
        let inner = MessageSet::new(vec![message(0, "a"), message(2, "b"), message(3, "c")]);
        let set = wrapped(inner, CompressionCodec::Snappy, 1000);

        let decoded = MessageSet::decode(&set.encode()).unwrap();
        let offsets: Vec<i64> = decoded.messages.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![997, 999, 1000]);
    }

    #[test]
    fn legacy_absolute_offsets_kept_verbatim() {
        let inner = MessageSet::new(vec![
            message(997, "a"),
            message(999, "b"),
            message(1000, "c"),
        ]);
        let set = wrapped(inner, CompressionCodec::Gzip, 1000);

        let decoded = MessageSet::decode(&set.encode()).unwrap();
        let offsets: Vec<i64> = decoded.messages.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![997, 999, 1000]);
    }

    #[test]
    fn crc_mismatch_is_corrupt() {
        let set = MessageSet::new(vec![message(0, "hello")]);
        let mut encoded = set.encode().to_vec();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;

        let err = MessageSet::decode(&encoded).unwrap_err();
        assert!(matches!(err, WireError::CrcMismatch { .. }));
    }

    #[test]
    fn negative_message_size_is_corrupt() {
        let mut e = Encoder::new();
        e.write_i64(0);
        e.write_i32(-5);
        let err = MessageSet::decode(&e.finish()).unwrap_err();
        assert!(matches!(err, WireError::Corrupt(_)));
    }
}
