//! Wire primitives for the log service protocol.
//!
//! All multi-byte integers are big-endian. Variable-length fields are
//! length-prefixed: strings with an `i16` length, byte blobs and arrays with
//! an `i32` length; `-1` marks an absent nullable field.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};

/// Growable encoder over a [`BytesMut`].
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    /// Nullable UTF-8 string with an `i16` length prefix.
    pub fn write_string(&mut self, value: Option<&str>) {
        match value {
            None => self.buf.put_i16(-1),
            Some(s) => {
                self.buf.put_i16(s.len() as i16);
                self.buf.put_slice(s.as_bytes());
            }
        }
    }

    /// Nullable byte blob with an `i32` length prefix.
    pub fn write_bytes(&mut self, value: Option<&[u8]>) {
        match value {
            None => self.buf.put_i32(-1),
            Some(b) => {
                self.buf.put_i32(b.len() as i32);
                self.buf.put_slice(b);
            }
        }
    }

    /// Array count prefix. The caller writes the elements afterwards.
    pub fn write_array_len(&mut self, count: usize) {
        self.buf.put_i32(count as i32);
    }

    /// Raw bytes, passed through verbatim with no prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Bounded cursor over a byte slice.
///
/// Every read checks the remaining length first; running short fails with
/// [`WireError::Truncated`] rather than panicking.
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(WireError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.take(1)?[0] != 0)
    }

    pub fn read_string(&mut self) -> Result<Option<String>> {
        let len = self.read_i16()?;
        if len == -1 {
            return Ok(None);
        }
        if len < -1 {
            return Err(WireError::Corrupt(format!("negative string length {len}")));
        }
        let raw = self.take(len as usize)?;
        let s = std::str::from_utf8(raw)
            .map_err(|_| WireError::Corrupt("string is not valid UTF-8".into()))?;
        Ok(Some(s.to_string()))
    }

    /// Non-nullable string; a `-1` length fails with [`WireError::Corrupt`].
    pub fn read_required_string(&mut self) -> Result<String> {
        self.read_string()?
            .ok_or_else(|| WireError::Corrupt("unexpected null string".into()))
    }

    pub fn read_bytes(&mut self) -> Result<Option<Bytes>> {
        let len = self.read_i32()?;
        if len == -1 {
            return Ok(None);
        }
        if len < -1 {
            return Err(WireError::Corrupt(format!("negative bytes length {len}")));
        }
        Ok(Some(Bytes::copy_from_slice(self.take(len as usize)?)))
    }

    /// Non-nullable byte blob; a `-1` length fails with [`WireError::Corrupt`].
    pub fn read_required_bytes(&mut self) -> Result<Bytes> {
        self.read_bytes()?
            .ok_or_else(|| WireError::Corrupt("unexpected null bytes".into()))
    }

    pub fn read_array_len(&mut self) -> Result<usize> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(WireError::Corrupt(format!("negative array count {count}")));
        }
        Ok(count as usize)
    }

    pub fn read_raw(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn integer_roundtrip() {
        let mut e = Encoder::new();
        e.write_i8(-1);
        e.write_i16(i16::MIN);
        e.write_i32(1992);
        e.write_i64(i64::MAX);
        let buf = e.finish();

        let mut d = Decoder::new(&buf);
        assert_eq!(d.read_i8().unwrap(), -1);
        assert_eq!(d.read_i16().unwrap(), i16::MIN);
        assert_eq!(d.read_i32().unwrap(), 1992);
        assert_eq!(d.read_i64().unwrap(), i64::MAX);
        assert_eq!(d.remaining(), 0);
    }

    #[test]
    fn integers_are_big_endian() {
        let mut e = Encoder::new();
        e.write_i32(0x0102_0304);
        assert_eq!(&e.finish()[..], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn string_roundtrip() {
        let mut e = Encoder::new();
        e.write_string(Some("greetings"));
        e.write_string(None);
        let buf = e.finish();

        let mut d = Decoder::new(&buf);
        assert_eq!(d.read_string().unwrap(), Some("greetings".to_string()));
        assert_eq!(d.read_string().unwrap(), None);
    }

    #[test]
    fn bytes_roundtrip() {
        let mut e = Encoder::new();
        e.write_bytes(Some(b"payload"));
        e.write_bytes(None);
        let buf = e.finish();

        let mut d = Decoder::new(&buf);
        assert_eq!(d.read_bytes().unwrap().unwrap(), Bytes::from_static(b"payload"));
        assert_eq!(d.read_bytes().unwrap(), None);
    }

    #[test]
    fn truncated_read_fails() {
        let mut d = Decoder::new(&[0x00, 0x01]);
        let err = d.read_i32().unwrap_err();
        assert_eq!(
            err,
            WireError::Truncated {
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn truncated_string_body_fails() {
        // Declares 5 bytes but only 2 follow.
        let buf = [0x00, 0x05, b'h', b'i'];
        let mut d = Decoder::new(&buf);
        assert!(matches!(
            d.read_string().unwrap_err(),
            WireError::Truncated { needed: 5, available: 2 }
        ));
    }

    #[test]
    fn negative_length_on_required_field_is_corrupt() {
        let mut e = Encoder::new();
        e.write_string(None);
        let buf = e.finish();
        let mut d = Decoder::new(&buf);
        assert!(matches!(
            d.read_required_string().unwrap_err(),
            WireError::Corrupt(_)
        ));

        let mut e = Encoder::new();
        e.write_i32(-2);
        let buf = e.finish();
        let mut d = Decoder::new(&buf);
        assert!(matches!(d.read_bytes().unwrap_err(), WireError::Corrupt(_)));
    }

    #[test]
    fn negative_array_count_is_corrupt() {
        let mut e = Encoder::new();
        e.write_i32(-1);
        let buf = e.finish();
        let mut d = Decoder::new(&buf);
        assert!(matches!(
            d.read_array_len().unwrap_err(),
            WireError::Corrupt(_)
        ));
    }
}
