//! Datagram payloads
//!
//! `Datagram` wraps a `BytesMut` so frames can be built and split without
//! extra copies.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{NetError, Result};

/// An opaque, growable byte payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Datagram {
    data: BytesMut,
}

impl Datagram {
    /// Create an empty datagram
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty datagram with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Create a datagram holding a copy of `bytes`
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: BytesMut::from(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Append raw bytes
    pub fn append_data(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn add_bool(&mut self, value: bool) {
        self.data.put_u8(value as u8);
    }

    pub fn add_u8(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    pub fn add_i8(&mut self, value: i8) {
        self.data.put_i8(value);
    }

    pub fn add_u16(&mut self, value: u16) {
        self.data.put_u16_le(value);
    }

    pub fn add_i16(&mut self, value: i16) {
        self.data.put_i16_le(value);
    }

    pub fn add_u32(&mut self, value: u32) {
        self.data.put_u32_le(value);
    }

    pub fn add_i32(&mut self, value: i32) {
        self.data.put_i32_le(value);
    }

    pub fn add_u64(&mut self, value: u64) {
        self.data.put_u64_le(value);
    }

    pub fn add_i64(&mut self, value: i64) {
        self.data.put_i64_le(value);
    }

    pub fn add_f32(&mut self, value: f32) {
        self.data.put_f32_le(value);
    }

    pub fn add_f64(&mut self, value: f64) {
        self.data.put_f64_le(value);
    }

    pub fn add_be_u16(&mut self, value: u16) {
        self.data.put_u16(value);
    }

    pub fn add_be_u32(&mut self, value: u32) {
        self.data.put_u32(value);
    }

    /// Append a string with a 16-bit length prefix
    ///
    /// Fails if the string is longer than 65535 bytes.
    pub fn add_string(&mut self, value: &str) -> Result<()> {
        let len = u16::try_from(value.len()).map_err(|_| NetError::PayloadTooLarge {
            len: value.len(),
            max: u16::MAX as usize,
        })?;
        self.data.put_u16_le(len);
        self.data.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Freeze into an immutable, cheaply clonable buffer
    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }

    /// Iterate over the payload from the start
    pub fn iter(&self) -> DatagramIterator<'_> {
        DatagramIterator::new(self)
    }
}

impl From<Vec<u8>> for Datagram {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            data: BytesMut::from(&bytes[..]),
        }
    }
}

impl From<&[u8]> for Datagram {
    fn from(bytes: &[u8]) -> Self {
        Self::from_slice(bytes)
    }
}

impl From<BytesMut> for Datagram {
    fn from(data: BytesMut) -> Self {
        Self { data }
    }
}

impl AsRef<[u8]> for Datagram {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Sequential reader over a datagram's payload
///
/// Every getter fails with `FrameCorruption` instead of panicking when the
/// payload is too short.
#[derive(Debug, Clone)]
pub struct DatagramIterator<'a> {
    remaining: &'a [u8],
    consumed: usize,
}

impl<'a> DatagramIterator<'a> {
    pub fn new(datagram: &'a Datagram) -> Self {
        Self {
            remaining: datagram.data(),
            consumed: 0,
        }
    }

    /// Bytes not yet read
    pub fn remaining_size(&self) -> usize {
        self.remaining.len()
    }

    /// Bytes already read
    pub fn current_index(&self) -> usize {
        self.consumed
    }

    fn need(&self, count: usize) -> Result<()> {
        if self.remaining.len() < count {
            return Err(NetError::FrameCorruption(format!(
                "datagram truncated at offset {}: need {} bytes, have {}",
                self.consumed,
                count,
                self.remaining.len()
            )));
        }
        Ok(())
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        self.need(1)?;
        self.consumed += 1;
        Ok(self.remaining.get_u8())
    }

    pub fn get_i8(&mut self) -> Result<i8> {
        self.need(1)?;
        self.consumed += 1;
        Ok(self.remaining.get_i8())
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        self.need(2)?;
        self.consumed += 2;
        Ok(self.remaining.get_u16_le())
    }

    pub fn get_i16(&mut self) -> Result<i16> {
        self.need(2)?;
        self.consumed += 2;
        Ok(self.remaining.get_i16_le())
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.need(4)?;
        self.consumed += 4;
        Ok(self.remaining.get_u32_le())
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        self.need(4)?;
        self.consumed += 4;
        Ok(self.remaining.get_i32_le())
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.need(8)?;
        self.consumed += 8;
        Ok(self.remaining.get_u64_le())
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        self.need(8)?;
        self.consumed += 8;
        Ok(self.remaining.get_i64_le())
    }

    pub fn get_f32(&mut self) -> Result<f32> {
        self.need(4)?;
        self.consumed += 4;
        Ok(self.remaining.get_f32_le())
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        self.need(8)?;
        self.consumed += 8;
        Ok(self.remaining.get_f64_le())
    }

    pub fn get_be_u16(&mut self) -> Result<u16> {
        self.need(2)?;
        self.consumed += 2;
        Ok(self.remaining.get_u16())
    }

    pub fn get_be_u32(&mut self) -> Result<u32> {
        self.need(4)?;
        self.consumed += 4;
        Ok(self.remaining.get_u32())
    }

    /// Read a string written by `Datagram::add_string`
    pub fn get_string(&mut self) -> Result<String> {
        let len = self.get_u16()? as usize;
        let bytes = self.extract_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| NetError::FrameCorruption(format!("invalid UTF-8 string: {}", e)))
    }

    /// Take the next `count` bytes verbatim
    pub fn extract_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        self.need(count)?;
        let (head, tail) = self.remaining.split_at(count);
        self.remaining = tail;
        self.consumed += count;
        Ok(head)
    }

    /// Take everything left
    pub fn remaining_bytes(&mut self) -> &'a [u8] {
        let rest = self.remaining;
        self.consumed += rest.len();
        self.remaining = &[];
        rest
    }
}
