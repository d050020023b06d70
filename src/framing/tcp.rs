//! TCP length header
//!
//! Encoding and decoding of the length prefix carried by stream frames.

use bytes::{BufMut, Bytes, BytesMut};

use crate::datagram::Datagram;
use crate::error::{NetError, Result};

use super::HeaderWidth;

/// A decoded (or about to be encoded) TCP length header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    width: HeaderWidth,
    length: usize,
}

impl TcpHeader {
    /// Build the header for `datagram`
    ///
    /// Fails if the payload does not fit the header width.
    pub fn new(datagram: &Datagram, width: HeaderWidth) -> Result<Self> {
        Self::for_length(datagram.len(), width)
    }

    /// Build a header describing a payload of `length` bytes
    pub fn for_length(length: usize, width: HeaderWidth) -> Result<Self> {
        if length > width.max_payload() {
            return Err(NetError::PayloadTooLarge {
                len: length,
                max: width.max_payload(),
            });
        }
        Ok(Self { width, length })
    }

    /// Decode a header from exactly `width.bytes()` bytes
    pub fn decode(bytes: &[u8], width: HeaderWidth) -> Result<Self> {
        if bytes.len() != width.bytes() {
            return Err(NetError::FrameCorruption(format!(
                "TCP header: expected {} bytes, got {}",
                width.bytes(),
                bytes.len()
            )));
        }

        let length = match width {
            HeaderWidth::None => 0,
            HeaderWidth::U16 => u16::from_be_bytes([bytes[0], bytes[1]]) as usize,
            HeaderWidth::U32 => {
                u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
            }
        };

        Ok(Self { width, length })
    }

    pub fn width(&self) -> HeaderWidth {
        self.width
    }

    /// Payload length announced by this header
    pub fn datagram_size(&self) -> usize {
        self.length
    }

    /// Write the header bytes into `buf`
    pub fn encode(&self, buf: &mut impl BufMut) {
        match self.width {
            HeaderWidth::None => {}
            HeaderWidth::U16 => buf.put_u16(self.length as u16),
            HeaderWidth::U32 => buf.put_u32(self.length as u32),
        }
    }

    /// Header bytes as a small owned buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width.bytes());
        self.encode(&mut out);
        out
    }

    /// Check the announced length against the payload actually read
    pub fn verify(&self, datagram: &Datagram) -> bool {
        if self.width == HeaderWidth::None || self.length == datagram.len() {
            return true;
        }
        tracing::warn!(
            "TCP frame length mismatch: header announced {} bytes, read {}",
            self.length,
            datagram.len()
        );
        false
    }
}

/// Encode a complete TCP frame (header followed by payload)
pub fn frame_tcp(datagram: &Datagram, width: HeaderWidth) -> Result<Bytes> {
    let header = TcpHeader::new(datagram, width)?;
    let mut frame = BytesMut::with_capacity(width.bytes() + datagram.len());
    header.encode(&mut frame);
    frame.extend_from_slice(datagram.data());
    Ok(frame.freeze())
}
