//! UDP checksum header

use bytes::{BufMut, Bytes, BytesMut};

use crate::datagram::Datagram;
use crate::error::{NetError, Result};

/// Size of the UDP checksum header in bytes
pub const UDP_HEADER_SIZE: usize = 2;

/// Additive checksum: sum of the payload bytes modulo 2^16
pub fn checksum(payload: &[u8]) -> u16 {
    payload
        .iter()
        .fold(0u16, |sum, &byte| sum.wrapping_add(byte as u16))
}

/// The checksum header carried ahead of every framed UDP payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    checksum: u16,
}

impl UdpHeader {
    /// Compute the header for `datagram`
    pub fn new(datagram: &Datagram) -> Self {
        Self {
            checksum: checksum(datagram.data()),
        }
    }

    /// Decode a header from exactly `UDP_HEADER_SIZE` bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != UDP_HEADER_SIZE {
            return Err(NetError::FrameCorruption(format!(
                "UDP header: expected {} bytes, got {}",
                UDP_HEADER_SIZE,
                bytes.len()
            )));
        }
        Ok(Self {
            checksum: u16::from_be_bytes([bytes[0], bytes[1]]),
        })
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.checksum);
    }

    /// Recompute the checksum over `datagram` and compare
    pub fn verify(&self, datagram: &Datagram) -> bool {
        let actual = checksum(datagram.data());
        if actual == self.checksum {
            return true;
        }
        tracing::warn!(
            "UDP checksum mismatch: header {:#06x}, payload {:#06x} ({} bytes)",
            self.checksum,
            actual,
            datagram.len()
        );
        false
    }
}

/// Encode a complete UDP packet (checksum followed by payload)
pub fn frame_udp(datagram: &Datagram) -> Bytes {
    let mut packet = BytesMut::with_capacity(UDP_HEADER_SIZE + datagram.len());
    UdpHeader::new(datagram).encode(&mut packet);
    packet.extend_from_slice(datagram.data());
    packet.freeze()
}

/// Split a received packet into a verified payload
pub fn unframe_udp(packet: &[u8]) -> Result<Datagram> {
    if packet.len() < UDP_HEADER_SIZE {
        return Err(NetError::FrameCorruption(format!(
            "UDP packet of {} bytes is shorter than its header",
            packet.len()
        )));
    }

    let header = UdpHeader::decode(&packet[..UDP_HEADER_SIZE])?;
    let datagram = Datagram::from_slice(&packet[UDP_HEADER_SIZE..]);
    if !header.verify(&datagram) {
        return Err(NetError::FrameCorruption(
            "UDP checksum mismatch".to_string(),
        ));
    }
    Ok(datagram)
}
