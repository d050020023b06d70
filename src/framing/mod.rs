//! Framing Module
//!
//! Defines how datagrams are delimited on the wire.
//!
//! ## TCP Frame Format
//! ```text
//! ┌────────────────────┬─────────────────────────────┐
//! │ Len (0, 2 or 4)    │         Payload             │
//! └────────────────────┴─────────────────────────────┘
//! ```
//! The length is the payload size in network byte order. A width of zero
//! disables the header entirely: every read becomes one datagram.
//!
//! ## UDP Packet Format
//! ```text
//! ┌──────────────┬─────────────────────────────┐
//! │ Checksum (2) │         Payload             │
//! └──────────────┴─────────────────────────────┘
//! ```
//! The checksum is the sum of the payload bytes modulo 2^16, network order.
//!
//! ## Raw Mode
//! Readers and writers in raw mode skip both headers; the application frames
//! its own stream.

mod tcp;
mod udp;

pub use tcp::{frame_tcp, TcpHeader};
pub use udp::{checksum, frame_udp, unframe_udp, UdpHeader, UDP_HEADER_SIZE};

use crate::error::{NetError, Result};

/// Width of the TCP length header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum HeaderWidth {
    /// No header; one read is one datagram
    None = 0,

    /// 16-bit length (payloads up to 65535 bytes)
    #[default]
    U16 = 2,

    /// 32-bit length
    U32 = 4,
}

impl HeaderWidth {
    /// Parse a width given in bytes
    pub fn from_bytes(bytes: usize) -> Result<Self> {
        match bytes {
            0 => Ok(HeaderWidth::None),
            2 => Ok(HeaderWidth::U16),
            4 => Ok(HeaderWidth::U32),
            other => Err(NetError::Config(format!(
                "invalid TCP header size {} (expected 0, 2 or 4)",
                other
            ))),
        }
    }

    /// Header size in bytes
    pub fn bytes(self) -> usize {
        self as usize
    }

    /// Largest payload this header can describe
    pub fn max_payload(self) -> usize {
        match self {
            HeaderWidth::None => usize::MAX,
            HeaderWidth::U16 => u16::MAX as usize,
            HeaderWidth::U32 => u32::MAX as usize,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => HeaderWidth::None,
            4 => HeaderWidth::U32,
            _ => HeaderWidth::U16,
        }
    }
}
