//! Tests for TCP and UDP framing
//!
//! These tests verify:
//! - TCP length header encode/decode for every width
//! - Oversized payloads are rejected
//! - UDP checksum properties and corruption detection
//! - Frame/unframe helpers

use framenet::framing::{
    checksum, frame_tcp, frame_udp, unframe_udp, HeaderWidth, TcpHeader, UdpHeader,
    UDP_HEADER_SIZE,
};
use framenet::{Datagram, NetError};
use proptest::prelude::*;

// =============================================================================
// TCP Header Tests
// =============================================================================

#[test]
fn test_u16_header_network_order() {
    let header = TcpHeader::for_length(0x0102, HeaderWidth::U16).unwrap();
    assert_eq!(header.to_bytes(), vec![0x01, 0x02]);
}

#[test]
fn test_u32_header_network_order() {
    let header = TcpHeader::for_length(0x0102_0304, HeaderWidth::U32).unwrap();
    assert_eq!(header.to_bytes(), vec![0x01, 0x02, 0x03, 0x04]);
}

#[test]
fn test_no_header_is_empty() {
    let header = TcpHeader::for_length(1234, HeaderWidth::None).unwrap();
    assert!(header.to_bytes().is_empty());
}

#[test]
fn test_u16_header_rejects_oversize() {
    let result = TcpHeader::for_length(65536, HeaderWidth::U16);
    assert!(matches!(
        result,
        Err(NetError::PayloadTooLarge { len: 65536, max: 65535 })
    ));
}

#[test]
fn test_u32_header_accepts_beyond_u16() {
    let header = TcpHeader::for_length(65536, HeaderWidth::U32).unwrap();
    let decoded = TcpHeader::decode(&header.to_bytes(), HeaderWidth::U32).unwrap();
    assert_eq!(decoded.datagram_size(), 65536);
}

#[test]
fn test_decode_wrong_size_fails() {
    let result = TcpHeader::decode(&[0x00], HeaderWidth::U16);
    assert!(matches!(result, Err(NetError::FrameCorruption(_))));
}

#[test]
fn test_verify_length_mismatch() {
    let header = TcpHeader::for_length(5, HeaderWidth::U16).unwrap();
    assert!(header.verify(&Datagram::from_slice(b"hello")));
    assert!(!header.verify(&Datagram::from_slice(b"hell")));
}

#[test]
fn test_frame_tcp_layout() {
    let frame = frame_tcp(&Datagram::from_slice(b"abc"), HeaderWidth::U16).unwrap();
    assert_eq!(&frame[..], &[0x00, 0x03, b'a', b'b', b'c']);
}

#[test]
fn test_frame_tcp_empty_payload() {
    let frame = frame_tcp(&Datagram::new(), HeaderWidth::U32).unwrap();
    assert_eq!(&frame[..], &[0, 0, 0, 0]);
}

#[test]
fn test_header_width_from_bytes() {
    assert_eq!(HeaderWidth::from_bytes(0).unwrap(), HeaderWidth::None);
    assert_eq!(HeaderWidth::from_bytes(2).unwrap(), HeaderWidth::U16);
    assert_eq!(HeaderWidth::from_bytes(4).unwrap(), HeaderWidth::U32);
    assert!(matches!(HeaderWidth::from_bytes(3), Err(NetError::Config(_))));
}

// =============================================================================
// UDP Checksum Tests
// =============================================================================

#[test]
fn test_checksum_empty() {
    assert_eq!(checksum(&[]), 0);
}

#[test]
fn test_checksum_wraps() {
    let payload = vec![0xFFu8; 300];
    let expected = (0xFFu32 * 300 % 65536) as u16;
    assert_eq!(checksum(&payload), expected);
}

#[test]
fn test_frame_udp_layout() {
    let packet = frame_udp(&Datagram::from_slice(&[1, 2, 3]));
    assert_eq!(&packet[..], &[0x00, 0x06, 1, 2, 3]);
}

#[test]
fn test_unframe_udp_roundtrip() {
    let datagram = Datagram::from_slice(b"payload");
    let packet = frame_udp(&datagram);
    assert_eq!(unframe_udp(&packet).unwrap(), datagram);
}

#[test]
fn test_unframe_udp_header_only() {
    let packet = frame_udp(&Datagram::new());
    assert_eq!(packet.len(), UDP_HEADER_SIZE);
    assert!(unframe_udp(&packet).unwrap().is_empty());
}

#[test]
fn test_unframe_udp_short_packet() {
    assert!(matches!(unframe_udp(&[0x01]), Err(NetError::FrameCorruption(_))));
}

#[test]
fn test_unframe_udp_bad_checksum() {
    let mut packet = frame_udp(&Datagram::from_slice(b"abc")).to_vec();
    packet[3] ^= 0x01;
    assert!(matches!(unframe_udp(&packet), Err(NetError::FrameCorruption(_))));
}

#[test]
fn test_udp_header_decode() {
    let header = UdpHeader::decode(&[0x12, 0x34]).unwrap();
    assert_eq!(header.checksum(), 0x1234);
    assert!(UdpHeader::decode(&[0x12]).is_err());
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_u16_header_roundtrip(len in 0usize..=65535) {
        let header = TcpHeader::for_length(len, HeaderWidth::U16).unwrap();
        let decoded = TcpHeader::decode(&header.to_bytes(), HeaderWidth::U16).unwrap();
        prop_assert_eq!(decoded.datagram_size(), len);
    }

    #[test]
    fn prop_u32_header_roundtrip(len in 0u32..=u32::MAX) {
        let header = TcpHeader::for_length(len as usize, HeaderWidth::U32).unwrap();
        let decoded = TcpHeader::decode(&header.to_bytes(), HeaderWidth::U32).unwrap();
        prop_assert_eq!(decoded.datagram_size(), len as usize);
    }

    #[test]
    fn prop_checksum_order_independent(mut bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let before = checksum(&bytes);
        bytes.reverse();
        prop_assert_eq!(checksum(&bytes), before);
        bytes.sort_unstable();
        prop_assert_eq!(checksum(&bytes), before);
    }

    #[test]
    fn prop_checksum_detects_single_bit_flip(
        bytes in proptest::collection::vec(any::<u8>(), 1..512),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let datagram = Datagram::from_slice(&bytes);
        let header = UdpHeader::new(&datagram);
        prop_assert!(header.verify(&datagram));

        // A single bit flip changes the byte sum by ±2^bit, never by a
        // multiple of 65536.
        let mut corrupted = bytes.clone();
        corrupted[index.index(bytes.len())] ^= 1 << bit;
        prop_assert!(!header.verify(&Datagram::from_slice(&corrupted)));
    }
}
