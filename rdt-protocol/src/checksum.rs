//! Packet integrity code
//!
//! A CRC-32 covering every byte of the wire packet after the code itself
//! (sequence number, payload length, payload and padding). A mismatch is not
//! an error: callers treat the packet as if it never arrived.

use crate::packet::HEADER_SIZE;

/// Size of the integrity code at the start of every packet
pub const CHECKSUM_SIZE: usize = 4;

/// Compute the integrity code over `packet[4..]`
///
/// Buffers shorter than the code itself yield the code of an empty region.
pub fn compute(packet: &[u8]) -> u32 {
    let region = packet.get(CHECKSUM_SIZE..).unwrap_or(&[]);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(region);
    hasher.finalize()
}

/// Read the code stored at `packet[0..4]`
pub fn stored(packet: &[u8]) -> Option<u32> {
    let bytes: [u8; CHECKSUM_SIZE] = packet.get(..CHECKSUM_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Recompute the code and compare it against the stored one
///
/// Buffers too short to hold a packet header never verify.
pub fn verify(packet: &[u8]) -> bool {
    if packet.len() < HEADER_SIZE {
        return false;
    }
    match stored(packet) {
        Some(code) => code == compute(packet),
        None => false,
    }
}

/// Compute the code and write it into `packet[0..4]`, returning it
///
/// # Panics
/// Panics if `packet` is shorter than [`CHECKSUM_SIZE`].
pub fn stamp(packet: &mut [u8]) -> u32 {
    let code = compute(packet);
    packet[..CHECKSUM_SIZE].copy_from_slice(&code.to_be_bytes());
    code
}
