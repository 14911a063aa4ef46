//! Frame composition primitives (spec.md §4.2).
//!
//! These are pure, buffer-oriented building blocks: they know how to lay
//! out the wire envelope and how to drive a checksum accumulator, but
//! nothing about send buffers, locks, or transports. `sender.rs` follows
//! the same field order and checksum folding against the fixed send
//! buffer directly, since it additionally has to flush mid-field when the
//! buffer fills; these functions are what `receiver.rs`'s tests (and any
//! caller composing a frame into a plain `Vec<u8>`, such as test fixtures)
//! use instead.

use crate::checksum::ChecksumAlgorithm;
use crate::config::{Config, FieldWidth};

/// Appends `value`'s low `width.bytes()` bytes to `buf`, most-significant
/// byte first, and folds each byte into `acc` through `checksum`.
pub(crate) fn write_field(
    buf: &mut Vec<u8>,
    value: u32,
    width: FieldWidth,
    checksum: &ChecksumAlgorithm,
    acc: &mut u32,
) {
    let bytes = width.bytes();
    for shift in (0..bytes).rev() {
        let byte = (value >> (shift * 8)) as u8;
        buf.push(byte);
        *acc = checksum.add(*acc, byte);
    }
}

/// Resolves the outbound frame ID: a response keeps the ID already on the
/// message; anything else consumes the instance's `next_id` counter,
/// masks off the peer bit, then sets it to this instance's peer bit
/// (spec.md §3, "ID allocation").
pub(crate) fn resolve_id(cfg: &Config, next_id: &mut u32, is_response: bool, frame_id: u32) -> u32 {
    if is_response {
        log::trace!(target: "framewire::codec", "resolve_id: response reuses id=0x{frame_id:x}");
        return frame_id;
    }
    let allocated = *next_id;
    *next_id = next_id.wrapping_add(1) & cfg.id_value_mask();
    let id = (allocated & cfg.id_value_mask()) | cfg.peer_bit_mask();
    log::trace!(target: "framewire::codec", "resolve_id: allocated id=0x{id:x}");
    id
}

/// Composes SOF (if enabled) through TYPE into `buf`, returning the
/// header checksum's finalized value if the checksum algorithm is
/// enabled. The header checksum covers SOF through TYPE (spec.md §3).
pub(crate) fn compose_header(
    cfg: &Config,
    buf: &mut Vec<u8>,
    id: u32,
    len: u32,
    msg_type: u32,
) -> Option<u32> {
    let mut acc = cfg.checksum.start();

    if let Some(sof) = cfg.sof {
        buf.push(sof);
        acc = cfg.checksum.add(acc, sof);
    }

    write_field(buf, id, cfg.id_width, &cfg.checksum, &mut acc);
    write_field(buf, len, cfg.len_width, &cfg.checksum, &mut acc);
    write_field(buf, msg_type, cfg.type_width, &cfg.checksum, &mut acc);

    if cfg.checksum.is_enabled() {
        let finalized = cfg.checksum.finalize(acc);
        let width = cfg.checksum.width();
        for shift in (0..width).rev() {
            buf.push((finalized >> (shift * 8)) as u8);
        }
        Some(finalized)
    } else {
        None
    }
}

/// Copies `bytes` verbatim into `buf`, folding each byte into the body
/// checksum accumulator (spec.md §4.2, "Compose body chunk").
pub(crate) fn compose_body_chunk(
    checksum: &ChecksumAlgorithm,
    acc: &mut u32,
    buf: &mut Vec<u8>,
    bytes: &[u8],
) -> usize {
    for &byte in bytes {
        buf.push(byte);
        *acc = checksum.add(*acc, byte);
    }
    bytes.len()
}

/// Finalizes the body checksum accumulator and appends it to `buf`, if
/// the algorithm is enabled.
pub(crate) fn compose_trailer(checksum: &ChecksumAlgorithm, acc: u32, buf: &mut Vec<u8>) {
    if !checksum.is_enabled() {
        return;
    }
    let finalized = checksum.finalize(acc);
    let width = checksum.width();
    for shift in (0..width).rev() {
        buf.push((finalized >> (shift * 8)) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerBit;

    #[test]
    fn header_checksum_covers_sof_through_type() {
        let cfg = Config::new(PeerBit::Zero).with_checksum(ChecksumAlgorithm::Crc16);
        let mut buf = Vec::new();
        let checksum = compose_header(&cfg, &mut buf, 0x00, 0x00, 0x22).unwrap();
        // SOF(1) + ID(1) + LEN(2) + TYPE(1) + HEAD_CKSUM(2)
        assert_eq!(buf.len(), 1 + 1 + 2 + 1 + 2);
        assert_eq!(buf, vec![0x01, 0x00, 0x00, 0x00, 0x22, (checksum >> 8) as u8, checksum as u8]);
    }

    #[test]
    fn no_checksum_means_no_trailer_bytes() {
        let checksum = ChecksumAlgorithm::None;
        let mut buf = Vec::new();
        let mut acc = checksum.start();
        compose_body_chunk(&checksum, &mut acc, &mut buf, b"hi");
        compose_trailer(&checksum, acc, &mut buf);
        assert_eq!(buf, b"hi");
    }

    #[test]
    fn id_allocation_sets_the_peer_bit_and_wraps() {
        let cfg = Config::new(PeerBit::One); // 1-byte ID, top bit is peer bit
        let mut next_id: u32 = 0x7F;
        let first = resolve_id(&cfg, &mut next_id, false, 0);
        assert_eq!(first, 0x7F | 0x80);
        let second = resolve_id(&cfg, &mut next_id, false, 0);
        assert_eq!(second, 0x00 | 0x80); // wrapped within the 7 value bits
    }

    #[test]
    fn response_frame_reuses_the_request_id_unchanged() {
        let cfg = Config::new(PeerBit::Zero);
        let mut next_id: u32 = 5;
        let id = resolve_id(&cfg, &mut next_id, true, 0x2A);
        assert_eq!(id, 0x2A);
        assert_eq!(next_id, 5); // untouched
    }
}
