//! Payload integer helpers (spec.md §4.7, supplemental).
//!
//! Not part of the core framing engine: a convenience for application code
//! that wants to pack/unpack multi-byte integers into a message payload
//! without hand-rolling shifts at every call site, the way host glue code
//! does around the reference integration.

pub fn write_u16_le(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn write_u32_le(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn write_u16_be(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn write_u32_be(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn read_u16_le(bytes: &[u8]) -> Option<u16> {
    bytes.get(..2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

pub fn read_u32_le(bytes: &[u8]) -> Option<u32> {
    bytes.get(..4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn read_u16_be(bytes: &[u8]) -> Option<u16> {
    bytes.get(..2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

pub fn read_u32_be(bytes: &[u8]) -> Option<u32> {
    bytes.get(..4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_little_endian() {
        let mut buf = Vec::new();
        write_u32_le(&mut buf, 0x1122_3344);
        assert_eq!(read_u32_le(&buf), Some(0x1122_3344));
    }

    #[test]
    fn round_trips_big_endian() {
        let mut buf = Vec::new();
        write_u16_be(&mut buf, 0xBEEF);
        assert_eq!(buf, vec![0xBE, 0xEF]);
        assert_eq!(read_u16_be(&buf), Some(0xBEEF));
    }

    #[test]
    fn read_rejects_short_buffers() {
        assert_eq!(read_u32_be(&[0x01, 0x02]), None);
    }
}
