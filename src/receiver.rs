//! Byte-at-a-time receive state machine (spec.md §4.3).
//!
//! Drives a fixed `Vec<u8>` receive buffer that is sized once at
//! construction and never reallocated — bytes are written in place and
//! handed out as borrowed slices, never copied out into a fresh
//! allocation per frame.

use crate::config::{Config, FieldWidth};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    AwaitSof,
    ReadId,
    ReadLen,
    ReadType,
    ReadHeadCksum,
    ReadData,
    ReadDataCksum,
}

#[derive(Debug, Clone, Copy)]
enum HeaderField {
    Id,
    Len,
    Type,
}

/// Outcome of feeding one byte to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RxEvent {
    /// Byte consumed, no frame boundary reached.
    None,
    /// A frame passed its checksum(s) (or none were configured) and is
    /// ready for dispatch. `len` bytes are available via `raw_buffer()`.
    Delivered { frame_id: u32, msg_type: u32, len: usize },
    /// An oversize frame was fully consumed without buffering its payload.
    Discarded,
    /// A header or body checksum mismatch; the frame was dropped.
    ChecksumError,
}

pub(crate) struct Receiver {
    state: RxState,
    rxi: usize,
    current_field: u32,
    id_field: u32,
    len_field: u32,
    type_field: u32,
    payload_len: usize,
    head_acc: u32,
    head_ref: u32,
    body_acc: u32,
    body_ref: u32,
    discard: bool,
    buf: Vec<u8>,
    idle_ticks: u32,
}

impl Receiver {
    pub(crate) fn new(rx_capacity: usize) -> Self {
        Receiver {
            state: RxState::AwaitSof,
            rxi: 0,
            current_field: 0,
            id_field: 0,
            len_field: 0,
            type_field: 0,
            payload_len: 0,
            head_acc: 0,
            head_ref: 0,
            body_acc: 0,
            body_ref: 0,
            discard: false,
            buf: vec![0u8; rx_capacity],
            idle_ticks: 0,
        }
    }

    /// Returns the parser to `await_sof` without touching anything else
    /// owned by the instance (spec.md §4.6).
    pub(crate) fn reset(&mut self) {
        self.state = RxState::AwaitSof;
        self.rxi = 0;
        self.current_field = 0;
        self.discard = false;
        self.idle_ticks = 0;
    }

    pub(crate) fn tick(&mut self) {
        self.idle_ticks = self.idle_ticks.saturating_add(1);
    }

    /// The full fixed buffer; callers slice `[..len]` using the `len`
    /// returned alongside `RxEvent::Delivered`.
    pub(crate) fn raw_buffer(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn accept_byte(&mut self, cfg: &Config, byte: u8) -> RxEvent {
        if self.idle_ticks >= cfg.parser_inactivity_ticks && self.state != RxState::AwaitSof {
            log::debug!(target: "framewire::receiver", "inactivity timeout, resetting parser from {:?}", self.state);
            self.reset();
        }
        self.idle_ticks = 0;

        match self.state {
            RxState::AwaitSof => self.on_await_sof(cfg, byte),
            RxState::ReadId => self.on_header_field(cfg, byte, cfg.id_width, HeaderField::Id),
            RxState::ReadLen => self.on_header_field(cfg, byte, cfg.len_width, HeaderField::Len),
            RxState::ReadType => self.on_header_field(cfg, byte, cfg.type_width, HeaderField::Type),
            RxState::ReadHeadCksum => self.on_head_cksum_byte(cfg, byte),
            RxState::ReadData => self.on_data_byte(cfg, byte),
            RxState::ReadDataCksum => self.on_data_cksum_byte(cfg, byte),
        }
    }

    fn begin_header(&mut self, cfg: &Config) {
        self.head_acc = cfg.checksum.start();
        self.current_field = 0;
        self.rxi = 0;
        self.discard = false;
    }

    fn on_await_sof(&mut self, cfg: &Config, byte: u8) -> RxEvent {
        match cfg.sof {
            Some(sof) if byte == sof => {
                log::trace!(target: "framewire::receiver", "sof matched, starting header");
                self.begin_header(cfg);
                self.head_acc = cfg.checksum.add(self.head_acc, byte);
                self.state = RxState::ReadId;
                RxEvent::None
            }
            Some(_) => RxEvent::None,
            None => {
                // No SOF configured: the parser can never resync (spec.md
                // §4.3, "Resync"), so the very first byte of the stream is
                // both the implicit start and the first ID byte.
                self.begin_header(cfg);
                self.state = RxState::ReadId;
                self.on_header_field(cfg, byte, cfg.id_width, HeaderField::Id)
            }
        }
    }

    fn on_header_field(&mut self, cfg: &Config, byte: u8, width: FieldWidth, field: HeaderField) -> RxEvent {
        self.head_acc = cfg.checksum.add(self.head_acc, byte);
        self.current_field = (self.current_field << 8) | byte as u32;
        self.rxi += 1;
        if self.rxi < width.bytes() {
            return RxEvent::None;
        }
        let value = self.current_field;
        self.current_field = 0;
        self.rxi = 0;
        match field {
            HeaderField::Id => {
                self.id_field = value;
                self.state = RxState::ReadLen;
                RxEvent::None
            }
            HeaderField::Len => {
                self.len_field = value;
                self.state = RxState::ReadType;
                RxEvent::None
            }
            HeaderField::Type => {
                self.type_field = value;
                if cfg.checksum.is_enabled() {
                    self.head_ref = 0;
                    self.state = RxState::ReadHeadCksum;
                    RxEvent::None
                } else {
                    self.complete_header(cfg)
                }
            }
        }
    }

    fn on_head_cksum_byte(&mut self, cfg: &Config, byte: u8) -> RxEvent {
        self.head_ref = (self.head_ref << 8) | byte as u32;
        self.rxi += 1;
        if self.rxi < cfg.checksum.width() {
            return RxEvent::None;
        }
        let finalized = cfg.checksum.finalize(self.head_acc);
        self.rxi = 0;
        if finalized != self.head_ref {
            log::warn!(target: "framewire::receiver", "header checksum mismatch: expected 0x{finalized:x}, got 0x{:x}", self.head_ref);
            self.reset();
            return RxEvent::ChecksumError;
        }
        self.complete_header(cfg)
    }

    fn complete_header(&mut self, cfg: &Config) -> RxEvent {
        self.payload_len = self.len_field as usize;
        self.rxi = 0;
        if self.payload_len == 0 {
            let event = RxEvent::Delivered { frame_id: self.id_field, msg_type: self.type_field, len: 0 };
            self.reset();
            event
        } else {
            self.discard = self.payload_len > self.buf.len();
            if self.discard {
                log::warn!(
                    target: "framewire::receiver",
                    "payload_len={} exceeds rx capacity={}, frame will be discarded",
                    self.payload_len,
                    self.buf.len()
                );
            }
            self.body_acc = cfg.checksum.start();
            self.state = RxState::ReadData;
            RxEvent::None
        }
    }

    fn on_data_byte(&mut self, cfg: &Config, byte: u8) -> RxEvent {
        if self.discard {
            self.rxi += 1;
        } else {
            self.body_acc = cfg.checksum.add(self.body_acc, byte);
            self.buf[self.rxi] = byte;
            self.rxi += 1;
        }
        if self.rxi < self.payload_len {
            return RxEvent::None;
        }
        self.rxi = 0;
        if cfg.checksum.is_enabled() {
            self.body_ref = 0;
            self.state = RxState::ReadDataCksum;
            RxEvent::None
        } else if self.discard {
            log::debug!(target: "framewire::receiver", "discarded oversize frame id=0x{:x}", self.id_field);
            let event = RxEvent::Discarded;
            self.reset();
            event
        } else {
            log::trace!(target: "framewire::receiver", "delivered id=0x{:x} len={}", self.id_field, self.payload_len);
            let event = RxEvent::Delivered {
                frame_id: self.id_field,
                msg_type: self.type_field,
                len: self.payload_len,
            };
            self.reset();
            event
        }
    }

    fn on_data_cksum_byte(&mut self, cfg: &Config, byte: u8) -> RxEvent {
        self.body_ref = (self.body_ref << 8) | byte as u32;
        self.rxi += 1;
        if self.rxi < cfg.checksum.width() {
            return RxEvent::None;
        }
        let finalized = cfg.checksum.finalize(self.body_acc);
        if self.discard {
            log::debug!(target: "framewire::receiver", "discarded oversize frame id=0x{:x}", self.id_field);
            self.reset();
            return RxEvent::Discarded;
        }
        if finalized != self.body_ref {
            log::warn!(target: "framewire::receiver", "data checksum mismatch: expected 0x{finalized:x}, got 0x{:x}", self.body_ref);
            self.reset();
            return RxEvent::ChecksumError;
        }
        log::trace!(target: "framewire::receiver", "delivered id=0x{:x} len={}", self.id_field, self.payload_len);
        let event = RxEvent::Delivered {
            frame_id: self.id_field,
            msg_type: self.type_field,
            len: self.payload_len,
        };
        self.reset();
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumAlgorithm;
    use crate::config::PeerBit;
    use crate::codec::compose_header;

    fn cfg_crc16() -> Config {
        Config::new(PeerBit::Zero).with_checksum(ChecksumAlgorithm::Crc16).with_rx_capacity(16)
    }

    fn feed_all(rx: &mut Receiver, cfg: &Config, bytes: &[u8]) -> Vec<RxEvent> {
        bytes.iter().map(|&b| rx.accept_byte(cfg, b)).collect()
    }

    #[test]
    fn empty_body_frame_delivers_immediately_after_header_checksum() {
        let cfg = cfg_crc16();
        let mut buf = Vec::new();
        compose_header(&cfg, &mut buf, 0x00, 0, 0x22);
        let mut rx = Receiver::new(cfg.rx_capacity);
        let events = feed_all(&mut rx, &cfg, &buf);
        assert_eq!(
            events.last().copied().unwrap(),
            RxEvent::Delivered { frame_id: 0x00, msg_type: 0x22, len: 0 }
        );
    }

    #[test]
    fn oversize_frame_is_discarded_without_delivery() {
        let cfg = cfg_crc16();
        let payload = [0xAAu8; 32]; // capacity is 16
        let mut buf = Vec::new();
        compose_header(&cfg, &mut buf, 0x01, payload.len() as u32, 0x01);
        let mut acc = cfg.checksum.start();
        let mut body = Vec::new();
        crate::codec::compose_body_chunk(&cfg.checksum, &mut acc, &mut body, &payload);
        crate::codec::compose_trailer(&cfg.checksum, acc, &mut body);
        buf.extend_from_slice(&body);

        let mut rx = Receiver::new(cfg.rx_capacity);
        let events = feed_all(&mut rx, &cfg, &buf);
        assert!(events.iter().any(|e| *e == RxEvent::Discarded));
        assert!(!events.iter().any(|e| matches!(e, RxEvent::Delivered { .. })));
    }

    #[test]
    fn flipped_payload_bit_is_rejected_not_delivered() {
        let cfg = cfg_crc16();
        let payload = b"hello".to_vec();
        let mut buf = Vec::new();
        compose_header(&cfg, &mut buf, 0x03, payload.len() as u32, 0x05);
        let mut acc = cfg.checksum.start();
        let mut body = Vec::new();
        crate::codec::compose_body_chunk(&cfg.checksum, &mut acc, &mut body, &payload);
        crate::codec::compose_trailer(&cfg.checksum, acc, &mut body);
        buf.extend_from_slice(&body);

        // flip one bit inside the payload region, after the header
        let payload_start = buf.len() - body.len();
        buf[payload_start] ^= 0x01;

        let mut rx = Receiver::new(cfg.rx_capacity);
        let events = feed_all(&mut rx, &cfg, &buf);
        assert!(events.iter().any(|e| *e == RxEvent::ChecksumError));
        assert!(!events.iter().any(|e| matches!(e, RxEvent::Delivered { .. })));
    }

    #[test]
    fn inactivity_timeout_resets_before_the_next_byte_is_processed() {
        let mut cfg = cfg_crc16();
        cfg.parser_inactivity_ticks = 3;
        let mut rx = Receiver::new(cfg.rx_capacity);
        // Get into a non-idle state.
        rx.accept_byte(&cfg, cfg.sof.unwrap());
        for _ in 0..3 {
            rx.tick();
        }
        // This byte would have continued the ID field, but inactivity
        // must reset the parser back to await_sof first; since it's not
        // the SOF byte, it is simply dropped and the state stays idle.
        let event = rx.accept_byte(&cfg, 0x42);
        assert_eq!(event, RxEvent::None);
        assert_eq!(rx.state, RxState::AwaitSof);
    }

    #[test]
    fn sof_disabled_uses_the_first_byte_as_implicit_start() {
        let cfg = Config::new(PeerBit::Zero).with_sof(None).with_checksum(ChecksumAlgorithm::None).with_rx_capacity(16);
        let mut buf = Vec::new();
        compose_header(&cfg, &mut buf, 0x07, 0, 0x09);
        let mut rx = Receiver::new(cfg.rx_capacity);
        let events = feed_all(&mut rx, &cfg, &buf);
        assert_eq!(
            events.last().copied().unwrap(),
            RxEvent::Delivered { frame_id: 0x07, msg_type: 0x09, len: 0 }
        );
    }
}
