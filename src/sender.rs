//! Transmit pipeline: begin / chunk / end (spec.md §4.4).
//!
//! The send buffer is a fixed `Vec<u8>`, sized once at construction, that
//! is flushed through the transport whenever it fills — this is what
//! makes chunked transmission of a body larger than the buffer possible
//! without ever growing the allocation.

use crate::checksum::ChecksumAlgorithm;
use crate::config::{Config, FieldWidth};
use crate::error::Error;
use crate::hooks::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    None,
    Internal,
    Host,
}

pub(crate) struct Sender {
    buf: Vec<u8>,
    write_pos: usize,
    active_lock: LockMode,
    internal_guard_held: bool,
}

impl Sender {
    pub(crate) fn new(tx_capacity: usize) -> Self {
        Sender {
            buf: vec![0u8; tx_capacity],
            write_pos: 0,
            active_lock: LockMode::None,
            internal_guard_held: false,
        }
    }

    /// Claims the send lock: the host's real mutex if `Transport::claim`
    /// returns `Some`, otherwise the engine's fallback boolean guard
    /// (spec.md §4.4, "Send lock").
    pub(crate) fn claim<T: Transport>(&mut self, transport: &T) -> Result<(), Error> {
        match transport.claim() {
            Some(true) => {
                self.active_lock = LockMode::Host;
                Ok(())
            }
            Some(false) => {
                log::warn!(target: "framewire::sender", "host lock contended, send rejected");
                Err(Error::LockContention)
            }
            None => {
                if self.internal_guard_held {
                    log::warn!(target: "framewire::sender", "internal send guard contended, send rejected");
                    Err(Error::LockContention)
                } else {
                    self.internal_guard_held = true;
                    self.active_lock = LockMode::Internal;
                    Ok(())
                }
            }
        }
    }

    pub(crate) fn release<T: Transport>(&mut self, transport: &T) {
        match self.active_lock {
            LockMode::Host => transport.release(),
            LockMode::Internal => self.internal_guard_held = false,
            LockMode::None => {}
        }
        self.active_lock = LockMode::None;
    }

    fn push_byte<T: Transport>(&mut self, transport: &T, byte: u8) {
        self.buf[self.write_pos] = byte;
        self.write_pos += 1;
        if self.write_pos == self.buf.len() {
            self.flush(transport);
        }
    }

    fn push_field<T: Transport>(
        &mut self,
        transport: &T,
        value: u32,
        width: FieldWidth,
        checksum: &ChecksumAlgorithm,
        acc: &mut u32,
    ) {
        for shift in (0..width.bytes()).rev() {
            let byte = (value >> (shift * 8)) as u8;
            *acc = checksum.add(*acc, byte);
            self.push_byte(transport, byte);
        }
    }

    fn push_value_be<T: Transport>(&mut self, transport: &T, value: u32, width: usize) {
        for shift in (0..width).rev() {
            self.push_byte(transport, (value >> (shift * 8)) as u8);
        }
    }

    pub(crate) fn flush<T: Transport>(&mut self, transport: &T) {
        if self.write_pos > 0 {
            log::trace!(target: "framewire::sender", "flushing {} bytes", self.write_pos);
            transport.write(&self.buf[..self.write_pos]);
            self.write_pos = 0;
        }
    }

    /// Composes SOF..TYPE (and the header checksum, if enabled) straight
    /// into the send buffer, flushing as needed, and releases the lock
    /// for the caller to manage further. Returns the resolved header
    /// checksum (0 if checksums are disabled).
    pub(crate) fn begin<T: Transport>(
        &mut self,
        cfg: &Config,
        transport: &T,
        id: u32,
        len: u32,
        msg_type: u32,
    ) -> u32 {
        log::trace!(target: "framewire::sender", "begin id=0x{id:x} type=0x{msg_type:x} len={len}");
        self.write_pos = 0;
        let mut acc = cfg.checksum.start();

        if let Some(sof) = cfg.sof {
            acc = cfg.checksum.add(acc, sof);
            self.push_byte(transport, sof);
        }

        self.push_field(transport, id, cfg.id_width, &cfg.checksum, &mut acc);
        self.push_field(transport, len, cfg.len_width, &cfg.checksum, &mut acc);
        self.push_field(transport, msg_type, cfg.type_width, &cfg.checksum, &mut acc);

        if cfg.checksum.is_enabled() {
            let finalized = cfg.checksum.finalize(acc);
            self.push_value_be(transport, finalized, cfg.checksum.width());
            finalized
        } else {
            0
        }
    }

    /// Appends `bytes` to the send buffer, flushing through `transport`
    /// whenever the buffer fills, folding each byte into `acc`.
    pub(crate) fn chunk<T: Transport>(
        &mut self,
        transport: &T,
        checksum: &ChecksumAlgorithm,
        acc: &mut u32,
        bytes: &[u8],
    ) -> usize {
        for &byte in bytes {
            *acc = checksum.add(*acc, byte);
            self.push_byte(transport, byte);
        }
        bytes.len()
    }

    /// Finalizes and appends the trailer checksum (if enabled and the
    /// frame actually carried a body), flushing first if it would not
    /// fit, then flushes whatever remains (spec.md §4.4, "End"). A
    /// DATA_CKSUM field is only present when LEN > 0 (spec.md §3).
    pub(crate) fn end<T: Transport>(&mut self, transport: &T, checksum: &ChecksumAlgorithm, acc: u32, has_body: bool) {
        if checksum.is_enabled() && has_body {
            let width = checksum.width();
            if self.write_pos + width > self.buf.len() {
                self.flush(transport);
            }
            let finalized = checksum.finalize(acc);
            self.push_value_be(transport, finalized, width);
        }
        self.flush(transport);
    }
}
