//! A length-prefixed, checksummed binary framing protocol engine for
//! point-to-point byte transports (serial links, pipes, sockets — anything
//! that exposes a byte stream in one direction and accepts bytes to write
//! in the other).
//!
//! The engine owns no transport of its own: bytes arriving from the wire
//! are fed in one at a time (or as a buffer) through [`Instance::accept_byte`]
//! / [`Instance::accept_buffer`], and bytes leaving are written through a
//! host-implemented [`Transport`]. A steady external tick drives parser
//! inactivity timeouts and per-listener timeouts via [`Instance::tick`].
//!
//! ```no_run
//! use framewire::{Config, Instance, OutMessage, PeerBit, Transport};
//!
//! struct Loopback;
//! impl Transport for Loopback {
//!     fn write(&self, bytes: &[u8]) {
//!         let _ = bytes;
//!     }
//! }
//!
//! let mut instance: Instance<Loopback> =
//!     Instance::new(Loopback, (), Config::new(PeerBit::Zero)).unwrap();
//! instance.send(OutMessage::new(0x01, b"hello")).unwrap();
//! ```

mod checksum;
mod codec;
mod codec_ext;
mod config;
mod error;
mod hooks;
mod instance;
mod listener;
mod message;
mod receiver;
mod sender;

pub use checksum::ChecksumAlgorithm;
pub use codec_ext::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, write_u16_be, write_u16_le, write_u32_be, write_u32_le,
};
pub use config::{Config, FieldWidth, PeerBit};
pub use error::Error;
pub use hooks::Transport;
pub use instance::Instance;
pub use message::{Body, Directive, Message, OutMessage};
