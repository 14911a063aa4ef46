//! Streams a body whose bytes become available in pieces, via
//! `send_multipart`/`multipart_payload`/`multipart_close`.

use std::cell::RefCell;

use framewire::{Config, Instance, PeerBit, Transport};

struct Loopback {
    buf: RefCell<Vec<u8>>,
}

impl Transport for Loopback {
    fn write(&self, bytes: &[u8]) {
        self.buf.borrow_mut().extend_from_slice(bytes);
    }
}

fn main() {
    env_logger::init();

    let chunks: [&[u8]; 3] = [b"first chunk, ", b"second chunk, ", b"and the last one."];
    let total_len: u32 = chunks.iter().map(|c| c.len() as u32).sum();

    let mut instance: Instance<Loopback> =
        Instance::new(Loopback { buf: RefCell::new(Vec::new()) }, (), Config::new(PeerBit::Zero)).unwrap();

    instance.send_multipart(0x40, total_len).unwrap();
    for chunk in chunks {
        instance.multipart_payload(chunk).unwrap();
    }
    instance.multipart_close().unwrap();

    let wire = instance.transport().buf.borrow();
    println!("wire bytes ({} total): {:02x?}", wire.len(), &wire[..]);
}
