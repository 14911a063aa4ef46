//! Composes a frame and feeds the exact same bytes back into the same
//! instance, printing what was delivered.

use std::cell::RefCell;

use framewire::{Config, Directive, Instance, Message, OutMessage, PeerBit, Transport};

struct Loopback {
    buf: RefCell<Vec<u8>>,
}

impl Transport for Loopback {
    fn write(&self, bytes: &[u8]) {
        self.buf.borrow_mut().extend_from_slice(bytes);
    }
}

fn on_message(_instance: &mut Instance<Loopback>, message: &mut Message) -> Directive {
    println!("delivered: type=0x{:02x} payload={:?}", message.msg_type, message.payload);
    Directive::Stay
}

fn main() {
    env_logger::init();

    let mut instance: Instance<Loopback> =
        Instance::new(Loopback { buf: RefCell::new(Vec::new()) }, (), Config::new(PeerBit::Zero)).unwrap();
    instance.add_generic_listener(on_message).unwrap();

    instance.send(OutMessage::new(0x22, b"hello, wire")).unwrap();
    let wire = std::mem::take(&mut *instance.transport().buf.borrow_mut());
    println!("wire bytes: {:02x?}", wire);

    instance.accept_buffer(&wire);
}
