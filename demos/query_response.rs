//! Two instances exchange a request and a response over an in-process
//! channel, demonstrating `query`/`respond` and ID listener correlation.

use std::sync::mpsc;

use framewire::{Config, Directive, Instance, Message, OutMessage, PeerBit, Transport};

struct ChannelTransport {
    tx: mpsc::Sender<Vec<u8>>,
}

impl Transport for ChannelTransport {
    fn write(&self, bytes: &[u8]) {
        self.tx.send(bytes.to_vec()).expect("peer channel closed");
    }

    fn report(&self, message: &str) {
        eprintln!("transport diagnostic: {message}");
    }
}

fn on_reply(_instance: &mut Instance<ChannelTransport>, message: &mut Message) -> Directive {
    println!("got reply: {:?}", String::from_utf8_lossy(message.payload.unwrap_or(&[])));
    Directive::Close
}

fn on_timeout(_instance: &mut Instance<ChannelTransport>) {
    println!("request timed out");
}

fn answer_requests(instance: &mut Instance<ChannelTransport>, message: &mut Message) -> Directive {
    if message.msg_type == 0x77 {
        instance.respond(OutMessage::response_to(message.frame_id, 0x77, b"ok")).unwrap();
    }
    Directive::Stay
}

fn main() {
    env_logger::init();

    let (to_b, from_a) = mpsc::channel::<Vec<u8>>();
    let (to_a, from_b) = mpsc::channel::<Vec<u8>>();

    let mut peer_a: Instance<ChannelTransport> =
        Instance::new(ChannelTransport { tx: to_b }, (), Config::new(PeerBit::Zero)).unwrap();
    let mut b_config = Config::new(PeerBit::One);
    b_config.id_width = peer_a.config().id_width;
    let mut peer_b: Instance<ChannelTransport> =
        Instance::new(ChannelTransport { tx: to_a }, (), b_config).unwrap();
    peer_b.add_generic_listener(answer_requests).unwrap();

    peer_a.query(OutMessage::new(0x77, &[]), on_reply, Some(on_timeout), 5).unwrap();

    let request = from_a.recv().unwrap();
    peer_b.accept_buffer(&request);

    let response = from_b.recv().unwrap();
    peer_a.accept_buffer(&response);
}
