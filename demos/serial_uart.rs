//! Drives a real serial port on Linux, the way the teacher's own
//! `real_uart_on_linux` example does: open the port, spawn a reader
//! thread that feeds bytes into an instance, and send frames from the
//! main thread.

use std::io::{Read, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use framewire::{Config, Directive, Instance, Message, OutMessage, PeerBit, Transport};
use serial::SerialPort;

struct UartTransport {
    tx: mpsc::Sender<Vec<u8>>,
}

impl Transport for UartTransport {
    fn write(&self, bytes: &[u8]) {
        self.tx.send(bytes.to_vec()).expect("writer thread gone");
    }
}

fn on_message(_instance: &mut Instance<UartTransport>, message: &mut Message) -> Directive {
    println!(
        "received type=0x{:02x}: {:?}",
        message.msg_type,
        String::from_utf8_lossy(message.payload.unwrap_or(&[]))
    );
    Directive::Stay
}

fn main() {
    env_logger::init();

    let port_path = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let mut port = serial::open(&port_path).expect("failed to open serial port");
    port.reconfigure(&|settings| {
        settings.set_baud_rate(serial::Baud115200)?;
        settings.set_char_size(serial::Bits8);
        settings.set_parity(serial::ParityNone);
        settings.set_stop_bits(serial::Stop1);
        settings.set_flow_control(serial::FlowNone);
        Ok(())
    })
    .expect("failed to configure serial port");
    port.set_timeout(Duration::from_millis(100)).expect("failed to set read timeout");

    let mut write_port = port.try_clone().expect("failed to clone port handle");
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    thread::spawn(move || {
        for bytes in rx {
            write_port.write_all(&bytes).expect("serial write failed");
        }
    });

    let mut instance: Instance<UartTransport> =
        Instance::new(UartTransport { tx }, (), Config::new(PeerBit::Zero)).unwrap();
    instance.add_generic_listener(on_message).unwrap();
    instance.send(OutMessage::new(0x01, b"hello over serial")).unwrap();

    let mut read_buf = [0u8; 256];
    loop {
        match port.read(&mut read_buf) {
            Ok(0) => break,
            Ok(n) => instance.accept_buffer(&read_buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => instance.tick(),
            Err(e) => {
                eprintln!("serial read error: {e}");
                break;
            }
        }
    }
}
