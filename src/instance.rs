//! Instance lifecycle, tick, and the external send/receive surface
//! (spec.md §4.6, §6).

use crate::codec::resolve_id;
use crate::config::Config;
use crate::error::Error;
use crate::hooks::Transport;
use crate::listener::{GenericListener, IdListener, ListenerTable, TypeListener};
use crate::message::{Body, Directive, Message, OutMessage};
use crate::receiver::{Receiver, RxEvent};
use crate::sender::Sender;

struct TxState {
    acc: u32,
    has_body: bool,
}

/// One endpoint of a framed link: owns the receive state machine, the
/// transmit pipeline, and the three listener tables. `T` is the
/// host-provided transport; `A` is arbitrary application state the host
/// wants reachable from inside `fn`-pointer callbacks as `instance.app`
/// (defaults to `()` for hosts that keep their state elsewhere, e.g.
/// inside `T` itself or behind the listener user-data words).
pub struct Instance<T: Transport, A = ()> {
    pub app: A,
    transport: T,
    config: Config,
    next_id: u32,
    receiver: Receiver,
    sender: Sender,
    id_listeners: ListenerTable<IdListener<T, A>>,
    type_listeners: ListenerTable<TypeListener<T, A>>,
    generic_listeners: ListenerTable<GenericListener<T, A>>,
    tx_state: Option<TxState>,
}

impl<T: Transport, A> Instance<T, A> {
    pub fn new(transport: T, app: A, config: Config) -> Result<Self, Error> {
        config.validate()?;
        Ok(Instance {
            id_listeners: ListenerTable::new(config.id_listener_capacity),
            type_listeners: ListenerTable::new(config.type_listener_capacity),
            generic_listeners: ListenerTable::new(config.generic_listener_capacity),
            receiver: Receiver::new(config.rx_capacity),
            sender: Sender::new(config.tx_capacity),
            next_id: 0,
            tx_state: None,
            transport,
            app,
            config,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the parser to `await_sof`. Listener tables are untouched
    /// (spec.md §4.6).
    pub fn reset_parser(&mut self) {
        self.receiver.reset();
    }

    pub fn accept_byte(&mut self, byte: u8) {
        log::trace!(target: "framewire::instance", "accept_byte 0x{byte:02x}");
        match self.receiver.accept_byte(&self.config, byte) {
            RxEvent::None => {}
            RxEvent::Delivered { frame_id, msg_type, len } => self.dispatch(frame_id, msg_type, len),
            RxEvent::Discarded => {
                log::warn!(target: "framewire::instance", "discarded oversize frame");
                self.transport.report("discarded oversize frame");
            }
            RxEvent::ChecksumError => {
                log::warn!(target: "framewire::instance", "checksum mismatch, frame dropped");
                self.transport.report("checksum mismatch");
            }
        }
    }

    pub fn accept_buffer(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.accept_byte(byte);
        }
    }

    /// Drives parser-inactivity and per-listener timeouts. The host must
    /// call this at a steady rate; that rate defines the tick unit for
    /// every timeout in the instance (spec.md §5).
    pub fn tick(&mut self) {
        self.receiver.tick();

        let mut i = 0;
        while i < self.id_listeners.high_water() {
            let expired = match self.id_listeners.get_mut(i) {
                Some(listener) if listener.ticks_original > 0 => {
                    listener.ticks_remaining = listener.ticks_remaining.saturating_sub(1);
                    listener.ticks_remaining == 0
                }
                _ => false,
            };
            if expired {
                self.fire_timeout(i);
            }
            i += 1;
        }
    }

    fn fire_timeout(&mut self, index: usize) {
        let id = self.id_listeners.get(index).map(|l| l.id).unwrap_or(0);
        log::debug!(target: "framewire::instance", "id listener id=0x{id:x} timed out");
        let on_timeout = self.id_listeners.get(index).and_then(|l| l.on_timeout);
        if let Some(cb) = on_timeout {
            cb(self);
        }
        self.remove_id_listener_at(index);
    }

    fn dispatch(&mut self, frame_id: u32, msg_type: u32, len: usize) {
        // The payload has to be copied out of the receive buffer before
        // dispatch: listener callbacks take `&mut Instance`, and the
        // receive buffer that borrow would alias lives inside `Instance`.
        let payload: Vec<u8> = self.receiver.raw_buffer()[..len].to_vec();
        let mut message = Message { frame_id, msg_type, payload: Some(&payload), user_data_1: 0, user_data_2: 0 };
        log::trace!(target: "framewire::instance", "dispatch id=0x{frame_id:x} type=0x{msg_type:x} len={len}");

        if self.dispatch_id_listeners(&mut message) {
            log::debug!(target: "framewire::instance", "id=0x{frame_id:x} handled by id listener");
            return;
        }
        message.user_data_1 = 0;
        message.user_data_2 = 0;
        if self.dispatch_type_listeners(&mut message) {
            log::debug!(target: "framewire::instance", "id=0x{frame_id:x} handled by type listener");
            return;
        }
        if self.dispatch_generic_listeners(&mut message) {
            log::debug!(target: "framewire::instance", "id=0x{frame_id:x} handled by generic listener");
            return;
        }
        log::debug!(target: "framewire::instance", "unhandled message: id=0x{frame_id:x} type=0x{msg_type:x}");
        self.transport.report("unhandled message");
    }

    fn dispatch_id_listeners(&mut self, message: &mut Message) -> bool {
        let mut from = 0;
        loop {
            let matched = match self.id_listeners.find_from(from, |l| l.id == message.frame_id) {
                Some(i) => i,
                None => return false,
            };
            let (on_message, user_data_1, user_data_2) = {
                let listener = self.id_listeners.get(matched).unwrap();
                (listener.on_message, listener.user_data_1, listener.user_data_2)
            };
            message.user_data_1 = user_data_1;
            message.user_data_2 = user_data_2;

            match on_message(self, message) {
                Directive::Next => {
                    from = matched + 1;
                    continue;
                }
                Directive::Stay => {
                    if let Some(listener) = self.id_listeners.get_mut(matched) {
                        listener.user_data_1 = message.user_data_1;
                        listener.user_data_2 = message.user_data_2;
                    }
                    return true;
                }
                Directive::Renew => {
                    if let Some(listener) = self.id_listeners.get_mut(matched) {
                        listener.user_data_1 = message.user_data_1;
                        listener.user_data_2 = message.user_data_2;
                        listener.ticks_remaining = listener.ticks_original;
                    }
                    return true;
                }
                Directive::Close => {
                    self.remove_id_listener_at(matched);
                    return true;
                }
            }
        }
    }

    fn dispatch_type_listeners(&mut self, message: &mut Message) -> bool {
        let mut from = 0;
        loop {
            let matched = match self.type_listeners.find_from(from, |l| l.msg_type == message.msg_type) {
                Some(i) => i,
                None => return false,
            };
            let on_message = self.type_listeners.get(matched).unwrap().on_message;
            match on_message(self, message) {
                Directive::Next => from = matched + 1,
                Directive::Close => {
                    self.type_listeners.remove_at(matched);
                    return true;
                }
                Directive::Stay | Directive::Renew => return true,
            }
        }
    }

    fn dispatch_generic_listeners(&mut self, message: &mut Message) -> bool {
        let mut from = 0;
        loop {
            if from >= self.generic_listeners.high_water() {
                return false;
            }
            let on_message = match self.generic_listeners.get(from) {
                Some(listener) => listener.on_message,
                None => {
                    from += 1;
                    continue;
                }
            };
            match on_message(self, message) {
                Directive::Next => from += 1,
                Directive::Close => {
                    self.generic_listeners.remove_at(from);
                    return true;
                }
                Directive::Stay | Directive::Renew => return true,
            }
        }
    }

    /// Removes an ID listener slot, running the synchronous cleanup
    /// delivery first if the listener still holds non-zero user-data
    /// (spec.md §4.5, "cleanup delivery").
    fn remove_id_listener_at(&mut self, index: usize) {
        let cleanup = self.id_listeners.get(index).and_then(|l| {
            if l.user_data_1 != 0 || l.user_data_2 != 0 {
                Some((l.on_message, l.id, l.user_data_1, l.user_data_2))
            } else {
                None
            }
        });
        self.id_listeners.remove_at(index);
        if let Some((on_message, frame_id, user_data_1, user_data_2)) = cleanup {
            log::trace!(target: "framewire::instance", "cleanup delivery for id=0x{frame_id:x}");
            let mut msg = Message { frame_id, msg_type: 0, payload: None, user_data_1, user_data_2 };
            on_message(self, &mut msg);
        }
    }

    /// Composes and sends the header only: SOF..TYPE..HEAD_CKSUM, claiming
    /// the send lock and opening `tx_state`. Matches the original's
    /// `TF_SendFrame_Begin` (spec.md §4.4, "Begin") — callers that need to
    /// register a listener do so here, strictly before any body byte is
    /// sent, so a failed registration can still `abort_transmit` without a
    /// truncated frame already on the wire.
    fn begin_transmit(&mut self, msg: &OutMessage) -> Result<u32, Error> {
        let len = msg.body.len();
        if len > self.config.len_width.max_value() {
            return Err(Error::PayloadTooLarge);
        }
        self.sender.claim(&self.transport)?;

        let id = resolve_id(&self.config, &mut self.next_id, msg.is_response, msg.frame_id);
        log::trace!(target: "framewire::instance", "begin_transmit id=0x{id:x} type=0x{:x} len={len}", msg.msg_type);
        self.sender.begin(&self.config, &self.transport, id, len, msg.msg_type);
        self.tx_state = Some(TxState { acc: self.config.checksum.start(), has_body: false });
        Ok(id)
    }

    /// Chunks `body`'s bytes (if any) into the send buffer. Matches the
    /// original's `TF_SendFrame_Chunk` (spec.md §4.4, "Chunk") — called
    /// after any listener registration `begin_transmit`'s caller needed.
    fn transmit_body(&mut self, body: &Body) -> Result<(), Error> {
        let mut state = self.tx_state.take().ok_or(Error::NoTransmitInProgress)?;
        if let Body::Bytes(bytes) = body {
            if !bytes.is_empty() {
                self.sender.chunk(&self.transport, &self.config.checksum, &mut state.acc, bytes);
                state.has_body = true;
            }
        } else if body.len() > 0 {
            state.has_body = true;
        }
        self.tx_state = Some(state);
        Ok(())
    }

    fn end_transmit(&mut self) -> Result<(), Error> {
        let state = self.tx_state.take().ok_or(Error::NoTransmitInProgress)?;
        log::trace!(target: "framewire::instance", "end_transmit has_body={}", state.has_body);
        self.sender.end(&self.transport, &self.config.checksum, state.acc, state.has_body);
        self.sender.release(&self.transport);
        Ok(())
    }

    fn abort_transmit(&mut self) {
        log::debug!(target: "framewire::instance", "abort_transmit");
        self.tx_state = None;
        self.sender.release(&self.transport);
    }

    pub fn send(&mut self, msg: OutMessage) -> Result<(), Error> {
        self.begin_transmit(&msg)?;
        self.transmit_body(&msg.body)?;
        self.end_transmit()
    }

    pub fn respond(&mut self, mut msg: OutMessage) -> Result<(), Error> {
        msg.is_response = true;
        self.begin_transmit(&msg)?;
        self.transmit_body(&msg.body)?;
        self.end_transmit()
    }

    /// Sends `msg` and registers an ID listener tied to the newly
    /// allocated frame ID (spec.md §6, "query"). The listener is inserted
    /// between header composition and body chunking, so a `TableFull`
    /// failure aborts before any body byte reaches the transport.
    pub fn query(
        &mut self,
        msg: OutMessage,
        on_message: fn(&mut Instance<T, A>, &mut Message) -> Directive,
        on_timeout: Option<fn(&mut Instance<T, A>)>,
        ticks: u32,
    ) -> Result<(), Error> {
        let id = self.begin_transmit(&msg)?;
        if let Err(e) = self.id_listeners.insert(IdListener {
            id,
            on_message,
            on_timeout,
            ticks_remaining: ticks,
            ticks_original: ticks,
            user_data_1: 0,
            user_data_2: 0,
        }) {
            log::warn!(target: "framewire::instance", "query id=0x{id:x} listener table full, aborting");
            self.abort_transmit();
            return Err(e);
        }
        log::debug!(target: "framewire::instance", "query id=0x{id:x} awaiting reply");
        self.transmit_body(&msg.body)?;
        self.end_transmit()
    }

    /// Begins a multipart send: the body is supplied across one or more
    /// later `multipart_payload` calls, then `multipart_close`
    /// (spec.md §4.4, "Multipart send").
    pub fn send_multipart(&mut self, msg_type: u32, total_len: u32) -> Result<(), Error> {
        self.begin_transmit(&OutMessage::multipart(msg_type, total_len)).map(|_| ())
    }

    pub fn respond_multipart(&mut self, frame_id: u32, msg_type: u32, total_len: u32) -> Result<(), Error> {
        let mut msg = OutMessage::multipart(msg_type, total_len);
        msg.is_response = true;
        msg.frame_id = frame_id;
        self.begin_transmit(&msg).map(|_| ())
    }

    /// Begins a multipart query. The listener is registered immediately
    /// after the header, before any `multipart_payload` call can put body
    /// bytes on the wire, for the same reason `query` orders things this
    /// way.
    pub fn query_multipart(
        &mut self,
        msg_type: u32,
        total_len: u32,
        on_message: fn(&mut Instance<T, A>, &mut Message) -> Directive,
        on_timeout: Option<fn(&mut Instance<T, A>)>,
        ticks: u32,
    ) -> Result<(), Error> {
        let id = self.begin_transmit(&OutMessage::multipart(msg_type, total_len))?;
        if let Err(e) = self.id_listeners.insert(IdListener {
            id,
            on_message,
            on_timeout,
            ticks_remaining: ticks,
            ticks_original: ticks,
            user_data_1: 0,
            user_data_2: 0,
        }) {
            log::warn!(target: "framewire::instance", "query_multipart id=0x{id:x} listener table full, aborting");
            self.abort_transmit();
            return Err(e);
        }
        Ok(())
    }

    pub fn multipart_payload(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        let mut state = self.tx_state.take().ok_or(Error::NoTransmitInProgress)?;
        let n = self.sender.chunk(&self.transport, &self.config.checksum, &mut state.acc, bytes);
        state.has_body = state.has_body || !bytes.is_empty();
        self.tx_state = Some(state);
        Ok(n)
    }

    pub fn multipart_close(&mut self) -> Result<(), Error> {
        self.end_transmit()
    }

    pub fn add_id_listener(
        &mut self,
        id: u32,
        on_message: fn(&mut Instance<T, A>, &mut Message) -> Directive,
        on_timeout: Option<fn(&mut Instance<T, A>)>,
        ticks: u32,
    ) -> Result<(), Error> {
        self.id_listeners
            .insert(IdListener {
                id,
                on_message,
                on_timeout,
                ticks_remaining: ticks,
                ticks_original: ticks,
                user_data_1: 0,
                user_data_2: 0,
            })
            .map(|_| ())
    }

    pub fn add_type_listener(
        &mut self,
        msg_type: u32,
        on_message: fn(&mut Instance<T, A>, &mut Message) -> Directive,
    ) -> Result<(), Error> {
        self.type_listeners.insert(TypeListener { msg_type, on_message }).map(|_| ())
    }

    pub fn add_generic_listener(
        &mut self,
        on_message: fn(&mut Instance<T, A>, &mut Message) -> Directive,
    ) -> Result<(), Error> {
        self.generic_listeners.insert(GenericListener { on_message }).map(|_| ())
    }

    pub fn remove_id_listener(&mut self, id: u32) -> bool {
        match self.id_listeners.find_from(0, |l| l.id == id) {
            Some(idx) => {
                self.remove_id_listener_at(idx);
                true
            }
            None => false,
        }
    }

    pub fn remove_type_listener(&mut self, msg_type: u32) -> bool {
        self.type_listeners.remove_where(|l| l.msg_type == msg_type).is_some()
    }

    pub fn remove_generic_listener(&mut self, cb: fn(&mut Instance<T, A>, &mut Message) -> Directive) -> bool {
        self.generic_listeners.remove_where(|l| l.on_message == cb).is_some()
    }

    pub fn renew_id_listener(&mut self, id: u32) -> bool {
        match self.id_listeners.find_from(0, |l| l.id == id) {
            Some(idx) => {
                let listener = self.id_listeners.get_mut(idx).unwrap();
                listener.ticks_remaining = listener.ticks_original;
                true
            }
            None => false,
        }
    }
}
