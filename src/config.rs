use crate::checksum::ChecksumAlgorithm;
use crate::error::Error;

/// Width, in bytes, of a wire-envelope field (ID, LEN, TYPE).
///
/// Both peers must agree on every width; it is never negotiated on the
/// wire (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    One,
    Two,
    Four,
}

impl FieldWidth {
    pub fn bytes(self) -> usize {
        match self {
            FieldWidth::One => 1,
            FieldWidth::Two => 2,
            FieldWidth::Four => 4,
        }
    }

    /// Largest value representable in this field, i.e. `2^(8*bytes) - 1`.
    pub fn max_value(self) -> u32 {
        match self {
            FieldWidth::One => 0xFF,
            FieldWidth::Two => 0xFFFF,
            FieldWidth::Four => 0xFFFF_FFFF,
        }
    }
}

/// Peer bit: the MSB of the ID field, fixed per instance so two peers never
/// allocate the same outbound ID (spec.md §3, "ID allocation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerBit {
    Zero,
    One,
}

impl PeerBit {
    fn as_mask(self, id_width: FieldWidth) -> u32 {
        let top_bit = 1u32 << (id_width.bytes() * 8 - 1);
        match self {
            PeerBit::Zero => 0,
            PeerBit::One => top_bit,
        }
    }
}

/// Instance-wide configuration. Both peers on a link must construct
/// equivalent configs (same widths, same SOF, same checksum algorithm) —
/// the wire format has no negotiation phase.
///
/// Defaults mirror the reference `TF_Config.example.h` used by the
/// protocol this engine generalizes: one-byte ID, two-byte LEN, one-byte
/// TYPE, SOF enabled at `0x01`, CRC-32 checksum, 1024-byte receive buffer.
#[derive(Debug, Clone)]
pub struct Config {
    pub id_width: FieldWidth,
    pub len_width: FieldWidth,
    pub type_width: FieldWidth,
    pub sof: Option<u8>,
    pub checksum: ChecksumAlgorithm,
    pub rx_capacity: usize,
    pub tx_capacity: usize,
    pub id_listener_capacity: usize,
    pub type_listener_capacity: usize,
    pub generic_listener_capacity: usize,
    pub parser_inactivity_ticks: u32,
    pub peer_bit: PeerBit,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            id_width: FieldWidth::One,
            len_width: FieldWidth::Two,
            type_width: FieldWidth::One,
            sof: Some(0x01),
            checksum: ChecksumAlgorithm::Crc32,
            rx_capacity: 1024,
            tx_capacity: 32,
            id_listener_capacity: 16,
            type_listener_capacity: 8,
            generic_listener_capacity: 4,
            parser_inactivity_ticks: 100,
            peer_bit: PeerBit::Zero,
        }
    }
}

impl Config {
    pub fn new(peer_bit: PeerBit) -> Self {
        Config {
            peer_bit,
            ..Config::default()
        }
    }

    pub fn with_field_widths(mut self, id: FieldWidth, len: FieldWidth, ty: FieldWidth) -> Self {
        self.id_width = id;
        self.len_width = len;
        self.type_width = ty;
        self
    }

    pub fn with_sof(mut self, sof: Option<u8>) -> Self {
        self.sof = sof;
        self
    }

    pub fn with_checksum(mut self, checksum: ChecksumAlgorithm) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn with_rx_capacity(mut self, capacity: usize) -> Self {
        self.rx_capacity = capacity;
        self
    }

    pub fn with_tx_capacity(mut self, capacity: usize) -> Self {
        self.tx_capacity = capacity;
        self
    }

    pub fn with_listener_capacities(mut self, id: usize, ty: usize, generic: usize) -> Self {
        self.id_listener_capacity = id;
        self.type_listener_capacity = ty;
        self.generic_listener_capacity = generic;
        self
    }

    pub fn with_parser_inactivity_ticks(mut self, ticks: u32) -> Self {
        self.parser_inactivity_ticks = ticks;
        self
    }

    pub(crate) fn peer_bit_mask(&self) -> u32 {
        self.peer_bit.as_mask(self.id_width)
    }

    pub(crate) fn id_value_mask(&self) -> u32 {
        // All ID bits except the peer bit.
        self.id_width.max_value() >> 1
    }

    /// Rejects configurations the engine cannot operate under: a receive
    /// buffer or send buffer of zero bytes, or a listener table with no
    /// slots at all.
    pub fn validate(&self) -> Result<(), Error> {
        if self.rx_capacity == 0 || self.tx_capacity == 0 {
            return Err(Error::InvalidConfig);
        }
        if self.id_listener_capacity == 0
            && self.type_listener_capacity == 0
            && self.generic_listener_capacity == 0
        {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}
