//! Journal file layout (spec.md §4.4): 64-byte file header, then a stream of
//! `EventHeader(20B) ‖ Body(N) ‖ CRC(4B)` records. Fixed-width character
//! fields are null-padded (symbol 24 B, user 32 B, currency 8 B), matching
//! the byte layout `pragma pack`-equivalent requirement in spec.md §6.
//!
//! Grounded in `joaquinbejar-OrderBook-rs`'s `sequencer::journal` constants
//! (`ENTRY_HEADER_SIZE`, `ENTRY_CRC_SIZE`) and `nexus_core::persistence`'s
//! `#[repr(C, packed)]` header struct, hand-rolled here as explicit
//! little-endian byte slicing instead of `repr(packed)` so the layout is
//! independent of the host's struct-packing rules.

pub const MAGIC: [u8; 4] = *b"CREJ";
pub const VERSION: u32 = 1;
pub const FILE_HEADER_SIZE: usize = 64;
pub const EVENT_HEADER_SIZE: usize = 20;
pub const CRC_SIZE: usize = 4;

pub const SYMBOL_LEN: usize = 24;
pub const USER_LEN: usize = 32;
pub const CURRENCY_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileHeader {
    pub version: u32,
    pub created_ts: u64,
    pub last_seq: u64,
}

impl FileHeader {
    pub fn new(created_ts: u64) -> Self {
        Self { version: VERSION, created_ts, last_seq: 0 }
    }

    pub fn encode(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut buf = [0u8; FILE_HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.created_ts.to_le_bytes());
        buf[16..24].copy_from_slice(&self.last_seq.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, String> {
        if buf.len() < FILE_HEADER_SIZE {
            return Err(format!("file header truncated: {} bytes", buf.len()));
        }
        if buf[0..4] != MAGIC {
            return Err("bad magic, not a CREJ journal".to_string());
        }
        let version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let created_ts = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let last_seq = u64::from_le_bytes(buf[16..24].try_into().unwrap());
        Ok(Self { version, created_ts, last_seq })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    OrderNew,
    Cancel,
    Modify,
    Trade,
    Deposit,
    Withdrawal,
    MarginLock,
    MarginRelease,
    Liquidation,
    Funding,
    Fee,
    Insurance,
    SystemStart,
    SystemStop,
    Snapshot,
}

impl EventType {
    pub fn to_u8(self) -> u8 {
        match self {
            EventType::OrderNew => 1,
            EventType::Cancel => 2,
            EventType::Modify => 3,
            EventType::Trade => 4,
            EventType::Deposit => 5,
            EventType::Withdrawal => 6,
            EventType::MarginLock => 7,
            EventType::MarginRelease => 8,
            EventType::Liquidation => 9,
            EventType::Funding => 10,
            EventType::Fee => 11,
            EventType::Insurance => 12,
            EventType::SystemStart => 13,
            EventType::SystemStop => 14,
            EventType::Snapshot => 15,
        }
    }

    pub fn from_u8(v: u8) -> Result<Self, String> {
        Ok(match v {
            1 => EventType::OrderNew,
            2 => EventType::Cancel,
            3 => EventType::Modify,
            4 => EventType::Trade,
            5 => EventType::Deposit,
            6 => EventType::Withdrawal,
            7 => EventType::MarginLock,
            8 => EventType::MarginRelease,
            9 => EventType::Liquidation,
            10 => EventType::Funding,
            11 => EventType::Fee,
            12 => EventType::Insurance,
            13 => EventType::SystemStart,
            14 => EventType::SystemStop,
            15 => EventType::Snapshot,
            other => return Err(format!("unknown event type byte {other}")),
        })
    }

    /// `true` for the durability-critical event types that must flush +
    /// fsync immediately rather than waiting for the batched flush
    /// (spec.md §4.4 "Write path").
    pub fn is_durability_critical(self) -> bool {
        matches!(self, EventType::Trade | EventType::Deposit | EventType::Withdrawal | EventType::Liquidation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub timestamp_ns: u64,
    pub sequence: u64,
    pub event_type: EventType,
    pub data_size: u16,
}

impl EventHeader {
    pub fn encode(&self) -> [u8; EVENT_HEADER_SIZE] {
        let mut buf = [0u8; EVENT_HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.timestamp_ns.to_le_bytes());
        buf[8..16].copy_from_slice(&self.sequence.to_le_bytes());
        buf[16] = self.event_type.to_u8();
        buf[17] = 0; // _pad
        buf[18..20].copy_from_slice(&self.data_size.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, String> {
        if buf.len() < EVENT_HEADER_SIZE {
            return Err(format!("event header truncated: {} bytes", buf.len()));
        }
        Ok(Self {
            timestamp_ns: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            sequence: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
            event_type: EventType::from_u8(buf[16])?,
            data_size: u16::from_le_bytes(buf[18..20].try_into().unwrap()),
        })
    }
}

pub fn write_fixed_str(buf: &mut Vec<u8>, s: &str, len: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(len);
    buf.extend_from_slice(&bytes[..n]);
    buf.resize(buf.len() + (len - n), 0);
}

pub fn read_fixed_str(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_header_round_trips() {
        let header = FileHeader { version: 1, created_ts: 123, last_seq: 7 };
        let decoded = FileHeader::decode(&header.encode()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn file_header_rejects_bad_magic() {
        let mut bytes = FileHeader::new(1).encode();
        bytes[0] = b'X';
        assert!(FileHeader::decode(&bytes).is_err());
    }

    #[test]
    fn event_header_round_trips() {
        let header = EventHeader { timestamp_ns: 99, sequence: 5, event_type: EventType::Trade, data_size: 40 };
        let decoded = EventHeader::decode(&header.encode()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn fixed_str_pads_and_trims_at_nul() {
        let mut buf = Vec::new();
        write_fixed_str(&mut buf, "XAU-MNT-PERP", SYMBOL_LEN);
        assert_eq!(buf.len(), SYMBOL_LEN);
        assert_eq!(read_fixed_str(&buf), "XAU-MNT-PERP");
    }
}
