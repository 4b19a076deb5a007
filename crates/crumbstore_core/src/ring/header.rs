//! Ring header slots.

use super::frame::{compute_crc32, FRAME_HEADER_SIZE};

/// Magic bytes identifying a ring header slot.
pub const RING_MAGIC: [u8; 4] = *b"BCRB";

/// Current ring format version.
pub const RING_VERSION: u16 = 1;

/// Size of one header slot.
pub(crate) const SLOT_SIZE: usize = 36;

/// Offset of the data region; two header slots precede it.
pub const DATA_OFFSET: u64 = 2 * SLOT_SIZE as u64;

/// Committed ring state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RingHeader {
    /// Size of the data region in bytes.
    pub capacity: u32,
    /// Data-region offset of the oldest frame.
    pub head: u32,
    /// Bytes occupied by retained frames.
    pub used: u32,
    /// Number of retained frames.
    pub count: u32,
    /// Commit counter; picks the newer of the two slots.
    pub sequence: u64,
}

impl RingHeader {
    /// An empty ring of the given capacity.
    pub fn empty(capacity: u32) -> Self {
        Self {
            capacity,
            head: 0,
            used: 0,
            count: 0,
            sequence: 0,
        }
    }

    /// Data-region offset where the next frame goes.
    pub fn tail(&self) -> u32 {
        ((u64::from(self.head) + u64::from(self.used)) % u64::from(self.capacity)) as u32
    }

    /// Byte offset of the slot this header commits to.
    pub fn slot_offset(&self) -> u64 {
        (self.sequence % 2) * SLOT_SIZE as u64
    }

    pub fn encode(&self) -> [u8; SLOT_SIZE] {
        let mut slot = [0u8; SLOT_SIZE];
        slot[0..4].copy_from_slice(&RING_MAGIC);
        slot[4..6].copy_from_slice(&RING_VERSION.to_le_bytes());
        slot[8..12].copy_from_slice(&self.capacity.to_le_bytes());
        slot[12..16].copy_from_slice(&self.head.to_le_bytes());
        slot[16..20].copy_from_slice(&self.used.to_le_bytes());
        slot[20..24].copy_from_slice(&self.count.to_le_bytes());
        slot[24..32].copy_from_slice(&self.sequence.to_le_bytes());
        let crc = compute_crc32(&slot[..32]);
        slot[32..36].copy_from_slice(&crc.to_le_bytes());
        slot
    }

    /// Parses a slot, returning `None` for anything torn, foreign or
    /// internally inconsistent.
    pub fn decode(slot: &[u8]) -> Option<Self> {
        if slot.len() < SLOT_SIZE || slot[0..4] != RING_MAGIC {
            return None;
        }
        let u32_at =
            |at: usize| u32::from_le_bytes([slot[at], slot[at + 1], slot[at + 2], slot[at + 3]]);

        let stored_crc = u32_at(32);
        if compute_crc32(&slot[..32]) != stored_crc {
            return None;
        }
        let version = u16::from_le_bytes([slot[4], slot[5]]);
        if version != RING_VERSION {
            return None;
        }

        let mut sequence = [0u8; 8];
        sequence.copy_from_slice(&slot[24..32]);
        let header = Self {
            capacity: u32_at(8),
            head: u32_at(12),
            used: u32_at(16),
            count: u32_at(20),
            sequence: u64::from_le_bytes(sequence),
        };

        let consistent = header.capacity > 0
            && header.head < header.capacity
            && header.used <= header.capacity
            && u64::from(header.count) * FRAME_HEADER_SIZE as u64 <= u64::from(header.used);
        consistent.then_some(header)
    }

    /// Picks the newest valid header out of the two slots.
    pub fn select(slot_a: Option<Self>, slot_b: Option<Self>) -> Option<Self> {
        match (slot_a, slot_b) {
            (Some(a), Some(b)) => Some(if a.sequence >= b.sequence { a } else { b }),
            (a, b) => a.or(b),
        }
    }
}
