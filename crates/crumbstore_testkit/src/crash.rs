//! Crash simulation for breadcrumb logs.
//!
//! These helpers edit a closed log file the way an interrupted write
//! would leave it: a torn header slot, frame bytes written without the
//! header commit that publishes them, or a header published ahead of its
//! frame. A store opened afterwards must recover the last committed
//! state.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crumbstore_testkit::{crash, TestStore};
//!
//! let mut store = TestStore::new();
//! store.add("committed");
//! store.with_closed_file(crash::tear_newest_header);
//! ```

use crumbstore_core::ring::{compute_crc32, DATA_OFFSET, FRAME_HEADER_SIZE, RING_MAGIC};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

const SLOT_SIZE: usize = DATA_OFFSET as usize / 2;

/// A decoded header slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotView {
    /// Byte offset of the slot in the file.
    pub offset: usize,
    /// Data region size.
    pub capacity: u32,
    /// Offset of the oldest frame.
    pub head: u32,
    /// Bytes of retained frames.
    pub used: u32,
    /// Retained frame count.
    pub count: u32,
    /// Commit sequence.
    pub sequence: u64,
}

impl SlotView {
    fn parse(bytes: &[u8], offset: usize) -> Option<Self> {
        let slot = &bytes[offset..offset + SLOT_SIZE];
        if slot[0..4] != RING_MAGIC {
            return None;
        }
        let stored_crc = u32_at(slot, 32);
        if compute_crc32(&slot[..32]) != stored_crc {
            return None;
        }
        Some(Self {
            offset,
            capacity: u32_at(slot, 8),
            head: u32_at(slot, 12),
            used: u32_at(slot, 16),
            count: u32_at(slot, 20),
            sequence: u64::from(u32_at(slot, 24)) | (u64::from(u32_at(slot, 28)) << 32),
        })
    }

    /// Data-region offset of the next frame.
    pub fn tail(&self) -> u32 {
        ((u64::from(self.head) + u64::from(self.used)) % u64::from(self.capacity)) as u32
    }

    fn write_into(&self, bytes: &mut [u8]) {
        let slot = &mut bytes[self.offset..self.offset + SLOT_SIZE];
        slot[8..12].copy_from_slice(&self.capacity.to_le_bytes());
        slot[12..16].copy_from_slice(&self.head.to_le_bytes());
        slot[16..20].copy_from_slice(&self.used.to_le_bytes());
        slot[20..24].copy_from_slice(&self.count.to_le_bytes());
        slot[24..32].copy_from_slice(&self.sequence.to_le_bytes());
        let crc = compute_crc32(&slot[..32]);
        slot[32..36].copy_from_slice(&crc.to_le_bytes());
    }
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_file(path: &Path) -> Vec<u8> {
    let mut bytes = Vec::new();
    std::fs::File::open(path)
        .and_then(|mut file| file.read_to_end(&mut bytes))
        .expect("Failed to read log file");
    bytes
}

fn write_file(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open log file");
    file.seek(SeekFrom::Start(0)).expect("Failed to seek");
    file.write_all(bytes).expect("Failed to write log file");
    file.sync_all().expect("Failed to sync log file");
}

/// Returns the committed header of a closed log.
pub fn newest_slot(path: &Path) -> SlotView {
    let bytes = read_file(path);
    newest_in(&bytes)
}

fn newest_in(bytes: &[u8]) -> SlotView {
    let a = SlotView::parse(bytes, 0);
    let b = SlotView::parse(bytes, SLOT_SIZE);
    match (a, b) {
        (Some(a), Some(b)) => {
            if a.sequence >= b.sequence {
                a
            } else {
                b
            }
        }
        (a, b) => a.or(b).expect("No valid header slot"),
    }
}

fn write_wrapped(bytes: &mut [u8], slot: &SlotView, pos: u32, data: &[u8]) {
    for (i, byte) in data.iter().enumerate() {
        let at = (u64::from(pos) + i as u64) % u64::from(slot.capacity);
        bytes[DATA_OFFSET as usize + at as usize] = *byte;
    }
}

/// Flips a byte in the newest header slot, as a write torn mid-commit.
pub fn tear_newest_header(path: &Path) {
    let mut bytes = read_file(path);
    let newest = newest_in(&bytes);
    bytes[newest.offset + 20] ^= 0xFF;
    write_file(path, &bytes);
}

/// Writes `data` into free space at the tail without committing it.
pub fn write_uncommitted_tail(path: &Path, data: &[u8]) {
    let mut bytes = read_file(path);
    let newest = newest_in(&bytes);
    assert!(
        (newest.used as usize) + data.len() <= newest.capacity as usize,
        "Uncommitted bytes would overwrite retained frames"
    );
    write_wrapped(&mut bytes, &newest, newest.tail(), data);
    write_file(path, &bytes);
}

/// Commits a header that claims one more frame of `claimed_len` payload
/// bytes, of which only the frame header and half the payload exist.
pub fn commit_torn_frame(path: &Path, claimed_len: u32) {
    let mut bytes = read_file(path);
    let newest = newest_in(&bytes);
    let written = FRAME_HEADER_SIZE as u32 + claimed_len / 2;
    assert!(
        newest.used + written <= newest.capacity,
        "Torn frame must fit in free space"
    );

    let mut header = claimed_len.to_le_bytes().to_vec();
    header.extend_from_slice(&0u32.to_le_bytes());
    write_wrapped(&mut bytes, &newest, newest.tail(), &header);

    let torn = SlotView {
        offset: if newest.offset == 0 { SLOT_SIZE } else { 0 },
        used: newest.used + written,
        count: newest.count + 1,
        sequence: newest.sequence + 1,
        ..newest
    };
    bytes.copy_within(newest.offset..newest.offset + 8, torn.offset);
    torn.write_into(&mut bytes);
    write_file(path, &bytes);
}

/// Replaces the whole file with bytes that carry no valid header.
pub fn scramble(path: &Path) {
    let len = read_file(path).len();
    write_file(path, &vec![0xAB; len]);
}
