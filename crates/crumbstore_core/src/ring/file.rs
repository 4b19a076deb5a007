//! Ring file reader and writer.

use super::frame::{
    compute_crc32, decode_frame_header, encode_frame, frame_size, FRAME_HEADER_SIZE,
};
use super::header::{RingHeader, DATA_OFFSET, SLOT_SIZE};
use crate::config::DEFAULT_CAPACITY_BYTES;
use crate::error::{StoreError, StoreResult};
use crumbstore_storage::StorageBackend;
use tracing::{debug, info, warn};

/// A size-bounded FIFO of framed byte records backed by one file.
///
/// The `RingFile` is not internally synchronized; the breadcrumb store
/// wraps it in a mutex so that an append and the evictions it triggers
/// form one critical section.
pub struct RingFile {
    backend: Box<dyn StorageBackend>,
    header: RingHeader,
    sync_on_write: bool,
}

impl RingFile {
    /// Opens a ring over `backend`, initializing or recovering it.
    ///
    /// With `capacity` set to `None` the stored capacity is adopted (a
    /// fresh file gets the default). An explicit capacity that differs
    /// from the stored one rebuilds the ring, keeping the newest frames
    /// that fit.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or `capacity` is zero.
    pub fn open(
        backend: Box<dyn StorageBackend>,
        capacity: Option<u32>,
        sync_on_write: bool,
    ) -> StoreResult<Self> {
        if capacity == Some(0) {
            return Err(StoreError::CapacityExceeded {
                frame_size: frame_size(0),
                capacity: 0,
            });
        }

        let size = backend.size()?;
        let mut ring = Self {
            backend,
            header: RingHeader::empty(capacity.unwrap_or(DEFAULT_CAPACITY_BYTES)),
            sync_on_write,
        };

        let stored = if size >= DATA_OFFSET {
            let slots = ring.backend.read_at(0, DATA_OFFSET as usize)?;
            RingHeader::select(
                RingHeader::decode(&slots[..SLOT_SIZE]),
                RingHeader::decode(&slots[SLOT_SIZE..]),
            )
        } else {
            None
        };

        match stored {
            Some(header) => {
                debug!(
                    capacity = header.capacity,
                    frames = header.count,
                    used = header.used,
                    "opened breadcrumb ring"
                );
                ring.header = header;
                let expected = DATA_OFFSET + u64::from(header.capacity);
                if size < expected {
                    ring.backend.set_len(expected)?;
                }
                ring.recover()?;
            }
            None => {
                if size > 0 {
                    warn!(size, "no valid ring header, reinitializing breadcrumb ring");
                }
                let fresh = ring.header;
                ring.backend.set_len(DATA_OFFSET + u64::from(fresh.capacity))?;
                ring.commit(fresh)?;
            }
        }

        if let Some(capacity) = capacity {
            if capacity != ring.header.capacity {
                ring.resize(capacity)?;
            }
        }

        Ok(ring)
    }

    /// Appends a payload at the tail, evicting head frames until it fits.
    ///
    /// Returns the number of frames evicted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CapacityExceeded`] without touching the ring
    /// if the frame alone is larger than the capacity, or an error if the
    /// backend fails.
    pub fn append(&mut self, payload: &[u8]) -> StoreResult<usize> {
        let size = frame_size(payload.len());
        let capacity = u64::from(self.header.capacity);
        if size > capacity {
            return Err(StoreError::CapacityExceeded {
                frame_size: size,
                capacity,
            });
        }

        let mut next = self.header;
        let mut evicted = 0;
        while u64::from(next.used) + size > capacity {
            self.pop_front(&mut next)?;
            evicted += 1;
        }
        if evicted > 0 {
            // evicted bytes are about to be overwritten
            self.commit(next)?;
        }

        self.write_wrapped(next.tail(), &encode_frame(payload))?;
        next.used += size as u32;
        next.count += 1;
        self.commit(next)?;

        Ok(evicted)
    }

    /// Returns the oldest payload without removing it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RingCorruption`] if the head frame fails its
    /// checksum, or an error if the backend fails.
    pub fn peek(&self) -> StoreResult<Option<Vec<u8>>> {
        if self.header.count == 0 {
            return Ok(None);
        }
        let (payload, intact, _) = self.read_frame(self.header.head)?;
        if !intact {
            return Err(StoreError::ring_corruption(format!(
                "checksum mismatch in head frame at {}",
                self.header.head
            )));
        }
        Ok(Some(payload))
    }

    /// Removes the oldest frame. Returns `false` if the ring is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn pop(&mut self) -> StoreResult<bool> {
        if self.header.count == 0 {
            return Ok(false);
        }
        let mut next = self.header;
        self.pop_front(&mut next)?;
        self.commit(next)?;
        Ok(true)
    }

    /// Returns all intact payloads, oldest first.
    ///
    /// Frames whose checksum does not match are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn frames(&self) -> StoreResult<Vec<Vec<u8>>> {
        let mut frames = Vec::with_capacity(self.header.count as usize);
        let mut pos = self.header.head;
        for index in 0..self.header.count {
            let (payload, intact, size) = self.read_frame(pos)?;
            if intact {
                frames.push(payload);
            } else {
                warn!(index, offset = pos, "skipping breadcrumb frame with bad checksum");
            }
            pos = self.advance(pos, size);
        }
        Ok(frames)
    }

    /// Drops every frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn clear(&mut self) -> StoreResult<()> {
        let next = RingHeader {
            sequence: self.header.sequence,
            ..RingHeader::empty(self.header.capacity)
        };
        self.commit(next)
    }

    /// Bytes occupied by retained frames, headers included.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        u64::from(self.header.used)
    }

    /// Size of the data region in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        u64::from(self.header.capacity)
    }

    /// Number of retained frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.header.count as usize
    }

    /// Returns `true` if no frames are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    /// Walks the committed chain and cuts it at the first frame that runs
    /// past the committed region.
    fn recover(&mut self) -> StoreResult<()> {
        let mut pos = self.header.head;
        let mut consumed = 0u64;
        let mut kept = 0u32;

        while kept < self.header.count {
            let remaining = u64::from(self.header.used) - consumed;
            if remaining < FRAME_HEADER_SIZE as u64 {
                break;
            }
            let (len, _) = decode_frame_header(&self.read_wrapped(pos, FRAME_HEADER_SIZE)?);
            let size = frame_size(len as usize);
            if size > remaining {
                break;
            }
            consumed += size;
            kept += 1;
            pos = self.advance(pos, size);
        }

        if kept != self.header.count || consumed != u64::from(self.header.used) {
            warn!(
                committed = self.header.count,
                kept,
                discarded_bytes = u64::from(self.header.used) - consumed,
                "discarding torn breadcrumb frames"
            );
            let next = RingHeader {
                used: consumed as u32,
                count: kept,
                ..self.header
            };
            self.commit(next)?;
        }
        Ok(())
    }

    fn resize(&mut self, capacity: u32) -> StoreResult<()> {
        let frames = self.frames()?;
        info!(
            from = self.header.capacity,
            to = capacity,
            frames = frames.len(),
            "resizing breadcrumb ring"
        );

        let next = RingHeader {
            sequence: self.header.sequence,
            ..RingHeader::empty(capacity)
        };
        self.commit(next)?;
        self.backend.set_len(DATA_OFFSET + u64::from(capacity))?;

        for payload in frames {
            match self.append(&payload) {
                Ok(_) | Err(StoreError::CapacityExceeded { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Drops the head frame from `header` without committing.
    fn pop_front(&self, header: &mut RingHeader) -> StoreResult<()> {
        if header.count == 0 {
            return Err(StoreError::ring_corruption("eviction from an empty ring"));
        }
        let (len, _) = decode_frame_header(&self.read_wrapped(header.head, FRAME_HEADER_SIZE)?);
        let size = frame_size(len as usize);
        if size > u64::from(header.used) {
            return Err(StoreError::ring_corruption(format!(
                "head frame of {size} bytes exceeds {} used bytes",
                header.used
            )));
        }
        header.head = self.advance(header.head, size);
        header.used -= size as u32;
        header.count -= 1;
        if header.count == 0 {
            header.head = 0;
            header.used = 0;
        }
        Ok(())
    }

    /// Reads the frame at `pos`: `(payload, checksum_ok, frame_size)`.
    fn read_frame(&self, pos: u32) -> StoreResult<(Vec<u8>, bool, u64)> {
        let (len, crc) = decode_frame_header(&self.read_wrapped(pos, FRAME_HEADER_SIZE)?);
        let size = frame_size(len as usize);
        if size > u64::from(self.header.used) {
            return Err(StoreError::ring_corruption(format!(
                "frame at {pos} claims {size} bytes, ring holds {}",
                self.header.used
            )));
        }
        let payload_pos = self.advance(pos, FRAME_HEADER_SIZE as u64);
        let payload = self.read_wrapped(payload_pos, len as usize)?;
        let intact = compute_crc32(&payload) == crc;
        Ok((payload, intact, size))
    }

    /// Writes `next` to its slot and makes it the current header.
    fn commit(&mut self, mut next: RingHeader) -> StoreResult<()> {
        next.sequence = self.header.sequence.wrapping_add(1);
        self.backend.write_at(next.slot_offset(), &next.encode())?;
        if self.sync_on_write {
            self.backend.sync()?;
        } else {
            self.backend.flush()?;
        }
        self.header = next;
        Ok(())
    }

    fn advance(&self, pos: u32, by: u64) -> u32 {
        ((u64::from(pos) + by) % u64::from(self.header.capacity)) as u32
    }

    fn read_wrapped(&self, pos: u32, len: usize) -> StoreResult<Vec<u8>> {
        let until_end = (self.header.capacity - pos) as usize;
        if len <= until_end {
            return Ok(self.backend.read_at(DATA_OFFSET + u64::from(pos), len)?);
        }
        let mut bytes = self.backend.read_at(DATA_OFFSET + u64::from(pos), until_end)?;
        bytes.extend(self.backend.read_at(DATA_OFFSET, len - until_end)?);
        Ok(bytes)
    }

    fn write_wrapped(&mut self, pos: u32, data: &[u8]) -> StoreResult<()> {
        let until_end = (self.header.capacity - pos) as usize;
        if data.len() <= until_end {
            self.backend.write_at(DATA_OFFSET + u64::from(pos), data)?;
        } else {
            self.backend
                .write_at(DATA_OFFSET + u64::from(pos), &data[..until_end])?;
            self.backend.write_at(DATA_OFFSET, &data[until_end..])?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn into_backend(self) -> Box<dyn StorageBackend> {
        self.backend
    }
}

impl std::fmt::Debug for RingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingFile")
            .field("capacity", &self.header.capacity)
            .field("used", &self.header.used)
            .field("count", &self.header.count)
            .field("sync_on_write", &self.sync_on_write)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crumbstore_storage::{FileBackend, InMemoryBackend};
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    fn memory_ring(capacity: u32) -> RingFile {
        RingFile::open(Box::new(InMemoryBackend::new()), Some(capacity), false).unwrap()
    }

    fn raw_bytes(ring: RingFile) -> Vec<u8> {
        let backend = ring.into_backend();
        let size = backend.size().unwrap() as usize;
        backend.read_at(0, size).unwrap()
    }

    fn reopen(bytes: Vec<u8>, capacity: Option<u32>) -> RingFile {
        RingFile::open(Box::new(InMemoryBackend::with_data(bytes)), capacity, false).unwrap()
    }

    fn payload(tag: u8, len: usize) -> Vec<u8> {
        vec![tag; len]
    }

    #[test]
    fn fresh_ring_is_empty() {
        let ring = memory_ring(4096);
        assert!(ring.is_empty());
        assert_eq!(ring.size_bytes(), 0);
        assert_eq!(ring.capacity(), 4096);
        assert!(ring.frames().unwrap().is_empty());
        assert_eq!(ring.peek().unwrap(), None);
    }

    #[test]
    fn default_capacity_for_fresh_file() {
        let ring = RingFile::open(Box::new(InMemoryBackend::new()), None, false).unwrap();
        assert_eq!(ring.capacity(), u64::from(DEFAULT_CAPACITY_BYTES));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = RingFile::open(Box::new(InMemoryBackend::new()), Some(0), false);
        assert!(matches!(result, Err(StoreError::CapacityExceeded { .. })));
    }

    #[test]
    fn append_preserves_order() {
        let mut ring = memory_ring(4096);
        ring.append(b"one").unwrap();
        ring.append(b"two").unwrap();
        ring.append(b"three").unwrap();

        assert_eq!(ring.len(), 3);
        assert_eq!(ring.size_bytes(), frame_size(3) * 2 + frame_size(5));
        assert_eq!(
            ring.frames().unwrap(),
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
        );
    }

    #[test]
    fn eviction_is_fifo() {
        // 20-byte frames in a 100-byte ring: five fit
        let mut ring = memory_ring(100);
        for tag in 0..5u8 {
            assert_eq!(ring.append(&payload(tag, 12)).unwrap(), 0);
        }
        assert_eq!(ring.size_bytes(), 100);

        assert_eq!(ring.append(&payload(5, 12)).unwrap(), 1);
        assert_eq!(ring.append(&payload(6, 12)).unwrap(), 1);

        let tags: Vec<u8> = ring.frames().unwrap().iter().map(|f| f[0]).collect();
        assert_eq!(tags, vec![2, 3, 4, 5, 6]);
        assert!(ring.size_bytes() <= ring.capacity());
    }

    #[test]
    fn large_frame_evicts_several() {
        let mut ring = memory_ring(100);
        for tag in 0..5u8 {
            ring.append(&payload(tag, 12)).unwrap();
        }
        assert_eq!(ring.append(&payload(9, 50)).unwrap(), 3);
        let tags: Vec<u8> = ring.frames().unwrap().iter().map(|f| f[0]).collect();
        assert_eq!(tags, vec![3, 4, 9]);
    }

    #[test]
    fn oversized_frame_is_rejected_without_mutation() {
        let mut ring = memory_ring(100);
        ring.append(b"keep").unwrap();

        let result = ring.append(&payload(1, 93));
        assert!(matches!(
            result,
            Err(StoreError::CapacityExceeded {
                frame_size: 101,
                capacity: 100
            })
        ));
        assert_eq!(ring.frames().unwrap(), vec![b"keep".to_vec()]);

        // exactly the capacity still fits
        assert_eq!(ring.append(&payload(2, 92)).unwrap(), 1);
        assert_eq!(ring.size_bytes(), 100);
    }

    #[test]
    fn peek_and_pop() {
        let mut ring = memory_ring(256);
        ring.append(b"first").unwrap();
        ring.append(b"second").unwrap();

        assert_eq!(ring.peek().unwrap(), Some(b"first".to_vec()));
        assert!(ring.pop().unwrap());
        assert_eq!(ring.peek().unwrap(), Some(b"second".to_vec()));
        assert!(ring.pop().unwrap());
        assert!(!ring.pop().unwrap());
        assert_eq!(ring.size_bytes(), 0);
    }

    #[test]
    fn clear_empties_the_ring() {
        let mut ring = memory_ring(256);
        ring.append(b"a").unwrap();
        ring.append(b"b").unwrap();
        ring.clear().unwrap();

        assert!(ring.is_empty());
        assert_eq!(ring.size_bytes(), 0);
        ring.append(b"c").unwrap();
        assert_eq!(ring.frames().unwrap(), vec![b"c".to_vec()]);
    }

    #[test]
    fn frames_wrap_around_the_region_end() {
        let mut ring = memory_ring(64);
        for tag in 0..20u8 {
            ring.append(&payload(tag, 9 + usize::from(tag % 4))).unwrap();
        }
        let frames = ring.frames().unwrap();
        let last = frames.last().unwrap();
        assert_eq!(last[0], 19);
        assert_eq!(last.len(), 9 + 3);
        for pair in frames.windows(2) {
            assert_eq!(pair[0][0] + 1, pair[1][0]);
        }
    }

    #[test]
    fn reopen_sees_committed_frames() {
        let mut ring = memory_ring(128);
        ring.append(b"alpha").unwrap();
        ring.append(b"beta").unwrap();

        let ring = reopen(raw_bytes(ring), None);
        assert_eq!(ring.capacity(), 128);
        assert_eq!(
            ring.frames().unwrap(),
            vec![b"alpha".to_vec(), b"beta".to_vec()]
        );
    }

    #[test]
    fn uncommitted_tail_write_is_invisible() {
        let mut ring = memory_ring(128);
        ring.append(b"committed").unwrap();
        let tail = ring.header.tail();

        // frame bytes hit the disk, the header commit did not
        ring.write_wrapped(tail, &encode_frame(b"torn")).unwrap();

        let ring = reopen(raw_bytes(ring), None);
        assert_eq!(ring.frames().unwrap(), vec![b"committed".to_vec()]);
    }

    #[test]
    fn frame_running_past_committed_region_is_discarded() {
        let mut ring = memory_ring(128);
        ring.append(b"good").unwrap();
        ring.append(b"also good").unwrap();

        // claim a third frame of which only half was written
        let mut bytes = raw_bytes(ring);
        let committed = RingHeader::select(
            RingHeader::decode(&bytes[..SLOT_SIZE]),
            RingHeader::decode(&bytes[SLOT_SIZE..DATA_OFFSET as usize]),
        )
        .unwrap();
        let tail = (DATA_OFFSET + u64::from(committed.tail())) as usize;
        bytes[tail..tail + 8].copy_from_slice(&encode_frame(&[7u8; 40])[..8]);
        let lying = RingHeader {
            used: committed.used + 20,
            count: committed.count + 1,
            sequence: committed.sequence + 1,
            ..committed
        };
        let slot = lying.slot_offset() as usize;
        bytes[slot..slot + SLOT_SIZE].copy_from_slice(&lying.encode());

        let ring = reopen(bytes, None);
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.size_bytes(), frame_size(4) + frame_size(9));
        assert_eq!(
            ring.frames().unwrap(),
            vec![b"good".to_vec(), b"also good".to_vec()]
        );
    }

    #[test]
    fn torn_header_falls_back_to_previous_slot() {
        let mut ring = memory_ring(128);
        ring.append(b"one").unwrap();
        ring.append(b"two").unwrap();
        let newest = ring.header.slot_offset() as usize;

        let mut bytes = raw_bytes(ring);
        bytes[newest + 20] ^= 0xFF;

        let ring = reopen(bytes, None);
        assert_eq!(ring.frames().unwrap(), vec![b"one".to_vec()]);
    }

    #[test]
    fn garbage_file_is_reinitialized() {
        let ring = reopen(vec![0xAB; 300], Some(256));
        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 256);
    }

    #[test]
    fn corrupt_payload_is_skipped() {
        let mut ring = memory_ring(128);
        ring.append(b"first").unwrap();
        ring.append(b"second").unwrap();
        ring.append(b"third").unwrap();

        let mut bytes = raw_bytes(ring);
        let second_payload = DATA_OFFSET as usize + frame_size(5) as usize + FRAME_HEADER_SIZE;
        bytes[second_payload] ^= 0xFF;

        let ring = reopen(bytes, None);
        assert_eq!(ring.len(), 3);
        assert_eq!(
            ring.frames().unwrap(),
            vec![b"first".to_vec(), b"third".to_vec()]
        );
    }

    #[test]
    fn shrinking_keeps_newest_frames() {
        let mut ring = memory_ring(200);
        for tag in 0..8u8 {
            ring.append(&payload(tag, 12)).unwrap();
        }

        let ring = reopen(raw_bytes(ring), Some(60));
        assert_eq!(ring.capacity(), 60);
        let tags: Vec<u8> = ring.frames().unwrap().iter().map(|f| f[0]).collect();
        assert_eq!(tags, vec![5, 6, 7]);
    }

    #[test]
    fn growing_keeps_every_frame() {
        let mut ring = memory_ring(60);
        for tag in 0..3u8 {
            ring.append(&payload(tag, 12)).unwrap();
        }

        let mut ring = reopen(raw_bytes(ring), Some(200));
        assert_eq!(ring.len(), 3);
        ring.append(&payload(3, 12)).unwrap();
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn file_backed_ring_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ring.bin");

        {
            let backend = FileBackend::open(&path).unwrap();
            let mut ring = RingFile::open(Box::new(backend), Some(4096), true).unwrap();
            ring.append(b"durable").unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        let ring = RingFile::open(Box::new(backend), None, true).unwrap();
        assert_eq!(ring.frames().unwrap(), vec![b"durable".to_vec()]);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            DATA_OFFSET + 4096
        );
    }

    proptest! {
        #[test]
        fn ring_matches_fifo_model(
            capacity in 16u32..300,
            lens in prop::collection::vec(0usize..80, 1..60),
        ) {
            let mut ring = memory_ring(capacity);
            let mut model: VecDeque<Vec<u8>> = VecDeque::new();
            let mut model_used = 0u64;

            for (i, len) in lens.into_iter().enumerate() {
                let data = payload(i as u8, len);
                let size = frame_size(len);
                let result = ring.append(&data);
                if size > u64::from(capacity) {
                    prop_assert!(result.is_err());
                    continue;
                }
                prop_assert!(result.is_ok());
                while model_used + size > u64::from(capacity) {
                    let old = model.pop_front().unwrap();
                    model_used -= frame_size(old.len());
                }
                model_used += size;
                model.push_back(data);

                prop_assert!(ring.size_bytes() <= u64::from(capacity));
                prop_assert_eq!(ring.size_bytes(), model_used);
            }

            let expected: Vec<Vec<u8>> = model.into_iter().collect();
            prop_assert_eq!(&ring.frames().unwrap(), &expected);

            let reopened = reopen(raw_bytes(ring), None);
            prop_assert_eq!(&reopened.frames().unwrap(), &expected);
        }
    }
}
