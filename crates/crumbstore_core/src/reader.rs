//! Breadcrumb iteration for report attachment and inspection.

use crate::codec::RecordCodec;
use crate::error::StoreResult;
use crate::ring::RingFile;
use crate::types::Breadcrumb;
use crumbstore_storage::FileBackend;
use std::io::{self, Write};
use std::path::Path;
use std::vec::IntoIter;
use tracing::debug;

/// Iterates the breadcrumbs of a snapshot, oldest first.
///
/// Frames that do not decode are skipped.
#[derive(Debug)]
pub struct BreadcrumbReader {
    frames: IntoIter<Vec<u8>>,
    capacity: Option<u64>,
    size_bytes: u64,
}

impl BreadcrumbReader {
    pub(crate) fn from_frames(frames: Vec<Vec<u8>>) -> Self {
        let size_bytes = frames
            .iter()
            .map(|frame| crate::ring::frame_size(frame.len()))
            .sum();
        Self {
            frames: frames.into_iter(),
            capacity: None,
            size_bytes,
        }
    }

    /// Opens a log file directly, adopting its stored capacity.
    ///
    /// The file is locked for the duration of the read, so this fails
    /// while a store has it open.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be read.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if !path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no breadcrumb log at {}", path.display()),
            )
            .into());
        }
        let backend = FileBackend::open(path)?;
        let ring = RingFile::open(Box::new(backend), None, false)?;
        let mut reader = Self::from_frames(ring.frames()?);
        reader.capacity = Some(ring.capacity());
        reader.size_bytes = ring.size_bytes();
        Ok(reader)
    }

    /// Ring capacity, when read straight from a file.
    #[must_use]
    pub fn capacity(&self) -> Option<u64> {
        self.capacity
    }

    /// Bytes the snapshot occupied in the ring.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Writes the remaining breadcrumbs as JSON lines. Returns the number
    /// written.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn write_json_lines<W: Write>(self, mut writer: W) -> StoreResult<usize> {
        let mut written = 0;
        for breadcrumb in self {
            writer.write_all(&RecordCodec::encode(&breadcrumb)?)?;
            writer.write_all(b"\n")?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }
}

impl Iterator for BreadcrumbReader {
    type Item = Breadcrumb;

    fn next(&mut self) -> Option<Self::Item> {
        for frame in self.frames.by_ref() {
            match RecordCodec::decode(&frame) {
                Ok(breadcrumb) => return Some(breadcrumb),
                Err(e) => debug!(error = %e, "skipping undecodable breadcrumb"),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.frames.size_hint().1)
    }
}
