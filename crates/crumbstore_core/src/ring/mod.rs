//! Size-bounded circular frame file.
//!
//! The ring file is the durable store underneath the breadcrumb log. It
//! knows frame boundaries and byte accounting, nothing about breadcrumbs.
//!
//! ## File Layout
//!
//! ```text
//! | header slot A (36) | header slot B (36) | data region (capacity bytes) |
//! ```
//!
//! Header slot:
//!
//! ```text
//! | magic "BCRB" (4) | version (2) | reserved (2) | capacity (4) | head (4) |
//! | used (4) | count (4) | sequence (8) | crc32 (4) |
//! ```
//!
//! Frame, stored at `head` and wrapping past the end of the data region:
//!
//! ```text
//! | length (4) | crc32 of payload (4) | payload (length) |
//! ```
//!
//! All integers are little-endian.
//!
//! ## Commit Protocol
//!
//! The header is the commit point. Each commit bumps `sequence` and goes to
//! the slot chosen by its parity, so a torn header write leaves the other
//! slot intact; open picks the valid slot with the highest sequence.
//!
//! Appending writes the frame into free space at the tail and then commits.
//! When eviction is needed, the header that drops the evicted frames is
//! committed and synced **before** their bytes are overwritten.
//!
//! ## Recovery Policy
//!
//! - **No valid header slot**: the file is reinitialized empty.
//! - **Frame runs past the committed region**: that frame and everything
//!   after it are discarded and the repaired header is committed.
//! - **Payload checksum mismatch**: the frame keeps its place in the chain
//!   but is skipped by [`RingFile::frames`].

mod file;
mod frame;
mod header;

pub use file::RingFile;
pub use frame::{compute_crc32, frame_size, FRAME_HEADER_SIZE};
pub use header::{DATA_OFFSET, RING_MAGIC, RING_VERSION};
