//! Frame envelope and checksum.

/// Bytes preceding each payload: length (4) + crc32 (4).
pub const FRAME_HEADER_SIZE: usize = 8;

/// Returns the number of ring bytes a payload of `payload_len` occupies.
#[must_use]
pub const fn frame_size(payload_len: usize) -> u64 {
    (FRAME_HEADER_SIZE + payload_len) as u64
}

/// Builds the framed bytes for a payload.
///
/// The caller guarantees `payload.len()` fits in a `u32`.
pub(crate) fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&compute_crc32(payload).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Splits a frame header into `(payload_len, payload_crc)`.
pub(crate) fn decode_frame_header(header: &[u8]) -> (u32, u32) {
    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    (len, crc)
}

/// Computes CRC32 checksum for data.
pub fn compute_crc32(data: &[u8]) -> u32 {
    // IEEE polynomial, reflected
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc32_empty() {
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn frame_envelope_layout() {
        let frame = encode_frame(b"abc");
        assert_eq!(frame.len() as u64, frame_size(3));
        let (len, crc) = decode_frame_header(&frame[..FRAME_HEADER_SIZE]);
        assert_eq!(len, 3);
        assert_eq!(crc, compute_crc32(b"abc"));
        assert_eq!(&frame[FRAME_HEADER_SIZE..], b"abc");
    }
}
