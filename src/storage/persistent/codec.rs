//! On-disk framing for snapshot files.
//!
//! The snapshot itself stays textual (JSON); the frame adds identification,
//! a length prefix and a CRC32 so truncated or corrupted files are detected
//! instead of being parsed as an empty or partial store.
//!
//! Format:
//! ```text
//! [MAGIC: 4 bytes "VITL"][version: 1 byte][length: 4 bytes LE]
//! [data: N bytes UTF-8][crc32: 4 bytes LE]
//! ```

use std::io::{Error as IoError, ErrorKind, Result as IoResult};

use crc32fast::Hasher;

/// Current frame version.
const CODEC_VERSION: u8 = 1;

/// Magic bytes identifying vitalstore snapshot files.
pub const MAGIC: [u8; 4] = *b"VITL";

const HEADER_LEN: usize = 4 + 1 + 4;
const TRAILER_LEN: usize = 4;

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn invalid(msg: impl Into<String>) -> IoError {
    IoError::new(ErrorKind::InvalidData, msg.into())
}

/// Frames a snapshot for writing.
pub fn encode(text: &str) -> IoResult<Vec<u8>> {
    let data = text.as_bytes();
    let len = u32::try_from(data.len())
        .map_err(|_| invalid(format!("snapshot of {} bytes does not fit a frame", data.len())))?;

    let mut out = Vec::with_capacity(HEADER_LEN + data.len() + TRAILER_LEN);
    out.extend_from_slice(&MAGIC);
    out.push(CODEC_VERSION);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(&checksum(data).to_le_bytes());
    Ok(out)
}

/// Unframes a snapshot, verifying magic, version, length and checksum.
///
/// # Errors
/// `InvalidData` on any mismatch, or if the declared length exceeds `max_len`.
pub fn decode(bytes: &[u8], max_len: usize) -> IoResult<String> {
    if bytes.len() < HEADER_LEN + TRAILER_LEN {
        return Err(invalid(format!("snapshot file truncated ({} bytes)", bytes.len())));
    }

    let (header, rest) = bytes.split_at(HEADER_LEN);
    if header[..4] != MAGIC {
        return Err(invalid(format!(
            "invalid magic bytes: expected {MAGIC:?}, got {:?}",
            &header[..4]
        )));
    }
    if header[4] != CODEC_VERSION {
        return Err(invalid(format!(
            "unsupported snapshot version: {} (expected {CODEC_VERSION})",
            header[4]
        )));
    }

    let len = u32::from_le_bytes([header[5], header[6], header[7], header[8]]) as usize;
    if len > max_len {
        return Err(invalid(format!("snapshot size {len} exceeds maximum {max_len}")));
    }
    if rest.len() != len + TRAILER_LEN {
        return Err(invalid(format!(
            "snapshot length mismatch: header says {len}, file holds {}",
            rest.len().saturating_sub(TRAILER_LEN)
        )));
    }

    let (data, trailer) = rest.split_at(len);
    let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let computed = checksum(data);
    if stored != computed {
        return Err(invalid(format!(
            "CRC mismatch: stored={stored:08x}, computed={computed:08x} (data corrupted)"
        )));
    }

    String::from_utf8(data.to_vec()).map_err(|e| invalid(format!("snapshot is not UTF-8: {e}")))
}
