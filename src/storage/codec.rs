//! Framed, block-compressed payloads.
//!
//! A frame is a fixed header followed by LZ4 blocks. All integers are little
//! endian.
//!
//! ```text
//! magic        [u8; 4]
//! version      u16
//! record_count u64
//! arity        u32   values per record, 0 when records are not fixed-width
//! payload_len  u64   total decoded bytes
//! block_size   u32   decoded bytes per block (the last block may be shorter)
//! block_count  u32
//! checksum     u32   CRC32 of the decoded payload
//! block*       raw_len u32 | compressed_len u32 | compressed bytes
//! ```
//!
//! Readers never trust a length field further than the header's own
//! consistency checks and the configured payload limit allow.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::warn;

use crate::error::{Result, TesseraError};
use crate::storage::PersistenceConfig;

/// Current frame format version.
pub const FORMAT_VERSION: u16 = 1;

/// Largest block size a reader accepts (64 MiB).
pub const MAX_BLOCK_SIZE: u32 = 64 << 20;

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub record_count: u64,
    pub arity: u32,
    pub payload_len: u64,
    pub block_size: u32,
    pub block_count: u32,
    pub checksum: u32,
}

/// Worst-case LZ4 output size for `len` input bytes.
fn compress_bound(len: usize) -> usize {
    len + len / 255 + 16
}

/// Encode `payload` as a frame.
pub fn write_frame<W: Write>(
    output: &mut W,
    magic: [u8; 4],
    record_count: u64,
    arity: u32,
    payload: &[u8],
    block_size: usize,
) -> Result<()> {
    if block_size == 0 || block_size > MAX_BLOCK_SIZE as usize {
        return Err(TesseraError::invalid_argument(format!(
            "block size must be between 1 and {MAX_BLOCK_SIZE} bytes, got {block_size}"
        )));
    }

    let block_count = u32::try_from(payload.len().div_ceil(block_size)).map_err(|_| {
        TesseraError::resource_exhausted("payload needs more blocks than a frame can describe")
    })?;

    output.write_all(&magic)?;
    output.write_u16::<LittleEndian>(FORMAT_VERSION)?;
    output.write_u64::<LittleEndian>(record_count)?;
    output.write_u32::<LittleEndian>(arity)?;
    output.write_u64::<LittleEndian>(payload.len() as u64)?;
    output.write_u32::<LittleEndian>(block_size as u32)?;
    output.write_u32::<LittleEndian>(block_count)?;
    output.write_u32::<LittleEndian>(crc32fast::hash(payload))?;

    for block in payload.chunks(block_size) {
        let compressed = lz4::block::compress(block, None, false)?;
        output.write_u32::<LittleEndian>(block.len() as u32)?;
        output.write_u32::<LittleEndian>(compressed.len() as u32)?;
        output.write_all(&compressed)?;
    }

    Ok(())
}

/// Decode a frame, checking its structure against `expected_magic` and
/// `config`.
pub fn read_frame<R: Read>(
    input: &mut R,
    expected_magic: [u8; 4],
    config: &PersistenceConfig,
) -> Result<(FrameHeader, Vec<u8>)> {
    let header = read_header(input)?;
    validate_header(&header, expected_magic, config)?;

    let mut payload = Vec::new();
    let mut hasher = crc32fast::Hasher::new();
    let mut remaining = header.payload_len;

    for block_index in 0..header.block_count {
        let raw_len = input.read_u32::<LittleEndian>().map_err(truncated)?;
        let compressed_len = input.read_u32::<LittleEndian>().map_err(truncated)?;

        if raw_len == 0 || raw_len > header.block_size || raw_len as u64 > remaining {
            return Err(TesseraError::corrupt_data(format!(
                "block {block_index} declares an invalid size of {raw_len} bytes"
            )));
        }
        if compressed_len as usize > compress_bound(raw_len as usize) {
            return Err(TesseraError::corrupt_data(format!(
                "block {block_index}: {compressed_len} compressed bytes for {raw_len} raw bytes"
            )));
        }

        let mut compressed = vec![0u8; compressed_len as usize];
        input.read_exact(&mut compressed).map_err(truncated)?;

        let block = lz4::block::decompress(&compressed, Some(raw_len as i32)).map_err(|e| {
            TesseraError::corrupt_data(format!("block {block_index} failed to decompress: {e}"))
        })?;
        if block.len() != raw_len as usize {
            return Err(TesseraError::corrupt_data(format!(
                "block {block_index} decompressed to {} bytes, expected {raw_len}",
                block.len()
            )));
        }

        hasher.update(&block);
        payload.extend_from_slice(&block);
        remaining -= raw_len as u64;
    }

    if remaining != 0 {
        return Err(TesseraError::corrupt_data(format!(
            "blocks are {remaining} bytes short of the declared payload"
        )));
    }

    let mut trailing = [0u8; 1];
    if input.read(&mut trailing)? != 0 {
        return Err(TesseraError::corrupt_data(
            "unexpected bytes after the last block",
        ));
    }

    let checksum = hasher.finalize();
    if checksum != header.checksum {
        warn!(
            expected = header.checksum,
            actual = checksum,
            "frame checksum mismatch"
        );
        return Err(TesseraError::corrupt_data("payload checksum mismatch"));
    }

    Ok((header, payload))
}

fn read_header<R: Read>(input: &mut R) -> Result<FrameHeader> {
    let mut magic = [0u8; 4];
    input.read_exact(&mut magic).map_err(truncated)?;

    Ok(FrameHeader {
        magic,
        version: input.read_u16::<LittleEndian>().map_err(truncated)?,
        record_count: input.read_u64::<LittleEndian>().map_err(truncated)?,
        arity: input.read_u32::<LittleEndian>().map_err(truncated)?,
        payload_len: input.read_u64::<LittleEndian>().map_err(truncated)?,
        block_size: input.read_u32::<LittleEndian>().map_err(truncated)?,
        block_count: input.read_u32::<LittleEndian>().map_err(truncated)?,
        checksum: input.read_u32::<LittleEndian>().map_err(truncated)?,
    })
}

fn validate_header(
    header: &FrameHeader,
    expected_magic: [u8; 4],
    config: &PersistenceConfig,
) -> Result<()> {
    if header.magic != expected_magic {
        return Err(TesseraError::corrupt_data(format!(
            "unexpected magic {:?}, expected {:?}",
            header.magic, expected_magic
        )));
    }
    if header.version != FORMAT_VERSION {
        return Err(TesseraError::corrupt_data(format!(
            "unsupported format version {}",
            header.version
        )));
    }
    if header.payload_len > config.max_payload_bytes {
        return Err(TesseraError::resource_exhausted(format!(
            "payload of {} bytes exceeds the limit of {} bytes",
            header.payload_len, config.max_payload_bytes
        )));
    }
    if header.block_size == 0 || header.block_size > MAX_BLOCK_SIZE {
        return Err(TesseraError::corrupt_data(format!(
            "invalid block size {}",
            header.block_size
        )));
    }

    let expected_blocks = header.payload_len.div_ceil(header.block_size as u64);
    if header.block_count as u64 != expected_blocks {
        return Err(TesseraError::corrupt_data(format!(
            "{} blocks declared, {} bytes of payload need {}",
            header.block_count, header.payload_len, expected_blocks
        )));
    }

    Ok(())
}

fn truncated(err: io::Error) -> TesseraError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        TesseraError::corrupt_data("file is truncated")
    } else {
        TesseraError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::ErrorKind;

    const MAGIC: [u8; 4] = *b"TEST";
    const HEADER_LEN: usize = 38;

    fn sample_payload() -> Vec<u8> {
        (0..10_000u32)
            .flat_map(|i| (i % 251).to_le_bytes())
            .collect()
    }

    fn encode(payload: &[u8], block_size: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_frame(&mut bytes, MAGIC, 7, 3, payload, block_size).unwrap();
        bytes
    }

    fn decode(bytes: Vec<u8>) -> Result<(FrameHeader, Vec<u8>)> {
        let config = PersistenceConfig::default();
        read_frame(&mut Cursor::new(bytes), MAGIC, &config)
    }

    #[test]
    fn test_multi_block_frame() {
        let payload = sample_payload();
        let bytes = encode(&payload, 4096);

        let (header, decoded) = decode(bytes).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(header.record_count, 7);
        assert_eq!(header.arity, 3);
        assert_eq!(header.block_count, 10);
    }

    #[test]
    fn test_empty_payload() {
        let bytes = encode(&[], 16);
        assert_eq!(bytes.len(), HEADER_LEN);
        let (header, decoded) = decode(bytes).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(header.block_count, 0);
    }

    #[test]
    fn test_wrong_magic() {
        let bytes = encode(&sample_payload(), 4096);
        let config = PersistenceConfig::default();
        let err = read_frame(&mut Cursor::new(bytes), *b"NOPE", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_truncated_frame() {
        let mut bytes = encode(&sample_payload(), 4096);
        bytes.truncate(bytes.len() - 10);
        let err = decode(bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);

        let err = decode(vec![b'T', b'E']).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode(&sample_payload(), 4096);
        bytes.push(0);
        let err = decode(bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_oversized_header_rejected_before_allocation() {
        let mut bytes = encode(&sample_payload(), 4096);
        // payload_len sits after magic, version, record_count and arity
        bytes[18..26].copy_from_slice(&u64::MAX.to_le_bytes());
        let err = decode(bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn test_payload_limit_is_configurable() {
        let bytes = encode(&sample_payload(), 4096);
        let config = PersistenceConfig {
            max_payload_bytes: 1024,
            ..PersistenceConfig::default()
        };
        let err = read_frame(&mut Cursor::new(bytes), MAGIC, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn test_inconsistent_block_count() {
        let mut bytes = encode(&sample_payload(), 4096);
        // block_count follows payload_len and block_size
        bytes[30..34].copy_from_slice(&3u32.to_le_bytes());
        let err = decode(bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_flipped_payload_byte_detected() {
        let mut bytes = encode(&sample_payload(), 4096);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = decode(bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_invalid_block_size_on_write() {
        let mut bytes = Vec::new();
        assert!(write_frame(&mut bytes, MAGIC, 0, 0, &[1, 2, 3], 0).is_err());
    }
}
