//! BGZF block parsing and virtual-address arithmetic.
//!
//! BGZF is gzip with a mandatory `BC` extra subfield advertising the
//! compressed block size, which allows random access into the stream.
//! Positions inside the uncompressed data are expressed as 64-bit virtual
//! addresses packing a compressed block offset and an offset into that
//! block's uncompressed payload.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

use crate::{Error, Result};

/// The maximum size of a BGZF block, compressed or uncompressed.
pub const MAX_BLOCK_SIZE: usize = 65536;

/// The fixed empty block terminating a well-formed BGZF stream.
pub const EOF_MARKER: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02, 0x00,
    0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const FLAG_FHCRC: u8 = 1 << 1;
const FLAG_FEXTRA: u8 = 1 << 2;
const FLAG_FNAME: u8 = 1 << 3;
const FLAG_FCOMMENT: u8 = 1 << 4;

/// A BGZF virtual address.  The upper 48 bits store the offset of the
/// compressed block inside the archive and the lower 16 bits store the data
/// offset inside the uncompressed block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address {
    /// The maximum valid virtual address, used to mean "end of stream".
    pub const LAST: Address = Address(u64::MAX);

    /// Packs a compressed block offset and an uncompressed data offset.
    pub fn new(block_offset: u64, data_offset: u16) -> Address {
        debug_assert!(block_offset < 1 << 48);
        Address(block_offset << 16 | u64::from(data_offset))
    }

    /// The offset to the start of the compressed block.
    pub fn block_offset(self) -> u64 {
        self.0 >> 16
    }

    /// The offset to the data in the uncompressed block.
    pub fn data_offset(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl From<u64> for Address {
    fn from(raw: u64) -> Address {
        Address(raw)
    }
}

impl From<Address> for u64 {
    fn from(address: Address) -> u64 {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(input: &str) -> Result<Address> {
        u64::from_str_radix(input, 16)
            .map(Address)
            .map_err(|e| Error::InvalidInput(format!("parsing address {input:?}: {e}")))
    }
}

/// A region between two virtual addresses inside a BGZF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub start: Address,
    pub end: Address,
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.start, self.end)
    }
}

/// Merges intersecting chunks.  Two chunks are not joined if their combined
/// size could exceed `size_limit`; a single chunk already larger than the
/// limit is passed through unsplit.
pub fn merge(mut chunks: Vec<Chunk>, size_limit: u64) -> Vec<Chunk> {
    chunks.sort_by_key(|chunk| chunk.start);

    let mut iter = chunks.into_iter();
    let Some(mut tail) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    for chunk in iter {
        let size = if chunk.end.block_offset() == tail.start.block_offset() {
            u64::from(chunk.end.data_offset()) - u64::from(tail.start.data_offset())
        } else {
            // Estimate using the maximum size for the last block.
            chunk.end.block_offset() - tail.start.block_offset() + MAX_BLOCK_SIZE as u64
        };

        if chunk.start <= tail.end && size <= size_limit {
            if tail.end < chunk.end {
                tail.end = chunk.end;
            }
        } else {
            merged.push(tail);
            tail = chunk;
        }
    }
    merged.push(tail);
    merged
}

/// Decodes a single BGZF block from `r` and returns the uncompressed data
/// and the total compressed block length.  Reads exactly one block; bytes
/// past the block are left in the reader.
pub fn decode_block<R: Read>(r: &mut R) -> Result<(Vec<u8>, u16)> {
    let mut fixed = [0u8; 12];
    r.read_exact(&mut fixed)
        .map_err(|e| Error::MalformedBlock(format!("reading gzip header: {e}")))?;
    if fixed[0] != 0x1f || fixed[1] != 0x8b || fixed[2] != 8 {
        return Err(Error::MalformedBlock("not a gzip member".to_string()));
    }

    let flags = fixed[3];
    if flags & FLAG_FEXTRA == 0 {
        return Err(Error::MalformedBlock("missing extra field".to_string()));
    }
    let extra_length = usize::from(u16::from_le_bytes([fixed[10], fixed[11]]));
    let mut extra = vec![0u8; extra_length];
    r.read_exact(&mut extra)
        .map_err(|e| Error::MalformedBlock(format!("reading extra field: {e}")))?;
    let bsize = block_size_subfield(&extra)?;

    let mut consumed = 12 + extra_length;
    if flags & FLAG_FNAME != 0 {
        consumed += skip_zero_terminated(r)?;
    }
    if flags & FLAG_FCOMMENT != 0 {
        consumed += skip_zero_terminated(r)?;
    }
    if flags & FLAG_FHCRC != 0 {
        let mut crc = [0u8; 2];
        r.read_exact(&mut crc)
            .map_err(|e| Error::MalformedBlock(format!("reading header checksum: {e}")))?;
        consumed += 2;
    }

    let data_length = (usize::from(bsize) + 1)
        .checked_sub(consumed + 8)
        .ok_or_else(|| Error::MalformedBlock(format!("impossible block size {bsize}")))?;
    let mut compressed = vec![0u8; data_length];
    r.read_exact(&mut compressed)
        .map_err(|e| Error::MalformedBlock(format!("reading compressed data: {e}")))?;

    let mut data = Vec::new();
    DeflateDecoder::new(&compressed[..])
        .take(MAX_BLOCK_SIZE as u64 + 1)
        .read_to_end(&mut data)
        .map_err(|e| Error::MalformedBlock(format!("decompressing data: {e}")))?;
    if data.len() > MAX_BLOCK_SIZE {
        return Err(Error::MalformedBlock("block data exceeds maximum size".to_string()));
    }

    let mut trailer = [0u8; 8];
    r.read_exact(&mut trailer)
        .map_err(|e| Error::MalformedBlock(format!("reading gzip trailer: {e}")))?;
    let mut crc = Crc::new();
    crc.update(&data);
    if crc.sum() != u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]) {
        return Err(Error::MalformedBlock("data checksum mismatch".to_string()));
    }
    if u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]) as usize != data.len() {
        return Err(Error::MalformedBlock("data length mismatch".to_string()));
    }

    Ok((data, bsize.wrapping_add(1)))
}

/// Returns a single BGZF block that encodes the bytes in `data`.
pub fn encode_block(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_BLOCK_SIZE {
        return Err(Error::BlockTooLarge(data.len()));
    }

    let mut block = vec![
        0x1f, 0x8b, 0x08, 0x04, // Magic, deflate, FEXTRA.
        0x00, 0x00, 0x00, 0x00, // Modification time.
        0x00, 0xff, // Extra flags, unknown OS.
        0x06, 0x00, // Length of the extra field.
        0x42, 0x43, 0x02, 0x00, // BC subfield header.
        0x00, 0x00, // BSIZE (filled in after compressing).
    ];

    let mut encoder = DeflateEncoder::new(block, Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::MalformedBlock(format!("writing compressed data: {e}")))?;
    block = encoder
        .finish()
        .map_err(|e| Error::MalformedBlock(format!("closing compressor: {e}")))?;

    let mut crc = Crc::new();
    crc.update(data);
    block.extend_from_slice(&crc.sum().to_le_bytes());
    block.extend_from_slice(&(data.len() as u32).to_le_bytes());

    if block.len() > MAX_BLOCK_SIZE {
        return Err(Error::BlockTooLarge(block.len()));
    }
    let bsize = block.len() - 1;
    block[16] = bsize as u8;
    block[17] = (bsize >> 8) as u8;
    Ok(block)
}

fn block_size_subfield(extra: &[u8]) -> Result<u16> {
    let mut rest = extra;
    while rest.len() >= 4 {
        let length = usize::from(u16::from_le_bytes([rest[2], rest[3]]));
        if rest[0] == b'B' && rest[1] == b'C' {
            if length != 2 || rest.len() < 6 {
                return Err(Error::MalformedBlock(format!(
                    "unexpected BC subfield length {length}"
                )));
            }
            return Ok(u16::from_le_bytes([rest[4], rest[5]]));
        }
        rest = rest.get(4 + length..).unwrap_or(&[]);
    }
    Err(Error::MalformedBlock("missing BC subfield".to_string()))
}

fn skip_zero_terminated<R: Read>(r: &mut R) -> Result<usize> {
    let mut skipped = 0;
    let mut byte = [0u8; 1];
    loop {
        r.read_exact(&mut byte)
            .map_err(|e| Error::MalformedBlock(format!("reading header string: {e}")))?;
        skipped += 1;
        if byte[0] == 0 {
            return Ok(skipped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunks(input: &str) -> Vec<Chunk> {
        input
            .split(',')
            .map(|chunk| {
                let (start, end) = chunk.split_once('-').expect("bad chunk string");
                Chunk {
                    start: start.parse().unwrap(),
                    end: end.parse().unwrap(),
                }
            })
            .collect()
    }

    #[test]
    fn test_address_round_trip() {
        let cases = [
            ("ffffffffffffffff", 0x0000_ffff_ffff_ffff, 0xffff),
            ("ffff0000", 0xffff, 0x0000),
            ("0", 0, 0),
        ];
        for (input, block, data) in cases {
            let address: Address = input.parse().unwrap();
            assert_eq!(address.block_offset(), block, "block offset of {input}");
            assert_eq!(address.data_offset(), data, "data offset of {input}");
            assert_eq!(address.to_string(), input);
        }
    }

    #[test]
    fn test_address_rejects_invalid_input() {
        for input in ["-0", "ffffffffffffffffffff", "g", ""] {
            assert!(input.parse::<Address>().is_err(), "parsed {input:?}");
        }
    }

    #[test]
    fn test_address_packs_offsets() {
        let address = Address::new(0x1249, 0x5000);
        assert_eq!(u64::from(address), 0x1249_5000);
        assert_eq!(address.block_offset(), 0x1249);
        assert_eq!(address.data_offset(), 0x5000);
    }

    #[test]
    fn test_merge_folds_intersecting_chunks() {
        let cases = [
            ("three chunks, all overlapping", 1024, "0-10,10-40,40-80", "0-80"),
            ("one not overlapping", 1024, "0-10,20-40,40-80", "0-10,20-80"),
            ("unsorted but mergeable", 1024, "40-80,10-40,0-10", "0-80"),
            ("same block, too large", 32768, "0-8000,9000-a000", "0-8000,9000-a000"),
            ("same block, exactly small enough", 32768, "0-7000,7000-8000", "0-8000"),
            (
                "different blocks, ok to merge",
                64 * 1024 + 4096,
                "00000000-00008000,00008000-10000000",
                "0-10000000",
            ),
            (
                "different blocks, too big",
                64 * 1024 + 4096 - 1,
                "00000000-00008000,00008000-10000000",
                "0-8000,8000-10000000",
            ),
        ];
        for (name, limit, input, want) in cases {
            let got = merge(chunks(input), limit);
            assert_eq!(got, chunks(want), "{name}");
            assert_eq!(merge(got.clone(), limit), got, "{name}: merge not idempotent");
        }
    }

    #[test]
    fn test_merge_of_nothing_is_nothing() {
        assert!(merge(Vec::new(), 1024).is_empty());
    }

    #[test]
    fn test_encode_empty_block_yields_eof_marker() {
        assert_eq!(encode_block(&[]).unwrap(), EOF_MARKER);
    }

    #[test]
    fn test_encode_enforces_size_limit() {
        assert!(encode_block(&vec![0u8; MAX_BLOCK_SIZE]).is_ok());
        assert!(matches!(
            encode_block(&vec![0u8; MAX_BLOCK_SIZE + 1]),
            Err(Error::BlockTooLarge(_))
        ));
    }

    #[test]
    fn test_decode_inverts_encode() {
        let patterned: Vec<u8> = (0..10_000u32).map(|i| (i * 7 + 3) as u8).collect();
        let payloads: [&[u8]; 4] = [b"", b"hello, world", &patterned, &[0u8; MAX_BLOCK_SIZE]];
        for payload in payloads {
            let block = encode_block(payload).unwrap();
            let (data, length) = decode_block(&mut Cursor::new(&block)).unwrap();
            assert_eq!(data, payload);
            assert_eq!(usize::from(length), block.len());
        }
    }

    #[test]
    fn test_decode_reads_consecutive_blocks() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&encode_block(b"first").unwrap());
        stream.extend_from_slice(&encode_block(b"second").unwrap());
        stream.extend_from_slice(&EOF_MARKER);

        let mut r = Cursor::new(stream);
        assert_eq!(decode_block(&mut r).unwrap().0, b"first");
        assert_eq!(decode_block(&mut r).unwrap().0, b"second");
        let (data, length) = decode_block(&mut r).unwrap();
        assert!(data.is_empty());
        assert_eq!(length, 28);
        assert!(decode_block(&mut r).is_err());
    }

    #[test]
    fn test_decode_rejects_plain_gzip() {
        let mut plain = Vec::new();
        let mut encoder = flate2::GzBuilder::new().write(&mut plain, Compression::default());
        encoder.write_all(b"no extra field here").unwrap();
        encoder.finish().unwrap();

        assert!(matches!(
            decode_block(&mut Cursor::new(plain)),
            Err(Error::MalformedBlock(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_subfield() {
        let mut block = encode_block(b"payload").unwrap();
        block[12] = b'X';
        block[13] = b'Y';
        assert!(matches!(
            decode_block(&mut Cursor::new(block)),
            Err(Error::MalformedBlock(_))
        ));
    }

    #[test]
    fn test_decode_rejects_corrupt_data() {
        let mut block = encode_block(b"some reasonably long payload").unwrap();
        block[20] ^= 0xff;
        assert!(matches!(
            decode_block(&mut Cursor::new(block)),
            Err(Error::MalformedBlock(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_block() {
        let block = encode_block(b"payload").unwrap();
        let truncated = &block[..block.len() / 2];
        assert!(matches!(
            decode_block(&mut Cursor::new(truncated)),
            Err(Error::MalformedBlock(_))
        ));
    }
}
