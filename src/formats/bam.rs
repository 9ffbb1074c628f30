//! BAM header and BAI index parsing.

use std::io::Read;

use flate2::read::MultiGzDecoder;

use crate::bgzf::{Address, Chunk};
use crate::binary;
use crate::index::{self, Bin, IndexFormat};
use crate::region::Region;
use crate::{Error, Result};

const BAI_MAGIC: &[u8] = b"BAI\x01";
const BAM_MAGIC: &[u8] = b"BAM\x01";

// This ID is used as a virtual bin ID for (unused) chunk metadata.
const METADATA_BIN_ID: u32 = 37450;

// This is just to prevent arbitrarily long allocations due to malformed
// data.  No reference name is longer than this in practice.
const MAXIMUM_NAME_LENGTH: i32 = 1024;

// The size of each tiling window from the linear index, as specified in the
// SAM specification section 5.1.3.
const LINEAR_WINDOW_SIZE: u32 = 1 << 14;

/// The BAI flavor of the binning index: a fixed 6-level scheme with a
/// 14-bit minimum interval, a metadata pseudo-bin, and a linear index
/// trailing each reference.
pub struct Bai;

impl IndexFormat for Bai {
    fn magic(&self) -> &'static [u8] {
        BAI_MAGIC
    }

    fn read_scheme_size<R: Read>(&self, _: &mut R) -> Result<(i32, i32)> {
        Ok((14, 5))
    }

    fn read_bin<R: Read>(&self, r: &mut R) -> Result<Bin> {
        let id = binary::read_u32(r)
            .map_err(|e| Error::MalformedIndex(format!("reading bin header: {e}")))?;
        let chunk_count = binary::read_i32(r)
            .map_err(|e| Error::MalformedIndex(format!("reading bin header: {e}")))?;
        Ok(Bin {
            id,
            offset: 0,
            chunk_count,
        })
    }

    fn is_virtual_bin(&self, id: u32) -> bool {
        id == METADATA_BIN_ID
    }

    fn select_chunks<R: Read>(
        &self,
        r: &mut R,
        region: &Region,
        candidates: Vec<Chunk>,
        selected: &mut Vec<Chunk>,
    ) -> Result<()> {
        let intervals = binary::read_i32(r)
            .map_err(|e| Error::MalformedIndex(format!("reading interval count: {e}")))?;
        if intervals < 0 {
            return Err(Error::MalformedIndex(format!(
                "invalid interval count ({intervals} intervals)"
            )));
        }

        let mut offsets = Vec::new();
        for _ in 0..intervals {
            let offset = binary::read_u64(r)
                .map_err(|e| Error::MalformedIndex(format!("reading offsets: {e}")))?;
            offsets.push(offset);
        }

        let window = (region.start / LINEAR_WINDOW_SIZE) as usize;
        let first_read_offset = offsets
            .get(window)
            .map(|&offset| Address::from(offset))
            .unwrap_or_default();

        selected.extend(
            candidates
                .into_iter()
                .filter(|chunk| chunk.end >= first_read_offset),
        );
        Ok(())
    }
}

/// Reads BAI index data from `r` and returns a set of BGZF chunks covering
/// the header and all mapped reads that fall inside `region`.  The first
/// chunk is always the BAM header.
pub fn read_index<R: Read>(r: R, region: &Region) -> Result<Vec<Chunk>> {
    let mut r = r;
    index::read_index(&mut r, region, &Bai)
}

/// Determines the ID for the named genomic reference by reading BAM header
/// data from `r`.
pub fn reference_id<R: Read>(r: R, reference: &str) -> Result<i32> {
    let mut bam = MultiGzDecoder::new(r);

    match binary::check_magic(&mut bam, BAM_MAGIC) {
        Ok(true) => {}
        Ok(false) => return Err(Error::BadMagic("not a BAM stream".to_string())),
        Err(e) => return Err(Error::MalformedHeader(format!("reading magic: {e}"))),
    }

    let text_length = binary::read_i32(&mut bam)
        .map_err(|e| Error::MalformedHeader(format!("reading SAM header length: {e}")))?;
    if text_length < 0 {
        return Err(Error::MalformedHeader(format!(
            "invalid SAM header length ({text_length} bytes)"
        )));
    }
    binary::skip(&mut bam, text_length as u64)
        .map_err(|e| Error::MalformedHeader(format!("reading past SAM header: {e}")))?;

    let count = binary::read_i32(&mut bam)
        .map_err(|e| Error::MalformedHeader(format!("reading reference count: {e}")))?;
    for id in 0..count {
        let name_length = binary::read_i32(&mut bam)
            .map_err(|e| Error::MalformedHeader(format!("reading name length: {e}")))?;
        // The name length includes a null terminating character.
        if !(1..=MAXIMUM_NAME_LENGTH).contains(&name_length) {
            return Err(Error::MalformedHeader(format!(
                "invalid name length ({name_length} bytes)"
            )));
        }
        let mut name = vec![0u8; name_length as usize];
        bam.read_exact(&mut name)
            .map_err(|e| Error::MalformedHeader(format!("reading name: {e}")))?;
        if name[..name.len() - 1] == *reference.as_bytes() {
            return Ok(id);
        }
        binary::skip(&mut bam, 4)
            .map_err(|e| Error::MalformedHeader(format!("reading reference length: {e}")))?;
    }
    Err(Error::ReferenceNotFound(reference.to_string()))
}
