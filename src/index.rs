//! Generic reader for CSI-style hierarchical binning indexes.
//!
//! BAI and CSI share the same overall layout: per reference, a list of bins
//! each holding BGZF chunks, with format-specific framing around them.  The
//! engine here walks that layout and leaves the format differences to an
//! [`IndexFormat`] implementation.

use std::io::Read;

use crate::bgzf::{Address, Chunk};
use crate::binary;
use crate::region::Region;
use crate::{Error, Result};

/// A bin holding chunks for a contiguous genomic region.
#[derive(Debug, Clone, Copy)]
pub struct Bin {
    /// The bin identifier.
    pub id: u32,
    /// The (virtual) file offset of the first overlapping record; zero when
    /// the format does not record one.
    pub offset: u64,
    /// The number of chunks in the bin.
    pub chunk_count: i32,
}

/// Format-specific operations needed to read one flavor of binning index.
pub trait IndexFormat {
    /// The magic bytes opening the index.
    fn magic(&self) -> &'static [u8];

    /// Reads the binning scheme size: the number of bits for the minimal
    /// interval and the depth of the index.
    fn read_scheme_size<R: Read>(&self, r: &mut R) -> Result<(i32, i32)>;

    /// Reads a bin header.
    fn read_bin<R: Read>(&self, r: &mut R) -> Result<Bin>;

    /// Reports whether `id` identifies a virtual bin used to store metadata
    /// rather than record chunks.
    fn is_virtual_bin(&self, id: u32) -> bool;

    /// Folds the candidate chunks for one reference into `selected`,
    /// consuming any per-reference trailer from `r`.
    fn select_chunks<R: Read>(
        &self,
        r: &mut R,
        region: &Region,
        candidates: Vec<Chunk>,
        selected: &mut Vec<Chunk>,
    ) -> Result<()>;
}

/// Reads index data from `r` and returns a set of BGZF chunks covering the
/// header and all mapped reads that fall inside `region`.  The first chunk
/// always covers the header of the indexed file.
pub fn read_index<R: Read, F: IndexFormat>(
    r: &mut R,
    region: &Region,
    format: &F,
) -> Result<Vec<Chunk>> {
    match binary::check_magic(r, format.magic()) {
        Ok(true) => {}
        Ok(false) => return Err(Error::BadMagic("unrecognized index magic".to_string())),
        Err(e) => return Err(Error::MalformedIndex(format!("reading magic: {e}"))),
    }

    let (min_shift, depth) = format.read_scheme_size(r)?;
    let bins = bins_for_range(region.start, region.end, min_shift, depth);

    let references = binary::read_i32(r)
        .map_err(|e| Error::MalformedIndex(format!("reading reference count: {e}")))?;
    if references < 0 {
        return Err(Error::MalformedIndex(format!(
            "invalid reference count ({references})"
        )));
    }

    let mut header = Chunk {
        start: Address::default(),
        end: Address::LAST,
    };
    let mut selected = Vec::new();

    for reference_id in 0..references {
        let bin_count = binary::read_i32(r)
            .map_err(|e| Error::MalformedIndex(format!("reading bin count: {e}")))?;
        if bin_count < 0 {
            return Err(Error::MalformedIndex(format!(
                "invalid bin count ({bin_count})"
            )));
        }

        let mut candidates = Vec::new();
        for _ in 0..bin_count {
            let bin = format.read_bin(r)?;
            if bin.chunk_count < 0 {
                return Err(Error::MalformedIndex(format!(
                    "invalid chunk count ({})",
                    bin.chunk_count
                )));
            }

            let include = region_contains_bin(region, reference_id, bin.id, &bins);
            for _ in 0..bin.chunk_count {
                let chunk = read_chunk(r)?;
                if format.is_virtual_bin(bin.id) {
                    continue;
                }
                if include && chunk.end >= Address::from(bin.offset) {
                    candidates.push(chunk);
                }
                if header.end > chunk.start {
                    header.end = chunk.start;
                }
            }
        }

        format.select_chunks(r, region, candidates, &mut selected)?;
    }

    let mut chunks = Vec::with_capacity(selected.len() + 1);
    chunks.push(header);
    chunks.extend(selected);
    Ok(chunks)
}

fn read_chunk<R: Read>(r: &mut R) -> Result<Chunk> {
    let start = binary::read_u64(r)
        .map_err(|e| Error::MalformedIndex(format!("reading chunk: {e}")))?;
    let end = binary::read_u64(r)
        .map_err(|e| Error::MalformedIndex(format!("reading chunk: {e}")))?;
    Ok(Chunk {
        start: Address::from(start),
        end: Address::from(end),
    })
}

/// Returns the identifiers of all bins that may contain records overlapping
/// the half-open base-pair range `[start, end)`.
///
/// This is derived from the C examples in the CSI index specification.
pub fn bins_for_range(start: u32, end: u32, min_shift: i32, depth: i32) -> Vec<u16> {
    let max_width = max_bin_width(min_shift, depth);
    let mut end = end;
    if end == 0 || end > max_width {
        end = max_width;
    }
    if end <= start || start > max_width {
        return Vec::new();
    }

    let end = end - 1;
    let mut bins = Vec::new();
    let mut level_offset: u64 = 0;
    for level in 0..=depth {
        let shift = (min_shift + 3 * (depth - level)) as u32;
        let first = level_offset + (u64::from(start) >> shift);
        let last = level_offset + (u64::from(end) >> shift);
        bins.extend((first..=last).map(|id| id as u16));
        level_offset += 1 << (3 * level);
    }
    bins
}

/// The width in base pairs of the scheme's widest bin.
pub fn max_bin_width(min_shift: i32, depth: i32) -> u32 {
    (1u64 << (min_shift + depth * 3)) as u32
}

/// Reports whether chunks from the given bin can hold records that overlap
/// `region`.
pub fn region_contains_bin(
    region: &Region,
    reference_id: i32,
    bin_id: u32,
    bins: &[u16],
) -> bool {
    if region.reference_id >= 0 && reference_id != region.reference_id {
        return false;
    }

    if region.start == 0 && region.end == 0 {
        return true;
    }

    bins.iter().any(|&id| u32::from(id) == bin_id)
}
