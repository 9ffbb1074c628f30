//! BCF header and CSI index parsing.

use std::io::{BufRead, BufReader, Read};

use flate2::read::MultiGzDecoder;

use crate::bgzf::Chunk;
use crate::binary;
use crate::index::{self, Bin, IndexFormat};
use crate::region::Region;
use crate::{Error, Result};

const CSI_MAGIC: &[u8] = b"CSI\x01";
const BCF_MAGIC: &[u8] = b"BCF\x02\x02";

/// The CSI flavor of the binning index: the scheme size travels in the file
/// header, each bin records the virtual offset of its first record, and
/// there is no linear index.
pub struct Csi;

impl IndexFormat for Csi {
    fn magic(&self) -> &'static [u8] {
        CSI_MAGIC
    }

    fn read_scheme_size<R: Read>(&self, r: &mut R) -> Result<(i32, i32)> {
        let min_shift = binary::read_i32(r)
            .map_err(|e| Error::MalformedIndex(format!("reading scheme size: {e}")))?;
        let depth = binary::read_i32(r)
            .map_err(|e| Error::MalformedIndex(format!("reading scheme size: {e}")))?;
        let aux_length = binary::read_i32(r)
            .map_err(|e| Error::MalformedIndex(format!("reading auxiliary length: {e}")))?;
        if aux_length < 0 {
            return Err(Error::MalformedIndex(format!(
                "invalid auxiliary length ({aux_length} bytes)"
            )));
        }
        binary::skip(r, aux_length as u64)
            .map_err(|e| Error::MalformedIndex(format!("reading past auxiliary data: {e}")))?;
        Ok((min_shift, depth))
    }

    fn read_bin<R: Read>(&self, r: &mut R) -> Result<Bin> {
        let id = binary::read_u32(r)
            .map_err(|e| Error::MalformedIndex(format!("reading bin header: {e}")))?;
        let offset = binary::read_u64(r)
            .map_err(|e| Error::MalformedIndex(format!("reading bin header: {e}")))?;
        let chunk_count = binary::read_i32(r)
            .map_err(|e| Error::MalformedIndex(format!("reading bin header: {e}")))?;
        Ok(Bin {
            id,
            offset,
            chunk_count,
        })
    }

    fn is_virtual_bin(&self, _: u32) -> bool {
        false
    }

    fn select_chunks<R: Read>(
        &self,
        _: &mut R,
        _: &Region,
        candidates: Vec<Chunk>,
        selected: &mut Vec<Chunk>,
    ) -> Result<()> {
        selected.extend(candidates);
        Ok(())
    }
}

/// Reads CSI index data from `r` and returns a set of BGZF chunks covering
/// the header and all records that fall inside `region`.  The first chunk is
/// always the BCF header.  CSI files are themselves BGZF streams.
pub fn read_index<R: Read>(r: R, region: &Region) -> Result<Vec<Chunk>> {
    let mut csi = MultiGzDecoder::new(r);
    index::read_index(&mut csi, region, &Csi)
}

/// Determines the ID for the named contig by scanning `##contig` lines in
/// the BCF header.  An explicit `IDX` field wins over the contig's position
/// in the header.
pub fn reference_id<R: Read>(r: R, reference: &str) -> Result<i32> {
    let mut bcf = MultiGzDecoder::new(r);

    match binary::check_magic(&mut bcf, BCF_MAGIC) {
        Ok(true) => {}
        Ok(false) => return Err(Error::BadMagic("not a BCF stream".to_string())),
        Err(e) => return Err(Error::MalformedHeader(format!("reading magic: {e}"))),
    }

    let text_length = binary::read_u32(&mut bcf)
        .map_err(|e| Error::MalformedHeader(format!("reading header length: {e}")))?;

    let header = BufReader::new(bcf.take(u64::from(text_length)));
    let mut id = 0;
    for line in header.lines() {
        let line = line.map_err(|e| Error::MalformedHeader(format!("scanning header: {e}")))?;
        if line.starts_with("##contig") {
            if contig_field(&line, "ID") == Some(reference) {
                if let Some(idx) = contig_idx(&line)? {
                    return Ok(idx);
                }
                return Ok(id);
            }
            id += 1;
        } else if id > 0 {
            break;
        }
    }
    Err(Error::ReferenceNotFound(reference.to_string()))
}

/// Extracts the value of the named `key=value` field from a header line.
/// The match must sit at the start of a field, i.e. directly after a `<` or
/// `,` delimiter.
fn contig_field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let field = format!("{name}=");
    let mut input = line;
    loop {
        let start = input.find(&field)?;
        let rest = &input[start + field.len()..];
        if start > 0 && !is_delimiter(input.as_bytes()[start - 1]) {
            input = rest;
            continue;
        }
        return match rest.find([',', '>']) {
            Some(end) if end > 0 => Some(&rest[..end]),
            _ => Some(rest),
        };
    }
}

fn is_delimiter(c: u8) -> bool {
    c == b',' || c == b'<'
}

fn contig_idx(line: &str) -> Result<Option<i32>> {
    match contig_field(line, "IDX") {
        None | Some("") => Ok(None),
        Some(idx) => idx
            .parse()
            .map(Some)
            .map_err(|e| Error::MalformedHeader(format!("parsing IDX: {e}"))),
    }
}
