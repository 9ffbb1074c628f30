//! Genomic region values.

use std::fmt;

/// A region of genomic interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// The reference to match.  If negative, any reference matches.
    pub reference_id: i32,
    /// Half-open range (in base pairs) relative to the reference.  A zero
    /// `end` is treated as though it was set to the last possible read
    /// position; a region with both endpoints zero covers the entire
    /// reference.
    pub start: u32,
    pub end: u32,
}

impl Region {
    /// The region matching all mapped reads.
    pub const ALL_MAPPED_READS: Region = Region {
        reference_id: -1,
        start: 0,
        end: 0,
    };
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.reference_id, self.start, self.end)
    }
}
