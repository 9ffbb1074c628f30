//! Format-specific index and header readers.
//!
//! Each format pairs an [`crate::index::IndexFormat`] adapter for its binning
//! index with a reference-name resolver that reads the data file's own
//! header:
//!
//! - [`bam`] - BAI indexes and BAM headers
//! - [`bcf`] - CSI indexes and BCF headers

pub mod bam;
pub mod bcf;
