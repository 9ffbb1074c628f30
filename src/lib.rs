//! # htsgetd
//!
//! A Rust implementation of the [htsget protocol](https://samtools.github.io/hts-specs/htsget.html)
//! for serving slices of BAM and BCF files held in an object store.
//!
//! ## Overview
//!
//! htsget works in two phases:
//!
//! 1. **Ticket request** - the client asks for alignments overlapping a
//!    genomic region and receives a JSON "ticket" listing URLs
//! 2. **Block fetch** - the client fetches each URL and concatenates the
//!    bodies byte-for-byte into a valid BAM (or BCF) stream
//!
//! Translating a region into URLs means reading the file's binning index
//! ([BAI](https://samtools.github.io/hts-specs/SAMv1.pdf) or
//! [CSI](https://samtools.github.io/hts-specs/CSIv1.pdf)) to find the BGZF
//! chunks covering the region, merging them into transfer-sized ranges, and
//! later re-serving each range as a self-contained BGZF stream.  The partial
//! blocks at either end of a range are decoded and re-compressed; everything
//! in between streams straight from storage.
//!
//! ## Architecture
//!
//! - [`config`] - Server configuration and CLI arguments
//! - [`error`] - Error types mapping to htsget protocol errors
//! - [`types`] - Ticket and query types per the htsget spec
//! - [`bgzf`] - BGZF codec and virtual-address arithmetic
//! - [`index`] - Generic CSI-style binning index engine
//! - [`formats`] - BAI/BAM and CSI/BCF adapters
//! - [`block`] - Streaming chunk reassembly
//! - [`handlers`] - HTTP endpoint handlers
//! - [`storage`] - Object store abstraction

pub mod bgzf;
pub(crate) mod binary;
pub mod block;
pub mod config;
pub mod error;
pub mod formats;
pub mod handlers;
pub mod index;
pub mod region;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
