//! Storage backend abstraction for genomic data objects.
//!
//! Data files and their indexes live in an opaque object store addressed by
//! bucket and object name.  The server only ever needs ranged reads, so the
//! seam is a single trait; a cloud backend would implement it the same way
//! [`LocalStore`] does for the filesystem.

mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

use crate::Result;

/// A readable byte stream returned from the store.  Dropping the stream
/// releases the underlying handle.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Ranged read access to objects in a storage backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Opens a reader over `[offset, offset + length)` of the object.  A
    /// `length` of `None` reads to the end of the object.  Reads may return
    /// fewer bytes than requested when the range extends past the object.
    async fn open_range(
        &self,
        bucket: &str,
        object: &str,
        offset: u64,
        length: Option<u64>,
    ) -> Result<ByteStream>;
}
