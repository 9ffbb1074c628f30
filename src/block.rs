//! Reassembly of BGZF streams from chunk byte ranges.
//!
//! A chunk's endpoints are virtual addresses, so the chunk usually begins
//! and ends in the middle of a compressed block.  The reassembler re-encodes
//! those two partial blocks and streams every block in between straight from
//! storage, so the output is a valid BGZF stream whose uncompressed payload
//! is exactly the requested range.

use std::collections::VecDeque;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::bgzf::{self, Chunk, MAX_BLOCK_SIZE};
use crate::storage::{ByteStream, ObjectStore};
use crate::{Error, Result};

/// Produces a BGZF stream covering `chunk` of the named object.  At most the
/// first and last partial blocks are held in memory; intermediate blocks are
/// streamed from storage verbatim.
pub async fn read_block(
    store: &dyn ObjectStore,
    bucket: &str,
    object: &str,
    chunk: Chunk,
) -> Result<MultiReader> {
    let (start, end) = (chunk.start, chunk.end);
    let mut head = start.block_offset();
    let tail = end.block_offset();

    // The simple (unlikely) case is when the chunk resides in a single block.
    if head == tail {
        let (decoded, _) = fetch_block(store, bucket, object, head).await?;
        let data = decoded
            .get(usize::from(start.data_offset())..usize::from(end.data_offset()))
            .ok_or_else(|| {
                Error::MalformedBlock(format!("chunk {chunk} exceeds decoded block size"))
            })?;
        let encoded = bgzf::encode_block(data)?;
        return Ok(MultiReader::new(vec![Box::pin(Cursor::new(encoded))]));
    }

    let mut parts: Vec<ByteStream> = Vec::with_capacity(3);

    // Reconstruct a prefix block holding the tail of the first block's data.
    if start.data_offset() != 0 {
        let (decoded, length) = fetch_block(store, bucket, object, head).await?;
        head += u64::from(length);
        let data = decoded
            .get(usize::from(start.data_offset())..)
            .ok_or_else(|| {
                Error::MalformedBlock(format!("chunk {chunk} exceeds decoded block size"))
            })?;
        let encoded = bgzf::encode_block(data)?;
        parts.push(Box::pin(Cursor::new(encoded)));
    }

    // Intermediate blocks need no modification.
    if tail > head {
        parts.push(store.open_range(bucket, object, head, Some(tail - head)).await?);
    }

    // Reconstruct a suffix block holding the head of the last block's data.
    if end.data_offset() != 0 {
        let (decoded, _) = fetch_block(store, bucket, object, tail).await?;
        let data = decoded
            .get(..usize::from(end.data_offset()))
            .ok_or_else(|| {
                Error::MalformedBlock(format!("chunk {chunk} exceeds decoded block size"))
            })?;
        let encoded = bgzf::encode_block(data)?;
        parts.push(Box::pin(Cursor::new(encoded)));
    }

    Ok(MultiReader::new(parts))
}

async fn fetch_block(
    store: &dyn ObjectStore,
    bucket: &str,
    object: &str,
    offset: u64,
) -> Result<(Vec<u8>, u16)> {
    let mut reader = store
        .open_range(bucket, object, offset, Some(MAX_BLOCK_SIZE as u64))
        .await?;
    let mut compressed = Vec::new();
    reader.read_to_end(&mut compressed).await?;
    bgzf::decode_block(&mut Cursor::new(compressed))
}

/// Reads from a sequence of streams, one after another.
pub struct MultiReader {
    parts: VecDeque<ByteStream>,
}

impl MultiReader {
    fn new(parts: Vec<ByteStream>) -> Self {
        Self {
            parts: parts.into(),
        }
    }
}

impl AsyncRead for MultiReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        while let Some(current) = this.parts.front_mut() {
            let filled = buf.filled().len();
            match current.as_mut().poll_read(cx, buf) {
                Poll::Ready(Ok(())) if buf.filled().len() == filled => {
                    this.parts.pop_front();
                }
                other => return other,
            }
        }
        Poll::Ready(Ok(()))
    }
}
