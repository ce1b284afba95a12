use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use lru::LruCache;
use tokio::sync::Mutex;

use super::RangeReader;
use crate::error::IoError;

/// Default block size: 64KB.
///
/// TIFF directories, tag arrays and JPEG tables are small and clustered, so a
/// modest block size captures most of them in a single read.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default cache capacity in number of blocks (4MB with the default block size).
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 64;

/// Block-based caching layer that wraps any RangeReader.
///
/// Parsing a slide issues many small reads at scattered offsets (IFD entry
/// counts, entries, tag arrays). The cache turns these into fixed-size block
/// reads and keeps recently used blocks in an LRU.
///
/// Reads that span several blocks are assembled from each block in turn.
/// The last block of the resource may be shorter than the block size.
pub struct BlockCache<R> {
    inner: Arc<R>,
    block_size: usize,
    cache: Mutex<LruCache<u64, Bytes>>,
}

impl<R: RangeReader> BlockCache<R> {
    /// Create a new BlockCache with the default block size and capacity.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_CACHE_CAPACITY)
    }

    /// Create a new BlockCache with custom block size and capacity.
    ///
    /// A zero block size or capacity is bumped to 1.
    pub fn with_capacity(inner: R, block_size: usize, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(inner),
            block_size: block_size.max(1),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Access the wrapped reader.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Number of blocks currently cached.
    pub async fn cached_blocks(&self) -> usize {
        self.cache.lock().await.len()
    }

    async fn get_block(&self, block_idx: u64) -> Result<Bytes, IoError> {
        if let Some(block) = self.cache.lock().await.get(&block_idx) {
            return Ok(block.clone());
        }

        let offset = block_idx * self.block_size as u64;
        let remaining = self.inner.size().saturating_sub(offset);
        let len = (self.block_size as u64).min(remaining) as usize;
        let block = self.inner.read_exact_at(offset, len).await?;

        self.cache.lock().await.put(block_idx, block.clone());
        Ok(block)
    }
}

#[async_trait]
impl<R: RangeReader + 'static> RangeReader for BlockCache<R> {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let size = self.inner.size();
        let in_bounds = offset
            .checked_add(len as u64)
            .map(|end| end <= size)
            .unwrap_or(false);
        if !in_bounds {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size,
            });
        }

        if len == 0 {
            return Ok(Bytes::new());
        }

        let block_size = self.block_size as u64;
        let start_block = offset / block_size;
        let end_block = (offset + len as u64 - 1) / block_size;

        if start_block == end_block {
            let block = self.get_block(start_block).await?;
            let start = (offset % block_size) as usize;
            return Ok(block.slice(start..start + len));
        }

        let mut result = BytesMut::with_capacity(len);
        let mut current = offset;
        let end = offset + len as u64;
        for block_idx in start_block..=end_block {
            let block = self.get_block(block_idx).await?;
            let start = (current % block_size) as usize;
            let take = (block.len() - start).min((end - current) as usize);
            result.extend_from_slice(&block[start..start + take]);
            current += take as u64;
        }

        Ok(result.freeze())
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}
