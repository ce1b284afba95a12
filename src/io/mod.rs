mod block_cache;
mod local_reader;
mod locator;
mod range_reader;

pub use block_cache::{BlockCache, DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_BLOCK_SIZE};
pub use local_reader::LocalFileReader;
pub use locator::{resolve_locator, FileOptions, Filesystem, ResolvedLocator};
pub use range_reader::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, MemoryReader,
    RangeReader,
};
