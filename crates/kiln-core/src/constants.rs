//! Storage constants.

/// Length in bytes of a block hash.
pub const HASH_LEN: usize = 32;

/// Hex characters shown for a hash in chain dumps.
pub const SHORT_HASH_HEX_LEN: usize = 6;

/// Default capacity of the decoded height-index cache, in heights.
pub const DEFAULT_INDEX_CACHE_CAPACITY: usize = 1024;

/// Default capacity of the decoded block cache, in blocks.
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 256;

/// Directory name of the height-index database under the data dir.
pub const INDEX_DB_DIR: &str = "index";

/// Directory name of the block-body database under the data dir.
pub const BLOCKS_DB_DIR: &str = "blocks";
