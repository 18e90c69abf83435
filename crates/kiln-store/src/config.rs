//! Store configuration.
//!
//! [`StoreConfig`] has defaults for every field. [`StoreConfig::load`]
//! layers an optional config file and `KILN_*` environment variables on top
//! of them.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use kiln_core::constants::{
    BLOCKS_DB_DIR, DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_INDEX_CACHE_CAPACITY, INDEX_DB_DIR,
};
use kiln_core::error::KilnError;

/// Configuration for a RocksDB-backed block store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory for both databases.
    pub data_dir: PathBuf,
    /// Height-index cache entries.
    pub index_cache_capacity: usize,
    /// Block-body cache entries.
    pub block_cache_capacity: usize,
    /// Commit every write immediately instead of on flush.
    pub auto_commit: bool,
    /// Log level filter string (e.g. "info", "kiln_store=debug").
    pub log_level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kiln");

        Self {
            data_dir,
            index_cache_capacity: DEFAULT_INDEX_CACHE_CAPACITY,
            block_cache_capacity: DEFAULT_BLOCK_CACHE_CAPACITY,
            auto_commit: false,
            log_level: "info".to_string(),
        }
    }
}

impl StoreConfig {
    /// Load defaults, then `file` (if given), then `KILN_*` variables.
    pub fn load(file: Option<&Path>) -> Result<Self, KilnError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(::config::File::from(path));
        }
        builder
            .add_source(::config::Environment::with_prefix("KILN").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize::<StoreConfig>())
            .map_err(|e| KilnError::Config(e.to_string()))
    }

    /// Path to the height-index database.
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(INDEX_DB_DIR)
    }

    /// Path to the block-body database.
    pub fn blocks_path(&self) -> PathBuf {
        self.data_dir.join(BLOCKS_DB_DIR)
    }
}
