//! Height-indexed metadata array.
//!
//! Maps block height to the list of [`BlockMetadata`] recorded at that
//! height, one entry per competing block. Heights are stored under 8-byte
//! big-endian keys; the array length is persisted under [`SIZE_KEY`].
//! Values use the [`codec`](crate::codec) RLP layout.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use kiln_core::error::{ChainStoreError, KilnError};
use kiln_core::kv::KeyValueStore;
use kiln_core::types::BlockMetadata;

use crate::codec::{self, MetadataFormat};

/// Reserved key holding the persisted array length.
///
/// Six bytes long, so it can never collide with an 8-byte height key.
pub const SIZE_KEY: &[u8] = b"__size";

fn height_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

/// Persistent array of per-height metadata lists with a write-through cache.
pub struct HeightIndex<K: KeyValueStore> {
    kv: K,
    /// One past the highest height ever written.
    size: u64,
    cache: Mutex<LruCache<u64, Vec<BlockMetadata>>>,
}

impl<K: KeyValueStore> HeightIndex<K> {
    /// Open an index over `kv`, restoring the persisted size.
    pub fn open(kv: K, cache_capacity: usize) -> Result<Self, KilnError> {
        let size = match kv.get(SIZE_KEY)? {
            None => 0,
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| ChainStoreError::CorruptIndexSize(bytes.len()))?;
                u64::from_be_bytes(raw)
            }
        };
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            kv,
            size,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Number of heights, i.e. one past the highest height written.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Highest written height, or `None` for an empty index.
    pub fn max_number(&self) -> Option<u64> {
        self.size.checked_sub(1)
    }

    /// Metadata list at `height`.
    ///
    /// `None` when `height >= size()` or the entry was removed.
    pub fn get(&self, height: u64) -> Result<Option<Vec<BlockMetadata>>, KilnError> {
        if height >= self.size {
            return Ok(None);
        }
        if let Some(records) = self.cache.lock().get(&height) {
            return Ok(Some(records.clone()));
        }

        let Some(bytes) = self.kv.get(&height_key(height))? else {
            return Ok(None);
        };
        tracing::trace!(height, "height index cache miss");
        let records = codec::decode(&bytes)?;
        self.cache.lock().put(height, records.clone());
        Ok(Some(records))
    }

    /// Replace the metadata list at `height`.
    ///
    /// `height` may be at most `size()`; writing at `size()` appends.
    pub fn set(&mut self, height: u64, records: Vec<BlockMetadata>) -> Result<(), KilnError> {
        if height > self.size {
            return Err(ChainStoreError::IndexGap {
                height,
                size: self.size,
            }
            .into());
        }

        self.kv.put(&height_key(height), &codec::encode(&records))?;
        if height == self.size {
            self.store_size(height + 1)?;
        }
        self.cache.lock().put(height, records);
        Ok(())
    }

    /// Delete the entry at `height`. Removing the top height shrinks the index.
    pub fn remove(&mut self, height: u64) -> Result<(), KilnError> {
        if height >= self.size {
            return Ok(());
        }
        self.kv.delete(&height_key(height))?;
        self.cache.lock().pop(&height);
        if height + 1 == self.size {
            self.store_size(height)?;
        }
        Ok(())
    }

    /// Commit staged writes when the backing store is not auto-committing.
    pub fn flush(&mut self) -> Result<(), KilnError> {
        if !self.kv.is_auto_commit_enabled() {
            self.kv.commit()?;
        }
        Ok(())
    }

    /// Rewrite every list stored in the legacy format as RLP.
    ///
    /// Returns the number of rewritten heights.
    pub fn migrate_legacy(&mut self) -> Result<u64, KilnError> {
        let mut rewritten = 0u64;
        for height in 0..self.size {
            let Some(bytes) = self.kv.get(&height_key(height))? else {
                continue;
            };
            let (records, format) = codec::decode_tagged(&bytes)?;
            if format == MetadataFormat::Legacy {
                self.kv.put(&height_key(height), &codec::encode(&records))?;
                self.cache.lock().put(height, records);
                rewritten += 1;
            }
        }
        if rewritten > 0 {
            tracing::info!(rewritten, size = self.size, "migrated legacy height index entries");
        }
        Ok(rewritten)
    }

    /// Drop the cache and close the backing store.
    pub fn close(&mut self) -> Result<(), KilnError> {
        self.cache.lock().clear();
        self.kv.close()?;
        Ok(())
    }

    fn store_size(&mut self, size: u64) -> Result<(), KilnError> {
        self.kv.put(SIZE_KEY, &size.to_be_bytes())?;
        self.size = size;
        Ok(())
    }
}
