//! Block bodies keyed by hash.

use std::marker::PhantomData;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use kiln_core::error::KilnError;
use kiln_core::kv::KeyValueStore;
use kiln_core::traits::ChainBlock;
use kiln_core::types::Hash256;

/// Persistent hash → block mapping with a write-through cache.
///
/// Values are the block type's native encoding. Non-canonical blocks stay
/// retrievable until deleted.
pub struct BlockObjects<B: ChainBlock, K: KeyValueStore> {
    kv: K,
    cache: Mutex<LruCache<Hash256, B>>,
    _block: PhantomData<fn() -> B>,
}

impl<B: ChainBlock, K: KeyValueStore> BlockObjects<B, K> {
    pub fn new(kv: K, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            kv,
            cache: Mutex::new(LruCache::new(capacity)),
            _block: PhantomData,
        }
    }

    pub fn get(&self, hash: &Hash256) -> Result<Option<B>, KilnError> {
        if let Some(block) = self.cache.lock().get(hash) {
            return Ok(Some(block.clone()));
        }
        let Some(bytes) = self.kv.get(hash.as_bytes())? else {
            return Ok(None);
        };
        let block = B::decode(&bytes)?;
        self.cache.lock().put(*hash, block.clone());
        Ok(Some(block))
    }

    /// Store `block` under `hash`.
    pub fn put(&mut self, hash: Hash256, block: &B) -> Result<(), KilnError> {
        self.kv.put(hash.as_bytes(), &block.encode()?)?;
        self.cache.lock().put(hash, block.clone());
        Ok(())
    }

    /// Remove the block stored under `hash`. Absent hashes are ignored.
    pub fn delete(&mut self, hash: &Hash256) -> Result<(), KilnError> {
        self.kv.delete(hash.as_bytes())?;
        self.cache.lock().pop(hash);
        Ok(())
    }

    pub fn contains(&self, hash: &Hash256) -> Result<bool, KilnError> {
        if self.cache.lock().contains(hash) {
            return Ok(true);
        }
        Ok(self.kv.get(hash.as_bytes())?.is_some())
    }

    /// Commit staged writes when the backing store is not auto-committing.
    pub fn flush(&mut self) -> Result<(), KilnError> {
        if !self.kv.is_auto_commit_enabled() {
            self.kv.commit()?;
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), KilnError> {
        self.cache.lock().clear();
        self.kv.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::kv::MemoryKeyValueStore;
    use kiln_core::types::{Block, BlockHeader};

    fn block(number: u64, nonce: u64) -> Block {
        Block {
            header: BlockHeader {
                version: 1,
                number,
                parent_hash: Hash256::ZERO,
                tx_root: Hash256::ZERO,
                timestamp: 1_700_000_000 + number,
                difficulty: 1,
                nonce,
                extra_data: Vec::new(),
            },
            transactions: vec![vec![nonce as u8]],
        }
    }

    #[test]
    fn put_get_delete() {
        let mut objects = BlockObjects::<Block, _>::new(MemoryKeyValueStore::new(), 8);
        let b = block(1, 7);
        let hash = b.hash();

        assert!(objects.get(&hash).unwrap().is_none());
        objects.put(hash, &b).unwrap();
        assert_eq!(objects.get(&hash).unwrap(), Some(b));
        assert!(objects.contains(&hash).unwrap());

        objects.delete(&hash).unwrap();
        assert!(objects.get(&hash).unwrap().is_none());
        assert!(!objects.contains(&hash).unwrap());
    }

    #[test]
    fn reads_through_to_store_after_eviction() {
        let kv = MemoryKeyValueStore::new();
        let mut objects = BlockObjects::<Block, _>::new(kv.reopen(), 1);
        let blocks: Vec<Block> = (0..4).map(|n| block(n, n)).collect();
        for b in &blocks {
            objects.put(b.hash(), b).unwrap();
        }
        for b in &blocks {
            assert_eq!(objects.get(&b.hash()).unwrap().as_ref(), Some(b));
        }

        let fresh = BlockObjects::<Block, _>::new(kv.reopen(), 1);
        assert_eq!(fresh.get(&blocks[0].hash()).unwrap().as_ref(), Some(&blocks[0]));
    }

    #[test]
    fn undecodable_body_is_an_error() {
        let mut kv = MemoryKeyValueStore::new();
        kv.put(&[9u8; 32], &[0xFF, 0xFF]).unwrap();
        let objects = BlockObjects::<Block, _>::new(kv, 8);
        assert!(objects.get(&Hash256([9u8; 32])).is_err());
    }

    #[test]
    fn flush_commits_when_not_auto_commit() {
        let kv = MemoryKeyValueStore::with_auto_commit(false);
        let mut objects = BlockObjects::<Block, _>::new(kv.reopen(), 8);
        let b = block(3, 3);
        objects.put(b.hash(), &b).unwrap();
        assert!(kv.is_empty());
        objects.flush().unwrap();
        assert_eq!(kv.len(), 1);
    }
}
