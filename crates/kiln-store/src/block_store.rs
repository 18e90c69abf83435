//! Block store: height index plus block bodies, with fork-choice.
//!
//! The store records every block it is given, canonical or not, and keeps
//! exactly one main-chain entry per height. Deciding *whether* a competing
//! chain should win is the caller's job; [`BlockStore::re_branch`] only
//! carries out the switch.
//!
//! # Concurrency
//!
//! Mutations take `&mut self` and run as multi-step read-modify-write
//! sequences with no atomicity across steps. Multi-threaded callers share
//! the store through [`SharedBlockStore`] and hold the write lock for the
//! whole of `save_block`, `re_branch` or `revert`.

use std::sync::Arc;

use num_bigint::BigUint;
use parking_lot::RwLock;

use kiln_core::constants::{DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_INDEX_CACHE_CAPACITY};
use kiln_core::error::{ChainStoreError, KilnError};
use kiln_core::kv::{KeyValueStore, MemoryKeyValueStore};
use kiln_core::traits::ChainBlock;
use kiln_core::types::{BlockMetadata, Hash256};

use crate::block_objects::BlockObjects;
use crate::config::StoreConfig;
use crate::height_index::HeightIndex;
use crate::rocks::RocksKeyValueStore;

/// A block store shared between threads.
pub type SharedBlockStore<B, K> = Arc<RwLock<BlockStore<B, K>>>;

/// Height-indexed block store with main-chain bookkeeping.
pub struct BlockStore<B: ChainBlock, K: KeyValueStore> {
    index: HeightIndex<K>,
    blocks: BlockObjects<B, K>,
}

impl<B: ChainBlock> BlockStore<B, RocksKeyValueStore> {
    /// Open the RocksDB-backed store described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self, KilnError> {
        let index_kv = RocksKeyValueStore::open(config.index_path(), config.auto_commit)?;
        let blocks_kv = RocksKeyValueStore::open(config.blocks_path(), config.auto_commit)?;
        tracing::info!(data_dir = %config.data_dir.display(), "opened block store");
        Self::with_cache_capacity(
            index_kv,
            blocks_kv,
            config.index_cache_capacity,
            config.block_cache_capacity,
        )
    }
}

impl<B: ChainBlock> BlockStore<B, MemoryKeyValueStore> {
    /// Store over two fresh in-memory key-value stores.
    pub fn in_memory() -> Result<Self, KilnError> {
        Self::new(MemoryKeyValueStore::new(), MemoryKeyValueStore::new())
    }
}

impl<B: ChainBlock, K: KeyValueStore> BlockStore<B, K> {
    /// Create a store over an index store and a block-body store.
    pub fn new(index_kv: K, blocks_kv: K) -> Result<Self, KilnError> {
        Self::with_cache_capacity(
            index_kv,
            blocks_kv,
            DEFAULT_INDEX_CACHE_CAPACITY,
            DEFAULT_BLOCK_CACHE_CAPACITY,
        )
    }

    pub fn with_cache_capacity(
        index_kv: K,
        blocks_kv: K,
        index_cache_capacity: usize,
        block_cache_capacity: usize,
    ) -> Result<Self, KilnError> {
        Ok(Self {
            index: HeightIndex::open(index_kv, index_cache_capacity)?,
            blocks: BlockObjects::new(blocks_kv, block_cache_capacity),
        })
    }

    /// Wrap the store for sharing between threads.
    pub fn into_shared(self) -> SharedBlockStore<B, K> {
        Arc::new(RwLock::new(self))
    }

    /// The underlying height index.
    pub fn index(&self) -> &HeightIndex<K> {
        &self.index
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Record `block` at its height and store its body.
    ///
    /// Saving with `main_chain = true` demotes every other entry at that
    /// height. Saving the same block twice records it twice.
    pub fn save_block(
        &mut self,
        block: &B,
        cumulative_difficulty: BigUint,
        main_chain: bool,
    ) -> Result<(), KilnError> {
        let height = block.number();
        let hash = block.hash();

        let mut records = self.index.get(height)?.unwrap_or_default();
        if main_chain {
            for record in &mut records {
                record.main_chain = false;
            }
        }
        records.push(BlockMetadata::new(hash, cumulative_difficulty, main_chain));
        self.index.set(height, records)?;
        self.blocks.put(hash, block)?;

        tracing::debug!(height, %hash, main_chain, "saved block");
        Ok(())
    }

    /// Make `fork_block`'s chain the main chain.
    ///
    /// Walks both the current best chain and the fork back to their common
    /// ancestor, demoting the former and promoting the latter at every level.
    ///
    /// # Errors
    ///
    /// [`ChainStoreError::EmptyChain`] when nothing is recorded, and
    /// [`ChainStoreError::MissingAncestor`] when a block on either path cannot
    /// be loaded. Flags already rewritten at that point stay rewritten.
    pub fn re_branch(&mut self, fork_block: &B) -> Result<(), KilnError> {
        let best = self.best_block()?.ok_or(ChainStoreError::EmptyChain)?;
        let best_number = best.number();
        let fork_number = fork_block.number();

        tracing::info!(
            best = %best.hash(),
            best_number,
            fork = %fork_block.hash(),
            fork_number,
            "re-branching main chain"
        );

        let mut level = best_number.max(fork_number);

        // Bring both lines to the same height.
        let mut fork_line = fork_block.clone();
        while level > best_number {
            self.update_level(level, None, Some(fork_line.hash()))?;
            fork_line = self.parent_of(&fork_line)?;
            level -= 1;
        }

        let mut best_line = best;
        while level > fork_number {
            self.update_level(level, Some(best_line.hash()), None)?;
            best_line = self.parent_of(&best_line)?;
            level -= 1;
        }

        // Swap flags level by level until the lines meet.
        let mut depth = 0u64;
        while !best_line.is_same(&fork_line) {
            self.update_level(level, Some(best_line.hash()), Some(fork_line.hash()))?;
            if level == 0 {
                return Err(ChainStoreError::MissingAncestor {
                    hash: fork_line.parent_hash().to_string(),
                    height: 0,
                }
                .into());
            }
            best_line = self.parent_of(&best_line)?;
            fork_line = self.parent_of(&fork_line)?;
            level -= 1;
            depth += 1;
        }

        tracing::info!(common_ancestor = level, depth, "re-branch complete");
        Ok(())
    }

    /// Discard the best chain above `previous_level` and make the block it
    /// reaches at `previous_level` the tip.
    ///
    /// Every entry at a truncated height is dropped together with its block
    /// body, competing blocks included. A no-op when `previous_level` is at
    /// or above the best block.
    pub fn revert(&mut self, previous_level: u64) -> Result<(), KilnError> {
        let Some(best) = self.best_block()? else {
            return Ok(());
        };
        let best_number = best.number();
        if previous_level >= best_number {
            return Ok(());
        }

        tracing::info!(from = best_number, to = previous_level, "reverting main chain");

        // Heights above the best block only hold non-canonical entries.
        if let Some(top) = self.index.max_number() {
            for height in (best_number + 1..=top).rev() {
                self.truncate_level(height)?;
            }
        }

        let mut line = best;
        let mut level = best_number;
        while level > previous_level {
            self.truncate_level(level)?;
            line = self.parent_of(&line)?;
            level -= 1;
        }

        self.update_level(previous_level, None, Some(line.hash()))?;
        Ok(())
    }

    /// Rewrite height-index entries still stored in the legacy format.
    pub fn migrate_legacy_index(&mut self) -> Result<u64, KilnError> {
        self.index.migrate_legacy()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Highest recorded height, `None` when empty.
    pub fn max_number(&self) -> Option<u64> {
        self.index.max_number()
    }

    /// All metadata recorded at `height`.
    pub fn metadata_at(&self, height: u64) -> Result<Vec<BlockMetadata>, KilnError> {
        Ok(self.index.get(height)?.unwrap_or_default())
    }

    /// The main-chain block at the highest height that has one.
    ///
    /// # Errors
    ///
    /// [`ChainStoreError::NoMainChainBlock`] when blocks are recorded but none
    /// of them is on the main chain.
    pub fn best_block(&self) -> Result<Option<B>, KilnError> {
        let Some(top) = self.max_number() else {
            return Ok(None);
        };
        for height in (0..=top).rev() {
            if let Some(block) = self.chain_block_by_number(height)? {
                return Ok(Some(block));
            }
        }
        Err(ChainStoreError::NoMainChainBlock { from: top }.into())
    }

    /// Hash of the main-chain block at `height`.
    pub fn block_hash_by_number(&self, height: u64) -> Result<Option<Hash256>, KilnError> {
        Ok(self.main_chain_entry(height)?.map(|entry| entry.hash))
    }

    /// The main-chain block at `height`.
    pub fn chain_block_by_number(&self, height: u64) -> Result<Option<B>, KilnError> {
        match self.main_chain_entry(height)? {
            Some(entry) => self.blocks.get(&entry.hash),
            None => Ok(None),
        }
    }

    /// Every block recorded at `height`, canonical or not.
    pub fn blocks_by_number(&self, height: u64) -> Result<Vec<B>, KilnError> {
        let mut blocks = Vec::new();
        for entry in self.metadata_at(height)? {
            match self.blocks.get(&entry.hash)? {
                Some(block) => blocks.push(block),
                None => tracing::warn!(height, hash = %entry.hash, "indexed block body is missing"),
            }
        }
        Ok(blocks)
    }

    pub fn block_by_hash(&self, hash: &Hash256) -> Result<Option<B>, KilnError> {
        self.blocks.get(hash)
    }

    pub fn is_block_exist(&self, hash: &Hash256) -> Result<bool, KilnError> {
        self.blocks.contains(hash)
    }

    /// Cumulative difficulty recorded for `hash`, zero if unknown.
    pub fn total_difficulty_for_hash(&self, hash: &Hash256) -> Result<BigUint, KilnError> {
        let Some(block) = self.blocks.get(hash)? else {
            return Ok(BigUint::default());
        };
        Ok(self
            .metadata_at(block.number())?
            .into_iter()
            .find(|entry| entry.hash == *hash)
            .map(|entry| entry.cumulative_difficulty)
            .unwrap_or_default())
    }

    /// Cumulative difficulty of the main chain's highest entry.
    ///
    /// Zero when empty; [`ChainStoreError::NoMainChainBlock`] when no height
    /// has a main-chain entry.
    pub fn total_difficulty(&self) -> Result<BigUint, KilnError> {
        let Some(top) = self.max_number() else {
            return Ok(BigUint::default());
        };
        for height in (0..=top).rev() {
            if let Some(entry) = self.main_chain_entry(height)? {
                return Ok(entry.cumulative_difficulty);
            }
        }
        Err(ChainStoreError::NoMainChainBlock { from: top }.into())
    }

    /// Up to `qty` blocks ending at `hash`, newest first.
    ///
    /// Stops early at the first ancestor missing from storage.
    pub fn list_blocks_end_with(&self, hash: &Hash256, qty: u64) -> Result<Vec<B>, KilnError> {
        let mut blocks = Vec::new();
        if qty == 0 {
            return Ok(blocks);
        }
        let mut current = self.blocks.get(hash)?;
        while let Some(block) = current {
            let parent = block.parent_hash();
            blocks.push(block);
            if blocks.len() as u64 >= qty {
                break;
            }
            current = self.blocks.get(&parent)?;
        }
        Ok(blocks)
    }

    pub fn list_hashes_end_with(
        &self,
        hash: &Hash256,
        qty: u64,
    ) -> Result<Vec<Hash256>, KilnError> {
        Ok(self
            .list_blocks_end_with(hash, qty)?
            .iter()
            .map(ChainBlock::hash)
            .collect())
    }

    pub fn list_headers_end_with(
        &self,
        hash: &Hash256,
        qty: u64,
    ) -> Result<Vec<B::Header>, KilnError> {
        Ok(self
            .list_blocks_end_with(hash, qty)?
            .iter()
            .map(ChainBlock::header)
            .collect())
    }

    /// Main-chain hashes for up to `max_blocks` heights starting at `height`.
    ///
    /// Heights without a main-chain entry contribute nothing; the walk ends
    /// at the first height with no entry list.
    pub fn list_hashes_start_with(
        &self,
        height: u64,
        max_blocks: u64,
    ) -> Result<Vec<Hash256>, KilnError> {
        let mut hashes = Vec::new();
        for h in height..height.saturating_add(max_blocks) {
            let Some(records) = self.index.get(h)? else {
                break;
            };
            if let Some(entry) = records.into_iter().find(|r| r.main_chain) {
                hashes.push(entry.hash);
            }
        }
        Ok(hashes)
    }

    /// One line per recorded height: the height, then each entry's short
    /// hash with the main-chain entry in brackets.
    pub fn dump_chain(&self) -> Result<String, KilnError> {
        let mut out = String::new();
        let Some(top) = self.max_number() else {
            return Ok(out);
        };
        for height in 0..=top {
            let Some(records) = self.index.get(height)? else {
                continue;
            };
            out.push_str(&height.to_string());
            for record in &records {
                if record.main_chain {
                    out.push_str(&format!(" [{}]", record.hash.short()));
                } else {
                    out.push_str(&format!(" {}", record.hash.short()));
                }
            }
            out.push('\n');
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Persist both sub-stores. Failures are logged, not returned.
    pub fn flush(&mut self) {
        if let Err(e) = self.blocks.flush() {
            tracing::error!(error = %e, "unable to flush block bodies");
        }
        if let Err(e) = self.index.flush() {
            tracing::error!(error = %e, "unable to flush height index");
        }
    }

    /// Close both sub-stores. A failure on one does not stop the other.
    pub fn close(&mut self) {
        if let Err(e) = self.index.close() {
            tracing::error!(error = %e, "unable to close height index");
        }
        if let Err(e) = self.blocks.close() {
            tracing::error!(error = %e, "unable to close block bodies");
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn main_chain_entry(&self, height: u64) -> Result<Option<BlockMetadata>, KilnError> {
        Ok(self
            .index
            .get(height)?
            .and_then(|records| records.into_iter().find(|r| r.main_chain)))
    }

    fn parent_of(&self, block: &B) -> Result<B, KilnError> {
        let parent_hash = block.parent_hash();
        self.blocks.get(&parent_hash)?.ok_or_else(|| {
            ChainStoreError::MissingAncestor {
                hash: parent_hash.to_string(),
                height: block.number().saturating_sub(1),
            }
            .into()
        })
    }

    /// Demote `demote` and promote `promote` at `level`.
    ///
    /// Promotion only happens when `promote` has an entry at the level, and
    /// then clears the flag on every other entry. The level is rewritten
    /// only if a flag changed.
    fn update_level(
        &mut self,
        level: u64,
        demote: Option<Hash256>,
        promote: Option<Hash256>,
    ) -> Result<(), KilnError> {
        let Some(mut records) = self.index.get(level)? else {
            return Ok(());
        };
        let mut changed = false;

        if let Some(hash) = demote {
            for record in records.iter_mut().filter(|r| r.hash == hash && r.main_chain) {
                record.main_chain = false;
                changed = true;
            }
        }

        if let Some(hash) = promote {
            if records.iter().any(|r| r.hash == hash) {
                for record in &mut records {
                    let main_chain = record.hash == hash;
                    if record.main_chain != main_chain {
                        record.main_chain = main_chain;
                        changed = true;
                    }
                }
            }
        }

        if changed {
            self.index.set(level, records)?;
        }
        Ok(())
    }

    /// Drop the entry at `height` and the bodies of every block recorded there.
    fn truncate_level(&mut self, height: u64) -> Result<(), KilnError> {
        for record in self.metadata_at(height)? {
            self.blocks.delete(&record.hash)?;
        }
        self.index.remove(height)
    }
}
