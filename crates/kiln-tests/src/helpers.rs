//! Shared test helpers for property and scenario tests.

use num_bigint::BigUint;

use kiln_core::kv::MemoryKeyValueStore;
use kiln_core::traits::ChainBlock;
use kiln_core::types::{transactions_root, Block, BlockHeader, Hash256};
use kiln_store::BlockStore;

/// Store over in-memory key-value stores.
pub type MemStore = BlockStore<Block, MemoryKeyValueStore>;

/// Fresh in-memory store.
pub fn memory_store() -> MemStore {
    MemStore::in_memory().unwrap()
}

/// Genesis block with the given difficulty.
pub fn genesis(difficulty: u64) -> Block {
    let transactions = vec![b"genesis".to_vec()];
    Block {
        header: BlockHeader {
            version: 1,
            number: 0,
            parent_hash: Hash256::ZERO,
            tx_root: transactions_root(&transactions),
            timestamp: 1_700_000_000,
            difficulty,
            nonce: 0,
            extra_data: Vec::new(),
        },
        transactions,
    }
}

/// Child of `parent`. `nonce` keeps siblings distinct.
pub fn make_block(parent: &Block, nonce: u64, difficulty: u64) -> Block {
    let transactions = vec![nonce.to_le_bytes().to_vec()];
    Block {
        header: BlockHeader {
            version: 1,
            number: parent.header.number + 1,
            parent_hash: parent.hash(),
            tx_root: transactions_root(&transactions),
            timestamp: parent.header.timestamp + 10,
            difficulty,
            nonce,
            extra_data: Vec::new(),
        },
        transactions,
    }
}

/// Insert `block` the way a chain processor would: make it the main chain
/// when it is heavier than the current best, re-branching if it does not
/// extend the best block.
pub fn import(store: &mut MemStore, block: &Block, td: BigUint) {
    let Some(best) = store.best_block().unwrap() else {
        store.save_block(block, td, true).unwrap();
        return;
    };
    let best_td = store.total_difficulty().unwrap();

    if td > best_td {
        if block.parent_hash() == best.hash() {
            store.save_block(block, td, true).unwrap();
        } else {
            store.save_block(block, td, false).unwrap();
            store.re_branch(block).unwrap();
        }
    } else {
        store.save_block(block, td, false).unwrap();
    }
}

/// At most one main-chain entry per height.
pub fn check_single_main_per_height(store: &MemStore) -> Result<(), String> {
    let Some(top) = store.max_number() else {
        return Ok(());
    };
    for height in 0..=top {
        let mains = store
            .metadata_at(height)
            .unwrap()
            .iter()
            .filter(|r| r.main_chain)
            .count();
        if mains > 1 {
            return Err(format!("{mains} main-chain entries at height {height}"));
        }
    }
    Ok(())
}

/// Main-chain parent links run unbroken from the best block to genesis.
pub fn check_main_chain_connected(store: &MemStore) -> Result<(), String> {
    let Some(best) = store.best_block().unwrap() else {
        return Ok(());
    };
    let mut child = best;
    while child.number() > 0 {
        let height = child.number() - 1;
        let parent = store
            .chain_block_by_number(height)
            .unwrap()
            .ok_or_else(|| format!("no main-chain block at height {height}"))?;
        if parent.hash() != child.parent_hash() {
            return Err(format!(
                "main-chain block at {height} is {}, child {} expects {}",
                parent.hash(),
                child.hash(),
                child.parent_hash()
            ));
        }
        child = parent;
    }
    Ok(())
}
