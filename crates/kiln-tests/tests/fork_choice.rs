//! Property tests for main-chain bookkeeping under random block trees.
//!
//! Each case grows a tree from genesis by attaching blocks to random
//! existing parents, importing them the way a chain processor would
//! (heavier chain wins, re-branching when needed), then checks:
//! - a single main-chain entry per height
//! - an unbroken main chain from the best block to genesis
//! - the best block carries the highest cumulative difficulty
//! - `revert` truncates the index and block bodies above the target height

use num_bigint::BigUint;
use proptest::prelude::*;

use kiln_core::traits::ChainBlock;
use kiln_core::types::{Block, BlockMetadata, Hash256};
use kiln_store::codec;
use kiln_tests::helpers::*;

/// A block plus the cumulative difficulty it was imported with.
struct Node {
    block: Block,
    td: BigUint,
}

/// Build a tree from `(parent_pick, difficulty)` steps.
fn grow(store: &mut MemStore, steps: &[(usize, u64)]) -> Vec<Node> {
    let root = genesis(10);
    let mut nodes = vec![Node {
        td: BigUint::from(10u64),
        block: root,
    }];
    import(store, &nodes[0].block, nodes[0].td.clone());

    for (i, &(pick, difficulty)) in steps.iter().enumerate() {
        let parent = &nodes[pick % nodes.len()];
        let block = make_block(&parent.block, i as u64 + 1, difficulty);
        let td = &parent.td + BigUint::from(difficulty);
        import(store, &block, td.clone());
        nodes.push(Node { block, td });
    }
    nodes
}

fn steps() -> impl Strategy<Value = Vec<(usize, u64)>> {
    prop::collection::vec((any::<usize>(), 1u64..50), 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn main_chain_invariants_hold(steps in steps()) {
        let mut store = memory_store();
        let nodes = grow(&mut store, &steps);

        prop_assert_eq!(check_single_main_per_height(&store), Ok(()));
        prop_assert_eq!(check_main_chain_connected(&store), Ok(()));

        let heaviest = nodes.iter().map(|n| n.td.clone()).max().unwrap();
        prop_assert_eq!(store.total_difficulty().unwrap(), heaviest.clone());

        let best = store.best_block().unwrap().unwrap();
        prop_assert_eq!(store.total_difficulty_for_hash(&best.hash()).unwrap(), heaviest);

        // Every imported block stays retrievable, canonical or not.
        for node in &nodes {
            prop_assert!(store.is_block_exist(&node.block.hash()).unwrap());
        }
    }

    #[test]
    fn invariants_hold_after_every_import(
        steps in prop::collection::vec((any::<usize>(), 1u64..50), 1..15)
    ) {
        let mut store = memory_store();
        let root = genesis(10);
        let mut nodes = vec![(root.clone(), BigUint::from(10u64))];
        import(&mut store, &root, BigUint::from(10u64));

        for (i, &(pick, difficulty)) in steps.iter().enumerate() {
            let (parent, parent_td) = nodes[pick % nodes.len()].clone();
            let block = make_block(&parent, i as u64 + 1, difficulty);
            let td = parent_td + BigUint::from(difficulty);
            import(&mut store, &block, td.clone());
            nodes.push((block, td));

            prop_assert_eq!(check_single_main_per_height(&store), Ok(()));
            prop_assert_eq!(check_main_chain_connected(&store), Ok(()));
        }
    }

    #[test]
    fn revert_truncates(steps in steps(), pick in any::<u64>()) {
        let mut store = memory_store();
        let nodes = grow(&mut store, &steps);

        let best = store.best_block().unwrap().unwrap();
        prop_assume!(best.number() > 0);
        let target = pick % best.number();

        store.revert(target).unwrap();

        prop_assert_eq!(store.index().size(), target + 1);
        prop_assert_eq!(store.max_number(), Some(target));
        prop_assert_eq!(store.best_block().unwrap().unwrap().number(), target);
        prop_assert_eq!(check_single_main_per_height(&store), Ok(()));
        prop_assert_eq!(check_main_chain_connected(&store), Ok(()));

        for node in &nodes {
            let exists = store.is_block_exist(&node.block.hash()).unwrap();
            prop_assert_eq!(exists, node.block.number() <= target);
        }
    }

    #[test]
    fn codec_roundtrip(records in prop::collection::vec(
        (any::<[u8; 32]>(), prop::collection::vec(any::<u8>(), 0..40), any::<bool>()),
        0..8,
    )) {
        let records: Vec<BlockMetadata> = records
            .into_iter()
            .map(|(hash, difficulty, main_chain)| {
                BlockMetadata::new(Hash256(hash), BigUint::from_bytes_be(&difficulty), main_chain)
            })
            .collect();
        prop_assert_eq!(codec::decode(&codec::encode(&records)).unwrap(), records);
    }
}
