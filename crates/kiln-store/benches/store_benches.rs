//! Criterion benchmarks for kiln-store hot paths.
//!
//! Covers: metadata list encode/decode, appending blocks to an in-memory
//! store, and re-branching onto a competing chain of growing depth.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use num_bigint::BigUint;

use kiln_core::kv::MemoryKeyValueStore;
use kiln_core::types::{Block, BlockHeader, BlockMetadata, Hash256};
use kiln_store::{codec, BlockStore};

type MemStore = BlockStore<Block, MemoryKeyValueStore>;

fn block(number: u64, parent_hash: Hash256, nonce: u64) -> Block {
    Block {
        header: BlockHeader {
            version: 1,
            number,
            parent_hash,
            tx_root: Hash256::ZERO,
            timestamp: 1_700_000_000 + number * 10,
            difficulty: 100,
            nonce,
            extra_data: Vec::new(),
        },
        transactions: Vec::new(),
    }
}

/// Store with a main chain of `len` blocks above genesis plus a heavier,
/// unsaved-as-main fork of `depth` blocks branching off `len - depth`.
fn forked_store(len: u64, depth: u64) -> (MemStore, Block) {
    let mut store = MemStore::in_memory().unwrap();
    let mut chain = vec![block(0, Hash256::ZERO, 0)];
    store.save_block(&chain[0], BigUint::from(100u64), true).unwrap();
    for n in 1..=len {
        let b = block(n, chain[n as usize - 1].hash(), 0);
        store.save_block(&b, BigUint::from(100 * (n + 1)), true).unwrap();
        chain.push(b);
    }

    let base = len - depth;
    let mut tip = chain[base as usize].clone();
    for n in base + 1..=len {
        let b = block(n, tip.hash(), 1);
        store.save_block(&b, BigUint::from(100 * (n + 1) + 1), false).unwrap();
        tip = b;
    }
    (store, tip)
}

fn bench_codec(c: &mut Criterion) {
    let records: Vec<BlockMetadata> = (0..8u8)
        .map(|i| BlockMetadata::new(Hash256([i; 32]), BigUint::from(1u64 << 40), i == 0))
        .collect();
    let encoded = codec::encode(&records);

    c.bench_function("metadata_encode_8", |b| {
        b.iter(|| codec::encode(black_box(&records)))
    });

    c.bench_function("metadata_decode_8", |b| {
        b.iter(|| codec::decode(black_box(&encoded)).expect("decode failed"))
    });
}

fn bench_save_block(c: &mut Criterion) {
    c.bench_function("save_block_100", |b| {
        b.iter(|| {
            let mut store = MemStore::in_memory().unwrap();
            let mut parent = Hash256::ZERO;
            for n in 0..100 {
                let blk = block(n, parent, 0);
                parent = blk.hash();
                store.save_block(&blk, BigUint::from(n + 1), true).unwrap();
            }
            store
        })
    });
}

fn bench_re_branch(c: &mut Criterion) {
    let mut group = c.benchmark_group("re_branch");
    for depth in [1u64, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter_batched(
                || forked_store(100, depth),
                |(mut store, fork_tip)| {
                    store.re_branch(&fork_tip).expect("re_branch failed");
                    store
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_codec, bench_save_block, bench_re_branch);
criterion_main!(benches);
