//! Error types for Kiln block storage.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("rlp: {0}")] Rlp(String),
    #[error("legacy stream: {0}")] Legacy(String),
    #[error("unreadable block metadata: rlp ({rlp}), legacy ({legacy})")] Unreadable { rlp: String, legacy: String },
    #[error("invalid hash length: {0}")] InvalidHashLength(usize),
    #[error("block encoding: {0}")] Block(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KvError {
    #[error("backend: {0}")] Backend(String),
    #[error("store closed")] Closed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainStoreError {
    #[error("empty chain: no blocks recorded")] EmptyChain,
    #[error("no main-chain block at or below height {from}")] NoMainChainBlock { from: u64 },
    #[error("missing ancestor {hash} at height {height}")] MissingAncestor { hash: String, height: u64 },
    #[error("height index gap: set at {height} with size {size}")] IndexGap { height: u64, size: u64 },
    #[error("corrupt height index size record ({0} bytes)")] CorruptIndexSize(usize),
}

#[derive(Error, Debug)]
pub enum KilnError {
    #[error(transparent)] Codec(#[from] CodecError),
    #[error(transparent)] Kv(#[from] KvError),
    #[error(transparent)] ChainStore(#[from] ChainStoreError),
    #[error("config: {0}")] Config(String),
}
