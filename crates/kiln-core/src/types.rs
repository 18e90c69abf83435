//! Core storage types: hashes, blocks, and per-height block metadata.
//!
//! Cumulative difficulty is an arbitrary-precision unsigned integer; every
//! other numeric field is a u64.

use num_bigint::BigUint;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::constants::{HASH_LEN, SHORT_HASH_HEX_LEN};
use crate::error::{CodecError, KilnError};
use crate::traits::ChainBlock;

/// A 32-byte hash value.
///
/// Identifies blocks (double SHA-256 of the header) and transaction roots.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, bincode::Encode,
    bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash. Used as the parent of genesis.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a slice, rejecting anything but 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let array: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| CodecError::InvalidHashLength(bytes.len()))?;
        Ok(Self(array))
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Abbreviated hex form for operator output.
    pub fn short(&self) -> String {
        let mut full = hex::encode(self.0);
        full.truncate(SHORT_HASH_HEX_LEN);
        full
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Per-block record kept in the height index.
///
/// One entry exists for every block recorded at a height, canonical or not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockMetadata {
    /// Hash of the block this record describes.
    pub hash: Hash256,
    /// Sum of this block's difficulty and all of its ancestors'.
    pub cumulative_difficulty: BigUint,
    /// Whether the block is currently canonical at its height.
    pub main_chain: bool,
}

impl BlockMetadata {
    pub fn new(hash: Hash256, cumulative_difficulty: BigUint, main_chain: bool) -> Self {
        Self {
            hash,
            cumulative_difficulty,
            main_chain,
        }
    }
}

/// Block header.
///
/// Hash is computed as double SHA-256 over a fixed byte layout.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct BlockHeader {
    /// Protocol version.
    pub version: u64,
    /// Height of this block above genesis.
    pub number: u64,
    /// Hash of the parent block header.
    pub parent_hash: Hash256,
    /// SHA-256 commitment to the block's transactions.
    pub tx_root: Hash256,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// This block's own difficulty.
    pub difficulty: u64,
    /// Proof-of-work nonce.
    pub nonce: u64,
    /// Free-form miner data.
    pub extra_data: Vec<u8>,
}

impl BlockHeader {
    /// Compute the block header hash (double SHA-256).
    ///
    /// Layout: version || number || parent_hash || tx_root || timestamp ||
    /// difficulty || nonce || len(extra_data) || extra_data, integers
    /// little-endian.
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(6 * 8 + 2 * 32 + 8 + self.extra_data.len());
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(&self.number.to_le_bytes());
        data.extend_from_slice(self.parent_hash.as_bytes());
        data.extend_from_slice(self.tx_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.difficulty.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        data.extend_from_slice(&(self.extra_data.len() as u64).to_le_bytes());
        data.extend_from_slice(&self.extra_data);
        let first = Sha256::digest(&data);
        let second = Sha256::digest(first);
        Hash256(second.into())
    }
}

/// A block: header plus opaque transaction payloads.
///
/// Transaction contents are not interpreted by the store.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Vec<u8>>,
}

impl Block {
    /// Header hash, which is the block's identity.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }
}

/// SHA-256 over the concatenated SHA-256 digests of each payload.
pub fn transactions_root(transactions: &[Vec<u8>]) -> Hash256 {
    let mut hasher = Sha256::new();
    for tx in transactions {
        hasher.update(Sha256::digest(tx));
    }
    Hash256(hasher.finalize().into())
}

impl ChainBlock for Block {
    type Header = BlockHeader;

    fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    fn parent_hash(&self) -> Hash256 {
        self.header.parent_hash
    }

    fn number(&self) -> u64 {
        self.header.number
    }

    fn header(&self) -> BlockHeader {
        self.header.clone()
    }

    fn encode(&self) -> Result<Vec<u8>, KilnError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CodecError::Block(e.to_string()).into())
    }

    fn decode(bytes: &[u8]) -> Result<Self, KilnError> {
        let (block, _): (Block, _) =
            bincode::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| CodecError::Block(e.to_string()))?;
        Ok(block)
    }
}
