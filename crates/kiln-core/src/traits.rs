//! Trait interfaces for Kiln.
//!
//! - [`ChainBlock`] — what the store needs from a block type
//! - [`KeyValueStore`](crate::kv::KeyValueStore) — the byte-keyed storage engine,
//!   defined next to its in-memory implementation in [`kv`](crate::kv)

use crate::error::KilnError;
use crate::types::Hash256;

/// A block the store can index.
///
/// The store never looks inside a block beyond these accessors. Two blocks
/// are the same block iff their hashes are equal.
pub trait ChainBlock: Clone + Send + Sync {
    /// Header type returned by [`header`](Self::header).
    type Header: Clone;

    /// Unique identifier of the block.
    fn hash(&self) -> Hash256;

    /// Identifier of the parent block. Genesis points at [`Hash256::ZERO`].
    fn parent_hash(&self) -> Hash256;

    /// Height above genesis.
    fn number(&self) -> u64;

    /// The block's header.
    fn header(&self) -> Self::Header;

    /// Native byte encoding used for the block-body store.
    fn encode(&self) -> Result<Vec<u8>, KilnError>;

    /// Rebuild a block from its native encoding.
    fn decode(bytes: &[u8]) -> Result<Self, KilnError>
    where
        Self: Sized;

    /// Identity comparison.
    ///
    /// Default implementation compares [`hash`](Self::hash).
    fn is_same(&self, other: &Self) -> bool {
        self.hash() == other.hash()
    }
}
