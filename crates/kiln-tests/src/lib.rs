//! Property-based and scenario test suite for Kiln block storage.
//!
//! Integration tests drive a whole [`BlockStore`](kiln_store::BlockStore)
//! through random block trees, re-branches and reverts, and check the
//! main-chain invariants after every step.

pub mod helpers;
