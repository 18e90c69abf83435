//! # kiln-core
//! Foundation types and traits for Kiln block storage.

pub mod constants;
pub mod error;
pub mod kv;
pub mod traits;
pub mod types;
