//! Binary codec for the per-height list of [`BlockMetadata`].
//!
//! New data is always written as RLP:
//!
//! ```text
//! [ [hash, cumulative_difficulty, main_chain], ... ]
//! ```
//!
//! `cumulative_difficulty` is big-endian with no leading zeros (zero is the
//! empty string); `main_chain` is the single byte `0x01` when set and the
//! empty string otherwise. Decoding treats any flag other than `0x01`, or a
//! missing flag, as not-main-chain.
//!
//! Bytes that fail to decode as RLP are retried through the
//! [`legacy`](crate::legacy) reader. That path only exists to read index
//! entries written before the RLP format and is never used for writes.

use alloy_rlp::{Encodable, Header};
use num_bigint::BigUint;
use num_traits::Zero;

use kiln_core::error::CodecError;
use kiln_core::types::{BlockMetadata, Hash256};

use crate::legacy;

/// Format a metadata list was decoded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataFormat {
    /// Current RLP layout.
    Rlp,
    /// Pre-RLP object stream, readable for migration only.
    Legacy,
}

const MAIN_CHAIN_FLAG: u8 = 0x01;

/// Encode a metadata list in the RLP layout.
pub fn encode(records: &[BlockMetadata]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = records.iter().map(encode_record).collect();
    let payload_length = encoded.iter().map(Vec::len).sum();

    let mut out = Vec::with_capacity(payload_length + 9);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    for record in &encoded {
        out.extend_from_slice(record);
    }
    out
}

/// Decode a metadata list, falling back to the legacy stream format.
pub fn decode(bytes: &[u8]) -> Result<Vec<BlockMetadata>, CodecError> {
    decode_tagged(bytes).map(|(records, _)| records)
}

/// Decode a metadata list and report which format it was stored in.
///
/// # Errors
///
/// [`CodecError::Unreadable`] if neither format accepts the bytes. This
/// means corruption or an unsupported layout and is not recoverable.
pub fn decode_tagged(bytes: &[u8]) -> Result<(Vec<BlockMetadata>, MetadataFormat), CodecError> {
    let rlp_err = match decode_rlp(bytes) {
        Ok(records) => return Ok((records, MetadataFormat::Rlp)),
        Err(e) => e,
    };

    match legacy::decode(bytes) {
        Ok(records) => {
            tracing::debug!(
                records = records.len(),
                "decoded block metadata through legacy fallback"
            );
            Ok((records, MetadataFormat::Legacy))
        }
        Err(legacy_err) => Err(CodecError::Unreadable {
            rlp: rlp_err.to_string(),
            legacy: legacy_err.to_string(),
        }),
    }
}

fn encode_record(record: &BlockMetadata) -> Vec<u8> {
    let hash: &[u8] = record.hash.as_ref();
    let difficulty = difficulty_bytes(&record.cumulative_difficulty);
    let flag: &[u8] = if record.main_chain {
        &[MAIN_CHAIN_FLAG]
    } else {
        &[]
    };

    let payload_length = hash.length() + difficulty.as_slice().length() + flag.length();
    let mut out = Vec::with_capacity(payload_length + 3);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    hash.encode(&mut out);
    difficulty.as_slice().encode(&mut out);
    flag.encode(&mut out);
    out
}

/// Big-endian minimal bytes; zero encodes as the empty string.
fn difficulty_bytes(value: &BigUint) -> Vec<u8> {
    if value.is_zero() {
        Vec::new()
    } else {
        value.to_bytes_be()
    }
}

fn decode_rlp(bytes: &[u8]) -> Result<Vec<BlockMetadata>, CodecError> {
    let rlp = |e: alloy_rlp::Error| CodecError::Rlp(e.to_string());

    let mut buf = bytes;
    let mut outer = Header::decode_bytes(&mut buf, true).map_err(rlp)?;
    if !buf.is_empty() {
        return Err(CodecError::Rlp(format!(
            "{} trailing bytes after metadata list",
            buf.len()
        )));
    }

    let mut records = Vec::new();
    while !outer.is_empty() {
        let mut fields = Header::decode_bytes(&mut outer, true).map_err(rlp)?;
        let hash = Header::decode_bytes(&mut fields, false).map_err(rlp)?;
        let difficulty = Header::decode_bytes(&mut fields, false).map_err(rlp)?;
        let flag = if fields.is_empty() {
            &[][..]
        } else {
            Header::decode_bytes(&mut fields, false).map_err(rlp)?
        };
        if !fields.is_empty() {
            return Err(CodecError::Rlp(
                "metadata record has more than three fields".into(),
            ));
        }

        records.push(BlockMetadata {
            hash: Hash256::from_slice(hash)?,
            cumulative_difficulty: BigUint::from_bytes_be(difficulty),
            main_chain: flag.first() == Some(&MAIN_CHAIN_FLAG),
        });
    }
    Ok(records)
}
