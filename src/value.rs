//! The value encoding: `bincode` with its standard configuration.
//!
//! Decoding never trusts a length prefix further than the input could back it. bincode claims the
//! in-memory size of everything it decodes against a limit before allocating, so a corrupted prefix
//! (or the garbage a wrong dictionary produces) fails with `DecodeError::LimitExceeded` instead of
//! aborting the process on a huge allocation.

use std::cmp;
use std::io::{Read, Write};
use bincode::config;
use bincode::error::{DecodeError, EncodeError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Upper bound on what decoding a single value may claim, whatever the input size.
#[cfg(target_pointer_width = "64")]
pub const MAX_VALUE_BYTES: usize = 1 << 34;
#[cfg(not(target_pointer_width = "64"))]
pub const MAX_VALUE_BYTES: usize = 1 << 30;

/// bincode claims primitives at their in-memory size; a varint u128 claims 16 bytes for one input byte.
const CLAIMS_PER_INPUT_BYTE: usize = 16;

// limits are const generics, so inputs are sorted into a few tiers
const SMALL_LIMIT: usize = 1 << 24;
const MEDIUM_LIMIT: usize = 1 << 28;

/// The most a value decoded from `input_bound` bytes of encoding can legitimately claim.
pub(crate) fn claim_limit(input_bound: usize) -> usize {
    cmp::min(input_bound.saturating_mul(CLAIMS_PER_INPUT_BYTE), MAX_VALUE_BYTES)
}

pub(crate) fn encode_into<T: Serialize + ?Sized, W: Write>(value: &T, writer: &mut W) -> Result<usize, EncodeError> {
    bincode::serde::encode_into_std_write(value, writer, config::standard())
}

pub(crate) fn encode_to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(value, config::standard())
}

/// Decode from a reader that can produce at most `input_bound` bytes.
pub(crate) fn decode_from<T: DeserializeOwned, R: Read>(reader: &mut R, input_bound: usize) -> Result<T, DecodeError> {
    let limit = claim_limit(input_bound);
    if limit <= SMALL_LIMIT {
        bincode::serde::decode_from_std_read(reader, config::standard().with_limit::<SMALL_LIMIT>())
    } else if limit <= MEDIUM_LIMIT {
        bincode::serde::decode_from_std_read(reader, config::standard().with_limit::<MEDIUM_LIMIT>())
    } else {
        bincode::serde::decode_from_std_read(reader, config::standard().with_limit::<MAX_VALUE_BYTES>())
    }
}

pub(crate) fn decode_from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DecodeError> {
    let limit = claim_limit(bytes.len());
    let (value, _) = if limit <= SMALL_LIMIT {
        bincode::serde::decode_from_slice::<T, _>(bytes, config::standard().with_limit::<SMALL_LIMIT>())?
    } else if limit <= MEDIUM_LIMIT {
        bincode::serde::decode_from_slice::<T, _>(bytes, config::standard().with_limit::<MEDIUM_LIMIT>())?
    } else {
        bincode::serde::decode_from_slice::<T, _>(bytes, config::standard().with_limit::<MAX_VALUE_BYTES>())?
    };
    Ok(value)
}
