//! The block format: a whole buffer compressed in one go behind an 8-byte header.
//!
//! Blocks are independent of each other and of the streaming format; there is no windowing
//! and no dictionary. Use them when the data is in memory anyway.

pub mod header;

pub use header::{ElementType, RawHeader, SerializedHeader, BLOCK_MAGIC, HEADER_SIZE};

use std::collections::TryReserveError;
use std::convert::TryFrom;
use byteorder::{ByteOrder, LE};
use fehler::{throw, throws};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::codec::CodecError;
use crate::raw::{self, compress_bound, compress_into, CompressionMode};
use crate::settings::CompressionSettings;
use crate::value::{decode_from_slice, encode_to_vec};

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("{0} bytes are too short for a block header")]
    Truncated(usize),
    #[error("wrong magic bytes in block header: {0:02x?} (expected \"LZ4\")")]
    WrongMagic([u8; 3]),
    #[error("unknown type tag {0} in block header")]
    UnknownTag(u8),
    #[error("block holds {0:?} data, not a serialized value")]
    NotSerialized(ElementType),
    #[error("block holds a serialized value, not raw data")]
    NotRaw,
    #[error("block holds {found:?} data, expected {expected:?}")]
    WrongElementType { expected: ElementType, found: ElementType },
    #[error("header declares {declared} bytes but the payload decompressed to {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("{length} bytes are not a whole number of {width}-byte elements")]
    RaggedPayload { length: usize, width: usize },
    #[error("{0} bytes don't fit the 32-bit length field")]
    TooLarge(usize),
    #[error("couldn't allocate the block buffer")]
    AllocationFailure(#[from] TryReserveError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("serializing the value failed")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("deserializing the value failed")]
    Decode(#[from] bincode::error::DecodeError),
}
type Error = BlockError;

/// A fixed-width value that can be stored in a raw block. All payloads are little-endian.
pub trait Element: Copy {
    const TYPE: ElementType;

    /// `chunk` is exactly `TYPE.width()` bytes long.
    fn write_to(self, chunk: &mut [u8]);
    fn read_from(chunk: &[u8]) -> Self;
}

impl Element for bool {
    const TYPE: ElementType = ElementType::Logical;
    fn write_to(self, chunk: &mut [u8]) { LE::write_i32(chunk, self as i32) }
    fn read_from(chunk: &[u8]) -> Self { LE::read_i32(chunk) != 0 }
}

impl Element for i32 {
    const TYPE: ElementType = ElementType::Integer;
    fn write_to(self, chunk: &mut [u8]) { LE::write_i32(chunk, self) }
    fn read_from(chunk: &[u8]) -> Self { LE::read_i32(chunk) }
}

impl Element for f64 {
    const TYPE: ElementType = ElementType::Real;
    fn write_to(self, chunk: &mut [u8]) { LE::write_f64(chunk, self) }
    fn read_from(chunk: &[u8]) -> Self { LE::read_f64(chunk) }
}

/// Real and imaginary part.
impl Element for [f64; 2] {
    const TYPE: ElementType = ElementType::Complex;
    fn write_to(self, chunk: &mut [u8]) { LE::write_f64_into(&self, chunk) }
    fn read_from(chunk: &[u8]) -> Self {
        let mut pair = [0.0; 2];
        LE::read_f64_into(chunk, &mut pair);
        pair
    }
}

impl Element for u8 {
    const TYPE: ElementType = ElementType::Raw;
    fn write_to(self, chunk: &mut [u8]) { chunk[0] = self }
    fn read_from(chunk: &[u8]) -> Self { chunk[0] }
}

#[throws]
fn length_field(length: usize) -> u32 {
    u32::try_from(length).map_err(|_| Error::TooLarge(length))?
}

/// Header followed by the compressed payload.
#[throws]
fn frame(header: [u8; HEADER_SIZE], payload: &[u8], mode: CompressionMode) -> Vec<u8> {
    let mut framed = Vec::new();
    framed.try_reserve_exact(HEADER_SIZE + compress_bound(payload.len()))?;
    framed.extend_from_slice(&header);
    compress_into(payload, 0, mode, &mut framed)
        .map_err(|source| CodecError::CompressionFailure { block: 0, source })?;
    debug!("block of {} bytes compressed to {}", payload.len(), framed.len() - HEADER_SIZE);
    framed
}

/// Decompress a payload that must come out at exactly `raw_length` bytes.
#[throws]
fn inflate(payload: &[u8], raw_length: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(raw_length)?;
    raw::decompress_block(payload, &[], &mut bytes, raw_length)
        .map_err(|source| CodecError::DecompressionFailure { block: 0, source })?;
    if bytes.len() != raw_length {
        throw!(Error::LengthMismatch { declared: raw_length, actual: bytes.len() });
    }
    bytes
}

impl<'a> CompressionSettings<'a> {
    /// Compress `bytes` into a raw block tagged with `element`.
    /// The length has to be a whole number of elements.
    #[throws(BlockError)]
    pub fn compress_block(&self, bytes: &[u8], element: ElementType) -> Vec<u8> {
        if bytes.len() % element.width() != 0 {
            throw!(Error::RaggedPayload { length: bytes.len(), width: element.width() });
        }
        let header = RawHeader { element, raw_length: length_field(bytes.len())? };
        frame(header.to_bytes(), bytes, self.mode())?
    }

    #[throws(BlockError)]
    pub fn compress_slice<E: Element>(&self, values: &[E]) -> Vec<u8> {
        let width = E::TYPE.width();
        let length = values.len().checked_mul(width).ok_or(Error::TooLarge(usize::MAX))?;
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(length)?;
        bytes.resize(length, 0);
        for (value, chunk) in values.iter().zip(bytes.chunks_exact_mut(width)) {
            value.write_to(chunk);
        }
        self.compress_block(&bytes, E::TYPE)?
    }

    /// Serialize `value` in memory and compress it as a single block.
    #[throws(BlockError)]
    pub fn serialize_block<T: Serialize + ?Sized>(&self, value: &T) -> Vec<u8> {
        let bytes = encode_to_vec(value)?;
        let header = SerializedHeader { raw_length: length_field(bytes.len())? };
        frame(header.to_bytes(), &bytes, self.mode())?
    }
}

/// Compress raw bytes with the default settings.
#[throws]
pub fn compress_block(bytes: &[u8]) -> Vec<u8> {
    CompressionSettings::default().compress_block(bytes, ElementType::Raw)?
}

/// Decompress a raw block, returning the element type it was tagged with and its bytes.
#[throws]
pub fn decompress_block(framed: &[u8]) -> (ElementType, Vec<u8>) {
    let (header, payload) = RawHeader::parse(framed)?;
    let raw_length = header.raw_length as usize;
    let width = header.element.width();
    if raw_length % width != 0 {
        throw!(Error::RaggedPayload { length: raw_length, width });
    }
    (header.element, inflate(payload, raw_length)?)
}

#[throws]
pub fn decompress_slice<E: Element>(framed: &[u8]) -> Vec<E> {
    let (element, bytes) = decompress_block(framed)?;
    if element != E::TYPE {
        throw!(Error::WrongElementType { expected: E::TYPE, found: element });
    }
    bytes.chunks_exact(element.width()).map(E::read_from).collect()
}

/// Decompress and deserialize a block written by `serialize_block`.
#[throws]
pub fn unserialize_block<T: DeserializeOwned>(framed: &[u8]) -> T {
    let (header, payload) = SerializedHeader::parse(framed)?;
    let bytes = inflate(payload, header.raw_length as usize)?;
    // the payload is exactly raw_length bytes, which also bounds what decoding may claim
    decode_from_slice(&bytes)?
}
