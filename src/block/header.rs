//! The 8-byte block header: `"LZ4"`, a tag byte and the uncompressed length as u32 LE.
//!
//! Two schemas share that layout. A [`RawHeader`] tags the payload with the element type of the
//! compressed data, a [`SerializedHeader`] uses tag 0 to say the payload is a serialized value.
//! A reader always asks for the schema it expects; the other one is an error, not a fallback.

use byteorder::{ByteOrder, LE};
use fehler::{throw, throws};

use super::BlockError;

pub const BLOCK_MAGIC: &[u8; 3] = b"LZ4";
pub const HEADER_SIZE: usize = 8;
const SERIALIZED_TAG: u8 = 0;

/// What a raw block holds. The tag values are R's SEXPTYPE codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Booleans, one 32-bit integer each.
    Logical,
    Integer,
    /// 64-bit floats.
    Real,
    /// Pairs of 64-bit floats.
    Complex,
    Raw,
}

impl ElementType {
    pub fn tag(self) -> u8 {
        match self {
            ElementType::Logical => 10,
            ElementType::Integer => 13,
            ElementType::Real => 14,
            ElementType::Complex => 15,
            ElementType::Raw => 24,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            10 => ElementType::Logical,
            13 => ElementType::Integer,
            14 => ElementType::Real,
            15 => ElementType::Complex,
            24 => ElementType::Raw,
            _ => return None,
        })
    }

    /// Size of one element in bytes.
    pub fn width(self) -> usize {
        match self {
            ElementType::Logical | ElementType::Integer => 4,
            ElementType::Real => 8,
            ElementType::Complex => 16,
            ElementType::Raw => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawHeader {
    pub element: ElementType,
    pub raw_length: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializedHeader {
    pub raw_length: u32,
}

fn encode(tag: u8, raw_length: u32) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[..3].copy_from_slice(BLOCK_MAGIC);
    header[3] = tag;
    LE::write_u32(&mut header[4..], raw_length);
    header
}

/// Check the magic and cut the input into tag, length and payload.
#[throws(BlockError)]
fn split(framed: &[u8]) -> (u8, u32, &[u8]) {
    if framed.len() < HEADER_SIZE {
        throw!(BlockError::Truncated(framed.len()));
    }
    let magic = [framed[0], framed[1], framed[2]];
    if &magic != BLOCK_MAGIC {
        throw!(BlockError::WrongMagic(magic));
    }
    (framed[3], LE::read_u32(&framed[4..HEADER_SIZE]), &framed[HEADER_SIZE..])
}

impl RawHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        encode(self.element.tag(), self.raw_length)
    }

    /// Parse the header of `framed`, returning it along with the compressed payload.
    #[throws(BlockError)]
    pub fn parse(framed: &[u8]) -> (Self, &[u8]) {
        let (tag, raw_length, payload) = split(framed)?;
        if tag == SERIALIZED_TAG {
            throw!(BlockError::NotRaw);
        }
        let element = ElementType::from_tag(tag).ok_or(BlockError::UnknownTag(tag))?;
        (RawHeader { element, raw_length }, payload)
    }
}

impl SerializedHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        encode(SERIALIZED_TAG, self.raw_length)
    }

    #[throws(BlockError)]
    pub fn parse(framed: &[u8]) -> (Self, &[u8]) {
        let (tag, raw_length, payload) = split(framed)?;
        if tag != SERIALIZED_TAG {
            match ElementType::from_tag(tag) {
                Some(element) => throw!(BlockError::NotSerialized(element)),
                None => throw!(BlockError::UnknownTag(tag)),
            }
        }
        (SerializedHeader { raw_length }, payload)
    }
}
