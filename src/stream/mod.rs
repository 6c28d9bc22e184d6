//! The streaming format.
//!
//! ```text
//! "LZ4S" { raw_length: u32 LE, compressed_length: u32 LE, compressed bytes }*
//! ```
//!
//! Every block holds at most one window (`BUF_SIZE`) of plaintext and may reference the block
//! before it; the first block may reference the dictionary. A stream always ends with a block,
//! possibly an empty one. There is no end marker: the value decoder knows when it is done.

mod bridge;
mod reader;
mod sink;
mod window;
mod writer;

pub use bridge::{ReadBridge, WriteBridge};
pub use reader::LZ4StreamReader;
pub use sink::{Feed, GrowableBuffer, Sink};
pub use writer::LZ4StreamWriter;

use std::collections::TryReserveError;
use std::convert::TryFrom;
use std::io;
use std::path::{Path, PathBuf};
use fehler::{throw, throws};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::codec::CodecError;
use crate::settings::CompressionSettings;
use crate::value::{decode_from, encode_into};

/// The four magic bytes at the start of every stream.
pub const MAGIC: &[u8; 4] = b"LZ4S";
/// Capacity of each of the two windows, and therefore the largest block.
pub const BUF_SIZE: usize = 512 * 1024;
/// raw_length and compressed_length
const BLOCK_HEADER_SIZE: usize = 8;


/// Errors when writing or reading a stream.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("couldn't allocate stream buffers")]
    AllocationFailure(#[from] TryReserveError),
    #[error("wrong magic bytes in stream header: {0:02x?} (expected \"LZ4S\")")]
    WrongMagic([u8; 4]),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("block {block} declares {declared} bytes, more than a block can hold")]
    BlockSizeOverflow { block: u64, declared: usize },
    #[error("block {block} declares {declared} raw bytes but decompressed to {actual}")]
    BlockSizeMismatch { block: u64, declared: usize, actual: usize },
    #[error("read failed: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },
    #[error("couldn't open {path:?}")]
    OpenFailed { path: PathBuf, #[source] source: io::Error },
    #[error("error reading or writing the stream")]
    Io(#[from] io::Error),
    #[error("a single write of {length} bytes exceeds the window size of {capacity} bytes")]
    WriteOverflow { length: usize, capacity: usize },
    #[error("serializing the value failed")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("deserializing the value failed")]
    Decode(#[from] bincode::error::DecodeError),
}
type Error = StreamError; // do it this way for better docs
impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        io::Error::new(io::ErrorKind::Other, e)
    }
}

/// Where `serialize_stream` puts its output.
#[derive(Clone, Copy, Debug)]
pub enum Destination<'p> {
    File(&'p Path),
    /// Return the stream as a vector.
    Memory,
}

/// Where `unserialize_stream` reads from.
#[derive(Clone, Copy, Debug)]
pub enum Source<'a> {
    File(&'a Path),
    Bytes(&'a [u8]),
}

impl<'a> CompressionSettings<'a> {
    /// Serialize `value` into a stream. Memory destinations return the stream, files return `None`.
    #[throws(StreamError)]
    pub fn serialize_stream<T: Serialize + ?Sized>(&self, value: &T, destination: Destination<'_>) -> Option<Vec<u8>> {
        let sink = match destination {
            Destination::File(path) => Sink::create(path)?,
            Destination::Memory => Sink::memory()?,
        };
        let mut writer = LZ4StreamWriter::new(sink, self)?;
        encode_value(value, &mut writer)?;
        writer.finish()?
    }

    #[throws(StreamError)]
    pub fn serialize_stream_to_file<T: Serialize + ?Sized, P: AsRef<Path>>(&self, value: &T, path: P) {
        self.serialize_stream(value, Destination::File(path.as_ref()))?;
    }

    #[throws(StreamError)]
    pub fn serialize_stream_to_vec<T: Serialize + ?Sized>(&self, value: &T) -> Vec<u8> {
        self.serialize_stream(value, Destination::Memory)?.unwrap_or_default()
    }
}

#[throws]
fn encode_value<T: Serialize + ?Sized>(value: &T, writer: &mut LZ4StreamWriter) {
    let mut bridge = WriteBridge::new(writer);
    if let Err(e) = encode_into(value, &mut bridge) {
        throw!(bridge.into_failure().unwrap_or(Error::Encode(e)));
    }
}

/// Decode a value from a stream of at most `stream_bytes` bytes.
#[throws]
fn decode_value<T: DeserializeOwned>(reader: &mut LZ4StreamReader<'_>, stream_bytes: u64) -> T {
    let mut bridge = ReadBridge::new(reader);
    match decode_from(&mut bridge, plaintext_bound(stream_bytes)) {
        Ok(value) => value,
        Err(e) => throw!(bridge.into_failure().unwrap_or(Error::Decode(e))),
    }
}

/// Every block costs at least a header and holds at most one window.
fn plaintext_bound(stream_bytes: u64) -> usize {
    let blocks = usize::try_from(stream_bytes / BLOCK_HEADER_SIZE as u64).unwrap_or(usize::MAX);
    blocks.saturating_mul(BUF_SIZE)
}

/// Serialize `value` with the given acceleration and optional dictionary.
#[throws]
pub fn serialize_stream<T: Serialize + ?Sized>(
    value: &T,
    destination: Destination<'_>,
    acceleration: usize,
    dictionary: Option<&[u8]>,
) -> Option<Vec<u8>> {
    let mut settings = CompressionSettings::default();
    settings.acceleration(acceleration);
    if let Some(dictionary) = dictionary {
        settings.dictionary(dictionary);
    }
    settings.serialize_stream(value, destination)?
}

/// Read a value back from a stream. `dictionary` must be the one used for writing it.
#[throws]
pub fn unserialize_stream<T: DeserializeOwned>(source: Source<'_>, dictionary: Option<&[u8]>) -> T {
    let feed = match source {
        Source::File(path) => Feed::open(path)?,
        Source::Bytes(bytes) => Feed::from_slice(bytes),
    };
    let stream_bytes = feed.remaining()?;
    let mut reader = LZ4StreamReader::new(feed, dictionary)?;
    decode_value(&mut reader, stream_bytes)?
}

#[throws]
pub fn unserialize_stream_from_file<T: DeserializeOwned, P: AsRef<Path>>(path: P, dictionary: Option<&[u8]>) -> T {
    unserialize_stream(Source::File(path.as_ref()), dictionary)?
}

#[throws]
pub fn unserialize_stream_from_slice<T: DeserializeOwned>(bytes: &[u8], dictionary: Option<&[u8]>) -> T {
    unserialize_stream(Source::Bytes(bytes), dictionary)?
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Reading {
        sensor: String,
        values: Vec<f64>,
        flags: Vec<bool>,
    }

    #[test]
    fn struct_round_trip() {
        let reading = Reading {
            sensor: "north-east".to_string(),
            values: (0..10_000).map(|i| i as f64 * 0.25).collect(),
            flags: (0..777).map(|i| i % 3 == 0).collect(),
        };
        let bytes = CompressionSettings::default().serialize_stream_to_vec(&reading).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        let back: Reading = unserialize_stream_from_slice(&bytes, None).unwrap();
        assert_eq!(back, reading);
    }

    #[test]
    fn free_function_matches_settings() {
        let value = vec!["a".repeat(100), "b".repeat(3)];
        let via_fn = serialize_stream(&value, Destination::Memory, 1, None).unwrap().unwrap();
        let via_settings = CompressionSettings::default().serialize_stream_to_vec(&value).unwrap();
        assert_eq!(via_fn, via_settings);
    }

    #[test]
    fn stream_errors_surface_unwrapped() {
        let bytes = CompressionSettings::default().serialize_stream_to_vec(&vec![1u32; 100]).unwrap();
        // asking for more than was written runs off the end of the stream
        let err = unserialize_stream_from_slice::<(Vec<u32>, u64)>(&bytes, None).unwrap_err();
        assert!(matches!(err, StreamError::ShortRead { .. }), "got {:?}", err);
    }

    #[test]
    fn garbage_length_prefix_is_a_decode_error() {
        // a string claiming 2^62 bytes, followed by two of them
        let garbage = [253, 0, 0, 0, 0, 0, 0, 0, 0x40, b'x', b'y'];
        let mut writer = LZ4StreamWriter::new(Sink::memory().unwrap(), &CompressionSettings::default()).unwrap();
        writer.append(&garbage).unwrap();
        let bytes = writer.finish().unwrap().unwrap();

        let err = unserialize_stream_from_slice::<String>(&bytes, None).unwrap_err();
        assert!(matches!(err, StreamError::Decode(_)), "got {:?}", err);

        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), &bytes).unwrap();
        let err = unserialize_stream_from_file::<String, _>(tmp.path(), None).unwrap_err();
        assert!(matches!(err, StreamError::Decode(_)), "got {:?}", err);
    }

    #[test]
    fn plaintext_is_bounded_by_the_block_count() {
        assert_eq!(plaintext_bound(0), 0);
        assert_eq!(plaintext_bound(7), 0);
        assert_eq!(plaintext_bound(4 + 8 + 3), BUF_SIZE);
        assert_eq!(plaintext_bound(u64::MAX), usize::MAX);
    }
}
