//! Serialize values straight into LZ4-compressed streams, in pure Rust.
//!
//! Two formats are supported:
//!
//! * The streaming format (`"LZ4S"`), written while the value is being serialized. Plaintext is
//!   collected in two alternating windows of [`BUF_SIZE`] bytes; each full window becomes one
//!   compressed block that may reference the window before it. Memory use is bounded no matter
//!   how large the value is. See [`stream`].
//! * The block format (`"LZ4"` plus an 8-byte header), which compresses a whole buffer at once.
//!   See [`block`].
//!
//! Values go through `serde`; the byte encoding is `bincode` with its standard configuration.
//! Decoding refuses lengths the input could not back, and never claims more than [`MAX_VALUE_BYTES`].
//!
//! ```
//! use lz4_serialize::{unserialize_stream_from_slice, CompressionSettings};
//!
//! let value = vec![(1u32, "one".to_string()), (2, "two".to_string())];
//! let stream = CompressionSettings::default().serialize_stream_to_vec(&value)?;
//! let back: Vec<(u32, String)> = unserialize_stream_from_slice(&stream, None)?;
//! assert_eq!(back, value);
//! # Ok::<(), lz4_serialize::StreamError>(())
//! ```

#![forbid(unsafe_code)]

pub mod raw;
pub mod codec;
mod settings;
pub mod stream;
pub mod block;
mod value;

pub use settings::CompressionSettings;
pub use value::MAX_VALUE_BYTES;
pub use stream::{
    serialize_stream, unserialize_stream, unserialize_stream_from_file, unserialize_stream_from_slice,
    Destination, LZ4StreamReader, LZ4StreamWriter, Source, StreamError, BUF_SIZE,
};
pub use block::{
    compress_block, decompress_block, decompress_slice, unserialize_block, BlockError, Element, ElementType,
};
