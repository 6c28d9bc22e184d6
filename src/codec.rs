//! The streaming codec: raw LZ4 blocks that may reference the block before them.
//!
//! Both halves keep the preset dictionary and a block counter. The first block of a stream is coded
//! against the dictionary (or nothing), every later block against the plaintext of the block right
//! before it, which the caller still holds in its other window and lends out as `history`.
//! Producer and consumer only agree if they were given the same dictionary. A mismatch is not
//! detected here; it shows up as a decoding failure or as different bytes.

use std::collections::TryReserveError;
use std::io;
use fehler::{throw, throws};
use log::trace;
use thiserror::Error;

use crate::raw::{self, compress_into, usable_history, CompressionMode, DecodeError};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("a dictionary has to be loaded before the first block, but {0} block(s) were already processed")]
    LateDictionary(u64),
    #[error("compressing block {block} failed")]
    CompressionFailure { block: u64, #[source] source: io::Error },
    #[error("decompressing block {block} failed: {source}")]
    DecompressionFailure { block: u64, #[source] source: DecodeError },
    #[error("couldn't allocate the codec's working memory")]
    AllocationFailure(#[from] TryReserveError),
}
type Error = CodecError;

/// Keep just the part of a dictionary that back-references can reach.
fn owned_dictionary(dictionary: &[u8]) -> Vec<u8> {
    usable_history(dictionary).to_vec()
}

/// Compressing half of the streaming codec.
///
/// The raw compressor wants the prefix right in front of the block. The encoder does not keep a
/// buffer of its own for that: `prepare_window` copies the prefix into the caller's empty window,
/// and the block is then collected behind it.
pub struct LZ4StreamEncoder {
    mode: CompressionMode,
    dictionary: Vec<u8>,
    blocks: u64,
}

impl LZ4StreamEncoder {
    pub fn new(mode: CompressionMode) -> Self {
        LZ4StreamEncoder { mode, dictionary: Vec::new(), blocks: 0 }
    }

    #[throws]
    pub fn load_dictionary(&mut self, dictionary: &[u8]) {
        if self.blocks != 0 {
            throw!(Error::LateDictionary(self.blocks));
        }
        self.dictionary = owned_dictionary(dictionary);
    }

    pub fn blocks(&self) -> u64 { self.blocks }

    /// Put the prefix the next block may reference into the empty `window` and return its length,
    /// which is where the block starts.
    ///
    /// `history` is the plaintext of the previous block; it is ignored for the first block,
    /// which sees the dictionary instead. At most `WINDOW_SIZE` bytes are copied.
    pub fn prepare_window(&self, history: &[u8], window: &mut Vec<u8>) -> usize {
        debug_assert!(window.is_empty());
        let prefix = if self.blocks == 0 { &self.dictionary[..] } else { usable_history(history) };
        window.extend_from_slice(prefix);
        prefix.len()
    }

    /// Compress the block `window[start..]`, appending the raw LZ4 output to `out`.
    /// `window[..start]` is the prefix laid out by `prepare_window`.
    #[throws]
    pub fn compress_block(&mut self, window: &[u8], start: usize, out: &mut Vec<u8>) {
        out.try_reserve_exact(raw::compress_bound(window.len() - start))?;
        let block_index = self.blocks;
        compress_into(window, start, self.mode, &mut *out)
            .map_err(|source| Error::CompressionFailure { block: block_index, source })?;

        trace!("block {} compressed against {} bytes of history", block_index, start);
        self.blocks += 1;
    }
}

/// Decompressing half of the streaming codec.
pub struct LZ4StreamDecoder {
    dictionary: Vec<u8>,
    blocks: u64,
}

impl LZ4StreamDecoder {
    pub fn new() -> Self {
        LZ4StreamDecoder { dictionary: Vec::new(), blocks: 0 }
    }

    #[throws]
    pub fn load_dictionary(&mut self, dictionary: &[u8]) {
        if self.blocks != 0 {
            throw!(Error::LateDictionary(self.blocks));
        }
        self.dictionary = owned_dictionary(dictionary);
    }

    pub fn blocks(&self) -> u64 { self.blocks }

    /// Decompress one block into `out` (which is cleared first), never producing more than `limit` bytes.
    #[throws]
    pub fn decompress_block(&mut self, history: &[u8], compressed: &[u8], out: &mut Vec<u8>, limit: usize) {
        let prefix = if self.blocks == 0 { &self.dictionary[..] } else { usable_history(history) };

        out.clear();
        raw::decompress_block(compressed, prefix, out, limit)
            .map_err(|source| Error::DecompressionFailure { block: self.blocks, source })?;

        self.blocks += 1;
    }
}

impl Default for LZ4StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}
