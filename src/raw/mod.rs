//! The raw LZ4 block format.
//!
//! This is the codec underneath both the streaming and the block format of this crate.
//! A raw block carries no length information and no fallback for incompressible data, so whoever
//! stores raw blocks has to record the decompressed length next to them (both formats here do).
//!
//! Back-references may reach into a prefix that is not part of the block itself. The compressor
//! sees that prefix in front of its cursor, the decompressor receives it as a separate slice.
//! Matches never reach further back than 64 KiB, so only that much of any prefix matters.

mod compress;
mod decompress;

pub use compress::*;
pub use decompress::*;

/// The LZ4 raw format maintains a lookback window of exactly 64KiB.
pub const WINDOW_SIZE: usize = 64 * 1024;

/// The part of `history` a block can actually reference.
pub fn usable_history(history: &[u8]) -> &[u8] {
    &history[history.len().saturating_sub(WINDOW_SIZE)..]
}
