//! High compression mode.
//!
//! Instead of remembering a single position per hash slot, every position is linked to the previous
//! one with the same hash. Walking that chain finds longer matches at the expense of speed; the
//! compression level bounds how many links are followed.
//! The output is an ordinary LZ4 block, the decompressor does not care which mode produced it.

use std::cmp;
use std::io::Write;
use byteorder::{ByteOrder, LE};
use fehler::throws;

use super::{count_matching_bytes, write_group, write_literals, Duplicate, LAST_LITERALS, LAST_MATCH_START, MINMATCH};

type Error = std::io::Error;

pub const DEFAULT_LEVEL: u32 = 9;
pub const MAX_LEVEL: u32 = 12;

const HASH_LOG: usize = 15;
const MAX_DISTANCE: usize = 0xFFFF;
const NIL: u32 = u32::MAX;

/// Map a user supplied level onto the supported range. Zero and negative levels mean "default".
pub fn clamp_level(level: i32) -> u32 {
    if level < 1 {
        DEFAULT_LEVEL
    } else {
        cmp::min(level as u32, MAX_LEVEL)
    }
}

fn hash(input: &[u8], pos: usize) -> usize {
    (LE::read_u32(&input[pos..]).wrapping_mul(2654435761) >> (32 - HASH_LOG)) as usize
}

struct HashChains {
    head: Vec<u32>,
    prev: Vec<u32>,
}

impl HashChains {
    fn new(len: usize) -> Self {
        HashChains { head: vec![NIL; 1 << HASH_LOG], prev: vec![NIL; len] }
    }

    fn insert(&mut self, input: &[u8], pos: usize) {
        let slot = &mut self.head[hash(input, pos)];
        self.prev[pos] = *slot;
        *slot = pos as u32;
    }

    /// Longest earlier occurrence of the bytes at `pos`, as (position, length).
    fn longest_match(&self, input: &[u8], pos: usize, match_end: usize, attempts: usize) -> Option<(usize, usize)> {
        let current = &input[pos..match_end];
        let mut best: Option<(usize, usize)> = None;
        let mut candidate = self.head[hash(input, pos)];

        for _ in 0..attempts {
            if candidate == NIL {
                break;
            }
            let c = candidate as usize;
            // chains only ever point backwards, so everything after this is even farther away
            if pos - c > MAX_DISTANCE {
                break;
            }

            // can't beat the best match if it already differs at that length
            if let Some((_, best_len)) = best {
                if input[c + best_len] != input[pos + best_len] {
                    candidate = self.prev[c];
                    continue;
                }
            }

            let len = count_matching_bytes(current, &input[c..]);
            if len >= MINMATCH && best.map_or(true, |(_, best_len)| len > best_len) {
                best = Some((c, len));
                if pos + len == match_end {
                    break;
                }
            }
            candidate = self.prev[c];
        }
        best
    }
}

/// Compress `input[cursor..]`, referencing `input[..cursor]` where possible.
#[throws]
pub fn compress_hc<W: Write>(input: &[u8], cursor: usize, level: u32, mut writer: W) {
    let level = cmp::min(cmp::max(level, 1), MAX_LEVEL);
    let attempts = 1usize << (level - 1);

    // the hash reads four bytes
    let hashable = input.len().saturating_sub(MINMATCH - 1);
    let match_end = input.len().saturating_sub(LAST_LITERALS);

    let mut chains = HashChains::new(input.len());
    let mut inserted = 0;
    while inserted < cmp::min(cursor, hashable) {
        chains.insert(input, inserted);
        inserted += 1;
    }

    let mut literal_start = cursor;
    let mut pos = cursor;
    while input.len() - pos >= LAST_MATCH_START {
        // catch up on the positions a match skipped over
        while inserted < pos {
            chains.insert(input, inserted);
            inserted += 1;
        }

        let found = chains.longest_match(input, pos, match_end, attempts);
        chains.insert(input, pos);
        inserted = pos + 1;

        match found {
            Some((candidate, len)) => {
                let duplicate = Duplicate { offset: (pos - candidate) as u16, extra_bytes: len - MINMATCH };
                write_group(&mut writer, &input[literal_start..pos], duplicate)?;
                pos += len;
                literal_start = pos;
            }
            None => pos += 1,
        }
    }

    write_literals(&mut writer, &input[literal_start..])?;
}
