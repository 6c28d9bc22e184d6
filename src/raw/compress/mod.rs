//! The compression algorithm.
//!
//! We make use of hash tables to find duplicates. This gives a reasonable compression ratio with a
//! high performance. It has fixed memory usage, which contrary to other approachs, makes it less
//! memory hungry.
//!
//! Every entry point compresses `input[cursor..]` and is allowed to reference anything in
//! `input[..cursor]`. That prefix is how history windows and dictionaries reach the coder:
//! the caller lays them out in front of the payload and the decompressor is handed the same bytes.

pub mod hc;

use std::mem;
use std::cmp;
use std::io::Write;
use std::convert::{TryInto, TryFrom};
use byteorder::{ByteOrder, NativeEndian, WriteBytesExt, LE};
use fehler::{throws};

type Error = std::io::Error;

/// Duplication dictionary size.
///
/// Every four bytes is assigned an entry. When this number is lower, fewer entries exists, and
/// thus collisions are more likely, hurting the compression ratio.
const DICTIONARY_SIZE: usize = 1 << HASHLOG;
const HASHLOG: usize = 12;
const MINMATCH: usize = 4;

/// Inputs with fewer bytes left than this are emitted as a single literal run.
const LAST_MATCH_START: usize = 12;
/// The trailing bytes of every block have to be literals.
const LAST_LITERALS: usize = 5;

/// The acceleration used unless the caller asks for something else.
pub const DEFAULT_ACCELERATION: usize = 1;
/// Anything above this just skips over the input without ever finding a match.
pub const MAX_ACCELERATION: usize = 65537;

const SKIP_TRIGGER: usize = 6; // for each 64 steps, skip in bigger increments


/// Which of the two match finders to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionMode {
    /// Single-probe hash table. Larger accelerations give up on incompressible data sooner.
    Fast { acceleration: usize },
    /// Hash chains, searched more thoroughly the higher the level (1 to 12).
    High { level: u32 },
}

impl Default for CompressionMode {
    fn default() -> Self {
        CompressionMode::Fast { acceleration: DEFAULT_ACCELERATION }
    }
}

/// Worst case size of compressing `len` bytes (incompressible input plus token overhead).
pub fn compress_bound(len: usize) -> usize {
    len + len / 255 + 16
}


pub trait EncoderTable: Default {
    fn payload_size_limit() -> usize;
    // offset is declared as usize but must not be above payload_size_limit
    fn replace(&mut self, input: &[u8], offset: usize) -> usize;
}

pub struct U32Table {
    dict: [u32; DICTIONARY_SIZE],
}
impl Default for U32Table {
    fn default() -> Self {
        U32Table { dict: [0; DICTIONARY_SIZE] }
    }
}


// on 64 bit systems, we read 64 bits and hash 5 bytes instead of 4
#[cfg(target_pointer_width = "64")]
fn hash_for_u32(input: &[u8]) -> usize {
    // read 64 bits if possible
    let v = input.get(..8).map(NativeEndian::read_u64).unwrap_or(0);
    // we end up only needing 5 bytes but the only case where this becomes
    // zero is at the very end, where we're not allowed to produce matches anyway (see below)

    // calculate a bad but very cheap checksum
    #[cfg(target_endian = "little")] fn checksum_u64(v: u64) -> u64 { (v << 24).wrapping_mul(889523592379) }
    #[cfg(target_endian = "big")] fn checksum_u64(v: u64) -> u64 { (v >> 24).wrapping_mul(11400714785074694791) }
    (checksum_u64(v) >> (64 - HASHLOG)) as usize
}
// on all other systems we simply hash 4 bytes, borrowing the algorithm for the u16 table
#[cfg(not(target_pointer_width = "64"))]
fn hash_for_u32(input: &[u8]) -> usize {
    hash_for_u16(input) >> 1 // shift by one more because we have half as many slots as the u16 table
}

fn hash_for_u16(input: &[u8]) -> usize {
    let v = NativeEndian::read_u32(input);
    (v.wrapping_mul(2654435761) >> (32 - HASHLOG - 1)) as usize // shift by one less than hashlog because we have twice as many slots
}

impl EncoderTable for U32Table {
    fn replace(&mut self, input: &[u8], offset: usize) -> usize {
        let mut value = offset.try_into().expect("EncoderTable contract violated");
        mem::swap(&mut self.dict[hash_for_u32(&input[offset..])], &mut value);
        usize::try_from(value).expect("This code is not supposed to run on a 16-bit arch (let alone smaller)")
    }
    fn payload_size_limit() -> usize { u32::MAX as usize }
}

pub struct U16Table {
    dict: [u16; DICTIONARY_SIZE*2], // u16 fits twice as many slots into the same amount of memory
}
impl Default for U16Table {
    fn default() -> Self {
        U16Table { dict: [0; DICTIONARY_SIZE*2] }
    }
}
impl EncoderTable for U16Table {
    fn replace(&mut self, input: &[u8], offset: usize) -> usize {
        let mut value = offset.try_into().expect("EncoderTable contract violated");
        mem::swap(&mut self.dict[hash_for_u16(&input[offset..])], &mut value);
        usize::from(value)
    }
    fn payload_size_limit() -> usize { u16::MAX as usize }
}


#[derive(Copy, Clone, Debug)]
struct Duplicate {
    /// The number of bytes before our cursor, where the duplicate starts.
    offset: u16,

    /// The length beyond the four first bytes.
    ///
    /// Adding four to this number yields the actual length.
    extra_bytes: usize,
}



fn count_matching_bytes(a: &[u8], b: &[u8]) -> usize {
    const REGSIZE: usize = mem::size_of::<usize>();
    fn read_usize(b: &[u8]) -> usize { // sadly byteorder doesn't have this
        let mut buf = [0u8; REGSIZE];
        buf.copy_from_slice(&b[..REGSIZE]);
        usize::from_le_bytes(buf)
    }
    #[cfg(target_endian = "little")] fn archdep_zeros(i: usize) -> u32 { i.trailing_zeros() }
    #[cfg(target_endian = "big")] fn archdep_zeros(i: usize) -> u32 { i.leading_zeros() }

    let mut matching_bytes = 0;
    // match in chunks of usize so we process a full register at a time instead of single bytes
    for (a, b) in a.chunks_exact(REGSIZE).zip(b.chunks_exact(REGSIZE)) {
        let a = read_usize(a);
        let b = read_usize(b);
        let xor = a ^ b;
        if xor == 0 {
            matching_bytes += REGSIZE;
        } else {
            matching_bytes += (archdep_zeros(xor) / 8/*bits per byte*/) as usize;
            return matching_bytes;
        }
    }

    // we only return here if we ran out of data (i.e. all register-sized chunks have matched)
    // but there may be a few more bytes to check!
    let trailing_matches = a.iter().zip(b).skip(matching_bytes).take_while(|&(a, b)| a == b).count();
    matching_bytes + trailing_matches
}

/// Feed every third position of the prefix into the table so the first bytes of the payload can
/// already find matches in it.
fn prime_table<T: EncoderTable>(table: &mut T, input: &[u8], end: usize) {
    let hashable = input.len().saturating_sub(MINMATCH - 1);
    for offset in (0..cmp::min(end, hashable)).step_by(3) {
        table.replace(input, offset);
    }
}

/// Compress `input[cursor..]` with the given mode, allowing back-references into `input[..cursor]`.
#[throws]
pub fn compress_into<W: Write>(input: &[u8], cursor: usize, mode: CompressionMode, writer: W) {
    assert!(cursor <= input.len(), "cursor points past the end of the input");

    match mode {
        CompressionMode::Fast { acceleration } => {
            let acceleration = cmp::min(cmp::max(acceleration, 1), MAX_ACCELERATION);
            if input.len() <= U16Table::payload_size_limit() {
                let mut table = U16Table::default();
                prime_table(&mut table, input, cursor);
                compress2(input, cursor, &mut table, acceleration, writer)?;
            } else {
                let mut table = U32Table::default();
                prime_table(&mut table, input, cursor);
                compress2(input, cursor, &mut table, acceleration, writer)?;
            }
        }
        CompressionMode::High { level } => hc::compress_hc(input, cursor, level, writer)?,
    }
}

/// Compress all bytes of `input` in fast mode.
pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(compress_bound(input.len()));
    compress_into(input, 0, CompressionMode::default(), &mut buf).expect("writing to a Vec never fails");
    buf
}

#[throws]
fn write_group<W: Write>(mut writer: &mut W, literal: &[u8], duplicate: Duplicate) {
        let literal_len = literal.len();

        let mut token = 0;
        write_lsic_head(&mut token, 4, literal_len);
        write_lsic_head(&mut token, 0, duplicate.extra_bytes);

        writer.write_u8(token)?;
        write_lsic_tail(&mut writer, literal_len)?;
        writer.write_all(literal)?;
        writer.write_u16::<LE>(duplicate.offset)?;
        write_lsic_tail(&mut writer, duplicate.extra_bytes)?;
}

/// The closing literal-only section every block ends with.
#[throws]
fn write_literals<W: Write>(mut writer: &mut W, literal: &[u8]) {
    let mut token = 0;
    write_lsic_head(&mut token, 4, literal.len());
    writer.write_u8(token)?;
    write_lsic_tail(&mut writer, literal.len())?;
    writer.write_all(literal)?;
}

#[throws]
pub fn compress2<W: Write, T: EncoderTable>(input: &[u8], cursor: usize, table: &mut T, acceleration: usize, mut writer: W) {
    assert!(input.len() <= T::payload_size_limit());

    let init_cursor = cursor;
    let mut cursor = cursor;
    while cursor < input.len() {
        let literal_start = cursor;

        let mut step_counter = acceleration << SKIP_TRIGGER;
        let mut step = 1;
        // look for a duplicate
        let duplicate = loop {
            if input.len().saturating_sub(cursor) < LAST_MATCH_START {
                // end with a literal-only section
                // the limit of 13 bytes is somewhat arbitrarily chosen by the format (our decoder doesn't need it)
                // probably to allow some insane decoder optimization they do in C
                write_literals(&mut writer, &input[literal_start..])?;
                return;
            }

            // due to the check above we know there's at least 13 bytes of space
            // we have to chop off the last five bytes though because the format also requires
            // these to be encoded as literals (once again, our decoder does not require this)
            let current_batch = &input[cursor..(input.len() - LAST_LITERALS)];
            let candidate = table.replace(input, cursor);

            // NB: for correctness, only comparing to 0 is needed here (gives better compression ratio with history)
            //     however the reference implementation strictly enforces this
            if (cursor != init_cursor) // can never match on the very first byte
                && cursor - candidate <= 0xFFFF { // must be an addressable offset
                // let's see how many matching bytes we have
                let candidate_batch = &input[candidate..];
                let matching_bytes = count_matching_bytes(current_batch, candidate_batch);

                if let Some(mut extra_bytes) = matching_bytes.checked_sub(MINMATCH) {
                    // if it wasn't, this was just a hash collision :(
                    let offset = (cursor - candidate) as u16;

                    // backtrack
                    let max_backtrack = cursor - literal_start;
                    let backtrack = input[..cursor].iter().rev().zip(input[..candidate].iter().rev()).take(max_backtrack).take_while(|&(a, b)| a == b).count();
                    // offset remains unchanged
                    extra_bytes += backtrack;
                    cursor += matching_bytes;

                    // not sure why exactly cursor - 2, but that's what they do
                    table.replace(input, cursor - 2);

                    break Duplicate { offset, extra_bytes };
                }
            }

            // no match, keep looping
            cursor += step;
            step = step_counter >> SKIP_TRIGGER;

            // the first byte of each iteration doesn't count due to some weird-ass manual loop unrolling in the C code
            if literal_start+1 != cursor {
                step_counter += 1
            }
        };

        // cursor is now pointing past the match
        let literal_end = cursor - duplicate.extra_bytes - MINMATCH;
        write_group(&mut writer, &input[literal_start..literal_end], duplicate)?;
   }
}
fn write_lsic_head(token: &mut u8, shift: usize, value: usize) {
    let i = cmp::min(value, 0xF) as u8;
    *token |= i << shift;
}
#[throws]
fn write_lsic_tail<W: Write>(writer: &mut W, mut value: usize) {
    if value < 0xF {
        return;
    }

    value -= 0xF;

    while value >= 4 * 0xFF {
        writer.write_u32::<NativeEndian>(u32::MAX)?;
        value -= 4 * 0xFF;
    }
    while value >= 0xFF {
        writer.write_u8(0xFF)?;
        value -= 0xFF;
    }
    writer.write_u8(value as u8)?;
}


#[cfg(test)]
mod tests {
    use std::str;
    use super::{compress, compress_into, CompressionMode};
    use crate::raw::decompress::{decompress, decompress_block};

    /// Test that the compressed string decompresses to the original string.
    fn inverse(s: &str) {
        let compressed = compress(s.as_bytes());
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(str::from_utf8(&decompressed).unwrap(), s);
    }

    #[test]
    fn shakespear() {
        inverse("to live or not to live");
        inverse("Love is a wonderful terrible thing");
        inverse("There is nothing either good or bad, but thinking makes it so.");
        inverse("I burn, I pine, I perish.");
    }

    #[test]
    fn not_compressible() {
        inverse("as6yhol.;jrew5tyuikbfewedfyjltre22459ba");
        inverse("jhflkdjshaf9p8u89ybkvjsdbfkhvg4ut08yfrr");
    }

    #[test]
    fn short() {
        inverse("ahhd");
        inverse("ahd");
        inverse("x-29");
        inverse("x");
        inverse(".");
    }

    #[test]
    fn empty_string() {
        inverse("");
    }

    #[test]
    fn nulls() {
        inverse("\0\0\0\0\0\0\0\0\0\0\0\0\0");
    }

    #[test]
    fn compression_works() {
        let s = "The Read trait allows for reading bytes from a source. Implementors of the Read trait are called 'readers'. Readers are defined by one required method, read().";

        inverse(s);

        assert!(compress(s.as_bytes()).len() < s.len());
    }

    #[test]
    fn big_input_uses_wide_table() {
        let s: Vec<u8> = (0..200_000u32).map(|n| (n as u8).wrapping_mul(0xA).wrapping_add(33) ^ 0xA2).collect();
        assert_eq!(decompress(&compress(&s)).unwrap(), s);
    }

    #[test]
    fn prefix_is_referenced() {
        let history = b"the quick brown fox jumps over the lazy dog, again and again and again";
        let payload = b"the quick brown fox jumps over the lazy dog, again and again";
        let mut input = history.to_vec();
        input.extend_from_slice(payload);

        let mut with_history = Vec::new();
        compress_into(&input, history.len(), CompressionMode::default(), &mut with_history).unwrap();
        let alone = compress(payload);
        assert!(with_history.len() < alone.len());

        let mut output = Vec::new();
        decompress_block(&with_history, history, &mut output, payload.len()).unwrap();
        assert_eq!(&output[..], &payload[..]);

        // without the prefix the back-references dangle
        let mut output = Vec::new();
        decompress_block(&with_history, &[], &mut output, payload.len()).unwrap_err();
    }

    #[test]
    fn acceleration_still_round_trips() {
        let s: Vec<u8> = b"abcdefgh".iter().cycle().take(10_000).copied().collect();
        for &acceleration in &[0, 1, 8, 1000, usize::MAX] {
            let mut buf = Vec::new();
            compress_into(&s, 0, CompressionMode::Fast { acceleration }, &mut buf).unwrap();
            assert_eq!(decompress(&buf).unwrap(), s);
        }
    }
}
