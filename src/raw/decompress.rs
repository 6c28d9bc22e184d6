use byteorder::{ReadBytesExt, LE};
use std::io::{Cursor, Read};
use thiserror::Error;

#[derive(Error, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DecodeError {
    /// Expected more bytes, but found none.
    /// Either your input was truncated or you're trying to decompress garbage.
    #[error("the compressed block ended in the middle of a sequence")]
    UnexpectedEnd,
    /// The offset for a deduplication is out of bounds.
    /// This may be caused by a missing or incomplete dictionary.
    #[error("a back-reference points before the start of the available history (missing dictionary?)")]
    InvalidDeduplicationOffset,
    /// A back-reference with offset zero, which no encoder produces.
    #[error("a back-reference has offset zero")]
    ZeroOffset,
    /// The block decompresses to more than the caller allows.
    #[error("the block decompresses to more than {0} bytes")]
    OutputOverflow(usize),
}
type Error = DecodeError;

/// This is how LZ4 encodes varints.
/// Just keep reading and adding while it's all F
fn read_lsic(initial: u8, cursor: &mut Cursor<&[u8]>) -> Result<usize, Error> {
    let mut value = initial as usize;
    if value == 0xF {
        loop {
            let more = cursor.read_u8().map_err(|_| Error::UnexpectedEnd)?;
            value = value.checked_add(more as usize).ok_or(Error::UnexpectedEnd)?;
            if more != 0xff {
                break;
            }
        }
    }
    Ok(value)
}

/// Decompress an LZ4-compressed block.
///
/// Note that LZ4 heavily relies on a lookback mechanism where bytes earlier in the output stream are referenced.
/// You may either pre-initialize the output buffer with this data or pass it separately in `prefix`.
/// Both the history of a stream (the previous block) and a dictionary are passed as `prefix`,
/// since neither is supposed to show up in the output.
///
/// `output` never grows past `limit` bytes; a block that would exceed it is rejected.
pub fn decompress_block(input: &[u8], prefix: &[u8], output: &mut Vec<u8>, limit: usize) -> Result<(), Error> {
    let mut reader = Cursor::new(input);
    loop {
        let token = match reader.read_u8() {
            Ok(x) => x,
            _ => break,
        };

        // read literals
        let literal_length = read_lsic(token >> 4, &mut reader)?;

        let output_pos_pre_literal = output.len();
        if literal_length > limit.saturating_sub(output_pos_pre_literal) {
            return Err(Error::OutputOverflow(limit));
        }
        output.resize(output_pos_pre_literal + literal_length, 0);
        if reader.read_exact(&mut output[output_pos_pre_literal..]).is_err() {
            return Err(Error::UnexpectedEnd);
        }

        // read duplicates
        let offset = match reader.read_u16::<LE>() {
            Ok(x) => x,
            _ => break,
        } as usize;
        let match_len = 4 + read_lsic(token & 0xf, &mut reader)?;
        if match_len > limit.saturating_sub(output.len()) {
            return Err(Error::OutputOverflow(limit));
        }
        copy_overlapping(offset, match_len, prefix, output)?;
    }
    Ok(())
}

fn copy_overlapping(
    offset: usize,
    match_len: usize,
    prefix: &[u8],
    output: &mut Vec<u8>,
) -> Result<(), Error> {
    let old_len = output.len();
    match offset {
        0 => return Err(Error::ZeroOffset),
        i if i > old_len => {
            // need prefix for this
            let prefix_needed = i - old_len;
            if prefix_needed > prefix.len() {
                return Err(Error::InvalidDeduplicationOffset);
            }
            let how_many_bytes_from_prefix = std::cmp::min(prefix_needed, match_len);
            output.extend_from_slice(
                &prefix[prefix.len() - prefix_needed..][..how_many_bytes_from_prefix],
            );
            let remaining_len = match_len - how_many_bytes_from_prefix;
            if remaining_len != 0 {
                // offset stays the same because our curser moved forward by the amount of bytes we took from prefix
                return copy_overlapping(offset, remaining_len, &[], output);
            }
        }

        // fastpath: memset if we repeat the same byte forever
        1 => output.resize(old_len + match_len, output[old_len - 1]),

        o if match_len <= o => {
            // fastpath: nonoverlapping
            // for borrowck reasons we have to extend with zeroes first and then memcpy
            // instead of simply using extend_from_slice
            output.resize(old_len + match_len, 0);
            let (head, tail) = output.split_at_mut(old_len);
            tail.copy_from_slice(&head[old_len - offset..][..match_len]);
        }
        2 | 4 | 8 => {
            // fastpath: overlapping but small

            // speedup: build 16 byte buffer so we can handle 16 bytes each iteration instead of one
            let mut buf = [0u8; 16];
            for chunk in buf.chunks_mut(offset) {
                // if this panics (i.e. chunklen != delta), delta does not divide 16 (but it always does)
                chunk.copy_from_slice(&output[old_len - offset..][..offset]);
            }
            // fill with zero bytes
            output.resize(old_len + match_len, 0);
            // copy buf as often as possible
            for target in output[old_len..].chunks_mut(buf.len()) {
                target.copy_from_slice(&buf[..target.len()]);
            }
        }
        _ => {
            // slowest path: copy single bytes
            output.reserve(match_len);
            for i in 0..match_len {
                let b = output[old_len - offset + i];
                output.push(b);
            }
        }
    }
    Ok(())
}

/// Decompress all bytes of `input`.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, Error> {
    // Allocate a vector to contain the decompressed stream.
    let mut vec = Vec::new();
    decompress_block(input, &[], &mut vec, usize::MAX)?;
    Ok(vec)
}
