use byteorder::{ByteOrder, LE};
use fehler::{throw, throws};
use log::debug;

use super::sink::Sink;
use super::window::DoubleBuffer;
use super::{StreamError, BLOCK_HEADER_SIZE, BUF_SIZE, MAGIC};
use crate::codec::LZ4StreamEncoder;
use crate::raw::{compress_bound, WINDOW_SIZE};
use crate::settings::CompressionSettings;

type Error = StreamError;

/// Writes an LZ4 stream.
///
/// Bytes are collected in the active window. Once the next append would not fit, the window is
/// compressed as one block (referencing the window before it) and the other window takes over.
/// Each window has room for a block and, in front of it, the last 64 KiB of the block before,
/// which is all a block can reference.
///
/// Call `finish` to write the last block. There is no `Drop` impl: a writer that is dropped,
/// including on the error paths of `serialize_stream`, writes nothing more, so what reached the
/// destination is a truncated stream that readers reject.
pub struct LZ4StreamWriter {
    sink: Sink,
    windows: DoubleBuffer,
    encoder: LZ4StreamEncoder,
    compressed: Vec<u8>,
    bytes_in: u64,
}

impl LZ4StreamWriter {
    #[throws]
    pub fn new(mut sink: Sink, settings: &CompressionSettings<'_>) -> Self {
        let mut encoder = LZ4StreamEncoder::new(settings.mode());
        if let Some(dictionary) = settings.dictionary_bytes() {
            encoder.load_dictionary(dictionary)?;
        }

        let mut windows = DoubleBuffer::allocate(WINDOW_SIZE + BUF_SIZE)?;
        let first = windows.active_mut();
        first.pos = encoder.prepare_window(&[], &mut first.bytes);
        let mut compressed = Vec::new();
        compressed.try_reserve_exact(compress_bound(BUF_SIZE))?;

        sink.put(MAGIC)?;

        LZ4StreamWriter { sink, windows, encoder, compressed, bytes_in: 0 }
    }

    /// Append `bytes` to the stream. A single append may not be larger than a window.
    #[throws]
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.len() > BUF_SIZE {
            throw!(Error::WriteOverflow { length: bytes.len(), capacity: BUF_SIZE });
        }

        let active = self.windows.active();
        if active.bytes.len() - active.pos + bytes.len() > BUF_SIZE {
            self.flush_block()?;
        }

        // capacity was reserved up front, this never reallocates
        self.windows.active_mut().bytes.extend_from_slice(bytes);
        self.bytes_in += bytes.len() as u64;
    }

    /// Total number of bytes appended so far.
    pub fn bytes_in(&self) -> u64 { self.bytes_in }

    #[throws]
    fn flush_block(&mut self) {
        let block = self.encoder.blocks();
        let active = self.windows.active();
        let raw_length = active.bytes.len() - active.pos;

        self.compressed.clear();
        self.encoder.compress_block(&active.bytes, active.pos, &mut self.compressed)?;

        let mut header = [0u8; BLOCK_HEADER_SIZE];
        LE::write_u32(&mut header[..4], raw_length as u32);
        LE::write_u32(&mut header[4..], self.compressed.len() as u32);
        self.sink.put(&header)?;
        self.sink.put(&self.compressed)?;

        debug!("block {}: {} bytes compressed to {}", block, raw_length, self.compressed.len());
        self.windows.swap();
        let (next, previous) = self.windows.split();
        next.pos = self.encoder.prepare_window(&previous.bytes[previous.pos..], &mut next.bytes);
    }

    /// Write the final block (even if it is empty) and close the destination.
    /// Memory destinations return the complete stream.
    #[throws]
    pub fn finish(mut self) -> Option<Vec<u8>> {
        self.flush_block()?;

        let LZ4StreamWriter { sink, windows, encoder, compressed, bytes_in } = self;
        let output = sink.finish()?;
        debug!("stream finished after {} blocks, {} bytes in", encoder.blocks(), bytes_in);

        // codec state goes before the buffers it was reading from
        drop(encoder);
        drop(windows);
        drop(compressed);
        output
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::sink::Sink;

    fn memory_writer() -> LZ4StreamWriter {
        LZ4StreamWriter::new(Sink::memory().unwrap(), &CompressionSettings::default()).unwrap()
    }

    /// (raw_length, compressed_length) of every block in a stream.
    fn blocks(stream: &[u8]) -> Vec<(usize, usize)> {
        assert_eq!(&stream[..4], MAGIC);
        let mut rest = &stream[4..];
        let mut out = Vec::new();
        while !rest.is_empty() {
            let raw = LE::read_u32(&rest[..4]) as usize;
            let compressed = LE::read_u32(&rest[4..8]) as usize;
            out.push((raw, compressed));
            rest = &rest[BLOCK_HEADER_SIZE + compressed..];
        }
        out
    }

    #[test]
    fn empty_stream_has_one_empty_block() {
        let stream = memory_writer().finish().unwrap().unwrap();
        assert_eq!(blocks(&stream), vec![(0, 0)]);
        assert_eq!(stream.len(), MAGIC.len() + BLOCK_HEADER_SIZE);
    }

    #[test]
    fn full_window_is_not_flushed_early() {
        let mut writer = memory_writer();
        writer.append(&vec![7; BUF_SIZE]).unwrap();
        let stream = writer.finish().unwrap().unwrap();
        assert_eq!(blocks(&stream).iter().map(|b| b.0).collect::<Vec<_>>(), vec![BUF_SIZE]);
    }

    #[test]
    fn spans_never_straddle_windows() {
        let mut writer = memory_writer();
        let span = vec![1u8; 300_000];
        writer.append(&span).unwrap();
        writer.append(&span).unwrap(); // doesn't fit next to the first one
        writer.append(&span[..10]).unwrap();
        assert_eq!(writer.bytes_in(), 600_010);

        let stream = writer.finish().unwrap().unwrap();
        let raw: Vec<usize> = blocks(&stream).iter().map(|b| b.0).collect();
        assert_eq!(raw, vec![300_000, 300_010]);
    }

    #[test]
    fn oversize_append_is_rejected() {
        let mut writer = memory_writer();
        match writer.append(&vec![0; BUF_SIZE + 1]) {
            Err(StreamError::WriteOverflow { length, capacity }) => {
                assert_eq!(length, BUF_SIZE + 1);
                assert_eq!(capacity, BUF_SIZE);
            }
            other => panic!("expected an overflow, got {:?}", other),
        }
        assert_eq!(writer.bytes_in(), 0);
    }

    #[test]
    fn windows_carry_their_prefix_without_growing() {
        let mut writer = memory_writer();
        let capacity = writer.windows.active().bytes.capacity();
        assert!(capacity >= WINDOW_SIZE + BUF_SIZE);
        assert_eq!(writer.windows.active().pos, 0);

        let span: Vec<u8> = (0..BUF_SIZE as u32).map(|i| (i % 251) as u8).collect();
        writer.append(&span).unwrap();
        writer.append(b"next").unwrap();

        // the second window starts with the tail of the first block
        let active = writer.windows.active();
        assert_eq!(active.pos, WINDOW_SIZE);
        assert_eq!(&active.bytes[..active.pos], &span[BUF_SIZE - WINDOW_SIZE..]);
        assert_eq!(&active.bytes[active.pos..], b"next");
        assert_eq!(active.bytes.capacity(), capacity);

        writer.append(&span).unwrap();
        writer.append(&span).unwrap();
        assert_eq!(writer.windows.active().bytes.capacity(), capacity);
        let stream = writer.finish().unwrap().unwrap();
        assert_eq!(blocks(&stream).iter().map(|b| b.0).collect::<Vec<_>>(), vec![BUF_SIZE, 4, BUF_SIZE, BUF_SIZE]);
    }

    #[test]
    fn dropped_writer_leaves_a_truncated_stream() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut writer = LZ4StreamWriter::new(Sink::create(tmp.path()).unwrap(), &CompressionSettings::default()).unwrap();
        writer.append(b"never flushed").unwrap();
        drop(writer);

        assert_eq!(std::fs::read(tmp.path()).unwrap(), MAGIC);
        let err = crate::stream::unserialize_stream_from_file::<String, _>(tmp.path(), None).unwrap_err();
        assert!(matches!(err, StreamError::ShortRead { .. }), "got {:?}", err);
    }
}
