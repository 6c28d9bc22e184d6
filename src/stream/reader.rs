use std::mem;
use byteorder::{ByteOrder, LE};
use fehler::{throw, throws};
use log::debug;

use super::sink::Feed;
use super::window::DoubleBuffer;
use super::{StreamError, BLOCK_HEADER_SIZE, BUF_SIZE, MAGIC};
use crate::codec::LZ4StreamDecoder;
use crate::raw::compress_bound;

type Error = StreamError;

/// Reads an LZ4 stream.
///
/// Each block is decompressed into the window that is not holding the previous block, so the
/// previous block stays available as history for the codec.
pub struct LZ4StreamReader<'a> {
    feed: Feed<'a>,
    windows: DoubleBuffer,
    decoder: LZ4StreamDecoder,
    compressed: Vec<u8>,
}

impl<'a> LZ4StreamReader<'a> {
    /// Check the stream magic and prepare for reading.
    /// `dictionary` has to be the one the stream was written with.
    #[throws]
    pub fn new(mut feed: Feed<'a>, dictionary: Option<&[u8]>) -> Self {
        let mut magic = [0u8; 4];
        feed.take(&mut magic)?;
        if &magic != MAGIC {
            throw!(Error::WrongMagic(magic));
        }

        let mut decoder = LZ4StreamDecoder::new();
        if let Some(dictionary) = dictionary {
            decoder.load_dictionary(dictionary)?;
        }

        let windows = DoubleBuffer::allocate(BUF_SIZE)?;
        let mut compressed = Vec::new();
        compressed.try_reserve_exact(compress_bound(BUF_SIZE))?;

        LZ4StreamReader { feed, windows, decoder, compressed }
    }

    /// Number of blocks decompressed so far.
    pub fn blocks_read(&self) -> u64 { self.decoder.blocks() }

    /// Fill `out` with the next bytes of the stream, pulling in as many blocks as that takes.
    #[throws]
    pub fn consume(&mut self, mut out: &mut [u8]) {
        while out.len() > self.windows.active().unread().len() {
            let window = self.windows.active_mut();
            let available = window.bytes.len() - window.pos;
            let (head, tail) = mem::take(&mut out).split_at_mut(available);
            head.copy_from_slice(window.unread());
            window.pos += available;
            out = tail;

            self.windows.swap();
            self.refill()?;
        }

        let window = self.windows.active_mut();
        let end = window.pos + out.len();
        out.copy_from_slice(&window.bytes[window.pos..end]);
        window.pos = end;
    }

    /// Read the next block into the (already emptied) active window.
    #[throws]
    fn refill(&mut self) {
        let block = self.decoder.blocks();

        let mut header = [0u8; BLOCK_HEADER_SIZE];
        self.feed.take(&mut header)?;
        let raw_length = LE::read_u32(&header[..4]) as usize;
        let compressed_length = LE::read_u32(&header[4..]) as usize;
        if raw_length > BUF_SIZE {
            throw!(Error::BlockSizeOverflow { block, declared: raw_length });
        }
        if compressed_length > compress_bound(BUF_SIZE) {
            throw!(Error::BlockSizeOverflow { block, declared: compressed_length });
        }

        // within the reserved capacity
        self.compressed.resize(compressed_length, 0);
        self.feed.take(&mut self.compressed)?;

        let (active, history) = self.windows.split();
        self.decoder.decompress_block(&history.bytes, &self.compressed, &mut active.bytes, BUF_SIZE)?;
        if active.bytes.len() != raw_length {
            throw!(Error::BlockSizeMismatch { block, declared: raw_length, actual: active.bytes.len() });
        }

        debug!("block {}: {} bytes decompressed to {}", block, compressed_length, raw_length);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::CompressionSettings;
    use crate::stream::sink::Sink;
    use crate::stream::writer::LZ4StreamWriter;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8 ^ (i / 4096) as u8).collect()
    }

    fn write_in_chunks(data: &[u8], chunk: usize, settings: &CompressionSettings<'_>) -> Vec<u8> {
        let mut writer = LZ4StreamWriter::new(Sink::memory().unwrap(), settings).unwrap();
        for piece in data.chunks(chunk) {
            writer.append(piece).unwrap();
        }
        writer.finish().unwrap().unwrap()
    }

    fn read_in_chunks(stream: &[u8], len: usize, chunk: usize, dictionary: Option<&[u8]>) -> (Vec<u8>, u64) {
        let mut reader = LZ4StreamReader::new(Feed::from_slice(stream), dictionary).unwrap();
        let mut out = vec![0u8; len];
        for piece in out.chunks_mut(chunk) {
            reader.consume(piece).unwrap();
        }
        (out, reader.blocks_read())
    }

    #[test]
    fn boundary_lengths_round_trip() {
        let settings = CompressionSettings::default();
        for &len in &[0, 1, BUF_SIZE - 1, BUF_SIZE, BUF_SIZE + 1, 3 * BUF_SIZE + 7] {
            let data = pattern(len);
            let stream = write_in_chunks(&data, 8 * 1024, &settings);
            // reads deliberately use a different granularity than the writes
            let (back, _) = read_in_chunks(&stream, len, 5_000, None);
            assert!(back == data, "round trip failed for {} bytes", len);
        }
    }

    #[test]
    fn one_read_may_span_several_blocks() {
        let data = pattern(3 * BUF_SIZE + 7);
        let stream = write_in_chunks(&data, 64 * 1024, &CompressionSettings::default());
        let (back, blocks) = read_in_chunks(&stream, data.len(), data.len(), None);
        assert!(back == data);
        assert_eq!(blocks, 4);
    }

    #[test]
    fn high_compression_streams_read_back() {
        let mut settings = CompressionSettings::default();
        settings.high_compression(true).compression_level(4);
        let data = pattern(BUF_SIZE + 1000);
        let stream = write_in_chunks(&data, 30_000, &settings);
        let (back, _) = read_in_chunks(&stream, data.len(), 777, None);
        assert!(back == data);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut stream = write_in_chunks(b"hello", 5, &CompressionSettings::default());
        stream[0] = b'X';
        match LZ4StreamReader::new(Feed::from_slice(&stream), None) {
            Err(StreamError::WrongMagic(magic)) => assert_eq!(&magic, b"XZ4S"),
            Err(other) => panic!("expected wrong magic, got {:?}", other),
            Ok(_) => panic!("corrupted magic was accepted"),
        }
    }

    #[test]
    fn truncated_stream_is_a_short_read() {
        let data = pattern(10_000);
        let stream = write_in_chunks(&data, 1000, &CompressionSettings::default());
        let truncated = &stream[..stream.len() - 3];

        let mut reader = LZ4StreamReader::new(Feed::from_slice(truncated), None).unwrap();
        let mut out = vec![0u8; data.len()];
        match reader.consume(&mut out) {
            Err(StreamError::ShortRead { wanted, got }) => assert_eq!(wanted - got, 3),
            other => panic!("expected a short read, got {:?}", other),
        }
    }

    #[test]
    fn reading_past_the_end_fails() {
        let stream = write_in_chunks(b"twelve bytes", 12, &CompressionSettings::default());
        let mut reader = LZ4StreamReader::new(Feed::from_slice(&stream), None).unwrap();
        let mut out = [0u8; 13];
        assert!(matches!(reader.consume(&mut out), Err(StreamError::ShortRead { wanted: 8, got: 0 })));
    }

    #[test]
    fn lying_raw_length_is_caught() {
        let stream = write_in_chunks(b"some bytes that compress to something", 64, &CompressionSettings::default());
        let mut forged = stream.clone();
        LE::write_u32(&mut forged[4..8], 10);

        let mut reader = LZ4StreamReader::new(Feed::from_slice(&forged), None).unwrap();
        let mut out = [0u8; 4];
        match reader.consume(&mut out) {
            Err(StreamError::BlockSizeMismatch { block: 0, declared: 10, actual }) => assert_eq!(actual, 37),
            other => panic!("expected a size mismatch, got {:?}", other),
        }

        LE::write_u32(&mut forged[4..8], BUF_SIZE as u32 + 1);
        let mut reader = LZ4StreamReader::new(Feed::from_slice(&forged), None).unwrap();
        assert!(matches!(reader.consume(&mut out), Err(StreamError::BlockSizeOverflow { block: 0, .. })));
    }

    #[test]
    fn dictionary_round_trip() {
        let dictionary = pattern(20_000);
        let mut settings = CompressionSettings::default();
        settings.dictionary(&dictionary);

        let data = pattern(5_000);
        let stream = write_in_chunks(&data, 100, &settings);
        let plain = write_in_chunks(&data, 100, &CompressionSettings::default());
        assert!(stream.len() < plain.len());

        let (back, _) = read_in_chunks(&stream, data.len(), 100, Some(&dictionary));
        assert!(back == data);
    }
}
