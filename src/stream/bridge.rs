//! The `io::Write`/`io::Read` pair the value serializer talks to.
//!
//! The serializer decides how many bytes each call carries. Writes are handed to the stream writer
//! as they come, except that a single call never offers more than one window worth of bytes;
//! `write_all` takes care of the rest. Reads are served from the stream reader, across as many
//! blocks as needed.
//!
//! A failure inside the stream is kept here, so the caller gets the original error instead of
//! whatever the serializer wraps around the `io::Error` it saw.

use std::cmp;
use std::io::{self, ErrorKind, Read, Write};

use super::reader::LZ4StreamReader;
use super::writer::LZ4StreamWriter;
use super::{StreamError, BUF_SIZE};

pub struct WriteBridge<'w> {
    writer: &'w mut LZ4StreamWriter,
    failure: Option<StreamError>,
}

impl<'w> WriteBridge<'w> {
    pub fn new(writer: &'w mut LZ4StreamWriter) -> Self {
        WriteBridge { writer, failure: None }
    }

    /// The stream error that made a write fail, if any.
    pub fn into_failure(self) -> Option<StreamError> {
        self.failure
    }
}

impl<'w> Write for WriteBridge<'w> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let span = &buf[..cmp::min(buf.len(), BUF_SIZE)];
        match self.writer.append(span) {
            Ok(()) => Ok(span.len()),
            Err(e) => Err(stash(&mut self.failure, e)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct ReadBridge<'r, 'a> {
    reader: &'r mut LZ4StreamReader<'a>,
    failure: Option<StreamError>,
}

impl<'r, 'a> ReadBridge<'r, 'a> {
    pub fn new(reader: &'r mut LZ4StreamReader<'a>) -> Self {
        ReadBridge { reader, failure: None }
    }

    /// The stream error that made a read fail, if any.
    pub fn into_failure(self) -> Option<StreamError> {
        self.failure
    }
}

impl<'r, 'a> Read for ReadBridge<'r, 'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_exact(buf)?;
        Ok(buf.len())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.reader.consume(buf).map_err(|e| stash(&mut self.failure, e))
    }
}

fn stash(slot: &mut Option<StreamError>, e: StreamError) -> io::Error {
    let kind = match e {
        StreamError::ShortRead { .. } => ErrorKind::UnexpectedEof,
        _ => ErrorKind::Other,
    };
    let error = io::Error::new(kind, e.to_string());
    *slot = Some(e);
    error
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::CompressionSettings;
    use crate::stream::sink::{Feed, Sink};

    #[test]
    fn huge_writes_are_accepted_in_window_sized_pieces() {
        let mut writer = LZ4StreamWriter::new(Sink::memory().unwrap(), &CompressionSettings::default()).unwrap();
        let data: Vec<u8> = (0..2 * BUF_SIZE + 5).map(|i| (i % 7) as u8).collect();
        {
            let mut bridge = WriteBridge::new(&mut writer);
            assert_eq!(bridge.write(&data).unwrap(), BUF_SIZE);
            bridge.write_all(&data[BUF_SIZE..]).unwrap();
            assert!(bridge.into_failure().is_none());
        }
        assert_eq!(writer.bytes_in(), data.len() as u64);
        let stream = writer.finish().unwrap().unwrap();

        let mut reader = LZ4StreamReader::new(Feed::from_slice(&stream), None).unwrap();
        let mut bridge = ReadBridge::new(&mut reader);
        let mut back = vec![0u8; data.len()];
        bridge.read_exact(&mut back).unwrap();
        assert!(back == data);
    }

    #[test]
    fn read_failures_are_kept() {
        let stream = {
            let mut writer = LZ4StreamWriter::new(Sink::memory().unwrap(), &CompressionSettings::default()).unwrap();
            writer.append(b"abc").unwrap();
            writer.finish().unwrap().unwrap()
        };
        let mut reader = LZ4StreamReader::new(Feed::from_slice(&stream), None).unwrap();
        let mut bridge = ReadBridge::new(&mut reader);
        let mut buf = [0u8; 4];
        let err = bridge.read_exact(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
        assert!(matches!(bridge.into_failure(), Some(StreamError::ShortRead { .. })));
    }
}
