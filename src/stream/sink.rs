use std::collections::TryReserveError;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use fehler::{throw, throws};
use log::trace;

use super::{StreamError, BUF_SIZE};

type Error = StreamError;

/// A memory region that doubles its capacity whenever an append would not fit.
pub struct GrowableBuffer {
    data: Vec<u8>,
}

impl GrowableBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)?;
        Ok(GrowableBuffer { data })
    }

    pub fn put(&mut self, bytes: &[u8]) -> Result<(), TryReserveError> {
        let needed = self.data.len() + bytes.len();
        if needed > self.data.capacity() {
            let mut capacity = self.data.capacity().max(1);
            while capacity < needed {
                capacity *= 2;
            }
            trace!("growing memory destination from {} to {} bytes", self.data.capacity(), capacity);
            self.data.try_reserve_exact(capacity - self.data.len())?;
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    pub fn len(&self) -> usize { self.data.len() }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }
    pub fn capacity(&self) -> usize { self.data.capacity() }

    /// Trim to exactly the bytes written and hand them over.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.shrink_to_fit();
        self.data
    }
}

/// Where a stream is written to.
pub enum Sink {
    File(File),
    Memory(GrowableBuffer),
}

impl Sink {
    #[throws]
    pub fn create<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::OpenFailed { path: path.to_owned(), source })?;
        Sink::File(file)
    }

    /// A memory destination starting out with one window worth of capacity.
    #[throws]
    pub fn memory() -> Self {
        Sink::Memory(GrowableBuffer::with_capacity(BUF_SIZE)?)
    }

    #[throws]
    pub fn put(&mut self, bytes: &[u8]) {
        match self {
            Sink::File(file) => file.write_all(bytes)?,
            Sink::Memory(buffer) => buffer.put(bytes)?,
        }
    }

    /// Close the destination. Memory destinations give back their bytes.
    #[throws]
    pub fn finish(self) -> Option<Vec<u8>> {
        match self {
            Sink::File(mut file) => {
                file.flush()?;
                None
            }
            Sink::Memory(buffer) => Some(buffer.into_vec()),
        }
    }
}

/// Where a stream is read from. Memory sources are a read-only view with a cursor.
pub enum Feed<'a> {
    File(File),
    Memory { bytes: &'a [u8], pos: usize },
}

impl<'a> Feed<'a> {
    #[throws]
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::OpenFailed { path: path.to_owned(), source })?;
        Feed::File(file)
    }

    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Feed::Memory { bytes, pos: 0 }
    }

    /// At most this many bytes are left to read. Files report their full length.
    #[throws]
    pub fn remaining(&self) -> u64 {
        match self {
            Feed::File(file) => file.metadata()?.len(),
            Feed::Memory { bytes, pos } => (bytes.len() - pos) as u64,
        }
    }

    /// Fill `buf` completely or fail with the number of bytes that were actually there.
    #[throws]
    pub fn take(&mut self, buf: &mut [u8]) {
        match self {
            Feed::File(file) => {
                let mut got = 0;
                while got < buf.len() {
                    match file.read(&mut buf[got..]) {
                        Ok(0) => break,
                        Ok(n) => got += n,
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => throw!(e),
                    }
                }
                if got != buf.len() {
                    throw!(Error::ShortRead { wanted: buf.len(), got });
                }
            }
            Feed::Memory { bytes, pos } => {
                let available = bytes.len() - *pos;
                if available < buf.len() {
                    throw!(Error::ShortRead { wanted: buf.len(), got: available });
                }
                buf.copy_from_slice(&bytes[*pos..*pos + buf.len()]);
                *pos += buf.len();
            }
        }
    }
}
