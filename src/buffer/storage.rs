use core::cmp;
use core::convert::Infallible;

use crate::error::Error;

/// Byte addressable external memory, e.g. an SPI FRAM.
///
/// Only used as overflow space for the response buffer. Offsets are absolute
/// device addresses.
pub trait PagedStorage {
    type Error: core::fmt::Debug;

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error>;
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), Self::Error>;
}

/// Marker for a response buffer without external storage.
#[derive(Debug, Default)]
pub struct NoStorage;

impl PagedStorage for NoStorage {
    type Error = Infallible;

    fn read(&mut self, _offset: u32, _buf: &mut [u8]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn write(&mut self, _offset: u32, _data: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Circular region of `capacity` bytes at `base` inside a [`PagedStorage`].
#[derive(Debug)]
pub(crate) struct Window<S> {
    storage: S,
    base: u32,
    capacity: usize,
    read_at: usize,
    length: usize,
}

impl<S: PagedStorage> Window<S> {
    pub(crate) fn new(storage: S, base: u32, capacity: usize) -> Self {
        Self {
            storage,
            base,
            capacity,
            read_at: 0,
            length: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.length
    }

    pub(crate) fn clear(&mut self) {
        self.read_at = 0;
        self.length = 0;
    }

    pub(crate) fn release(self) -> S {
        self.storage
    }

    /// Drop up to `count` of the oldest bytes, and return how many were dropped.
    pub(crate) fn discard(&mut self, count: usize) -> usize {
        let count = cmp::min(count, self.length);
        if count > 0 {
            self.read_at = (self.read_at + count) % self.capacity;
            self.length -= count;
        }
        count
    }

    /// Append `data`, evicting the oldest bytes when the window is full.
    /// Returns the number of bytes lost to eviction.
    pub(crate) fn push(&mut self, data: &[u8]) -> Result<usize, Error> {
        let mut lost = 0;
        let data = if data.len() > self.capacity {
            lost += data.len() - self.capacity;
            &data[data.len() - self.capacity..]
        } else {
            data
        };

        let overflow = (self.length + data.len()).saturating_sub(self.capacity);
        lost += self.discard(overflow);

        let mut written = 0;
        while written < data.len() {
            let at = (self.read_at + self.length) % self.capacity;
            let size = cmp::min(data.len() - written, self.capacity - at);
            self.storage
                .write(self.base + at as u32, &data[written..written + size])
                .map_err(|_| Error::Storage)?;
            self.length += size;
            written += size;
        }
        Ok(lost)
    }

    /// Copy bytes starting `offset` past the oldest one into `buf`.
    pub(crate) fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize, Error> {
        let available = self.length.saturating_sub(offset);
        let total = cmp::min(available, buf.len());
        let mut read = 0;
        while read < total {
            let idx = (self.read_at + offset + read) % self.capacity;
            let size = cmp::min(total - read, self.capacity - idx);
            self.storage
                .read(self.base + idx as u32, &mut buf[read..read + size])
                .map_err(|_| Error::Storage)?;
            read += size;
        }
        Ok(read)
    }
}
