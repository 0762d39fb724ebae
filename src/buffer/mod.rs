//! Response accumulation and pattern search.
//!
//! [`ResponseBuffer`] keeps the bytes received from the modem as one logical
//! stream: the newest bytes live in an in-memory ring of `N` bytes, and when
//! a [`PagedStorage`] is attached, full rings are flushed into a circular
//! window of external memory so the stream can grow far beyond `N`. Without
//! external storage an overflowing ring drops its oldest half.
//!
//! Positions handed to [`Matcher`]s are stream positions, counted from the
//! first byte ever written, so a match in progress survives any number of
//! writes, flushes and ring wraparounds.

mod matcher;
mod ring_buffer;
mod storage;

use core::cmp;

pub use matcher::{Matcher, MAX_PATTERN_LEN};
pub use ring_buffer::RingBuffer;
pub use storage::{NoStorage, PagedStorage};

use crate::error::Error;
use storage::Window;

/// Bytes fetched from the buffer per step while scanning for a pattern.
const SCAN_PAGE: usize = 32;

pub struct ResponseBuffer<const N: usize, S = NoStorage> {
    ring: RingBuffer<N>,
    spill: Option<Window<S>>,
    /// Stream position of the oldest retained byte
    head: usize,
}

impl<const N: usize> ResponseBuffer<N, NoStorage> {
    /// In-memory buffer that drops the oldest half of its content on overflow.
    pub fn new() -> Self {
        let () = Self::NON_EMPTY;
        Self {
            ring: RingBuffer::new(),
            spill: None,
            head: 0,
        }
    }
}

impl<const N: usize> Default for ResponseBuffer<N, NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, S: PagedStorage> ResponseBuffer<N, S> {
    const NON_EMPTY: () = assert!(N > 0, "response buffer needs a non-empty ring");

    /// Buffer whose overflow spills into `window` bytes of `storage` at `base`.
    ///
    /// A zero sized window behaves like [`ResponseBuffer::new`].
    pub fn with_storage(storage: S, base: u32, window: usize) -> Self {
        let () = Self::NON_EMPTY;
        Self {
            ring: RingBuffer::new(),
            spill: (window > 0).then(|| Window::new(storage, base, window)),
            head: 0,
        }
    }

    /// Number of retained bytes.
    pub fn len(&self) -> usize {
        self.spilled() + self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the logical window: the ring plus any external window.
    pub fn capacity(&self) -> usize {
        N + self.spill.as_ref().map(|w| w.capacity()).unwrap_or(0)
    }

    /// Stream position of the oldest retained byte.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Stream position one past the newest byte.
    pub fn tail(&self) -> usize {
        self.head.wrapping_add(self.len())
    }

    fn spilled(&self) -> usize {
        self.spill.as_ref().map(|w| w.len()).unwrap_or(0)
    }

    /// Drop everything, e.g. before issuing a new command.
    pub fn clear(&mut self) {
        self.head = self.tail();
        self.ring.clear();
        if let Some(spill) = self.spill.as_mut() {
            spill.clear();
        }
    }

    /// Append bytes received from the modem.
    ///
    /// Overflow never fails: the ring is flushed to external storage when
    /// one is attached, otherwise its oldest half is discarded.
    pub fn write(&mut self, mut data: &[u8]) -> Result<(), Error> {
        while !data.is_empty() {
            let taken = self.ring.enqueue_slice(data);
            data = &data[taken..];
            if !data.is_empty() {
                self.make_room()?;
            }
        }
        Ok(())
    }

    fn make_room(&mut self) -> Result<(), Error> {
        match self.spill.as_mut() {
            Some(spill) => {
                let mut lost = 0;
                let first = self.ring.get_allocated(0, N);
                lost += spill.push(first)?;
                let second = self.ring.get_allocated(first.len(), N);
                lost += spill.push(second)?;
                self.ring.clear();
                if lost > 0 {
                    warn!("Response window full, {} oldest bytes lost", lost);
                    self.head = self.head.wrapping_add(lost);
                }
            }
            None => {
                let half = cmp::max(N / 2, 1);
                let dropped = self.ring.dequeue_allocated(half);
                warn!("Response buffer full, dropping {} oldest bytes", dropped);
                self.head = self.head.wrapping_add(dropped);
            }
        }
        Ok(())
    }

    /// Copy bytes starting `offset` past the oldest retained one into `buf`,
    /// without consuming them. Returns the amount copied.
    pub fn peek_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize, Error> {
        let mut read = 0;
        let spilled = self.spilled();
        if let Some(spill) = self.spill.as_mut() {
            if offset < spilled {
                read = spill.read(offset, buf)?;
            }
        }
        if read < buf.len() {
            let ring_offset = (offset + read).saturating_sub(spilled);
            read += self.ring.read_allocated(ring_offset, &mut buf[read..]);
        }
        Ok(read)
    }

    /// Copy up to `buf.len()` of the oldest bytes into `buf`, consuming them
    /// unless `peek` is set. Returns the amount copied.
    pub fn read(&mut self, buf: &mut [u8], peek: bool) -> Result<usize, Error> {
        let read = self.peek_at(0, buf)?;
        if !peek {
            self.consume(read);
        }
        Ok(read)
    }

    /// Drop up to `count` of the oldest bytes, and return how many were dropped.
    pub fn consume(&mut self, count: usize) -> usize {
        let mut dropped = 0;
        if let Some(spill) = self.spill.as_mut() {
            dropped += spill.discard(count);
        }
        dropped += self.ring.dequeue_allocated(count - dropped);
        self.head = self.head.wrapping_add(dropped);
        dropped
    }

    /// Matcher for `pattern` positioned at the oldest retained byte.
    pub fn matcher<'p>(&self, pattern: &'p [u8]) -> Result<Matcher<'p>, Error> {
        Matcher::new(pattern, self.head)
    }

    /// Feed `matcher` every byte it has not seen yet.
    ///
    /// Returns the end offset of the first occurrence, counted from the oldest
    /// retained byte through the last byte of the pattern. If bytes the matcher
    /// had not seen were dropped, or it points outside the buffer, it restarts
    /// at the oldest retained byte.
    pub fn scan(&mut self, matcher: &mut Matcher<'_>) -> Result<Option<usize>, Error> {
        let len = self.len();
        if matcher.position().wrapping_sub(self.head) > len {
            matcher.restart(self.head);
        }

        let mut page = [0u8; SCAN_PAGE];
        loop {
            let offset = matcher.position().wrapping_sub(self.head);
            if offset >= len {
                return Ok(None);
            }
            let size = cmp::min(SCAN_PAGE, len - offset);
            let read = self.peek_at(offset, &mut page[..size])?;
            for (i, &b) in page[..read].iter().enumerate() {
                if matcher.feed(b) {
                    return Ok(Some(offset + i + 1));
                }
            }
        }
    }

    /// End offset of the first occurrence of `pattern`, if it is present.
    pub fn find(&mut self, pattern: &[u8]) -> Result<Option<usize>, Error> {
        let mut matcher = self.matcher(pattern)?;
        self.scan(&mut matcher)
    }

    /// End offset of the first occurrence of `pattern` that starts at least
    /// `offset` bytes past the oldest retained byte.
    pub fn find_from(&mut self, offset: usize, pattern: &[u8]) -> Result<Option<usize>, Error> {
        if offset > self.len() {
            return Ok(None);
        }
        let mut matcher = Matcher::new(pattern, self.head.wrapping_add(offset))?;
        self.scan(&mut matcher)
    }

    /// Detach the external storage, dropping its content.
    pub fn release(self) -> Option<S> {
        self.spill.map(|w| w.release())
    }
}
