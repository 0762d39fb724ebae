use core::cmp;

/// A fixed capacity byte ring.
///
/// Holds the newest bytes received from the modem. Bytes are appended at the
/// tail and either read in place relative to the oldest byte, or dropped from
/// the head once the caller is done with them.
#[derive(Debug)]
pub struct RingBuffer<const N: usize> {
    storage: [u8; N],
    read_at: usize,
    length: usize,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        Self {
            storage: [0; N],
            read_at: 0,
            length: 0,
        }
    }

    /// Clear the ring buffer.
    pub fn clear(&mut self) {
        self.read_at = 0;
        self.length = 0;
    }

    /// Return the maximum number of bytes in the ring buffer.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Return the current number of bytes in the ring buffer.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Return the number of bytes that can be added to the ring buffer.
    pub fn window(&self) -> usize {
        N - self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_full(&self) -> bool {
        self.window() == 0
    }

    /// Shorthand for `(self.read_at + idx) % N` that tolerates `N == 0`.
    fn get_idx(&self, idx: usize) -> usize {
        if N > 0 {
            (self.read_at + idx) % N
        } else {
            0
        }
    }

    /// Append as many bytes of `data` as fit, and return how many were taken.
    pub fn enqueue_slice(&mut self, data: &[u8]) -> usize {
        if self.length == 0 {
            // Empty ring, restart at the front to keep the data contiguous.
            self.read_at = 0;
        }

        let mut written = 0;
        while written < data.len() && !self.is_full() {
            let write_at = self.get_idx(self.length);
            let contiguous = cmp::min(self.window(), N - write_at);
            let size = cmp::min(contiguous, data.len() - written);
            self.storage[write_at..write_at + size].copy_from_slice(&data[written..written + size]);
            self.length += size;
            written += size;
        }
        written
    }

    /// Return the largest contiguous slice of buffered bytes starting `offset`
    /// bytes past the oldest one, and up to `size` long.
    pub fn get_allocated(&self, offset: usize, size: usize) -> &[u8] {
        if offset >= self.length {
            return &[];
        }
        let start_at = self.get_idx(offset);
        let size = cmp::min(size, self.length - offset);
        let size = cmp::min(size, N - start_at);
        &self.storage[start_at..start_at + size]
    }

    /// Copy buffered bytes starting `offset` bytes past the oldest one into
    /// `data`, and return the amount copied. Nothing is dequeued.
    pub fn read_allocated(&self, offset: usize, data: &mut [u8]) -> usize {
        let mut read = 0;
        while read < data.len() {
            let slice = self.get_allocated(offset + read, data.len() - read);
            if slice.is_empty() {
                break;
            }
            data[read..read + slice.len()].copy_from_slice(slice);
            read += slice.len();
        }
        read
    }

    /// Drop up to `count` of the oldest bytes, and return how many were dropped.
    pub fn dequeue_allocated(&mut self, count: usize) -> usize {
        let count = cmp::min(count, self.length);
        self.read_at = self.get_idx(count);
        self.length -= count;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_length_changes() {
        let mut ring: RingBuffer<2> = RingBuffer::new();
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.capacity(), 2);
        assert_eq!(ring.window(), 2);

        assert_eq!(ring.enqueue_slice(b"a"), 1);
        assert!(!ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.window(), 1);

        assert_eq!(ring.enqueue_slice(b"bc"), 1);
        assert!(ring.is_full());
        assert_eq!(ring.window(), 0);
    }

    #[test]
    fn test_buffer_wraps_around() {
        let mut ring: RingBuffer<6> = RingBuffer::new();
        assert_eq!(ring.enqueue_slice(b"abcd"), 4);
        assert_eq!(ring.dequeue_allocated(3), 3);
        assert_eq!(ring.enqueue_slice(b"efghij"), 5);
        assert!(ring.is_full());

        // First contiguous run stops at the end of the storage
        assert_eq!(ring.get_allocated(0, 6), b"def");
        assert_eq!(ring.get_allocated(3, 6), b"ghi");

        let mut out = [0u8; 6];
        assert_eq!(ring.read_allocated(0, &mut out), 6);
        assert_eq!(&out, b"defghi");

        let mut out = [0u8; 3];
        assert_eq!(ring.read_allocated(2, &mut out), 3);
        assert_eq!(&out, b"fgh");
    }

    #[test]
    fn test_buffer_dequeue_clamps() {
        let mut ring: RingBuffer<4> = RingBuffer::new();
        ring.enqueue_slice(b"xy");
        assert_eq!(ring.dequeue_allocated(10), 2);
        assert!(ring.is_empty());
        assert_eq!(ring.get_allocated(0, 1), b"");

        let mut out = [0u8; 2];
        assert_eq!(ring.read_allocated(5, &mut out), 0);
    }
}
