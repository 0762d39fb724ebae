use crate::error::Error;

/// Longest pattern a [`Matcher`] accepts.
pub const MAX_PATTERN_LEN: usize = 32;

/// Incremental substring search over the response byte stream.
///
/// A matcher remembers the stream position of the next byte it has not seen
/// and how much of the pattern the bytes so far end with, so repeated scans
/// only look at bytes that arrived since the previous one. Matching is
/// therefore independent of how the stream was chunked into writes.
#[derive(Debug, Clone)]
pub struct Matcher<'p> {
    pattern: &'p [u8],
    /// `prefix[i]`: length of the longest proper border of `pattern[..=i]`
    prefix: [u8; MAX_PATTERN_LEN],
    matched: usize,
    next: usize,
}

impl<'p> Matcher<'p> {
    /// Matcher that starts at stream position `start`.
    pub fn new(pattern: &'p [u8], start: usize) -> Result<Self, Error> {
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(Error::Overflow);
        }

        let mut prefix = [0u8; MAX_PATTERN_LEN];
        let mut k = 0;
        for i in 1..pattern.len() {
            while k > 0 && pattern[i] != pattern[k] {
                k = prefix[k - 1] as usize;
            }
            if pattern[i] == pattern[k] {
                k += 1;
            }
            prefix[i] = k as u8;
        }

        Ok(Self {
            pattern,
            prefix,
            matched: 0,
            next: start,
        })
    }

    pub fn pattern(&self) -> &'p [u8] {
        self.pattern
    }

    /// Stream position of the next byte to feed.
    pub fn position(&self) -> usize {
        self.next
    }

    /// Forget any partial match and continue from stream position `start`.
    pub fn restart(&mut self, start: usize) {
        self.matched = 0;
        self.next = start;
    }

    /// Feed the byte at [`position`](Self::position). Returns `true` when it
    /// completes an occurrence of the pattern.
    pub fn feed(&mut self, byte: u8) -> bool {
        self.next = self.next.wrapping_add(1);
        if self.pattern.is_empty() {
            return true;
        }

        if self.matched == self.pattern.len() {
            self.matched = self.prefix[self.matched - 1] as usize;
        }
        while self.matched > 0 && byte != self.pattern[self.matched] {
            self.matched = self.prefix[self.matched - 1] as usize;
        }
        if byte == self.pattern[self.matched] {
            self.matched += 1;
        }
        self.matched == self.pattern.len()
    }
}
