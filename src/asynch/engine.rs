use embassy_time::{Duration, Instant, Timer};
use embedded_io::ReadReady as _;
use embedded_io_async::{Read as _, Write as _};

use crate::buffer::{Matcher, PagedStorage, ResponseBuffer};
use crate::error::Error;
use crate::fmt::ascii;

use super::ByteChannel;

/// Size of the scratch area used for channel reads and response decoding.
pub const SCRATCH_LEN: usize = 192;

/// Which pattern a wait ended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Matched {
    Timeout = 0,
    Expected = 1,
    Alternate = 2,
}

/// Outcome of waiting for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingMatch {
    pub matched: Matched,
    /// Bytes from the oldest buffered one through the end of the match, `0`
    /// on timeout.
    pub len: usize,
}

impl PendingMatch {
    const TIMEOUT: Self = Self {
        matched: Matched::Timeout,
        len: 0,
    };

    /// `0` for timeout, `1` for the expected and `2` for the alternate pattern.
    pub fn index(&self) -> u8 {
        self.matched as u8
    }

    pub fn is_expected(&self) -> bool {
        self.matched == Matched::Expected
    }

    pub fn is_timeout(&self) -> bool {
        self.matched == Matched::Timeout
    }

    /// Expected pattern as `Ok(len)`, anything else as an error.
    pub fn expected(self) -> Result<usize, Error> {
        match self.matched {
            Matched::Expected => Ok(self.len),
            Matched::Alternate => Err(Error::Rejected),
            Matched::Timeout => Err(Error::Timeout),
        }
    }
}

/// Pair of patterns looked for in every byte that arrives, whatever
/// command is in flight.
struct Watch {
    success: Matcher<'static>,
    failure: Matcher<'static>,
    hit: Option<Matched>,
}

/// Sends command lines and waits for their responses.
///
/// Owns the serial channel and the [`ResponseBuffer`] every inbound byte is
/// collected into. Waiting is a loop of short sleeps, each followed by a
/// drain of the channel and an incremental pattern search, until a pattern
/// is found or the deadline passes.
pub struct CommandEngine<C, S, const N: usize> {
    channel: C,
    buffer: ResponseBuffer<N, S>,
    scratch: [u8; SCRATCH_LEN],
    check_timer: Instant,
    poll_interval: Duration,
    watch: Option<Watch>,
}

impl<C, S, const N: usize> CommandEngine<C, S, N>
where
    C: ByteChannel,
    S: PagedStorage,
{
    pub fn new(channel: C, buffer: ResponseBuffer<N, S>, poll_interval: Duration) -> Self {
        Self {
            channel,
            buffer,
            scratch: [0; SCRATCH_LEN],
            check_timer: Instant::now(),
            poll_interval,
            watch: None,
        }
    }

    pub fn buffer(&mut self) -> &mut ResponseBuffer<N, S> {
        &mut self.buffer
    }

    pub fn release(self) -> (C, ResponseBuffer<N, S>) {
        (self.channel, self.buffer)
    }

    /// Restart the deadline used by [`check_buffer`](Self::check_buffer).
    pub fn start_timer(&mut self) {
        self.check_timer = Instant::now();
    }

    /// Time since the deadline was last restarted.
    pub fn elapsed(&self) -> Duration {
        self.check_timer.elapsed()
    }

    /// Look for `success` or `failure` in everything received from now on,
    /// including what is still buffered, until [`unwatch`](Self::unwatch).
    ///
    /// Watched bytes are checked as they arrive, so the outcome survives
    /// purges and consumes done on behalf of other commands.
    pub fn watch(&mut self, success: &'static [u8], failure: &'static [u8]) -> Result<(), Error> {
        self.watch = Some(Watch {
            success: self.buffer.matcher(success)?,
            failure: self.buffer.matcher(failure)?,
            hit: None,
        });
        self.scan_watch()
    }

    pub fn unwatch(&mut self) {
        self.watch = None;
    }

    /// Which watched pattern was seen first, if any.
    pub fn watched(&self) -> Option<Matched> {
        self.watch.as_ref().and_then(|w| w.hit)
    }

    fn scan_watch(&mut self) -> Result<(), Error> {
        let Some(watch) = self.watch.as_mut() else {
            return Ok(());
        };
        if watch.hit.is_some() {
            return Ok(());
        }
        if self.buffer.scan(&mut watch.success)?.is_some() {
            watch.hit = Some(Matched::Expected);
        } else if self.buffer.scan(&mut watch.failure)?.is_some() {
            watch.hit = Some(Matched::Alternate);
        }
        Ok(())
    }

    /// Move everything the channel has ready into the response buffer.
    pub async fn drain(&mut self) -> Result<usize, Error> {
        let mut total = 0;
        while self.channel.read_ready().map_err(Error::io)? {
            let n = self
                .channel
                .read(&mut self.scratch)
                .await
                .map_err(Error::io)?;
            if n == 0 {
                break;
            }
            trace!("RX {:?}", ascii(&self.scratch[..n]));
            self.buffer.write(&self.scratch[..n])?;
            self.scan_watch()?;
            total += n;
        }
        Ok(total)
    }

    /// Drop stale bytes, both those still waiting in the channel and those
    /// already buffered.
    pub async fn purge(&mut self) -> Result<(), Error> {
        self.drain().await?;
        self.buffer.clear();
        Ok(())
    }

    /// Send raw bytes, e.g. a payload announced with a preceding command.
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<(), Error> {
        self.channel.write_all(data).await.map_err(Error::io)?;
        self.channel.flush().await.map_err(Error::io)
    }

    /// Purge stale responses and transmit `cmd` terminated by `\r\n`.
    pub async fn send_line(&mut self, cmd: &[u8]) -> Result<(), Error> {
        self.purge().await?;
        debug!("TX {:?}", ascii(cmd));
        self.channel.write_all(cmd).await.map_err(Error::io)?;
        self.channel.write_all(b"\r\n").await.map_err(Error::io)?;
        self.channel.flush().await.map_err(Error::io)
    }

    /// Optionally send `cmd`, then wait up to `timeout` for `expected` or
    /// `alternate` to show up in the response stream.
    ///
    /// Without a command nothing is purged or sent, and waiting continues on
    /// whatever is already buffered.
    pub async fn send_command(
        &mut self,
        cmd: Option<&[u8]>,
        timeout: Duration,
        expected: &[u8],
        alternate: Option<&[u8]>,
    ) -> Result<PendingMatch, Error> {
        if let Some(cmd) = cmd {
            self.send_line(cmd).await?;
        }
        self.check_buffer(expected, alternate, timeout, true).await
    }

    /// Wait for `expected` or `alternate`, `expected` taking precedence when
    /// both are present.
    ///
    /// The deadline counts from the last timer start, which is now when
    /// `start_timer` is set. A timeout is reported as [`Matched::Timeout`],
    /// never as an error.
    pub async fn check_buffer(
        &mut self,
        expected: &[u8],
        alternate: Option<&[u8]>,
        timeout: Duration,
        start_timer: bool,
    ) -> Result<PendingMatch, Error> {
        if start_timer {
            self.start_timer();
        }

        let mut first = self.buffer.matcher(expected)?;
        let mut second = alternate.map(|p| self.buffer.matcher(p)).transpose()?;
        loop {
            Timer::after(self.poll_interval).await;
            self.drain().await?;

            if let Some(len) = self.buffer.scan(&mut first)? {
                return Ok(PendingMatch {
                    matched: Matched::Expected,
                    len,
                });
            }
            if let Some(second) = second.as_mut() {
                if let Some(len) = self.buffer.scan(second)? {
                    return Ok(PendingMatch {
                        matched: Matched::Alternate,
                        len,
                    });
                }
            }

            if self.check_timer.elapsed() >= timeout {
                break;
            }
        }

        warn!("Timeout waiting for {:?}", ascii(expected));
        Ok(PendingMatch::TIMEOUT)
    }

    /// A single drain and search, without sleeping.
    pub async fn poll_once(
        &mut self,
        expected: &[u8],
        alternate: Option<&[u8]>,
    ) -> Result<PendingMatch, Error> {
        self.drain().await?;
        if let Some(len) = self.buffer.find(expected)? {
            return Ok(PendingMatch {
                matched: Matched::Expected,
                len,
            });
        }
        if let Some(alternate) = alternate {
            if let Some(len) = self.buffer.find(alternate)? {
                return Ok(PendingMatch {
                    matched: Matched::Alternate,
                    len,
                });
            }
        }
        Ok(PendingMatch::TIMEOUT)
    }

    /// End offset of `pattern` starting at least `offset` bytes into the
    /// buffer, without draining the channel.
    pub fn find_from(&mut self, offset: usize, pattern: &[u8]) -> Result<Option<usize>, Error> {
        self.buffer.find_from(offset, pattern)
    }

    /// Copy of up to `len` of the oldest buffered bytes, which stay buffered.
    pub fn peek(&mut self, len: usize) -> Result<&[u8], Error> {
        let len = len.min(SCRATCH_LEN);
        let n = self.buffer.peek_at(0, &mut self.scratch[..len])?;
        Ok(&self.scratch[..n])
    }

    /// Drop the `count` oldest buffered bytes.
    pub fn consume(&mut self, count: usize) -> usize {
        self.buffer.consume(count)
    }

    /// Fill `out` with buffered bytes, consuming them, and keep draining the
    /// channel until it is full or `timeout` passes.
    ///
    /// Returns the number of bytes copied. Running out of time with nothing
    /// copied is an error.
    pub async fn receive(&mut self, out: &mut [u8], timeout: Duration) -> Result<usize, Error> {
        self.start_timer();
        let mut copied = 0;
        loop {
            self.drain().await?;
            copied += self.buffer.read(&mut out[copied..], false)?;
            if copied == out.len() {
                return Ok(copied);
            }
            if self.check_timer.elapsed() >= timeout {
                break;
            }
            Timer::after(self.poll_interval).await;
        }

        if copied == 0 {
            Err(Error::Timeout)
        } else {
            Ok(copied)
        }
    }
}
