//! Scripted stand-ins for the serial link, external memory and board pins.

use core::convert::Infallible;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Once;

use embassy_time::Duration;
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::buffer::PagedStorage;
use crate::config::{ModemConfig, NoPin};

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .is_test(true)
            .try_init();
    });
}

#[derive(Default)]
struct Inner {
    rx: VecDeque<u8>,
    sent: Vec<u8>,
    pending: Vec<u8>,
    script: VecDeque<(Vec<u8>, Vec<u8>)>,
}

/// Serial link answering scripted commands.
///
/// Each expectation pairs the bytes the modem should receive with the reply
/// it sends back. Once everything written since the previous exchange ends
/// with the next expected bytes, its reply becomes readable. Clones share
/// the same link, so a test keeps one clone to script and inspect it.
#[derive(Clone, Default)]
pub struct MockChannel {
    inner: Rc<RefCell<Inner>>,
}

impl MockChannel {
    pub fn new() -> Self {
        init_logger();
        Self::default()
    }

    /// Reply to the command line `cmd`.
    pub fn expect(&self, cmd: &str, reply: &str) {
        let mut key = cmd.as_bytes().to_vec();
        key.extend_from_slice(b"\r\n");
        self.inner
            .borrow_mut()
            .script
            .push_back((key, reply.as_bytes().to_vec()));
    }

    /// Reply to raw bytes, such as a payload, sent without line ending.
    pub fn expect_raw(&self, data: &[u8], reply: &str) {
        self.inner
            .borrow_mut()
            .script
            .push_back((data.to_vec(), reply.as_bytes().to_vec()));
    }

    /// Make unsolicited bytes readable.
    pub fn push_rx(&self, data: &str) {
        self.inner.borrow_mut().rx.extend(data.as_bytes());
    }

    /// Everything written so far.
    pub fn sent(&self) -> Vec<u8> {
        self.inner.borrow().sent.clone()
    }
}

impl embedded_io::ErrorType for MockChannel {
    type Error = Infallible;
}

impl embedded_io::ReadReady for MockChannel {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.inner.borrow().rx.is_empty())
    }
}

impl embedded_io_async::Read for MockChannel {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut inner = self.inner.borrow_mut();
        let n = buf.len().min(inner.rx.len());
        for (dst, src) in buf.iter_mut().zip(inner.rx.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl embedded_io_async::Write for MockChannel {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        inner.sent.extend_from_slice(buf);
        inner.pending.extend_from_slice(buf);

        let answered = matches!(inner.script.front(), Some((key, _)) if inner.pending.ends_with(key));
        if answered {
            if let Some((_, reply)) = inner.script.pop_front() {
                inner.rx.extend(reply);
                inner.pending.clear();
            }
        }
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct OutOfRange;

/// External memory backed by a `Vec`.
pub struct RamStorage {
    mem: Vec<u8>,
}

impl RamStorage {
    pub fn new(size: usize) -> Self {
        Self { mem: vec![0; size] }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mem
    }
}

impl PagedStorage for RamStorage {
    type Error = OutOfRange;

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let src = self.mem.get(start..start + buf.len()).ok_or(OutOfRange)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let dst = self
            .mem
            .get_mut(start..start + data.len())
            .ok_or(OutOfRange)?;
        dst.copy_from_slice(data);
        Ok(())
    }
}

/// Board without control lines and with short deadlines.
pub struct TestConfig;

impl ModemConfig for TestConfig {
    type ResetPin = NoPin;
    type EnablePin = NoPin;

    const COMMAND_TIMEOUT: Duration = Duration::from_millis(50);
    const POLL_INTERVAL: Duration = Duration::from_millis(1);
    const ATTACH_ATTEMPTS: u8 = 6;
    const ATTACH_RETRY_DELAY: Duration = Duration::from_millis(1);

    fn reset_pin(&mut self) -> Option<&mut Self::ResetPin> {
        None
    }

    fn enable_pin(&mut self) -> Option<&mut Self::EnablePin> {
        None
    }
}

/// Shared record of pin transitions, in order.
#[derive(Clone, Default)]
pub struct PinLog(Rc<RefCell<Vec<(&'static str, bool)>>>);

impl PinLog {
    pub fn take(&self) -> Vec<(&'static str, bool)> {
        self.0.take()
    }
}

pub struct RecordingPin {
    name: &'static str,
    log: PinLog,
}

impl RecordingPin {
    pub fn new(name: &'static str, log: &PinLog) -> Self {
        Self {
            name,
            log: log.clone(),
        }
    }
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.log.0.borrow_mut().push((self.name, false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.log.0.borrow_mut().push((self.name, true));
        Ok(())
    }
}
