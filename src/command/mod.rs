//! AT commands for the SIMCom SIM800 family
//!
//! Each area exposes the command lines it needs, either as constants or as
//! builders for commands with arguments, and a `responses` module decoding
//! the text the modem answers with. Command lines are sent without their
//! trailing `\r\n`, which is appended on transmit.

use core::fmt::{self, Write as _};

use crate::error::Error;

pub mod general;
pub mod http;
pub mod location;
pub mod network_service;
pub mod sms;

/// Capacity of a built command line. Bounded mainly by HTTP URLs.
pub const CMD_LEN: usize = 256;

pub type CmdString = heapless::String<CMD_LEN>;

/// Final result code of a successful command
pub const OK: &[u8] = b"OK\r";

/// Final result code of a failed command
pub const ERROR: &[u8] = b"ERROR";

pub(crate) fn build(args: fmt::Arguments<'_>) -> Result<CmdString, Error> {
    let mut cmd = CmdString::new();
    cmd.write_fmt(args).map_err(|_| Error::Overflow)?;
    Ok(cmd)
}
