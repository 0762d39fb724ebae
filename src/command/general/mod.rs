//! ### General and mobile equipment control

use super::{build, CmdString};
use crate::error::Error;

/// Attention. Answers `OK` once the module accepts commands.
pub const AT: &[u8] = b"AT";

/// Echo mode off. Keeps sent command lines out of the response stream.
pub const ECHO_OFF: &[u8] = b"ATE0";

/// Set fixed local rate `+IPR`
///
/// Locks the serial interface at `baud` instead of autobauding.
pub fn set_baud_rate(baud: u32) -> Result<CmdString, Error> {
    build(format_args!("AT+IPR={}", baud))
}

/// Set phone functionality `+CFUN`
///
/// `1` is full functionality, `0` minimum functionality, which shuts the RF
/// circuits down for low power operation.
pub fn set_functionality(full: bool) -> &'static [u8] {
    if full {
        b"AT+CFUN=1"
    } else {
        b"AT+CFUN=0"
    }
}
