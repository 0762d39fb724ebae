//! ### SMS

pub mod responses;

use super::{build, CmdString};
use crate::error::Error;

/// Select SMS message format `+CMGF`: text mode
pub const SET_TEXT_MODE: &[u8] = b"AT+CMGF=1";

/// Preferred SMS message storage `+CPMS`: SIM for reading, writing and receiving
pub const SELECT_SIM_STORAGE: &[u8] = b"AT+CPMS=\"SM\",\"SM\",\"SM\"";

/// Read SMS message `+CMGR`
///
/// In text mode the answer is a header line
/// `+CMGR: <stat>,<oa>,[<alpha>],<scts>` followed by the message body.
pub fn read_message(index: u8) -> Result<CmdString, Error> {
    build(format_args!("AT+CMGR={}", index))
}

/// Delete SMS message `+CMGD`
pub fn delete_message(index: u8) -> Result<CmdString, Error> {
    build(format_args!("AT+CMGD={}", index))
}
