//! ### Network service, GPRS attach and bearer profile

pub mod responses;

use super::{build, CmdString};
use crate::error::Error;

/// Network registration `+CREG?`
///
/// The read command answers `+CREG: <n>,<stat>[,<lac>,<ci>]`, `<stat>` being
/// the circuit switched registration status.
pub const GET_REGISTRATION: &[u8] = b"AT+CREG?";

/// GPRS attach or detach `+CGATT?`
pub const GET_GPRS_ATTACH: &[u8] = b"AT+CGATT?";

/// Signal quality report `+CSQ`, answers `+CSQ: <rssi>,<ber>`.
pub const GET_SIGNAL_QUALITY: &[u8] = b"AT+CSQ";

/// Operator selection `+COPS?`, answers `+COPS: <mode>[,<format>,<oper>]`.
pub const GET_OPERATOR: &[u8] = b"AT+COPS?";

/// Bearer settings `+SAPBR`: connection type of profile 1
pub const SET_BEARER_CONTYPE: &[u8] = b"AT+SAPBR=3,1,\"Contype\",\"GPRS\"";

/// Open bearer profile 1
pub const OPEN_BEARER: &[u8] = b"AT+SAPBR=1,1";

/// Query bearer profile 1
pub const QUERY_BEARER: &[u8] = b"AT+SAPBR=2,1";

/// Close bearer profile 1
pub const CLOSE_BEARER: &[u8] = b"AT+SAPBR=0,1";

/// Bearer settings `+SAPBR`: access point name of profile 1
pub fn set_bearer_apn(apn: &str) -> Result<CmdString, Error> {
    build(format_args!("AT+SAPBR=3,1,\"APN\",\"{}\"", apn))
}
